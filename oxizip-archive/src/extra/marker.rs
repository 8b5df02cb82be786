use super::ExtraFieldRecord;
use oxizip_core::error::{OxiZipError, Result};

/// Executable JAR marker (0xCAFE).
///
/// Carries no payload in either header. Stateless, so every use simply
/// constructs the unit value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct JarMarker;

impl JarMarker {
    /// Header id of the marker.
    pub const HEADER_ID: u16 = 0xCAFE;
}

impl ExtraFieldRecord for JarMarker {
    fn header_id(&self) -> u16 {
        Self::HEADER_ID
    }

    fn local_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_local(&mut self, _buf: &[u8], _offset: usize, length: usize) -> Result<()> {
        if length != 0 {
            return Err(OxiZipError::malformed(
                Self::HEADER_ID,
                format!("marker must be empty, found {length} bytes"),
            ));
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(*self)
    }
}

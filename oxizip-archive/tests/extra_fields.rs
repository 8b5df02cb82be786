use oxizip_archive::extra::{
    ExtendedTimestamp, ExtraField, ExtraFieldRecord, ExtraFieldRegistry, FieldLocation,
    JarMarker, ResourceAlignmentExtraField, UnixOwnership, UnparseableBehavior,
    merge_central_data, merge_local_data,
};
use oxizip_archive::ZipArchiveEntry;
use oxizip_core::bytes::ZipShort;
use oxizip_core::error::{OxiZipError, Result};

/// Build a local/central pair of extra streams from one record list.
fn headers_for(fields: &[ExtraField]) -> (Vec<u8>, Vec<u8>) {
    (merge_local_data(fields).unwrap(), merge_central_data(fields).unwrap())
}

#[test]
fn test_known_and_unknown_records_replay() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut local = Vec::new();
    local.extend_from_slice(&[0x55, 0x54, 0x05, 0x00, 0x01, 0x10, 0x20, 0x30, 0x40]);
    local.extend_from_slice(&[0x34, 0x12, 0x03, 0x00, 0xAA, 0xBB, 0xCC]);
    local.extend_from_slice(&[0x75, 0x78, 0x0B, 0x00, 1, 4, 0xF5, 1, 0, 0, 4, 0x14, 0, 0, 0]);
    local.extend_from_slice(&[0x1E, 0xA1, 0x04, 0x00, 0x04, 0x80, 0x00, 0x00]);

    let fields = ExtraFieldRegistry::builtin().parse(
        &local,
        FieldLocation::Local,
        UnparseableBehavior::Throw,
    )?;
    let ids: Vec<u16> = fields.iter().map(|f| f.header_id()).collect();
    assert_eq!(ids, vec![0x5455, 0x1234, 0x7875, 0xA11E]);

    assert!(matches!(&fields[0], ExtraField::ExtendedTimestamp(t) if t.modify_time() == Some(0x4030_2010)));
    assert!(matches!(&fields[1], ExtraField::Unrecognized(_)));
    match &fields[2] {
        ExtraField::UnixOwnership(owner) => {
            assert_eq!(owner.uid(), Some(501));
            assert_eq!(owner.gid(), Some(20));
        }
        other => panic!("expected unix ownership, got {other:?}"),
    }
    match &fields[3] {
        ExtraField::ResourceAlignment(align) => {
            assert_eq!(align.alignment(), 4);
            assert!(align.allow_method_change());
            assert_eq!(align.padding(), 2);
        }
        other => panic!("expected alignment, got {other:?}"),
    }

    assert_eq!(merge_local_data(&fields)?, local);
    Ok(())
}

#[test]
fn test_entry_reproduces_diverging_headers() {
    let mut source = ZipArchiveEntry::new("bin/tool");
    source.add_extra_field(
        ExtendedTimestamp::new()
            .with_modify_time(1_600_000_000)
            .with_access_time(1_600_000_100)
            .with_create_time(1_500_000_000),
    );
    source.add_extra_field(UnixOwnership::with_ids(0, 0));
    source.add_extra_field(JarMarker);
    let (local, central) = headers_for(source.extra_fields());

    // Timestamp: 13 bytes locally, 5 centrally. Ownership: empty centrally.
    assert_eq!(local.len(), (4 + 13) + (4 + 5) + 4);
    assert_eq!(central.len(), (4 + 5) + 4 + 4);

    let registry = ExtraFieldRegistry::new();
    let mut entry = ZipArchiveEntry::new("bin/tool");
    entry.set_local_extra(&local, &registry).unwrap();
    entry.merge_central_extra(&central, &registry).unwrap();

    assert_eq!(entry.extra_fields().len(), 3);
    assert_eq!(entry.local_extra().unwrap(), local);
    assert_eq!(entry.central_extra().unwrap(), central);
    match entry.extra_field(ExtendedTimestamp::HEADER_ID) {
        Some(ExtraField::ExtendedTimestamp(t)) => {
            assert_eq!(t.access_time(), Some(1_600_000_100));
            assert_eq!(t.create_time(), Some(1_500_000_000));
        }
        other => panic!("timestamp lost: {other:?}"),
    }
}

#[test]
fn test_central_only_records_are_appended() {
    let registry = ExtraFieldRegistry::new();
    let mut entry = ZipArchiveEntry::new("a");
    entry
        .set_local_extra(&[0xFE, 0xCA, 0x00, 0x00], &registry)
        .unwrap();
    entry
        .merge_central_extra(&[0x42, 0x42, 0x01, 0x00, 0x07], &registry)
        .unwrap();

    let ids: Vec<u16> = entry.extra_fields().iter().map(|f| f.header_id()).collect();
    assert_eq!(ids, vec![JarMarker::HEADER_ID, 0x4242]);
    assert_eq!(
        entry.central_extra().unwrap(),
        [0xFE, 0xCA, 0x00, 0x00, 0x42, 0x42, 0x01, 0x00, 0x07]
    );
}

#[test]
fn test_truncated_local_tail_is_kept_last() {
    let registry = ExtraFieldRegistry::new();
    let data = [0xFE, 0xCA, 0x00, 0x00, 0x01, 0x02];
    let mut entry = ZipArchiveEntry::new("a");
    entry.set_local_extra(&data, &registry).unwrap();
    assert!(entry.extra_fields().last().unwrap().is_unparseable());

    entry.add_extra_field(UnixOwnership::new());
    assert!(entry.extra_fields().last().unwrap().is_unparseable());
    assert_eq!(entry.extra_fields()[1].header_id(), UnixOwnership::HEADER_ID);

    let local = entry.local_extra().unwrap();
    assert!(local.ends_with(&[0x01, 0x02]));
}

#[test]
fn test_alignment_rejects_out_of_range() {
    assert!(ResourceAlignmentExtraField::new(0x8000, false, 0).is_err());
    assert!(ResourceAlignmentExtraField::new(0x7FFF, false, 0).is_ok());
}

/// A tiny application record: one little-endian counter, doubled centrally.
#[derive(Debug, Clone, Default)]
struct Counter {
    value: u16,
}

impl Counter {
    const HEADER_ID: u16 = 0x6C6F;
}

impl ExtraFieldRecord for Counter {
    fn header_id(&self) -> u16 {
        Self::HEADER_ID
    }

    fn local_data(&self) -> Vec<u8> {
        ZipShort::new(self.value).to_bytes().to_vec()
    }

    fn central_data(&self) -> Vec<u8> {
        let mut data = self.local_data();
        data.extend_from_slice(&data.clone());
        data
    }

    fn parse_local(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        if length != ZipShort::BYTES {
            return Err(OxiZipError::malformed(Self::HEADER_ID, "expected two bytes"));
        }
        self.value = ZipShort::from_bytes(buf, offset)?.value();
        Ok(())
    }

    fn parse_central(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<()> {
        if length != 2 * ZipShort::BYTES {
            return Err(OxiZipError::malformed(Self::HEADER_ID, "expected four bytes"));
        }
        self.value = ZipShort::from_bytes(buf, offset)?.value();
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtraFieldRecord> {
        Box::new(self.clone())
    }
}

#[test]
fn test_custom_record_through_registry() {
    let mut registry = ExtraFieldRegistry::new();
    assert!(!registry.is_registered(Counter::HEADER_ID));
    let previous = registry.register(Counter::HEADER_ID, || {
        ExtraField::Custom(Box::new(Counter::default()))
    });
    assert!(previous.is_none());

    let local = [0x6F, 0x6C, 0x02, 0x00, 0x09, 0x00];
    let central = [0x6F, 0x6C, 0x04, 0x00, 0x09, 0x00, 0x09, 0x00];

    let fields = registry
        .parse(&local, FieldLocation::Local, UnparseableBehavior::Throw)
        .unwrap();
    assert!(matches!(&fields[0], ExtraField::Custom(_)));
    assert_eq!(merge_central_data(&fields).unwrap(), central);

    let fields = registry
        .parse(&central, FieldLocation::Central, UnparseableBehavior::Throw)
        .unwrap();
    assert_eq!(merge_local_data(&fields).unwrap(), local);

    // Without the registration the record is carried opaquely instead.
    let opaque = ExtraFieldRegistry::builtin()
        .parse(&local, FieldLocation::Local, UnparseableBehavior::Throw)
        .unwrap();
    assert!(matches!(&opaque[0], ExtraField::Unrecognized(_)));
}

#[test]
fn test_custom_record_error_propagates() {
    let mut registry = ExtraFieldRegistry::empty();
    registry.register(Counter::HEADER_ID, || ExtraField::Custom(Box::new(Counter::default())));
    let err = registry
        .parse(
            &[0x6F, 0x6C, 0x01, 0x00, 0x09],
            FieldLocation::Local,
            UnparseableBehavior::Read,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        OxiZipError::MalformedRecord { header_id: Counter::HEADER_ID, .. }
    ));
}

#[test]
fn test_central_timestamp_copy_yields_parseable_local_copy() {
    // Info-ZIP central copy: all three times flagged, only modify present.
    let central = [0x55, 0x54, 0x05, 0x00, 0x07, 0x00, 0xE1, 0xF5, 0x05];
    let fields = ExtraFieldRegistry::builtin()
        .parse(&central, FieldLocation::Central, UnparseableBehavior::Throw)
        .unwrap();
    assert_eq!(merge_central_data(&fields).unwrap(), central);

    let local = merge_local_data(&fields).unwrap();
    let reparsed = ExtraFieldRegistry::builtin()
        .parse(&local, FieldLocation::Local, UnparseableBehavior::Throw)
        .unwrap();
    match &reparsed[0] {
        ExtraField::ExtendedTimestamp(t) => {
            assert_eq!(t.modify_time(), Some(100_000_000));
            assert_eq!(t.access_time(), None);
        }
        other => panic!("expected timestamp, got {other:?}"),
    }
}

#[test]
fn test_entry_keeps_narrower_central_timestamp_flags() {
    let local = [0x55, 0x54, 0x09, 0x00, 0x03, 1, 0, 0, 0, 2, 0, 0, 0];
    let central = [0x55, 0x54, 0x05, 0x00, 0x01, 1, 0, 0, 0];

    let mut entry = ZipArchiveEntry::new("a");
    entry
        .set_local_extra(&local, ExtraFieldRegistry::builtin())
        .unwrap();
    entry
        .merge_central_extra(&central, ExtraFieldRegistry::builtin())
        .unwrap();
    assert_eq!(entry.local_extra().unwrap(), local);
    assert_eq!(entry.central_extra().unwrap(), central);
}

#[test]
fn test_non_empty_central_unix_record_is_read_and_replayed() {
    let central = [0x75, 0x78, 0x02, 0x00, 0x01, 0x00];
    for behavior in [UnparseableBehavior::Read, UnparseableBehavior::Throw] {
        let fields = ExtraFieldRegistry::builtin()
            .parse(&central, FieldLocation::Central, behavior)
            .unwrap();
        assert!(matches!(&fields[0], ExtraField::UnixOwnership(_)));
        assert_eq!(merge_central_data(&fields).unwrap(), central);
    }

    let local = merge_local_data(&[UnixOwnership::with_ids(0, 0).into()]).unwrap();
    let mut entry = ZipArchiveEntry::new("a");
    entry
        .set_local_extra(&local, ExtraFieldRegistry::builtin())
        .unwrap();
    entry
        .merge_central_extra(&central, ExtraFieldRegistry::builtin())
        .unwrap();
    assert_eq!(entry.local_extra().unwrap(), local);
    assert_eq!(entry.central_extra().unwrap(), central);
}

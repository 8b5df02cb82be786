//! Encoding of entry names and comments.
//!
//! A writer picks one [`ZipEncoding`] for the archive. When an entry name
//! cannot be represented in it, the writer may switch that entry to UTF-8
//! (and set general purpose bit 11), and may attach Info-ZIP Unicode
//! path/comment records so that readers unaware of bit 11 can still recover
//! the text. [`decode_entry_text`] is the reader-side inverse.

use crate::encoding::{EncodingPolicy, ZipEncoding};
use crate::entry::ZipArchiveEntry;
use crate::extra::{ExtraField, UnicodeCommentExtraField, UnicodePathExtraField};
use crate::flags::GeneralPurposeBit;
use oxizip_core::error::Result;

/// When to attach Unicode path and comment records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnicodeExtraFieldPolicy {
    /// Never.
    #[default]
    Never,
    /// For every entry.
    Always,
    /// Only for text the archive encoding cannot represent.
    NotEncodeable,
}

impl UnicodeExtraFieldPolicy {
    fn applies(self, encodable: bool) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::NotEncodeable => !encodable,
        }
    }
}

/// Writer-side name and comment encoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameEncodingOptions {
    /// Archive encoding for names and comments.
    pub encoding: ZipEncoding,
    /// Set bit 11 when the encoding in effect is UTF-8.
    pub use_utf8_flag: bool,
    /// Write names the archive encoding cannot represent as UTF-8.
    pub fallback_to_utf8: bool,
    /// Unicode record policy.
    pub unicode_extra_fields: UnicodeExtraFieldPolicy,
}

impl Default for NameEncodingOptions {
    fn default() -> Self {
        Self {
            encoding: ZipEncoding::utf8(EncodingPolicy::Fallback),
            use_utf8_flag: true,
            fallback_to_utf8: false,
            unicode_extra_fields: UnicodeExtraFieldPolicy::Never,
        }
    }
}

impl NameEncodingOptions {
    /// Options for `encoding` with every other setting at its default.
    pub fn new(encoding: ZipEncoding) -> Self {
        Self {
            encoding,
            ..Self::default()
        }
    }

    /// Builder method for [`use_utf8_flag`](Self::use_utf8_flag).
    pub fn with_utf8_flag(mut self, value: bool) -> Self {
        self.use_utf8_flag = value;
        self
    }

    /// Builder method for [`fallback_to_utf8`](Self::fallback_to_utf8).
    pub fn with_fallback_to_utf8(mut self, value: bool) -> Self {
        self.fallback_to_utf8 = value;
        self
    }

    /// Builder method for [`unicode_extra_fields`](Self::unicode_extra_fields).
    pub fn with_unicode_extra_fields(mut self, policy: UnicodeExtraFieldPolicy) -> Self {
        self.unicode_extra_fields = policy;
        self
    }
}

/// Header bytes for one entry's name and comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    /// Encoded name.
    pub name: Vec<u8>,
    /// Encoded comment; empty when the entry has none.
    pub comment: Vec<u8>,
    /// The encoding actually used.
    pub encoding: ZipEncoding,
}

/// Name and comment recovered from header bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// Entry name.
    pub name: String,
    /// Entry comment; empty when the header has none.
    pub comment: String,
}

/// Encode an entry's name and comment for its headers.
///
/// Updates the entry's UTF-8 flag and, per the options, its Unicode records.
pub fn encode_entry_text(
    entry: &mut ZipArchiveEntry,
    options: &NameEncodingOptions,
) -> Result<EncodedText> {
    let comment = entry.comment.clone().unwrap_or_default();
    let name_encodable = options.encoding.can_encode(&entry.name);
    let comment_encodable = options.encoding.can_encode(&comment);

    let fell_back = !name_encodable && options.fallback_to_utf8;
    let encoding = if fell_back {
        ZipEncoding::utf8(options.encoding.policy())
    } else {
        options.encoding
    };

    let name = encoding.encode(&entry.name)?;
    let comment_bytes = encoding.encode(&comment)?;

    entry
        .flags
        .use_utf8_names(encoding.is_utf8() && (options.use_utf8_flag || fell_back));

    let policy = options.unicode_extra_fields;
    if policy.applies(name_encodable) {
        let record = UnicodePathExtraField::new(&entry.name, &name);
        entry.add_extra_field(record);
    }
    if !comment.is_empty() && policy.applies(comment_encodable) {
        let record = UnicodeCommentExtraField::new(&comment, &comment_bytes);
        entry.add_extra_field(record);
    }

    Ok(EncodedText {
        name,
        comment: comment_bytes,
        encoding,
    })
}

/// Decode a name and comment read from a header.
///
/// With bit 11 set both are UTF-8. Otherwise they are decoded with `legacy`,
/// and a Unicode record whose CRC-32 matches the raw bytes takes precedence.
pub fn decode_entry_text(
    raw_name: &[u8],
    raw_comment: &[u8],
    flags: GeneralPurposeBit,
    extra: &[ExtraField],
    legacy: ZipEncoding,
) -> Result<DecodedText> {
    if flags.uses_utf8_names() {
        let utf8 = ZipEncoding::utf8(legacy.policy());
        return Ok(DecodedText {
            name: utf8.decode(raw_name)?,
            comment: utf8.decode(raw_comment)?,
        });
    }

    let unicode_name = extra.iter().find_map(|field| match field {
        ExtraField::UnicodePath(record) => record.text_for(raw_name),
        _ => None,
    });
    let unicode_comment = extra.iter().find_map(|field| match field {
        ExtraField::UnicodeComment(record) => record.text_for(raw_comment),
        _ => None,
    });

    let name = match unicode_name {
        Some(text) => text.to_owned(),
        None => legacy.decode(raw_name)?,
    };
    let comment = match unicode_comment {
        Some(text) if !raw_comment.is_empty() => text.to_owned(),
        _ => legacy.decode(raw_comment)?,
    };
    Ok(DecodedText { name, comment })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::ExtraFieldRecord;

    fn latin1() -> ZipEncoding {
        ZipEncoding::for_label("windows-1252", EncodingPolicy::Fallback).unwrap()
    }

    #[test]
    fn test_utf8_default_sets_flag() {
        let mut entry = ZipArchiveEntry::new("日本/ファイル.txt");
        let encoded = encode_entry_text(&mut entry, &NameEncodingOptions::default()).unwrap();
        assert_eq!(encoded.name, "日本/ファイル.txt".as_bytes());
        assert!(entry.flags.uses_utf8_names());
        assert!(entry.extra_fields().is_empty());
    }

    #[test]
    fn test_legacy_encodable_name_clears_flag() {
        let mut entry = ZipArchiveEntry::new("café.txt")
            .with_flags(GeneralPurposeBit::new().with_utf8_names(true));
        let encoded = encode_entry_text(&mut entry, &NameEncodingOptions::new(latin1())).unwrap();
        assert_eq!(encoded.name, b"caf\xE9.txt");
        assert!(!entry.flags.uses_utf8_names());
    }

    #[test]
    fn test_fallback_to_utf8() {
        let mut entry = ZipArchiveEntry::new("Ωmega");
        let options = NameEncodingOptions::new(latin1()).with_fallback_to_utf8(true);
        let encoded = encode_entry_text(&mut entry, &options).unwrap();
        assert!(encoded.encoding.is_utf8());
        assert_eq!(encoded.name, "Ωmega".as_bytes());
        assert!(entry.flags.uses_utf8_names());
    }

    #[test]
    fn test_without_fallback_escapes() {
        let mut entry = ZipArchiveEntry::new("Ωmega");
        let encoded = encode_entry_text(&mut entry, &NameEncodingOptions::new(latin1())).unwrap();
        assert_eq!(encoded.name, b"%U03A9mega");
        assert!(!entry.flags.uses_utf8_names());
    }

    #[test]
    fn test_unicode_records_when_not_encodeable() {
        let options = NameEncodingOptions::new(latin1())
            .with_unicode_extra_fields(UnicodeExtraFieldPolicy::NotEncodeable);

        let mut plain = ZipArchiveEntry::new("readme.txt");
        encode_entry_text(&mut plain, &options).unwrap();
        assert!(plain.extra_fields().is_empty());

        let mut entry = ZipArchiveEntry::new("Ωmega").with_comment("ü ok");
        let encoded = encode_entry_text(&mut entry, &options).unwrap();
        let field = entry.extra_field(UnicodePathExtraField::HEADER_ID).unwrap();
        assert!(matches!(
            field,
            ExtraField::UnicodePath(record) if record.text_for(&encoded.name) == Some("Ωmega")
        ));
        // The comment is representable in the legacy charset.
        assert!(entry.extra_field(UnicodeCommentExtraField::HEADER_ID).is_none());
    }

    #[test]
    fn test_unicode_records_always() {
        let options = NameEncodingOptions::new(latin1())
            .with_unicode_extra_fields(UnicodeExtraFieldPolicy::Always);
        let mut entry = ZipArchiveEntry::new("a.txt").with_comment("note");
        encode_entry_text(&mut entry, &options).unwrap();
        let ids: Vec<u16> = entry.extra_fields().iter().map(|f| f.header_id()).collect();
        assert_eq!(
            ids,
            vec![UnicodePathExtraField::HEADER_ID, UnicodeCommentExtraField::HEADER_ID]
        );
    }

    #[test]
    fn test_decode_prefers_matching_unicode_record() {
        let raw = b"%U03A9mega";
        let extra = vec![ExtraField::UnicodePath(UnicodePathExtraField::new("Ωmega", raw))];
        let strict = latin1().with_policy(EncodingPolicy::Strict);
        let decoded =
            decode_entry_text(b"Xmega", b"", GeneralPurposeBit::new(), &extra, strict).unwrap();
        // CRC does not match the raw bytes: the record is stale.
        assert_eq!(decoded.name, "Xmega");

        let decoded = decode_entry_text(raw, b"", GeneralPurposeBit::new(), &extra, strict).unwrap();
        assert_eq!(decoded.name, "Ωmega");
    }

    #[test]
    fn test_decode_utf8_flag_wins() {
        let flags = GeneralPurposeBit::new().with_utf8_names(true);
        let decoded = decode_entry_text("é".as_bytes(), b"", flags, &[], latin1()).unwrap();
        assert_eq!(decoded.name, "é");
    }

    #[test]
    fn test_legacy_round_trip() {
        let options = NameEncodingOptions::new(latin1());
        let mut entry = ZipArchiveEntry::new("50%U0041 Ω").with_comment("naïve");
        let encoded = encode_entry_text(&mut entry, &options).unwrap();
        let decoded = decode_entry_text(
            &encoded.name,
            &encoded.comment,
            entry.flags,
            entry.extra_fields(),
            latin1(),
        )
        .unwrap();
        assert_eq!(decoded.name, "50%U0041 Ω");
        assert_eq!(decoded.comment, "naïve");
    }
}

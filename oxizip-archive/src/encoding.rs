//! Text encoding for entry names and comments.
//!
//! A [`ZipEncoding`] binds one charset to one [`EncodingPolicy`]:
//!
//! - **Strict**: a character the charset cannot represent, or a malformed
//!   byte sequence, is an error.
//! - **Fallback**: each UTF-16 code unit of an unmappable character is
//!   written as the six ASCII bytes `%Uxxxx` (uppercase hex), and decoding
//!   turns those escapes back into the original code units. Malformed bytes
//!   that are not escapes decode to U+FFFD.
//!
//! Under the fallback policy `decode(encode(s)) == s` for every string. A
//! literal `%` that starts an escape-shaped sequence is itself escaped as
//! `%U0025`, so text that already contains `%U0041` survives untouched.
//! A character whose bytes decode to a different character (Shift_JIS
//! writes both `¥` and `\` as 0x5C) counts as unmappable under both
//! policies. UTF-8 targets represent every character and never use escapes.
//!
//! ```
//! use oxizip_archive::encoding::{EncodingPolicy, ZipEncoding};
//!
//! let latin = ZipEncoding::for_label("windows-1252", EncodingPolicy::Fallback).unwrap();
//! let bytes = latin.encode("Ωmega").unwrap();
//! assert_eq!(bytes, b"%U03A9mega");
//! assert_eq!(latin.decode(&bytes).unwrap(), "Ωmega");
//! ```

use encoding_rs::{DecoderResult, Encoder, EncoderResult, Encoding, UTF_8};
use oxizip_core::error::{OxiZipError, Result};

/// Replacement for malformed input under the fallback policy.
const REPLACEMENT: char = '\u{FFFD}';

/// Width of one `%Uxxxx` escape.
const ESCAPE_LEN: usize = 6;

/// Growth step when an encode or decode buffer fills up.
const MIN_GROWTH: usize = 16;

/// How unrepresentable text is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingPolicy {
    /// Unmappable characters and malformed bytes are errors.
    Strict,
    /// Unmappable characters are escaped; malformed bytes become U+FFFD.
    #[default]
    Fallback,
}

/// A charset bound to an [`EncodingPolicy`].
///
/// Immutable and `Copy`; one value can be shared across any number of
/// threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipEncoding {
    encoding: &'static Encoding,
    policy: EncodingPolicy,
}

impl Default for ZipEncoding {
    fn default() -> Self {
        Self::utf8(EncodingPolicy::default())
    }
}

impl ZipEncoding {
    /// Bind `encoding` to `policy`.
    ///
    /// Fails for encodings that cannot produce their own bytes (UTF-16 and
    /// the replacement encoding encode as UTF-8).
    pub fn new(encoding: &'static Encoding, policy: EncodingPolicy) -> Result<Self> {
        if encoding.output_encoding() != encoding {
            return Err(OxiZipError::encoding(
                encoding.name(),
                0,
                "charset cannot be used for entry names",
            ));
        }
        Ok(Self { encoding, policy })
    }

    /// Look up a charset by WHATWG label (`"cp1252"`, `"shift_jis"`, ...).
    pub fn for_label(label: &str, policy: EncodingPolicy) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| OxiZipError::encoding(label, 0, "unknown charset label"))?;
        Self::new(encoding, policy)
    }

    /// UTF-8 with the given policy.
    pub fn utf8(policy: EncodingPolicy) -> Self {
        Self {
            encoding: UTF_8,
            policy,
        }
    }

    /// Canonical charset name.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// The bound policy.
    pub fn policy(&self) -> EncodingPolicy {
        self.policy
    }

    /// The underlying `encoding_rs` charset.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Whether the charset is UTF-8.
    pub fn is_utf8(&self) -> bool {
        self.encoding == UTF_8
    }

    /// Same charset, different policy.
    pub fn with_policy(self, policy: EncodingPolicy) -> Self {
        Self { policy, ..self }
    }

    fn escapes(&self) -> bool {
        self.policy == EncodingPolicy::Fallback && !self.is_utf8()
    }

    /// Whether every character of `text` is representable, regardless of
    /// the bound policy.
    pub fn can_encode(&self, text: &str) -> bool {
        self.is_utf8() || text.chars().all(|c| self.maps_exactly(c))
    }

    /// Whether `c` encodes to bytes that decode back to `c` alone.
    fn maps_exactly(&self, c: char) -> bool {
        // ASCII is identity in every charset accepted by `ZipEncoding::new`.
        if self.is_utf8() || c.is_ascii() {
            return true;
        }
        let mut utf8 = [0u8; 4];
        let single: &str = c.encode_utf8(&mut utf8);
        let mut encoder = self.encoding.new_encoder();
        let capacity = estimate_encoded(&encoder, single.len()).max(MIN_GROWTH);
        let mut bytes = Vec::with_capacity(capacity);
        let (result, _) =
            encoder.encode_from_utf8_to_vec_without_replacement(single, &mut bytes, true);
        if !matches!(result, EncoderResult::InputEmpty) {
            return false;
        }
        self.encoding
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .is_some_and(|decoded| decoded == single)
    }

    /// Encode `text` to archive bytes.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let mut encoder = self.encoding.new_encoder();
        let mut out = Vec::with_capacity(estimate_encoded(&encoder, text.len()));

        if self.is_utf8() {
            self.encode_run(&mut encoder, text, 0, text, &mut out, true)?;
            return Ok(out);
        }

        let mut start = 0;
        for (idx, c) in text.char_indices() {
            let literal_escape =
                c == '%' && self.escapes() && parse_escape(&text[idx..]).is_some();
            if !literal_escape && self.maps_exactly(c) {
                continue;
            }
            self.encode_run(&mut encoder, &text[start..idx], start, text, &mut out, false)?;
            if literal_escape {
                push_escape(&mut encoder, u16::from(b'%'), &mut out);
            } else {
                self.unmappable(&mut encoder, c, idx, text, &mut out)?;
            }
            start = idx + c.len_utf8();
        }
        self.encode_run(&mut encoder, &text[start..], start, text, &mut out, true)?;
        Ok(out)
    }

    /// Reject `c` (strict) or write it as escapes (fallback). `at` is its
    /// byte offset within `text`.
    fn unmappable(
        &self,
        encoder: &mut Encoder,
        c: char,
        at: usize,
        text: &str,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        if self.policy == EncodingPolicy::Strict {
            return Err(OxiZipError::encoding(
                self.name(),
                text[..at].chars().count(),
                format!("character {c:?} (U+{:04X}) is not representable", u32::from(c)),
            ));
        }
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            push_escape(encoder, *unit, out);
        }
        Ok(())
    }

    /// Encode one run of text containing no escape-shaped `%` and no
    /// character that fails to map exactly.
    ///
    /// `base` is the byte offset of `run` within `text`, used for error
    /// positions.
    fn encode_run(
        &self,
        encoder: &mut Encoder,
        run: &str,
        base: usize,
        text: &str,
        out: &mut Vec<u8>,
        last: bool,
    ) -> Result<()> {
        let mut rest = run;
        let mut consumed = base;
        loop {
            let (result, read) =
                encoder.encode_from_utf8_to_vec_without_replacement(rest, out, last);
            rest = &rest[read..];
            consumed += read;
            match result {
                EncoderResult::InputEmpty => return Ok(()),
                EncoderResult::OutputFull => {
                    let grow = estimate_encoded(encoder, rest.len()).max(out.capacity());
                    out.reserve(grow.max(MIN_GROWTH));
                }
                EncoderResult::Unmappable(c) => {
                    self.unmappable(encoder, c, consumed - c.len_utf8(), text, out)?;
                }
            }
        }
    }

    /// Decode archive bytes to text.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        let mut decoder = self.encoding.new_decoder_without_bom_handling();
        let estimate = decoder
            .max_utf8_buffer_length_without_replacement(bytes.len())
            .unwrap_or(bytes.len());
        let mut out = String::with_capacity(estimate);
        let mut consumed = 0;

        loop {
            let (result, read) =
                decoder.decode_to_string_without_replacement(&bytes[consumed..], &mut out, true);
            consumed += read;
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {
                    let remaining = bytes.len() - consumed;
                    let grow = decoder
                        .max_utf8_buffer_length_without_replacement(remaining)
                        .unwrap_or(remaining * 3);
                    out.reserve(grow.max(MIN_GROWTH));
                }
                DecoderResult::Malformed(bad, extra) => {
                    if self.policy == EncodingPolicy::Strict {
                        let at = consumed - usize::from(bad) - usize::from(extra);
                        return Err(OxiZipError::encoding(
                            self.name(),
                            at,
                            format!("malformed byte sequence of length {bad}"),
                        ));
                    }
                    out.push(REPLACEMENT);
                }
            }
        }

        if self.escapes() {
            Ok(unescape(&out))
        } else {
            Ok(out)
        }
    }
}

fn estimate_encoded(encoder: &Encoder, utf8_len: usize) -> usize {
    encoder
        .max_buffer_length_from_utf8_without_replacement(utf8_len)
        .unwrap_or(utf8_len)
}

/// Write `%Uxxxx` for one code unit through the encoder, so stateful
/// charsets switch back to ASCII first.
fn push_escape(encoder: &mut Encoder, unit: u16, out: &mut Vec<u8>) {
    let escape = format!("%U{unit:04X}");
    let mut rest = escape.as_str();
    loop {
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(rest, out, false);
        rest = &rest[read..];
        match result {
            EncoderResult::OutputFull => out.reserve(ESCAPE_LEN.max(MIN_GROWTH)),
            // ASCII is mappable in every charset accepted by `ZipEncoding::new`.
            EncoderResult::InputEmpty | EncoderResult::Unmappable(_) => break,
        }
    }
}

/// Code unit of an escape at the start of `s`, if there is one.
fn parse_escape(s: &str) -> Option<u16> {
    let b = s.as_bytes();
    if b.len() >= ESCAPE_LEN
        && b[0] == b'%'
        && b[1] == b'U'
        && b[2..ESCAPE_LEN].iter().all(u8::is_ascii_hexdigit)
    {
        u16::from_str_radix(&s[2..ESCAPE_LEN], 16).ok()
    } else {
        None
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut units: Vec<u16> = Vec::new();
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if let Some(unit) = parse_escape(rest) {
            units.push(unit);
            rest = &rest[ESCAPE_LEN..];
            continue;
        }
        flush_units(&mut units, &mut out);
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    flush_units(&mut units, &mut out);
    out
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) {
    out.extend(char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(REPLACEMENT)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp1252(policy: EncodingPolicy) -> ZipEncoding {
        ZipEncoding::for_label("cp1252", policy).unwrap()
    }

    #[test]
    fn test_strict_unmappable_reports_index() {
        let err = cp1252(EncodingPolicy::Strict).encode("abΩd").unwrap_err();
        match err {
            OxiZipError::Encoding {
                encoding, position, ..
            } => {
                assert_eq!(encoding, "windows-1252");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mappable_text_is_plain() {
        let enc = cp1252(EncodingPolicy::Fallback);
        assert_eq!(enc.encode("café €").unwrap(), b"caf\xE9 \x80");
        assert_eq!(enc.decode(b"caf\xE9 \x80").unwrap(), "café €");
    }

    #[test]
    fn test_fallback_surrogate_pair() {
        let enc = cp1252(EncodingPolicy::Fallback);
        let bytes = enc.encode("a😀").unwrap();
        assert_eq!(bytes, b"a%UD83D%UDE00");
        assert_eq!(enc.decode(&bytes).unwrap(), "a😀");
    }

    #[test]
    fn test_literal_escape_shape_survives() {
        let enc = cp1252(EncodingPolicy::Fallback);
        let bytes = enc.encode("100%U0041 %Uzz").unwrap();
        assert_eq!(bytes, b"100%U0025U0041 %Uzz");
        assert_eq!(enc.decode(&bytes).unwrap(), "100%U0041 %Uzz");
    }

    #[test]
    fn test_lone_surrogate_escape_decodes_to_replacement() {
        let enc = cp1252(EncodingPolicy::Fallback);
        assert_eq!(enc.decode(b"x%UD800y").unwrap(), "x\u{FFFD}y");
    }

    #[test]
    fn test_utf8_strict_malformed_position() {
        let enc = ZipEncoding::utf8(EncodingPolicy::Strict);
        let err = enc.decode(b"ok\xFFno").unwrap_err();
        assert!(matches!(err, OxiZipError::Encoding { position: 2, .. }));
    }

    #[test]
    fn test_utf8_fallback_replaces_and_keeps_escapes_literal() {
        let enc = ZipEncoding::utf8(EncodingPolicy::Fallback);
        assert_eq!(enc.decode(b"a\xFFb").unwrap(), "a\u{FFFD}b");
        assert_eq!(enc.encode("%U0041").unwrap(), b"%U0041");
        assert_eq!(enc.decode(b"%U0041").unwrap(), "%U0041");
    }

    #[test]
    fn test_shift_jis_malformed_fallback() {
        let enc = ZipEncoding::for_label("shift_jis", EncodingPolicy::Fallback).unwrap();
        assert_eq!(enc.decode(b"\x82\xA0").unwrap(), "あ");
        // A lead byte with no trail byte.
        assert_eq!(enc.decode(b"A\x82").unwrap(), "A\u{FFFD}");
        assert!(
            ZipEncoding::for_label("shift_jis", EncodingPolicy::Strict)
                .unwrap()
                .decode(b"A\x82")
                .is_err()
        );
    }

    #[test]
    fn test_can_encode_ignores_policy() {
        assert!(!cp1252(EncodingPolicy::Fallback).can_encode("Ω"));
        assert!(cp1252(EncodingPolicy::Strict).can_encode("plain ascii"));
        assert!(ZipEncoding::utf8(EncodingPolicy::Strict).can_encode("Ω😀"));
    }

    #[test]
    fn test_escape_expansion_grows_buffer() {
        let enc = cp1252(EncodingPolicy::Fallback);
        let text = "Ж".repeat(500);
        let bytes = enc.encode(&text).unwrap();
        assert_eq!(bytes.len(), 500 * ESCAPE_LEN);
        assert_eq!(enc.decode(&bytes).unwrap(), text);
    }

    #[test]
    fn test_shift_jis_aliased_characters_are_escaped() {
        let enc = ZipEncoding::for_label("shift_jis", EncodingPolicy::Fallback).unwrap();
        let bytes = enc.encode("price¥100‾ \\~ あ").unwrap();
        assert_eq!(bytes, b"price%U00A5100%U203E \\~ \x82\xA0");
        assert_eq!(enc.decode(&bytes).unwrap(), "price¥100‾ \\~ あ");

        let strict = enc.with_policy(EncodingPolicy::Strict);
        assert!(!strict.can_encode("¥"));
        assert!(strict.can_encode("\\~あ"));
        assert!(matches!(
            strict.encode("ab¥").unwrap_err(),
            OxiZipError::Encoding { position: 2, .. }
        ));
    }

    #[test]
    fn test_rejects_non_self_encoding_charsets() {
        assert!(ZipEncoding::for_label("utf-16le", EncodingPolicy::Strict).is_err());
        assert!(ZipEncoding::for_label("no-such-charset", EncodingPolicy::Strict).is_err());
    }
}

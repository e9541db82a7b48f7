//! Byte decoding and XML text helpers shared by the readers.

use std::borrow::Cow;

use memchr::memmem;

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252 (common in older NIMAS filesets)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    // Try UTF-8 first (handles BOM automatically)
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract encoding from XML declaration.
///
/// Parses `<?xml ... encoding="..." ?>` within the first 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = memmem::find(prefix, b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Resolve a named entity to static text.
///
/// The five predefined XML entities plus `nbsp`, which XHTML content
/// documents use without declaring it.
pub fn named_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        _ => quick_xml::escape::resolve_predefined_entity(name),
    }
}

/// Resolve an XML entity reference (the part between `&` and `;`).
///
/// Handles named entities known to [`named_entity`] and numeric references.
pub fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(text) = named_entity(entity) {
        return Some(text.to_string());
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

/// True for strings made only of XML whitespace (or empty).
pub fn is_xml_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        let with_bom = &[0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(strip_bom(with_bom), b"hi");
        assert_eq!(strip_bom(b"hello"), b"hello");
        assert_eq!(strip_bom(&[]), &[] as &[u8]);

        // Partial BOM (not stripped)
        let partial = &[0xEF, 0xBB, b'x'];
        assert_eq!(strip_bom(partial), partial);
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("apos"), Some("'".to_string()));
        assert_eq!(resolve_entity("amp"), Some("&".to_string()));
        assert_eq!(resolve_entity("nbsp"), Some("\u{a0}".to_string()));
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("#x2019"), Some("\u{2019}".to_string()));
        assert_eq!(resolve_entity("mdash"), None);
    }

    #[test]
    fn test_named_entity() {
        assert_eq!(named_entity("lt"), Some("<"));
        assert_eq!(named_entity("nbsp"), Some("\u{a0}"));
        assert_eq!(named_entity("mdash"), None);
    }

    #[test]
    fn test_extract_xml_encoding() {
        assert_eq!(
            extract_xml_encoding(br#"<?xml version="1.0" encoding="ISO-8859-1"?><a/>"#),
            Some("ISO-8859-1")
        );
        assert_eq!(
            extract_xml_encoding(b"<?xml version='1.0' encoding='utf-8'?>"),
            Some("utf-8")
        );
        assert_eq!(extract_xml_encoding(b"<dtbook/>"), None);
    }

    #[test]
    fn test_decode_text_falls_back_to_hint() {
        // 0xE9 is 'é' in Latin-1 but invalid UTF-8 on its own
        let bytes = b"caf\xE9";
        assert_eq!(decode_text(bytes, Some("iso-8859-1")), "café");
        assert_eq!(decode_text(b"plain", None), "plain");
    }

    #[test]
    fn test_is_xml_whitespace() {
        assert!(is_xml_whitespace(""));
        assert!(is_xml_whitespace(" \n\t\r"));
        assert!(!is_xml_whitespace(" x "));
        // Non-breaking space is content, not formatting
        assert!(!is_xml_whitespace("\u{a0}"));
    }
}

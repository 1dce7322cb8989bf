//! Shared XML helpers for reading and writing spreadsheet parts.
//!
//! Attribute lookups handle UTF-8 conversion safely and never fail; a
//! missing or malformed attribute is simply `None`.

use quick_xml::events::BytesStart;

use crate::types::ColorSpec;

/// Extract a string attribute value by key.
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return attr.unescape_value().ok().map(|s| s.into_owned());
        }
    }
    None
}

/// Extract a string attribute by local name (ignoring namespace prefix).
pub fn attr_string_local(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            return attr.unescape_value().ok().map(|s| s.into_owned());
        }
    }
    None
}

/// Extract a `u32` attribute value by key.
pub fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|s| s.trim().parse().ok())
}

/// Extract an `f64` attribute value by key.
pub fn attr_f64(e: &BytesStart, key: &[u8]) -> Option<f64> {
    attr_string(e, key).and_then(|s| s.trim().parse().ok())
}

/// Extract a boolean attribute. `"1"` and `"true"` are true.
pub fn attr_bool(e: &BytesStart, key: &[u8]) -> Option<bool> {
    attr_string(e, key).map(|s| matches!(s.as_str(), "1" | "true"))
}

/// Extract the `val` attribute, the most common payload in SpreadsheetML.
pub fn attr_val(e: &BytesStart) -> Option<String> {
    attr_string(e, b"val")
}

/// Parse `rgb`/`theme`/`tint`/`indexed`/`auto` into a `ColorSpec`.
pub fn parse_color_attrs(e: &BytesStart) -> ColorSpec {
    ColorSpec {
        rgb: attr_string(e, b"rgb"),
        theme: attr_u32(e, b"theme"),
        tint: attr_f64(e, b"tint"),
        indexed: attr_u32(e, b"indexed"),
        auto: attr_bool(e, b"auto").unwrap_or(false),
    }
}

/// Escape text for element content and attribute values.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline/CR are not legal XML 1.0.
            c if c.is_control() && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;

    fn make_start(xml: &str) -> BytesStart<'_> {
        let content = xml
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim_end_matches('/')
            .trim_end();
        BytesStart::from_content(content, content.find(' ').unwrap_or(content.len()))
    }

    #[test]
    fn reads_typed_attributes() {
        let e = make_start(r#"<col min="2" max="4" width="12.5" hidden="1"/>"#);
        assert_eq!(attr_u32(&e, b"min"), Some(2));
        assert_eq!(attr_f64(&e, b"width"), Some(12.5));
        assert_eq!(attr_bool(&e, b"hidden"), Some(true));
        assert_eq!(attr_string(&e, b"style"), None);
    }

    #[test]
    fn unescapes_attribute_values() {
        let e = make_start(r#"<sheet name="P&amp;L"/>"#);
        assert_eq!(attr_string(&e, b"name").as_deref(), Some("P&L"));
    }

    #[test]
    fn local_name_ignores_prefix() {
        let e = make_start(r#"<sheet r:id="rId3"/>"#);
        assert_eq!(attr_string_local(&e, b"id").as_deref(), Some("rId3"));
        assert_eq!(attr_string(&e, b"id"), None);
    }

    #[test]
    fn parses_color_spec() {
        let e = make_start(r#"<fgColor theme="4" tint="-0.25"/>"#);
        let c = parse_color_attrs(&e);
        assert_eq!(c.theme, Some(4));
        assert_eq!(c.tint, Some(-0.25));
        assert!(c.rgb.is_none());
        assert!(!c.auto);
    }

    #[test]
    fn escapes_markup_and_drops_control_chars() {
        assert_eq!(xml_escape("a<b & \"c\"\u{1}"), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(xml_escape("line\nbreak"), "line\nbreak");
    }
}

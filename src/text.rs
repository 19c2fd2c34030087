//! Text cleanup applied once when data is written.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// NFC-normalizes, trims, drops control characters (and the U+FFFD left
/// behind by broken decoders) and collapses whitespace runs to one space.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.nfc() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_control() || c == '\u{FFFD}' {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

/// Like [`normalize_text`], but blank input becomes `None`.
pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_text).filter(|s| !s.is_empty())
}

/// Required field: normalized and non-empty, or a message naming the field.
pub fn require(field: &str, raw: &str) -> Result<String, String> {
    let s = normalize_text(raw);
    if s.is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(s)
    }
}

/// URL slug derived from a display name: diacritics folded away, lowercase,
/// alphanumeric runs joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash = false;

    // đ has no canonical decomposition
    for c in name.nfd().filter(|c| !is_combining_mark(*c)) {
        let c = if c == 'đ' || c == 'Đ' { 'd' } else { c };
        if c.is_alphanumeric() {
            if dash && !slug.is_empty() {
                slug.push('-');
            }
            dash = false;
            slug.extend(c.to_lowercase());
        } else {
            dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_strips_control_chars() {
        assert_eq!(normalize_text("  Mimi \t\n  the\u{0007} cat  "), "Mimi the cat");
        assert_eq!(normalize_text("Gi\u{FFFD}ng"), "Ging");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn composed_and_decomposed_input_store_the_same() {
        let decomposed = normalize_text("Bo\u{0302}ng");
        let composed = normalize_text("B\u{00F4}ng");
        assert_eq!(decomposed, composed);
        assert_eq!(composed, "Bông");
        assert_eq!(normalize_text("  Nguye\u{0302}\u{0303}n  "), "Nguyễn");
    }

    #[test]
    fn optional_blank_becomes_none() {
        assert_eq!(normalize_optional(Some("  ")), None);
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some(" Poodle ")), Some("Poodle".into()));
    }

    #[test]
    fn require_names_the_missing_field() {
        assert_eq!(require("pet_name", " \n"), Err("pet_name is required".into()));
        assert_eq!(require("pet_name", " Bông "), Ok("Bông".into()));
    }

    #[test]
    fn slug_from_name() {
        assert_eq!(slugify("Full Grooming (Large Dog)"), "full-grooming-large-dog");
        assert_eq!(slugify("  --Bath & Dry--  "), "bath-dry");
        assert_eq!(slugify("Đặc biệt"), "dac-biet");
        assert_eq!(slugify("Tắm sấy Thú cưng"), "tam-say-thu-cung");
        assert_eq!(slugify("Bo\u{0302}ng"), slugify("B\u{00F4}ng"));
        assert_eq!(slugify("!!!"), "");
    }
}

//! UK postcode area and prefix rules used to key the warm index.
//!
//! An area is the leading run of one or two letters ("M", "ML", "AB"). Areas
//! are compared exactly; "M" is never a prefix of "ML".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::Metadata;

static AREA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,2}").expect("valid area regex"));

/// Postcode area for a record. Prefers an explicit `postcode_area`, else
/// extracts it from `postcode`. `None` when neither yields letters.
pub fn postcode_area(meta: &Metadata) -> Option<String> {
    if let Some(area) = meta.postcode_area.as_deref() {
        let area = area.trim().to_uppercase();
        if !area.is_empty() {
            return Some(area);
        }
    }
    meta.postcode.as_deref().and_then(area_of)
}

/// Leading 1–2 letter run of an uppercased, trimmed postcode.
pub fn area_of(postcode: &str) -> Option<String> {
    let normalized = postcode.trim().to_uppercase();
    AREA_RE.find(&normalized).map(|m| m.as_str().to_string())
}

/// First two characters of the postcode (legacy prefix lookup).
pub fn postcode_prefix(meta: &Metadata) -> Option<String> {
    let source = meta
        .postcode
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .or(meta.postcode_area.as_deref())?;
    let prefix = normalize_prefix(source);
    (!prefix.is_empty()).then_some(prefix)
}

/// Uppercase, trim and cut to two characters.
pub fn normalize_prefix(raw: &str) -> String {
    raw.trim().to_uppercase().chars().take(2).collect()
}

/// Normalises requested areas: uppercase, trim, drop blanks and duplicates.
///
/// When a single-letter area and a two-letter area starting with the same
/// letter are both requested ("M" and "ML"), the two-letter one is dropped.
pub fn normalize_areas<S: AsRef<str>>(requested: &[S]) -> Vec<String> {
    let mut areas: Vec<String> = Vec::with_capacity(requested.len());
    for raw in requested {
        let area = raw.as_ref().trim().to_uppercase();
        if !area.is_empty() && !areas.contains(&area) {
            areas.push(area);
        }
    }
    let singles: Vec<String> = areas
        .iter()
        .filter(|a| a.chars().count() == 1)
        .cloned()
        .collect();
    areas.retain(|a| {
        a.chars().count() != 2 || !singles.iter().any(|s| a.starts_with(s.as_str()))
    });
    areas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(postcode: Option<&str>, area: Option<&str>) -> Metadata {
        Metadata {
            postcode: postcode.map(str::to_string),
            postcode_area: area.map(str::to_string),
            ..Metadata::default()
        }
    }

    #[test]
    fn area_from_postcode() {
        assert_eq!(area_of("M1 1AA").as_deref(), Some("M"));
        assert_eq!(area_of(" ml1 1aa ").as_deref(), Some("ML"));
        assert_eq!(area_of("AB10 1XG").as_deref(), Some("AB"));
        assert_eq!(area_of("EC1A 1BB").as_deref(), Some("EC"));
        assert_eq!(area_of("12345"), None);
        assert_eq!(area_of(""), None);
    }

    #[test]
    fn explicit_area_wins() {
        assert_eq!(postcode_area(&meta(Some("M1 1AA"), Some(" sk "))).as_deref(), Some("SK"));
        assert_eq!(postcode_area(&meta(Some("M1 1AA"), Some(""))).as_deref(), Some("M"));
        assert_eq!(postcode_area(&meta(None, None)), None);
    }

    #[test]
    fn prefix_is_two_chars() {
        assert_eq!(postcode_prefix(&meta(Some("m1 1aa"), None)).as_deref(), Some("M1"));
        assert_eq!(postcode_prefix(&meta(None, Some("AB"))).as_deref(), Some("AB"));
        assert_eq!(postcode_prefix(&meta(Some("  "), None)), None);
    }

    #[test]
    fn longer_sibling_dropped() {
        assert_eq!(normalize_areas(&["M", "ml"]), vec!["M"]);
        assert_eq!(normalize_areas(&["ML", "M"]), vec!["M"]);
        assert_eq!(normalize_areas(&["ML", "SK"]), vec!["ML", "SK"]);
        assert_eq!(normalize_areas(&[" b ", "B", "", "BS"]), vec!["B"]);
    }
}

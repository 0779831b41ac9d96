/// ARK string assembly and parsing
///
/// Canonical output is always `ark:{naan}/{shoulder}{identifier}`. Input may
/// also use the older `ark:/{naan}/...` form.
use super::codec::{self, NormalizedSuffix};
use std::fmt;

/// Scheme label every ARK starts with
pub const ARK_SCHEME: &str = "ark:";

/// An ARK string split at the NAAN boundary
///
/// The suffix still holds shoulder and identifier together since the shoulder
/// width is a configuration value consumed by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArk<'a> {
    pub naan: &'a str,
    pub suffix: &'a str,
}

/// Why an ARK string could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed(pub String);

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully normalized ARK components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArkParts {
    pub naan: String,
    pub shoulder: String,
    pub identifier: String,
}

impl ArkParts {
    /// Canonical ARK string for these parts
    pub fn ark_string(&self) -> String {
        assemble(&self.naan, &self.shoulder, &self.identifier)
    }
}

/// Compose the canonical ARK string
pub fn assemble(naan: &str, shoulder: &str, identifier: &str) -> String {
    format!("{}{}/{}{}", ARK_SCHEME, naan, shoulder, identifier)
}

/// Split an ARK string into NAAN and the undivided shoulder+identifier suffix
pub fn parse(ark: &str) -> Result<ParsedArk<'_>, Malformed> {
    let rest = ark
        .trim()
        .strip_prefix(ARK_SCHEME)
        .ok_or_else(|| Malformed(format!("{} does not start with {}", ark, ARK_SCHEME)))?;
    let rest = rest.strip_prefix('/').unwrap_or(rest);

    let (naan, suffix) = rest
        .split_once('/')
        .ok_or_else(|| Malformed(format!("{} has no NAAN separator", ark)))?;

    if naan.is_empty() || !naan.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Malformed(format!("{} has an invalid NAAN", ark)));
    }
    if suffix.is_empty() {
        return Err(Malformed(format!("{} has no identifier", ark)));
    }

    Ok(ParsedArk { naan, suffix })
}

/// Parse an ARK string and normalize its suffix through the codec
pub fn parse_normalized(ark: &str, shoulder_length: usize) -> Result<ArkParts, Malformed> {
    let parsed = parse(ark)?;
    let NormalizedSuffix { shoulder, identifier } =
        codec::normalize_resolution_path(parsed.suffix, shoulder_length)
            .map_err(|e| Malformed(e.0))?;

    Ok(ArkParts {
        naan: parsed.naan.to_string(),
        shoulder,
        identifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble() {
        assert_eq!(assemble("99999", "s1", "14b7f127b358"), "ark:99999/s114b7f127b358");
    }

    #[test]
    fn test_parse_both_prefix_forms() {
        let modern = parse("ark:99999/s114b7f127b358").unwrap();
        let legacy = parse("ark:/99999/s114b7f127b358").unwrap();
        assert_eq!(modern, legacy);
        assert_eq!(modern.naan, "99999");
        assert_eq!(modern.suffix, "s114b7f127b358");
    }

    #[test]
    fn test_parse_keeps_suffix_undivided() {
        let parsed = parse("ark:12345/x9eb7b1687-6704-4986-87de-2e992b176ab5").unwrap();
        assert_eq!(parsed.suffix, "x9eb7b1687-6704-4986-87de-2e992b176ab5");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse("99999/s114b7f127b358").is_err());
        assert!(parse("ark:99999").is_err());
        assert!(parse("ark:/99999/").is_err());
        assert!(parse("ark://s114b7f127b358").is_err());
        assert!(parse("ark:99 99/s114b7f127b358").is_err());
    }

    #[test]
    fn test_parse_normalized_is_canonical() {
        let parts = parse_normalized("ark:/99999/s1-14b7-f127-b358", 2).unwrap();
        assert_eq!(parts.ark_string(), "ark:99999/s114b7f127b358");
    }
}

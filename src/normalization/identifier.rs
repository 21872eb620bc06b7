use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

static HEX32: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9a-f]{32}$").expect("static regex"));
static HEX24: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9a-f]{24}$").expect("static regex"));

/// Raised when a legacy identifier is neither 32 nor 24 hex characters once dashes are removed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier format: {raw:?}")]
pub struct InvalidIdentifier {
    pub raw: String,
}

/// Canonical undashed identifier accepted by the target store.
///
/// Built only through [`CanonicalId::parse`] / [`normalize_identifier`], so the inner
/// string is always 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalId {
    hex: String,
    padded: bool,
}

impl CanonicalId {
    /// Normalize a legacy identifier.
    ///
    /// Normalization steps:
    /// - remove every `-` regardless of placement
    /// - 32 hex chars: lowercase and accept
    /// - 24 hex chars (prior id scheme): right-pad with `'0'` to 32
    /// - anything else is rejected
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentifier> {
        let stripped: String = raw.chars().filter(|c| *c != '-').collect();
        if HEX32.is_match(&stripped) {
            return Ok(Self {
                hex: stripped.to_ascii_lowercase(),
                padded: false,
            });
        }
        if HEX24.is_match(&stripped) {
            // Lossy: the padding cannot be told apart from real trailing zeros later.
            let mut hex = stripped.to_ascii_lowercase();
            hex.push_str("00000000");
            return Ok(Self { hex, padded: true });
        }
        Err(InvalidIdentifier {
            raw: raw.to_string(),
        })
    }

    /// The 32-character undashed form.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Whether this id came from a 24-character legacy id and was zero-padded.
    pub fn is_padded(&self) -> bool {
        self.padded
    }

    /// Dashed `8-4-4-4-12` form. Only an inverse of [`CanonicalId::parse`] for
    /// genuine 32-character input; padded ids re-dash to a value that never existed upstream.
    pub fn to_dashed(&self) -> String {
        to_dashed(&self.hex).unwrap_or_else(|| self.hex.clone())
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// `None` in, `None` out: "no identifier supplied" is not the same failure as a malformed one.
pub fn normalize_identifier(raw: Option<&str>) -> Result<Option<CanonicalId>, InvalidIdentifier> {
    raw.map(CanonicalId::parse).transpose()
}

/// Restore dashes on a 32-hex undashed identifier.
pub fn to_dashed(undashed: &str) -> Option<String> {
    if !HEX32.is_match(undashed) {
        return None;
    }
    Uuid::try_parse(undashed)
        .ok()
        .map(|u| u.hyphenated().to_string())
}

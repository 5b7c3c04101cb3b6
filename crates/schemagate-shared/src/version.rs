//! Version tags.
//!
//! Script file names and application versions both carry a leading
//! `MAJOR.MINOR.PATCH` triple, optionally prefixed with `v` and followed by
//! free text (`v2.17.3-fk-constraints`).  Only the triple takes part in
//! ordering; pre-release and build suffixes are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

pub use semver::Version;

use crate::error::VersionError;

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?(\d+\.\d+\.\d+)").expect("static version regex"));

/// Extract the `MAJOR.MINOR.PATCH` prefix of a tag, or `None` if the tag does
/// not start with one.
pub fn extract_version(tag: &str) -> Option<&str> {
    TAG_RE
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extract and parse the version triple of a tag.
pub fn parse_tag(tag: &str) -> Result<Version, VersionError> {
    let raw = extract_version(tag).ok_or_else(|| VersionError::InvalidTag(tag.to_string()))?;
    Version::parse(raw).map_err(|e| VersionError::Malformed {
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

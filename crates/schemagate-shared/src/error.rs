use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version tag {0:?}: expected a version like v1.2.3")]
    InvalidTag(String),

    #[error("Invalid semantic version {value:?}: {reason}")]
    Malformed { value: String, reason: String },
}

//! # schemagate-shared
//!
//! Types and helpers shared by the migration engine and the process that
//! drives it: version-tag parsing, migration direction, and the file and
//! table names both sides agree on.

pub mod constants;
pub mod error;
pub mod types;
pub mod version;

pub use error::VersionError;
pub use types::Direction;
pub use version::{extract_version, parse_tag, Version};

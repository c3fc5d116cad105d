pub mod access_log;
pub mod access_rule;
pub mod build_log;
pub mod document;

pub use access_log::{AccessLog, CredentialType};
pub use access_rule::{normalize_email, AccessMode, AccessRule, AllowlistEntry, Visibility};
pub use build_log::{BuildKind, BuildLog, BuildStatus, BuildTrigger};
pub use document::DocumentArtifact;

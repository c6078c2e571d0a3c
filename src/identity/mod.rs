//! User identity, credentials, and server-side sessions.
//!
//! The rest of the crate treats this module as the credential authority:
//! it owns password hashes, the per-user security profile (MFA policy flags
//! and failure counters), and session issuance. Raw session tokens are only
//! ever returned to set the cookie; the database stores a SHA-256 hash.

pub mod models;
pub mod provider;

pub use models::{LoginRecord, SecurityProfile, SessionRecord};
pub use provider::{CredentialProvider, SignupOutcome};

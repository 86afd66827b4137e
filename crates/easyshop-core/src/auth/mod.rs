//! Authentication module for managing the user session and its credential.
//!
//! This module provides:
//! - `CredentialStore`: durable storage for the single bearer credential
//! - `Claims`: client-side decoding of the credential's claims segment
//! - `SessionManager`: the in-memory session, login/logout and role checks
//!
//! The session is a cached projection of the stored credential. It is
//! refreshed at startup, on login and logout, on a periodic expiry check and
//! when the gateway reports that the server rejected the credential.

pub mod claims;
pub mod credentials;
pub mod session;

pub use claims::{Claims, ClaimsError, ADMIN_ROLE, DEFAULT_ROLE};
pub use credentials::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
pub use session::{AuthOutcome, Identity, Session, SessionManager};

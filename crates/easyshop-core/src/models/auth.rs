use serde::{Deserialize, Serialize};

/// Body of `/auth/login` and `/auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response of `/auth/login`.
///
/// Every field is optional on the wire so a malformed response is reported
/// as such instead of as a JSON error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    pub token: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl LoginResponse {
    /// The issued credential, ignoring empty strings.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

//! Navigation hook used by the gateway when a session is invalidated.
//!
//! The gateway never renders anything itself. When the server rejects the
//! bearer credential it asks the front end, through a `Navigator`, to move the
//! user to the account view unless they are already there.

use std::sync::Mutex;

use tracing::debug;

/// Location of the account (login/registration) view.
pub const ACCOUNT_LOCATION: &str = "/account";

/// Location the front end starts on.
pub const HOME_LOCATION: &str = "/";

pub trait Navigator: Send + Sync {
    /// Where the user currently is.
    fn current_location(&self) -> String;

    /// Move the user to `location`.
    fn navigate_to(&self, location: &str);
}

/// Navigator that only tracks the current location in memory.
///
/// Suitable for front ends without a router (the CLI) and for tests.
#[derive(Debug)]
pub struct TrackingNavigator {
    location: Mutex<String>,
}

impl TrackingNavigator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(location.into()),
        }
    }
}

impl Default for TrackingNavigator {
    fn default() -> Self {
        Self::new(HOME_LOCATION)
    }
}

impl Navigator for TrackingNavigator {
    fn current_location(&self) -> String {
        match self.location.lock() {
            Ok(location) => location.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn navigate_to(&self, location: &str) {
        debug!(location, "Navigating");
        let mut current = match self.location.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = location.to_string();
    }
}

use std::fmt;

/// An authenticated session. Passed explicitly to whatever makes backend calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    /// Returns `None` for a blank token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(Self { token })
        }
    }

    /// Value of the `Authorization` header the backend expects.
    pub fn authorization(&self) -> String {
        format!("Token {}", self.token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"***").finish()
    }
}

//! Authentication requirements for remote functions.
//!
//! A module may declare a default requirement that every function inherits
//! unless the function declares its own.

/// Authentication requirement for a remote function.
///
/// Determines whether a caller must present a token when invoking the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AuthMode {
    /// No token is sent or checked.
    #[default]
    None,

    /// A token is sent when the client has one; the server accepts anonymous calls.
    Optional,

    /// Calls without a valid token are rejected.
    Required,
}

impl AuthMode {
    /// Parse an authentication mode from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(AuthMode::None),
            "optional" => Some(AuthMode::Optional),
            "required" => Some(AuthMode::Required),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Optional => "optional",
            AuthMode::Required => "required",
        }
    }

    /// Picks the function's own mode, falling back to the module default.
    pub fn effective(own: Option<AuthMode>, module_default: Option<AuthMode>) -> AuthMode {
        own.or(module_default).unwrap_or_default()
    }
}

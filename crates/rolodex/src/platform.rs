//! Injected platform capabilities.
//!
//! The system dialer, the runtime permission prompt, and the device contact
//! directory are facilities the core only consumes. Each is modeled as a
//! trait handed explicitly to the session that needs it — never an ambient
//! handle — so tests substitute scripted fakes.

use async_trait::async_trait;

use crate::error::Result;

/// Runtime permissions a session may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Place phone calls directly through the dialer.
    PlaceCalls,
    /// Read the device contact directory.
    ReadContacts,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlaceCalls => write!(f, "place_calls"),
            Self::ReadContacts => write!(f, "read_contacts"),
        }
    }
}

/// The user's answer to a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    /// Permission granted.
    Granted,
    /// Permission denied. Consumers must treat this as durable for the
    /// current screen instance and not re-prompt on every render.
    Denied,
}

impl PermissionDecision {
    /// Check whether this decision grants the permission.
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// An entry from the device contact directory: a display name and a phone
/// number, with no unique id guarantee beyond what the directory provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContact {
    /// The directory's display name for the entry.
    pub display_name: String,
    /// The entry's phone number.
    pub number: String,
}

/// Asynchronous runtime permission prompt.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    /// Ask the user for a permission and wait for the decision.
    async fn request(&self, permission: Permission) -> PermissionDecision;
}

/// The system dialer / call-intent facility.
///
/// Both methods take the phone number string verbatim; the core does not
/// validate number format.
pub trait Dialer: Send + Sync {
    /// Place a call directly. Only reachable through a session once the call
    /// permission was granted.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to dispatch the call.
    fn place_call(&self, number: &str) -> Result<()>;

    /// Open the system dial screen pre-filled with `number`. Requires no
    /// permission.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to open the dial screen.
    fn open_dial_screen(&self, number: &str) -> Result<()>;
}

/// The read-only device contact directory.
pub trait DeviceDirectory: Send + Sync {
    /// All directory entries, ascending by display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    fn list(&self) -> Result<Vec<DeviceContact>>;
}

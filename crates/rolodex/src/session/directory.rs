//! The device-directory screen session: browse system contacts read-only.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::platform::{DeviceContact, DeviceDirectory, Permission, PermissionPrompt};
use crate::search;

use super::{PermissionGate, PermissionState};

/// What the directory screen displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryView {
    /// The directory entries matching the current query. Empty when the
    /// read permission is denied or nothing matches.
    pub entries: Vec<DeviceContact>,
    /// Where the read permission stands for this screen instance.
    pub permission: PermissionState,
}

/// State holder for the device contact directory screen.
///
/// The directory itself is an external, read-only collaborator; this session
/// only requests the read permission (at most once; a denial is durable),
/// caches the listed entries, and applies the search filter. Denied access
/// and empty results are explicit view states, not errors.
pub struct DirectorySession {
    directory: Arc<dyn DeviceDirectory>,
    gate: PermissionGate,
    entries: Vec<DeviceContact>,
    query: String,
}

impl DirectorySession {
    /// Create a directory session. Nothing is loaded or prompted until the
    /// first [`refresh`](Self::refresh).
    #[must_use]
    pub fn new(directory: Arc<dyn DeviceDirectory>, prompt: Arc<dyn PermissionPrompt>) -> Self {
        Self {
            directory,
            gate: PermissionGate::new(Permission::ReadContacts, prompt),
            entries: Vec::new(),
            query: String::new(),
        }
    }

    /// Resolve the read permission (prompting at most once) and reload the
    /// entries when granted. The directory yields entries ascending by
    /// display name; they are cached as delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the granted directory read fails.
    pub async fn refresh(&mut self) -> Result<DirectoryView> {
        match self.gate.ensure().await {
            PermissionState::Granted => {
                self.entries = self.directory.list()?;
                debug!(count = self.entries.len(), "Loaded device directory");
            }
            _ => {
                self.entries.clear();
            }
        }
        Ok(self.view())
    }

    /// Mutate the search query; [`view`](Self::view) reflects it right away.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// The current search query.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The current view: cached entries filtered by the query, plus the
    /// permission state.
    #[must_use]
    pub fn view(&self) -> DirectoryView {
        DirectoryView {
            entries: search::filter_directory(&self.entries, &self.query),
            permission: self.gate.state(),
        }
    }
}

impl std::fmt::Debug for DirectorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySession")
            .field("entries", &self.entries.len())
            .field("query", &self.query)
            .field("permission", &self.gate.state())
            .finish_non_exhaustive()
    }
}

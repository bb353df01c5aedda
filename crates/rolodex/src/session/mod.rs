//! Presentation state holders.
//!
//! A session owns what one screen displays: it subscribes to the store's
//! live queries, folds in transient input such as search text, republishes a
//! merged view, and translates user intents into store mutations. A session
//! lives for the screen's visible lifetime; dropping it releases its
//! subscriptions while in-flight mutations issued by the caller run to
//! completion.

mod detail;
mod dialer;
mod directory;
mod list;

pub use detail::{DetailSession, DetailView};
pub use dialer::DialerSession;
pub use directory::{DirectorySession, DirectoryView};
pub use list::{ListMode, ListSession, ListView};

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use crate::platform::{Permission, PermissionPrompt};

/// Whether a list screen is showing settled results or recomputing a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    /// Showing the latest list.
    #[default]
    Idle,
    /// Search text just changed; the filtered result is pending.
    Searching,
}

/// How far a session has gotten with a runtime permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// The user has not been asked yet.
    #[default]
    NotRequested,
    /// Granted for this session instance.
    Granted,
    /// Denied. Durable for this session instance; the user must act outside
    /// the app, we never re-prompt automatically.
    Denied,
}

/// Result of a call intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call was dispatched to the platform dialer.
    CallPlaced,
    /// The system dial screen was opened pre-filled with the number.
    DialScreenOpened,
    /// Call permission is denied; nothing was dispatched.
    PermissionDenied,
    /// There was no number to dial (empty pad, or the record is gone).
    NothingToDial,
}

/// Lock a state mutex, recovering the data from a poisoned lock.
pub(crate) fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Prompt-once permission tracking shared by the call and directory flows.
///
/// The first [`ensure`](Self::ensure) prompts the user; every later call
/// returns the recorded decision without prompting again. Sessions issue one
/// intent at a time, so concurrent `ensure` calls are not a supported path;
/// if they do race, the first recorded decision wins.
pub(crate) struct PermissionGate {
    permission: Permission,
    prompt: Arc<dyn PermissionPrompt>,
    state: StdMutex<PermissionState>,
}

impl PermissionGate {
    pub(crate) fn new(permission: Permission, prompt: Arc<dyn PermissionPrompt>) -> Self {
        Self {
            permission,
            prompt,
            state: StdMutex::new(PermissionState::NotRequested),
        }
    }

    /// The recorded state, without prompting.
    pub(crate) fn state(&self) -> PermissionState {
        *lock(&self.state)
    }

    /// Resolve the permission, prompting the user at most once. Returns
    /// `Granted` or `Denied`, never `NotRequested`.
    pub(crate) async fn ensure(&self) -> PermissionState {
        let current = self.state();
        if current != PermissionState::NotRequested {
            return current;
        }

        let decision = self.prompt.request(self.permission).await;
        let mut state = lock(&self.state);
        if *state == PermissionState::NotRequested {
            *state = if decision.is_granted() {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
        }
        *state
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("permission", &self.permission)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

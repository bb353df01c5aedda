//! The detail screen session: one record, plus call and delete actions.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::contact::Contact;
use crate::error::Result;
use crate::platform::{Dialer, Permission, PermissionPrompt};
use crate::store::ContactStore;

use super::{lock, CallOutcome, PermissionGate, PermissionState};

/// What the detail screen displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    /// The watched record; `None` once deleted.
    pub contact: Option<Contact>,
    /// Where the call permission stands for this screen instance.
    pub permission: PermissionState,
}

/// State holder for a single contact's detail screen.
///
/// Watches the record through the store's by-id stream and dispatches call
/// intents through the injected dialer capability. A denied call permission
/// is durable for this session; the user is never re-prompted automatically.
pub struct DetailSession {
    store: ContactStore,
    id: i64,
    view_tx: Arc<watch::Sender<DetailView>>,
    record_rx: watch::Receiver<Option<Contact>>,
    pending: Arc<StdMutex<Option<bool>>>,
    gate: Arc<PermissionGate>,
    dialer: Arc<dyn Dialer>,
    task: JoinHandle<()>,
}

impl DetailSession {
    /// Open a session for the record with the given id and spawn its watch
    /// task. The record may be absent; the view then starts out empty.
    ///
    /// # Errors
    ///
    /// Returns an error if subscribing to the record fails.
    pub async fn open(
        store: ContactStore,
        id: i64,
        dialer: Arc<dyn Dialer>,
        prompt: Arc<dyn PermissionPrompt>,
    ) -> Result<Self> {
        let record_rx = store.contact(id).await?;
        let pending = Arc::new(StdMutex::new(None));
        let gate = Arc::new(PermissionGate::new(Permission::PlaceCalls, prompt));

        let initial = DetailView {
            contact: record_rx.borrow().clone(),
            permission: gate.state(),
        };
        let view_tx = Arc::new(watch::channel(initial).0);

        let task = tokio::spawn(watch_record(
            record_rx.clone(),
            Arc::clone(&view_tx),
            Arc::clone(&pending),
            Arc::clone(&gate),
        ));

        Ok(Self {
            store,
            id,
            view_tx,
            record_rx,
            pending,
            gate,
            dialer,
            task,
        })
    }

    /// Subscribe to the view.
    #[must_use]
    pub fn view(&self) -> watch::Receiver<DetailView> {
        self.view_tx.subscribe()
    }

    /// Where the call permission stands, without prompting.
    #[must_use]
    pub fn permission(&self) -> PermissionState {
        self.gate.state()
    }

    /// Toggle the record's favorite flag.
    ///
    /// Same optimistic two-phase contract as the list session: the flipped
    /// flag is published immediately, written back as a full-record update,
    /// reconciled against the store's next emission, and rolled back if the
    /// write fails. A no-op when the record is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read or write fails.
    pub async fn toggle_favorite(&self) -> Result<()> {
        let Some(current) = self.store.get(self.id).await? else {
            debug!(id = self.id, "Toggle on absent contact ignored");
            return Ok(());
        };

        let target = {
            let mut pending = lock(&self.pending);
            let effective = pending.unwrap_or(current.is_favorite);
            let target = !effective;
            *pending = Some(target);
            target
        };
        self.republish();

        match self.store.update(&current.with_favorite(target)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                *lock(&self.pending) = None;
                self.republish();
                Err(err)
            }
        }
    }

    /// Delete the watched record. The view reports absent once the store's
    /// emission arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn delete(&self) -> Result<usize> {
        self.store.delete(self.id).await
    }

    /// Place a call to the record's number.
    ///
    /// Prompts for the call permission on first use; a denial sticks for the
    /// lifetime of this session and yields [`CallOutcome::PermissionDenied`]
    /// without prompting again. The number is passed to the dialer verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform dialer fails to dispatch.
    pub async fn call(&self) -> Result<CallOutcome> {
        let number = self.record_rx.borrow().as_ref().map(|c| c.address.clone());
        let Some(number) = number else {
            return Ok(CallOutcome::NothingToDial);
        };

        let outcome = match self.gate.ensure().await {
            PermissionState::Granted => {
                self.dialer.place_call(&number)?;
                CallOutcome::CallPlaced
            }
            _ => CallOutcome::PermissionDenied,
        };
        self.republish();
        Ok(outcome)
    }

    /// Open the system dial screen pre-filled with the record's number. No
    /// permission involved.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to open the dial screen.
    pub fn open_dial_screen(&self) -> Result<CallOutcome> {
        let number = self.record_rx.borrow().as_ref().map(|c| c.address.clone());
        let Some(number) = number else {
            return Ok(CallOutcome::NothingToDial);
        };

        self.dialer.open_dial_screen(&number)?;
        Ok(CallOutcome::DialScreenOpened)
    }

    fn republish(&self) {
        let record = self.record_rx.borrow().clone();
        let view = compose(record, &self.pending, &self.gate);
        self.view_tx.send_replace(view);
    }
}

impl Drop for DetailSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for DetailSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailSession")
            .field("id", &self.id)
            .field("permission", &self.gate.state())
            .finish_non_exhaustive()
    }
}

/// Track the record stream: settle the pending flag once the store caught
/// up, then republish.
async fn watch_record(
    mut record_rx: watch::Receiver<Option<Contact>>,
    view_tx: Arc<watch::Sender<DetailView>>,
    pending: Arc<StdMutex<Option<bool>>>,
    gate: Arc<PermissionGate>,
) {
    while record_rx.changed().await.is_ok() {
        let record = record_rx.borrow_and_update().clone();
        {
            let mut pending = lock(&pending);
            if let Some(flag) = *pending {
                let settled = match &record {
                    Some(c) => c.is_favorite == flag,
                    None => true,
                };
                if settled {
                    *pending = None;
                }
            }
        }
        let view = compose(record, &pending, &gate);
        view_tx.send_replace(view);
    }
}

/// Apply the optimistic flag to the record and wrap it with the permission
/// state.
fn compose(
    record: Option<Contact>,
    pending: &StdMutex<Option<bool>>,
    gate: &PermissionGate,
) -> DetailView {
    let mut contact = record;
    if let (Some(c), Some(flag)) = (contact.as_mut(), *lock(pending)) {
        c.is_favorite = flag;
    }
    DetailView {
        contact,
        permission: gate.state(),
    }
}

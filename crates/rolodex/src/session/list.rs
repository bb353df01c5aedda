//! The list screen session: live contact list merged with search input.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::contact::Contact;
use crate::error::Result;
use crate::search;
use crate::store::ContactStore;

use super::{lock, SearchState};

/// Which list screen this session backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// The main screen: every contact.
    All,
    /// The favorites screen: the same source list restricted to favorites
    /// before the search filter runs.
    Favorites,
}

/// What a list screen displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    /// The contacts to render, already restricted and filtered.
    pub contacts: Vec<Contact>,
    /// The search text the list was computed against.
    pub search_text: String,
    /// Idle once the filtered result has been published.
    pub state: SearchState,
}

/// State holder for the main and favorites list screens.
///
/// Subscribes to the store's all-contacts stream and to its own search-text
/// input, and republishes the merged view through [`Self::view`]. The
/// favorite toggle is optimistic: the flipped flag is visible in the view
/// immediately and reconciled against the store's next emission.
#[derive(Debug)]
pub struct ListSession {
    store: ContactStore,
    mode: ListMode,
    view_tx: Arc<watch::Sender<ListView>>,
    search_tx: watch::Sender<String>,
    source_rx: watch::Receiver<Vec<Contact>>,
    pending: Arc<StdMutex<HashMap<i64, bool>>>,
    task: JoinHandle<()>,
}

impl ListSession {
    /// Create a session and spawn its merge task. Must be called within a
    /// tokio runtime.
    #[must_use]
    pub fn new(store: ContactStore, mode: ListMode, debounce: Duration) -> Self {
        let source_rx = store.all_contacts();
        let (search_tx, search_rx) = watch::channel(String::new());
        let pending = Arc::new(StdMutex::new(HashMap::new()));

        let initial = {
            let overlay = lock(&pending);
            compose_view(&source_rx.borrow(), &overlay, mode, "", SearchState::Idle)
        };
        let view_tx = Arc::new(watch::channel(initial).0);

        let task = tokio::spawn(merge_loop(
            source_rx.clone(),
            search_rx,
            Arc::clone(&view_tx),
            Arc::clone(&pending),
            mode,
            debounce,
        ));

        Self {
            store,
            mode,
            view_tx,
            search_tx,
            source_rx,
            pending,
            task,
        }
    }

    /// Subscribe to the merged view.
    #[must_use]
    pub fn view(&self) -> watch::Receiver<ListView> {
        self.view_tx.subscribe()
    }

    /// Mutate the search text. The view transitions to `Searching` and back
    /// to `Idle` once the filtered result is published.
    pub fn set_search_text(&self, text: impl Into<String>) {
        self.search_tx.send_replace(text.into());
    }

    /// Insert a new contact. Returns the assigned id, or `None` when an
    /// existing id collided and the insert was ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn save(&self, contact: &Contact) -> Result<Option<i64>> {
        self.store.insert(contact).await
    }

    /// Replace a contact's fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn update(&self, contact: &Contact) -> Result<usize> {
        self.store.update(contact).await
    }

    /// Delete a contact by id. An unknown id is a no-op returning 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn delete(&self, id: i64) -> Result<usize> {
        self.store.delete(id).await
    }

    /// Toggle a contact's favorite flag.
    ///
    /// Read-modify-write against the store: the current record is read, the
    /// flag flipped, and the full record written back. The flipped flag is
    /// published optimistically before the write lands; on write failure it
    /// is rolled back and the error propagates. Toggling an absent id is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read or write fails.
    pub async fn toggle_favorite(&self, id: i64) -> Result<()> {
        let Some(current) = self.store.get(id).await? else {
            debug!(id, "Toggle on absent contact ignored");
            return Ok(());
        };

        let target = {
            let mut overlay = lock(&self.pending);
            let effective = overlay.get(&id).copied().unwrap_or(current.is_favorite);
            let target = !effective;
            overlay.insert(id, target);
            target
        };
        self.republish();

        match self.store.update(&current.with_favorite(target)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                lock(&self.pending).remove(&id);
                self.republish();
                Err(err)
            }
        }
    }

    /// Recompute the view from the latest source snapshot, keeping the
    /// current search state.
    fn republish(&self) {
        let list = self.source_rx.borrow().clone();
        let query = self.search_tx.borrow().clone();
        let state = self.view_tx.borrow().state;
        let view = {
            let overlay = lock(&self.pending);
            compose_view(&list, &overlay, self.mode, &query, state)
        };
        self.view_tx.send_replace(view);
    }
}

impl Drop for ListSession {
    fn drop(&mut self) {
        // releases the store subscription; mutations in flight are the
        // caller's futures and keep running
        self.task.abort();
    }
}

/// Merge store emissions and search input into the published view.
async fn merge_loop(
    mut source: watch::Receiver<Vec<Contact>>,
    mut search: watch::Receiver<String>,
    view_tx: Arc<watch::Sender<ListView>>,
    pending: Arc<StdMutex<HashMap<i64, bool>>>,
    mode: ListMode,
    debounce: Duration,
) {
    loop {
        tokio::select! {
            changed = source.changed() => {
                if changed.is_err() {
                    break;
                }
                let list = source.borrow_and_update().clone();
                reconcile(&pending, &list);
                let query = search.borrow().clone();
                let view = {
                    let overlay = lock(&pending);
                    compose_view(&list, &overlay, mode, &query, SearchState::Idle)
                };
                view_tx.send_replace(view);
            }
            changed = search.changed() => {
                if changed.is_err() {
                    break;
                }
                // Idle -> Searching: keep showing the previous contacts
                // while the recompute is pending
                {
                    let query = search.borrow_and_update().clone();
                    let previous = view_tx.borrow().contacts.clone();
                    view_tx.send_replace(ListView {
                        contacts: previous,
                        search_text: query,
                        state: SearchState::Searching,
                    });
                }

                if !debounce.is_zero() {
                    tokio::time::sleep(debounce).await;
                }

                // Searching -> Idle with the filtered result, computed
                // against whatever text and list are latest by now
                let query = search.borrow_and_update().clone();
                let list = source.borrow().clone();
                let view = {
                    let overlay = lock(&pending);
                    compose_view(&list, &overlay, mode, &query, SearchState::Idle)
                };
                view_tx.send_replace(view);
            }
        }
    }
}

/// Drop pending favorite flags the store has caught up with (or whose
/// record vanished); keep only the ones a write is still in flight for.
fn reconcile(pending: &StdMutex<HashMap<i64, bool>>, source: &[Contact]) {
    let mut pending = lock(pending);
    pending.retain(|id, flag| match source.iter().find(|c| c.id == Some(*id)) {
        Some(c) => c.is_favorite != *flag,
        None => false,
    });
}

/// Apply the optimistic overlay, restrict per mode, filter, and wrap.
fn compose_view(
    source: &[Contact],
    overlay: &HashMap<i64, bool>,
    mode: ListMode,
    query: &str,
    state: SearchState,
) -> ListView {
    let mut contacts: Vec<Contact> = source.to_vec();
    if !overlay.is_empty() {
        for contact in &mut contacts {
            if let Some(flag) = contact.id.and_then(|id| overlay.get(&id)) {
                contact.is_favorite = *flag;
            }
        }
    }

    let contacts = match mode {
        ListMode::All => search::filter(&contacts, query),
        ListMode::Favorites => search::filter_favorites(&contacts, query),
    };

    ListView {
        contacts,
        search_text: query.to_string(),
        state,
    }
}

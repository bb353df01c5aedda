//! The contact record.
//!
//! This module defines the sole entity the store persists: a contact with a
//! name, a phone number, and a favorite flag.

use serde::{Deserialize, Serialize};

/// A single contact record.
///
/// `id` is `None` until the store assigns one on insert. Once assigned, the
/// id is unique and stable for the lifetime of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Unique identifier, assigned by the store on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Given name; also the default sort key for list queries.
    pub first_name: String,

    /// Family name.
    pub last_name: String,

    /// Phone number. Passed verbatim to dial actions, never validated.
    pub address: String,

    /// Favorite flag, mutable independently of the other fields.
    pub is_favorite: bool,
}

impl Contact {
    /// Create a new, not-yet-stored contact. The favorite flag starts false.
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            address: address.into(),
            is_favorite: false,
        }
    }

    /// Return a copy of this contact carrying an explicit id.
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Return a copy of this contact with the favorite flag set to `flag`.
    ///
    /// This is the full-record copy used by read-modify-write toggling; all
    /// other fields are carried over unchanged.
    #[must_use]
    pub fn with_favorite(mut self, flag: bool) -> Self {
        self.is_favorite = flag;
        self
    }

    /// The name shown in lists: first and last name joined, trimmed when
    /// either part is empty.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

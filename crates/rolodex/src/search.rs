//! Search filtering over contact lists.
//!
//! Pure functions of a source list and a search string: no state, no I/O.
//! Sessions re-run these whenever either input changes. Matching is
//! case-insensitive substring containment over the first name, last name,
//! and phone number; an empty search string matches everything.

use crate::contact::Contact;
use crate::platform::DeviceContact;

/// Check whether `contact` matches `query`.
///
/// An empty query matches every contact. Matching is substring containment,
/// not prefix and not fuzzy.
#[must_use]
pub fn matches(contact: &Contact, query: &str) -> bool {
    contains_ignore_case(&contact.first_name, query)
        || contains_ignore_case(&contact.last_name, query)
        || contains_ignore_case(&contact.address, query)
}

/// Filter `contacts` down to the entries matching `query`, preserving order.
#[must_use]
pub fn filter(contacts: &[Contact], query: &str) -> Vec<Contact> {
    contacts
        .iter()
        .filter(|c| matches(c, query))
        .cloned()
        .collect()
}

/// Favorites variant: restrict to favorite contacts first, then apply the
/// same substring filter.
#[must_use]
pub fn filter_favorites(contacts: &[Contact], query: &str) -> Vec<Contact> {
    contacts
        .iter()
        .filter(|c| c.is_favorite)
        .filter(|c| matches(c, query))
        .cloned()
        .collect()
}

/// Check whether a device-directory entry matches `query`.
#[must_use]
pub fn matches_directory(entry: &DeviceContact, query: &str) -> bool {
    contains_ignore_case(&entry.display_name, query) || contains_ignore_case(&entry.number, query)
}

/// Filter device-directory entries down to those matching `query`.
#[must_use]
pub fn filter_directory(entries: &[DeviceContact], query: &str) -> Vec<DeviceContact> {
    entries
        .iter()
        .filter(|e| matches_directory(e, query))
        .cloned()
        .collect()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

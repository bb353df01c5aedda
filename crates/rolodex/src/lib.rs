//! `rolodex` - an embeddable contacts data core with live queries
//!
//! This library provides the logic behind a contacts app: a `SQLite`-backed
//! store whose query results are republished on every write, a pure search
//! filter, and per-screen session types that merge the two and drive
//! mutations. Platform facilities (dialer, permission prompts, the device
//! contact directory) are injected capability traits, not ambient handles.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod config;
pub mod contact;
pub mod error;
pub mod logging;
pub mod platform;
pub mod search;
pub mod session;
pub mod store;

pub use config::Config;
pub use contact::Contact;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use store::ContactStore;

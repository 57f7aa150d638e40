//! Contact directory backed by a JSON file.

pub mod fuzzy;
pub mod manager;

pub use manager::{Contact, ContactsManager};

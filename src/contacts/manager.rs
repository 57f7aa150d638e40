//! Contact manager - load contacts from JSON and look them up by handle or name.
//!
//! CHANGELOG:
//! - 10/16/2026 - Contacts carry an id and several handles; canonical handle index
//! - 10/16/2026 - Implements ContactDirectory for the thread merger
//! - 01/10/2026 - Added fuzzy matching with score threshold
//! - 01/10/2026 - Initial stub

use super::fuzzy;
use crate::error::Result;
use crate::identity::handle::canonical_handle;
use crate::threads::{ContactDirectory, ContactRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A contact from the contacts file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Stable id from the owning application. Defaults to the name.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub handles: Vec<String>,
    /// Single-number form used by older contacts files.
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub relationship_type: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Contact {
    pub fn contact_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    /// Every handle, including the legacy `phone` field.
    pub fn all_handles(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(String::as_str).chain(self.phone.as_deref())
    }

    fn to_ref(&self) -> ContactRef {
        ContactRef {
            id: self.contact_id().to_string(),
            name: self.name.clone(),
        }
    }
}

/// Wrapper for contacts.json format (has "contacts" key).
#[derive(Debug, Deserialize)]
struct ContactsFile {
    contacts: Vec<Contact>,
}

/// Manages contacts loaded from JSON file.
#[derive(Debug, Default)]
pub struct ContactsManager {
    contacts: Vec<Contact>,
    /// canonical handle -> index into `contacts`
    by_handle: HashMap<String, usize>,
}

impl ContactsManager {
    /// Load contacts from a JSON file.
    ///
    /// Supports both formats:
    /// - `{"contacts": [...]}`
    /// - `[...]` (flat array)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        // Try wrapped format first ({"contacts": [...]})
        if let Ok(wrapper) = serde_json::from_str::<ContactsFile>(content) {
            return Ok(Self::new(wrapper.contacts));
        }
        let contacts: Vec<Contact> = serde_json::from_str(content)?;
        Ok(Self::new(contacts))
    }

    pub fn new(contacts: Vec<Contact>) -> Self {
        let mut by_handle = HashMap::new();
        for (index, contact) in contacts.iter().enumerate() {
            for handle in contact.all_handles() {
                let key = canonical_handle(handle);
                if let Some(previous) = by_handle.insert(key.clone(), index) {
                    if previous != index {
                        tracing::warn!(
                            handle = %key,
                            first = %contacts[previous].name,
                            second = %contact.name,
                            "handle assigned to two contacts, keeping the later one"
                        );
                    }
                }
            }
        }
        Self { contacts, by_handle }
    }

    /// Create an empty manager (for when contacts aren't available).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get all contacts.
    pub fn all(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Find a contact by name (exact, case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&Contact> {
        let name_lower = name.to_lowercase();
        self.contacts
            .iter()
            .find(|c| c.name.to_lowercase() == name_lower)
    }

    /// Find a contact by any spelling of one of its handles.
    pub fn find_by_handle(&self, handle: &str) -> Option<&Contact> {
        self.by_handle
            .get(&canonical_handle(handle))
            .and_then(|&i| self.contacts.get(i))
    }

    /// Find contact with fuzzy matching.
    ///
    /// Order of matching:
    /// 1. Exact name match
    /// 2. Partial name match (name contains query)
    /// 3. Fuzzy match with score >= 0.85
    pub fn find_fuzzy(&self, name: &str) -> Option<&Contact> {
        if let Some(contact) = self.find_by_name(name) {
            return Some(contact);
        }

        let name_lower = name.to_lowercase();
        if let Some(contact) = self
            .contacts
            .iter()
            .find(|c| c.name.to_lowercase().contains(&name_lower))
        {
            return Some(contact);
        }

        let mut best_match: Option<(&Contact, f64)> = None;
        for contact in &self.contacts {
            let result = fuzzy::multi_match(name, &contact.name);
            if result.score >= fuzzy::DEFAULT_THRESHOLD
                && best_match.map_or(true, |(_, score)| result.score > score)
            {
                best_match = Some((contact, result.score));
            }
        }
        best_match.map(|(c, _)| c)
    }

    /// Resolve a contact query: a handle first, then a name.
    pub fn resolve(&self, name_or_handle: &str) -> Option<&Contact> {
        self.find_by_handle(name_or_handle)
            .or_else(|| self.find_fuzzy(name_or_handle))
    }
}

impl ContactDirectory for ContactsManager {
    fn contact_for(&self, handle: &str) -> Option<ContactRef> {
        self.find_by_handle(handle).map(Contact::to_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTACTS: &str = r#"{
        "contacts": [
            {
                "id": "c-madison",
                "name": "Madison Clarke",
                "handles": ["(415) 555-1234", "Madison@iCloud.com"],
                "relationship_type": "client"
            },
            {
                "name": "Oliver Grant",
                "phone": "+1 415 555 0000"
            }
        ]
    }"#;

    #[test]
    fn test_wrapped_and_flat_formats() {
        let wrapped = ContactsManager::from_json(CONTACTS).unwrap();
        assert_eq!(wrapped.len(), 2);

        let flat = ContactsManager::from_json(r#"[{"name": "A", "handles": ["a@b.co"]}]"#).unwrap();
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn test_lookup_by_any_handle_spelling() {
        let contacts = ContactsManager::from_json(CONTACTS).unwrap();
        for handle in ["+14155551234", "tel:4155551234", "madison@icloud.com"] {
            let c = contacts.find_by_handle(handle).unwrap();
            assert_eq!(c.contact_id(), "c-madison");
        }
    }

    #[test]
    fn test_legacy_phone_field_and_default_id() {
        let contacts = ContactsManager::from_json(CONTACTS).unwrap();
        let oliver = contacts.find_by_handle("+14155550000").unwrap();
        assert_eq!(oliver.contact_id(), "Oliver Grant");
    }

    #[test]
    fn test_directory_returns_ref() {
        let contacts = ContactsManager::from_json(CONTACTS).unwrap();
        let r = contacts.contact_for("+14155551234").unwrap();
        assert_eq!(r.id, "c-madison");
        assert_eq!(r.name, "Madison Clarke");
        assert!(contacts.contact_for("+19995550000").is_none());
    }

    #[test]
    fn test_resolve_name_or_handle() {
        let contacts = ContactsManager::from_json(CONTACTS).unwrap();
        assert_eq!(contacts.resolve("madison").unwrap().name, "Madison Clarke");
        assert_eq!(contacts.resolve("Clarke Madison").unwrap().name, "Madison Clarke");
        assert_eq!(contacts.resolve("415-555-0000").unwrap().name, "Oliver Grant");
        assert!(contacts.resolve("Nobody Here").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(&path, CONTACTS).unwrap();
        assert_eq!(ContactsManager::load(&path).unwrap().len(), 2);
        assert!(ContactsManager::load(dir.path().join("missing.json")).is_err());
    }
}

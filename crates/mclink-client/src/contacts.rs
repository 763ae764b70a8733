//! Contact directory.
//!
//! A derived cache of the device's contact table, maintained only by
//! observing contact-list entries and new-advert events. Entries keep
//! first-seen order; the public key is the primary key.

use parking_lot::RwLock;

use mclink_protocol::ContactInfo;

use crate::error::ClientError;

/// Ordered contact cache with name and key-prefix lookup.
#[derive(Default)]
pub struct ContactDirectory {
    inner: RwLock<Vec<ContactInfo>>,
}

impl ContactDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        ContactDirectory::default()
    }

    /// Insert or replace a contact, keyed by public key.
    ///
    /// Replacing preserves the entry's position in first-seen order, so
    /// applying the same contact twice leaves one entry with the latest
    /// attributes.
    pub fn upsert(&self, contact: ContactInfo) {
        let mut contacts = self.inner.write();
        match contacts
            .iter_mut()
            .find(|c| c.public_key == contact.public_key)
        {
            Some(existing) => *existing = contact,
            None => contacts.push(contact),
        }
    }

    /// Get the first contact (in directory order) whose name matches
    /// exactly.
    pub fn get_by_name(&self, name: &str) -> Option<ContactInfo> {
        self.inner.read().iter().find(|c| c.name == name).cloned()
    }

    /// Get the unique contact whose public key starts with the given hex
    /// prefix.
    ///
    /// Zero matches yields `Ok(None)`; more than one yields
    /// [`ClientError::AmbiguousPrefix`] rather than silently picking one.
    pub fn get_by_key_prefix(&self, prefix: &str) -> Result<Option<ContactInfo>, ClientError> {
        let prefix = prefix.to_ascii_lowercase();
        let contacts = self.inner.read();
        let mut matches = contacts
            .iter()
            .filter(|c| c.public_key.to_hex().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(contact), None) => Ok(Some(contact.clone())),
            (Some(_), Some(_)) => Err(ClientError::AmbiguousPrefix),
            (None, _) => Ok(None),
        }
    }

    /// Snapshot of all contacts, in first-seen order.
    pub fn all(&self) -> Vec<ContactInfo> {
        self.inner.read().clone()
    }

    /// Number of contacts in the directory.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mclink_protocol::PublicKey;

    fn contact(first_key_bytes: &[u8], name: &str) -> ContactInfo {
        let mut key = [0u8; 32];
        key[..first_key_bytes.len()].copy_from_slice(first_key_bytes);
        ContactInfo {
            public_key: PublicKey::new(key),
            name: name.to_string(),
            ..ContactInfo::default()
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let dir = ContactDirectory::new();
        dir.upsert(contact(&[0xA1], "alice"));
        let mut updated = contact(&[0xA1], "alice");
        updated.lastmod = 99;
        dir.upsert(updated);

        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get_by_name("alice").map(|c| c.lastmod), Some(99));
    }

    #[test]
    fn test_upsert_preserves_first_seen_order() {
        let dir = ContactDirectory::new();
        dir.upsert(contact(&[0x01], "first"));
        dir.upsert(contact(&[0x02], "second"));
        dir.upsert(contact(&[0x01], "first-renamed"));

        let all = dir.all();
        assert_eq!(all[0].name, "first-renamed");
        assert_eq!(all[1].name, "second");
    }

    #[test]
    fn test_get_by_name_exact_match_only() {
        let dir = ContactDirectory::new();
        dir.upsert(contact(&[0x01], "Alice"));
        assert!(dir.get_by_name("alice").is_none());
        assert!(dir.get_by_name("Alice").is_some());
    }

    #[test]
    fn test_key_prefix_lookup() {
        let dir = ContactDirectory::new();
        dir.upsert(contact(&[0xA1, 0xB2], "one"));
        dir.upsert(contact(&[0xA1, 0xC3], "two"));

        // Shared prefix is ambiguous, not first-match.
        assert!(matches!(
            dir.get_by_key_prefix("a1"),
            Err(ClientError::AmbiguousPrefix)
        ));

        // A longer prefix disambiguates.
        let found = dir.get_by_key_prefix("a1b2").unwrap();
        assert_eq!(found.map(|c| c.name), Some("one".to_string()));

        // No match at all.
        assert!(dir.get_by_key_prefix("ff").unwrap().is_none());

        // Case-insensitive hex.
        let found = dir.get_by_key_prefix("A1C3").unwrap();
        assert_eq!(found.map(|c| c.name), Some("two".to_string()));
    }
}

//! Keyspace enumeration contract.

use crate::error::{StoreError, StoreResult};

/// A key yielded by a keyspace listing, with the marker that resumes after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// The key within its section.
    pub key: String,
    /// Store-defined position of the key; listing from it resumes strictly after the key.
    pub marker: String,
}

impl KeyInfo {
    /// Creates a key whose marker is the key itself.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            marker: key.clone(),
            key,
        }
    }
}

/// One page of a keyspace listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBatch {
    /// Keys in listing order.
    pub keys: Vec<KeyInfo>,
    /// Whether more keys exist after this page.
    pub truncated: bool,
}

/// Enumerates the keys of a sectioned metadata keyspace.
///
/// Listing the empty section enumerates the section names themselves.
/// Within a section the order is stable, and a marker taken from a
/// [`KeyInfo`] resumes strictly after that key.
///
/// Handles are opaque; callers should go through [`KeyListing`] so that
/// `list_complete` runs on every exit path.
pub trait KeyEnumerator: Send + Sync {
    /// Per-listing cursor state.
    type Handle: Send;

    /// Starts listing `section` after `marker` (empty = from the beginning).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the section does not exist, or
    /// an I/O class error if the store cannot be reached.
    fn list_init(&self, section: &str, marker: &str) -> StoreResult<Self::Handle>;

    /// Returns at most `max` further keys.
    fn list_next(&self, handle: &mut Self::Handle, max: usize) -> StoreResult<KeyBatch>;

    /// Releases the listing.
    fn list_complete(&self, handle: Self::Handle);
}

/// A keyspace listing that is completed when dropped.
pub struct KeyListing<'a, E: KeyEnumerator + ?Sized> {
    enumerator: &'a E,
    handle: Option<E::Handle>,
}

impl<'a, E: KeyEnumerator + ?Sized> KeyListing<'a, E> {
    /// Opens a listing of `section` positioned after `marker`.
    pub fn open(enumerator: &'a E, section: &str, marker: &str) -> StoreResult<Self> {
        let handle = enumerator.list_init(section, marker)?;
        Ok(Self {
            enumerator,
            handle: Some(handle),
        })
    }

    /// Reads the next page of at most `max` keys.
    pub fn next_batch(&mut self, max: usize) -> StoreResult<KeyBatch> {
        let handle = self.handle.as_mut().ok_or(StoreError::InvalidHandle)?;
        self.enumerator.list_next(handle, max)
    }

    /// Drains the listing in pages of `batch` keys.
    pub fn collect_all(mut self, batch: usize) -> StoreResult<Vec<KeyInfo>> {
        let mut all = Vec::new();
        loop {
            let page = self.next_batch(batch.max(1))?;
            all.extend(page.keys);
            if !page.truncated {
                return Ok(all);
            }
        }
    }
}

impl<E: KeyEnumerator + ?Sized> Drop for KeyListing<'_, E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.enumerator.list_complete(handle);
        }
    }
}

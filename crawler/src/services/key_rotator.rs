use crate::error::{CrawlError, CrawlResult};
use std::sync::Mutex;

/// Round-robin over a pool of API credentials.
///
/// The cursor is advanced exactly once per [`KeyRotator::next_key`] call, so a
/// pool of `N` keys hands out the first key again on call `N + 1`. There is no
/// backoff: a caller whose request failed simply asks for the next key.
pub struct KeyRotator {
    name: &'static str,
    keys: Vec<String>,
    cursor: Mutex<usize>,
}

impl KeyRotator {
    pub fn new(name: &'static str, keys: Vec<String>) -> CrawlResult<Self> {
        if keys.is_empty() {
            return Err(CrawlError::EmptyKeyPool { pool: name });
        }

        Ok(KeyRotator {
            name,
            keys,
            cursor: Mutex::new(0),
        })
    }

    pub fn next_key(&self) -> String {
        let mut cursor = match self.cursor.lock() {
            Ok(cursor) => cursor,
            Err(poisoned) => poisoned.into_inner(),
        };

        let key = self.keys[*cursor].clone();
        *cursor = (*cursor + 1) % self.keys.len();
        key
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

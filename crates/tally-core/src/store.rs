use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::storage::StorageBackend;

/// A new value for [`PersistentStore::set`]: either a literal or a function
/// of the current value.
pub enum StateUpdate<'a, T> {
    Replace(T),
    With(Box<dyn FnOnce(&T) -> T + 'a>),
}

impl<'a, T> StateUpdate<'a, T> {
    pub fn with<F>(f: F) -> Self
    where
        F: FnOnce(&T) -> T + 'a,
    {
        Self::With(Box::new(f))
    }

    fn apply(self, current: &T) -> T {
        match self {
            Self::Replace(value) => value,
            Self::With(f) => f(current),
        }
    }
}

impl<T> From<T> for StateUpdate<'_, T> {
    fn from(value: T) -> Self {
        Self::Replace(value)
    }
}

/// A value bound to one storage key. Every change is written through to the
/// backend; storage failures never reach the caller.
pub struct PersistentStore<T, B> {
    backend: B,
    key: String,
    default: T,
    value: T,
}

impl<T, B> PersistentStore<T, B>
where
    T: Serialize + DeserializeOwned + Clone,
    B: StorageBackend,
{
    #[tracing::instrument(skip(backend, default))]
    pub fn open(backend: B, key: &str, default: T) -> Self {
        let value = read_or_default(&backend, key, &default);
        Self {
            backend,
            key: key.to_string(),
            default,
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    #[tracing::instrument(skip(self, update), fields(key = %self.key))]
    pub fn set<'u>(&mut self, update: impl Into<StateUpdate<'u, T>>) {
        self.value = update.into().apply(&self.value);
        self.persist();
    }

    /// Re-reads the key, applying the same fallback rules as [`Self::open`].
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub fn reload(&mut self) {
        self.value = read_or_default(&self.backend, &self.key, &self.default);
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.value) {
            Ok(json) => json,
            Err(error) => {
                warn!(key = %self.key, %error, "failed serializing value for storage");
                return;
            }
        };

        if let Err(error) = self.backend.set_item(&self.key, &json) {
            warn!(key = %self.key, error = %format!("{error:#}"), "failed writing to storage");
        } else {
            debug!(key = %self.key, bytes = json.len(), "persisted value");
        }
    }
}

fn read_or_default<T, B>(backend: &B, key: &str, default: &T) -> T
where
    T: DeserializeOwned + Clone,
    B: StorageBackend,
{
    let raw = match backend.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "no stored value; using default");
            return default.clone();
        }
        Err(error) => {
            warn!(key, error = %format!("{error:#}"), "failed reading storage; using default");
            return default.clone();
        }
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => value,
        Err(error) => {
            warn!(key, %error, "failed parsing stored value; using default");
            default.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PersistentStore, StateUpdate};
    use crate::storage::{MemoryStorage, StorageBackend};

    #[test]
    fn missing_key_yields_default() {
        let storage = MemoryStorage::new();
        let store = PersistentStore::open(&storage, "numbers", vec![7_u32]);
        assert_eq!(store.get(), &vec![7]);
        assert_eq!(storage.raw("numbers"), None);
    }

    #[test]
    fn corrupted_value_yields_default() {
        let storage = MemoryStorage::with_item("numbers", "{not json");
        let store = PersistentStore::open(&storage, "numbers", Vec::<u32>::new());
        assert!(store.get().is_empty());
    }

    #[test]
    fn unavailable_storage_yields_default_and_keeps_memory_state() {
        let storage = MemoryStorage::with_item("numbers", "[1,2]");
        storage.set_unavailable(true);

        let mut store = PersistentStore::open(&storage, "numbers", Vec::<u32>::new());
        assert!(store.get().is_empty());

        store.set(vec![3_u32]);
        assert_eq!(store.get(), &vec![3]);

        storage.set_unavailable(false);
        assert_eq!(storage.raw("numbers"), Some("[1,2]".to_string()));
    }

    #[test]
    fn set_accepts_literal_and_updater() {
        let storage = MemoryStorage::new();
        let mut store = PersistentStore::open(&storage, "numbers", Vec::<u32>::new());

        store.set(vec![1_u32, 2]);
        assert_eq!(storage.raw("numbers"), Some("[1,2]".to_string()));

        store.set(StateUpdate::with(|prev: &Vec<u32>| {
            let mut next = prev.clone();
            next.push(3);
            next
        }));
        assert_eq!(store.get(), &vec![1, 2, 3]);
        assert_eq!(storage.raw("numbers"), Some("[1,2,3]".to_string()));
    }

    #[test]
    fn updater_may_borrow_from_caller() {
        let storage = MemoryStorage::new();
        let mut store = PersistentStore::open(&storage, "numbers", vec![1_u32]);
        let extra = vec![4_u32, 5];

        store.set(StateUpdate::with(|prev: &Vec<u32>| {
            prev.iter().chain(&extra).copied().collect()
        }));
        assert_eq!(store.get(), &vec![1, 4, 5]);
        assert_eq!(extra.len(), 2);
    }

    #[test]
    fn reload_picks_up_external_writes() {
        let storage = MemoryStorage::new();
        let mut store = PersistentStore::open(&storage, "numbers", Vec::<u32>::new());

        storage.set_item("numbers", "[9]").expect("set");
        store.reload();
        assert_eq!(store.get(), &vec![9]);
    }
}

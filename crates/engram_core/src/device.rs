//! Anonymous device identifier sources.
//!
//! # Responsibility
//! - Supply the opaque token that stands in for user identity.
//! - Persist generated tokens so one environment keeps one identity.
//!
//! # Invariants
//! - `device_id()` returns the same value on every call of one source.
//! - Ledgers only consume device identifiers; they never generate them.

use crate::store::KeyValueStore;
use log::{info, warn};
use once_cell::sync::OnceCell;
use uuid::Uuid;

/// Storage key holding the persisted device token.
pub const DEVICE_ID_KEY: &str = "bulletin_device_id";

const DEVICE_ID_PREFIX: &str = "device_";

/// Provider of the current device identifier.
pub trait DeviceIdSource {
    fn device_id(&self) -> String;
}

impl<T: DeviceIdSource + ?Sized> DeviceIdSource for &T {
    fn device_id(&self) -> String {
        (**self).device_id()
    }
}

/// Constant identifier supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedDeviceId(String);

impl FixedDeviceId {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self(device_id.into())
    }
}

impl DeviceIdSource for FixedDeviceId {
    fn device_id(&self) -> String {
        self.0.clone()
    }
}

/// Identifier persisted in a key-value store under [`DEVICE_ID_KEY`].
///
/// The first call loads or generates the token; later calls return the
/// cached value. When storage is unusable a token is generated for the
/// lifetime of this instance only.
pub struct StoredDeviceId<S: KeyValueStore> {
    store: S,
    cached: OnceCell<String>,
}

impl<S: KeyValueStore> StoredDeviceId<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cached: OnceCell::new(),
        }
    }

    fn load_or_create(&self) -> String {
        match self.store.get_item(DEVICE_ID_KEY) {
            Ok(Some(existing)) if !existing.trim().is_empty() => return existing.trim().to_string(),
            Ok(_) => {}
            Err(err) => {
                warn!(
                    "event=device_id_load module=device status=error error_code=storage_unavailable error={}",
                    err
                );
                return generate_device_id();
            }
        }

        let generated = generate_device_id();
        match self.store.set_item(DEVICE_ID_KEY, &generated) {
            Ok(()) => info!("event=device_id_create module=device status=ok"),
            Err(err) => warn!(
                "event=device_id_create module=device status=error error_code=storage_unavailable error={}",
                err
            ),
        }
        generated
    }
}

impl<S: KeyValueStore> DeviceIdSource for StoredDeviceId<S> {
    fn device_id(&self) -> String {
        self.cached.get_or_init(|| self.load_or_create()).clone()
    }
}

/// Generates a fresh opaque device token.
pub fn generate_device_id() -> String {
    format!("{DEVICE_ID_PREFIX}{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::{DeviceIdSource, StoredDeviceId, DEVICE_ID_KEY};
    use crate::store::{KeyValueStore, MemoryStore};

    #[test]
    fn generated_id_is_persisted_and_reused() {
        let store = MemoryStore::new();
        let first = StoredDeviceId::new(&store).device_id();
        assert!(first.starts_with("device_"));
        assert_eq!(
            store.get_item(DEVICE_ID_KEY).unwrap().as_deref(),
            Some(first.as_str())
        );

        let second = StoredDeviceId::new(&store).device_id();
        assert_eq!(first, second);
    }

    #[test]
    fn unavailable_store_still_yields_stable_id_per_instance() {
        let store = MemoryStore::new();
        store.set_enabled(false);
        let source = StoredDeviceId::new(&store);
        let first = source.device_id();
        assert_eq!(first, source.device_id());
    }
}

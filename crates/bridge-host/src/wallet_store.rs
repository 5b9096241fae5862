use std::path::{Path, PathBuf};

use bridge_api::{Error, Result, WalletRecord};
use tracing::info;

/// File-backed set of named key pairs, persisted as a pretty-printed JSON
/// array. Only ever touched from the workflow thread, never during a live
/// browser session.
pub struct WalletStore {
    path: PathBuf,
}

impl WalletStore {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            path: config_dir.as_ref().join("wallets.json"),
        }
    }

    pub fn load(&self) -> Result<Vec<WalletRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::WalletStoreCorrupt(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| Error::WalletStoreCorrupt(e.to_string()))
    }

    fn save(&self, wallets: &[WalletRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| Error::WalletStoreCorrupt(e.to_string()))?;
        }
        let pretty = serde_json::to_string_pretty(wallets)
            .map_err(|e| Error::WalletStoreCorrupt(e.to_string()))?;
        std::fs::write(&self.path, pretty).map_err(|e| Error::WalletStoreCorrupt(e.to_string()))
    }

    pub fn create(&self, name: impl Into<String>) -> Result<WalletRecord> {
        let record = WalletRecord::generate(name);
        let mut wallets = self.load()?;
        wallets.push(record.clone());
        self.save(&wallets)?;
        info!(address = %record.address, "created wallet");
        Ok(record)
    }

    pub fn import(&self, name: impl Into<String>, private_key: &str) -> Result<WalletRecord> {
        let record = WalletRecord::from_private_key(name, private_key)?;
        let mut wallets = self.load()?;
        wallets.push(record.clone());
        self.save(&wallets)?;
        info!(address = %record.address, "imported wallet");
        Ok(record)
    }

    /// Random key pair that is never written to disk.
    pub fn create_ephemeral(&self, name: impl Into<String>) -> WalletRecord {
        let record = WalletRecord::generate(name);
        info!(address = %record.address, "created ephemeral wallet (not persisted)");
        record
    }

    pub fn delete(&self, address: &str) -> Result<()> {
        let mut wallets = self.load()?;
        let before = wallets.len();
        wallets.retain(|w| !w.address.eq_ignore_ascii_case(address));
        if wallets.len() == before {
            return Err(Error::InvalidInput(format!(
                "no wallet with address {address}"
            )));
        }
        self.save(&wallets)?;
        info!(%address, "deleted wallet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (WalletStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("bridge-host-test-{}", uuid::Uuid::new_v4()));
        (WalletStore::new(&dir), dir)
    }

    #[test]
    fn create_then_load_round_trips() {
        let (store, dir) = temp_store();
        let created = store.create("primary").unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, vec![created]);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn import_derives_matching_address() {
        let (store, dir) = temp_store();
        let key = format!("0x{}", "11".repeat(32));
        let wallet = store.import("imported", &key).unwrap();
        assert_eq!(wallet.private_key, key);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn ephemeral_wallet_is_not_persisted() {
        let (store, dir) = temp_store();
        let _ephemeral = store.create_ephemeral("temp");
        assert!(store.load().unwrap().is_empty());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn delete_removes_by_address() {
        let (store, dir) = temp_store();
        let wallet = store.create("primary").unwrap();
        store.delete(&wallet.address).unwrap();
        assert!(store.load().unwrap().is_empty());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn delete_unknown_address_errors() {
        let (store, dir) = temp_store();
        assert!(store.delete("0xdoesnotexist").is_err());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn corrupt_file_surfaces_as_error_not_truncated() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("wallets.json"), "not json").unwrap();
        assert!(matches!(store.load(), Err(Error::WalletStoreCorrupt(_))));
        // the corrupt file must still be on disk, untouched
        assert_eq!(
            std::fs::read_to_string(dir.join("wallets.json")).unwrap(),
            "not json"
        );
        std::fs::remove_dir_all(dir).ok();
    }
}

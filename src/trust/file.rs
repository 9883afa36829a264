//! File-backed trust store.
//!
//! Records are kept in a TOML file under a `[safe_macs]` table:
//!
//! ```toml
//! [safe_macs]
//! "aa:bb:cc:dd:ee:ff" = "10:20:30:40:50:60"
//! ```
//!
//! The whole file is rewritten through a temporary file and a rename, so a
//! crash mid-write never leaves a truncated store behind. Records that fail
//! to parse are carried over verbatim on every rewrite until a valid record
//! replaces them.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::TrustStore;
use crate::error::TrustStoreError;
use crate::network::{NetworkId, parse_mac};

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TrustFile {
    #[serde(default)]
    safe_macs: BTreeMap<String, String>,
}

/// Durable trust store persisted as a TOML file.
#[derive(Debug)]
pub struct FileTrustStore {
    path: PathBuf,
    records: RwLock<BTreeMap<NetworkId, MacAddr>>,
    /// Raw entries skipped at load, keyed by their original network string.
    malformed: RwLock<BTreeMap<String, String>>,
    /// Serializes writers so concurrent puts cannot interleave file writes.
    write_lock: Mutex<()>,
}

impl FileTrustStore {
    /// Open the store at `path`, loading existing records.
    ///
    /// A missing file is an empty store; it is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, TrustStoreError> {
        let path = path.into();

        let (records, malformed) = match fs::read_to_string(&path).await {
            Ok(content) => parse_records(&path, &content)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Default::default(),
            Err(source) => return Err(TrustStoreError::Read { path, source }),
        };

        debug!(path = %path.display(), records = records.len(), "opened trust store");

        Ok(Self {
            path,
            records: RwLock::new(records),
            malformed: RwLock::new(malformed),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    async fn persist(
        &self,
        records: &BTreeMap<NetworkId, MacAddr>,
        malformed: &BTreeMap<String, String>,
    ) -> Result<(), TrustStoreError> {
        let mut safe_macs = malformed.clone();
        safe_macs.extend(
            records
                .iter()
                .map(|(network, mac)| (network.to_string(), mac.to_string())),
        );
        let content = toml::to_string(&TrustFile { safe_macs })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| TrustStoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let staging = staging_path(&self.path);
        fs::write(&staging, content)
            .await
            .map_err(|source| TrustStoreError::Write {
                path: staging.clone(),
                source,
            })?;
        if let Err(source) = fs::rename(&staging, &self.path).await {
            if let Err(err) = fs::remove_file(&staging).await {
                warn!(path = %staging.display(), "failed to remove staging file: {err}");
            }
            return Err(TrustStoreError::Write {
                path: self.path.clone(),
                source,
            });
        }

        debug!(path = %self.path.display(), "saved trust store");
        Ok(())
    }
}

impl TrustStore for FileTrustStore {
    async fn get(&self, network: &NetworkId) -> Result<Option<MacAddr>, TrustStoreError> {
        Ok(self.records.read().get(network).copied())
    }

    async fn put(&self, network: NetworkId, mac: MacAddr) -> Result<(), TrustStoreError> {
        let _writer = self.write_lock.lock().await;

        let mut updated = self.records.read().clone();
        if updated.get(&network) == Some(&mac) {
            return Ok(());
        }

        let mut malformed = self.malformed.read().clone();
        malformed.retain(|raw, previous| {
            if NetworkId::new(raw.as_str()).as_ref() != Some(&network) {
                return true;
            }
            error!(
                network = %network,
                previous = %previous,
                mac = %mac,
                "replacing malformed trust record with the currently observed gateway"
            );
            false
        });
        updated.insert(network, mac);

        // Memory only changes once the file is durable.
        self.persist(&updated, &malformed).await?;
        *self.records.write() = updated;
        *self.malformed.write() = malformed;
        Ok(())
    }
}

type ParsedRecords = (BTreeMap<NetworkId, MacAddr>, BTreeMap<String, String>);

fn parse_records(path: &Path, content: &str) -> Result<ParsedRecords, TrustStoreError> {
    let file: TrustFile = toml::from_str(content).map_err(|source| TrustStoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = BTreeMap::new();
    let mut malformed = BTreeMap::new();
    for (network, mac) in file.safe_macs {
        match (NetworkId::new(&network), parse_mac(&mac)) {
            (Some(id), Some(parsed)) => {
                records.insert(id, parsed);
            }
            _ => {
                warn!(
                    path = %path.display(),
                    network = %network,
                    mac = %mac,
                    "skipping malformed trust record"
                );
                malformed.insert(network, mac);
            }
        }
    }
    Ok((records, malformed))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = OsString::from(path.as_os_str());
    staging.push(".tmp");
    PathBuf::from(staging)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(id: &str) -> NetworkId {
        NetworkId::new(id).unwrap()
    }

    #[tokio::test]
    async fn should_start_empty_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrustStore::open(dir.path().join("safe_macs.toml"))
            .await
            .unwrap();

        assert!(store.is_empty());
        assert_eq!(store.get(&network("home")).await.unwrap(), None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn should_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("safe_macs.toml");
        let mac = MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01);

        let store = FileTrustStore::open(&path).await.unwrap();
        store.put(network("aa:bb:cc:00:00:01"), mac).await.unwrap();
        drop(store);

        let reopened = FileTrustStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(
            reopened.get(&network("aa:bb:cc:00:00:01")).await.unwrap(),
            Some(mac)
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[safe_macs]"));
        assert!(content.contains("aa:bb:cc:dd:ee:01"));
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn should_not_rewrite_identical_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safe_macs.toml");
        let mac = MacAddr::new(1, 2, 3, 4, 5, 6);

        let store = FileTrustStore::open(&path).await.unwrap();
        store.put(network("home"), mac).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        store.put(network("home"), mac).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn should_skip_malformed_records_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safe_macs.toml");
        std::fs::write(
            &path,
            r#"
                [safe_macs]
                home = "AA:BB:CC:DD:EE:01"
                office = "not-a-mac"
                "  " = "aa:bb:cc:dd:ee:02"
            "#,
        )
        .unwrap();

        let store = FileTrustStore::open(&path).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&network("home")).await.unwrap(),
            Some(MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01))
        );
    }

    #[tokio::test]
    async fn should_keep_malformed_records_on_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safe_macs.toml");
        std::fs::write(
            &path,
            r#"
                [safe_macs]
                home = "aa:bb:cc:dd:ee:01"
                office = "not-a-mac"
            "#,
        )
        .unwrap();

        let store = FileTrustStore::open(&path).await.unwrap();
        store
            .put(network("cafe"), MacAddr::new(1, 2, 3, 4, 5, 6))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("not-a-mac"), "{content}");

        let reopened = FileTrustStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get(&network("office")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_drop_malformed_record_once_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safe_macs.toml");
        std::fs::write(&path, "[safe_macs]\noffice = \"not-a-mac\"\n").unwrap();
        let mac = MacAddr::new(0x10, 0x20, 0x30, 0x40, 0x50, 0x60);

        let store = FileTrustStore::open(&path).await.unwrap();
        store.put(network("office"), mac).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("not-a-mac"), "{content}");
        let reopened = FileTrustStore::open(&path).await.unwrap();
        assert_eq!(reopened.get(&network("office")).await.unwrap(), Some(mac));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn should_remove_staging_file_when_rename_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safe_macs.toml");
        let store = FileTrustStore::open(&path).await.unwrap();

        // A file cannot be renamed over a directory.
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), "").unwrap();

        let err = store
            .put(network("home"), MacAddr::new(1, 2, 3, 4, 5, 6))
            .await
            .unwrap_err();

        assert!(matches!(err, TrustStoreError::Write { .. }));
        assert!(!staging_path(&path).exists());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn should_reject_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safe_macs.toml");
        std::fs::write(&path, "safe_macs = [").unwrap();

        let err = FileTrustStore::open(&path).await.unwrap_err();
        assert!(matches!(err, TrustStoreError::Parse { .. }));
    }
}

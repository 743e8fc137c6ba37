// Account and certificate persistence

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};

use crate::{config::Domain, error::StoreError};

use super::Account;

/// A certificate issued for a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub domain: Domain,

    /// PEM certificate chain
    #[serde(with = "base64_bytes")]
    pub certificate: Vec<u8>,

    /// PEM private key
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
}

/// Persistent storage for the account and issued certificates.
///
/// Implementations do blocking I/O and are called from the cache consumer task.
pub trait Store: Send + Sync {
    fn get_account(&self) -> Result<Option<Account>, StoreError>;

    fn save_account(&self, account: &Account) -> Result<(), StoreError>;

    fn get_certificates(&self) -> Result<Vec<Certificate>, StoreError>;

    fn save_certificates(&self, certificates: &[Certificate]) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredData {
    #[serde(default)]
    account: Option<Account>,

    #[serde(default)]
    certificates: Vec<Certificate>,
}

/// A store backed by a single JSON file
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    data: Mutex<Option<StoredData>>,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: impl std::fmt::Display) -> StoreError {
        StoreError::Io {
            path: safe_display_path(&self.path),
            message: e.to_string(),
        }
    }

    fn read_data(&self) -> Result<StoredData, StoreError> {
        if !self.path.exists() {
            return Ok(StoredData::default());
        }

        let raw = fs::read(&self.path).map_err(|e| self.io_error(e))?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoredData::default());
        }

        serde_json::from_slice(&raw).map_err(|e| StoreError::Serialization {
            path: safe_display_path(&self.path),
            message: e.to_string(),
        })
    }

    /// Runs `f` against the cached document, loading it from disk on first use
    fn with_data<T>(
        &self,
        f: impl FnOnce(&mut StoredData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.read_data()?);
        }

        f(guard.get_or_insert_with(StoredData::default))
    }

    /// Writes the whole document atomically
    fn write_data(&self, data: &StoredData) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(data).map_err(|e| StoreError::Serialization {
            path: safe_display_path(&self.path),
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "acme.json".to_string());
        let temp_path = self.path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&temp_path, &encoded).map_err(|e| self.io_error(e))?;

        // The file holds private keys
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                let _ = fs::remove_file(&temp_path);
                self.io_error(e)
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            self.io_error(e)
        })?;

        Ok(())
    }
}

impl Store for LocalStore {
    fn get_account(&self) -> Result<Option<Account>, StoreError> {
        self.with_data(|data| Ok(data.account.clone()))
    }

    fn save_account(&self, account: &Account) -> Result<(), StoreError> {
        self.with_data(|data| {
            data.account = Some(account.clone());
            self.write_data(data)
        })
    }

    fn get_certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        self.with_data(|data| Ok(data.certificates.clone()))
    }

    fn save_certificates(&self, certificates: &[Certificate]) -> Result<(), StoreError> {
        self.with_data(|data| {
            data.certificates = certificates.to_vec();
            self.write_data(data)
        })
    }
}

/// Helper to get a safe display path for error messages (doesn't leak full absolute paths)
fn safe_display_path(full_path: &Path) -> String {
    if let Ok(cwd) = std::env::current_dir() {
        if let Ok(relative) = full_path.strip_prefix(&cwd) {
            return relative.display().to_string();
        }
    }

    full_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| full_path.display().to_string())
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// Credential storage. The original tool read the OS keychain; here
// credentials live in a small JSON file under the user's config directory,
// keyed by hostname, and the `login` subcommand populates it.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A username/password pair scoped to one hostname. Owned by the store;
/// the engine fetches it fresh on every request build and never caches it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keep the secret out of debug output and log lines.
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies the credential for a hostname. Consulted once per `exec`
/// invocation, immediately before the request is built.
pub trait CredentialStore {
    fn lookup(&self, hostname: &str) -> Result<Credential, CredentialError>;
}

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Nothing stored for the hostname (or no credential file at all).
    #[error("no credential stored for {0}; run `mkrepo login` first")]
    NotFound(String),

    /// The credential file exists but could not be read.
    #[error("could not read credential file {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The credential file exists but is not the expected JSON document.
    #[error("credential file {path} is not valid JSON")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-backed store: a JSON object mapping hostname to credential, e.g.
///
/// ```json
/// { "bitbucket.org": { "username": "tlee", "password": "..." } }
/// ```
///
/// The file is re-read on every lookup, so an edit (or a `login`) takes
/// effect without restarting anything.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at the default location, `<config dir>/mkrepo/credentials.json`.
    pub fn from_config_dir() -> Self {
        let dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: dir.join("mkrepo").join("credentials.json"),
        }
    }

    /// Store backed by an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Credential>, CredentialError> {
        let data = fs::read_to_string(&self.path).map_err(|source| CredentialError::Unreadable {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| CredentialError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Insert or replace the credential for `hostname` and write the file
    /// back out, creating it (and its parent directory) if needed.
    pub fn save(&self, hostname: &str, credential: Credential) -> anyhow::Result<()> {
        let mut all = match self.read_all() {
            Ok(all) => all,
            // First login: no file yet.
            Err(CredentialError::Unreadable { ref source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                BTreeMap::new()
            }
            Err(err) => return Err(err.into()),
        };
        all.insert(hostname.to_string(), credential);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(&all)?;
        fs::write(&self.path, data)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn lookup(&self, hostname: &str) -> Result<Credential, CredentialError> {
        let mut all = match self.read_all() {
            Ok(all) => all,
            Err(CredentialError::Unreadable { ref source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                return Err(CredentialError::NotFound(hostname.to_string()));
            }
            Err(err) => return Err(err),
        };
        all.remove(hostname)
            .ok_or_else(|| CredentialError::NotFound(hostname.to_string()))
    }
}

//! Session token persistence.
//!
//! The HTTP client reads the access token from a [`TokenStore`] on every
//! request, so whatever backend is plugged in is the single source of truth
//! for "is there a session".

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Access/refresh token pair. Wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct TokenPair {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub access: String,
    #[serde(alias = "refresh_token", alias = "refreshToken")]
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("failed to access token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode tokens: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Backend holding the current session tokens.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<TokenPair>;
    fn set(&self, tokens: TokenPair) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;

    fn access_token(&self) -> Option<String> {
        self.get().map(|tokens| tokens.access.clone())
    }

    fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }
}

/// In-process store; the session ends with the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: RwLock::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<TokenPair> {
        self.tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, tokens: TokenPair) -> Result<(), TokenStoreError> {
        *self
            .tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tokens);
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        Ok(())
    }
}

/// JSON file store so a CLI session survives between invocations.
///
/// The file is written on [`set`](TokenStore::set) and removed on
/// [`clear`](TokenStore::clear). An unreadable file is treated as "no
/// session" rather than a hard failure.
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<Option<TokenPair>>,
}

impl FileTokenStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TokenStoreError> {
        let path = path.into();
        let cached = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<TokenPair>(&bytes) {
                Ok(tokens) => Some(tokens),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Ignoring unreadable token file");
                    None
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(source) => return Err(TokenStoreError::Io { path, source }),
        };

        debug!(path = %path.display(), has_session = cached.is_some(), "Opened token store");
        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, tokens: &TokenPair) -> Result<(), TokenStoreError> {
        let io_err = |source| TokenStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut bytes = serde_json::to_vec_pretty(tokens)?;
        let written = fs::write(&self.path, &bytes).map_err(io_err);
        bytes.zeroize();
        written?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<TokenPair> {
        self.cached
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, tokens: TokenPair) -> Result<(), TokenStoreError> {
        self.write_file(&tokens)?;
        *self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tokens);
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TokenStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

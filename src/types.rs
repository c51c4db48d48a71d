//! Type-safe wrappers for request identity and file locators

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

const FILE_SCHEME: &str = "file://";

/// Opaque identity of one upload request
///
/// Every event and settlement for an upload carries the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A resolved reference to a local file to upload
///
/// Accepts either a bare absolute path or a `file://` URL whose path may be
/// percent-encoded. Anything else is rejected with
/// [`BridgeError::InvalidLocator`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileLocator(PathBuf);

impl FileLocator {
    /// Returns the local path
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Renders the locator as an absolute `file://` URL string
    pub fn to_url_string(&self) -> String {
        let path = self.0.to_string_lossy();
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}{}", FILE_SCHEME, encoded.join("/"))
    }
}

impl FromStr for FileLocator {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(BridgeError::invalid_locator(s, "locator is empty"));
        }

        if s.contains('\0') {
            return Err(BridgeError::invalid_locator(s, "locator contains a NUL byte"));
        }

        let raw_path = if let Some(rest) = s.strip_prefix(FILE_SCHEME) {
            urlencoding::decode(rest)
                .map_err(|e| BridgeError::invalid_locator(s, format!("bad percent-encoding: {}", e)))?
                .into_owned()
        } else if let Some((scheme, _)) = s.split_once("://") {
            return Err(BridgeError::invalid_locator(
                s,
                format!("unsupported scheme '{}'", scheme),
            ));
        } else {
            s.to_string()
        };

        // Decoding may have surfaced an encoded NUL
        if raw_path.contains('\0') {
            return Err(BridgeError::invalid_locator(s, "locator contains a NUL byte"));
        }

        let path = PathBuf::from(raw_path);
        if !path.is_absolute() {
            return Err(BridgeError::invalid_locator(s, "path must be absolute"));
        }
        if path.file_name().is_none() {
            return Err(BridgeError::invalid_locator(s, "path does not name a file"));
        }

        Ok(Self(path))
    }
}

impl Display for FileLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_url_string())
    }
}

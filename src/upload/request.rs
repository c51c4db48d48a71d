//! Upload request descriptor and its builder

use crate::error::Result;
use crate::payload::{decode_payload, PayloadKind};
use crate::types::{FileLocator, RequestId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// An immutable description of one upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    id: RequestId,
    locator: FileLocator,
    tags: HashMap<String, String>,
    metadata: HashMap<String, String>,
    created_at: DateTime<Utc>,
}

impl UploadRequest {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn locator(&self) -> &FileLocator {
        &self.locator
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Builder for [`UploadRequest`]
///
/// Tags and metadata are held in separate maps and never populated from one
/// another.
#[derive(Debug, Clone)]
pub struct UploadRequestBuilder {
    locator: FileLocator,
    tags: HashMap<String, String>,
    metadata: HashMap<String, String>,
}

impl UploadRequestBuilder {
    /// Start a request for the file at `locator`
    ///
    /// # Errors
    ///
    /// Returns [`crate::BridgeError::InvalidLocator`] if the locator cannot be resolved.
    pub fn new(locator: &str) -> Result<Self> {
        Ok(Self::for_locator(locator.parse()?))
    }

    pub fn for_locator(locator: FileLocator) -> Self {
        Self {
            locator,
            tags: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Resolve the locator and decode both serialized payloads
    ///
    /// # Arguments
    ///
    /// * `locator` - Path or `file://` URL of the file to upload
    /// * `tags` - JSON object text with string values
    /// * `metadata` - JSON object text with string values
    pub fn from_payloads(locator: &str, tags: &str, metadata: &str) -> Result<Self> {
        let builder = Self::new(locator)?;
        let tags = decode_payload(PayloadKind::Tags, tags)?;
        let metadata = decode_payload(PayloadKind::Metadata, metadata)?;
        Ok(builder.tags(tags).metadata(metadata))
    }

    pub fn add_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn add_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge `tags` into the request, overwriting existing keys
    pub fn tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Merge `metadata` into the request, overwriting existing keys
    pub fn metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Freeze the builder into a request with a fresh id
    pub fn build(self) -> UploadRequest {
        let request = UploadRequest {
            id: RequestId::new(),
            locator: self.locator,
            tags: self.tags,
            metadata: self.metadata,
            created_at: Utc::now(),
        };

        log::debug!(
            "Built upload request {} for {} ({} tags, {} metadata entries)",
            request.id,
            request.locator,
            request.tags.len(),
            request.metadata.len()
        );

        request
    }
}

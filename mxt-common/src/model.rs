//! Video records as returned by a video provider
//!
//! A `Video` is immutable once fetched. The presence of `publisher_name` tells
//! that the provider confirmed the video exists: lookups by id always return one
//! record per requested id, but unresolved ids come back as partial records.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Video hosting provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Youtube,
}

impl Provider {
    /// Single character code used in compact queue encodings
    pub fn code(&self) -> char {
        match self {
            Provider::Youtube => 'y',
        }
    }

    /// Reverse of [`Provider::code`]
    pub fn from_code(code: char) -> Result<Self> {
        match code {
            'y' => Ok(Provider::Youtube),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Youtube => "youtube",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "youtube" => Ok(Provider::Youtube),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

/// Reference to a video: enough to look it up again from its provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoRef {
    pub id: String,
    pub provider: Provider,
}

impl VideoRef {
    /// Build a reference, rejecting ids that could not survive a URL round-trip
    pub fn new(id: impl Into<String>, provider: Provider) -> Result<Self> {
        let id = id.into();
        if !is_valid_video_id(&id) {
            return Err(Error::InvalidInput(format!("invalid video id {:?}", id)));
        }
        Ok(Self { id, provider })
    }
}

/// Video ids are restricted to the URL-safe alphabet `[A-Za-z0-9_-]`
pub fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Video metadata fetched from a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub provider: Provider,
    pub title: String,
    pub thumbnail_url: String,
    pub duration_ms: u64,
    /// Only set when the provider confirmed the video exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_name: Option<String>,
}

impl Video {
    /// Partial record returned for an id the provider could not resolve
    pub fn unresolved(id: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            provider,
            title: String::new(),
            thumbnail_url: String::new(),
            duration_ms: 0,
            publisher_name: None,
        }
    }

    /// True if the provider confirmed the existence of the video
    pub fn is_confirmed(&self) -> bool {
        self.publisher_name.is_some()
    }

    pub fn video_ref(&self) -> VideoRef {
        VideoRef {
            id: self.id.clone(),
            provider: self.provider,
        }
    }
}

/// Paging parameters for provider searches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_size: u32,
    #[serde(default)]
    pub page_id: Option<String>,
}

/// One page of search results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub next_page_id: Option<String>,
}

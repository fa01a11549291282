//! Video provider clients
//!
//! The host only needs two lookups: paged search by free text, and metadata
//! for a batch of ids. `list_videos_by_ids` returns one record per requested
//! id; ids the provider does not know come back as [`Video::unresolved`]
//! records, so callers test existence with [`Video::is_confirmed`].

pub mod catalog;
pub mod youtube;

use crate::error::Result;
use async_trait::async_trait;
use mxt_common::model::{is_valid_video_id, PageRequest, VideoPage};
use mxt_common::Video;

pub use catalog::CatalogProvider;
pub use youtube::YoutubeClient;

#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Free text search, one page at a time
    async fn search_videos_by_query(&self, term: &str, page: &PageRequest) -> Result<VideoPage>;

    /// Metadata for `ids`, in request order
    async fn list_videos_by_ids(&self, ids: &[String]) -> Result<Vec<Video>>;
}

/// Look a single video up and return it only if the provider confirmed it
///
/// Ids outside the URL-safe alphabet are never returned, so whatever this
/// yields can be queued and serialized.
pub async fn find_confirmed(provider: &dyn VideoProvider, id: &str) -> Result<Option<Video>> {
    if !is_valid_video_id(id) {
        return Ok(None);
    }
    let videos = provider.list_videos_by_ids(&[id.to_string()]).await?;
    Ok(videos
        .into_iter()
        .find(|v| v.id == id && v.is_confirmed()))
}

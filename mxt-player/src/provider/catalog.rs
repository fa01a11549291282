//! In-memory video catalogue
//!
//! Serves a fixed list of videos, typically read from the `[[provider.catalog]]`
//! tables of the config file. Used when no YouTube API key is configured.

use super::VideoProvider;
use crate::error::{Error, Result};
use async_trait::async_trait;
use mxt_common::model::{PageRequest, VideoPage};
use mxt_common::{Provider, Video};
use std::sync::RwLock;

const DEFAULT_PAGE_SIZE: u32 = 10;

pub struct CatalogProvider {
    videos: RwLock<Vec<Video>>,
}

impl CatalogProvider {
    pub fn new(videos: Vec<Video>) -> Self {
        Self {
            videos: RwLock::new(videos),
        }
    }

    /// Add or replace a video
    pub fn insert(&self, video: Video) {
        let mut videos = self.videos.write().unwrap_or_else(|e| e.into_inner());
        match videos.iter_mut().find(|v| v.id == video.id) {
            Some(existing) => *existing = video,
            None => videos.push(video),
        }
    }

    pub fn len(&self) -> usize {
        self.videos.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VideoProvider for CatalogProvider {
    async fn search_videos_by_query(&self, term: &str, page: &PageRequest) -> Result<VideoPage> {
        let offset = match &page.page_id {
            Some(id) => id
                .parse::<usize>()
                .map_err(|_| Error::BadRequest(format!("invalid page id {:?}", id)))?,
            None => 0,
        };
        let page_size = if page.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page.page_size
        } as usize;

        let needle = term.trim().to_lowercase();
        let videos = self.videos.read().unwrap_or_else(|e| e.into_inner());
        let matching: Vec<&Video> = videos
            .iter()
            .filter(|v| needle.is_empty() || v.title.to_lowercase().contains(&needle))
            .collect();

        let end = (offset + page_size).min(matching.len());
        let page_videos = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|v| (*v).clone())
            .collect();
        let next_page_id = (end < matching.len()).then(|| end.to_string());

        Ok(VideoPage {
            videos: page_videos,
            next_page_id,
        })
    }

    async fn list_videos_by_ids(&self, ids: &[String]) -> Result<Vec<Video>> {
        let videos = self.videos.read().unwrap_or_else(|e| e.into_inner());
        Ok(ids
            .iter()
            .map(|id| {
                videos
                    .iter()
                    .find(|v| &v.id == id)
                    .cloned()
                    .unwrap_or_else(|| Video::unresolved(id.clone(), Provider::Youtube))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, title: &str) -> Video {
        Video {
            id: id.to_string(),
            provider: Provider::Youtube,
            title: title.to_string(),
            thumbnail_url: String::new(),
            duration_ms: 1000,
            publisher_name: Some("me".to_string()),
        }
    }

    #[tokio::test]
    async fn test_unknown_ids_come_back_unresolved() {
        let catalog = CatalogProvider::new(vec![video("a", "Alpha")]);
        let found = catalog
            .list_videos_by_ids(&["a".to_string(), "zz".to_string()])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found[0].is_confirmed());
        assert_eq!(found[1].id, "zz");
        assert!(!found[1].is_confirmed());
    }

    #[tokio::test]
    async fn test_search_pages_through_matches() {
        let catalog = CatalogProvider::new(vec![
            video("a", "Jazz one"),
            video("b", "Rock"),
            video("c", "jazz two"),
            video("d", "JAZZ three"),
        ]);

        let first = catalog
            .search_videos_by_query("jazz", &PageRequest { page_size: 2, page_id: None })
            .await
            .unwrap();
        let ids: Vec<&str> = first.videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(first.next_page_id.as_deref(), Some("2"));

        let second = catalog
            .search_videos_by_query("jazz", &PageRequest { page_size: 2, page_id: first.next_page_id })
            .await
            .unwrap();
        assert_eq!(second.videos.len(), 1);
        assert!(second.next_page_id.is_none());
    }

    #[tokio::test]
    async fn test_search_rejects_bad_page_id() {
        let catalog = CatalogProvider::new(Vec::new());
        let result = catalog
            .search_videos_by_query("x", &PageRequest { page_size: 2, page_id: Some("nope".into()) })
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }
}

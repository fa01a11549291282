//! YouTube Data API v3 client
//!
//! Search goes through the `search` endpoint, which only returns ids and
//! snippets; durations come from a second `videos` call, so every search
//! page costs two requests.

use super::VideoProvider;
use crate::error::{Error, Result};
use async_trait::async_trait;
use mxt_common::model::{PageRequest, VideoPage};
use mxt_common::{Provider, Video};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const USER_AGENT: &str = "MixTube/0.1.0";
/// The `videos` endpoint accepts at most 50 ids per call
const MAX_IDS_PER_REQUEST: usize = 50;
const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

impl VideoItem {
    fn into_video(self) -> Video {
        let thumbnail_url = ["medium", "high", "default"]
            .iter()
            .find_map(|size| self.snippet.thumbnails.get(*size))
            .map(|t| t.url.clone())
            .unwrap_or_default();

        let duration_ms = parse_iso8601_duration(&self.content_details.duration).unwrap_or_else(|| {
            tracing::warn!(
                video_id = %self.id,
                duration = %self.content_details.duration,
                "Unparseable video duration"
            );
            0
        });

        Video {
            id: self.id,
            provider: Provider::Youtube,
            title: self.snippet.title,
            thumbnail_url,
            duration_ms,
            publisher_name: Some(self.snippet.channel_title),
        }
    }
}

/// YouTube Data API client
pub struct YoutubeClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YoutubeClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, YOUTUBE_API_BASE_URL.to_string())
    }

    /// Client against another API root (proxies, test servers)
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Provider(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "YouTube API error {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Parse error: {}", e)))
    }

    async fn fetch_videos(&self, ids: &[String]) -> Result<HashMap<String, Video>> {
        let mut found = HashMap::new();
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = chunk.join(",");
            let response: VideosResponse = self
                .get_json(
                    "videos",
                    &[("part", "snippet,contentDetails"), ("id", joined.as_str())],
                )
                .await?;
            for item in response.items {
                let video = item.into_video();
                found.insert(video.id.clone(), video);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl VideoProvider for YoutubeClient {
    async fn search_videos_by_query(&self, term: &str, page: &PageRequest) -> Result<VideoPage> {
        let max_results = page.page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut params = vec![
            ("part", "id"),
            ("type", "video"),
            ("videoEmbeddable", "true"),
            ("q", term),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = &page.page_id {
            params.push(("pageToken", token.as_str()));
        }

        tracing::debug!(term = term, page_size = page.page_size, "Searching YouTube");

        let search: SearchResponse = self.get_json("search", &params).await?;
        let ids: Vec<String> = search
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();

        let mut details = self.fetch_videos(&ids).await?;
        // keep search ranking, drop ids that vanished in between
        let videos = ids.iter().filter_map(|id| details.remove(id)).collect();

        Ok(VideoPage {
            videos,
            next_page_id: search.next_page_token,
        })
    }

    async fn list_videos_by_ids(&self, ids: &[String]) -> Result<Vec<Video>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let details = self.fetch_videos(ids).await?;
        Ok(ids
            .iter()
            .map(|id| {
                details
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Video::unresolved(id.clone(), Provider::Youtube))
            })
            .collect())
    }
}

/// Parse an ISO-8601 duration such as `PT1H2M3S` into milliseconds
///
/// Only the day and time components YouTube emits are supported.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let rest = value.strip_prefix('P')?;
    let mut total_seconds: u64 = 0;
    let mut number = String::new();
    let mut in_time = false;

    for c in rest.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' => number.push(c),
            unit => {
                let n: u64 = number.parse().ok()?;
                number.clear();
                let factor = match (in_time, unit) {
                    (false, 'W') => 7 * 86_400,
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return None,
                };
                total_seconds = total_seconds.checked_add(n.checked_mul(factor)?)?;
            }
        }
    }

    if !number.is_empty() {
        return None;
    }
    Some(total_seconds * 1000)
}

//! Compact URL-safe encoding of a queue's video references
//!
//! Each reference is the provider code followed by the video id, references are
//! joined with `.`: `ydQw4w9WgXcQ.y9bZkp7q19f0`. Video ids never contain `.`
//! (see [`mxt_common::model::is_valid_video_id`]) so the encoding is lossless.
//! Every character used is unreserved in RFC 3986, the string can go into a
//! query parameter as is. The empty string encodes the empty queue.

use crate::error::{Error, Result};
use mxt_common::{Provider, VideoRef};

const SEPARATOR: char = '.';

/// Encode references in order
pub fn encode<'a>(refs: impl IntoIterator<Item = &'a VideoRef>) -> String {
    let mut out = String::new();
    for (i, video_ref) in refs.into_iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push(video_ref.provider.code());
        out.push_str(&video_ref.id);
    }
    out
}

/// Decode a string produced by [`encode`]
pub fn decode(encoded: &str) -> Result<Vec<VideoRef>> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }

    encoded
        .split(SEPARATOR)
        .enumerate()
        .map(|(position, token)| {
            let mut chars = token.chars();
            let code = chars.next().ok_or_else(|| {
                Error::Deserialize(format!("empty video reference at position {}", position))
            })?;
            let provider = Provider::from_code(code).map_err(|_| {
                Error::Deserialize(format!(
                    "unknown provider code {:?} at position {}",
                    code, position
                ))
            })?;
            VideoRef::new(chars.as_str(), provider).map_err(|_| {
                Error::Deserialize(format!("malformed video id at position {}", position))
            })
        })
        .collect()
}

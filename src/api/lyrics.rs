//! Musixmatch lyrics lookup through RapidAPI.
//!
//! The response body is stored untouched. The provider answers unknown songs
//! with a 200 whose body is an error message, so a "found" payload is not
//! guaranteed to contain lyrics.

use async_trait::async_trait;
use reqwest::Client;

use super::{send_with_backoff, Backoff};
use crate::fetch::{FetchOutcome, Lookup, Miss};
use crate::model::{LyricsRecord, StoredTrack};

const LYRICS_PATH: &str = "/songs/lyrics";

/// Lookup key: a stored track with quote characters already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsQuery {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
}

impl LyricsQuery {
    /// `None` when the track has no artist to search by.
    pub fn from_track(track: &StoredTrack) -> Option<Self> {
        let artist = track.artist_name.as_deref()?;
        Some(Self {
            track_id: track.track_id.clone(),
            track_name: strip_quotes(&track.track_name),
            artist_name: strip_quotes(artist),
        })
    }
}

/// Remove `'` and `"` before the values go into the query string.
pub fn strip_quotes(text: &str) -> String {
    text.chars().filter(|c| *c != '\'' && *c != '"').collect()
}

pub struct LyricsClient {
    http: Client,
    api_key: String,
    api_host: String,
    base_url: String,
    backoff: Backoff,
}

impl LyricsClient {
    pub fn new(http: Client, api_key: String, api_host: String, backoff: Backoff) -> Self {
        let base_url = format!("https://{}", api_host);
        Self {
            http,
            api_key,
            api_host,
            base_url,
            backoff,
        }
    }
}

pub(crate) fn classify_lyrics(
    query: &LyricsQuery,
    status: u16,
    body: String,
) -> FetchOutcome<LyricsRecord> {
    if status != 200 {
        return FetchOutcome::Miss(Miss::Status(status));
    }
    if body.trim().is_empty() {
        return FetchOutcome::Miss(Miss::NoPayload);
    }
    FetchOutcome::Found(LyricsRecord {
        track_id: query.track_id.clone(),
        track_name: query.track_name.clone(),
        artist_name: query.artist_name.clone(),
        lyrics: body,
    })
}

#[async_trait]
impl Lookup for LyricsClient {
    type Key = LyricsQuery;
    type Record = LyricsRecord;

    fn label(key: &LyricsQuery) -> String {
        format!("{} - {}", key.artist_name, key.track_name)
    }

    async fn lookup(&self, query: &LyricsQuery) -> FetchOutcome<LyricsRecord> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), LYRICS_PATH);
        let request = || {
            self.http
                .get(&url)
                .header("x-rapidapi-key", &self.api_key)
                .header("x-rapidapi-host", &self.api_host)
                .query(&[
                    ("t", query.track_name.as_str()),
                    ("a", query.artist_name.as_str()),
                ])
        };

        let resp = match send_with_backoff(request, &self.backoff).await {
            Ok(resp) => resp,
            Err(e) => return FetchOutcome::Fatal(e),
        };
        let status = resp.status().as_u16();
        match resp.text().await {
            Ok(body) => classify_lyrics(query, status, body),
            Err(e) => FetchOutcome::Fatal(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, artist: Option<&str>) -> StoredTrack {
        StoredTrack {
            track_id: "t1".into(),
            track_name: name.into(),
            artist_name: artist.map(str::to_string),
        }
    }

    #[test]
    fn quotes_are_stripped_from_both_fields() {
        let query = LyricsQuery::from_track(&track(r#"Don't Stop "Believin'""#, Some("Guns N' Roses")))
            .unwrap();
        assert_eq!(query.track_name, "Dont Stop Believin");
        assert_eq!(query.artist_name, "Guns N Roses");
    }

    #[test]
    fn other_characters_are_left_alone() {
        assert_eq!(strip_quotes("Beyoncé & Jay-Z (feat. `x`)"), "Beyoncé & Jay-Z (feat. `x`)");
    }

    #[test]
    fn track_without_artist_has_no_query() {
        assert_eq!(LyricsQuery::from_track(&track("Song", None)), None);
    }

    #[test]
    fn body_is_kept_verbatim() {
        let query = LyricsQuery::from_track(&track("Song", Some("Band"))).unwrap();
        let raw = r#"{"error":"lyrics not found"}"#.to_string();
        match classify_lyrics(&query, 200, raw.clone()) {
            FetchOutcome::Found(record) => {
                assert_eq!(record.lyrics, raw);
                assert_eq!(record.track_id, "t1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_200_and_empty_bodies_miss() {
        let query = LyricsQuery::from_track(&track("Song", Some("Band"))).unwrap();
        assert!(matches!(
            classify_lyrics(&query, 403, "denied".into()),
            FetchOutcome::Miss(Miss::Status(403))
        ));
        assert!(matches!(
            classify_lyrics(&query, 200, "  ".into()),
            FetchOutcome::Miss(Miss::NoPayload)
        ));
    }
}

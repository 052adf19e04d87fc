//! Last.fm `artist.getInfo` client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{send_with_backoff, Backoff};
use crate::fetch::{FetchOutcome, Lookup, Miss};
use crate::model::ArtistInfoRow;
use crate::normalize::normalize_artist_info;

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

pub struct LastFmClient {
    http: Client,
    api_key: String,
    base_url: String,
    backoff: Backoff,
}

impl LastFmClient {
    pub fn new(http: Client, api_key: String, backoff: Backoff) -> Self {
        Self {
            http,
            api_key,
            base_url: LASTFM_API_BASE.to_string(),
            backoff,
        }
    }
}

/// Turn one `artist.getInfo` response into an outcome.
///
/// Last.fm reports unknown artists with a 200 and an `{"error": 6, ..}` body,
/// which lands here as [`Miss::NoPayload`].
pub(crate) fn classify_artist_info(status: u16, body: &str) -> FetchOutcome<ArtistInfoRow> {
    if status != 200 {
        return FetchOutcome::Miss(Miss::Status(status));
    }
    let data: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return FetchOutcome::Miss(Miss::Malformed(e.to_string())),
    };
    match data.get("artist") {
        Some(artist @ Value::Object(_)) => match normalize_artist_info(artist) {
            Ok(row) => FetchOutcome::Found(row),
            Err(e) => FetchOutcome::Miss(Miss::Malformed(e.to_string())),
        },
        _ => {
            if let Some(message) = data.get("message").and_then(Value::as_str) {
                tracing::debug!(detail = message, "last.fm returned an error body");
            }
            FetchOutcome::Miss(Miss::NoPayload)
        }
    }
}

#[async_trait]
impl Lookup for LastFmClient {
    type Key = String;
    type Record = ArtistInfoRow;

    fn label(key: &String) -> String {
        key.clone()
    }

    async fn lookup(&self, artist: &String) -> FetchOutcome<ArtistInfoRow> {
        let request = || {
            self.http.get(&self.base_url).query(&[
                ("method", "artist.getInfo"),
                ("artist", artist.as_str()),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
            ])
        };

        let resp = match send_with_backoff(request, &self.backoff).await {
            Ok(resp) => resp,
            Err(e) => return FetchOutcome::Fatal(e),
        };
        let status = resp.status().as_u16();
        match resp.text().await {
            Ok(body) => classify_artist_info(status, &body),
            Err(e) => FetchOutcome::Fatal(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(outcome: FetchOutcome<ArtistInfoRow>) -> ArtistInfoRow {
        match outcome {
            FetchOutcome::Found(row) => row,
            other => panic!("expected a record, got {other:?}"),
        }
    }

    #[test]
    fn valid_payload_is_found() {
        let body = r#"{"artist":{"name":"Björk","mbid":"87c5dedd-371d-4a53-9f7f-80522fb7f3cb",
            "url":"https://www.last.fm/music/Bj%C3%B6rk",
            "stats":{"listeners":"2000000","playcount":"150000000"},
            "similar":{"artist":[{"name":"Sigur Rós"}]},
            "tags":{"tag":[{"name":"electronic"},{"name":"icelandic"}]},
            "bio":{"summary":"Icelandic singer."}}}"#;
        let row = found(classify_artist_info(200, body));
        assert_eq!(row.artist_name, "Björk");
        assert_eq!(row.listeners, Some(2_000_000));
        assert_eq!(row.tags, vec!["electronic", "icelandic"]);
    }

    #[test]
    fn error_status_is_a_miss() {
        assert!(matches!(
            classify_artist_info(404, "Not Found"),
            FetchOutcome::Miss(Miss::Status(404))
        ));
    }

    #[test]
    fn unknown_artist_body_is_no_payload() {
        let body = r#"{"error":6,"message":"The artist you supplied could not be found"}"#;
        assert!(matches!(
            classify_artist_info(200, body),
            FetchOutcome::Miss(Miss::NoPayload)
        ));
    }

    #[test]
    fn garbage_body_is_malformed() {
        assert!(matches!(
            classify_artist_info(200, "<html>"),
            FetchOutcome::Miss(Miss::Malformed(_))
        ));
        assert!(matches!(
            classify_artist_info(200, r#"{"artist":{"url":"x"}}"#),
            FetchOutcome::Miss(Miss::Malformed(_))
        ));
    }
}

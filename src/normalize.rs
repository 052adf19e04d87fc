//! Field normalizer: nested API payloads to flat rows.
//!
//! Missing optional fields become `None` (SQL NULL). Only a missing primary
//! key rejects a record.

use serde_json::Value;
use thiserror::Error;

use crate::model::{ArtistInfoRow, ArtistRow, TrackRow};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{record} record has no {field}")]
pub struct NormalizeError {
    pub record: &'static str,
    pub field: &'static str,
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn int_at(value: &Value, pointer: &str) -> Option<i32> {
    value
        .pointer(pointer)?
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
}

// Last.fm encodes counters as strings; Spotify as numbers.
fn count_at(value: &Value, pointer: &str) -> Option<i64> {
    match value.pointer(pointer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bool_at(value: &Value, pointer: &str) -> Option<bool> {
    value.pointer(pointer)?.as_bool()
}

fn required(
    value: &Value,
    pointer: &str,
    record: &'static str,
    field: &'static str,
) -> Result<String, NormalizeError> {
    text_at(value, pointer).ok_or(NormalizeError { record, field })
}

/// Names from a list that Last.fm may serialize as an array, a single
/// object, or an empty string.
fn names_at(value: &Value, pointer: &str) -> Vec<String> {
    let items: Vec<&Value> = match value.pointer(pointer) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            other => text_at(other, "/name"),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Normalizers
// ---------------------------------------------------------------------------

/// Spotify track object (`/v1/me/top/tracks` item).
pub fn normalize_track(track: &Value) -> Result<TrackRow, NormalizeError> {
    Ok(TrackRow {
        track_id: required(track, "/id", "track", "id")?,
        track_name: required(track, "/name", "track", "name")?,
        artist_id: text_at(track, "/artists/0/id"),
        artist_name: text_at(track, "/artists/0/name"),
        popularity: int_at(track, "/popularity"),
        duration_ms: int_at(track, "/duration_ms"),
        explicit: bool_at(track, "/explicit"),
        album_name: text_at(track, "/album/name"),
        album_id: text_at(track, "/album/id"),
        album_release_date: text_at(track, "/album/release_date"),
        album_type: text_at(track, "/album/album_type"),
        album_total_tracks: int_at(track, "/album/total_tracks"),
        album_image: text_at(track, "/album/images/0/url"),
        preview_url: text_at(track, "/preview_url"),
        external_url: text_at(track, "/external_urls/spotify"),
    })
}

/// Spotify artist object (`/v1/me/top/artists` item).
pub fn normalize_artist(artist: &Value) -> Result<ArtistRow, NormalizeError> {
    Ok(ArtistRow {
        artist_id: required(artist, "/id", "artist", "id")?,
        artist_name: required(artist, "/name", "artist", "name")?,
        popularity: int_at(artist, "/popularity"),
        genres: names_at(artist, "/genres"),
        followers: count_at(artist, "/followers/total"),
        external_url: text_at(artist, "/external_urls/spotify"),
    })
}

/// Last.fm `artist.getInfo` payload, i.e. the object under `"artist"`.
pub fn normalize_artist_info(artist: &Value) -> Result<ArtistInfoRow, NormalizeError> {
    Ok(ArtistInfoRow {
        mbid: text_at(artist, "/mbid"),
        artist_name: required(artist, "/name", "artist info", "name")?,
        url: text_at(artist, "/url"),
        listeners: count_at(artist, "/stats/listeners"),
        playcount: count_at(artist, "/stats/playcount"),
        similar_artists: names_at(artist, "/similar/artist"),
        tags: names_at(artist, "/tags/tag"),
        bio_summary: text_at(artist, "/bio/summary"),
        lastfm_name: None,
    })
}

/// Apply `normalize` to every item, splitting accepted rows from rejects.
pub fn normalize_all<T>(
    items: &[Value],
    normalize: impl Fn(&Value) -> Result<T, NormalizeError>,
) -> (Vec<T>, Vec<NormalizeError>) {
    let mut rows = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for item in items {
        match normalize(item) {
            Ok(row) => rows.push(row),
            Err(e) => rejected.push(e),
        }
    }
    (rows, rejected)
}

//! Flat records, one per destination table.

use crate::store::schema::{ARTISTS, ARTISTS_INFO, TRACKS, TRACK_LYRICS};
use crate::store::{Row, SqlValue, TableSpec, Tabular};

/// One of the user's top tracks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackRow {
    pub track_id: String,
    pub track_name: String,
    /// Primary (first credited) artist.
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub popularity: Option<i32>,
    pub duration_ms: Option<i32>,
    pub explicit: Option<bool>,
    pub album_name: Option<String>,
    pub album_id: Option<String>,
    pub album_release_date: Option<String>,
    pub album_type: Option<String>,
    pub album_total_tracks: Option<i32>,
    /// URL of the largest cover image.
    pub album_image: Option<String>,
    pub preview_url: Option<String>,
    pub external_url: Option<String>,
}

/// One of the user's top artists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArtistRow {
    pub artist_id: String,
    pub artist_name: String,
    pub popularity: Option<i32>,
    pub genres: Vec<String>,
    pub followers: Option<i64>,
    pub external_url: Option<String>,
}

/// Biography and folksonomy data for one artist name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArtistInfoRow {
    pub mbid: Option<String>,
    pub artist_name: String,
    pub url: Option<String>,
    pub listeners: Option<i64>,
    pub playcount: Option<i64>,
    pub similar_artists: Vec<String>,
    pub tags: Vec<String>,
    pub bio_summary: Option<String>,
    /// The artist name as Last.fm spelled it in its answer.
    pub lastfm_name: Option<String>,
}

impl ArtistInfoRow {
    /// File this profile under `name`, the name it was looked up by. The
    /// spelling Last.fm returned is kept in `lastfm_name`.
    pub fn keyed_by(mut self, name: &str) -> Self {
        let answered = std::mem::replace(&mut self.artist_name, name.to_string());
        if self.lastfm_name.is_none() {
            self.lastfm_name = Some(answered);
        }
        self
    }
}

/// Raw lyrics response for one stored track. The payload is kept verbatim,
/// so it may be an error body the provider returned with a 200.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsRecord {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub lyrics: String,
}

/// A track as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrack {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: Option<String>,
}

fn text(value: &Option<String>) -> SqlValue {
    SqlValue::Text(value.clone())
}

fn owned(value: &str) -> SqlValue {
    SqlValue::Text(Some(value.to_string()))
}

impl Tabular for TrackRow {
    fn table() -> &'static TableSpec {
        &TRACKS
    }

    fn to_row(&self) -> Row {
        vec![
            owned(&self.track_id),
            owned(&self.track_name),
            text(&self.artist_id),
            text(&self.artist_name),
            SqlValue::Int(self.popularity),
            SqlValue::Int(self.duration_ms),
            SqlValue::Bool(self.explicit),
            text(&self.album_name),
            text(&self.album_id),
            text(&self.album_release_date),
            text(&self.album_type),
            SqlValue::Int(self.album_total_tracks),
            text(&self.album_image),
            text(&self.preview_url),
            text(&self.external_url),
        ]
    }
}

impl Tabular for ArtistRow {
    fn table() -> &'static TableSpec {
        &ARTISTS
    }

    fn to_row(&self) -> Row {
        vec![
            owned(&self.artist_id),
            owned(&self.artist_name),
            SqlValue::Int(self.popularity),
            SqlValue::TextArray(self.genres.clone()),
            SqlValue::BigInt(self.followers),
            text(&self.external_url),
        ]
    }
}

impl Tabular for ArtistInfoRow {
    fn table() -> &'static TableSpec {
        &ARTISTS_INFO
    }

    fn to_row(&self) -> Row {
        vec![
            text(&self.mbid),
            owned(&self.artist_name),
            text(&self.url),
            SqlValue::BigInt(self.listeners),
            SqlValue::BigInt(self.playcount),
            SqlValue::TextArray(self.similar_artists.clone()),
            SqlValue::TextArray(self.tags.clone()),
            text(&self.bio_summary),
            text(&self.lastfm_name),
        ]
    }
}

impl Tabular for LyricsRecord {
    fn table() -> &'static TableSpec {
        &TRACK_LYRICS
    }

    fn to_row(&self) -> Row {
        vec![
            owned(&self.track_id),
            owned(&self.track_name),
            owned(&self.artist_name),
            owned(&self.lyrics),
        ]
    }
}

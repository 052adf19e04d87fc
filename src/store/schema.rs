use super::{Column, ColumnType::*, TableSpec};

pub static TRACKS: TableSpec = TableSpec {
    name: "tracks",
    columns: &[
        Column::required("track_id", Varchar),
        Column::required("track_name", Text),
        Column::optional("artist_id", Varchar),
        Column::optional("artist_name", Text),
        Column::optional("popularity", Int),
        Column::optional("duration_ms", Int),
        Column::optional("explicit", Boolean),
        Column::optional("album_name", Text),
        Column::optional("album_id", Varchar),
        Column::optional("album_release_date", Varchar),
        Column::optional("album_type", Varchar),
        Column::optional("album_total_tracks", Int),
        Column::optional("album_images", Text),
        Column::optional("preview_url", Text),
        Column::optional("external_urls", Text),
    ],
    primary_key: Some("track_id"),
};

pub static ARTISTS: TableSpec = TableSpec {
    name: "artists",
    columns: &[
        Column::required("artist_id", Varchar),
        Column::required("artist_name", Text),
        Column::optional("popularity", Int),
        Column::optional("genres", TextArray),
        Column::optional("followers", BigInt),
        Column::optional("external_urls", Text),
    ],
    primary_key: Some("artist_id"),
};

// Keyed by the queried name; `lastfm_name` holds Last.fm's spelling.
pub static ARTISTS_INFO: TableSpec = TableSpec {
    name: "artists_info",
    columns: &[
        Column::optional("mbid", Varchar),
        Column::required("artist_name", Text),
        Column::optional("url", Text),
        Column::optional("listeners", BigInt),
        Column::optional("playcount", BigInt),
        Column::optional("similar_artists", TextArray),
        Column::optional("tags", TextArray),
        Column::optional("bio_summary", Text),
        Column::optional("lastfm_name", Text),
    ],
    primary_key: Some("artist_name"),
};

pub static TRACK_LYRICS: TableSpec = TableSpec {
    name: "track_lyrics",
    columns: &[
        Column::required("track_id", Varchar),
        Column::required("track_name", Text),
        Column::required("artist_name", Text),
        Column::optional("lyrics", Text),
    ],
    primary_key: None,
};

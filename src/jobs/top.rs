//! Top tracks / top artists sync with Last.fm enrichment.

use async_trait::async_trait;

use crate::api::spotify::{StreamingApi, TimeRange, MAX_TOP_ITEMS};
use crate::dedup::union_names;
use crate::error::SyncResult;
use crate::fetch::{fetch_paced, FetchOutcome, Lookup, Miss, OnFatal, Pacer};
use crate::model::ArtistInfoRow;
use crate::normalize::{normalize_all, normalize_artist, normalize_track, NormalizeError};
use crate::output;
use crate::store::{write_records, Store, WriteMode};

use super::with_run_lock;

#[derive(Debug, Clone)]
pub struct TopOptions {
    pub limit: u32,
    pub time_range: TimeRange,
    pub write_mode: WriteMode,
    pub pacer: Pacer,
    pub on_fatal: OnFatal,
}

impl Default for TopOptions {
    fn default() -> Self {
        Self {
            limit: MAX_TOP_ITEMS,
            time_range: TimeRange::Long,
            write_mode: WriteMode::Upsert,
            pacer: Pacer::default(),
            on_fatal: OnFatal::Abort,
        }
    }
}

#[derive(Debug, Default)]
pub struct TopReport {
    pub tracks_fetched: usize,
    pub tracks_rejected: usize,
    pub tracks_written: u64,
    pub artists_fetched: usize,
    pub artists_rejected: usize,
    pub artists_written: u64,
    /// Distinct artist names sent to Last.fm.
    pub artist_set: Vec<String>,
    pub info_written: u64,
    pub info_misses: Vec<(String, Miss)>,
}

pub async fn run_top_sync<A, M, S>(
    streaming: &A,
    metadata: &M,
    store: &S,
    options: &TopOptions,
) -> SyncResult<TopReport>
where
    A: StreamingApi + ?Sized,
    M: Lookup<Key = String, Record = ArtistInfoRow>,
    S: Store + ?Sized,
{
    with_run_lock(store, sync(streaming, metadata, store, options)).await
}

/// Files every profile under the name it was looked up by, so two names
/// Last.fm resolves to the same artist still get a row each.
struct KeyedByQuery<'a, M>(&'a M);

#[async_trait]
impl<'a, M> Lookup for KeyedByQuery<'a, M>
where
    M: Lookup<Key = String, Record = ArtistInfoRow>,
{
    type Key = String;
    type Record = ArtistInfoRow;

    fn label(key: &String) -> String {
        M::label(key)
    }

    async fn lookup(&self, name: &String) -> FetchOutcome<ArtistInfoRow> {
        match self.0.lookup(name).await {
            FetchOutcome::Found(row) => FetchOutcome::Found(row.keyed_by(name)),
            other => other,
        }
    }
}

fn log_rejects(kind: &str, rejected: &[NormalizeError]) {
    for err in rejected {
        tracing::warn!(kind, error = %err, "skipping record");
    }
}

async fn sync<A, M, S>(
    streaming: &A,
    metadata: &M,
    store: &S,
    options: &TopOptions,
) -> SyncResult<TopReport>
where
    A: StreamingApi + ?Sized,
    M: Lookup<Key = String, Record = ArtistInfoRow>,
    S: Store + ?Sized,
{
    let mut report = TopReport::default();

    output::step("Authenticating with Spotify...");
    streaming.authenticate().await?;
    output::done("Token ready");

    output::step("Fetching top tracks and artists...");
    let raw_tracks = streaming
        .top_tracks(options.limit, options.time_range)
        .await?;
    let raw_artists = streaming
        .top_artists(options.limit, options.time_range)
        .await?;
    report.tracks_fetched = raw_tracks.len();
    report.artists_fetched = raw_artists.len();
    output::done(&format!(
        "{} tracks, {} artists ({})",
        raw_tracks.len(),
        raw_artists.len(),
        options.time_range.as_param()
    ));

    let (tracks, rejected_tracks) = normalize_all(&raw_tracks, normalize_track);
    let (artists, rejected_artists) = normalize_all(&raw_artists, normalize_artist);
    log_rejects("track", &rejected_tracks);
    log_rejects("artist", &rejected_artists);
    report.tracks_rejected = rejected_tracks.len();
    report.artists_rejected = rejected_artists.len();

    output::step("Saving tracks and artists...");
    report.tracks_written = write_records(store, &tracks, options.write_mode).await?;
    report.artists_written = write_records(store, &artists, options.write_mode).await?;
    output::done(&format!(
        "{} tracks, {} artists saved",
        report.tracks_written, report.artists_written
    ));

    let names = union_names(
        tracks.iter().filter_map(|t| t.artist_name.as_deref()),
        artists.iter().map(|a| a.artist_name.as_str()),
    );
    report.artist_set = names.into_iter().collect();

    output::step(&format!(
        "Fetching Last.fm info for {} artists...",
        report.artist_set.len()
    ));
    let enriched = fetch_paced(
        &KeyedByQuery(metadata),
        &report.artist_set,
        &options.pacer,
        options.on_fatal,
        |progress| output::item(&progress),
    )
    .await?;

    report.info_written = write_records(store, &enriched.records, options.write_mode).await?;
    report.info_misses = enriched.misses;
    output::done(&format!("{} artist profiles saved", report.info_written));

    Ok(report)
}

//! Lyrics for every stored track. The destination table is rebuilt from
//! scratch on each run.

use crate::api::lyrics::LyricsQuery;
use crate::error::SyncResult;
use crate::fetch::{fetch_paced, Lookup, Miss, OnFatal, Pacer};
use crate::model::LyricsRecord;
use crate::output;
use crate::store::{write_records, Store, WriteMode};

use super::with_run_lock;

#[derive(Debug, Clone, Default)]
pub struct LyricsOptions {
    pub pacer: Pacer,
    pub on_fatal: OnFatal,
    /// Only look up the first N stored tracks (0 = all)
    pub limit: usize,
}

#[derive(Debug, Default)]
pub struct LyricsReport {
    pub tracks_read: usize,
    /// Tracks with no artist name to search by.
    pub tracks_skipped: usize,
    pub lyrics_written: u64,
    pub misses: Vec<(String, Miss)>,
}

pub async fn run_lyrics_sync<L, S>(
    lyrics: &L,
    store: &S,
    options: &LyricsOptions,
) -> SyncResult<LyricsReport>
where
    L: Lookup<Key = LyricsQuery, Record = LyricsRecord>,
    S: Store + ?Sized,
{
    with_run_lock(store, sync(lyrics, store, options)).await
}

async fn sync<L, S>(lyrics: &L, store: &S, options: &LyricsOptions) -> SyncResult<LyricsReport>
where
    L: Lookup<Key = LyricsQuery, Record = LyricsRecord>,
    S: Store + ?Sized,
{
    let mut report = LyricsReport::default();

    output::step("Reading stored tracks...");
    let mut tracks = store.read_tracks().await?;
    if options.limit > 0 {
        tracks.truncate(options.limit);
    }
    report.tracks_read = tracks.len();
    output::done(&format!("{} tracks", tracks.len()));

    let mut queries = Vec::with_capacity(tracks.len());
    for track in &tracks {
        match LyricsQuery::from_track(track) {
            Some(query) => queries.push(query),
            None => {
                tracing::warn!(track_id = %track.track_id, "track has no artist, skipping lyrics");
                output::skipped(&format!("{} (no artist)", track.track_name));
                report.tracks_skipped += 1;
            }
        }
    }

    output::step(&format!("Fetching lyrics for {} tracks...", queries.len()));
    let fetched = fetch_paced(lyrics, &queries, &options.pacer, options.on_fatal, |progress| {
        output::item(&progress)
    })
    .await?;

    report.lyrics_written =
        write_records(store, &fetched.records, WriteMode::Replace).await?;
    report.misses = fetched.misses;
    output::done(&format!("{} lyrics saved", report.lyrics_written));

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::api::ApiError;
    use crate::error::SyncError;
    use crate::fetch::FetchOutcome;
    use crate::model::TrackRow;
    use crate::store::schema::TRACK_LYRICS;
    use crate::store::MemoryStore;

    /// Echoes the query back as the payload; 404 for tracks in `missing`.
    struct StubLyrics {
        missing: Vec<&'static str>,
        broken: bool,
        seen: Mutex<Vec<LyricsQuery>>,
    }

    impl StubLyrics {
        fn new(missing: &[&'static str]) -> Self {
            Self {
                missing: missing.to_vec(),
                broken: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Lookup for StubLyrics {
        type Key = LyricsQuery;
        type Record = LyricsRecord;

        fn label(key: &LyricsQuery) -> String {
            key.track_name.clone()
        }

        async fn lookup(&self, query: &LyricsQuery) -> FetchOutcome<LyricsRecord> {
            self.seen.lock().unwrap().push(query.clone());
            if self.broken {
                return FetchOutcome::Fatal(ApiError::Transport("reset".into()));
            }
            if self.missing.contains(&query.track_name.as_str()) {
                return FetchOutcome::Miss(Miss::Status(404));
            }
            FetchOutcome::Found(LyricsRecord {
                track_id: query.track_id.clone(),
                track_name: query.track_name.clone(),
                artist_name: query.artist_name.clone(),
                lyrics: format!("lyrics of {}", query.track_name),
            })
        }
    }

    async fn seed(store: &MemoryStore, tracks: &[(&str, &str, Option<&str>)]) {
        let rows: Vec<TrackRow> = tracks
            .iter()
            .map(|(id, name, artist)| TrackRow {
                track_id: id.to_string(),
                track_name: name.to_string(),
                artist_name: artist.map(str::to_string),
                ..Default::default()
            })
            .collect();
        write_records(store, &rows, WriteMode::Upsert).await.unwrap();
    }

    fn fast() -> LyricsOptions {
        LyricsOptions {
            pacer: Pacer::new(Duration::ZERO),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn every_track_with_an_artist_is_looked_up() {
        let store = MemoryStore::new();
        seed(
            &store,
            &[
                ("1", "Don't Speak", Some("No Doubt")),
                ("2", "Orphan", None),
                ("3", "Gone", Some("Band")),
            ],
        )
        .await;
        let lyrics = StubLyrics::new(&["Gone"]);

        let report = run_lyrics_sync(&lyrics, &store, &fast()).await.unwrap();

        assert_eq!(report.tracks_read, 3);
        assert_eq!(report.tracks_skipped, 1);
        assert_eq!(report.lyrics_written, 1);
        assert_eq!(report.misses.len(), 1);

        let seen = lyrics.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].track_name, "Dont Speak");

        let rows = store.rows(TRACK_LYRICS.name);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][3].as_text(), Some("lyrics of Dont Speak"));
    }

    #[tokio::test]
    async fn each_run_replaces_previous_lyrics() {
        let store = MemoryStore::new();
        seed(&store, &[("1", "One", Some("X")), ("2", "Two", Some("X"))]).await;
        run_lyrics_sync(&StubLyrics::new(&[]), &store, &fast())
            .await
            .unwrap();
        assert_eq!(store.row_count(TRACK_LYRICS.name), 2);

        run_lyrics_sync(&StubLyrics::new(&["One"]), &store, &fast())
            .await
            .unwrap();
        let rows = store.rows(TRACK_LYRICS.name);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1].as_text(), Some("Two"));
    }

    #[tokio::test]
    async fn empty_store_produces_empty_table() {
        let store = MemoryStore::new();
        let report = run_lyrics_sync(&StubLyrics::new(&[]), &store, &fast())
            .await
            .unwrap();
        assert_eq!(report.tracks_read, 0);
        assert_eq!(report.lyrics_written, 0);
    }

    #[tokio::test]
    async fn limit_caps_the_work_list() {
        let store = MemoryStore::new();
        seed(&store, &[("1", "A", Some("X")), ("2", "B", Some("X")), ("3", "C", Some("X"))]).await;
        let options = LyricsOptions {
            limit: 2,
            ..fast()
        };
        let report = run_lyrics_sync(&StubLyrics::new(&[]), &store, &options)
            .await
            .unwrap();
        assert_eq!(report.lyrics_written, 2);
    }

    #[tokio::test]
    async fn transport_failure_keeps_old_lyrics() {
        let store = MemoryStore::new();
        seed(&store, &[("1", "One", Some("X"))]).await;
        run_lyrics_sync(&StubLyrics::new(&[]), &store, &fast())
            .await
            .unwrap();

        let broken = StubLyrics {
            broken: true,
            ..StubLyrics::new(&[])
        };
        let err = run_lyrics_sync(&broken, &store, &fast()).await.unwrap_err();

        assert!(matches!(err, SyncError::Upstream(_)));
        assert_eq!(store.row_count(TRACK_LYRICS.name), 1);
        assert!(!store.is_locked());
    }
}

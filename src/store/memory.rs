use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::schema::TRACKS;
use super::{Row, Store, StoreError, TableSpec, WriteMode};
use crate::model::StoredTrack;

/// Process-local store with the same write semantics as Postgres.
///
/// Used by `--dry-run` and by the tests. Tables live only as long as the
/// store does.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<&'static str, MemTable>>,
    locked: AtomicBool,
}

struct MemTable {
    spec: &'static TableSpec,
    rows: Vec<Row>,
}

impl MemTable {
    fn new(spec: &'static TableSpec) -> Self {
        Self {
            spec,
            rows: Vec::new(),
        }
    }

    fn key_of<'r>(&self, row: &'r Row) -> Option<&'r super::SqlValue> {
        let idx = self.spec.column_index(self.spec.primary_key?)?;
        row.get(idx)
    }

    fn position(&self, row: &Row) -> Option<usize> {
        let key = self.key_of(row)?;
        self.rows.iter().position(|r| self.key_of(r) == Some(key))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a table's rows in write order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .map(|t| t.get(table).map(|t| t.rows.clone()).unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

impl MemoryStore {
    fn lock_tables(&self) -> Result<MutexGuard<'_, HashMap<&'static str, MemTable>>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn write(
        &self,
        table: &'static TableSpec,
        rows: &[Row],
        mode: WriteMode,
    ) -> Result<u64, StoreError> {
        for row in rows {
            table.check_row(row)?;
        }
        if mode == WriteMode::Upsert {
            table.require_key()?;
        }

        let mut tables = self.lock_tables()?;

        // Stage on a copy so a failing row leaves the committed table untouched.
        let mut staged = match (mode, tables.get(table.name)) {
            (WriteMode::Replace, _) | (_, None) => MemTable::new(table),
            (_, Some(existing)) => MemTable {
                spec: existing.spec,
                rows: existing.rows.clone(),
            },
        };

        for row in rows {
            match (mode, staged.position(row)) {
                (WriteMode::Upsert, Some(idx)) => staged.rows[idx] = row.clone(),
                (WriteMode::Insert | WriteMode::Replace, Some(_)) => {
                    return Err(StoreError::Conflict(table.name.to_string()));
                }
                (_, None) => staged.rows.push(row.clone()),
            }
        }

        tables.insert(table.name, staged);
        Ok(rows.len() as u64)
    }

    async fn read_tracks(&self) -> Result<Vec<StoredTrack>, StoreError> {
        let id = TRACKS.column_index("track_id");
        let name = TRACKS.column_index("track_name");
        let artist = TRACKS.column_index("artist_name");
        let (Some(id), Some(name), Some(artist)) = (id, name, artist) else {
            return Err(TRACKS.mismatch(
                "track_id, track_name and artist_name columns are required".to_string(),
            ));
        };

        let rows = self
            .lock_tables()?
            .get(TRACKS.name)
            .map(|t| t.rows.clone())
            .unwrap_or_default();
        let mut tracks: Vec<StoredTrack> = rows
            .iter()
            .filter_map(|row| {
                Some(StoredTrack {
                    track_id: row[id].as_text()?.to_string(),
                    track_name: row[name].as_text()?.to_string(),
                    artist_name: row[artist].as_text().map(str::to_string),
                })
            })
            .collect();
        tracks.sort_by(|a, b| (&a.track_name, &a.track_id).cmp(&(&b.track_name, &b.track_id)));
        Ok(tracks)
    }

    async fn try_lock_run(&self) -> Result<bool, StoreError> {
        Ok(self
            .locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok())
    }

    async fn unlock_run(&self) -> Result<(), StoreError> {
        self.locked.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtistRow, LyricsRecord, TrackRow};
    use crate::store::schema::{ARTISTS, TRACK_LYRICS};
    use crate::store::{write_records, SqlValue, Tabular};

    fn artist(id: &str, name: &str) -> ArtistRow {
        ArtistRow {
            artist_id: id.into(),
            artist_name: name.into(),
            ..Default::default()
        }
    }

    fn lyrics(id: &str) -> LyricsRecord {
        LyricsRecord {
            track_id: id.into(),
            track_name: format!("song {id}"),
            artist_name: "someone".into(),
            lyrics: "la la".into(),
        }
    }

    #[tokio::test]
    async fn insert_conflict_leaves_prior_content() {
        let store = MemoryStore::new();
        write_records(&store, &[artist("1", "A")], WriteMode::Insert)
            .await
            .unwrap();

        let err = write_records(
            &store,
            &[artist("2", "B"), artist("1", "A again")],
            WriteMode::Insert,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref t) if t == "artists"));

        let rows = store.rows(ARTISTS.name);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], SqlValue::Text(Some("A".into())));
    }

    #[tokio::test]
    async fn upsert_overwrites_by_key() {
        let store = MemoryStore::new();
        write_records(&store, &[artist("1", "A"), artist("2", "B")], WriteMode::Upsert)
            .await
            .unwrap();
        write_records(&store, &[artist("1", "A renamed")], WriteMode::Upsert)
            .await
            .unwrap();

        let rows = store.rows(ARTISTS.name);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1].as_text(), Some("A renamed"));
    }

    #[tokio::test]
    async fn replace_keeps_only_the_latest_batch() {
        let store = MemoryStore::new();
        write_records(&store, &[lyrics("1"), lyrics("2"), lyrics("3")], WriteMode::Replace)
            .await
            .unwrap();
        write_records(&store, &[lyrics("9")], WriteMode::Replace)
            .await
            .unwrap();

        let rows = store.rows(TRACK_LYRICS.name);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].as_text(), Some("9"));
    }

    #[tokio::test]
    async fn null_in_required_column_is_rejected() {
        let store = MemoryStore::new();
        let mut row = artist("1", "A").to_row();
        row[1] = SqlValue::Text(None);
        let err = store.write(&ARTISTS, &[row], WriteMode::Upsert).await;
        assert!(matches!(err, Err(StoreError::Schema { .. })));
        assert_eq!(store.row_count(ARTISTS.name), 0);
    }

    #[tokio::test]
    async fn tracks_read_back_sorted_by_name() {
        let store = MemoryStore::new();
        let tracks = [
            TrackRow {
                track_id: "t2".into(),
                track_name: "Zebra".into(),
                artist_name: Some("A".into()),
                ..Default::default()
            },
            TrackRow {
                track_id: "t1".into(),
                track_name: "Apple".into(),
                ..Default::default()
            },
        ];
        write_records(&store, &tracks, WriteMode::Upsert).await.unwrap();

        let read = store.read_tracks().await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].track_name, "Apple");
        assert_eq!(read[0].artist_name, None);
        assert_eq!(read[1].artist_name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn poisoned_tables_are_reported_as_such() {
        let store = MemoryStore::new();
        std::thread::scope(|s| {
            let holder = s.spawn(|| {
                let _tables = store.tables.lock().unwrap();
                panic!("writer died");
            });
            assert!(holder.join().is_err());
        });

        let err = write_records(&store, &[artist("1", "A")], WriteMode::Upsert)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Poisoned), "{err:?}");
        assert!(matches!(store.read_tracks().await, Err(StoreError::Poisoned)));
    }

    #[tokio::test]
    async fn run_lock_is_exclusive() {
        let store = MemoryStore::new();
        assert!(store.try_lock_run().await.unwrap());
        assert!(!store.try_lock_run().await.unwrap());
        store.unlock_run().await.unwrap();
        assert!(store.try_lock_run().await.unwrap());
    }
}

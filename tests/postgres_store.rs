//! Runs against a real database when `TEST_DATABASE_URL` is set; otherwise
//! every test returns immediately. The scenarios share the fixed table
//! names, so they run inside a single test.

use sqlx::postgres::PgConnectOptions;

use tastelog::model::{ArtistInfoRow, LyricsRecord, TrackRow};
use tastelog::store::{write_records, PgStore, Store, StoreError, WriteMode};

fn test_options() -> Option<PgConnectOptions> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    url.parse().ok()
}

fn track(id: &str, name: &str, artist: Option<&str>) -> TrackRow {
    TrackRow {
        track_id: id.to_string(),
        track_name: name.to_string(),
        artist_name: artist.map(str::to_string),
        popularity: Some(50),
        ..Default::default()
    }
}

fn lyrics(id: &str, body: &str) -> LyricsRecord {
    LyricsRecord {
        track_id: id.to_string(),
        track_name: format!("track {id}"),
        artist_name: "Someone".to_string(),
        lyrics: body.to_string(),
    }
}

async fn reset(store: &PgStore) {
    for table in ["tracks", "artists", "artists_info", "track_lyrics"] {
        sqlx::query(&format!(r#"DROP TABLE IF EXISTS "{table}""#))
            .execute(store.pool())
            .await
            .unwrap();
    }
}

async fn count(store: &PgStore, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!(r#"SELECT COUNT(*) FROM "{table}""#))
        .fetch_one(store.pool())
        .await
        .unwrap();
    n
}

#[tokio::test]
async fn postgres_store_contract() {
    let Some(options) = test_options() else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let store = PgStore::connect(options.clone()).await.unwrap();
    reset(&store).await;

    // Missing table reads as empty.
    assert!(store.read_tracks().await.unwrap().is_empty());

    // Insert, then a conflicting insert leaves the table unchanged.
    let first = vec![track("t1", "Beta", Some("A")), track("t2", "Alpha", None)];
    assert_eq!(write_records(&store, &first, WriteMode::Insert).await.unwrap(), 2);
    let clash = vec![track("t3", "Gamma", Some("C")), track("t1", "Dup", Some("A"))];
    let err = write_records(&store, &clash, WriteMode::Insert).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");
    assert_eq!(count(&store, "tracks").await, 2);

    // Upsert overwrites by key.
    let update = vec![track("t1", "Beta (Remastered)", Some("A"))];
    write_records(&store, &update, WriteMode::Upsert).await.unwrap();
    let stored = store.read_tracks().await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].track_name, "Alpha");
    assert_eq!(stored[0].artist_name, None);
    assert_eq!(stored[1].track_name, "Beta (Remastered)");

    // Titles and URLs longer than 255 characters are stored whole.
    let long_title = "Movement ".repeat(34);
    assert!(long_title.chars().count() > 300);
    let mut long = track("t9", &long_title, Some("Orchestra"));
    long.external_url = Some(format!("https://open.spotify.com/{}", "%C3%A9".repeat(60)));
    write_records(&store, &[long], WriteMode::Upsert).await.unwrap();
    let (stored_title,): (String,) =
        sqlx::query_as("SELECT track_name FROM tracks WHERE track_id = 't9'")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(stored_title, long_title);
    sqlx::query("DELETE FROM tracks WHERE track_id = 't9'")
        .execute(store.pool())
        .await
        .unwrap();

    // Arrays and big counts survive the round trip.
    let info = vec![ArtistInfoRow {
        artist_name: "A".to_string(),
        listeners: Some(5_000_000_000),
        tags: vec!["rock".to_string(), "indie".to_string()],
        ..Default::default()
    }];
    write_records(&store, &info, WriteMode::Upsert).await.unwrap();
    let (listeners, tags): (Option<i64>, Vec<String>) =
        sqlx::query_as("SELECT listeners, tags FROM artists_info WHERE artist_name = 'A'")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(listeners, Some(5_000_000_000));
    assert_eq!(tags, vec!["rock", "indie"]);

    // Replace rebuilds the table each time.
    write_records(&store, &[lyrics("t1", "one"), lyrics("t2", "two")], WriteMode::Replace)
        .await
        .unwrap();
    write_records(&store, &[lyrics("t2", "two again")], WriteMode::Replace)
        .await
        .unwrap();
    assert_eq!(count(&store, "track_lyrics").await, 1);

    // The run lock is exclusive across connections.
    let other = PgStore::connect(options).await.unwrap();
    assert!(store.try_lock_run().await.unwrap());
    assert!(!other.try_lock_run().await.unwrap());
    store.unlock_run().await.unwrap();
    assert!(other.try_lock_run().await.unwrap());
    other.unlock_run().await.unwrap();

    reset(&store).await;
    other.close().await;
    store.close().await;
}

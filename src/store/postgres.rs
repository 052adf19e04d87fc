use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Connection, PgConnection, PgPool, Postgres};
use tokio::sync::Mutex;

use super::{Row, SqlValue, Store, StoreError, TableSpec, WriteMode};
use crate::model::StoredTrack;

/// Advisory lock key shared by both jobs ("tastelog" in ASCII).
const RUN_LOCK_KEY: i64 = 0x7461_7374_656c_6f67;

pub struct PgStore {
    pool: PgPool,
    options: PgConnectOptions,
    // Session holding the advisory lock; closing it releases the lock.
    lock_conn: Mutex<Option<PgConnection>>,
}

impl PgStore {
    pub async fn connect(options: PgConnectOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options.clone())
            .await?;

        Ok(Self {
            pool,
            options,
            lock_conn: Mutex::new(None),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn write(
        &self,
        table: &'static TableSpec,
        rows: &[Row],
        mode: WriteMode,
    ) -> Result<u64, StoreError> {
        for row in rows {
            table.check_row(row)?;
        }
        let statement = match mode {
            WriteMode::Upsert => upsert_sql(table)?,
            WriteMode::Insert | WriteMode::Replace => insert_sql(table),
        };

        let mut tx = self.pool.begin().await?;

        if mode == WriteMode::Replace {
            sqlx::query(&format!(r#"DROP TABLE IF EXISTS "{}""#, table.name))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(&create_table_sql(table))
            .execute(&mut *tx)
            .await?;

        let mut affected = 0u64;
        for row in rows {
            let result = bind_row(sqlx::query(&statement), row)
                .execute(&mut *tx)
                .await
                .map_err(|e| classify(e, table))?;
            affected += result.rows_affected();
        }

        // Dropping `tx` on any early return above rolls the batch back.
        tx.commit().await?;
        Ok(affected)
    }

    async fn read_tracks(&self) -> Result<Vec<StoredTrack>, StoreError> {
        let (exists,): (bool,) = sqlx::query_as(r#"SELECT to_regclass('tracks') IS NOT NULL"#)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            r#"SELECT track_id, track_name, artist_name FROM tracks ORDER BY track_name, track_id"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(track_id, track_name, artist_name)| StoredTrack {
                track_id,
                track_name,
                artist_name,
            })
            .collect())
    }

    async fn try_lock_run(&self) -> Result<bool, StoreError> {
        let mut held = self.lock_conn.lock().await;
        if held.is_some() {
            return Ok(true);
        }

        let mut conn = PgConnection::connect_with(&self.options).await?;
        let (locked,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .bind(RUN_LOCK_KEY)
            .fetch_one(&mut conn)
            .await?;

        if locked {
            *held = Some(conn);
        } else {
            conn.close().await?;
        }
        Ok(locked)
    }

    async fn unlock_run(&self) -> Result<(), StoreError> {
        let conn = self.lock_conn.lock().await.take();
        if let Some(mut conn) = conn {
            sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(RUN_LOCK_KEY)
                .execute(&mut conn)
                .await?;
            conn.close().await?;
        }
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// ---------------------------------------------------------------------------
// SQL builders
// ---------------------------------------------------------------------------

pub(crate) fn create_table_sql(table: &TableSpec) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", c.name, c.ty.sql());
            if table.primary_key == Some(c.name) {
                def.push_str(" PRIMARY KEY");
            } else if !c.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n)",
        table.name,
        columns.join(",\n    ")
    )
}

pub(crate) fn insert_sql(table: &TableSpec) -> String {
    let names: Vec<&str> = table.columns.iter().map(|c| c.name).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table.name,
        names.join(", "),
        placeholders.join(", ")
    )
}

pub(crate) fn upsert_sql(table: &TableSpec) -> Result<String, StoreError> {
    let key = table.require_key()?;
    let updates: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.name != key)
        .map(|c| format!("{0} = EXCLUDED.{0}", c.name))
        .collect();

    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    Ok(format!("{} ON CONFLICT ({}) {}", insert_sql(table), key, conflict))
}

fn bind_row<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    row: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in row {
        query = match value {
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::BigInt(v) => query.bind(*v),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::TextArray(v) => query.bind(v.clone()),
        };
    }
    query
}

fn classify(err: sqlx::Error, table: &TableSpec) -> StoreError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::Conflict(table.name.to_string())
        }
        other => StoreError::Sql(other),
    }
}

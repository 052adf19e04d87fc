//! Paced, miss-tolerant lookups.
//!
//! Each key gets exactly one [`Lookup::lookup`] call, followed by a fixed
//! pause. Misses are collected and the batch moves on; what happens on a
//! transport failure is up to the caller via [`OnFatal`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::api::ApiError;

/// Why a lookup produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    /// Non-200 response
    Status(u16),
    /// 200, but the expected top-level object was absent
    NoPayload,
    /// 200, but the body could not be used
    Malformed(String),
    /// Transport failure downgraded by [`OnFatal::Skip`]
    Transport(String),
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::NoPayload => write!(f, "no data in response"),
            Self::Malformed(reason) => write!(f, "unusable response: {}", reason),
            Self::Transport(reason) => write!(f, "transport error: {}", reason),
        }
    }
}

/// Result of one lookup attempt.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Found(T),
    Miss(Miss),
    Fatal(ApiError),
}

/// What the batch does when an attempt fails at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnFatal {
    #[default]
    Abort,
    Skip,
}

/// A keyed lookup against an external API.
#[async_trait]
pub trait Lookup: Send + Sync {
    type Key: Send + Sync;
    type Record: Send;

    /// Human-readable form of a key for logs.
    fn label(key: &Self::Key) -> String;

    async fn lookup(&self, key: &Self::Key) -> FetchOutcome<Self::Record>;
}

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Fixed pause after every request, keeping under the provider's rate ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn pause(&self) {
        if !self.interval.is_zero() {
            sleep(self.interval).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ItemStatus<'a> {
    Found,
    Missed(&'a Miss),
    Failed(&'a ApiError),
}

/// Progress notification emitted after each attempt.
#[derive(Debug)]
pub struct ItemProgress<'a> {
    pub position: usize,
    pub total: usize,
    pub label: &'a str,
    pub status: ItemStatus<'a>,
}

#[derive(Debug)]
pub struct FetchReport<T> {
    /// Found records, in key order.
    pub records: Vec<T>,
    /// Keys that produced no record, with the reason.
    pub misses: Vec<(String, Miss)>,
}

impl<T> FetchReport<T> {
    pub fn attempted(&self) -> usize {
        self.records.len() + self.misses.len()
    }
}

pub async fn fetch_paced<L>(
    source: &L,
    keys: &[L::Key],
    pacer: &Pacer,
    on_fatal: OnFatal,
    mut on_item: impl FnMut(ItemProgress<'_>),
) -> Result<FetchReport<L::Record>, ApiError>
where
    L: Lookup + ?Sized,
{
    let total = keys.len();
    let mut report = FetchReport {
        records: Vec::with_capacity(total),
        misses: Vec::new(),
    };

    for (idx, key) in keys.iter().enumerate() {
        let label = L::label(key);
        let outcome = source.lookup(key).await;
        pacer.pause().await;

        let position = idx + 1;
        match outcome {
            FetchOutcome::Found(record) => {
                tracing::debug!(key = %label, "lookup succeeded");
                on_item(ItemProgress {
                    position,
                    total,
                    label: &label,
                    status: ItemStatus::Found,
                });
                report.records.push(record);
            }
            FetchOutcome::Miss(miss) => {
                tracing::warn!(key = %label, reason = %miss, "lookup returned nothing");
                on_item(ItemProgress {
                    position,
                    total,
                    label: &label,
                    status: ItemStatus::Missed(&miss),
                });
                report.misses.push((label, miss));
            }
            FetchOutcome::Fatal(err) => {
                tracing::error!(key = %label, error = %err, "lookup failed");
                on_item(ItemProgress {
                    position,
                    total,
                    label: &label,
                    status: ItemStatus::Failed(&err),
                });
                match on_fatal {
                    OnFatal::Abort => return Err(err),
                    OnFatal::Skip => report.misses.push((label, Miss::Transport(err.to_string()))),
                }
            }
        }
    }

    Ok(report)
}

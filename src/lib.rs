//! Listening-history sync.
//!
//! Pulls a user's top tracks and artists from Spotify, enriches every artist
//! with Last.fm metadata and stores lyrics for each saved track, all in
//! Postgres. Two binaries drive the library: `tastelog-sync` and
//! `tastelog-lyrics`.

pub mod api;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod jobs;
pub mod model;
pub mod normalize;
pub mod output;
pub mod store;

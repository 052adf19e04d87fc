use std::process::ExitCode;

use clap::Parser;
use colored::*;

use tastelog::api::lastfm::LastFmClient;
use tastelog::api::spotify::{SpotifyClient, SpotifyCredentials, TimeRange, MAX_TOP_ITEMS};
use tastelog::api::{http_client, Backoff};
use tastelog::config::{load_env, required, DatabaseArgs, HttpArgs, LastFmArgs, SpotifyArgs};
use tastelog::error::SyncResult;
use tastelog::fetch::{OnFatal, Pacer};
use tastelog::jobs::{run_top_sync, TopOptions, TopReport};
use tastelog::output;
use tastelog::store::{MemoryStore, PgStore, Store, WriteMode};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tastelog-sync",
    about = "Sync Spotify top tracks/artists and Last.fm artist info into Postgres"
)]
struct Args {
    /// Number of top items to request (1-50)
    #[arg(long, default_value_t = MAX_TOP_ITEMS, value_parser = clap::value_parser!(u32).range(1..=50))]
    limit: u32,

    #[arg(long, value_enum, default_value_t = TimeRange::Long)]
    time_range: TimeRange,

    /// How rows are written when a key already exists
    #[arg(long, value_enum, default_value_t = WriteMode::Upsert)]
    write_mode: WriteMode,

    /// Record a failed Last.fm transport call as a miss instead of aborting
    #[arg(long)]
    keep_going: bool,

    /// Fetch everything but keep rows in memory instead of writing Postgres
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    http: HttpArgs,

    #[command(flatten)]
    spotify: SpotifyArgs,

    #[command(flatten)]
    lastfm: LastFmArgs,
}

fn print_summary(report: &TopReport, dry_run: bool) {
    output::rule();
    println!("{}", "Sync complete!".green().bold());
    if dry_run {
        println!("  {}", "(dry run, nothing written)".yellow());
    }
    output::count("Tracks fetched", report.tracks_fetched);
    output::count("Tracks skipped", report.tracks_rejected);
    output::count("Artists fetched", report.artists_fetched);
    output::count("Artists skipped", report.artists_rejected);
    output::count("Artists to enrich", report.artist_set.len());
    output::count("Artist profiles saved", report.info_written as usize);
    output::misses("Artists without Last.fm info:", &report.info_misses);
}

async fn run(args: Args) -> SyncResult<()> {
    let http = http_client(args.http.timeout())?;
    let backoff = Backoff::with_retries(args.http.max_retries);

    let credentials = SpotifyCredentials {
        client_id: required(&args.spotify.spotify_client_id, "SPOTIFY_CLIENT_ID")?,
        client_secret: required(&args.spotify.spotify_client_secret, "SPOTIFY_CLIENT_SECRET")?,
        redirect_uri: args.spotify.spotify_redirect_uri.clone(),
        refresh_token: args.spotify.spotify_refresh_token.clone(),
    };
    let spotify = SpotifyClient::new(
        http.clone(),
        credentials,
        args.spotify.spotify_token_cache.clone(),
        backoff,
    );
    let lastfm = LastFmClient::new(
        http,
        required(&args.lastfm.lastfm_api_key, "LASTFM_API_KEY")?,
        backoff,
    );

    let options = TopOptions {
        limit: args.limit,
        time_range: args.time_range,
        write_mode: args.write_mode,
        pacer: Pacer::new(args.http.pacing()),
        on_fatal: if args.keep_going {
            OnFatal::Skip
        } else {
            OnFatal::Abort
        },
    };

    let store: Box<dyn Store> = if args.dry_run {
        Box::new(MemoryStore::new())
    } else {
        let connect = args.database.connect_options()?;
        output::step("Connecting to Postgres...");
        Box::new(PgStore::connect(connect).await?)
    };

    let result = run_top_sync(&spotify, &lastfm, store.as_ref(), &options).await;
    store.close().await;

    let report = result?;
    print_summary(&report, args.dry_run);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let env_file = load_env();
    let args = Args::parse();
    output::init_logging(args.verbose);

    output::banner("tastelog sync");
    if let Some(path) = env_file {
        output::field("Env", path.display());
    }
    output::field(
        "Database",
        if args.dry_run {
            "(dry run)".to_string()
        } else {
            args.database.describe()
        },
    );
    output::field("Range", args.time_range.as_param());
    output::field("Limit", args.limit);
    output::field("Mode", format!("{:?}", args.write_mode).to_lowercase());
    println!();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "sync failed");
            output::failure(&err);
            ExitCode::from(&err)
        }
    }
}

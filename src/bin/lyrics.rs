use std::process::ExitCode;

use clap::Parser;
use colored::*;

use tastelog::api::lyrics::LyricsClient;
use tastelog::api::{http_client, Backoff};
use tastelog::config::{load_env, required, DatabaseArgs, HttpArgs, LyricsApiArgs};
use tastelog::error::SyncResult;
use tastelog::fetch::{OnFatal, Pacer};
use tastelog::jobs::{run_lyrics_sync, LyricsOptions, LyricsReport};
use tastelog::output;
use tastelog::store::{PgStore, Store};

#[derive(Parser, Debug)]
#[command(
    name = "tastelog-lyrics",
    about = "Fetch lyrics for every stored track and rebuild the track_lyrics table"
)]
struct Args {
    /// Only process the first N tracks (0 = all)
    #[arg(long, default_value = "0")]
    limit: usize,

    /// Record a failed transport call as a miss instead of aborting
    #[arg(long)]
    keep_going: bool,

    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    http: HttpArgs,

    #[command(flatten)]
    lyrics: LyricsApiArgs,
}

fn print_summary(report: &LyricsReport) {
    output::rule();
    println!("{}", "Lyrics sync complete!".green().bold());
    output::count("Tracks read", report.tracks_read);
    output::count("Tracks without artist", report.tracks_skipped);
    output::count("Lyrics saved", report.lyrics_written as usize);
    output::misses("Tracks without lyrics:", &report.misses);
}

async fn run(args: Args) -> SyncResult<()> {
    let http = http_client(args.http.timeout())?;
    let client = LyricsClient::new(
        http,
        required(&args.lyrics.rapidapi_key, "RAPIDAPI_KEY")?,
        args.lyrics.rapidapi_host.clone(),
        Backoff::with_retries(args.http.max_retries),
    );

    let options = LyricsOptions {
        pacer: Pacer::new(args.http.pacing()),
        on_fatal: if args.keep_going {
            OnFatal::Skip
        } else {
            OnFatal::Abort
        },
        limit: args.limit,
    };

    output::step("Connecting to Postgres...");
    let store = PgStore::connect(args.database.connect_options()?).await?;

    let result = run_lyrics_sync(&client, &store, &options).await;
    store.close().await;

    print_summary(&result?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let env_file = load_env();
    let args = Args::parse();
    output::init_logging(args.verbose);

    output::banner("tastelog lyrics");
    if let Some(path) = env_file {
        output::field("Env", path.display());
    }
    output::field("Database", args.database.describe());
    output::field("Provider", &args.lyrics.rapidapi_host);
    if args.limit > 0 {
        output::field("Limit", args.limit);
    }
    println!();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "lyrics sync failed");
            output::failure(&err);
            ExitCode::from(&err)
        }
    }
}

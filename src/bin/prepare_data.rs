use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tracing::{info, warn};

use moveeasy::prepare::{
    prepare_directory, PrepareOptions, DEFAULT_AGENCY_NAME, DEFAULT_ROUTE_LIMIT,
    DEFAULT_STOP_LIMIT,
};
use moveeasy::store::FirebaseStore;

#[derive(Parser, Debug)]
#[command(about = "Clean up a GTFS CSV export and upload stops and routes")]
struct Args {
    /// Directory holding agency.csv, stops.csv, routes.csv and friends.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    #[arg(long, default_value = DEFAULT_AGENCY_NAME)]
    agency_name: String,

    #[arg(long, default_value_t = DEFAULT_STOP_LIMIT)]
    stop_limit: usize,

    #[arg(long, default_value_t = DEFAULT_ROUTE_LIMIT)]
    route_limit: usize,

    /// Fix the RNG so repeated runs scatter stops the same way.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "FIREBASE_AUTH", hide_env_values = true)]
    database_auth: Option<String>,

    #[arg(long)]
    skip_upload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    moveeasy::init_tracing();
    let args = Args::parse();

    let options = PrepareOptions {
        agency_name: args.agency_name,
        stop_limit: args.stop_limit,
        route_limit: args.route_limit,
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let prepared = prepare_directory(&args.dir, &options, &mut rng)
        .with_context(|| format!("preparing GTFS files in {}", args.dir.display()))?;

    if args.skip_upload {
        info!("Upload skipped");
        return Ok(());
    }
    let Some(url) = args.database_url else {
        warn!("DATABASE_URL not set, nothing uploaded");
        return Ok(());
    };

    let store = FirebaseStore::new(url, args.database_auth, None)?;
    info!(count = prepared.stops.len(), "Uploading stops");
    store
        .put("stops", &Value::Array(prepared.stops))
        .await
        .context("uploading stops")?;
    info!(count = prepared.routes.len(), "Uploading routes");
    store
        .put("routes", &Value::Array(prepared.routes))
        .await
        .context("uploading routes")?;

    info!("Upload complete");
    Ok(())
}

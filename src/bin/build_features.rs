use std::env;
use std::error::Error;
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use tracing::{debug, info};

use huddle::availability::SourceRegistry;
use huddle::data::SeasonTables;
use huddle::features::{build_feature_rows, FeatureCache};

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// directory holding the ingested season tables
    #[clap(short = 'd', long, default_value = "data")]
    data: PathBuf,

    /// first season to build
    #[clap(long)]
    from: u16,

    /// last season to build (inclusive)
    #[clap(long)]
    to: u16,

    /// rebuild even if cached feature rows exist
    #[clap(long)]
    refresh: bool,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.from > self.to {
            bail!("the starting season cannot come after the ending season");
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "full")
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate()?;
    debug!("args: {args:?}");

    let seasons: Vec<SeasonTables> = (args.from..=args.to)
        .map(|season| SeasonTables::load(&args.data, season))
        .collect::<Result<_, _>>()?;
    let all_games: Vec<_> = seasons
        .iter()
        .flat_map(|tables| tables.games.iter().cloned())
        .collect();

    let registry = SourceRegistry::default();
    let cache = FeatureCache::new(&args.data);
    for tables in &seasons {
        let availability = registry.fetch_all(tables.season, 0);
        let rows = cache.load_or_build(tables.season, args.refresh, || {
            build_feature_rows(&all_games, tables, &availability)
        })?;
        info!("season {}: {} feature rows", tables.season, rows.len());
    }
    Ok(())
}

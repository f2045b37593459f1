use std::env;
use std::error::Error;
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use tracing::{debug, info};

use huddle::availability::SourceRegistry;
use huddle::backtest::predict_game;
use huddle::data::SeasonTables;
use huddle::features::{build_feature_rows, FeatureCache};
use huddle::model::ModelStore;
use huddle::print::tabulate_predictions;
use huddle::staking::StakeConfig;

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// directory holding the ingested season tables
    #[clap(short = 'd', long, default_value = "data")]
    data: PathBuf,

    /// file to read the trained model store from
    #[clap(short = 'm', long, default_value = "models.json")]
    models: PathBuf,

    /// season to price
    #[clap(short = 's', long)]
    season: u16,

    /// week to price
    #[clap(short = 'w', long)]
    week: u8,

    /// seasons of history to load for rolling features
    #[clap(long, default_value = "1")]
    lookback: u16,

    /// rebuild feature rows even if cached
    #[clap(long)]
    refresh: bool,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.week == 0 {
            bail!("the week must be at least 1");
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

    let store = ModelStore::load(&args.models)?;
    let models = store.for_season(args.season)?;
    if models.season != args.season {
        info!(
            "no models trained for {}; serving season {} models",
            args.season, models.season
        );
    }

    let first_loaded = args.season.saturating_sub(args.lookback);
    let seasons: Vec<SeasonTables> = (first_loaded..=args.season)
        .map(|season| SeasonTables::load(&args.data, season))
        .collect::<Result<_, _>>()?;
    let all_games: Vec<_> = seasons
        .iter()
        .flat_map(|tables| tables.games.iter().cloned())
        .collect();
    let tables = seasons
        .last()
        .expect("season range is never empty");

    let availability = SourceRegistry::default().fetch_all(args.season, args.week);
    let cache = FeatureCache::new(&args.data);
    let rows = cache.load_or_build(args.season, args.refresh, || {
        build_feature_rows(&all_games, tables, &availability)
    })?;

    let stakes = StakeConfig::default();
    let mut predictions: Vec<_> = rows
        .iter()
        .filter(|row| row.week == args.week)
        .map(|row| predict_game(models, &stakes, row))
        .collect();
    if predictions.is_empty() {
        return Err(format!("no games found for season {} week {}", args.season, args.week).into());
    }
    predictions.sort_by(|a, b| b.spread_confidence.cmp(&a.spread_confidence));

    let table = tabulate_predictions(&predictions);
    println!("{}", Console::default().render(&table));
    info!(
        "priced {} games for season {} week {}",
        predictions.len(),
        args.season,
        args.week
    );
    Ok(())
}

use std::env;
use std::error::Error;
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use tracing::{debug, info, warn};

use huddle::availability::SourceRegistry;
use huddle::data::SeasonTables;
use huddle::features::{build_feature_rows, FeatureCache, FeatureRow};
use huddle::model::{train_season, GradientDescentConfig, ModelStore};

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// directory holding the ingested season tables
    #[clap(short = 'd', long, default_value = "data")]
    data: PathBuf,

    /// first serving season to train models for
    #[clap(long)]
    from: u16,

    /// last serving season to train models for (inclusive)
    #[clap(long)]
    to: u16,

    /// extra seasons of history to load before the first serving season
    #[clap(long, default_value = "3")]
    lookback: u16,

    /// file to write the trained model store to
    #[clap(short = 'o', long, default_value = "models.json")]
    out: PathBuf,

    /// rebuild feature rows even if cached
    #[clap(long)]
    refresh: bool,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.from > self.to {
            bail!("the starting season cannot come after the ending season");
        }
        if self.lookback == 0 {
            bail!("at least one season of lookback is required to train anything");
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

    let first_loaded = args.from.saturating_sub(args.lookback);
    let seasons: Vec<SeasonTables> = (first_loaded..=args.to)
        .map(|season| SeasonTables::load(&args.data, season))
        .collect::<Result<_, _>>()?;
    let all_games: Vec<_> = seasons
        .iter()
        .flat_map(|tables| tables.games.iter().cloned())
        .collect();

    let registry = SourceRegistry::default();
    let cache = FeatureCache::new(&args.data);
    let mut rows: Vec<FeatureRow> = vec![];
    for tables in &seasons {
        let availability = registry.fetch_all(tables.season, 0);
        rows.extend(cache.load_or_build(tables.season, args.refresh, || {
            build_feature_rows(&all_games, tables, &availability)
        })?);
    }

    let config = GradientDescentConfig::default();
    let mut store = ModelStore::default();
    for serving_season in args.from..=args.to {
        // Strictly-earlier scored rows only; the serving season itself stays unseen.
        let train_rows: Vec<FeatureRow> = rows
            .iter()
            .filter(|row| row.season < serving_season && row.home_margin.is_some())
            .cloned()
            .collect();
        if train_rows.is_empty() {
            warn!("no scored history before season {serving_season}; skipping");
            continue;
        }
        let models = train_season(&train_rows, serving_season, &config)?;
        store.insert(models);
    }

    if store.seasons().is_empty() {
        return Err("no models could be trained for the requested range".into());
    }
    store.save(&args.out)?;
    info!(
        "wrote models for seasons {:?} to {}",
        store.seasons(),
        args.out.display()
    );
    Ok(())
}

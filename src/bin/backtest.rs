use std::env;
use std::error::Error;
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use tracing::{debug, info};

use huddle::availability::SourceRegistry;
use huddle::backtest;
use huddle::data::SeasonTables;
use huddle::features::{build_feature_rows, FeatureCache, FeatureRow};
use huddle::model::GradientDescentConfig;
use huddle::print::tabulate_backtest;

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// directory holding the ingested season tables
    #[clap(short = 'd', long, default_value = "data")]
    data: PathBuf,

    /// first season of the backtest range
    #[clap(long)]
    from: u16,

    /// last season of the backtest range (inclusive)
    #[clap(long)]
    to: u16,

    /// rebuild feature rows even if cached
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
    let mut rows: Vec<FeatureRow> = vec![];
    for tables in &seasons {
        let availability = registry.fetch_all(tables.season, 0);
        rows.extend(cache.load_or_build(tables.season, args.refresh, || {
            build_feature_rows(&all_games, tables, &availability)
        })?);
    }
    info!("backtesting {} feature rows", rows.len());

    let report = backtest::run(&rows, &GradientDescentConfig::default())?;
    let table = tabulate_backtest(&report);
    println!("{}", Console::default().render(&table));

    if let Some(summary) = report.summary() {
        info!(
            "{} games: win hit rate {:.3}, cover hit rate {:.3}, total MAE {:.2} \
             (market {:.2})",
            summary.games,
            summary.win_hit_rate,
            summary.cover_hit_rate,
            summary.total_mae_model,
            summary.total_mae_market
        );
    }
    Ok(())
}

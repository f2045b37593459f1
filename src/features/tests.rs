use assert_float_eq::*;
use chrono::TimeZone;

use crate::data::MarketLine;

use super::*;

fn kickoff(season: u16, week: u8) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(season as i32, 8, 20, 19, 30, 0).unwrap() + chrono::Duration::weeks(week as i64)
}

fn game(season: u16, week: u8, home: &str, away: &str, score: Option<(i32, i32)>) -> GameRecord {
    GameRecord {
        season,
        week,
        home_team: home.into(),
        away_team: away.into(),
        kickoff: kickoff(season, week),
        home_points: score.map(|(home_points, _)| home_points),
        away_points: score.map(|(_, away_points)| away_points),
        venue: None,
        neutral_site: false,
    }
}

fn stats(season: u16, week: u8, team: &str, off_ppa: f64) -> TeamGameStats {
    TeamGameStats {
        season,
        week,
        team: team.into(),
        offense: UnitStats {
            success_rate: 0.4,
            ppa: off_ppa,
            explosiveness: 1.2,
            line_yards: 2.8,
            points_per_opportunity: 4.0,
            havoc: 0.15,
        },
        defense: UnitStats::neutral(),
    }
}

#[test]
fn rolling_stats_averages_last_window() {
    let games = vec![
        game(2023, 1, "A", "B", Some((20, 10))),
        game(2023, 2, "C", "A", Some((14, 21))),
        game(2023, 3, "A", "D", Some((7, 28))),
        game(2023, 4, "A", "E", Some((35, 3))),
    ];
    let rolled = rolling_stats(&games, "A", 3, 2023, 5);
    assert_float_absolute_eq!(2.0 / 3.0, rolled.win_pct, 1e-12);
    assert_float_absolute_eq!(21.0, rolled.points_for_avg, 1e-12);
    assert_float_absolute_eq!(15.0, rolled.points_against_avg, 1e-12);
    assert_float_absolute_eq!(6.0, rolled.point_diff_avg, 1e-12);
    assert_eq!(2, rolled.wins);
    assert_eq!(1, rolled.losses);
}

#[test]
fn rolling_stats_short_history_is_neutral() {
    // Two qualifying games against a window of three: flat prior, not a partial average.
    let games = vec![
        game(2023, 1, "A", "B", Some((20, 10))),
        game(2023, 2, "A", "C", Some((30, 0))),
        game(2023, 3, "A", "D", None),
    ];
    let rolled = rolling_stats(&games, "A", 3, 2023, 4);
    assert_eq!(BasicWindowStats::neutral(), rolled);
    assert_float_absolute_eq!(0.5, rolled.win_pct, 1e-12);
    assert_float_absolute_eq!(0.0, rolled.points_for_avg, 1e-12);
}

#[test]
fn rolling_stats_ignores_current_and_future_weeks() {
    let games = vec![
        game(2023, 1, "A", "B", Some((20, 10))),
        game(2023, 2, "A", "C", Some((20, 10))),
        game(2023, 3, "A", "D", Some((0, 50))),
        game(2023, 4, "A", "E", Some((0, 50))),
    ];
    // As of week 3, only weeks 1 and 2 are visible.
    let rolled = rolling_stats(&games, "A", 2, 2023, 3);
    assert_float_absolute_eq!(1.0, rolled.win_pct, 1e-12);
    assert_float_absolute_eq!(20.0, rolled.points_for_avg, 1e-12);
}

#[test]
fn rolling_stats_spans_seasons() {
    let games = vec![
        game(2022, 12, "A", "B", Some((10, 7))),
        game(2022, 13, "C", "A", Some((3, 6))),
        game(2023, 1, "A", "D", Some((28, 14))),
    ];
    let rolled = rolling_stats(&games, "A", 3, 2023, 2);
    assert_float_absolute_eq!(1.0, rolled.win_pct, 1e-12);
    assert_float_absolute_eq!((10.0 + 6.0 + 28.0) / 3.0, rolled.points_for_avg, 1e-12);
}

#[test]
fn rolling_advanced_averages_and_defaults() {
    let table = vec![
        stats(2023, 1, "A", 0.10),
        stats(2023, 2, "A", 0.20),
        stats(2023, 3, "A", 0.60),
    ];
    let rolled = rolling_advanced_stats(&table, "A", 3, 2023, 4);
    assert_float_absolute_eq!(0.3, rolled.offense.ppa, 1e-12);
    assert_float_absolute_eq!(0.4, rolled.offense.success_rate, 1e-12);

    // Two prior rows against a window of three.
    let short = rolling_advanced_stats(&table, "A", 3, 2023, 3);
    assert_eq!(AdvancedWindowStats::neutral(), short);
    assert_float_absolute_eq!(0.5, short.offense.success_rate, 1e-12);
    assert_float_absolute_eq!(1.0, short.offense.explosiveness, 1e-12);
    assert_float_absolute_eq!(3.0, short.offense.line_yards, 1e-12);
}

#[test]
fn rest_profile_flags() {
    let games = vec![game(2023, 1, "A", "B", Some((20, 10)))];
    let standard = rest_profile(&games, "A", 2023, 2, kickoff(2023, 1) + chrono::Duration::days(7));
    assert_eq!(7, standard.rest_days);
    assert!(!standard.short_week);
    assert!(!standard.bye_week);

    let short = rest_profile(&games, "A", 2023, 2, kickoff(2023, 1) + chrono::Duration::days(5));
    assert!(short.short_week);
    assert!(!short.bye_week);

    let bye = rest_profile(&games, "A", 2023, 3, kickoff(2023, 1) + chrono::Duration::days(14));
    assert!(!bye.short_week);
    assert!(bye.bye_week);

    let debut = rest_profile(&games, "Z", 2023, 2, kickoff(2023, 2));
    assert_eq!(RestProfile::neutral(), debut);
    assert_eq!(7, debut.rest_days);
}

#[test]
fn feature_rows_carry_targets_and_market() {
    let mut tables = SeasonTables {
        season: 2023,
        games: vec![
            game(2023, 1, "A", "B", Some((31, 17))),
            game(2023, 2, "B", "A", None),
        ],
        ..Default::default()
    };
    tables.lines.push(MarketLine {
        season: 2023,
        week: 2,
        home_team: "B".into(),
        away_team: "A".into(),
        provider: "alpha".into(),
        spread_home: Some(3.5),
        total: Some(48.0),
        moneyline_home: Some(150.0),
    });

    let all_games = tables.games.clone();
    let rows = build_feature_rows(&all_games, &tables, &FxHashMap::default());
    assert_eq!(2, rows.len());

    let scored = &rows[0];
    assert_eq!(Some(14.0), scored.home_margin);
    assert_eq!(Some(48.0), scored.total_points);
    assert_eq!(None, scored.market.spread_home);
    assert_float_absolute_eq!(0.0, scored.feature("market_spread_home").unwrap(), 1e-12);

    let upcoming = &rows[1];
    assert_eq!(None, upcoming.home_margin);
    assert_eq!(Some(3.5), upcoming.market.spread_home);
    assert_float_absolute_eq!(3.5, upcoming.feature("market_spread_home").unwrap(), 1e-12);

    // Week 1 openers have no rolling history, so every window falls back to neutral.
    assert_float_absolute_eq!(0.5, scored.feature("home_win_pct_3").unwrap(), 1e-12);
    assert_float_absolute_eq!(0.5, scored.feature("away_off_success_rate_10").unwrap(), 1e-12);
}

#[test]
fn feature_rows_share_one_schema() {
    let tables = SeasonTables {
        season: 2023,
        games: vec![
            game(2023, 1, "A", "B", Some((31, 17))),
            game(2023, 2, "B", "A", None),
        ],
        ..Default::default()
    };
    let all_games = tables.games.clone();
    let rows = build_feature_rows(&all_games, &tables, &FxHashMap::default());
    let names = |row: &FeatureRow| {
        row.features
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&rows[0]), names(&rows[1]));
}

#[test]
fn availability_features_default_to_zero() {
    let tables = SeasonTables {
        season: 2023,
        games: vec![game(2023, 1, "A", "B", None)],
        ..Default::default()
    };
    let all_games = tables.games.clone();
    let mut availability = FxHashMap::default();
    availability.insert(
        "A".to_string(),
        AvailabilityRecord {
            team: "A".into(),
            qb_out: true,
            starters_out_offense: 2,
            starters_out_defense: 1,
        },
    );
    let rows = build_feature_rows(&all_games, &tables, &availability);
    let row = &rows[0];
    assert_float_absolute_eq!(1.0, row.feature("home_qb_out").unwrap(), 1e-12);
    assert_float_absolute_eq!(2.0, row.feature("home_starters_out_off").unwrap(), 1e-12);
    assert_float_absolute_eq!(0.0, row.feature("away_qb_out").unwrap(), 1e-12);
    assert_float_absolute_eq!(0.0, row.feature("away_starters_out_def").unwrap(), 1e-12);
}

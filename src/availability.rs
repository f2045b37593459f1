//! Player availability feeds. Real scraping lives behind [`AvailabilitySource`]; the
//! built-in conference sources currently return no records, so availability features
//! default to zero until a feed is wired in.

use rustc_hash::FxHashMap;
use tracing::debug;

/// Availability summary for one team ahead of one week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRecord {
    pub team: String,
    pub qb_out: bool,
    pub starters_out_offense: u8,
    pub starters_out_defense: u8,
}

/// A per-conference feed of availability records.
pub trait AvailabilitySource {
    fn conference(&self) -> &str;

    fn fetch(&self, season: u16, week: u8) -> Vec<AvailabilityRecord>;
}

macro_rules! stub_source {
    ($name:ident, $conference:literal) => {
        pub struct $name;
        impl AvailabilitySource for $name {
            fn conference(&self) -> &str {
                $conference
            }

            fn fetch(&self, _season: u16, _week: u8) -> Vec<AvailabilityRecord> {
                vec![]
            }
        }
    };
}

// TODO: replace with real injury-report scrapers once a licensed feed is sourced.
stub_source!(SecSource, "SEC");
stub_source!(BigTenSource, "Big Ten");
stub_source!(Big12Source, "Big 12");
stub_source!(AccSource, "ACC");

/// Hand-entered records, for overriding or supplementing the automated feeds.
pub struct ManualOverrides(pub Vec<AvailabilityRecord>);
impl AvailabilitySource for ManualOverrides {
    fn conference(&self) -> &str {
        "manual"
    }

    fn fetch(&self, _season: u16, _week: u8) -> Vec<AvailabilityRecord> {
        self.0.clone()
    }
}

/// Registry of availability sources keyed by conference. Later registrations win when
/// two sources report the same team.
pub struct SourceRegistry {
    sources: Vec<Box<dyn AvailabilitySource>>,
}
impl Default for SourceRegistry {
    fn default() -> Self {
        Self {
            sources: vec![
                Box::new(SecSource),
                Box::new(BigTenSource),
                Box::new(Big12Source),
                Box::new(AccSource),
            ],
        }
    }
}
impl SourceRegistry {
    pub fn register(&mut self, source: Box<dyn AvailabilitySource>) {
        self.sources.push(source);
    }

    /// Merges every source's records for the given week into a per-team map.
    pub fn fetch_all(&self, season: u16, week: u8) -> FxHashMap<String, AvailabilityRecord> {
        let mut merged = FxHashMap::default();
        for source in &self.sources {
            let records = source.fetch(season, week);
            debug!(
                "source {} returned {} availability records",
                source.conference(),
                records.len()
            );
            for record in records {
                merged.insert(record.team.clone(), record);
            }
        }
        merged
    }
}

//! City → coordinate resolution for the city-map view.
//!
//! The external lookup is slow, rate limited and may fail, so it sits behind
//! the [`GeocodeLookup`] trait and is only ever called through a
//! [`GeocodeCache`]: results are memoized in a [`GeocodeStore`], calls are
//! spaced by a minimum interval, and failures are retried with a linear
//! back-off before the city is reported without coordinates.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use dashboard_core::error::LookupFailure;
use dashboard_core::models::Coordinates;
use dashboard_core::{DashboardError, Result};
use dashboard_data::analysis::{CityLocation, DashboardReport};
use dashboard_data::normalizer::normalize_city;
use serde::Deserialize;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default minimum delay between two external lookups.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Lookup attempts per city before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Back-off step; attempt `n` waits `n * step` before retrying.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(100);

// ── Traits ────────────────────────────────────────────────────────────────────

/// An external geocoding service.
pub trait GeocodeLookup {
    /// Resolve `city`. `Ok(None)` means the service answered but knows no
    /// such place; `Err` means the call itself failed.
    fn lookup(&mut self, city: &str) -> std::result::Result<Option<Coordinates>, LookupFailure>;
}

/// Key-value store of resolved cities.
pub trait GeocodeStore {
    /// `Some(entry)` when `city` has been resolved before, where the entry
    /// itself may be an absent coordinate.
    fn get(&self, city: &str) -> Option<Option<Coordinates>>;
    fn put(&mut self, city: &str, coordinates: Option<Coordinates>);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime [`GeocodeStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryGeocodeStore {
    entries: HashMap<String, Option<Coordinates>>,
}

impl MemoryGeocodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeocodeStore for MemoryGeocodeStore {
    fn get(&self, city: &str) -> Option<Option<Coordinates>> {
        self.entries.get(city).copied()
    }

    fn put(&mut self, city: &str, coordinates: Option<Coordinates>) {
        self.entries.insert(city.to_string(), coordinates);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ── GeocodeCache ──────────────────────────────────────────────────────────────

/// Memoizing, throttled, retrying front for a [`GeocodeLookup`].
pub struct GeocodeCache<L, S = MemoryGeocodeStore> {
    lookup: L,
    store: S,
    min_interval: Duration,
    max_attempts: u32,
    backoff_step: Duration,
    /// When the external service was last called.
    last_call: Option<Instant>,
    /// External calls made, retries included.
    calls: u64,
}

impl<L: GeocodeLookup> GeocodeCache<L, MemoryGeocodeStore> {
    pub fn new(lookup: L) -> Self {
        Self::with_store(lookup, MemoryGeocodeStore::new())
    }
}

impl<L: GeocodeLookup, S: GeocodeStore> GeocodeCache<L, S> {
    pub fn with_store(lookup: L, store: S) -> Self {
        Self {
            lookup,
            store,
            min_interval: DEFAULT_MIN_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
            last_call: None,
            calls: 0,
        }
    }

    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Set the attempt budget (at least one) and the back-off step.
    pub fn retry(mut self, max_attempts: u32, backoff_step: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_step = backoff_step;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// External calls made so far, retries included.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Coordinates for `city`, from the store when possible.
    ///
    /// A lookup that keeps failing yields `None` and is not memoized, so a
    /// later call tries the service again.
    pub fn resolve(&mut self, city: &str) -> Option<Coordinates> {
        if let Some(cached) = self.store.get(city) {
            tracing::debug!(city, "geocode cache hit");
            return cached;
        }

        match self.lookup_with_retry(city) {
            Ok(coordinates) => {
                self.store.put(city, coordinates);
                coordinates
            }
            Err(e) => {
                tracing::warn!(error = %e, "city left without coordinates");
                None
            }
        }
    }

    /// Fill in the coordinates of every location.
    pub fn attach(&mut self, locations: &mut [CityLocation]) {
        for location in locations.iter_mut() {
            location.coordinates = self.resolve(&location.city);
        }
        let resolved = locations.iter().filter(|l| l.coordinates.is_some()).count();
        tracing::info!(
            resolved,
            total = locations.len(),
            "city-map coordinates attached"
        );
    }

    /// Fill in the report's city-map view, when it has one.
    pub fn attach_to_report(&mut self, report: &mut DashboardReport) {
        if let Some(locations) = report.city_map.as_mut() {
            self.attach(locations);
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// Try up to `max_attempts` calls; attempt `n` first sleeps `n * step`.
    fn lookup_with_retry(
        &mut self,
        city: &str,
    ) -> std::result::Result<Option<Coordinates>, LookupFailure> {
        let mut last_err = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let sleep = self.backoff_step * attempt;
                tracing::debug!(attempt, sleep_ms = sleep.as_millis() as u64, "retrying geocode");
                thread::sleep(sleep);
            }

            self.throttle();
            self.calls += 1;
            match self.lookup.lookup(city) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "geocode attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LookupFailure {
            city: city.to_string(),
            reason: "no attempts made".to_string(),
        }))
    }

    /// Sleep until `min_interval` has passed since the previous call.
    fn throttle(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

// ── TableLookup ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CoordinateRow {
    city: String,
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "lon", alias = "lng")]
    longitude: f64,
}

/// Offline [`GeocodeLookup`] backed by a `city,latitude,longitude` table.
///
/// City names are normalised the same way as record cities, so a table row
/// for `PORTLAND` answers lookups for `Portland`.
#[derive(Debug, Default, Clone)]
pub struct TableLookup {
    entries: HashMap<String, Coordinates>,
}

impl TableLookup {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| DashboardError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_reader(&path.display().to_string(), file)
    }

    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = HashMap::new();
        for row in rdr.deserialize::<CoordinateRow>() {
            let row = row.map_err(|e| DashboardError::MalformedSource {
                source_name: name.to_string(),
                reason: e.to_string(),
            })?;
            if let Some(city) = normalize_city(Some(&row.city)) {
                entries.insert(
                    city,
                    Coordinates {
                        latitude: row.latitude,
                        longitude: row.longitude,
                    },
                );
            }
        }

        tracing::debug!(cities = entries.len(), source = name, "coordinate table loaded");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GeocodeLookup for TableLookup {
    fn lookup(&mut self, city: &str) -> std::result::Result<Option<Coordinates>, LookupFailure> {
        let key = normalize_city(Some(city)).unwrap_or_default();
        Ok(self.entries.get(&key).copied())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PORTLAND: Coordinates = Coordinates {
        latitude: 45.5152,
        longitude: -122.6784,
    };

    /// Lookup that fails a fixed number of times per city before answering.
    struct FlakyLookup {
        failures_left: HashMap<String, u32>,
        known: HashMap<String, Coordinates>,
        calls: Vec<String>,
    }

    impl FlakyLookup {
        fn new() -> Self {
            Self {
                failures_left: HashMap::new(),
                known: HashMap::from([("Portland".to_string(), PORTLAND)]),
                calls: Vec::new(),
            }
        }

        fn failing(mut self, city: &str, times: u32) -> Self {
            self.failures_left.insert(city.to_string(), times);
            self
        }
    }

    impl GeocodeLookup for FlakyLookup {
        fn lookup(&mut self, city: &str) -> std::result::Result<Option<Coordinates>, LookupFailure> {
            self.calls.push(city.to_string());
            if let Some(left) = self.failures_left.get_mut(city) {
                if *left > 0 {
                    *left -= 1;
                    return Err(LookupFailure {
                        city: city.to_string(),
                        reason: "timed out".to_string(),
                    });
                }
            }
            Ok(self.known.get(city).copied())
        }
    }

    fn cache(lookup: FlakyLookup) -> GeocodeCache<FlakyLookup> {
        GeocodeCache::new(lookup)
            .min_interval(Duration::ZERO)
            .retry(3, Duration::ZERO)
    }

    #[test]
    fn test_resolve_memoizes_hits_and_misses() {
        let mut geo = cache(FlakyLookup::new());

        assert_eq!(geo.resolve("Portland"), Some(PORTLAND));
        assert_eq!(geo.resolve("Portland"), Some(PORTLAND));
        assert_eq!(geo.resolve("Atlantis"), None);
        assert_eq!(geo.resolve("Atlantis"), None);

        assert_eq!(geo.calls(), 2);
        assert_eq!(geo.store().len(), 2);
        assert_eq!(geo.store().get("Atlantis"), Some(None));
    }

    #[test]
    fn test_resolve_retries_transient_failures() {
        let mut geo = cache(FlakyLookup::new().failing("Portland", 2));
        assert_eq!(geo.resolve("Portland"), Some(PORTLAND));
        assert_eq!(geo.calls(), 3);
    }

    #[test]
    fn test_final_failure_is_absent_and_not_memoized() {
        let mut geo = cache(FlakyLookup::new().failing("Portland", 3));
        assert_eq!(geo.resolve("Portland"), None);
        assert!(geo.store().is_empty());

        // The service recovered; the next call reaches it again.
        assert_eq!(geo.resolve("Portland"), Some(PORTLAND));
        assert_eq!(geo.calls(), 4);
    }

    #[test]
    fn test_one_failed_city_does_not_block_others() {
        let mut geo = cache(FlakyLookup::new().failing("Salem", 10));
        let mut locations = vec![
            CityLocation {
                city: "Salem".into(),
                count: 3,
                coordinates: None,
            },
            CityLocation {
                city: "Portland".into(),
                count: 2,
                coordinates: None,
            },
        ];
        geo.attach(&mut locations);
        assert!(locations[0].coordinates.is_none());
        assert_eq!(locations[1].coordinates, Some(PORTLAND));
    }

    #[test]
    fn test_min_interval_spaces_calls() {
        let mut geo = GeocodeCache::new(FlakyLookup::new())
            .min_interval(Duration::from_millis(30))
            .retry(1, Duration::ZERO);

        let start = Instant::now();
        geo.resolve("Portland");
        geo.resolve("Salem");
        geo.resolve("Bend");
        assert!(start.elapsed() >= Duration::from_millis(60));

        // Cache hits do not wait.
        let start = Instant::now();
        geo.resolve("Portland");
        assert!(start.elapsed() < Duration::from_millis(30));
    }

    #[test]
    fn test_retry_budget_is_at_least_one() {
        let mut geo = GeocodeCache::new(FlakyLookup::new())
            .min_interval(Duration::ZERO)
            .retry(0, Duration::ZERO);
        assert_eq!(geo.resolve("Portland"), Some(PORTLAND));
        assert_eq!(geo.calls(), 1);
    }

    #[test]
    fn test_table_lookup_from_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("coords.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "city,latitude,longitude").unwrap();
        writeln!(file, "PORTLAND , 45.5152, -122.6784").unwrap();
        writeln!(file, "salem,44.9429,-123.0351").unwrap();
        drop(file);

        let mut table = TableLookup::from_path(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("Portland").unwrap(), Some(PORTLAND));
        assert!(table.lookup("salem ").unwrap().is_some());
        assert_eq!(table.lookup("Bend").unwrap(), None);
    }

    #[test]
    fn test_table_lookup_aliases_and_errors() {
        let table = TableLookup::from_reader("inline", "city,lat,lng\nBend,44.05,-121.31".as_bytes())
            .unwrap();
        assert_eq!(table.len(), 1);

        let bad = TableLookup::from_reader("inline", "city,lat,lng\nBend,north,-121.31".as_bytes());
        assert!(matches!(bad, Err(DashboardError::MalformedSource { .. })));

        let missing = TableLookup::from_path(Path::new("/nonexistent/coords.csv"));
        assert!(matches!(missing, Err(DashboardError::FileRead { .. })));
    }

    #[test]
    fn test_attach_to_report_fills_city_map() {
        use dashboard_core::config::{PipelineConfig, View};
        use dashboard_data::analysis::analyze_sources;
        use dashboard_data::reader::InputSource;

        let source = InputSource::csv_bytes(
            "upload.csv",
            "AccoutID,Status,State,City,Bill Method,Rate Code\n1,Active,OR,portland,Digital,",
        );
        let config = PipelineConfig {
            views: [View::CityMap].into_iter().collect(),
            ..Default::default()
        };
        let mut report = analyze_sources(&[source], &config).unwrap();

        let mut geo = cache(FlakyLookup::new());
        geo.attach_to_report(&mut report);
        let map = report.city_map.unwrap();
        assert_eq!(map[0].city, "Portland");
        assert_eq!(map[0].coordinates, Some(PORTLAND));
    }
}

//! Summary statistics over a user's captures.
//!
//! Everything is recomputed from the full record set on every call; there
//! is no incremental state. `StatsPanel` only adds request sequencing on
//! top so that a slow, superseded fetch cannot overwrite a newer result.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use fieldlog_types::models::{Capture, CaptureStatus, WaterQuality};

use crate::store::RecordStore;

/// Length of the most-frequent-locations list.
pub const TOP_LOCATIONS: usize = 5;

// -- Time window --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TimeWindow {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported time window: {0} days (expected 7, 30, 90 or 365)")]
pub struct UnsupportedWindow(pub u32);

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] =
        [TimeWindow::Week, TimeWindow::Month, TimeWindow::Quarter, TimeWindow::Year];

    pub fn days(self) -> u32 {
        match self {
            TimeWindow::Week => 7,
            TimeWindow::Month => 30,
            TimeWindow::Quarter => 90,
            TimeWindow::Year => 365,
        }
    }
}

impl TryFrom<u32> for TimeWindow {
    type Error = UnsupportedWindow;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        TimeWindow::ALL
            .into_iter()
            .find(|w| w.days() == days)
            .ok_or(UnsupportedWindow(days))
    }
}

impl From<TimeWindow> for u32 {
    fn from(window: TimeWindow) -> u32 {
        window.days()
    }
}

// -- Result types --

/// Mean of the valid readings. `mean` is 0.0 when `samples` is 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Average {
    pub mean: f64,
    pub samples: usize,
}

impl Average {
    /// Running mean. Each step adds `v/n - mean/n` so no intermediate value
    /// exceeds the largest reading, even near `f64::MAX`.
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(Average::default(), |acc, v| {
            let samples = acc.samples + 1;
            let n = samples as f64;
            Average { mean: acc.mean + (v / n - acc.mean / n), samples }
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementAverages {
    pub temperature: Average,
    pub humidity: Average,
    pub wind_speed: Average,
    pub water_level: Average,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub submitted: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn get(&self, status: CaptureStatus) -> usize {
        match status {
            CaptureStatus::Draft => self.draft,
            CaptureStatus::Submitted => self.submitted,
            CaptureStatus::Approved => self.approved,
            CaptureStatus::Rejected => self.rejected,
        }
    }

    pub fn total(&self) -> usize {
        self.draft + self.submitted + self.approved + self.rejected
    }

    fn bump(&mut self, status: CaptureStatus) {
        let slot = match status {
            CaptureStatus::Draft => &mut self.draft,
            CaptureStatus::Submitted => &mut self.submitted,
            CaptureStatus::Approved => &mut self.approved,
            CaptureStatus::Rejected => &mut self.rejected,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCount {
    pub quality: WaterQuality,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCount {
    pub year: i32,
    pub month: u32,
    /// English short label, e.g. `"Mar 2026"`.
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCount {
    pub location: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub window: TimeWindow,
    pub total: usize,
    pub by_status: StatusCounts,
    pub averages: MeasurementAverages,
    pub water_quality: Vec<QualityCount>,
    pub by_month: Vec<MonthCount>,
    pub top_locations: Vec<LocationCount>,
}

// -- Computation --

/// Parse a free-text numeric reading. Blank, non-numeric and non-finite
/// values yield `None`.
pub fn parse_measurement(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Compute statistics for captures created within `window` of `now`.
pub fn summarize(captures: &[Capture], window: TimeWindow, now: DateTime<Utc>) -> CaptureStats {
    let span = Duration::days(i64::from(window.days()));
    let selected: Vec<&Capture> = captures
        .iter()
        .filter(|c| now.signed_duration_since(c.created_at) <= span)
        .collect();

    let mut by_status = StatusCounts::default();
    let mut quality = [0usize; WaterQuality::ALL.len()];
    let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    let mut location_index: HashMap<&str, usize> = HashMap::new();
    let mut locations: Vec<LocationCount> = Vec::new();

    for capture in &selected {
        by_status.bump(capture.status);

        if let Some(q) = WaterQuality::parse_lenient(&capture.data.water_quality) {
            if let Some(pos) = WaterQuality::ALL.iter().position(|c| *c == q) {
                quality[pos] += 1;
            }
        }

        let created = capture.created_at;
        *months.entry((created.year(), created.month())).or_default() += 1;

        let location = capture.data.location.trim();
        if !location.is_empty() {
            let seen = location_index.get(location).copied();
            match seen {
                Some(i) => locations[i].count += 1,
                None => {
                    location_index.insert(location, locations.len());
                    locations.push(LocationCount { location: location.to_string(), count: 1 });
                }
            }
        }
    }

    let averages = MeasurementAverages {
        temperature: Average::of(selected.iter().filter_map(|c| parse_measurement(&c.data.temperature))),
        humidity: Average::of(selected.iter().filter_map(|c| parse_measurement(&c.data.humidity))),
        wind_speed: Average::of(selected.iter().filter_map(|c| parse_measurement(&c.data.wind_speed))),
        water_level: Average::of(selected.iter().filter_map(|c| parse_measurement(&c.data.water_level))),
    };

    let water_quality = WaterQuality::ALL
        .into_iter()
        .zip(quality)
        .filter(|(_, count)| *count > 0)
        .map(|(quality, count)| QualityCount { quality, count })
        .collect();

    let by_month = months
        .into_iter()
        .map(|((year, month), count)| MonthCount {
            year,
            month,
            label: month_label(year, month),
            count,
        })
        .collect();

    // Stable sort: equal counts keep first-seen order.
    locations.sort_by(|a, b| b.count.cmp(&a.count));
    locations.truncate(TOP_LOCATIONS);

    CaptureStats {
        window,
        total: selected.len(),
        by_status,
        averages,
        water_quality,
        by_month,
        top_locations: locations,
    }
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| format!("{year}-{month:02}"))
}

// -- Panel state --

/// Handle for one in-flight statistics request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    window: TimeWindow,
}

impl Ticket {
    pub fn window(&self) -> TimeWindow {
        self.window
    }
}

/// Aggregation view state: selected window, latest result, and a
/// generation counter so only the newest request may publish.
#[derive(Debug, Default)]
pub struct StatsPanel {
    window: TimeWindow,
    generation: u64,
    loading: bool,
    stats: Option<CaptureStats>,
}

impl StatsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn stats(&self) -> Option<&CaptureStats> {
        self.stats.as_ref()
    }

    /// Start a request for `window`, superseding any earlier one.
    pub fn begin(&mut self, window: TimeWindow) -> Ticket {
        self.generation += 1;
        self.window = window;
        self.loading = true;
        Ticket { generation: self.generation, window }
    }

    /// Publish a result. Returns false (and discards it) if a newer
    /// request was started after `ticket`.
    pub fn complete(&mut self, ticket: Ticket, stats: CaptureStats) -> bool {
        if ticket.generation != self.generation {
            debug!(
                stale = ticket.generation,
                current = self.generation,
                "Dropping superseded statistics result"
            );
            return false;
        }
        self.loading = false;
        self.stats = Some(stats);
        true
    }

    /// A request failed; the previous result stays on display.
    pub fn fail(&mut self, ticket: Ticket) {
        if ticket.generation == self.generation {
            self.loading = false;
        }
    }

    /// Fetch the owner's captures and recompute statistics for `window`.
    pub async fn refresh<R: RecordStore>(
        &mut self,
        store: &R,
        owner: Uuid,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) {
        let ticket = self.begin(window);
        match store.list(owner).await {
            Ok(captures) => {
                let stats = summarize(&captures, ticket.window(), now);
                self.complete(ticket, stats);
            }
            Err(e) => {
                error!(error = %e, "Failed to load captures for statistics");
                self.fail(ticket);
            }
        }
    }
}

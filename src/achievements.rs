use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use crate::data::{Achievement, Category, Location};

pub const NO_MATCHES: &str = "No achievements match current filters";

/// Drawer filters. `None` means "all".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AchievementFilter {
    pub category: Option<Category>,
    pub year: Option<i32>,
}

impl AchievementFilter {
    pub fn matches(&self, achievement: &Achievement) -> bool {
        self.category.map_or(true, |c| achievement.category == c)
            && self.year.map_or(true, |y| achievement.year == y)
    }

    /// all -> award -> ... -> social -> all
    pub fn cycle_category(&mut self) {
        self.category = match self.category {
            None => Some(Category::ALL[0]),
            Some(c) => Category::ALL
                .iter()
                .position(|&x| x == c)
                .and_then(|i| Category::ALL.get(i + 1).copied()),
        };
    }

    /// Step through `years` (ascending), wrapping back to "all".
    pub fn cycle_year(&mut self, years: &[i32]) {
        self.year = match self.year {
            None => years.first().copied(),
            Some(y) => years.iter().copied().find(|&x| x > y),
        };
    }

    pub fn describe(&self) -> String {
        let category = self.category.map_or("all", Category::as_str);
        match self.year {
            Some(y) => format!("{category} / {y}"),
            None => format!("{category} / all years"),
        }
    }
}

/// Achievements of `location` that pass `filter`, in document order.
pub fn display_list<'a>(location: &'a Location, filter: &AchievementFilter) -> Vec<&'a Achievement> {
    location.achievements.iter().filter(|a| filter.matches(a)).collect()
}

/// Every distinct achievement year across the dataset, ascending.
pub fn achievement_years(locations: &[Location]) -> Vec<i32> {
    let mut years: Vec<i32> = locations
        .iter()
        .flat_map(|l| l.achievements.iter().map(|a| a.year))
        .collect();
    years.sort_unstable();
    years.dedup();
    years
}

/// Totals shown in the status bar for a point on the timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub locations: usize,
    pub employees: u64,
    pub achievements: usize,
}

pub fn summary_at(locations: &[Location], year: i32) -> Summary {
    locations
        .iter()
        .filter(|l| l.established_year <= year)
        .fold(Summary::default(), |mut s, l| {
            s.locations += 1;
            s.employees += l.employee_count as u64;
            s.achievements += l.achievements.iter().filter(|a| a.year <= year).count();
            s
        })
}

/// How often the live counters may drift.
pub const LIVE_METRICS_INTERVAL: Duration = Duration::from_secs(30);

const PROJECTS_START: u32 = 42;
const PROJECTS_RANGE: RangeInclusive<u32> = 30..=50;
const STAFF_DRIFT_RANGE: RangeInclusive<i64> = -250..=250;

/// Slowly drifting "live" counters: active projects, and a small offset applied
/// to the staff total.
pub struct LiveMetrics {
    projects: u32,
    staff_drift: i64,
    next_update: Instant,
    rng: ChaCha8Rng,
}

impl LiveMetrics {
    pub fn new(now: Instant, seed: u64) -> Self {
        Self {
            projects: PROJECTS_START,
            staff_drift: 0,
            next_update: now + LIVE_METRICS_INTERVAL,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn projects(&self) -> u32 {
        self.projects
    }

    /// Staff total with the current drift applied.
    pub fn employees(&self, base: u64) -> u64 {
        base.saturating_add_signed(self.staff_drift)
    }

    /// Apply every drift step due by `now`. Returns true when a counter moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while now >= self.next_update {
            self.next_update += LIVE_METRICS_INTERVAL;
            changed |= self.drift();
        }
        changed
    }

    fn drift(&mut self) -> bool {
        let before = (self.projects, self.staff_drift);
        if self.rng.random::<f64>() > 0.7 {
            let step: i64 = if self.rng.random_bool(0.5) { 1 } else { -1 };
            let (lo, hi) = (*PROJECTS_RANGE.start() as i64, *PROJECTS_RANGE.end() as i64);
            self.projects = (self.projects as i64 + step).clamp(lo, hi) as u32;
        }
        if self.rng.random::<f64>() > 0.8 {
            let step = self.rng.random_range(-5..5);
            self.staff_drift =
                (self.staff_drift + step).clamp(*STAFF_DRIFT_RANGE.start(), *STAFF_DRIFT_RANGE.end());
        }
        before != (self.projects, self.staff_drift)
    }
}

/// Year scrubber over the company's history.
pub struct Timeline {
    start: i32,
    end: i32,
    year: i32,
    play_duration: Duration,
    next_step: Option<Instant>,
    milestones: BTreeMap<i32, String>,
}

impl Timeline {
    /// Span from the earliest office opening to `current_year`.
    pub fn new(locations: &[Location], current_year: i32, play_duration: Duration) -> Self {
        let mut milestones: BTreeMap<i32, String> = BTreeMap::new();
        for location in locations {
            milestones
                .entry(location.established_year)
                .and_modify(|text| {
                    text.push_str(", ");
                    text.push_str(&location.name);
                })
                .or_insert_with(|| format!("Opened {}", location.name));
        }
        let start = milestones.keys().next().copied().unwrap_or(current_year);
        let end = current_year.max(start);
        Self {
            start,
            end,
            year: end,
            play_duration,
            next_step: None,
            milestones,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn range(&self) -> (i32, i32) {
        (self.start, self.end)
    }

    pub fn is_playing(&self) -> bool {
        self.next_step.is_some()
    }

    pub fn set_year(&mut self, year: i32) {
        self.year = year.clamp(self.start, self.end);
    }

    pub fn step(&mut self, delta: i32) {
        self.next_step = None;
        self.set_year(self.year.saturating_add(delta));
    }

    fn step_interval(&self) -> Duration {
        let span = (self.end - self.start).max(1) as u32;
        self.play_duration / span
    }

    /// Restart playback from the first year.
    pub fn play(&mut self, now: Instant) {
        self.year = self.start;
        self.next_step = Some(now + self.step_interval());
    }

    pub fn toggle_play(&mut self, now: Instant) {
        if self.is_playing() {
            self.next_step = None;
        } else {
            self.play(now);
        }
    }

    /// Advance playback. Returns true when the year changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let interval = self.step_interval();
        let mut changed = false;
        while let Some(at) = self.next_step {
            if now < at {
                break;
            }
            if self.year >= self.end {
                self.next_step = None;
                break;
            }
            self.year += 1;
            changed = true;
            self.next_step = (self.year < self.end).then(|| at + interval);
        }
        changed
    }

    /// The most recent milestone at or before the current year.
    pub fn milestone(&self) -> Option<(i32, &str)> {
        self.milestones
            .range(..=self.year)
            .next_back()
            .map(|(&y, text)| (y, text.as_str()))
    }
}

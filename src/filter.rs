//! Filtering the ride table by the user's current selections.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::transform::{DifficultyBucket, WorkoutRecord};

/// Selection state of a multi-valued filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T: Ord> {
    /// Every value matches.
    All,
    /// Only the listed values match. An empty subset matches nothing.
    Subset(BTreeSet<T>),
}

impl<T: Ord> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T: Ord + Clone> Selection<T> {
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    pub fn contains(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Subset(set) => set.contains(value),
        }
    }

    /// Return the selection with `value` toggled.
    ///
    /// Picking a single value while everything is selected narrows the
    /// selection down to that value.
    pub fn toggled(&self, value: &T) -> Self {
        match self {
            Selection::All => Selection::Subset(BTreeSet::from([value.clone()])),
            Selection::Subset(set) => {
                let mut set = set.clone();
                if !set.remove(value) {
                    set.insert(value.clone());
                }
                Selection::Subset(set)
            }
        }
    }

    /// Short description for the multi-select button.
    pub fn summary(&self, label: impl Fn(&T) -> String) -> String {
        match self {
            Selection::All => "All".to_string(),
            Selection::Subset(set) if set.is_empty() => "None".to_string(),
            Selection::Subset(set) => set.iter().map(label).collect::<Vec<_>>().join(", "),
        }
    }
}

/// String key used to compare ride durations.
///
/// Durations are matched through their shortest round-trip representation,
/// e.g. `30.0` or `22.5`, the same text shown in the ride time menu.
pub fn ride_time_key(minutes: f64) -> String {
    format!("{minutes:?}")
}

/// The user's current date range and categorical selections.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub instructors: Selection<String>,
    pub difficulties: Selection<DifficultyBucket>,
    pub ride_times: Selection<String>,
}

impl FilterSpec {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            instructors: Selection::All,
            difficulties: Selection::All,
            ride_times: Selection::All,
        }
    }

    /// Default filter: the full date span of `table` with every category
    /// selected. An empty table falls back to today's date.
    pub fn covering(table: &[WorkoutRecord]) -> Self {
        let (start, end) = date_span(table).unwrap_or_else(|| {
            let today = chrono::Local::now().date_naive();
            (today, today)
        });
        Self::new(start, end)
    }

    pub fn matches(&self, r: &WorkoutRecord) -> bool {
        r.date >= self.start
            && r.date <= self.end
            && self.instructors.contains(&r.instructor)
            && self.difficulties.contains(&r.difficulty)
            && self.ride_times.contains(&ride_time_key(r.ride_time))
    }
}

/// Rows of `table` matching every predicate of `spec`.
///
/// Always starts from the full table; nothing is cached between calls.
pub fn apply(table: &[WorkoutRecord], spec: &FilterSpec) -> Vec<WorkoutRecord> {
    table.iter().filter(|r| spec.matches(r)).cloned().collect()
}

/// Earliest and latest ride date in `table`.
pub fn date_span(table: &[WorkoutRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let min = table.iter().map(|r| r.date).min()?;
    let max = table.iter().map(|r| r.date).max()?;
    Some((min, max))
}

/// Instructors present in `table`, sorted alphabetically.
pub fn instructor_choices(table: &[WorkoutRecord]) -> Vec<String> {
    let set: BTreeSet<&str> = table.iter().map(|r| r.instructor.as_str()).collect();
    set.into_iter().map(str::to_string).collect()
}

/// Difficulty buckets present in `table`, in bucket order.
pub fn difficulty_choices(table: &[WorkoutRecord]) -> Vec<DifficultyBucket> {
    let set: BTreeSet<DifficultyBucket> = table.iter().map(|r| r.difficulty).collect();
    set.into_iter().collect()
}

/// Ride durations present in `table` as keys, shortest first.
pub fn ride_time_choices(table: &[WorkoutRecord]) -> Vec<String> {
    let mut times: Vec<f64> = table.iter().map(|r| r.ride_time).collect();
    times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut keys: Vec<String> = Vec::new();
    for t in times {
        let key = ride_time_key(t);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

// Module for analyzing ride data
use crate::transform::{ALL_BUCKETS, DifficultyBucket, WorkoutRecord};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Headline numbers shown on the summary tab.
///
/// Means over an empty selection are `NaN` and are displayed as such.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub ride_count: usize,
    /// Most frequent instructor(s); all tied instructors are listed.
    pub top_instructors: Vec<String>,
    /// Minutes, rounded to 2 decimals.
    pub avg_ride_time: f64,
    /// Rounded to 2 decimals.
    pub avg_difficulty: f64,
    /// Fraction in `[0, 1]` rounded to 4 decimals. It is labeled as a
    /// percentage on screen but is not multiplied by 100.
    pub avg_leaderboard_pct: f64,
}

/// Projection of a ride used for the "most difficult" table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardestRide {
    pub instructor: String,
    pub title: String,
    pub difficulty_rating: f64,
}

/// Per-column maxima of a ride table, used to highlight cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMaxima {
    pub date: Option<NaiveDate>,
    pub instructor: Option<String>,
    pub title: Option<String>,
    pub ride_time: Option<f64>,
    pub difficulty_rating: Option<f64>,
    pub leaderboard_rank: Option<u32>,
    pub leaderboard_users: Option<u32>,
    pub difficulty: Option<DifficultyBucket>,
    pub leaderboard_pct: Option<f64>,
}

impl ColumnMaxima {
    pub fn of(rows: &[WorkoutRecord]) -> Self {
        Self {
            date: rows.iter().map(|r| r.date).max(),
            instructor: rows.iter().map(|r| &r.instructor).max().cloned(),
            title: rows.iter().map(|r| &r.title).max().cloned(),
            ride_time: nan_max(rows.iter().map(|r| r.ride_time)),
            difficulty_rating: nan_max(rows.iter().map(|r| r.difficulty_rating)),
            leaderboard_rank: rows.iter().map(|r| r.leaderboard_rank).max(),
            leaderboard_users: rows.iter().map(|r| r.leaderboard_users).max(),
            difficulty: rows.iter().map(|r| r.difficulty).max(),
            leaderboard_pct: nan_max(rows.iter().map(|r| r.leaderboard_pct)),
        }
    }
}

/// Format a user facing message after successfully loading the dataset.
pub fn format_load_message(rides: usize, filename: &str) -> String {
    format!("Loaded {} rides from {}", rides, filename)
}

/// Round half away from zero to `digits` decimals. `NaN` stays `NaN`.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Mean of the non-`NaN` values; `NaN` when there are none.
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.into_iter().filter(|v| !v.is_nan()) {
        sum += v;
        count += 1;
    }
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

/// Largest non-`NaN` value.
pub fn nan_max(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
}

/// Most frequent value(s) in `values`, sorted. Ties are all returned.
pub fn mode<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let Some(best) = counts.values().copied().max() else {
        return Vec::new();
    };
    let mut out: Vec<String> = counts
        .into_iter()
        .filter(|(_, c)| *c == best)
        .map(|(v, _)| v.to_string())
        .collect();
    out.sort();
    out
}

/// Compute the headline statistics of the filtered rides.
pub fn summarize(rows: &[WorkoutRecord]) -> SummaryStats {
    log::debug!("Computing summary for {} rides", rows.len());
    SummaryStats {
        ride_count: rows.len(),
        top_instructors: mode(rows.iter().map(|r| r.instructor.as_str())),
        avg_ride_time: round_to(nan_mean(rows.iter().map(|r| r.ride_time)), 2),
        avg_difficulty: round_to(nan_mean(rows.iter().map(|r| r.difficulty_rating)), 2),
        avg_leaderboard_pct: round_to(nan_mean(rows.iter().map(|r| r.leaderboard_pct)), 4),
    }
}

/// Date of the earliest ride, taken from the unfiltered table.
pub fn first_ride(base: &[WorkoutRecord]) -> Option<NaiveDate> {
    base.iter().map(|r| r.date).min()
}

/// Rides sharing the highest difficulty rating, without duplicates.
pub fn hardest_rides(rows: &[WorkoutRecord]) -> Vec<HardestRide> {
    let Some(max) = nan_max(rows.iter().map(|r| r.difficulty_rating)) else {
        return Vec::new();
    };
    let mut out: Vec<HardestRide> = Vec::new();
    for r in rows.iter().filter(|r| r.difficulty_rating == max) {
        let ride = HardestRide {
            instructor: r.instructor.clone(),
            title: r.title.clone(),
            difficulty_rating: r.difficulty_rating,
        };
        if !out.contains(&ride) {
            out.push(ride);
        }
    }
    out
}

/// Rides sharing the best leaderboard percentile, without duplicates.
pub fn best_leaderboard_rides(rows: &[WorkoutRecord]) -> Vec<WorkoutRecord> {
    let Some(max) = nan_max(rows.iter().map(|r| r.leaderboard_pct)) else {
        return Vec::new();
    };
    let mut out: Vec<WorkoutRecord> = Vec::new();
    for r in rows.iter().filter(|r| r.leaderboard_pct == max) {
        if !out.contains(r) {
            out.push(r.clone());
        }
    }
    out
}

fn group_by_instructor(
    rows: &[WorkoutRecord],
    value: impl Fn(&WorkoutRecord) -> f64,
) -> BTreeMap<&str, Vec<f64>> {
    let mut map: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in rows {
        map.entry(r.instructor.as_str()).or_default().push(value(r));
    }
    map
}

fn sorted_descending(mut values: Vec<(String, f64)>) -> Vec<(String, f64)> {
    values.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    values
}

/// Mean leaderboard percentile per instructor, best first.
pub fn leaderboard_by_instructor(rows: &[WorkoutRecord]) -> Vec<(String, f64)> {
    let grouped: Vec<(String, f64)> = group_by_instructor(rows, |r| r.leaderboard_pct)
        .into_iter()
        .map(|(name, v)| (name.to_string(), nan_mean(v)))
        .collect();
    sorted_descending(grouped)
}

/// Total minutes ridden per instructor, largest first.
pub fn ride_time_by_instructor(rows: &[WorkoutRecord]) -> Vec<(String, f64)> {
    let grouped: Vec<(String, f64)> = group_by_instructor(rows, |r| r.ride_time)
        .into_iter()
        .map(|(name, v)| (name.to_string(), v.into_iter().filter(|x| !x.is_nan()).sum()))
        .collect();
    sorted_descending(grouped)
}

/// Mean difficulty rating per instructor, hardest first.
pub fn difficulty_by_instructor(rows: &[WorkoutRecord]) -> Vec<(String, f64)> {
    let grouped: Vec<(String, f64)> = group_by_instructor(rows, |r| r.difficulty_rating)
        .into_iter()
        .map(|(name, v)| (name.to_string(), nan_mean(v)))
        .collect();
    sorted_descending(grouped)
}

/// Total minutes ridden per difficulty bucket.
///
/// Every bucket is listed in bucket order, with zero for buckets without
/// rides.
pub fn ride_time_by_difficulty(rows: &[WorkoutRecord]) -> Vec<(DifficultyBucket, f64)> {
    ALL_BUCKETS
        .iter()
        .map(|b| {
            let total: f64 = rows
                .iter()
                .filter(|r| r.difficulty == *b)
                .map(|r| r.ride_time)
                .filter(|x| !x.is_nan())
                .sum();
            (*b, total)
        })
        .collect()
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1).and_then(|d| d.pred_opt())
}

/// Mean leaderboard percentile per calendar month.
///
/// Points are placed on month-end dates and cover every month from the first
/// to the last ride; months without rides have a `NaN` value.
pub fn monthly_leaderboard(rows: &[WorkoutRecord]) -> Vec<(NaiveDate, f64)> {
    let mut map: BTreeMap<(i32, u32), Vec<f64>> = BTreeMap::new();
    for r in rows {
        map.entry((r.date.year(), r.date.month()))
            .or_default()
            .push(r.leaderboard_pct);
    }
    let (Some(first), Some(last)) = (
        map.keys().next().copied(),
        map.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    let mut points = Vec::new();
    let (mut year, mut month) = first;
    while (year, month) <= last {
        if let Some(end) = month_end(year, month) {
            let value = map
                .remove(&(year, month))
                .map(|v| nan_mean(v))
                .unwrap_or(f64::NAN);
            points.push((end, value));
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    points
}

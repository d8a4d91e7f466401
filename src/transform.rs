//! Derive the normalized ride table from the raw dataset rows.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::loader::RawRide;

/// Difficulty bucket used for grouping and filtering.
///
/// Variants are declared in bin order so the derived `Ord` matches the order
/// the buckets are displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DifficultyBucket {
    #[serde(rename = "0-3")]
    UpToThree,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
}

pub const ALL_BUCKETS: [DifficultyBucket; 8] = [
    DifficultyBucket::UpToThree,
    DifficultyBucket::Three,
    DifficultyBucket::Four,
    DifficultyBucket::Five,
    DifficultyBucket::Six,
    DifficultyBucket::Seven,
    DifficultyBucket::Eight,
    DifficultyBucket::Nine,
];

impl DifficultyBucket {
    /// Bucket a rating in `(0, 10]`.
    ///
    /// Bins are right-closed on integer edges: `(0, 3]` is `"0-3"`, `(3, 4]`
    /// is `"3"` and so on up to `(9, 10]`, which is `"9"`. Each bucket is
    /// labeled with its lower edge.
    pub fn from_rating(rating: f64) -> Option<Self> {
        if !(rating > 0.0 && rating <= 10.0) {
            return None;
        }
        let bucket = match rating.ceil() as u32 {
            0..=3 => DifficultyBucket::UpToThree,
            4 => DifficultyBucket::Three,
            5 => DifficultyBucket::Four,
            6 => DifficultyBucket::Five,
            7 => DifficultyBucket::Six,
            8 => DifficultyBucket::Seven,
            9 => DifficultyBucket::Eight,
            _ => DifficultyBucket::Nine,
        };
        Some(bucket)
    }

    pub fn label(self) -> &'static str {
        match self {
            DifficultyBucket::UpToThree => "0-3",
            DifficultyBucket::Three => "3",
            DifficultyBucket::Four => "4",
            DifficultyBucket::Five => "5",
            DifficultyBucket::Six => "6",
            DifficultyBucket::Seven => "7",
            DifficultyBucket::Eight => "8",
            DifficultyBucket::Nine => "9",
        }
    }
}

impl std::fmt::Display for DifficultyBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single completed ride after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub date: NaiveDate,
    pub instructor: String,
    pub title: String,
    /// Duration in minutes.
    pub ride_time: f64,
    pub difficulty_rating: f64,
    pub leaderboard_rank: u32,
    pub leaderboard_users: u32,
    pub difficulty: DifficultyBucket,
    /// `1 - rank / users`; higher is better.
    pub leaderboard_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    InvalidTimestamp(i64),
    RatingOutOfRange { title: String, rating: f64 },
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformError::InvalidTimestamp(ts) => write!(f, "invalid ride timestamp: {ts}"),
            TransformError::RatingOutOfRange { title, rating } => {
                write!(f, "difficulty rating {rating} of '{title}' is outside (0, 10]")
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// Calendar date (UTC) of an epoch timestamp, dropping the time of day.
pub fn epoch_to_date(secs: i64) -> Result<NaiveDate, TransformError> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.date_naive())
        .ok_or(TransformError::InvalidTimestamp(secs))
}

/// Leaderboard percentile, `1 - rank / users`.
///
/// An empty leaderboard (`users == 0`) is not guarded and produces a
/// non-finite value.
pub fn leaderboard_percentile(rank: u32, users: u32) -> f64 {
    1.0 - rank as f64 / users as f64
}

/// Build the normalized table from raw rows.
///
/// Rows with a difficulty rating of exactly zero are unrated and removed.
/// The input is never modified; a new table is returned.
pub fn transform(raw: &[RawRide]) -> Result<Vec<WorkoutRecord>, TransformError> {
    let mut records = Vec::with_capacity(raw.len());
    let mut unrated = 0usize;
    for ride in raw {
        let date = epoch_to_date(ride.date)?;
        if ride.difficulty_rating == 0.0 {
            unrated += 1;
            continue;
        }
        let ride_time = ride.ride_time / 60.0;
        let difficulty = DifficultyBucket::from_rating(ride.difficulty_rating).ok_or_else(|| {
            TransformError::RatingOutOfRange {
                title: ride.title.clone(),
                rating: ride.difficulty_rating,
            }
        })?;
        let leaderboard_pct = leaderboard_percentile(ride.leaderboard_rank, ride.leaderboard_users);
        if !leaderboard_pct.is_finite() {
            log::warn!(
                "Ride '{}' on {} has an empty leaderboard; percentile is {}",
                ride.title,
                date,
                leaderboard_pct
            );
        }
        records.push(WorkoutRecord {
            date,
            instructor: ride.instructor.clone(),
            title: ride.title.clone(),
            ride_time,
            difficulty_rating: ride.difficulty_rating,
            leaderboard_rank: ride.leaderboard_rank,
            leaderboard_users: ride.leaderboard_users,
            difficulty,
            leaderboard_pct,
        });
    }
    log::info!(
        "Transformed {} rides ({} unrated rides dropped)",
        records.len(),
        unrated
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rating: f64) -> RawRide {
        RawRide {
            date: 1_700_000_000,
            instructor: "Alice".into(),
            title: "30 min Pop Ride".into(),
            ride_time: 1800.0,
            difficulty_rating: rating,
            leaderboard_rank: 10,
            leaderboard_users: 200,
        }
    }

    #[test]
    fn scenario_row_is_normalized() {
        let out = transform(&[raw(7.5)]).unwrap();
        assert_eq!(out.len(), 1);
        let r = &out[0];
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
        assert_eq!(r.ride_time, 30.0);
        assert_eq!(r.difficulty, DifficultyBucket::Seven);
        assert_eq!(r.difficulty.label(), "7");
        assert!((r.leaderboard_pct - 0.95).abs() < 1e-12);
    }

    #[test]
    fn time_of_day_is_dropped() {
        // 2023-11-14 23:59:59 UTC
        assert_eq!(
            epoch_to_date(1_700_006_399).unwrap(),
            NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()
        );
        assert_eq!(
            epoch_to_date(1_700_006_400).unwrap(),
            NaiveDate::from_ymd_opt(2023, 11, 15).unwrap()
        );
    }

    #[test]
    fn unrated_rows_are_removed() {
        let input = vec![raw(7.5), raw(0.0), raw(5.0), raw(0.0)];
        let out = transform(&input).unwrap();
        assert_eq!(out.len(), input.len() - 2);
        assert!(out.iter().all(|r| r.difficulty_rating > 0.0));
    }

    #[test]
    fn bucket_boundaries() {
        let cases = [
            (0.1, "0-3"),
            (2.9, "0-3"),
            (3.0, "0-3"),
            (3.01, "3"),
            (3.7, "3"),
            (4.0, "3"),
            (4.5, "4"),
            (4.9, "4"),
            (5.0, "4"),
            (6.0, "5"),
            (7.0, "6"),
            (7.5, "7"),
            (8.0, "7"),
            (8.01, "8"),
            (9.0, "8"),
            (9.5, "9"),
            (10.0, "9"),
        ];
        for (rating, label) in cases {
            let bucket = DifficultyBucket::from_rating(rating).unwrap();
            assert_eq!(bucket.label(), label, "rating {rating}");
        }
    }

    #[test]
    fn every_rating_in_range_is_bucketed() {
        let mut rating = 0.05;
        while rating <= 10.0 {
            assert!(DifficultyBucket::from_rating(rating).is_some(), "rating {rating}");
            rating += 0.05;
        }
        assert!(DifficultyBucket::from_rating(10.0).is_some());
    }

    #[test]
    fn out_of_range_rating_is_an_error() {
        assert_eq!(DifficultyBucket::from_rating(10.01), None);
        assert_eq!(DifficultyBucket::from_rating(-1.0), None);
        assert_eq!(DifficultyBucket::from_rating(f64::NAN), None);
        let err = transform(&[raw(11.0)]).unwrap_err();
        assert!(matches!(err, TransformError::RatingOutOfRange { .. }));
    }

    #[test]
    fn leaderboard_percentile_values() {
        assert!((leaderboard_percentile(1, 100) - 0.99).abs() < 1e-12);
        assert_eq!(leaderboard_percentile(100, 100), 0.0);
        assert!(leaderboard_percentile(0, 0).is_nan());
        assert_eq!(leaderboard_percentile(3, 0), f64::NEG_INFINITY);
    }

    #[test]
    fn empty_leaderboard_flows_through() {
        let mut row = raw(6.0);
        row.leaderboard_rank = 0;
        row.leaderboard_users = 0;
        let out = transform(&[row]).unwrap();
        assert!(out[0].leaderboard_pct.is_nan());
    }

    #[test]
    fn buckets_are_ordered() {
        let mut sorted = ALL_BUCKETS;
        sorted.sort();
        assert_eq!(sorted, ALL_BUCKETS);
        assert_eq!(DifficultyBucket::Nine.to_string(), "9");
    }

    #[test]
    fn invalid_timestamp_is_an_error() {
        let mut row = raw(5.0);
        row.date = i64::MAX;
        assert_eq!(
            transform(&[row]).unwrap_err(),
            TransformError::InvalidTimestamp(i64::MAX)
        );
    }
}

use crate::{analysis::SummaryStats, transform::WorkoutRecord};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(
    value: &T,
    path: P,
) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value).map_err(std::io::Error::other)
}

pub fn write_csv<T: Serialize>(writer: impl Write, records: &[T]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(Into::into)
}

pub fn save_rides_csv<P: AsRef<Path>>(path: P, rides: &[WorkoutRecord]) -> csv::Result<()> {
    write_csv(std::fs::File::create(path)?, rides)
}

pub fn save_rides_json<P: AsRef<Path>>(path: P, rides: &[WorkoutRecord]) -> std::io::Result<()> {
    write_json(rides, path)
}

pub fn save_summary_json<P: AsRef<Path>>(path: P, summary: &SummaryStats) -> std::io::Result<()> {
    write_json(summary, path)
}

/// Save the filtered rides, choosing CSV or JSON from the file extension.
///
/// Anything that is not `.csv` is written as JSON.
pub fn save_rides<P: AsRef<Path>>(
    path: P,
    rides: &[WorkoutRecord],
) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.as_ref();
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
    {
        Some(ext) if ext == "csv" => save_rides_csv(path, rides)?,
        _ => save_rides_json(path, rides)?,
    }
    log::info!("Exported {} rides to {}", rides.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::DifficultyBucket;
    use chrono::NaiveDate;

    fn rides() -> Vec<WorkoutRecord> {
        vec![WorkoutRecord {
            date: NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
            instructor: "Alice".into(),
            title: "30 min Pop Ride".into(),
            ride_time: 30.0,
            difficulty_rating: 7.5,
            leaderboard_rank: 10,
            leaderboard_users: 200,
            difficulty: DifficultyBucket::Seven,
            leaderboard_pct: 0.95,
        }]
    }

    #[test]
    fn csv_export_has_header_and_bucket_label() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &rides()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(
                "date,instructor,title,ride_time,difficulty_rating,leaderboard_rank,leaderboard_users,difficulty,leaderboard_pct"
            )
        );
        assert_eq!(
            lines.next(),
            Some("2023-11-14,Alice,30 min Pop Ride,30.0,7.5,10,200,7,0.95")
        );
    }

    #[test]
    fn json_export_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rides.json");
        save_rides(&path, &rides()).unwrap();
        let data = std::fs::read_to_string(&path).unwrap();
        let loaded: Vec<WorkoutRecord> = serde_json::from_str(&data).unwrap();
        assert_eq!(loaded, rides());
    }

    #[test]
    fn save_rides_picks_csv_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rides.CSV");
        save_rides(&path, &rides()).unwrap();
        let data = std::fs::read_to_string(&path).unwrap();
        assert!(data.starts_with("date,instructor"));
    }

    #[test]
    fn summary_json_writes_nan_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = crate::analysis::summarize(&[]);
        save_summary_json(&path, &summary).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["ride_count"], 0);
        assert!(value["avg_ride_time"].is_null());
    }
}

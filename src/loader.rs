//! Reading the ride dataset from disk.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the dataset path from the settings.
pub const DATA_ENV_VAR: &str = "PELOTON_DATA";

const DEFAULT_DATA_FILE: &str = "peloton_data.csv";

/// One ride exactly as it is stored in the dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRide {
    /// Seconds since the Unix epoch.
    pub date: i64,
    pub instructor: String,
    pub title: String,
    /// Duration in seconds.
    pub ride_time: f64,
    pub difficulty_rating: f64,
    pub leaderboard_rank: u32,
    pub leaderboard_users: u32,
}

impl RawRide {
    fn identity(&self) -> (i64, String, String, u64, u64, u32, u32) {
        (
            self.date,
            self.instructor.clone(),
            self.title.clone(),
            self.ride_time.to_bits(),
            self.difficulty_rating.to_bits(),
            self.leaderboard_rank,
            self.leaderboard_users,
        )
    }
}

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    UnsupportedFormat(PathBuf),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "failed to read dataset: {e}"),
            LoadError::Csv(e) => write!(f, "malformed CSV dataset: {e}"),
            LoadError::Json(e) => write!(f, "malformed JSON dataset: {e}"),
            LoadError::UnsupportedFormat(p) => {
                write!(f, "unsupported dataset format: {}", p.display())
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Csv(e) => Some(e),
            LoadError::Json(e) => Some(e),
            LoadError::UnsupportedFormat(_) => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Csv(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e)
    }
}

/// Decide which dataset file to open.
///
/// A path given on the command line wins, then the `PELOTON_DATA`
/// environment variable, then the path stored in the settings. Without any of
/// those `peloton_data.csv` in the working directory is used.
pub fn resolve_data_path(cli_arg: Option<&str>, settings_path: Option<&str>) -> PathBuf {
    cli_arg
        .map(str::to_string)
        .or_else(|| std::env::var(DATA_ENV_VAR).ok())
        .or_else(|| settings_path.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string())
        .into()
}

/// Parse rides from CSV with a header row naming the seven columns.
///
/// Any row that fails to decode aborts the whole load.
pub fn parse_rides_csv<R: std::io::Read>(reader: R) -> Result<Vec<RawRide>, LoadError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rides = Vec::new();
    for result in rdr.deserialize::<RawRide>() {
        rides.push(result?);
    }
    Ok(rides)
}

/// Parse rides from a JSON array of row objects.
pub fn parse_rides_json<R: std::io::Read>(reader: R) -> Result<Vec<RawRide>, LoadError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Remove rows that are identical across every column, keeping the first
/// occurrence and the original order.
pub fn dedup_rides(rides: Vec<RawRide>) -> Vec<RawRide> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rides.len());
    for ride in rides {
        if seen.insert(ride.identity()) {
            out.push(ride);
        }
    }
    out
}

/// Load and deduplicate the dataset at `path`.
pub fn load_rides<P: AsRef<Path>>(path: P) -> Result<Vec<RawRide>, LoadError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    let is_csv = match ext.as_deref() {
        Some("csv") => true,
        Some("json") => false,
        _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    };
    let reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let rides = if is_csv {
        parse_rides_csv(reader)?
    } else {
        parse_rides_json(reader)?
    };
    let total = rides.len();
    let rides = dedup_rides(rides);
    log::info!(
        "Loaded {} rides from {} ({} duplicates dropped)",
        rides.len(),
        path.display(),
        total - rides.len()
    );
    Ok(rides)
}

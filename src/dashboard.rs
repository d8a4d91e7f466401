//! Interaction state for the dashboard.
//!
//! The ride table is loaded once and never changes. Each filter change moves
//! the dashboard through `Filtering` (recompute the matching rows from the
//! full table) and `Rendering` (recompute every aggregate shown on screen)
//! back to `Idle`.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::analysis::{self, ColumnMaxima, HardestRide, SummaryStats};
use crate::filter::{self, FilterSpec, Selection};
use crate::transform::{DifficultyBucket, WorkoutRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Filtering,
    Rendering,
}

/// A single user action on the filter controls.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterChange {
    Start(NaiveDate),
    End(NaiveDate),
    Instructors(Selection<String>),
    Difficulties(Selection<DifficultyBucket>),
    RideTimes(Selection<String>),
    /// Back to the full date span with everything selected.
    Reset,
}

/// Everything drawn for one filter specification.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub summary: SummaryStats,
    pub hardest: Vec<HardestRide>,
    pub best_leaderboard: Vec<WorkoutRecord>,
    pub leaderboard_by_instructor: Vec<(String, f64)>,
    pub ride_time_by_instructor: Vec<(String, f64)>,
    pub ride_time_by_difficulty: Vec<(DifficultyBucket, f64)>,
    pub difficulty_by_instructor: Vec<(String, f64)>,
    pub monthly_leaderboard: Vec<(NaiveDate, f64)>,
    pub column_maxima: ColumnMaxima,
    pub rows: Vec<WorkoutRecord>,
}

impl DashboardView {
    pub fn build(rows: Vec<WorkoutRecord>) -> Self {
        Self {
            summary: analysis::summarize(&rows),
            hardest: analysis::hardest_rides(&rows),
            best_leaderboard: analysis::best_leaderboard_rides(&rows),
            leaderboard_by_instructor: analysis::leaderboard_by_instructor(&rows),
            ride_time_by_instructor: analysis::ride_time_by_instructor(&rows),
            ride_time_by_difficulty: analysis::ride_time_by_difficulty(&rows),
            difficulty_by_instructor: analysis::difficulty_by_instructor(&rows),
            monthly_leaderboard: analysis::monthly_leaderboard(&rows),
            column_maxima: ColumnMaxima::of(&rows),
            rows,
        }
    }
}

/// Choices offered by the filter widgets, derived from the full table.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChoices {
    pub instructors: Vec<String>,
    pub difficulties: Vec<DifficultyBucket>,
    pub ride_times: Vec<String>,
}

impl FilterChoices {
    pub fn of(table: &[WorkoutRecord]) -> Self {
        Self {
            instructors: filter::instructor_choices(table),
            difficulties: filter::difficulty_choices(table),
            ride_times: filter::ride_time_choices(table),
        }
    }
}

pub struct Dashboard {
    base: Arc<Vec<WorkoutRecord>>,
    spec: FilterSpec,
    phase: Phase,
    filtered: Vec<WorkoutRecord>,
    view: DashboardView,
    choices: FilterChoices,
    first_ride: Option<NaiveDate>,
}

impl Dashboard {
    /// Create the dashboard with the default filter already rendered.
    pub fn new(base: Arc<Vec<WorkoutRecord>>) -> Self {
        let spec = FilterSpec::covering(&base);
        let filtered = filter::apply(&base, &spec);
        let view = DashboardView::build(filtered.clone());
        let choices = FilterChoices::of(&base);
        let first_ride = analysis::first_ride(&base);
        Self {
            base,
            spec,
            phase: Phase::Idle,
            filtered,
            view,
            choices,
            first_ride,
        }
    }

    pub fn base(&self) -> &[WorkoutRecord] {
        &self.base
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn choices(&self) -> &FilterChoices {
        &self.choices
    }

    pub fn first_ride(&self) -> Option<NaiveDate> {
        self.first_ride
    }

    /// Apply a user action to the filter specification.
    ///
    /// Returns `true` when the specification changed and the dashboard
    /// entered `Filtering`. A change that leaves the specification as it was
    /// keeps the current view.
    pub fn submit(&mut self, change: FilterChange) -> bool {
        let mut spec = self.spec.clone();
        match change {
            FilterChange::Start(d) => spec.start = d,
            FilterChange::End(d) => spec.end = d,
            FilterChange::Instructors(sel) => spec.instructors = sel,
            FilterChange::Difficulties(sel) => spec.difficulties = sel,
            FilterChange::RideTimes(sel) => spec.ride_times = sel,
            FilterChange::Reset => spec = FilterSpec::covering(&self.base),
        }
        if spec == self.spec {
            return false;
        }
        self.spec = spec;
        self.phase = Phase::Filtering;
        log::debug!("Filter changed: {:?}", self.spec);
        true
    }

    /// Perform one state transition and return the new phase.
    pub fn advance(&mut self) -> Phase {
        self.phase = match self.phase {
            Phase::Idle => Phase::Idle,
            Phase::Filtering => {
                self.filtered = filter::apply(&self.base, &self.spec);
                log::debug!(
                    "Filtering matched {} of {} rides",
                    self.filtered.len(),
                    self.base.len()
                );
                Phase::Rendering
            }
            Phase::Rendering => {
                self.view = DashboardView::build(self.filtered.clone());
                Phase::Idle
            }
        };
        self.phase
    }

    /// Advance until the dashboard is idle again.
    pub fn settle(&mut self) {
        while self.advance() != Phase::Idle {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record(day: u32, instructor: &str, minutes: f64, rating: f64, rank: u32) -> WorkoutRecord {
        WorkoutRecord {
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            instructor: instructor.into(),
            title: format!("{minutes} min Ride"),
            ride_time: minutes,
            difficulty_rating: rating,
            leaderboard_rank: rank,
            leaderboard_users: 100,
            difficulty: DifficultyBucket::from_rating(rating).unwrap(),
            leaderboard_pct: 1.0 - rank as f64 / 100.0,
        }
    }

    fn dashboard() -> Dashboard {
        Dashboard::new(Arc::new(vec![
            record(1, "Alice", 30.0, 7.5, 10),
            record(3, "Bob", 20.0, 5.0, 40),
            record(10, "Alice", 45.0, 8.8, 5),
        ]))
    }

    #[test]
    fn initial_view_covers_everything() {
        let dash = dashboard();
        assert_eq!(dash.phase(), Phase::Idle);
        assert_eq!(dash.view().rows.len(), 3);
        assert_eq!(dash.view().summary.ride_count, 3);
        assert_eq!(dash.first_ride(), NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(dash.choices().instructors, vec!["Alice", "Bob"]);
    }

    #[test]
    fn transitions_filtering_rendering_idle() {
        let mut dash = dashboard();
        let only_bob = Selection::Subset(BTreeSet::from(["Bob".to_string()]));
        assert!(dash.submit(FilterChange::Instructors(only_bob)));
        assert_eq!(dash.phase(), Phase::Filtering);
        // the view is not touched until rendering
        assert_eq!(dash.view().rows.len(), 3);
        assert_eq!(dash.advance(), Phase::Rendering);
        assert_eq!(dash.view().rows.len(), 3);
        assert_eq!(dash.advance(), Phase::Idle);
        assert_eq!(dash.view().rows.len(), 1);
        assert_eq!(dash.view().summary.top_instructors, vec!["Bob".to_string()]);
        assert_eq!(dash.advance(), Phase::Idle);
    }

    #[test]
    fn unchanged_spec_is_ignored() {
        let mut dash = dashboard();
        let start = dash.spec().start;
        assert!(!dash.submit(FilterChange::Start(start)));
        assert_eq!(dash.phase(), Phase::Idle);
        assert!(!dash.submit(FilterChange::Reset));
    }

    #[test]
    fn every_change_starts_from_the_full_table() {
        let mut dash = dashboard();
        let day3 = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
        dash.submit(FilterChange::Start(day3));
        dash.submit(FilterChange::End(day3));
        dash.settle();
        assert_eq!(dash.view().rows.len(), 1);

        dash.submit(FilterChange::Reset);
        dash.settle();
        assert_eq!(dash.view().rows.len(), 3);
        assert_eq!(dash.base().len(), 3);
    }

    #[test]
    fn empty_selection_renders_empty_view() {
        let mut dash = dashboard();
        dash.submit(FilterChange::RideTimes(Selection::Subset(BTreeSet::new())));
        dash.settle();
        let view = dash.view();
        assert!(view.rows.is_empty());
        assert!(view.summary.avg_ride_time.is_nan());
        assert!(view.hardest.is_empty());
        assert!(view.monthly_leaderboard.is_empty());
        assert_eq!(view.ride_time_by_difficulty.len(), 8);
    }
}

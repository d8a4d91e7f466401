use crate::{
    dashboard::DashboardView,
    plotting::line_segments,
};
use chrono::{Datelike, NaiveDate};
use maud::{Markup, html};
use plotters::prelude::*;
use std::path::Path;

trait FormatStat {
    fn fmt_stat(self, digits: usize) -> String;
}

impl FormatStat for f64 {
    fn fmt_stat(self, digits: usize) -> String {
        format!("{:.*}", digits, self)
    }
}

impl FormatStat for Option<NaiveDate> {
    fn fmt_stat(self, _digits: usize) -> String {
        self.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into())
    }
}

/// Write an HTML report of `view` next to a PNG chart of the monthly
/// leaderboard percentile.
pub fn export_html_report<P: AsRef<Path>>(
    path: P,
    view: &DashboardView,
    rider: &str,
    first_ride: Option<NaiveDate>,
) -> std::io::Result<()> {
    let path = path.as_ref();
    let chart_path = path.with_extension("png");
    let chart_file = match generate_monthly_chart(&view.monthly_leaderboard, &chart_path) {
        Ok(_) => chart_path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("")),
        Err(e) => {
            log::error!("Failed to generate chart: {}", e);
            std::ffi::OsStr::new("")
        }
    };
    let markup = build_html(view, rider, first_ride, chart_file);
    std::fs::write(path, markup.into_string())?;
    log::info!("Wrote report to {}", path.display());
    Ok(())
}

fn generate_monthly_chart(
    points: &[(NaiveDate, f64)],
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (800, 400)).into_drawing_area();
    root.fill(&WHITE)?;
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        root.present()?;
        return Ok(());
    };
    let x0 = first.0.num_days_from_ce();
    let x1 = last.0.num_days_from_ce().max(x0 + 1);
    let mut chart = ChartBuilder::on(&root)
        .caption("Average Leaderboard Ranking Percentile (monthly)", ("sans-serif", 22))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x0..x1, 0f64..1f64)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_label_formatter(&|x| {
            NaiveDate::from_num_days_from_ce_opt(*x)
                .map(|d| d.format("%b-%Y").to_string())
                .unwrap_or_default()
        })
        .y_desc("Leaderboard Percentile")
        .draw()?;
    let color = RGBColor(0xFF, 0x4B, 0x64);
    for segment in line_segments(points) {
        chart.draw_series(LineSeries::new(
            segment.into_iter().map(|[x, y]| (x as i32, y)),
            &color,
        ))?;
    }
    root.present()?;
    Ok(())
}

fn build_html(
    view: &DashboardView,
    rider: &str,
    first_ride: Option<NaiveDate>,
    chart_file: &std::ffi::OsStr,
) -> Markup {
    let s = &view.summary;
    html! {
        html {
            head { meta charset="utf-8"; title { "Peloton Statistics" } }
            body {
                h1 { "User: " (rider) " Cycling Analysis" }
                p { "First Ride: " (first_ride.fmt_stat(0)) }
                h2 { "Summary" }
                table border="1" {
                    tr { th { "Total Number of Rides" } td { (s.ride_count) } }
                    tr { th { "Top Instructor(s)" } td { (s.top_instructors.join(", ")) } }
                    tr { th { "Average Ride Time (Minutes)" } td { (s.avg_ride_time.fmt_stat(2)) } }
                    tr { th { "Average Difficulty Rating" } td { (s.avg_difficulty.fmt_stat(2)) } }
                    tr { th { "Average Leaderboard Percentile" } td { (s.avg_leaderboard_pct.fmt_stat(4)) } }
                }
                h2 { "Most Difficult Ride by User Rating" }
                table border="1" {
                    tr { th { "Instructor" } th { "Title" } th { "Difficulty Rating" } }
                    @for r in &view.hardest {
                        tr {
                            td { (r.instructor) }
                            td { (r.title) }
                            td { (r.difficulty_rating.fmt_stat(2)) }
                        }
                    }
                }
                h2 { "Leaderboard Performance by Instructor" }
                table border="1" {
                    tr { th { "Instructor" } th { "Leaderboard Percentile" } }
                    @for (name, v) in &view.leaderboard_by_instructor {
                        tr { td { (name) } td { (v.fmt_stat(4)) } }
                    }
                }
                h2 { "Total Ride Time by Instructor" }
                table border="1" {
                    tr { th { "Instructor" } th { "Minutes" } }
                    @for (name, v) in &view.ride_time_by_instructor {
                        tr { td { (name) } td { (v.fmt_stat(1)) } }
                    }
                }
                h2 { "Total Ride Time by Difficulty Rating" }
                table border="1" {
                    tr { th { "Difficulty" } th { "Minutes" } }
                    @for (bucket, v) in &view.ride_time_by_difficulty {
                        tr { td { (bucket.label()) } td { (v.fmt_stat(1)) } }
                    }
                }
                h2 { "Average Leaderboard Ranking Percentile (monthly)" }
                @if chart_file.is_empty() {
                    p { "Chart unavailable" }
                } @else {
                    img src=(chart_file.to_string_lossy());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{DifficultyBucket, WorkoutRecord};
    use std::ffi::OsStr;

    fn view() -> DashboardView {
        DashboardView::build(vec![WorkoutRecord {
            date: NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
            instructor: "Alice".into(),
            title: "30 min Pop Ride".into(),
            ride_time: 30.0,
            difficulty_rating: 7.5,
            leaderboard_rank: 10,
            leaderboard_users: 200,
            difficulty: DifficultyBucket::Seven,
            leaderboard_pct: 0.95,
        }])
    }

    #[test]
    fn format_stat_for_f64() {
        assert_eq!(3.456_f64.fmt_stat(2), "3.46");
        assert_eq!(0.95_f64.fmt_stat(4), "0.9500");
        assert_eq!(f64::NAN.fmt_stat(2), "NaN");
    }

    #[test]
    fn format_stat_for_date() {
        assert_eq!(None::<NaiveDate>.fmt_stat(0), "-");
        assert_eq!(NaiveDate::from_ymd_opt(2024, 1, 2).fmt_stat(0), "2024-01-02");
    }

    #[test]
    fn build_html_renders_summary() {
        let output = build_html(
            &view(),
            "rider@example.com",
            NaiveDate::from_ymd_opt(2023, 11, 14),
            OsStr::new("report.png"),
        )
        .into_string();
        assert!(output.contains("User: rider@example.com Cycling Analysis"));
        assert!(output.contains("First Ride: 2023-11-14"));
        assert!(output.contains("<td>30.00</td>"));
        assert!(output.contains("<td>0.9500</td>"));
        assert!(output.contains("30 min Pop Ride"));
        assert!(output.contains("<img src=\"report.png\">"));
    }

    #[test]
    fn build_html_handles_empty_chart_file() {
        let empty = DashboardView::build(Vec::new());
        let output = build_html(&empty, "rider", None, OsStr::new("")).into_string();
        assert!(output.contains("Chart unavailable"));
        assert!(!output.contains("<img"));
        assert!(output.contains("<td>NaN</td>"));
    }

    #[test]
    fn export_writes_html_and_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        export_html_report(&path, &view(), "rider", NaiveDate::from_ymd_opt(2023, 11, 14))
            .unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("User: rider Cycling Analysis"));
        assert!(dir.path().join("report.png").exists());
    }
}

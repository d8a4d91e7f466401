use chrono::{Datelike, NaiveDate};
use egui::Color32;
use egui_plot::{Bar, BarChart, Line, PlotPoints};

use crate::transform::DifficultyBucket;

/// Fill color used for every bar chart.
pub const BAR_COLOR: Color32 = Color32::from_rgb(0xFF, 0x4B, 0x64);

/// Highlight color for column maxima in the raw data table.
pub const HIGHLIGHT_COLOR: Color32 = Color32::from_rgb(0xFF, 0x00, 0x00);

/// Build a bar chart with one bar per category, in the given order.
///
/// Bars are placed at `x = 0, 1, 2, ...`; use [`category_axis_label`] to map
/// axis positions back to category names.
pub fn category_bar_chart(values: &[(String, f64)], name: &str) -> BarChart {
    let bars: Vec<Bar> = values
        .iter()
        .enumerate()
        .map(|(idx, (label, value))| {
            Bar::new(idx as f64, *value)
                .name(label)
                .fill(BAR_COLOR)
                .width(0.7)
        })
        .collect();
    BarChart::new(bars).color(BAR_COLOR).name(name)
}

/// Bar chart of a per-bucket aggregate, keeping bucket order.
pub fn difficulty_bar_chart(values: &[(DifficultyBucket, f64)], name: &str) -> BarChart {
    let labeled: Vec<(String, f64)> = values
        .iter()
        .map(|(b, v)| (b.label().to_string(), *v))
        .collect();
    category_bar_chart(&labeled, name)
}

/// Label for a grid mark on a categorical axis.
///
/// Only integer positions inside the category range get a label.
pub fn category_axis_label(labels: &[String], value: f64) -> String {
    let idx = value.round();
    if (value - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

/// Split a date series into drawable segments, breaking at `NaN` values.
///
/// The x coordinate is the day number from the common era.
pub fn line_segments(points: &[(NaiveDate, f64)]) -> Vec<Vec<[f64; 2]>> {
    let mut segments = Vec::new();
    let mut current: Vec<[f64; 2]> = Vec::new();
    for (date, value) in points {
        if value.is_nan() {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push([date.num_days_from_ce() as f64, *value]);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Line plot of the monthly leaderboard percentile, one line per gap-free
/// stretch of months.
pub fn monthly_leaderboard_lines(points: &[(NaiveDate, f64)]) -> Vec<Line> {
    line_segments(points)
        .into_iter()
        .map(|seg| {
            Line::new(PlotPoints::from(seg))
                .color(BAR_COLOR)
                .name("leaderboard_percentile")
        })
        .collect()
}

/// Format a day-number axis value as a month label.
pub fn format_month_mark(value: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(value.round() as i32)
        .map(|d| d.format("%b-%Y").to_string())
        .unwrap_or_default()
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Blue-white-red diverging colormap for `t` in `[0, 1]`.
///
/// `NaN` maps to white.
pub fn bwr_color(t: f64) -> Color32 {
    if t.is_nan() {
        return Color32::WHITE;
    }
    let t = t.clamp(0.0, 1.0);
    let (r, g, b) = if t <= 0.5 {
        let s = t / 0.5;
        (s, s, 1.0)
    } else {
        let s = (t - 0.5) / 0.5;
        (1.0, lerp(1.0, 0.0, s), lerp(1.0, 0.0, s))
    };
    Color32::from_rgb(
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

/// Background colors for `values`, scaled between their minimum and maximum.
///
/// When all values are equal every cell gets the low end of the scale.
pub fn gradient_colors(values: &[f64]) -> Vec<Color32> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                Color32::WHITE
            } else if max > min {
                bwr_color((v - min) / (max - min))
            } else {
                bwr_color(0.0)
            }
        })
        .collect()
}

/// Readable text color on top of `background`.
pub fn text_color_for(background: Color32) -> Color32 {
    let channel = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    let luminance = 0.2126 * channel(background.r())
        + 0.7152 * channel(background.g())
        + 0.0722 * channel(background.b());
    if luminance < 0.408 {
        Color32::WHITE
    } else {
        Color32::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui_plot::{PlotGeometry, PlotItem};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn line_points(line: Line) -> Vec<[f64; 2]> {
        if let PlotGeometry::Points(points) = line.geometry() {
            points.iter().map(|p| [p.x, p.y]).collect()
        } else {
            panic!("expected points")
        }
    }

    #[test]
    fn test_line_segments_break_on_nan() {
        let points = vec![
            (d(2024, 1, 31), 0.9),
            (d(2024, 2, 29), f64::NAN),
            (d(2024, 3, 31), 0.5),
            (d(2024, 4, 30), 0.6),
        ];
        let segs = line_segments(&points);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0], vec![[d(2024, 1, 31).num_days_from_ce() as f64, 0.9]]);
        assert_eq!(segs[1].len(), 2);
        assert!(line_segments(&[(d(2024, 1, 31), f64::NAN)]).is_empty());
    }

    #[test]
    fn test_monthly_leaderboard_lines() {
        let points = vec![(d(2024, 1, 31), 0.9), (d(2024, 2, 29), 0.8)];
        let lines = monthly_leaderboard_lines(&points);
        assert_eq!(lines.len(), 1);
        let expected = vec![
            [d(2024, 1, 31).num_days_from_ce() as f64, 0.9],
            [d(2024, 2, 29).num_days_from_ce() as f64, 0.8],
        ];
        assert_eq!(line_points(lines.into_iter().next().unwrap()), expected);
    }

    #[test]
    fn test_category_axis_label() {
        let labels = vec!["Alice".to_string(), "Bob".to_string()];
        assert_eq!(category_axis_label(&labels, 0.0), "Alice");
        assert_eq!(category_axis_label(&labels, 1.0), "Bob");
        assert_eq!(category_axis_label(&labels, 0.5), "");
        assert_eq!(category_axis_label(&labels, 2.0), "");
        assert_eq!(category_axis_label(&labels, -1.0), "");
    }

    #[test]
    fn test_format_month_mark() {
        let x = d(2024, 3, 31).num_days_from_ce() as f64;
        assert_eq!(format_month_mark(x), "Mar-2024");
    }

    #[test]
    fn test_bwr_color_endpoints() {
        assert_eq!(bwr_color(0.0), Color32::from_rgb(0, 0, 255));
        assert_eq!(bwr_color(0.5), Color32::from_rgb(255, 255, 255));
        assert_eq!(bwr_color(1.0), Color32::from_rgb(255, 0, 0));
        assert_eq!(bwr_color(f64::NAN), Color32::WHITE);
    }

    #[test]
    fn test_gradient_colors() {
        let colors = gradient_colors(&[8.0, 7.0, 6.0]);
        assert_eq!(colors[0], Color32::from_rgb(255, 0, 0));
        assert_eq!(colors[1], Color32::from_rgb(255, 255, 255));
        assert_eq!(colors[2], Color32::from_rgb(0, 0, 255));
        assert_eq!(gradient_colors(&[5.0, 5.0]), vec![bwr_color(0.0); 2]);
    }

    #[test]
    fn test_text_color_for() {
        assert_eq!(text_color_for(Color32::from_rgb(0, 0, 255)), Color32::WHITE);
        assert_eq!(text_color_for(Color32::WHITE), Color32::BLACK);
    }
}

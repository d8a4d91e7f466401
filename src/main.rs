//! Dashboard window and persistent user settings.

use dirs_next as dirs;
use eframe::{App, Frame, NativeOptions, egui};
use egui::RichText;
use egui_extras::{Column, DatePickerButton, TableBuilder};
use egui_plot::{Legend, Plot};
use rfd::FileDialog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use log::info;

mod analysis;
use analysis::{SummaryStats, format_load_message};
mod dashboard;
use dashboard::{Dashboard, FilterChange};
mod export;
use export::{save_rides, save_summary_json};
mod filter;
use filter::Selection;
mod loader;
use loader::{load_rides, resolve_data_path};
mod plotting;
use plotting::{
    HIGHLIGHT_COLOR, category_axis_label, category_bar_chart, difficulty_bar_chart,
    format_month_mark, gradient_colors, monthly_leaderboard_lines, text_color_for,
};
mod report;
mod transform;
use transform::{DifficultyBucket, WorkoutRecord, transform};

const LOGO_WIDTH: u32 = 300;
const LOGO_HEIGHT: u32 = 170;
const DEFAULT_LOGO_FILE: &str = "Peloton-Logo.jpeg";

fn default_rider_name() -> String {
    "rider".into()
}

fn default_logo_file() -> Option<String> {
    Some(DEFAULT_LOGO_FILE.into())
}

fn default_true() -> bool {
    true
}

fn default_chart_height() -> f32 {
    240.0
}

fn default_window_width() -> f32 {
    1280.0
}

fn default_window_height() -> f32 {
    900.0
}

/// Persistent user preferences.
///
/// Stored as JSON in the platform configuration directory. Every field has a
/// serde default so older or hand-edited files still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Settings {
    /// Dataset used when no path is given on the command line or through
    /// the `PELOTON_DATA` environment variable.
    #[serde(default)]
    data_file: Option<String>,
    /// Relative paths are resolved against the working directory.
    #[serde(default = "default_logo_file")]
    logo_file: Option<String>,
    #[serde(default = "default_rider_name")]
    rider_name: String,
    #[serde(default = "default_true")]
    highlight_max: bool,
    #[serde(default = "default_true")]
    show_gradient: bool,
    #[serde(default = "default_chart_height")]
    chart_height: f32,
    #[serde(default = "default_window_width")]
    window_width: f32,
    #[serde(default = "default_window_height")]
    window_height: f32,
}

impl Settings {
    const FILE: &'static str = "peloton_dashboard_settings.json";

    fn path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join(Self::FILE))
    }

    /// Load settings from the JSON configuration file, falling back to the
    /// defaults when the file is missing or unreadable.
    fn load() -> Self {
        if let Some(path) = Self::path() {
            if let Ok(data) = std::fs::read_to_string(&path) {
                match serde_json::from_str(&data) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("Ignoring invalid settings in {}: {e}", path.display()),
                }
            }
        }
        Self::default()
    }

    fn save(&self) {
        if let Some(path) = Self::path() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(data) = serde_json::to_string_pretty(self) {
                let _ = std::fs::write(path, data);
            }
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: None,
            logo_file: default_logo_file(),
            rider_name: default_rider_name(),
            highlight_max: true,
            show_gradient: true,
            chart_height: default_chart_height(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Tab {
    #[default]
    Summary,
    Charts,
    RawData,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Summary, Tab::Charts, Tab::RawData];

    fn label(self) -> &'static str {
        match self {
            Tab::Summary => "Summary",
            Tab::Charts => "Charts",
            Tab::RawData => "Raw Data",
        }
    }
}

fn decode_logo(path: &str) -> Result<egui::ColorImage, image::ImageError> {
    let img = image::open(path)?
        .resize_exact(
            LOGO_WIDTH,
            LOGO_HEIGHT,
            image::imageops::FilterType::Triangle,
        )
        .to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw()))
}

/// Text lines of the summary tab, left column first.
///
/// Averages keep their decimal point, so a whole number prints as `30.0`.
fn summary_lines(s: &SummaryStats) -> ([String; 2], [String; 3]) {
    (
        [
            format!("Total Number of Rides: {}", s.ride_count),
            format!("Top Instructor(s): {}", s.top_instructors.join(", ")),
        ],
        [
            format!("Average Ride Time: {:?} Minutes", s.avg_ride_time),
            format!("Average Difficulty Rating: {:?}", s.avg_difficulty),
            // fraction in [0, 1]; the "%" suffix is historical
            format!("Average Leaderboard Percentile: {:?}%", s.avg_leaderboard_pct),
        ],
    )
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into())
}

/// Label with an optional highlight behind it.
fn cell(ui: &mut egui::Ui, text: String, highlight: bool) {
    if highlight {
        ui.label(
            RichText::new(text)
                .background_color(HIGHLIGHT_COLOR)
                .color(egui::Color32::WHITE),
        );
    } else {
        ui.label(text);
    }
}

/// Multi-select drop down with an "All" entry.
///
/// Returns the new selection when the user changed it this frame.
fn multiselect<T: Ord + Clone>(
    ui: &mut egui::Ui,
    title: &str,
    choices: &[T],
    selection: &Selection<T>,
    label: impl Fn(&T) -> String,
) -> Option<Selection<T>> {
    let mut changed = None;
    ui.label(title);
    ui.menu_button(selection.summary(&label), |ui| {
        let mut all = selection.is_all();
        if ui.checkbox(&mut all, "All").changed() {
            changed = Some(if all {
                Selection::All
            } else {
                Selection::Subset(BTreeSet::new())
            });
        }
        ui.separator();
        for choice in choices {
            let mut on = !selection.is_all() && selection.contains(choice);
            if ui.checkbox(&mut on, label(choice)).changed() {
                changed = Some(selection.toggled(choice));
            }
        }
    });
    changed
}

struct PelotonApp {
    dashboard: Dashboard,
    settings: Settings,
    tab: Tab,
    logo: Option<egui::TextureHandle>,
    logo_attempted: bool,
    show_settings: bool,
    settings_dirty: bool,
    status: Option<String>,
}

impl PelotonApp {
    fn new(base: Arc<Vec<WorkoutRecord>>, settings: Settings, source: &str) -> Self {
        let status = format_load_message(base.len(), source);
        info!("{status}");
        Self {
            dashboard: Dashboard::new(base),
            settings,
            tab: Tab::default(),
            logo: None,
            logo_attempted: false,
            show_settings: false,
            settings_dirty: false,
            status: Some(status),
        }
    }

    fn ensure_logo(&mut self, ctx: &egui::Context) {
        if self.logo_attempted {
            return;
        }
        self.logo_attempted = true;
        let Some(path) = self.settings.logo_file.clone() else {
            return;
        };
        match decode_logo(&path) {
            Ok(img) => self.logo = Some(ctx.load_texture("logo", img, Default::default())),
            Err(e) => log::warn!("Failed to load logo {path}: {e}"),
        }
    }

    fn apply_changes(&mut self, changes: Vec<FilterChange>) {
        let mut dirty = false;
        for change in changes {
            dirty |= self.dashboard.submit(change);
        }
        if dirty {
            self.dashboard.settle();
            log::debug!("Dashboard {:?}", self.dashboard.phase());
        }
    }

    fn export_rows(&mut self) {
        if let Some(path) = FileDialog::new()
            .add_filter("CSV", &["csv"])
            .add_filter("JSON", &["json"])
            .save_file()
        {
            match save_rides(&path, &self.dashboard.view().rows) {
                Ok(()) => self.status = Some(format!("Exported rides to {}", path.display())),
                Err(e) => log::error!("Failed to export rides: {e}"),
            }
        }
    }

    fn export_summary(&mut self) {
        if let Some(path) = FileDialog::new().add_filter("JSON", &["json"]).save_file() {
            match save_summary_json(&path, &self.dashboard.view().summary) {
                Ok(()) => self.status = Some(format!("Exported summary to {}", path.display())),
                Err(e) => log::error!("Failed to export summary: {e}"),
            }
        }
    }

    fn export_report(&mut self) {
        if let Some(path) = FileDialog::new().add_filter("HTML", &["html"]).save_file() {
            match report::export_html_report(
                &path,
                self.dashboard.view(),
                &self.settings.rider_name,
                self.dashboard.first_ride(),
            ) {
                Ok(()) => self.status = Some(format!("Wrote report to {}", path.display())),
                Err(e) => log::error!("Failed to export report: {e}"),
            }
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Export Filtered Rows").clicked() {
                        self.export_rows();
                        ui.close_menu();
                    }
                    if ui.button("Export Summary").clicked() {
                        self.export_summary();
                        ui.close_menu();
                    }
                    if ui.button("Export HTML Report").clicked() {
                        self.export_report();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Settings").clicked() {
                        self.show_settings = true;
                        ui.close_menu();
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });
    }

    fn header(&mut self, ctx: &egui::Context) {
        self.ensure_logo(ctx);
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(logo) = &self.logo {
                    ui.image((
                        logo.id(),
                        egui::vec2(LOGO_WIDTH as f32, LOGO_HEIGHT as f32),
                    ));
                }
                ui.vertical(|ui| {
                    ui.heading(format!("User: {} Cycling Analysis", self.settings.rider_name));
                    ui.label(format!("First Ride: {}", fmt_date(self.dashboard.first_ride())));
                });
            });
        });
    }

    fn filter_panel(&mut self, ctx: &egui::Context) {
        let mut changes = Vec::new();
        egui::SidePanel::left("filter_panel").show(ctx, |ui| {
            ui.heading("Select Filters");
            ui.separator();
            let spec = self.dashboard.spec();
            let choices = self.dashboard.choices();

            ui.label("Start Date");
            let mut start = spec.start;
            if ui
                .add(DatePickerButton::new(&mut start).id_source("start_date"))
                .changed()
            {
                changes.push(FilterChange::Start(start));
            }
            ui.label("End Date");
            let mut end = spec.end;
            if ui
                .add(DatePickerButton::new(&mut end).id_source("end_date"))
                .changed()
            {
                changes.push(FilterChange::End(end));
            }
            ui.add_space(8.0);

            if let Some(sel) = multiselect(
                ui,
                "Instructor",
                &choices.instructors,
                &spec.instructors,
                |s: &String| s.clone(),
            ) {
                changes.push(FilterChange::Instructors(sel));
            }
            if let Some(sel) = multiselect(
                ui,
                "Difficulty",
                &choices.difficulties,
                &spec.difficulties,
                |b: &DifficultyBucket| b.label().to_string(),
            ) {
                changes.push(FilterChange::Difficulties(sel));
            }
            if let Some(sel) = multiselect(
                ui,
                "Ride Time",
                &choices.ride_times,
                &spec.ride_times,
                |s: &String| s.clone(),
            ) {
                changes.push(FilterChange::RideTimes(sel));
            }
            ui.add_space(8.0);
            if ui.button("Reset Filters").clicked() {
                changes.push(FilterChange::Reset);
            }
        });
        self.apply_changes(changes);
    }

    fn summary_tab(&self, ui: &mut egui::Ui) {
        let view = self.dashboard.view();
        let (left, right) = summary_lines(&view.summary);
        ui.columns(2, |cols| {
            for line in left {
                cols[0].label(line);
            }
            for line in right {
                cols[1].label(line);
            }
        });
        ui.separator();

        ui.label("Most Difficult Ride by User Rating:");
        ui.push_id("hardest_table", |ui| {
            TableBuilder::new(ui)
                .striped(true)
                .vscroll(false)
                .column(Column::auto())
                .column(Column::auto())
                .column(Column::auto())
                .header(20.0, |mut header| {
                    for title in ["instructor", "title", "difficulty_rating"] {
                        header.col(|ui| {
                            ui.strong(title);
                        });
                    }
                })
                .body(|mut body| {
                    for r in &view.hardest {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.label(&r.instructor);
                            });
                            row.col(|ui| {
                                ui.label(&r.title);
                            });
                            row.col(|ui| {
                                ui.label(r.difficulty_rating.to_string());
                            });
                        });
                    }
                });
        });
        ui.add_space(8.0);

        ui.label("Best Leaderboard Performance (by Percentile Rank):");
        ui.push_id("best_table", |ui| {
            self.rides_table(ui, &view.best_leaderboard, false);
        });
    }

    fn charts_tab(&self, ui: &mut egui::Ui) {
        let view = self.dashboard.view();
        let height = self.settings.chart_height;
        ui.columns(2, |cols| {
            cols[0].label("Leaderboard Performance by Instructor");
            bar_plot(
                &mut cols[0],
                "leaderboard_by_instructor",
                &view.leaderboard_by_instructor,
                "leaderboard_pct",
                height,
            );
            cols[1].label("Total Ride Time by Instructor");
            bar_plot(
                &mut cols[1],
                "ride_time_by_instructor",
                &view.ride_time_by_instructor,
                "ride_time",
                height,
            );

            cols[0].label("Total Ride Time by Difficulty Rating");
            let labels: Vec<String> = view
                .ride_time_by_difficulty
                .iter()
                .map(|(b, _)| b.label().to_string())
                .collect();
            let chart = difficulty_bar_chart(&view.ride_time_by_difficulty, "ride_time");
            Plot::new("ride_time_by_difficulty")
                .height(height)
                .x_axis_formatter(move |mark, _, _| category_axis_label(&labels, mark.value))
                .show(&mut cols[0], |plot_ui| plot_ui.bar_chart(chart));

            cols[1].label("Average Difficulty Rating by Instructor");
            cols[1].push_id("difficulty_table", |ui| {
                self.difficulty_table(ui, &view.difficulty_by_instructor);
            });
        });
        ui.separator();

        ui.label("Average Leaderboard Ranking Percentile (monthly)");
        let lines = monthly_leaderboard_lines(&view.monthly_leaderboard);
        Plot::new("monthly_leaderboard")
            .height(height)
            .x_axis_formatter(|mark, _, _| format_month_mark(mark.value))
            .legend(Legend::default())
            .show(ui, |plot_ui| {
                for line in lines {
                    plot_ui.line(line);
                }
            });
    }

    fn difficulty_table(&self, ui: &mut egui::Ui, values: &[(String, f64)]) {
        let means: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
        let colors = gradient_colors(&means);
        TableBuilder::new(ui)
            .striped(!self.settings.show_gradient)
            .vscroll(false)
            .column(Column::auto())
            .column(Column::auto())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("instructor");
                });
                header.col(|ui| {
                    ui.strong("difficulty_rating");
                });
            })
            .body(|mut body| {
                for ((name, value), bg) in values.iter().zip(colors) {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            ui.label(name);
                        });
                        row.col(|ui| {
                            let text = format!("{value:.6}");
                            if self.settings.show_gradient {
                                ui.label(
                                    RichText::new(text)
                                        .background_color(bg)
                                        .color(text_color_for(bg)),
                                );
                            } else {
                                ui.label(text);
                            }
                        });
                    });
                }
            });
    }

    /// Table of full ride records, optionally marking the maximum of each
    /// column.
    fn rides_table(&self, ui: &mut egui::Ui, rows: &[WorkoutRecord], highlight: bool) {
        let max = &self.dashboard.view().column_maxima;
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .columns(Column::auto(), 9)
            .header(20.0, |mut header| {
                for title in [
                    "date",
                    "instructor",
                    "title",
                    "ride_time",
                    "difficulty_rating",
                    "leaderboard_rank",
                    "leaderboard_users",
                    "difficulty",
                    "leaderboard_pct",
                ] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|body| {
                body.rows(18.0, rows.len(), |mut row| {
                    let r = &rows[row.index()];
                    row.col(|ui| {
                        cell(ui, r.date.to_string(), highlight && max.date == Some(r.date))
                    });
                    row.col(|ui| {
                        cell(
                            ui,
                            r.instructor.clone(),
                            highlight && max.instructor.as_ref() == Some(&r.instructor),
                        )
                    });
                    row.col(|ui| {
                        cell(
                            ui,
                            r.title.clone(),
                            highlight && max.title.as_ref() == Some(&r.title),
                        )
                    });
                    row.col(|ui| {
                        cell(
                            ui,
                            r.ride_time.to_string(),
                            highlight && max.ride_time == Some(r.ride_time),
                        )
                    });
                    row.col(|ui| {
                        cell(
                            ui,
                            r.difficulty_rating.to_string(),
                            highlight && max.difficulty_rating == Some(r.difficulty_rating),
                        )
                    });
                    row.col(|ui| {
                        cell(
                            ui,
                            r.leaderboard_rank.to_string(),
                            highlight && max.leaderboard_rank == Some(r.leaderboard_rank),
                        )
                    });
                    row.col(|ui| {
                        cell(
                            ui,
                            r.leaderboard_users.to_string(),
                            highlight && max.leaderboard_users == Some(r.leaderboard_users),
                        )
                    });
                    row.col(|ui| {
                        cell(
                            ui,
                            r.difficulty.label().to_string(),
                            highlight && max.difficulty == Some(r.difficulty),
                        )
                    });
                    row.col(|ui| {
                        cell(
                            ui,
                            format!("{:.6}", r.leaderboard_pct),
                            highlight && max.leaderboard_pct == Some(r.leaderboard_pct),
                        )
                    });
                });
            });
    }

    fn raw_data_tab(&self, ui: &mut egui::Ui) {
        ui.label("All Filtered Data");
        ui.push_id("raw_table", |ui| {
            self.rides_table(ui, &self.dashboard.view().rows, self.settings.highlight_max);
        });
    }

    fn settings_window(&mut self, ctx: &egui::Context) {
        if !self.show_settings {
            return;
        }
        let mut open = self.show_settings;
        let mut logo_changed = false;
        egui::Window::new("Settings")
            .open(&mut open)
            .show(ctx, |ui| {
                egui::Grid::new("settings_grid").num_columns(2).show(ui, |ui| {
                    ui.label("Rider name");
                    if ui.text_edit_singleline(&mut self.settings.rider_name).changed() {
                        self.settings_dirty = true;
                    }
                    ui.end_row();

                    ui.label("Logo file");
                    ui.horizontal(|ui| {
                        ui.label(self.settings.logo_file.as_deref().unwrap_or("none"));
                        if ui.button("Browse").clicked() {
                            if let Some(path) = FileDialog::new()
                                .add_filter("Image", &["png", "jpg", "jpeg"])
                                .pick_file()
                            {
                                self.settings.logo_file = Some(path.display().to_string());
                                self.settings_dirty = true;
                                logo_changed = true;
                            }
                        }
                    });
                    ui.end_row();

                    ui.label("Default data file");
                    ui.horizontal(|ui| {
                        ui.label(self.settings.data_file.as_deref().unwrap_or("none"));
                        if ui.button("Browse").clicked() {
                            if let Some(path) = FileDialog::new()
                                .add_filter("Rides", &["csv", "json"])
                                .pick_file()
                            {
                                self.settings.data_file = Some(path.display().to_string());
                                self.settings_dirty = true;
                            }
                        }
                    });
                    ui.end_row();

                    ui.label("Chart height");
                    if ui
                        .add(egui::Slider::new(&mut self.settings.chart_height, 120.0..=600.0))
                        .changed()
                    {
                        self.settings_dirty = true;
                    }
                    ui.end_row();

                    if ui
                        .checkbox(&mut self.settings.highlight_max, "Highlight column maxima")
                        .changed()
                    {
                        self.settings_dirty = true;
                    }
                    if ui
                        .checkbox(&mut self.settings.show_gradient, "Difficulty gradient")
                        .changed()
                    {
                        self.settings_dirty = true;
                    }
                    ui.end_row();
                });
                ui.label("The data file takes effect on the next start.");
            });
        self.show_settings = open;
        if logo_changed {
            self.logo = None;
            self.logo_attempted = false;
        }
    }
}

fn bar_plot(ui: &mut egui::Ui, id: &str, values: &[(String, f64)], name: &str, height: f32) {
    let labels: Vec<String> = values.iter().map(|(l, _)| l.clone()).collect();
    let chart = category_bar_chart(values, name);
    Plot::new(id)
        .height(height)
        .x_axis_formatter(move |mark, _, _| category_axis_label(&labels, mark.value))
        .show(ui, |plot_ui| plot_ui.bar_chart(chart));
}

impl App for PelotonApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.menu_bar(ctx);
        self.header(ctx);
        self.filter_panel(ctx);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(status) = &self.status {
                    ui.label(status);
                    ui.separator();
                }
                ui.label(format!(
                    "Showing {} of {} rides",
                    self.dashboard.view().rows.len(),
                    self.dashboard.base().len()
                ));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                for tab in Tab::ALL {
                    ui.selectable_value(&mut self.tab, tab, tab.label());
                }
            });
            ui.separator();
            match self.tab {
                Tab::Summary => {
                    egui::ScrollArea::vertical().show(ui, |ui| self.summary_tab(ui));
                }
                Tab::Charts => {
                    egui::ScrollArea::vertical().show(ui, |ui| self.charts_tab(ui));
                }
                Tab::RawData => self.raw_data_tab(ui),
            }
        });

        self.settings_window(ctx);
        if self.settings_dirty {
            self.settings.save();
            self.settings_dirty = false;
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.save();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let settings = Settings::load();
    let cli_arg = std::env::args().nth(1);
    let path = resolve_data_path(cli_arg.as_deref(), settings.data_file.as_deref());

    let raw = load_rides(&path).map_err(|e| {
        log::error!("Failed to load {}: {e}", path.display());
        e
    })?;
    let table = transform(&raw).map_err(|e| {
        log::error!("Failed to prepare rides from {}: {e}", path.display());
        e
    })?;

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Peloton Statistics")
            .with_inner_size([settings.window_width, settings.window_height]),
        ..Default::default()
    };
    let app = PelotonApp::new(Arc::new(table), settings, &source);
    eframe::run_native(
        "Peloton Statistics",
        options,
        Box::new(|_cc| Box::new(app)),
    )?;
    Ok(())
}

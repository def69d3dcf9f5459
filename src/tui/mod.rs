//! Ratatui-based terminal dashboard over the parquet snapshot.
//!
//! Three tabs mirror the subcommands: Overview (world KPIs, trend, top
//! countries, movers), Balance (country balance sheet and rankings) and Chart
//! (chart builder). Each tab has a selector panel driven by the arrow keys.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

use crate::balance::{RANKINGS, balance_sheet, ranking};
use crate::domain::{Aggregation, SeriesBy};
use crate::error::AppError;
use crate::io::{export_records_csv, read_snapshot};
use crate::report::format::{fmt_qty, format_balance};
use crate::report::{
    ChartFilter, ChartSpec, DEFAULT_UNIT, Dataset, HEADLINE_ATTRIBUTES, Overview, OverviewSelection, Ranked,
    build_chart, default_index,
};

mod plotters_chart;

use plotters_chart::{PlotSeries, SeriesPlottersChart, bounds, palette_color};

const ALL: &str = "All";
const TOP_N_CHOICES: [&str; 4] = ["Off", "5", "10", "20"];
const EXPORT_FILE: &str = "psd_chart_export.csv";

/// Start the dashboard on the snapshot at `snapshot_path`.
pub fn run(snapshot_path: &Path) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(snapshot_path.to_path_buf());
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Overview,
    Balance,
    Chart,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Overview, Tab::Balance, Tab::Chart];

    fn title(self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Balance => "Balance Sheet",
            Tab::Chart => "Chart Builder",
        }
    }

    fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }
}

/// A labelled choice list cycled with ←/→.
#[derive(Debug, Clone, PartialEq)]
struct Selector {
    label: &'static str,
    options: Vec<String>,
    index: usize,
}

impl Selector {
    fn new(label: &'static str, options: Vec<String>, preferred: &str) -> Self {
        let index = default_index(&options, preferred);
        Self { label, options, index }
    }

    fn current(&self) -> &str {
        self.options.get(self.index).map(String::as_str).unwrap_or("")
    }

    fn step(&mut self, delta: i32) {
        if self.options.is_empty() {
            return;
        }
        let n = self.options.len() as i32;
        self.index = (self.index as i32 + delta).rem_euclid(n) as usize;
    }

    /// Swap the option list, keeping the current choice when it still exists.
    fn replace_options(&mut self, options: Vec<String>, fallback: &str) {
        let keep = self.current().to_string();
        self.index = options
            .iter()
            .position(|o| *o == keep)
            .unwrap_or_else(|| default_index(&options, fallback));
        self.options = options;
    }
}

// Selector positions per tab.
const OV_YEAR: usize = 0;
const OV_UNIT: usize = 1;
const OV_PRODUCT: usize = 2;
const OV_METRIC: usize = 3;
const OV_MOVER: usize = 4;

const BS_COUNTRY: usize = 0;
const BS_TYPE: usize = 1;
const BS_PRODUCT: usize = 2;
const BS_YEAR: usize = 3;

const CH_PRODUCT: usize = 0;
const CH_SERIES_BY: usize = 1;
const CH_AGG: usize = 2;
const CH_Y1: usize = 3;
const CH_TOP: usize = 4;

struct App {
    snapshot_path: PathBuf,
    dataset: Dataset,
    load_error: Option<String>,
    tab: Tab,
    overview: Vec<Selector>,
    balance: Vec<Selector>,
    chart: Vec<Selector>,
    selected_field: usize,
    status: String,
}

impl App {
    fn new(snapshot_path: PathBuf) -> Self {
        let mut app = Self {
            snapshot_path,
            dataset: Dataset::default(),
            load_error: None,
            tab: Tab::Overview,
            overview: Vec::new(),
            balance: Vec::new(),
            chart: Vec::new(),
            selected_field: 0,
            status: String::new(),
        };
        app.reload();
        app
    }

    /// Re-read the snapshot. Errors are shown in the UI rather than returned.
    fn reload(&mut self) {
        match read_snapshot(&self.snapshot_path) {
            Ok(records) => {
                self.dataset = Dataset::new(records);
                self.load_error = None;
                self.status = format!(
                    "Loaded {} rows from {}",
                    self.dataset.records().len(),
                    self.snapshot_path.display()
                );
            }
            Err(err) => {
                self.dataset = Dataset::default();
                self.load_error = Some(err.to_string());
                self.status = "No snapshot loaded.".to_string();
            }
        }
        self.build_selectors();
    }

    fn build_selectors(&mut self) {
        let ds = &self.dataset;
        let years: Vec<String> = ds.years().iter().map(i32::to_string).collect();
        let latest = years.last().cloned().unwrap_or_default();
        let mut products = vec![ALL.to_string()];
        products.extend(ds.commodities());
        let attributes = ds.attributes();
        let headline: Vec<String> = HEADLINE_ATTRIBUTES
            .iter()
            .filter(|a| attributes.iter().any(|p| p.as_str() == **a))
            .map(|a| a.to_string())
            .collect();

        self.overview = vec![
            Selector::new("Market year", years.clone(), &latest),
            Selector::new("Unit", ds.units(), DEFAULT_UNIT),
            Selector::new("Product", products.clone(), ALL),
            Selector::new("Top countries by", headline.clone(), "Exports"),
            Selector::new("Movers by", headline, "Production"),
        ];

        self.balance = vec![
            Selector::new("Country", ds.countries(), "Russia"),
            Selector::new("Product type", ds.product_types(), "Oil"),
            Selector::new("Product", Vec::new(), ""),
            Selector::new("Ranking year", years, &latest),
        ];
        self.sync_balance_products();

        self.chart = vec![
            Selector::new("Product", products, "Oil, Sunflowerseed"),
            Selector::new("Series by", vec!["Country".to_string(), "Attribute".to_string()], "Country"),
            Selector::new("Aggregation", vec!["Sum".to_string(), "Mean".to_string()], "Sum"),
            Selector::new("Y1", attributes, "Production"),
            Selector::new("Top N", TOP_N_CHOICES.iter().map(|s| s.to_string()).collect(), "10"),
        ];
        self.selected_field = 0;
    }

    fn sync_balance_products(&mut self) {
        let options = self.dataset.commodities_of_type(self.balance[BS_TYPE].current());
        self.balance[BS_PRODUCT].replace_options(options, "Oil, Sunflowerseed");
    }

    fn selectors(&self) -> &[Selector] {
        match self.tab {
            Tab::Overview => &self.overview,
            Tab::Balance => &self.balance,
            Tab::Chart => &self.chart,
        }
    }

    fn selectors_mut(&mut self) -> &mut Vec<Selector> {
        match self.tab {
            Tab::Overview => &mut self.overview,
            Tab::Balance => &mut self.balance,
            Tab::Chart => &mut self.chart,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => self.switch_tab(self.tab.next()),
            KeyCode::Char('1') => self.switch_tab(Tab::Overview),
            KeyCode::Char('2') => self.switch_tab(Tab::Balance),
            KeyCode::Char('3') => self.switch_tab(Tab::Chart),
            KeyCode::Up => {
                self.selected_field = self.selected_field.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.selected_field + 1 < self.selectors().len() {
                    self.selected_field += 1;
                }
            }
            KeyCode::Left => self.adjust_field(-1),
            KeyCode::Right => self.adjust_field(1),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('e') => self.export_chart_rows(),
            _ => {}
        }
        false
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.selected_field = 0;
    }

    fn adjust_field(&mut self, delta: i32) {
        let field = self.selected_field;
        let Some(selector) = self.selectors_mut().get_mut(field) else {
            return;
        };
        selector.step(delta);
        let status = format!("{}: {}", selector.label, selector.current());
        self.status = status;
        if self.tab == Tab::Balance && field == BS_TYPE {
            self.sync_balance_products();
        }
    }

    fn export_chart_rows(&mut self) {
        let Some(spec) = self.chart_spec() else {
            self.status = "Nothing to export.".to_string();
            return;
        };
        let rows = spec.filter.apply(self.dataset.records());
        let path = PathBuf::from(EXPORT_FILE);
        self.status = match export_records_csv(&path, &rows) {
            Ok(()) => format!("Exported {} rows to {}", rows.len(), path.display()),
            Err(err) => format!("Export failed: {err}"),
        };
    }

    fn overview_selection(&self) -> Option<OverviewSelection> {
        let mut sel = OverviewSelection::default_for(&self.dataset)?;
        sel.year = self.overview[OV_YEAR].current().parse().ok()?;
        sel.unit = self.overview[OV_UNIT].current().to_string();
        sel.product = match self.overview[OV_PRODUCT].current() {
            ALL => None,
            p => Some(p.to_string()),
        };
        Some(sel)
    }

    fn chart_spec(&self) -> Option<ChartSpec> {
        let mut filter = ChartFilter::default_for(&self.dataset)?;
        filter.products = match self.chart[CH_PRODUCT].current() {
            ALL => Vec::new(),
            p => vec![p.to_string()],
        };
        let y1 = self.chart[CH_Y1].current().to_string();
        filter.attributes = vec![y1.clone()];
        let top_n = self.chart[CH_TOP].current().parse::<usize>().ok();
        if top_n.is_some() {
            filter.countries.clear();
        }
        Some(ChartSpec {
            filter,
            series_by: if self.chart[CH_SERIES_BY].current() == "Attribute" {
                SeriesBy::Attribute
            } else {
                SeriesBy::Country
            },
            aggregation: if self.chart[CH_AGG].current() == "Mean" {
                Aggregation::Mean
            } else {
                Aggregation::Sum
            },
            y1,
            y2: None,
            top_n,
        })
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_tabs(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_tabs(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(t.title())).collect();
        let tabs = Tabs::new(titles)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled("psd", Style::default().fg(Color::Cyan))),
            )
            .select(self.tab.index())
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White));
        frame.render_widget(tabs, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        if let Some(err) = &self.load_error {
            let msg = Paragraph::new(err.as_str())
                .style(Style::default().fg(Color::Yellow))
                .wrap(Wrap { trim: true })
                .block(Block::default().title("Snapshot").borders(Borders::ALL));
            frame.render_widget(msg, area);
            return;
        }

        let selectors = self.selectors();
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(40), Constraint::Min(0)])
            .split(area);
        self.draw_selectors(frame, chunks[0], selectors);

        match self.tab {
            Tab::Overview => self.draw_overview(frame, chunks[1]),
            Tab::Balance => self.draw_balance(frame, chunks[1]),
            Tab::Chart => self.draw_chart(frame, chunks[1]),
        }
    }

    fn draw_selectors(&self, frame: &mut ratatui::Frame<'_>, area: Rect, selectors: &[Selector]) {
        let items: Vec<ListItem> = selectors
            .iter()
            .map(|s| ListItem::new(format!("{}: {}", s.label, s.current())))
            .collect();
        let list = List::new(items)
            .block(Block::default().title("Selection").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_overview(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(sel) = self.overview_selection() else {
            render_hint(frame, area, "World Snapshot", "No data in snapshot.");
            return;
        };
        let overview = Overview::build(
            self.dataset.records(),
            sel,
            self.overview[OV_METRIC].current(),
            self.overview[OV_MOVER].current(),
            10,
        );
        if overview.has_no_world_data() {
            render_hint(
                frame,
                area,
                "World Snapshot",
                "No World data for this selection. Try another unit/year/product.",
            );
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let series: Vec<PlotSeries> = overview
            .trend
            .iter()
            .enumerate()
            .map(|(i, (name, points))| PlotSeries {
                name: name.clone(),
                points: points.iter().map(|&(y, v)| (f64::from(y), v)).collect(),
                color_index: i,
            })
            .collect();
        self.draw_series_chart(frame, chunks[0], "World Trend", &series, &overview.selection.unit);

        let mut lines = vec![section("World Snapshot")];
        for (attribute, value) in &overview.kpis {
            lines.push(Line::from(format!("{attribute:<20} {:>12}", fmt_qty(*value))));
        }
        lines.push(Line::raw(""));
        lines.push(section(&format!("Top countries by {}", overview.top_metric)));
        lines.extend(ranked_lines(&overview.top));
        lines.push(Line::raw(""));
        lines.push(section(&format!("Big movers ({})", overview.mover_metric)));
        for m in &overview.movers {
            let color = if m.change >= 0.0 { Color::Green } else { Color::Red };
            lines.push(Line::from(vec![
                Span::raw(format!("{:<20} ", truncate(&m.country, 20))),
                Span::styled(format!("{:>12}", fmt_qty(m.change)), Style::default().fg(color)),
            ]));
        }
        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, chunks[1]);
    }

    fn draw_balance(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let country = self.balance[BS_COUNTRY].current();
        let product = self.balance[BS_PRODUCT].current();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let table = match balance_sheet(self.dataset.records(), country, product) {
            Some(sheet) => Paragraph::new(format_balance(&sheet)),
            None => Paragraph::new("No data found for this selection with UnitDescription containing '1000 MT'.")
                .style(Style::default().fg(Color::Yellow)),
        };
        frame.render_widget(
            table.block(Block::default().title("Balance Sheet").borders(Borders::ALL)),
            chunks[0],
        );

        let Ok(year) = self.balance[BS_YEAR].current().parse::<i32>() else {
            return;
        };
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 4); 4])
            .split(chunks[1]);
        for (i, (attribute, title)) in RANKINGS.iter().enumerate() {
            let top = ranking(self.dataset.records(), product, year, attribute, 10);
            let lines = if top.is_empty() {
                vec![Line::styled(format!("No data for {title}."), Style::default().fg(Color::Gray))]
            } else {
                ranked_lines(&top)
            };
            let p = Paragraph::new(Text::from(lines))
                .block(Block::default().title(format!("Top {title} {year}")).borders(Borders::ALL));
            frame.render_widget(p, cols[i]);
        }
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(spec) = self.chart_spec() else {
            render_hint(frame, area, "Chart Builder", "No data in snapshot.");
            return;
        };
        let chart = build_chart(self.dataset.records(), &spec);
        if chart.is_empty() {
            render_hint(
                frame,
                area,
                "Chart Builder",
                "No data for this selection. Broaden filters and ensure Y1 exists.",
            );
            return;
        }

        let series: Vec<PlotSeries> = chart
            .y1
            .iter()
            .enumerate()
            .map(|(i, s)| PlotSeries {
                name: chart.legend(s, &chart.y1_name),
                points: s.points.iter().map(|&(y, v)| (f64::from(y), v)).collect(),
                color_index: i,
            })
            .collect();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);
        self.draw_series_chart(frame, chunks[0], &chart.title, &series, &chart.y1_label);
        frame.render_widget(
            Paragraph::new(chart.caption.as_str()).style(Style::default().fg(Color::Gray)),
            chunks[1],
        );
    }

    fn draw_series_chart(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        title: &str,
        series: &[PlotSeries],
        y_label: &str,
    ) {
        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some((x_bounds, y_bounds)) = bounds(series) else {
            frame.render_widget(
                Paragraph::new("No series to plot.").style(Style::default().fg(Color::Yellow)),
                inner,
            );
            return;
        };

        let legend_height = (series.len() as u16).min(inner.height / 3);
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(legend_height)])
            .split(inner);

        let (chart_rect, insets) = chart_layout(parts[0]);
        let widget = SeriesPlottersChart {
            series,
            x_bounds,
            y_bounds,
            x_label: "market year",
            y_label,
            fmt_x: fmt_axis_year,
            fmt_y: fmt_qty,
        };
        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, parts[0], chart_rect, insets, x_bounds, y_bounds, y_label);
        }

        let legend: Vec<Line> = series
            .iter()
            .map(|s| {
                Line::from(vec![
                    Span::styled("── ", Style::default().fg(palette_color(s.color_index))),
                    Span::raw(s.name.clone()),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(Text::from(legend)), parts[1]);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "Tab/1-3 page  ↑/↓ select  ←/→ change  r reload  e export  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn render_hint(frame: &mut ratatui::Frame<'_>, area: Rect, title: &str, message: &str) {
    let p = Paragraph::new(message.to_string())
        .style(Style::default().fg(Color::Yellow))
        .wrap(Wrap { trim: true })
        .block(Block::default().title(title.to_string()).borders(Borders::ALL));
    frame.render_widget(p, area);
}

fn section(title: &str) -> Line<'static> {
    Line::styled(
        title.to_string(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn ranked_lines(rows: &[Ranked]) -> Vec<Line<'static>> {
    rows.iter()
        .map(|r| Line::from(format!("{:<20} {:>12}", truncate(&r.name, 20), fmt_qty(r.value))))
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

fn fmt_axis_year(v: f64) -> String {
    format!("{v:.0}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 10,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    y_label: &str,
) {
    let style = Style::default().fg(Color::Gray);

    // One tick per market year.
    let first = x_bounds[0].ceil() as i32;
    let last = x_bounds[1].floor() as i32;
    let span = (x_bounds[1] - x_bounds[0]).max(1e-9);
    for year in first..=last {
        let u = (f64::from(year) - x_bounds[0]) / span;
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = year.to_string();
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label.clone()).style(style),
            Rect {
                x: x.saturating_sub(label.len() as u16 / 2),
                y,
                width: label.len() as u16,
                height: 1,
            },
        );
    }

    let ticks = 5usize;
    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_qty(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("market year")
        .alignment(Alignment::Center)
        .style(style);
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: inner.width.min(y_label.len() as u16),
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(y_label.to_string()).style(style.add_modifier(Modifier::BOLD)),
        y_rect,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_wraps_and_keeps_choice_on_new_options() {
        let mut s = Selector::new(
            "Product",
            vec!["Meal, Sunflowerseed".to_string(), "Oil, Sunflowerseed".to_string()],
            "Oil, Sunflowerseed",
        );
        assert_eq!(s.current(), "Oil, Sunflowerseed");
        s.step(1);
        assert_eq!(s.current(), "Meal, Sunflowerseed");
        s.step(-1);
        assert_eq!(s.current(), "Oil, Sunflowerseed");

        s.replace_options(
            vec!["Oil, Soybean".to_string(), "Oil, Sunflowerseed".to_string()],
            "Oil, Soybean",
        );
        assert_eq!(s.current(), "Oil, Sunflowerseed");
        s.replace_options(vec!["Oil, Palm".to_string()], "Oil, Soybean");
        assert_eq!(s.current(), "Oil, Palm");

        let mut empty = Selector::new("Unit", Vec::new(), "(1000 MT)");
        empty.step(1);
        assert_eq!(empty.current(), "");
    }

    #[test]
    fn missing_snapshot_shows_actionable_message() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::new(dir.path().join("latest.parquet"));
        let err = app.load_error.unwrap();
        assert!(err.contains("psd refresh"));
        assert!(app.dataset.is_empty());
    }

    #[test]
    fn tabs_cycle() {
        assert_eq!(Tab::Overview.next(), Tab::Balance);
        assert_eq!(Tab::Chart.next(), Tab::Overview);
    }
}

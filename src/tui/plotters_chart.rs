//! Plotters-powered multi-series line chart widget for Ratatui.
//!
//! Plotters output is drawn into the Ratatui buffer through
//! `plotters-ratatui-backend`; axes come from Plotters, the legend is drawn by
//! the caller with the same palette.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// High-contrast colors, cycled by series index.
pub const PALETTE: [(u8, u8, u8); 8] = [
    (0, 255, 255),
    (255, 200, 0),
    (0, 255, 0),
    (255, 80, 80),
    (200, 120, 255),
    (255, 255, 255),
    (80, 160, 255),
    (255, 140, 200),
];

pub fn palette_color(index: usize) -> Color {
    let (r, g, b) = PALETTE[index % PALETTE.len()];
    Color::Rgb(r, g, b)
}

/// One line: (market year, value) points plus its palette slot.
#[derive(Debug, Clone)]
pub struct PlotSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
    pub color_index: usize,
}

/// Render-only chart description. Bounds are computed by the caller.
pub struct SeriesPlottersChart<'a> {
    pub series: &'a [PlotSeries],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

/// Bounds covering every point, with the y range padded and anchored at zero
/// for non-negative data. `None` when there is nothing to draw.
pub fn bounds(series: &[PlotSeries]) -> Option<([f64; 2], [f64; 2])> {
    let mut points = series.iter().flat_map(|s| s.points.iter().copied());
    let (x, y) = points.next()?;
    let (mut x0, mut x1, mut y0, mut y1) = (x, x, y, y);
    for (x, y) in points {
        x0 = x0.min(x);
        x1 = x1.max(x);
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    if x1 <= x0 {
        x0 -= 1.0;
        x1 += 1.0;
    }
    y0 = y0.min(0.0);
    let pad = ((y1 - y0).abs() * 0.05).max(1.0);
    Some(([x0, x1], [y0, y1 + pad]))
}

impl Widget for SeriesPlottersChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Mesh lines are too noisy at terminal resolution.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            for s in self.series {
                let (r, g, b) = PALETTE[s.color_index % PALETTE.len()];
                let color = RGBColor(r, g, b);
                chart.draw_series(LineSeries::new(s.points.iter().copied(), &color))?;
                // Circle radii are mis-scaled by the ratatui backend; pixels mark the years.
                chart.draw_series(s.points.iter().map(|&(x, y)| Pixel::new((x, y), color)))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}

//! Fixed chart renderer.
//!
//! A [`Figure`] binds a [`ChartSpec`] to the points it plots. It renders to a
//! standalone SVG document or to a text chart for the terminal.

use chrono::NaiveDate;
use comfy_table::{CellAlignment, Table, presets::NOTHING};
use insight_core::{ChartKind, ChartSpec, FinancialTable, InsightError, Result, format_number};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    text::Line,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Widget},
};
use std::fmt::Write as _;

const SVG_WIDTH: f64 = 640.0;
const SVG_HEIGHT: f64 = 360.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 48.0;
const STROKE: &str = "#1f77b4";
const FILL: &str = "#aec7e8";

/// Terminal chart size, in cells.
const TEXT_WIDTH: u16 = 72;
const TEXT_HEIGHT: u16 = 16;

/// A chart ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct Figure {
    spec: ChartSpec,
    points: Vec<(NaiveDate, f64)>,
}

impl Figure {
    /// Binds a spec to explicit points, sorted by date.
    ///
    /// # Errors
    /// Returns [`InsightError::Chart`] if there is nothing to plot.
    pub fn new(spec: ChartSpec, mut points: Vec<(NaiveDate, f64)>) -> Result<Self> {
        points.retain(|(_, v)| v.is_finite());
        if points.is_empty() {
            return Err(InsightError::Chart(format!(
                "no {} values to plot",
                spec.y.column()
            )));
        }
        points.sort_by_key(|(date, _)| *date);
        Ok(Self { spec, points })
    }

    /// Binds a spec to the metric it names in `table`.
    ///
    /// # Errors
    /// Returns [`InsightError::Chart`] if the metric has no values.
    pub fn from_table(spec: ChartSpec, table: &FinancialTable) -> Result<Self> {
        let points = table.series(spec.y)?;
        Self::new(spec, points)
    }

    /// The chart specification.
    #[must_use]
    pub const fn spec(&self) -> &ChartSpec {
        &self.spec
    }

    /// The plotted `(date, value)` points.
    #[must_use]
    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// Value range including zero, so bars and areas have a baseline.
    fn value_range(&self) -> (f64, f64) {
        let (lo, hi) = self
            .points
            .iter()
            .fold((0.0_f64, 0.0_f64), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));
        if (hi - lo).abs() < f64::EPSILON {
            (lo, lo + 1.0)
        } else {
            (lo, hi)
        }
    }

    /// Renders a standalone SVG document.
    #[must_use]
    pub fn to_svg(&self) -> String {
        let plot_w = SVG_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = SVG_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let (lo, hi) = self.value_range();
        let n = self.points.len();

        // Bars sit in slots, lines put points on slot centres.
        let slot = plot_w / n as f64;
        let x_at = |i: usize| MARGIN_LEFT + slot * (i as f64 + 0.5);
        let y_at = |v: f64| MARGIN_TOP + plot_h * (hi - v) / (hi - lo);
        let baseline = y_at(0.0);

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{SVG_WIDTH}" height="{SVG_HEIGHT}" viewBox="0 0 {SVG_WIDTH} {SVG_HEIGHT}" font-family="sans-serif" font-size="12">"#
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="24" text-anchor="middle" font-size="16">{}</text>"#,
            SVG_WIDTH / 2.0,
            escape_xml(&self.spec.title)
        );

        // Axes
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{}" stroke="#333"/>"##,
            MARGIN_TOP + plot_h
        );
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{baseline:.1}" x2="{}" y2="{baseline:.1}" stroke="#333"/>"##,
            MARGIN_LEFT + plot_w
        );
        for v in [lo, hi] {
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{:.1}" text-anchor="end">{}</text>"#,
                MARGIN_LEFT - 6.0,
                y_at(v) + 4.0,
                format_number(v)
            );
        }
        let _ = writeln!(
            svg,
            r#"<text x="16" y="{:.1}" transform="rotate(-90 16 {:.1})" text-anchor="middle">{}</text>"#,
            MARGIN_TOP + plot_h / 2.0,
            MARGIN_TOP + plot_h / 2.0,
            self.spec.y.column()
        );

        for (i, (date, _)) in self.points.iter().enumerate() {
            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{}" text-anchor="middle">{}</text>"#,
                x_at(i),
                SVG_HEIGHT - MARGIN_BOTTOM + 18.0,
                date.format("%Y-%m-%d")
            );
        }

        let coords: Vec<String> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, (_, v))| format!("{:.1},{:.1}", x_at(i), y_at(*v)))
            .collect();

        match self.spec.kind {
            ChartKind::Line => {
                let _ = writeln!(
                    svg,
                    r#"<polyline points="{}" fill="none" stroke="{STROKE}" stroke-width="2"/>"#,
                    coords.join(" ")
                );
            }
            ChartKind::Area => {
                let first = x_at(0);
                let last = x_at(n - 1);
                let _ = writeln!(
                    svg,
                    r#"<polygon points="{first:.1},{baseline:.1} {} {last:.1},{baseline:.1}" fill="{FILL}" stroke="{STROKE}" stroke-width="2"/>"#,
                    coords.join(" ")
                );
            }
            ChartKind::Bar => {
                let width = slot * 0.6;
                for (i, (_, v)) in self.points.iter().enumerate() {
                    let top = y_at(v.max(0.0));
                    let height = (y_at(*v) - baseline).abs();
                    let _ = writeln!(
                        svg,
                        r#"<rect x="{:.1}" y="{top:.1}" width="{width:.1}" height="{height:.1}" fill="{STROKE}"/>"#,
                        x_at(i) - width / 2.0
                    );
                }
            }
        }

        if self.spec.kind != ChartKind::Bar {
            for c in &coords {
                if let Some((x, y)) = c.split_once(',') {
                    let _ = writeln!(svg, r#"<circle cx="{x}" cy="{y}" r="3" fill="{STROKE}"/>"#);
                }
            }
        }

        svg.push_str("</svg>\n");
        svg
    }

    /// Renders the chart for the terminal, followed by the plotted values.
    ///
    /// Bars draw as bars; lines and areas both draw as a braille line.
    #[must_use]
    pub fn to_text(&self) -> String {
        let area = Rect::new(0, 0, TEXT_WIDTH, TEXT_HEIGHT);
        let data: Vec<(f64, f64)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i as f64, *v))
            .collect();
        let mut buf = Buffer::empty(area);
        self.chart_widget(&data).render(area, &mut buf);

        let mut out = String::new();
        for row in buf.content.chunks(usize::from(area.width)) {
            let line: String = row.iter().map(|cell| cell.symbol()).collect();
            let _ = writeln!(out, "{}", line.trim_end());
        }

        let mut values = Table::new();
        values
            .load_preset(NOTHING)
            .set_header(["date", self.spec.y.column()]);
        for (date, value) in &self.points {
            values.add_row([date.format("%Y-%m-%d").to_string(), format_number(*value)]);
        }
        for column in values.column_iter_mut() {
            column.set_padding((0, 2));
        }
        if let Some(column) = values.column_mut(1) {
            column.set_cell_alignment(CellAlignment::Right);
        }
        let _ = writeln!(out, "{}", values.trim_fmt());
        out
    }

    fn chart_widget<'a>(&'a self, data: &'a [(f64, f64)]) -> Chart<'a> {
        let (lo, hi) = self.value_range();
        let last = self.points.len().saturating_sub(1);
        let graph_type = match self.spec.kind {
            ChartKind::Bar => GraphType::Bar,
            ChartKind::Line | ChartKind::Area => GraphType::Line,
        };

        let dataset = Dataset::default()
            .name(self.spec.y.column())
            .marker(Marker::Braille)
            .graph_type(graph_type)
            .style(Style::default().fg(Color::Cyan))
            .data(data);

        let x_labels: Vec<Line<'_>> = self
            .points
            .iter()
            .enumerate()
            .filter(|(i, _)| *i == 0 || *i == last)
            .map(|(_, (date, _))| Line::from(date.format("%Y-%m-%d").to_string()))
            .collect();
        let y_labels = vec![
            Line::from(format_number(lo)),
            Line::from(format_number((lo + hi) / 2.0)),
            Line::from(format_number(hi)),
        ];

        Chart::new(vec![dataset])
            .block(
                Block::default()
                    .title(self.spec.title.as_str())
                    .borders(Borders::ALL),
            )
            .x_axis(
                Axis::default()
                    .bounds([0.0, (last as f64).max(1.0)])
                    .labels(x_labels),
            )
            .y_axis(Axis::default().bounds([lo, hi]).labels(y_labels))
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::{Metric, QuarterlyFinancial, Symbol};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    fn points() -> Vec<(NaiveDate, f64)> {
        vec![
            (date(9, 30), 30.0),
            (date(3, 31), 10.0),
            (date(6, 30), 20.0),
        ]
    }

    #[test]
    fn test_figure_sorts_points() {
        let figure = Figure::new(ChartSpec::revenue_line(), points()).unwrap();
        let dates: Vec<_> = figure.points().iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, vec![date(3, 31), date(6, 30), date(9, 30)]);
    }

    #[test]
    fn test_empty_figure_is_rejected() {
        let err = Figure::new(ChartSpec::revenue_line(), vec![(date(3, 31), f64::NAN)]).unwrap_err();
        assert!(matches!(err, InsightError::Chart(_)));
    }

    #[test]
    fn test_from_table_drops_missing_values() {
        let table = FinancialTable::new(
            Symbol::new("BBCA"),
            vec![
                QuarterlyFinancial::new(date(3, 31), Some(10.0), Some(4.0), None),
                QuarterlyFinancial::new(date(6, 30), None, Some(5.0), None),
            ],
        );
        let figure = Figure::from_table(ChartSpec::revenue_line(), &table).unwrap();
        assert_eq!(figure.points(), &[(date(3, 31), 10.0)]);

        let err = Figure::from_table(ChartSpec::new(ChartKind::Bar, Metric::Operating), &table)
            .unwrap_err();
        assert!(matches!(err, InsightError::Chart(_)));
    }

    #[test]
    fn test_svg_per_kind() {
        for (kind, element) in [
            (ChartKind::Line, "<polyline"),
            (ChartKind::Area, "<polygon"),
            (ChartKind::Bar, "<rect"),
        ] {
            let mut spec = ChartSpec::new(kind, Metric::Revenue);
            spec.title = "Revenue <BBCA>".to_string();
            let svg = Figure::new(spec, points()).unwrap().to_svg();

            assert!(svg.starts_with("<svg"));
            assert!(svg.trim_end().ends_with("</svg>"));
            assert!(svg.contains(element), "{kind:?} missing {element}");
            assert!(svg.contains("Revenue &lt;BBCA&gt;"));
            assert!(svg.contains("2023-06-30"));
        }
    }

    #[test]
    fn test_text_chart_draws_series_and_values() {
        let text = Figure::new(ChartSpec::revenue_line(), points())
            .unwrap()
            .to_text();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].contains("revenue per quarter"));
        assert!(text.chars().any(|c| ('\u{2801}'..='\u{28ff}').contains(&c)));
        assert!(lines.iter().all(|l| l.chars().count() <= usize::from(TEXT_WIDTH)));

        let values = &lines[usize::from(TEXT_HEIGHT)..];
        assert!(values[0].ends_with("revenue"));
        assert!(values[1].starts_with("2023-03-31"));
        assert!(values[1].ends_with("10"));
        assert!(values[3].ends_with("30"));
    }

    #[test]
    fn test_text_chart_per_kind() {
        let line = Figure::new(ChartSpec::revenue_line(), points()).unwrap().to_text();
        let bar = Figure::new(ChartSpec::new(ChartKind::Bar, Metric::Revenue), points())
            .unwrap()
            .to_text();
        assert_ne!(line, bar);
        assert_eq!(line.lines().count(), bar.lines().count());
    }
}

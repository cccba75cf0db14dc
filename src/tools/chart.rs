//! Price chart tool
//!
//! Renders a saved `Date,Open,Close` file as an SVG line chart.

use super::market::PriceRow;
use super::{ArgType, Tool, ToolBodyError, ToolParam};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 480.0;
const MARGIN: f64 = 60.0;
const CLOSE_COLOR: &str = "#d62728";
const OPEN_COLOR: &str = "#1f77b4";

/// Plots open and close prices from a CSV file
pub struct PlotPriceDataTool {
    output_dir: PathBuf,
}

impl PlotPriceDataTool {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Accept both paths returned by the fetch tool and bare file names
    async fn resolve(&self, filename: &str) -> PathBuf {
        let direct = PathBuf::from(filename);
        if tokio::fs::try_exists(&direct).await.unwrap_or(false) {
            direct
        } else {
            self.output_dir.join(filename)
        }
    }
}

fn read_rows(bytes: &[u8]) -> Result<Vec<PriceRow>, ToolBodyError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<PriceRow>, _>>()
        .map_err(|e| format!("file must have Date, Open and Close columns: {e}"))?;
    Ok(rows)
}

#[allow(clippy::cast_precision_loss)]
fn render_svg(title: &str, rows: &[PriceRow]) -> String {
    let values = rows
        .iter()
        .flat_map(|row| std::iter::once(row.close).chain(row.open));
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let span = if max > min { max - min } else { 1.0 };
    let plot_w = WIDTH - 2.0 * MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;
    let step = plot_w / (rows.len().saturating_sub(1).max(1)) as f64;

    let x = |i: usize| MARGIN + step * i as f64;
    let y = |v: f64| MARGIN + plot_h * (1.0 - (v - min) / span);

    let polyline = |points: Vec<(f64, f64)>, color: &str, dashed: bool| {
        let coords = points
            .iter()
            .map(|(px, py)| format!("{px:.1},{py:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let dash = if dashed { r#" stroke-dasharray="6 4""# } else { "" };
        format!(
            r#"<polyline fill="none" stroke="{color}" stroke-width="2"{dash} points="{coords}"/>"#
        )
    };

    let close_points = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (x(i), y(row.close)))
        .collect();
    let open_points: Vec<(f64, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row.open.map(|open| (x(i), y(open))))
        .collect();

    let first = rows.first().map(|r| r.date.to_string()).unwrap_or_default();
    let last = rows.last().map(|r| r.date.to_string()).unwrap_or_default();

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" font-size="18">{}</text>"#,
        WIDTH / 2.0,
        escape(title)
    );
    let _ = writeln!(
        svg,
        r##"<rect x="{MARGIN}" y="{MARGIN}" width="{plot_w}" height="{plot_h}" fill="none" stroke="#cccccc"/>"##
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end" font-size="12">{max:.2}</text>"#,
        MARGIN - 6.0,
        MARGIN + 4.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end" font-size="12">{min:.2}</text>"#,
        MARGIN - 6.0,
        HEIGHT - MARGIN + 4.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{MARGIN}" y="{}" font-size="12">{first}</text>"#,
        HEIGHT - MARGIN + 20.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end" font-size="12">{last}</text>"#,
        WIDTH - MARGIN,
        HEIGHT - MARGIN + 20.0
    );
    let _ = writeln!(svg, "{}", polyline(close_points, CLOSE_COLOR, false));
    if open_points.len() > 1 {
        let _ = writeln!(svg, "{}", polyline(open_points, OPEN_COLOR, true));
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="12" fill="{OPEN_COLOR}">Open</text>"#,
            WIDTH - MARGIN - 100.0,
            MARGIN - 10.0
        );
    }
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-size="12" fill="{CLOSE_COLOR}">Close</text>"#,
        WIDTH - MARGIN - 50.0,
        MARGIN - 10.0
    );
    svg.push_str("</svg>\n");
    svg
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl Tool for PlotPriceDataTool {
    fn name(&self) -> &str {
        "plot_price_data"
    }

    fn description(&self) -> String {
        "Plot open and close prices from a CSV file produced by fetch_price_data and save \
         the chart as an SVG image."
            .to_string()
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::required(
            "filename",
            ArgType::String,
            "CSV file with Date, Open and Close columns",
        )]
    }

    async fn run(&self, arguments: Map<String, Value>) -> Result<String, ToolBodyError> {
        let filename = arguments
            .get("filename")
            .and_then(Value::as_str)
            .ok_or("filename is required")?;
        let source = self.resolve(filename).await;

        let bytes = tokio::fs::read(&source)
            .await
            .map_err(|e| format!("cannot read {}: {e}", source.display()))?;
        let rows = read_rows(&bytes)?;
        if rows.len() < 2 {
            return Err(format!("{} needs at least two rows to plot", source.display()).into());
        }

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("prices");
        let title = format!("{stem}: open vs close");
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let target = self.output_dir.join(format!("{stem}_plot.svg"));
        tokio::fs::write(&target, render_svg(&title, &rows)).await?;

        tracing::info!(rows = rows.len(), path = %target.display(), "Rendered price chart");

        Ok(format!(
            "Chart generated and saved successfully as '{}'.",
            target.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::market::write_csv;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_rows() -> Vec<PriceRow> {
        (1..=3)
            .map(|day| PriceRow {
                date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                open: Some(100.0 + f64::from(day)),
                close: 105.0 + f64::from(day),
            })
            .collect()
    }

    fn filename_args(name: &str) -> Map<String, Value> {
        json!({ "filename": name }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_renders_svg_next_to_output_dir() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("btc-usd_open_close.csv");
        std::fs::write(&csv_path, write_csv(&sample_rows()).unwrap()).unwrap();

        let tool = PlotPriceDataTool::new(dir.path());
        let message = tool
            .run(filename_args(csv_path.to_str().unwrap()))
            .await
            .unwrap();

        let svg_path = dir.path().join("btc-usd_open_close_plot.svg");
        assert!(message.contains("saved successfully"));
        assert!(message.contains("btc-usd_open_close_plot.svg"));
        let svg = std::fs::read_to_string(svg_path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains("2024-01-01"));
        assert!(svg.contains("2024-01-03"));
    }

    #[tokio::test]
    async fn test_bare_filename_resolves_in_output_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("prices.csv"),
            write_csv(&sample_rows()).unwrap(),
        )
        .unwrap();

        let tool = PlotPriceDataTool::new(dir.path());
        tool.run(filename_args("prices.csv")).await.unwrap();
        assert!(dir.path().join("prices_plot.svg").exists());
    }

    #[tokio::test]
    async fn test_missing_columns_fail() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.csv"), "Date,Price\n2024-01-01,1\n").unwrap();

        let tool = PlotPriceDataTool::new(dir.path());
        let err = tool.run(filename_args("bad.csv")).await.unwrap_err();
        assert!(err.to_string().contains("columns"), "{err}");
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let tool = PlotPriceDataTool::new(dir.path());
        let err = tool.run(filename_args("absent.csv")).await.unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_single_line_when_open_missing() {
        let rows: Vec<PriceRow> = sample_rows()
            .into_iter()
            .map(|row| PriceRow { open: None, ..row })
            .collect();
        let svg = render_svg("t", &rows);
        assert_eq!(svg.matches("<polyline").count(), 1);
    }
}

//! Daily price history tool
//!
//! Downloads daily open/close prices from a Yahoo-style chart endpoint and
//! saves them as a `Date,Open,Close` CSV file.

use super::{ArgType, Tool, ToolBodyError, ToolParam};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SYMBOL: &str = "BTC-USD";
const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One row of the saved price file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "Close")]
    pub close: f64,
}

/// Fetches price history between two dates into a CSV file
pub struct FetchPriceDataTool {
    client: Client,
    base_url: String,
    output_dir: PathBuf,
}

impl FetchPriceDataTool {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("colloquy/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: output_dir.into(),
        }
    }

    /// Point the tool at a different chart endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn download(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRow>, ToolBodyError> {
        let url = format!("{}/v8/finance/chart/{symbol}", self.base_url);
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = end.and_time(NaiveTime::MIN).and_utc().timestamp();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("price service returned HTTP {status} for {symbol}").into());
        }

        let body: ChartResponse = response.json().await?;
        if let Some(error) = body.chart.error {
            return Err(format!("price service error for {symbol}: {}", error.description).into());
        }

        let result = body
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| format!("no price data for {symbol}"))?;

        Ok(rows_from_chart(result))
    }
}

fn rows_from_chart(result: ChartResult) -> Vec<PriceRow> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            // Days without a close (market gaps) are skipped
            let close = quote.close.get(i).copied().flatten()?;
            let open = quote.open.get(i).copied().flatten();
            Some(PriceRow { date, open, close })
        })
        .collect()
}

fn parse_date(arguments: &Map<String, Value>, key: &str) -> Result<NaiveDate, ToolBodyError> {
    let raw = arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{key} is required"))?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| format!("{key} must be YYYY-MM-DD, got '{raw}': {e}").into())
}

/// Serialize rows to CSV bytes
pub fn write_csv(rows: &[PriceRow]) -> Result<Vec<u8>, ToolBodyError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| e.to_string().into())
}

#[async_trait]
impl Tool for FetchPriceDataTool {
    fn name(&self) -> &str {
        "fetch_price_data"
    }

    fn description(&self) -> String {
        "Fetch daily price data (open and close) for a symbol between two dates and save it \
         to a CSV file. Returns the path of the saved file."
            .to_string()
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::required("start_date", ArgType::String, "First day to fetch (YYYY-MM-DD)"),
            ToolParam::required(
                "end_date",
                ArgType::String,
                "Day after the last one to fetch (YYYY-MM-DD)",
            ),
            ToolParam::optional("symbol", ArgType::String, "Ticker symbol, defaults to BTC-USD"),
        ]
    }

    async fn run(&self, arguments: Map<String, Value>) -> Result<String, ToolBodyError> {
        let start = parse_date(&arguments, "start_date")?;
        let end = parse_date(&arguments, "end_date")?;
        if end <= start {
            return Err(format!("end_date {end} must be after start_date {start}").into());
        }
        let symbol = arguments
            .get("symbol")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SYMBOL);

        let rows = self.download(symbol, start, end).await?;
        if rows.is_empty() {
            return Err(format!("no prices for {symbol} between {start} and {end}").into());
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("{}_open_close.csv", symbol.to_lowercase()));
        tokio::fs::write(&path, write_csv(&rows)?).await?;

        tracing::info!(
            symbol = %symbol,
            rows = rows.len(),
            path = %path.display(),
            "Saved price data"
        );

        Ok(path.display().to_string())
    }
}

// Chart API response types

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

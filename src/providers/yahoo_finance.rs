use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::error::{ReportError, Result};
use crate::core::price::{PriceBar, PriceProvider, PriceQuote};
use crate::core::series::{self, DateRange};
use crate::providers::util::HttpClient;

const PROVIDER: &str = "yahoo";

// YahooFinanceProvider implementation for PriceProvider
pub struct YahooFinanceProvider {
    base_url: String,
    http: HttpClient,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, http: HttpClient) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn fetch_chart(&self, symbol: &str, query: &str) -> Result<PriceChartItem> {
        let url = format!("{}/v8/finance/chart/{}?{}", self.base_url, symbol, query);
        let body = self.http.get_text(PROVIDER, &url).await?;

        let data: YahooPriceResponse = serde_json::from_str(&body).map_err(|e| {
            let message = format!("Failed to parse JSON response for {symbol}: {e}");
            ReportError::remote(PROVIDER, message)
        })?;
        data.chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| {
                ReportError::remote(PROVIDER, format!("No price data found for symbol: {symbol}"))
            })
    }
}

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug, Default)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: PriceChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    #[serde(alias = "previousClose")]
    previous_close: Option<f64>,
    currency: Option<String>,
    #[serde(alias = "gmtoffset", default)]
    gmt_offset: i64,
}

fn value_at(values: &Option<Vec<Option<f64>>>, index: usize) -> Option<f64> {
    values.as_ref().and_then(|v| v.get(index).copied().flatten())
}

impl PriceChartItem {
    fn quote(&self) -> Option<&Quote> {
        self.indicators.as_ref().and_then(|i| i.quote.first())
    }

    /// Daily bars in exchange-local dates, one per day (the last one seen),
    /// skipping entries without a close.
    fn bars(&self) -> Vec<PriceBar> {
        let (Some(timestamps), Some(quote)) = (self.timestamp.as_ref(), self.quote()) else {
            return Vec::new();
        };

        let bars: Vec<PriceBar> = timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let close = value_at(&quote.close, i)?;
                let date = self.exchange_date(*ts)?;
                Some(PriceBar {
                    date,
                    open: value_at(&quote.open, i).unwrap_or(close),
                    high: value_at(&quote.high, i).unwrap_or(close),
                    low: value_at(&quote.low, i).unwrap_or(close),
                    close,
                    volume: quote
                        .volume
                        .as_ref()
                        .and_then(|v| v.get(i).copied().flatten())
                        .unwrap_or(0),
                })
            })
            .collect();
        series::merge_series(Vec::new(), bars)
    }

    fn exchange_date(&self, timestamp: i64) -> Option<NaiveDate> {
        DateTime::from_timestamp(timestamp + self.meta.gmt_offset, 0).map(|dt| dt.date_naive())
    }

    /// Close of the last bar dated before the exchange's current day, so a
    /// session still trading at `now` never counts.
    fn previous_close(&self, now: i64) -> Option<f64> {
        let today = self.exchange_date(now)?;
        self.bars()
            .iter()
            .rev()
            .find(|bar| bar.date < today)
            .map(|bar| bar.close)
            .or(self.meta.previous_close)
    }
}

fn day_start_timestamp(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooPriceFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote> {
        let item = self.fetch_chart(symbol, "interval=1d&range=5d").await?;

        let price = item
            .previous_close(Utc::now().timestamp())
            .ok_or_else(|| {
                ReportError::remote(PROVIDER, format!("No close price for symbol: {symbol}"))
            })?;
        let currency = item
            .meta
            .currency
            .clone()
            .ok_or_else(|| {
                ReportError::remote(PROVIDER, format!("No currency for symbol: {symbol}"))
            })?;
        debug!(price, %currency, "Received Yahoo quote");

        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price,
            currency: currency.to_uppercase(),
        })
    }

    #[instrument(
        name = "YahooHistoryFetch",
        skip(self),
        fields(symbol = %symbol, range = %range)
    )]
    async fn fetch_history(&self, symbol: &str, range: DateRange) -> Result<Vec<PriceBar>> {
        // period2 is exclusive
        let query = format!(
            "interval=1d&period1={}&period2={}",
            day_start_timestamp(range.start),
            day_start_timestamp(range.end + Duration::days(1))
        );
        let item = self.fetch_chart(symbol, &query).await?;
        let bars = series::slice_range(&item.bars(), range);
        debug!(bars = bars.len(), "Received Yahoo history");
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::HttpConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub async fn create_mock_server(symbol: &str, mock_response: &str) -> wiremock::MockServer {
        let mock_server = wiremock::MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(server: &MockServer) -> YahooFinanceProvider {
        let http = HttpClient::new(&HttpConfig {
            timeout_secs: 5,
            retries: 0,
            retry_delay_ms: 1,
        })
        .unwrap();
        YahooFinanceProvider::new(&server.uri(), http)
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "previousClose": 150.65,
                        "currency": "USD"
                    },
                    "timestamp": [1672756200, 1672842600],
                    "indicators": {"quote": [{"close": [149.0, null]}]}
                }]
            }
        }"#;

        let mock_server = create_mock_server("AAPL", mock_response).await;
        let quote = provider(&mock_server).fetch_quote("AAPL").await.unwrap();
        // The last completed bar wins over the reported previous close
        assert_eq!(quote.price, 149.0);
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_quote_falls_back_to_previous_close() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {"previousClose": 26.4, "currency": "CAD"}
                }]
            }
        }"#;
        let mock_server = create_mock_server("XEQT.TO", mock_response).await;
        let quote = provider(&mock_server).fetch_quote("XEQT.TO").await.unwrap();
        assert_eq!(quote.price, 26.4);
        assert_eq!(quote.currency, "CAD");
    }

    #[tokio::test]
    async fn test_no_price_result_data() {
        let mock_response = r#"{"chart": {"result": []}}"#;
        let mock_server = create_mock_server("INVALID", mock_response).await;

        let result = provider(&mock_server).fetch_quote("INVALID").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "fetch error (yahoo): No price data found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_history_fetch() {
        // 2023-01-03 and 2023-01-04 14:30 UTC, Toronto offset -5h
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {"previousClose": 20.0, "currency": "CAD", "gmtoffset": -18000},
                    "timestamp": [1672756200, 1672842600, 1672929000],
                    "indicators": {"quote": [{
                        "open": [19.5, 20.1, 20.0],
                        "high": [20.0, 20.5, 20.2],
                        "low": [19.4, 19.9, 19.8],
                        "close": [19.9, 20.4, null],
                        "volume": [1000, 2000, null]
                    }]}
                }]
            }
        }"#;
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/XEQT.TO"))
            .and(query_param("interval", "1d"))
            .and(query_param("period1", "1672704000"))
            .and(query_param("period2", "1672963200"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let bars = provider(&mock_server)
            .fetch_history("XEQT.TO", DateRange::new(d("2023-01-03"), d("2023-01-05")))
            .await
            .unwrap();
        assert_eq!(
            bars,
            vec![
                PriceBar {
                    date: d("2023-01-03"),
                    open: 19.5,
                    high: 20.0,
                    low: 19.4,
                    close: 19.9,
                    volume: 1000
                },
                PriceBar {
                    date: d("2023-01-04"),
                    open: 20.1,
                    high: 20.5,
                    low: 19.9,
                    close: 20.4,
                    volume: 2000
                },
            ]
        );
    }

    #[test]
    fn test_previous_close_skips_the_session_in_progress() {
        // Bars for 2023-01-03 and 2023-01-04, Toronto time
        let item: PriceChartItem = serde_json::from_str(
            r#"{
                "meta": {"previousClose": 18.0, "currency": "CAD", "gmtoffset": -18000},
                "timestamp": [1672756200, 1672842600],
                "indicators": {"quote": [{"close": [19.9, 20.4]}]}
            }"#,
        )
        .unwrap();

        // 2023-01-04 15:00 UTC, the 2023-01-04 session is still open
        assert_eq!(item.previous_close(1672844400), Some(19.9));
        // 2023-01-05 15:00 UTC
        assert_eq!(item.previous_close(1672930800), Some(20.4));
        // 2023-01-03 15:00 UTC, no completed bar in the window
        assert_eq!(item.previous_close(1672758000), Some(18.0));
    }

    #[tokio::test]
    async fn test_yahoo_api_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server).fetch_quote("AAPL").await;
        assert!(matches!(result, Err(ReportError::RemoteFetch { .. })));
    }

    #[tokio::test]
    async fn test_yahoo_api_malformed_response() {
        let mock_response = r#"{"charts": {}}"#;
        let mock_server = create_mock_server("AAPL", mock_response).await;

        let result = provider(&mock_server).fetch_quote("AAPL").await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for AAPL")
        );
    }
}

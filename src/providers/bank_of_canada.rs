use crate::core::currency::{CurrencyRateProvider, RateObservation};
use crate::core::error::{ReportError, Result};
use crate::core::series::DateRange;
use crate::providers::util::HttpClient;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

const PROVIDER: &str = "bank_of_canada";
const SERIES: &str = "FXUSDCAD";

/// Daily USD→CAD rates from the Bank of Canada Valet API.
pub struct BankOfCanadaProvider {
    base_url: String,
    http: HttpClient,
}

impl BankOfCanadaProvider {
    pub fn new(base_url: &str, http: HttpClient) -> Self {
        BankOfCanadaProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValetResponse {
    observations: Vec<ValetObservation>,
}

#[derive(Debug, Deserialize)]
struct ValetObservation {
    d: NaiveDate,
    #[serde(rename = "FXUSDCAD")]
    rate: Option<ValetValue>,
}

#[derive(Debug, Deserialize)]
struct ValetValue {
    v: String,
}

fn parse_observations(body: &str) -> Result<Vec<RateObservation>> {
    let response: ValetResponse = serde_json::from_str(body)
        .map_err(|e| ReportError::remote(PROVIDER, format!("Failed to parse JSON response: {e}")))?;

    let mut rates = Vec::with_capacity(response.observations.len());
    for obs in response.observations {
        // Days the series was not published come back without a value
        let Some(value) = obs.rate else {
            continue;
        };
        let rate = value.v.trim().parse::<f64>().map_err(|e| {
            ReportError::remote(PROVIDER, format!("Invalid rate {:?} on {}: {e}", value.v, obs.d))
        })?;
        rates.push(RateObservation { date: obs.d, rate });
    }
    rates.sort_by_key(|obs| obs.date);
    Ok(rates)
}

#[async_trait]
impl CurrencyRateProvider for BankOfCanadaProvider {
    #[instrument(name = "BankOfCanadaRates", skip(self), fields(range = %range))]
    async fn get_rates(&self, range: DateRange) -> Result<Vec<RateObservation>> {
        let url = format!(
            "{}/valet/observations/{SERIES}/json?start_date={}&end_date={}",
            self.base_url, range.start, range.end
        );
        let body = self.http.get_text(PROVIDER, &url).await?;
        let rates = parse_observations(&body)?;
        debug!(observations = rates.len(), "Received Valet observations");
        Ok(rates)
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

    fn provider(server: &MockServer) -> BankOfCanadaProvider {
        let http = HttpClient::new(&HttpConfig {
            timeout_secs: 5,
            retries: 0,
            retry_delay_ms: 1,
        })
        .unwrap();
        BankOfCanadaProvider::new(&server.uri(), http)
    }

    const BODY: &str = r#"{
        "terms": {"url": "https://www.bankofcanada.ca/terms/"},
        "seriesDetail": {"FXUSDCAD": {"label": "USD/CAD"}},
        "observations": [
            {"d": "2023-01-04", "FXUSDCAD": {"v": "1.3491"}},
            {"d": "2023-01-03", "FXUSDCAD": {"v": "1.3618"}},
            {"d": "2023-01-05"}
        ]
    }"#;

    #[tokio::test]
    async fn test_fetch_rates_for_range() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/valet/observations/FXUSDCAD/json"))
            .and(query_param("start_date", "2023-01-02"))
            .and(query_param("end_date", "2023-01-05"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .mount(&mock_server)
            .await;

        let rates = provider(&mock_server)
            .get_rates(DateRange::new(d("2023-01-02"), d("2023-01-05")))
            .await
            .unwrap();
        assert_eq!(
            rates,
            vec![
                RateObservation {
                    date: d("2023-01-03"),
                    rate: 1.3618
                },
                RateObservation {
                    date: d("2023-01-04"),
                    rate: 1.3491
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_get_rate_on_weekend() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/valet/observations/FXUSDCAD/json"))
            .and(query_param("end_date", "2023-01-06"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .mount(&mock_server)
            .await;

        // Sunday resolves to Friday's window; the last value on or before it wins
        let rate = provider(&mock_server).get_rate(d("2023-01-08")).await.unwrap();
        assert_eq!(rate, 1.3491);
    }

    #[tokio::test]
    async fn test_upstream_error_is_remote_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server)
            .get_rates(DateRange::single(d("2023-01-03")))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::RemoteFetch { provider, .. } if provider == PROVIDER));
    }

    #[test]
    fn test_malformed_body() {
        let err = parse_observations(r#"{"observation": []}"#).unwrap_err();
        assert!(err.to_string().contains("Failed to parse JSON response"));

        let body = r#"{"observations": [{"d": "2023-01-03", "FXUSDCAD": {"v": "x"}}]}"#;
        let err = parse_observations(body).unwrap_err();
        assert!(err.to_string().contains("Invalid rate"));
    }
}

//! This client fetches the scone calendar of a month from the bakery's website.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::error::Category;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, SconeError},
    retry::RetryPolicy,
    time_window::QueryWindow,
};

pub static BASE_URL: &str = "http://www.arizmendi-sanrafael.com";
pub static ENDPOINT: &str = "/api/open/GetItemsByMonth";
pub static COLLECTION_ID: &str = "55c92c3fe4b0837bc6c0a67b";
pub static TIMEOUT: Duration = Duration::from_secs(5);

/// One calendar entry as it is delivered by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    /// Epoch milliseconds.
    pub start_date: i64,
    /// Epoch milliseconds, some archived entries have none.
    #[serde(default)]
    pub end_date: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub full_url: String,
}

#[derive(Debug, Clone)]
pub struct SconeClient {
    client: Client,
    base_url: String,
    collection_id: String,
    retry_policy: RetryPolicy,
}

impl SconeClient {
    pub fn new(
        base_url: impl Into<String>,
        collection_id: impl Into<String>,
        timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SconeError::Config(format!("cannot build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url,
            collection_id: collection_id.into(),
            retry_policy,
        })
    }

    /// A client for the public bakery website.
    pub fn official() -> Result<Self> {
        Self::new(BASE_URL, COLLECTION_ID, TIMEOUT, RetryPolicy::default())
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), ENDPOINT)
    }

    /// Get all calendar entries of a month.
    pub async fn fetch_month(&self, window: QueryWindow) -> Result<Vec<RawRecord>> {
        let month = window.to_query();
        info!(%month, "fetching scone calendar");
        let (url, body) = self.get_body(&month).await?;
        let records = parse(&url, body)?;
        debug!(%month, records = records.len(), "parsed scone calendar");
        Ok(records)
    }

    /// Get the body of a successful response from the official server, retrying transient failures.
    async fn get_body(&self, month: &str) -> Result<(String, String)> {
        let url = self.url();
        let max_attempts = self.retry_policy.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .client
                .get(&url)
                .query(&[("month", month), ("collectionId", self.collection_id.as_str())])
                .send()
                .await;
            let result = match result {
                Ok(response) if response.status().is_success() => {
                    let response_url = response.url().to_string();
                    response.text().await.map(|body| (response_url, body))
                }
                Ok(response) => {
                    let status = response.status();
                    if attempt < max_attempts && self.retry_policy.should_retry_status(status) {
                        warn!(%url, %status, attempt, "retrying request");
                        self.retry_policy.wait(attempt).await;
                        continue;
                    }
                    return Err(SconeError::Status {
                        url,
                        status,
                        attempts: attempt,
                    });
                }
                Err(err) => Err(err),
            };
            match result {
                Ok(body) => return Ok(body),
                Err(err) => {
                    if attempt < max_attempts && self.retry_policy.should_retry_error(&err) {
                        warn!(%url, error = %err, attempt, "retrying request");
                        self.retry_policy.wait(attempt).await;
                        continue;
                    }
                    return Err(SconeError::Http {
                        url,
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}

/// Parse the JSON list of calendar entries.
///
/// Valid JSON of the wrong shape is told apart from a body which isn't JSON at all.
fn parse(url: &str, body: String) -> Result<Vec<RawRecord>> {
    serde_json::from_str(&body).map_err(|source| match source.classify() {
        Category::Data => SconeError::Schema {
            url: url.to_string(),
            source,
        },
        _ => SconeError::NonJson {
            url: url.to_string(),
            body,
            source,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::{
        error::SconeError,
        retry::RetryPolicy,
        scone_client::{parse, RawRecord, SconeClient, COLLECTION_ID, ENDPOINT},
        time_window::QueryWindow,
    };

    fn fast_retry_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_factor: Duration::from_millis(5),
            ..RetryPolicy::default()
        }
    }

    fn client(server: &MockServer, max_retries: u32) -> SconeClient {
        SconeClient::new(
            server.uri(),
            COLLECTION_ID,
            Duration::from_secs(5),
            fast_retry_policy(max_retries),
        )
        .unwrap()
    }

    fn december() -> QueryWindow {
        QueryWindow::new(2019, 12).unwrap()
    }

    /// Test whether the JSON is parsed correctly.
    ///
    /// This test is offline.
    #[test]
    fn test_parse() {
        let json = include_str!("scone_client/tests/response.json");
        let parsed = parse("http://localhost", json.to_string()).unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(
            parsed[0],
            RawRecord {
                start_date: 1575388800000,
                end_date: Some(1575403200000),
                title: "Raspberry".to_string(),
                full_url: "/scone-calendar/2019/12/3/raspberry".to_string(),
            }
        );
        assert_eq!(parsed[1].title, "  Raspberry Chocolate ");
        assert_eq!(parsed[3].title, "Strawberry &amp; Cream");
    }

    #[test]
    fn test_parse_non_json() {
        let body = "<html>maintenance</html>".to_string();
        let err = parse("http://localhost", body).unwrap_err();
        match err {
            SconeError::NonJson { body, .. } => assert_eq!(body, "<html>maintenance</html>"),
            other => panic!("expected non JSON error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_wrong_shape() {
        let body = r#"[{"title": null, "startDate": 1575388800000}]"#.to_string();
        let err = parse("http://localhost", body).unwrap_err();
        assert!(matches!(err, SconeError::Schema { .. }));
    }

    #[test]
    fn test_parse_without_end_date() {
        let body = r#"[{"title": "Raspberry", "startDate": 1575388800000}]"#.to_string();
        let parsed = parse("http://localhost", body).unwrap();
        assert_eq!(parsed[0].end_date, None);
        assert_eq!(parsed[0].full_url, "");
    }

    #[tokio::test]
    async fn test_fetch_month_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ENDPOINT))
            .and(query_param("month", "12-2019"))
            .and(query_param("collectionId", COLLECTION_ID))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("scone_client/tests/response.json")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let records = client(&server, 0).fetch_month(december()).await.unwrap();
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_month_retries_transient_statuses() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                match attempts_clone.fetch_add(1, Ordering::SeqCst) {
                    0 => ResponseTemplate::new(503),
                    1 => ResponseTemplate::new(429),
                    _ => ResponseTemplate::new(200).set_body_string("[]"),
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let records = client(&server, 7).fetch_month(december()).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_month_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, 2).fetch_month(december()).await.unwrap_err();
        match err {
            SconeError::Status {
                status, attempts, ..
            } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_month_counts_attempts_of_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let client = SconeClient::new(
            server.uri(),
            COLLECTION_ID,
            Duration::from_millis(100),
            fast_retry_policy(1),
        )
        .unwrap();

        let err = client.fetch_month(december()).await.unwrap_err();
        match err {
            SconeError::Http { attempts, source, .. } => {
                assert_eq!(attempts, 2);
                assert!(source.is_timeout());
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_month_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, 7).fetch_month(december()).await.unwrap_err();
        assert!(matches!(err, SconeError::Status { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_fetch_month_does_not_retry_non_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Squarespace is down"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, 7).fetch_month(december()).await.unwrap_err();
        match err {
            SconeError::NonJson { body, .. } => assert_eq!(body, "Squarespace is down"),
            other => panic!("expected non JSON error, got {other:?}"),
        }
    }

    /// Test whether the official API is reachable and returns something.
    ///
    /// This is an online test!
    #[tokio::test]
    #[ignore]
    async fn test_fetch_month_online() {
        let client = SconeClient::official().unwrap();
        let records = client.fetch_month(december()).await.unwrap();
        assert!(records.len() > 0);
    }
}

//! USDA FAS PSD API integration.
//!
//! Endpoints used (all `GET`, JSON arrays):
//! - `/commodities`, `/countries`, `/commodityAttributes`, `/unitsOfMeasure`
//! - `/commodity/{code}/country/all/year/{year}`

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::data::PsdSource;
use crate::domain::{RawObservation, ReferenceKind, ReferenceTable};
use crate::error::{FetchErrorKind, PipelineError};

const API_KEY_HEADER: &str = "x-api-key";

pub struct UsdaClient {
    client: Client,
    base_url: String,
}

impl UsdaClient {
    /// Build a client from the environment. Fails before any network call
    /// when the credential is missing.
    pub fn from_env(config: &Config) -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| PipelineError::CredentialMissing {
                var: config.api_key_env.clone(),
            })?;
        Self::new(config, api_key.trim())
    }

    pub fn new(config: &Config, api_key: &str) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| PipelineError::Config("API key is not a valid header value".to_string()))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json(&self, path: &str) -> Result<Value, FetchErrorKind> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "GET");

        let resp = self.client.get(&url).send().map_err(classify)?;
        if !resp.status().is_success() {
            return Err(FetchErrorKind::Status(resp.status().as_u16()));
        }
        resp.json::<Value>()
            .map_err(|e| FetchErrorKind::Malformed(e.to_string()))
    }
}

impl PsdSource for UsdaClient {
    fn fetch_reference(&self, kind: ReferenceKind) -> Result<ReferenceTable, FetchErrorKind> {
        let body = self.get_json(kind.endpoint())?;
        ReferenceTable::from_json(kind, &body)
    }

    fn fetch_series(
        &self,
        commodity_code: &str,
        market_year: i32,
    ) -> Result<Vec<RawObservation>, FetchErrorKind> {
        let body = self.get_json(&format!(
            "commodity/{commodity_code}/country/all/year/{market_year}"
        ))?;
        parse_series_body(body)
    }
}

fn classify(err: reqwest::Error) -> FetchErrorKind {
    if err.is_timeout() {
        FetchErrorKind::Timeout
    } else {
        FetchErrorKind::Transport(err.to_string())
    }
}

/// An empty array is a valid answer: coverage is sparse for some commodity/years.
pub(crate) fn parse_series_body(body: Value) -> Result<Vec<RawObservation>, FetchErrorKind> {
    let Value::Array(rows) = body else {
        return Err(FetchErrorKind::Malformed("expected a JSON array".to_string()));
    };
    rows.into_iter()
        .map(|row| {
            if !row.is_object() {
                return Err(FetchErrorKind::Malformed("expected an array of objects".to_string()));
            }
            serde_json::from_value::<RawObservation>(row)
                .map_err(|e| FetchErrorKind::Malformed(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Duration;

    /// One-shot HTTP server on loopback. Sends back the request head, then
    /// either writes `response` or holds the connection open without replying.
    fn serve_once(response: Option<String>) -> (Config, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).unwrap_or(0);
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&chunk[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&head).to_lowercase());
            match response {
                Some(body) => {
                    let _ = stream.write_all(body.as_bytes());
                }
                None => std::thread::sleep(Duration::from_secs(3)),
            }
        });
        let config = Config {
            api_base_url: format!("http://{addr}"),
            timeout_secs: 1,
            ..Config::default()
        };
        (config, rx)
    }

    #[test]
    fn non_success_status_is_reported_with_its_code() {
        let (config, requests) = serve_once(Some(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string(),
        ));
        let client = UsdaClient::new(&config, "secret-key").unwrap();

        let err = client.fetch_reference(ReferenceKind::Country).unwrap_err();
        assert_eq!(err, FetchErrorKind::Status(503));

        let head = requests.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(head.starts_with("get /countries "));
        assert!(head.contains("x-api-key: secret-key"));
        assert!(head.contains("accept: application/json"));
    }

    #[test]
    fn silent_server_times_out() {
        let (config, requests) = serve_once(None);
        let client = UsdaClient::new(&config, "secret-key").unwrap();

        let err = client.fetch_series("4232000", 2025).unwrap_err();
        assert_eq!(err, FetchErrorKind::Timeout);

        let head = requests.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(head.starts_with("get /commodity/4232000/country/all/year/2025 "));
    }

    #[test]
    fn success_body_is_parsed() {
        let body = r#"[{"commodityCode":"4232000","countryCode":"BR","value":1.5}]"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let (config, _requests) = serve_once(Some(response));
        let client = UsdaClient::new(&config, "secret-key").unwrap();

        let rows = client.fetch_series("4232000", 2025).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Some(crate::domain::Scalar::Float(1.5)));
    }

    #[test]
    fn series_body_must_be_array_of_objects() {
        assert!(parse_series_body(json!([])).unwrap().is_empty());
        assert!(matches!(
            parse_series_body(json!({"error": "bad key"})),
            Err(FetchErrorKind::Malformed(_))
        ));
        assert!(matches!(
            parse_series_body(json!([1, 2])),
            Err(FetchErrorKind::Malformed(_))
        ));

        let rows = parse_series_body(json!([
            {"commodityCode": "0813100", "countryCode": "AR", "value": 1.0}
        ]))
        .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn missing_credential_fails_before_network() {
        let config = Config {
            api_key_env: "PSD_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Config::default()
        };
        match UsdaClient::from_env(&config) {
            Err(PipelineError::CredentialMissing { var }) => {
                assert_eq!(var, "PSD_TEST_KEY_THAT_IS_NEVER_SET");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("client built without a credential"),
        }
    }
}

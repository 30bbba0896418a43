//! Remote classifier
//!
//! Sends each window to a `/predict` endpoint instead of running a local
//! model. The endpoint only returns the top label, so results hold a single
//! entry. Calls block on an owned runtime because recognition ticks are
//! synchronous.

use super::http_retry::{send_with_retry, RetryPolicy};
use super::{ClassificationResult, SequenceClassifier};
use crate::capture::{SequenceWindow, WindowShape};
use crate::inference::{PredictRequest, PredictResponse};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Endpoint settings
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    /// Full URL of the predict route
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Window shape the remote model was trained for
    pub input_shape: WindowShape,
}

impl RemoteSettings {
    pub fn new(endpoint: impl Into<String>, input_shape: WindowShape) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_millis(2000),
            retry: RetryPolicy::default(),
            input_shape,
        }
    }
}

/// [`SequenceClassifier`] backed by a remote inference endpoint
pub struct RemoteClassifier {
    settings: RemoteSettings,
    client: Client,
    runtime: tokio::runtime::Runtime,
}

impl RemoteClassifier {
    pub fn new(settings: RemoteSettings) -> crate::Result<Self> {
        if !(settings.endpoint.starts_with("http://") || settings.endpoint.starts_with("https://")) {
            return Err(crate::Error::Config(format!(
                "remote endpoint must be an http(s) URL, got '{}'",
                settings.endpoint
            )));
        }
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| crate::Error::Remote(format!("cannot build HTTP client: {}", e)))?;
        let runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            settings,
            client,
            runtime,
        })
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    async fn request(&self, body: &PredictRequest) -> crate::Result<ClassificationResult> {
        let response = send_with_retry(
            &self.client,
            |c| c.post(&self.settings.endpoint).json(body),
            self.settings.retry,
            "remote inference",
        )
        .await?;

        let status = response.status();
        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| crate::Error::Remote(format!("unreadable response ({}): {}", status, e)))?;

        match parsed {
            PredictResponse::Prediction { label, confidence } => {
                debug!(%label, confidence, "remote prediction");
                Ok(ClassificationResult::new(label, (confidence / 100.0).clamp(0.0, 1.0)))
            }
            PredictResponse::Failure { error } if status.is_client_error() => {
                Err(crate::Error::InvalidInput(error))
            }
            PredictResponse::Failure { error } => Err(crate::Error::Remote(format!("{}: {}", status, error))),
        }
    }
}

impl SequenceClassifier for RemoteClassifier {
    fn input_shape(&self) -> WindowShape {
        self.settings.input_shape
    }

    fn classify(&self, window: &SequenceWindow) -> crate::Result<Vec<ClassificationResult>> {
        // Never send a window the endpoint would reject
        window.ensure_shape(self.settings.input_shape)?;
        let body = PredictRequest::from_window(window);
        let top = self.runtime.block_on(self.request(&body))?;
        Ok(vec![top])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn window(shape: WindowShape) -> SequenceWindow {
        SequenceWindow::from_array(Array2::zeros(shape.as_tuple()))
    }

    /// Serve one canned HTTP response on a local port
    fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut received = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = stream.read(&mut buf).unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    received.extend_from_slice(&buf[..n]);
                    if request_complete(&received) {
                        break;
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        format!("http://{}/predict", addr)
    }

    fn request_complete(data: &[u8]) -> bool {
        let text = String::from_utf8_lossy(data);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        data.len() >= header_end + 4 + length
    }

    fn settings(endpoint: String) -> RemoteSettings {
        RemoteSettings {
            retry: RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(10),
            },
            ..RemoteSettings::new(endpoint, WindowShape::new(3, 6))
        }
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let err = RemoteClassifier::new(RemoteSettings::new("ftp://host", WindowShape::default()))
            .err()
            .unwrap();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_wrong_shape_fails_before_any_request() {
        let classifier = RemoteClassifier::new(settings("http://127.0.0.1:1/predict".into())).unwrap();
        let err = classifier.classify(&window(WindowShape::new(3, 5))).unwrap_err();
        assert!(matches!(err, crate::Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_prediction_confidence_converted_to_fraction() {
        let endpoint = one_shot_server("200 OK", r#"{"label": "hello", "confidence": 87.5}"#);
        let classifier = RemoteClassifier::new(settings(endpoint)).unwrap();

        let results = classifier.classify(&window(WindowShape::new(3, 6))).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label, "hello");
        assert!((results[0].confidence - 0.875).abs() < 1e-6);
    }

    #[test]
    fn test_client_error_body_is_surfaced() {
        let endpoint = one_shot_server("400 Bad Request", r#"{"error": "Invalid feature shape"}"#);
        let classifier = RemoteClassifier::new(settings(endpoint)).unwrap();

        let err = classifier.classify(&window(WindowShape::new(3, 6))).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidInput(ref m) if m == "Invalid feature shape"));
    }

    #[test]
    fn test_unreachable_endpoint_is_remote_error() {
        let classifier = RemoteClassifier::new(settings("http://127.0.0.1:1/predict".into())).unwrap();
        let err = classifier.classify(&window(WindowShape::new(3, 6))).unwrap_err();
        assert!(matches!(err, crate::Error::Remote(_)));
    }
}

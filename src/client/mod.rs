//! HTTP client for the remote measurement service.

use reqwest::multipart::{Form, Part};
use std::time::Duration;

use crate::estimate::{EstimateError, ImageSet, MeasurementResult};

pub const DEFAULT_ENDPOINT: &str =
    "https://anonymousananta-ai-body-measurement.hf.space/measure_3pose";

#[derive(Debug, Clone)]
pub struct MeasureClient {
    http: reqwest::Client,
    endpoint: String,
    request_timeout: Option<Duration>,
}

impl MeasureClient {
    /// A `None` timeout waits for the remote indefinitely.
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout: Option<Duration>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, EstimateError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| EstimateError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            request_timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One multipart POST; no retries.
    pub async fn estimate(&self, images: &ImageSet) -> Result<MeasurementResult, EstimateError> {
        let form = build_form(images)?;
        tracing::debug!("POST {}", self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EstimateError::RemoteStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        MeasurementResult::from_body(&body)
    }

    fn classify(&self, e: reqwest::Error) -> EstimateError {
        if e.is_timeout() {
            let secs = self.request_timeout.map(|t| t.as_secs()).unwrap_or_default();
            EstimateError::TimedOut(secs)
        } else if e.is_builder() {
            EstimateError::Request(e.to_string())
        } else {
            EstimateError::Transport(e.to_string())
        }
    }
}

/// Exactly one part per view, keyed by the view's field name.
fn build_form(images: &ImageSet) -> Result<Form, EstimateError> {
    let mut form = Form::new();
    for (view, file) in images.parts() {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| EstimateError::Request(e.to_string()))?;
        form = form.part(view.field_name(), part);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::ImageFile;
    use axum::{extract::{Multipart, State}, http::StatusCode, routing::post, Router};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const SAMPLE: &str = r#"{"measurements":{"estimated_height_cm":170.2,"shoulder_width_cm":45.0,"arm_length_cm":60.5,"leg_length_cm":95.3},"views_used":3,"accuracy_note":"high"}"#;

    #[derive(Clone, Default)]
    struct Recorded {
        hits: Arc<AtomicUsize>,
        parts: Arc<Mutex<Vec<(String, Vec<u8>, Option<String>)>>>,
    }

    async fn record(State(rec): State<Recorded>, mut multipart: Multipart) -> &'static str {
        rec.hits.fetch_add(1, Ordering::SeqCst);
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.unwrap().to_vec();
            rec.parts.lock().unwrap().push((name, data, content_type));
        }
        SAMPLE
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/measure_3pose", addr)
    }

    fn client(endpoint: &str) -> MeasureClient {
        MeasureClient::new(endpoint, Some(Duration::from_secs(5)), Some(Duration::from_secs(2))).unwrap()
    }

    fn file(name: &str, bytes: &[u8]) -> ImageFile {
        ImageFile {
            name: name.to_string(),
            mime: "image/png".to_string(),
            bytes: bytes.to_vec(),
            path: PathBuf::from(name),
        }
    }

    fn images() -> ImageSet {
        ImageSet {
            front: file("front.png", b"front-bytes"),
            side: file("side.png", b"side-bytes"),
            standing: file("standing.png", b"standing-bytes"),
        }
    }

    #[tokio::test]
    async fn test_posts_exactly_three_named_parts() {
        let rec = Recorded::default();
        let app = Router::new()
            .route("/measure_3pose", post(record))
            .with_state(rec.clone());
        let endpoint = serve(app).await;

        let result = client(&endpoint).estimate(&images()).await.unwrap();
        assert_eq!(result.measurements.estimated_height_cm, 170.2);
        assert_eq!(result.views_used, 3);
        assert_eq!(result.accuracy_note, "high");

        assert_eq!(rec.hits.load(Ordering::SeqCst), 1);
        let parts = rec.parts.lock().unwrap().clone();
        assert_eq!(parts.len(), 3);
        let expected = [
            ("front", b"front-bytes".as_slice()),
            ("side", b"side-bytes".as_slice()),
            ("standing", b"standing-bytes".as_slice()),
        ];
        for (name, bytes) in expected {
            let part = parts.iter().find(|p| p.0 == name).expect("part present");
            assert_eq!(part.1, bytes);
            assert_eq!(part.2.as_deref(), Some("image/png"));
        }
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_error() {
        let app = Router::new().route(
            "/measure_3pose",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "{\"measurements\":{}}") }),
        );
        let endpoint = serve(app).await;

        let err = client(&endpoint).estimate(&images()).await.unwrap_err();
        assert_eq!(err, EstimateError::RemoteStatus(500));
    }

    #[tokio::test]
    async fn test_empty_object_is_malformed() {
        let app = Router::new().route("/measure_3pose", post(|| async { "{}" }));
        let endpoint = serve(app).await;

        let err = client(&endpoint).estimate(&images()).await.unwrap_err();
        assert!(matches!(err, EstimateError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = format!("http://{}/measure_3pose", addr);
        let err = client(&endpoint).estimate(&images()).await.unwrap_err();
        assert!(matches!(err, EstimateError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_slow_remote_times_out() {
        let app = Router::new().route(
            "/measure_3pose",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                SAMPLE
            }),
        );
        let endpoint = serve(app).await;

        let client =
            MeasureClient::new(&endpoint, Some(Duration::from_millis(200)), Some(Duration::from_secs(2)))
                .unwrap();
        let err = client.estimate(&images()).await.unwrap_err();
        assert!(matches!(err, EstimateError::TimedOut(_)), "got {err:?}");
    }
}

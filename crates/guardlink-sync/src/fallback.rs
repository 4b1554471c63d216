//! HTTP polling fallback for the relay's REST surface.
//!
//! Used when no WebSocket session is available. The relay exposes the same
//! state through plain endpoints:
//!
//! - `GET /location/latest` → `{latitude, longitude}`
//! - `GET /sos/latest` → `{latitude, longitude, timestamp}`; 404 means no
//!   outstanding alert
//! - `POST /location/update` with `{latitude, longitude, heading}`
//! - `POST /sos` with `{latitude, longitude}`
//! - `POST /sos/clear`
//!
//! Uses a reusable `reqwest::Client` with connection pooling and a request
//! timeout.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use guardlink_core::{AlertStamp, Coordinate, Heading, TransportError};

/// Default timeout for fallback requests.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Latest-position response body.
#[derive(Debug, Clone, Deserialize)]
struct LatestLocation {
    latitude: f64,
    longitude: f64,
}

/// Latest-SOS response body.
#[derive(Debug, Clone, Deserialize)]
struct LatestSos {
    latitude: f64,
    longitude: f64,
    timestamp: f64,
}

/// Location upload request body.
#[derive(Debug, Clone, Serialize)]
struct LocationUpdateBody {
    latitude: f64,
    longitude: f64,
    heading: f64,
}

/// SOS request body.
#[derive(Debug, Clone, Serialize)]
struct SosBody {
    latitude: f64,
    longitude: f64,
}

/// HTTP client for the relay's polling interface.
pub struct FallbackClient {
    http: reqwest::Client,
    base_url: Url,
}

impl FallbackClient {
    /// Creates a client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(base_url: Url) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| TransportError::connect_failed(base_url.as_str(), e))?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}"))
            .map_err(|e| TransportError::connect_failed(path, e))
    }

    /// Fetches the tracked user's latest reported position.
    ///
    /// Returns `Ok(None)` when the relay has no position yet (404).
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure, non-success status, or
    /// an unparseable body.
    pub async fn latest_location(&self) -> Result<Option<Coordinate>, TransportError> {
        let url = self.endpoint("/location/latest")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::receive_failed(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| TransportError::receive_failed(e))?;

        let body: LatestLocation = response
            .json()
            .await
            .map_err(|e| TransportError::receive_failed(e))?;

        let coordinate = Coordinate::new(body.latitude, body.longitude)
            .map_err(|e| TransportError::receive_failed(e))?;
        Ok(Some(coordinate))
    }

    /// Fetches the outstanding alert, if any.
    ///
    /// Returns `Ok(None)` when no alert is outstanding (404).
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure, non-success status, or
    /// an unparseable body.
    pub async fn latest_sos(&self) -> Result<Option<(Coordinate, AlertStamp)>, TransportError> {
        let url = self.endpoint("/sos/latest")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::receive_failed(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| TransportError::receive_failed(e))?;

        let body: LatestSos = response
            .json()
            .await
            .map_err(|e| TransportError::receive_failed(e))?;

        let coordinate = Coordinate::new(body.latitude, body.longitude)
            .map_err(|e| TransportError::receive_failed(e))?;
        Ok(Some((coordinate, AlertStamp::from_epoch_seconds(body.timestamp))))
    }

    /// Uploads the tracked user's position.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure or non-success status.
    pub async fn update_location(
        &self,
        coordinate: Coordinate,
        heading: Heading,
    ) -> Result<(), TransportError> {
        let url = self.endpoint("/location/update")?;
        self.http
            .post(url)
            .json(&LocationUpdateBody {
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
                heading: heading.degrees(),
            })
            .send()
            .await
            .map_err(|e| TransportError::send_failed(e))?
            .error_for_status()
            .map_err(|e| TransportError::send_failed(e))?;
        Ok(())
    }

    /// Raises an SOS alert at the given position.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure or non-success status.
    pub async fn raise_sos(&self, coordinate: Coordinate) -> Result<(), TransportError> {
        let url = self.endpoint("/sos")?;
        self.http
            .post(url)
            .json(&SosBody {
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
            })
            .send()
            .await
            .map_err(|e| TransportError::send_failed(e))?
            .error_for_status()
            .map_err(|e| TransportError::send_failed(e))?;
        Ok(())
    }

    /// Asks the relay to clear the outstanding alert.
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure or non-success status.
    pub async fn clear_sos(&self) -> Result<(), TransportError> {
        let url = self.endpoint("/sos/clear")?;
        self.http
            .post(url)
            .send()
            .await
            .map_err(|e| TransportError::send_failed(e))?
            .error_for_status()
            .map_err(|e| TransportError::send_failed(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serves exactly one HTTP response on a fresh local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn test_latest_sos_404_means_no_active_alert() {
        let base = serve_once("404 Not Found", "").await;
        let client = FallbackClient::new(base).unwrap();

        let outcome = client.latest_sos().await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_latest_sos_parses_active_alert() {
        let base = serve_once(
            "200 OK",
            r#"{"latitude":24.15,"longitude":120.67,"timestamp":1000}"#,
        )
        .await;
        let client = FallbackClient::new(base).unwrap();

        let (coordinate, stamp) = client.latest_sos().await.unwrap().unwrap();
        assert!((coordinate.latitude - 24.15).abs() < f64::EPSILON);
        assert!((stamp.as_epoch_seconds() - 1000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_latest_location_error_status_is_an_error() {
        let base = serve_once("500 Internal Server Error", "").await;
        let client = FallbackClient::new(base).unwrap();

        assert!(client.latest_location().await.is_err());
    }

    #[tokio::test]
    async fn test_latest_location_parses_position() {
        let base = serve_once("200 OK", r#"{"latitude":24.15,"longitude":120.67}"#).await;
        let client = FallbackClient::new(base).unwrap();

        let coordinate = client.latest_location().await.unwrap().unwrap();
        assert!((coordinate.longitude - 120.67).abs() < f64::EPSILON);
    }

    #[test]
    fn test_endpoint_join() {
        let client = FallbackClient::new(Url::parse("https://relay.example/").unwrap()).unwrap();
        let url = client.endpoint("/sos/latest").unwrap();
        assert_eq!(url.as_str(), "https://relay.example/sos/latest");

        let no_slash = FallbackClient::new(Url::parse("https://relay.example").unwrap()).unwrap();
        let url = no_slash.endpoint("/location/latest").unwrap();
        assert_eq!(url.as_str(), "https://relay.example/location/latest");
    }

    #[test]
    fn test_latest_sos_body_parses() {
        let body: LatestSos =
            serde_json::from_str(r#"{"latitude":24.15,"longitude":120.67,"timestamp":1000}"#)
                .unwrap();
        assert!((body.timestamp - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_location_update_body_shape() {
        let body = LocationUpdateBody {
            latitude: 24.15,
            longitude: 120.67,
            heading: 45.0,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"latitude\":24.15"));
        assert!(json.contains("\"heading\":45.0"));
    }
}

//! Polls an endpoint until a deployment answers.

use std::time::Duration;

use reqwest::header::CACHE_CONTROL;
use reqwest::StatusCode;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Delay between two attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Repeated GET requests against a readiness URL.
///
/// Only `200 OK` counts as ready: the ping endpoint answers other 2xx codes
/// while the deployment is still being processed. Connection failures count
/// as not ready. Dropping the returned future stops polling.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    client: reqwest::Client,
    interval: Duration,
}

impl ReadinessProbe {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            interval: POLL_INTERVAL,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `url` until it answers `200 OK` or `deadline` passes.
    pub async fn wait_until_ready(&self, url: &str, deadline: Instant) -> bool {
        let mut attempts = 0u32;

        loop {
            let now = Instant::now();
            if now >= deadline {
                info!(url = %url, attempts, "Gave up waiting for deployment");
                return false;
            }
            attempts += 1;

            let request = self
                .client
                .get(url)
                .header(CACHE_CONTROL, "no-cache")
                .timeout(deadline - now);

            match request.send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    debug!(url = %url, attempts, "Deployment is ready");
                    return true;
                }
                Ok(response) => {
                    debug!(url = %url, status = %response.status(), "Deployment not ready yet");
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Readiness check failed");
                }
            }

            sleep_until((Instant::now() + self.interval).min(deadline)).await;
        }
    }
}

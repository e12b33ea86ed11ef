//! HTTP object store client
//!
//! Objects are written with `PUT {base_url}/{folder}/{object_id}` and removed with
//! `DELETE` on the returned reference. Calls go through a rate limiter so a burst
//! of upload jobs cannot exceed the provider quota.

use crate::modules::media::domain::ObjectStore;
use crate::shared::config::ObjectStoreConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_warn};
use async_trait::async_trait;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use uuid::Uuid;

type DirectLimiter = GovernorRateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
    governor::middleware::NoOpMiddleware,
>;

/// Body some providers send back on upload; any of these fields wins over the request URL
#[derive(Debug, Deserialize)]
struct StoreResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    token: Option<String>,
    rate_limiter: DirectLimiter,
}

impl HttpObjectStore {
    pub fn new(config: &ObjectStoreConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("blog-media/0.1")
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            rate_limiter: Self::create_rate_limiter(config.requests_per_second, 3)?,
        })
    }

    fn create_rate_limiter(requests_per_second: f64, burst_size: u32) -> AppResult<DirectLimiter> {
        let period = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::from_secs(1)
        };

        let burst = NonZeroU32::new(burst_size.max(1)).ok_or_else(|| {
            AppError::InvalidInput("Object store burst size must be positive".to_string())
        })?;
        let quota = Quota::with_period(period)
            .ok_or_else(|| AppError::InvalidInput("Object store rate must be positive".to_string()))?
            .allow_burst(burst);

        Ok(GovernorRateLimiter::direct(quota))
    }

    fn object_url(&self, folder: &str, object_id: &str) -> String {
        let folder = folder
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if folder.is_empty() {
            format!("{}/{}", self.base_url, object_id)
        } else {
            format!("{}/{}/{}", self.base_url, folder, object_id)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn store(&self, bytes: Vec<u8>, folder: &str) -> AppResult<String> {
        self.rate_limiter.until_ready().await;

        let url = self.object_url(folder, &Uuid::new_v4().to_string());
        let size = bytes.len();
        log_debug!("Uploading {} bytes to {}", size, url);

        let response = self
            .authorize(self.client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;

        // A JSON body is optional; fall back to the URL we wrote to
        let reference = match response.json::<StoreResponse>().await {
            Ok(body) => body.secure_url.or(body.url).unwrap_or(url),
            Err(_) => url,
        };

        Ok(reference)
    }

    async fn remove_by_ref(&self, object_ref: &str) -> AppResult<()> {
        if !object_ref.starts_with(&self.base_url) {
            return Err(AppError::ValidationError(format!(
                "Reference {} does not belong to this object store",
                object_ref
            )));
        }

        self.rate_limiter.until_ready().await;

        let response = self.authorize(self.client.delete(object_ref)).send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                log_warn!("Object {} was already removed", object_ref);
                Ok(())
            }
            _ => {
                response.error_for_status()?;
                Ok(())
            }
        }
    }
}

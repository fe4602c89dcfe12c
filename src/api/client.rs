use std::{future::Future, time::Duration};

use reqwest::{Client, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{Ack, GazeResult, ResultFetch, SessionStatus, StartSessionRequest};

use super::ApiError;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Session endpoints of the tracking backend. Implementations perform one
/// request per call; retry policy belongs to the caller.
pub trait SessionClient: Send + Sync + 'static {
    /// `POST /start`
    fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    /// `POST /stop`
    fn stop_session(&self) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    /// `GET /status`
    fn get_status(&self) -> impl Future<Output = Result<SessionStatus, ApiError>> + Send;

    /// `GET /get-report/:childId`. HTTP 202 comes back as
    /// [`ResultFetch::Processing`].
    fn get_result(
        &self,
        child_id: &str,
    ) -> impl Future<Output = Result<ResultFetch, ApiError>> + Send;

    /// `GET /results`
    fn list_results(&self) -> impl Future<Output = Result<Vec<GazeResult>, ApiError>> + Send;
}

/// Plain JSON CRUD used by the cached repositories. Mutations ignore the
/// response body; callers refetch instead of trusting it.
pub trait JsonTransport: Send + Sync + 'static {
    fn get_json<T>(&self, path: &str) -> impl Future<Output = Result<T, ApiError>> + Send
    where
        T: DeserializeOwned + Send;

    fn post_json<B>(&self, path: &str, body: &B) -> impl Future<Output = Result<(), ApiError>> + Send
    where
        B: Serialize + Sync;

    fn put_json<B>(&self, path: &str, body: &B) -> impl Future<Output = Result<(), ApiError>> + Send
    where
        B: Serialize + Sync;

    fn delete(&self, path: &str) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[derive(Clone)]
pub struct HttpSessionClient {
    http: Client,
    base_url: Url,
}

impl HttpSessionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(&format!("{trimmed}/"))
            .map_err(|err| ApiError::InvalidUrl(format!("{base_url}: {err}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{base_url}: only http and https are supported"
            )));
        }

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Resolve a backend-relative path (`static/heatmap_4.png`) into a full
    /// URL. Absolute URLs pass through untouched.
    pub fn asset_url(&self, path: &str) -> Result<String, ApiError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        self.endpoint(path).map(String::from)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::InvalidUrl(format!("{path}: {err}")))
    }

    fn endpoint_with_segment(&self, path: &str, segment: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{path} cannot take path segments")))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = ensure_success(request.send().await?).await?;
        decode_json(response).await
    }

    async fn send_ack(&self, request: reqwest::RequestBuilder) -> Result<Ack, ApiError> {
        let response = ensure_success(request.send().await?).await?;
        let body = response.text().await?;
        Ok(Ack::from_body(&body))
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    log_warn!("{} answered HTTP {}", url.path(), status.as_u16());
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(ApiError::from)
}

impl SessionClient for HttpSessionClient {
    async fn start_session(&self, request: &StartSessionRequest) -> Result<Ack, ApiError> {
        log_debug!(
            "POST /start child={} stimulus={} type={}",
            request.child_id,
            request.stimulus_id,
            request.session_type
        );
        let url = self.endpoint("start")?;
        self.send_ack(self.http.post(url).json(request)).await
    }

    async fn stop_session(&self) -> Result<Ack, ApiError> {
        log_debug!("POST /stop");
        let url = self.endpoint("stop")?;
        self.send_ack(self.http.post(url)).await
    }

    async fn get_status(&self) -> Result<SessionStatus, ApiError> {
        let url = self.endpoint("status")?;
        self.send_json(self.http.get(url)).await
    }

    async fn get_result(&self, child_id: &str) -> Result<ResultFetch, ApiError> {
        let url = self.endpoint_with_segment("get-report", child_id)?;
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::ACCEPTED {
            log_debug!("report for child {child_id} still processing");
            return Ok(ResultFetch::Processing);
        }
        let response = ensure_success(response).await?;
        decode_json(response).await.map(ResultFetch::Ready)
    }

    async fn list_results(&self) -> Result<Vec<GazeResult>, ApiError> {
        let url = self.endpoint("results")?;
        self.send_json(self.http.get(url)).await
    }
}

impl JsonTransport for HttpSessionClient {
    async fn get_json<T>(&self, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send,
    {
        let url = self.endpoint(path)?;
        self.send_json(self.http.get(url)).await
    }

    async fn post_json<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + Sync,
    {
        let url = self.endpoint(path)?;
        ensure_success(self.http.post(url).json(body).send().await?).await?;
        Ok(())
    }

    async fn put_json<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + Sync,
    {
        let url = self.endpoint(path)?;
        ensure_success(self.http.put(url).json(body).send().await?).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        ensure_success(self.http.delete(url).send().await?).await?;
        Ok(())
    }
}

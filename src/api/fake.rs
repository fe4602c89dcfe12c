//! Scripted backend for poller, retry and controller tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::models::{
    Ack, GazeResult, ResultFetch, RiskLevel, SessionStatus, StartSessionRequest,
};

use super::{ApiError, SessionClient};

pub(crate) fn sample_result(child_id: &str) -> GazeResult {
    GazeResult {
        id: format!("result-{child_id}"),
        child_id: child_id.to_string(),
        predicted_class: "ASD".into(),
        confidence: 0.74,
        risk_level: RiskLevel::Moderate,
        scanpath_path: Some(format!("static/scanpath_{child_id}.png")),
        heatmap_path: Some(format!("static/heatmap_{child_id}.png")),
        gaze_data_path: Some(format!("static/gaze_{child_id}.csv")),
        created_at: "2026-10-01T09:00:00Z".into(),
    }
}

pub(crate) fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        body: "internal error".into(),
    }
}

/// Answers are consumed front to back; once a script runs dry the last
/// answer keeps repeating.
#[derive(Default)]
pub(crate) struct FakeSessionClient {
    start_answers: Mutex<VecDeque<Result<Ack, ApiError>>>,
    stop_answers: Mutex<VecDeque<Result<Ack, ApiError>>>,
    status_answers: Mutex<VecDeque<Result<SessionStatus, ApiError>>>,
    result_answers: Mutex<VecDeque<Result<ResultFetch, ApiError>>>,
    status_latency: Mutex<Option<Duration>>,
    cancel_on_result: Mutex<Option<CancellationToken>>,
    pub start_calls: AtomicU32,
    pub stop_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub result_calls: AtomicU32,
    pub started: Mutex<Vec<StartSessionRequest>>,
}

impl FakeSessionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, answers: Vec<Result<SessionStatus, ApiError>>) -> Self {
        *self.status_answers.lock().unwrap() = answers.into();
        self
    }

    pub fn with_results(self, answers: Vec<Result<ResultFetch, ApiError>>) -> Self {
        *self.result_answers.lock().unwrap() = answers.into();
        self
    }

    pub fn with_start_answer(self, answer: Result<Ack, ApiError>) -> Self {
        self.start_answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn with_stop_answer(self, answer: Result<Ack, ApiError>) -> Self {
        self.stop_answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn with_status_latency(self, latency: Duration) -> Self {
        *self.status_latency.lock().unwrap() = Some(latency);
        self
    }

    /// Cancel `token` as each result answer is handed out, so the caller
    /// sees the answer and the cancellation together.
    pub fn cancelling_on_result(self, token: CancellationToken) -> Self {
        *self.cancel_on_result.lock().unwrap() = Some(token);
        self
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn result_calls(&self) -> u32 {
        self.result_calls.load(Ordering::SeqCst)
    }

    fn next<T: Clone>(script: &Mutex<VecDeque<T>>, default: T) -> T {
        let mut guard = script.lock().unwrap();
        if guard.len() > 1 {
            guard.pop_front().unwrap_or(default)
        } else {
            guard.front().cloned().unwrap_or(default)
        }
    }
}

impl SessionClient for FakeSessionClient {
    async fn start_session(&self, request: &StartSessionRequest) -> Result<Ack, ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(request.clone());
        Self::next(&self.start_answers, Ok(Ack::default()))
    }

    async fn stop_session(&self) -> Result<Ack, ApiError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.stop_answers, Ok(Ack::default()))
    }

    async fn get_status(&self) -> Result<SessionStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.status_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Self::next(&self.status_answers, Ok(SessionStatus::idle()))
    }

    async fn get_result(&self, _child_id: &str) -> Result<ResultFetch, ApiError> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.cancel_on_result.lock().unwrap().as_ref() {
            token.cancel();
        }
        Self::next(&self.result_answers, Ok(ResultFetch::Processing))
    }

    async fn list_results(&self) -> Result<Vec<GazeResult>, ApiError> {
        Ok(Vec::new())
    }
}

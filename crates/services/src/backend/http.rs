use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;
use worksheet_core::model::{
    GradingResult, Problem, SessionId, Subject, WorksheetRef, sort_for_display,
};

use super::wire::{self, GradingResultDto, ProblemSetDto};
use super::{GradingClient, SubmissionReceipt, TaskId, TaskStatus, WorksheetSource};
use crate::config::BackendConfig;
use crate::error::{ContentError, GradingError, InvalidEndpoint};
use crate::sessions::SubmissionPayload;

/// reqwest-backed client for the per-subject services.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Build a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the TLS backend cannot be initialized.
    pub fn new(config: BackendConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    /// Append `segments` to the subject's base URL, escaping each one.
    fn endpoint(&self, subject: Subject, segments: &[&str]) -> Result<Url, InvalidEndpoint> {
        let base = self.config.base_url(subject);
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| InvalidEndpoint(base.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn grading_json(&self, request: RequestBuilder) -> Result<Value, GradingError> {
        let response = self.authorized(request).send().await?;
        let response = ensure_success(response).map_err(GradingError::HttpStatus)?;
        Ok(response.json().await?)
    }
}

fn ensure_success(response: Response) -> Result<Response, reqwest::StatusCode> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(response.status())
    }
}

#[async_trait]
impl WorksheetSource for HttpBackend {
    #[instrument(skip_all, fields(%worksheet))]
    async fn fetch_problems(&self, worksheet: WorksheetRef) -> Result<Vec<Problem>, ContentError> {
        let url = self.endpoint(
            worksheet.subject,
            &["worksheets", &worksheet.worksheet_id.to_string(), "problems"],
        )?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = ensure_success(response).map_err(ContentError::HttpStatus)?;
        let body: ProblemSetDto = response.json().await?;

        let mut problems = body
            .problems
            .into_iter()
            .map(wire::ProblemDto::into_problem)
            .collect::<Result<Vec<_>, _>>()?;
        sort_for_display(&mut problems);
        debug!(count = problems.len(), "fetched problems");
        Ok(problems)
    }
}

#[async_trait]
impl GradingClient for HttpBackend {
    #[instrument(skip_all, fields(%worksheet, attempt = %payload.attempt_id))]
    async fn submit(
        &self,
        worksheet: WorksheetRef,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, GradingError> {
        let url = self.endpoint(
            worksheet.subject,
            &["worksheets", &worksheet.worksheet_id.to_string(), "submissions"],
        )?;
        let body = wire::submission_body(worksheet.subject, payload);
        let reply = self.grading_json(self.client.post(url).json(&body)).await?;
        let receipt = wire::parse_receipt(reply)?;
        debug!(?receipt, "submission accepted");
        Ok(receipt)
    }

    #[instrument(skip_all, fields(%subject, %task))]
    async fn poll_task(&self, subject: Subject, task: &TaskId) -> Result<TaskStatus, GradingError> {
        let url = self.endpoint(subject, &["tasks", task.as_str()])?;
        let reply = self.grading_json(self.client.get(url)).await?;
        wire::parse_task_status(reply)
    }

    #[instrument(skip_all, fields(%subject, %session_id))]
    async fn fetch_result(
        &self,
        subject: Subject,
        session_id: SessionId,
    ) -> Result<GradingResult, GradingError> {
        let url = self.endpoint(subject, &["sessions", &session_id.to_string(), "result"])?;
        let reply = self.grading_json(self.client.get(url)).await?;
        let dto: GradingResultDto = serde_json::from_value(reply)
            .map_err(|e| GradingError::MalformedPayload(e.to_string()))?;
        dto.into_result()
    }
}

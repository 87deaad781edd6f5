use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::backend::{AttemptBundle, ExamBackend};
use crate::core::config::Settings;
use crate::models::{AnswerValue, SavedAnswer, SubmitOutcome, ViolationKind};

/// `ExamBackend` over the exam service's REST API.
#[derive(Debug, Clone)]
pub struct HttpExamBackend {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl HttpExamBackend {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.api().connect_timeout_seconds))
            .timeout(Duration::from_secs(settings.api().request_timeout_seconds))
            .build()
            .context("Failed to build exam API HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.api().base_url.trim_end_matches('/').to_string(),
            bearer_token: settings.api().bearer_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, format!("{}/{path}", self.base_url));
        if !self.bearer_token.is_empty() {
            builder = builder.bearer_auth(&self.bearer_token);
        }
        builder
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, path: &str) -> Result<T> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to call exam API: {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("exam API {path} failed (status {status}): {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode exam API response: {path}"))
    }

    async fn send_expect_ok(&self, builder: RequestBuilder, path: &str) -> Result<()> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to call exam API: {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("exam API {path} failed (status {status}): {body}");
        }

        Ok(())
    }
}

#[async_trait]
impl ExamBackend for HttpExamBackend {
    async fn start_or_resume_attempt(&self, exam_instance_id: &str) -> Result<AttemptBundle> {
        let path = "attempts/start";
        let builder = self
            .request(Method::POST, path)
            .json(&serde_json::json!({ "exam_instance_id": exam_instance_id }));
        self.send_json(builder, path).await
    }

    async fn fetch_saved_answers(&self, attempt_id: &str) -> Result<Vec<SavedAnswer>> {
        let path = format!("attempts/{attempt_id}/answers");
        let builder = self.request(Method::GET, &path);
        self.send_json(builder, &path).await
    }

    async fn save_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        value: &AnswerValue,
    ) -> Result<()> {
        let path = format!("attempts/{attempt_id}/answers/{question_id}");
        let builder = self.request(Method::PUT, &path).json(value);
        self.send_expect_ok(builder, &path).await
    }

    async fn submit_attempt(&self, attempt_id: &str) -> Result<SubmitOutcome> {
        let path = format!("attempts/{attempt_id}/submit");
        let builder = self.request(Method::POST, &path);
        self.send_json(builder, &path).await
    }

    async fn report_violation(&self, attempt_id: &str, kind: ViolationKind) -> Result<()> {
        let path = format!("attempts/{attempt_id}/violations");
        let builder =
            self.request(Method::POST, &path).json(&serde_json::json!({ "type": kind }));
        self.send_expect_ok(builder, &path).await
    }
}

//! JSON-over-HTTP client for the content backend.
//!
//! One [`HttpBackend`] serves all four collaborator traits against the
//! backend's `/api/init`, `/api/generate`, `/api/refine` and `/api/publish`
//! endpoints. Any non-2xx status, non-JSON body or `error` field fails the
//! call as a unit.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use jsonschema::{Draft, Validator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::history::HistoryEntry;
use crate::core::types::{Candidate, CandidatePair, ContextBundle, FormInput, PublishReceipt, Side};
use crate::io::config::BackendConfig;
use crate::io::services::{
    ContextService, GenerationService, PublishRequest, PublishService, RefinementService,
};

const CANDIDATE_PAIR_SCHEMA: &str = include_str!("../../schemas/candidate_pair.schema.json");

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    pair_schema: Validator,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        let schema: Value =
            serde_json::from_str(CANDIDATE_PAIR_SCHEMA).context("parse candidate pair schema")?;
        let pair_schema = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .context("compile candidate pair schema")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            pair_schema,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.endpoint(path);
        debug!(url = %url, "sending request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("read response body from {url}"))?;
        let value: Option<Value> = serde_json::from_slice(&bytes).ok();

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "backend returned error status");
            let detail = value
                .as_ref()
                .and_then(error_message)
                .map(|message| format!(": {message}"))
                .unwrap_or_default();
            bail!("POST {url} returned {status}{detail}");
        }

        let value = value.ok_or_else(|| anyhow!("POST {url} returned a non-JSON body"))?;
        if let Some(message) = error_message(&value) {
            warn!(url = %url, "backend reported error in success response");
            bail!("POST {url} reported an error: {message}");
        }
        debug!(url = %url, status = status.as_u16(), "request completed");
        Ok(value)
    }

    /// Check a generate/refine body against the candidate pair schema, then decode it.
    fn decode_pair(&self, value: Value) -> Result<CandidatePair> {
        let violations: Vec<String> = self
            .pair_schema
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect();
        if !violations.is_empty() {
            bail!(
                "candidate pair response failed schema validation:\n- {}",
                violations.join("\n- ")
            );
        }
        let wire: PairResponse = serde_json::from_value(value).context("decode candidate pair")?;
        Ok(CandidatePair {
            a: wire.post_a,
            b: wire.post_b,
        })
    }
}

fn error_message(value: &Value) -> Option<&str> {
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
}

#[async_trait]
impl ContextService for HttpBackend {
    async fn fetch(&self, form: &FormInput) -> Result<ContextBundle> {
        let value = self.post_json("/api/init", &FormPayload::from(form)).await?;
        let wire: InitResponse = serde_json::from_value(value).context("decode context response")?;
        let bundle = ContextBundle {
            retrieval_matches: wire.pinecone_results.unwrap_or_default(),
            similar_posts: wire.similar_posts.unwrap_or_default(),
            analytics_insights: wire.analytics_insights.unwrap_or_default(),
        };
        debug!(
            matches = bundle.retrieval_matches.len(),
            similar = bundle.similar_posts.len(),
            "context decoded"
        );
        Ok(bundle)
    }
}

#[async_trait]
impl GenerationService for HttpBackend {
    async fn generate(&self, form: &FormInput, context: &ContextBundle) -> Result<CandidatePair> {
        let body = GenerateRequest {
            form: FormPayload::from(form),
            pinecone_results: &context.retrieval_matches,
            similar_posts: &context.similar_posts,
            analytics_insights: &context.analytics_insights,
        };
        let value = self.post_json("/api/generate", &body).await?;
        self.decode_pair(value)
    }
}

#[async_trait]
impl RefinementService for HttpBackend {
    async fn refine(
        &self,
        selected_text: &str,
        request: &str,
        round: u32,
    ) -> Result<CandidatePair> {
        let body = RefineRequest {
            selected_post: selected_text,
            refinement_request: request,
            round,
        };
        let value = self.post_json("/api/refine", &body).await?;
        self.decode_pair(value)
    }
}

#[async_trait]
impl PublishService for HttpBackend {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let body = PublishPayload {
            form: FormPayload::from(&request.form),
            final_post: &request.final_result,
            history: request.history.iter().map(HistoryWire::from).collect(),
            pinecone_results: &request.context.retrieval_matches,
            similar_posts: &request.context.similar_posts,
        };
        let value = self.post_json("/api/publish", &body).await?;
        let wire: PublishResponse =
            serde_json::from_value(value).context("decode publish response")?;
        if wire.success == Some(false) {
            bail!("publish was not acknowledged");
        }
        Ok(PublishReceipt {
            draft_row: wire.draft_row,
            published_row: wire.published_row,
        })
    }
}

#[derive(Debug, Serialize)]
struct FormPayload<'a> {
    date: String,
    url: &'a str,
    decided: &'a str,
    anniversary: &'a str,
    remarks: &'a str,
}

impl<'a> From<&'a FormInput> for FormPayload<'a> {
    fn from(form: &'a FormInput) -> Self {
        Self {
            date: form
                .date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            url: &form.url,
            decided: &form.decided,
            anniversary: &form.anniversary,
            remarks: &form.remarks,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    pinecone_results: Option<Vec<Value>>,
    similar_posts: Option<Vec<Value>>,
    analytics_insights: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(flatten)]
    form: FormPayload<'a>,
    pinecone_results: &'a [Value],
    similar_posts: &'a [Value],
    analytics_insights: &'a str,
}

#[derive(Debug, Serialize)]
struct RefineRequest<'a> {
    selected_post: &'a str,
    refinement_request: &'a str,
    round: u32,
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    post_a: Candidate,
    post_b: Candidate,
}

#[derive(Debug, Serialize)]
struct PublishPayload<'a> {
    #[serde(flatten)]
    form: FormPayload<'a>,
    final_post: &'a Candidate,
    history: Vec<HistoryWire<'a>>,
    pinecone_results: &'a [Value],
    similar_posts: &'a [Value],
}

#[derive(Debug, Serialize)]
struct HistoryWire<'a> {
    round: u32,
    #[serde(rename = "postA")]
    post_a: &'a Candidate,
    #[serde(rename = "postB")]
    post_b: &'a Candidate,
    selected: Side,
    #[serde(rename = "refinementRequest")]
    refinement_request: &'a str,
}

impl<'a> From<&'a HistoryEntry> for HistoryWire<'a> {
    fn from(entry: &'a HistoryEntry) -> Self {
        Self {
            round: entry.round(),
            post_a: entry.candidate(Side::A),
            post_b: entry.candidate(Side::B),
            selected: entry.selected(),
            refinement_request: entry.refinement_request(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    success: Option<bool>,
    draft_row: Option<u64>,
    published_row: Option<u64>,
}

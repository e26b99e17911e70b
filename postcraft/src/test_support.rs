//! Test-only collaborators and deterministic fixtures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tokio::sync::Notify;

use crate::core::types::{Candidate, CandidatePair, ContextBundle, FormInput, PublishReceipt};
use crate::io::services::{
    ContextService, GenerationService, PublishRequest, PublishService, RefinementService, Services,
};

/// A collaborator call as the scripted backend received it.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch { url: String },
    Generate { matches: usize },
    Refine { selected_text: String, request: String, round: u32 },
    Publish(PublishRequest),
}

type Reply<T> = std::result::Result<T, String>;

#[derive(Default)]
struct Script {
    context: VecDeque<Reply<ContextBundle>>,
    generation: VecDeque<Reply<CandidatePair>>,
    refinement: VecDeque<Reply<CandidatePair>>,
    publish: VecDeque<Reply<PublishReceipt>>,
    calls: Vec<Call>,
}

/// Backend that answers every collaborator from queued replies.
///
/// Replies are consumed in order; a call with nothing queued fails with a
/// message naming the service. Every call is logged, including failed ones.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    fetch_gate: Option<Arc<Notify>>,
    publish_gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(self, bundle: ContextBundle) -> Self {
        self.push(|script| script.context.push_back(Ok(bundle)))
    }

    /// Context with no retrieval matches, which skips the review step.
    pub fn with_empty_context(self) -> Self {
        self.with_context(ContextBundle::default())
    }

    pub fn with_context_failure(self, message: &str) -> Self {
        let message = message.to_string();
        self.push(|script| script.context.push_back(Err(message)))
    }

    pub fn with_generation(self, pair: CandidatePair) -> Self {
        self.push(|script| script.generation.push_back(Ok(pair)))
    }

    pub fn with_generation_failure(self, message: &str) -> Self {
        let message = message.to_string();
        self.push(|script| script.generation.push_back(Err(message)))
    }

    pub fn with_refinement(self, pair: CandidatePair) -> Self {
        self.push(|script| script.refinement.push_back(Ok(pair)))
    }

    pub fn with_refinement_failure(self, message: &str) -> Self {
        let message = message.to_string();
        self.push(|script| script.refinement.push_back(Err(message)))
    }

    pub fn with_receipt(self, receipt: PublishReceipt) -> Self {
        self.push(|script| script.publish.push_back(Ok(receipt)))
    }

    pub fn with_publish_failure(self, message: &str) -> Self {
        let message = message.to_string();
        self.push(|script| script.publish.push_back(Err(message)))
    }

    /// Hold every context fetch until `gate` is notified.
    pub fn with_fetch_gate(mut self, gate: Arc<Notify>) -> Self {
        self.fetch_gate = Some(gate);
        self
    }

    /// Hold every publication until `gate` is notified.
    pub fn with_publish_gate(mut self, gate: Arc<Notify>) -> Self {
        self.publish_gate = Some(gate);
        self
    }

    pub fn services(&self) -> Services {
        Services::from_backend(Arc::new(self.clone()))
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn publish_calls(&self) -> Vec<PublishRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Publish(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn push(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut *self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock poisoned")
    }

    fn answer<T>(
        &self,
        call: Call,
        service: &str,
        queue: impl FnOnce(&mut Script) -> &mut VecDeque<Reply<T>>,
    ) -> Result<T> {
        let mut script = self.lock();
        script.calls.push(call);
        match queue(&mut *script).pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted {service} reply")),
        }
    }
}

#[async_trait]
impl ContextService for ScriptedBackend {
    async fn fetch(&self, form: &FormInput) -> Result<ContextBundle> {
        if let Some(gate) = &self.fetch_gate {
            gate.notified().await;
        }
        let call = Call::Fetch {
            url: form.url.clone(),
        };
        self.answer(call, "context", |script| &mut script.context)
    }
}

#[async_trait]
impl GenerationService for ScriptedBackend {
    async fn generate(&self, _form: &FormInput, context: &ContextBundle) -> Result<CandidatePair> {
        let call = Call::Generate {
            matches: context.retrieval_matches.len(),
        };
        self.answer(call, "generation", |script| &mut script.generation)
    }
}

#[async_trait]
impl RefinementService for ScriptedBackend {
    async fn refine(
        &self,
        selected_text: &str,
        request: &str,
        round: u32,
    ) -> Result<CandidatePair> {
        let call = Call::Refine {
            selected_text: selected_text.to_string(),
            request: request.to_string(),
            round,
        };
        self.answer(call, "refinement", |script| &mut script.refinement)
    }
}

#[async_trait]
impl PublishService for ScriptedBackend {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        if let Some(gate) = &self.publish_gate {
            gate.notified().await;
        }
        self.answer(Call::Publish(request.clone()), "publish", |script| {
            &mut script.publish
        })
    }
}

/// Candidate with counted length, marked valid.
pub fn candidate(text: &str) -> Candidate {
    Candidate::new(text)
}

pub fn pair(a: &str, b: &str) -> CandidatePair {
    CandidatePair {
        a: candidate(a),
        b: candidate(b),
    }
}

/// A complete form: 2024-01-01, `http://x`, decided `buy`.
pub fn scenario_form() -> FormInput {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let mut form = FormInput::dated(date);
    form.url = "http://x".to_string();
    form.decided = "buy".to_string();
    form
}

/// Context with `count` retrieval matches and one similar post.
pub fn context_with_matches(count: usize) -> ContextBundle {
    ContextBundle {
        retrieval_matches: (0..count)
            .map(|idx| json!({"title": format!("match {idx}"), "score": 0.9}))
            .collect(),
        similar_posts: vec![json!({"text": "an older post"})],
        analytics_insights: "short posts perform better".to_string(),
    }
}

pub fn receipt(draft_row: u64, published_row: u64) -> PublishReceipt {
    PublishReceipt {
        draft_row: Some(draft_row),
        published_row: Some(published_row),
    }
}

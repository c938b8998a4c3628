//! Per-user session state for the pipeline.
//!
//! The session owns the current document, transformation config, active
//! predicate, and chat transcript. It is single-writer by design: the
//! calling layer serializes fetches and inference calls, so no locking is
//! needed here. Processed views and projections are always recomputed
//! fresh; they are never a source of truth.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::transform;
use crate::types::{
    ChatReply, ChatTurn, FetchChannel, FetchSuccess, SchemaInferenceResult, TransformationConfig,
};

/// A serialized export: pretty-printed JSON plus the download file name.
#[derive(Debug, Clone)]
pub struct Export {
    pub file_name: String,
    pub json: String,
}

/// Session state for one user.
#[derive(Debug, Default)]
pub struct Session {
    document: Option<Value>,
    channel: Option<FetchChannel>,
    config: TransformationConfig,
    predicate: Option<String>,
    analysis_reasoning: Option<String>,
    transcript: Vec<ChatTurn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new fetch attempt: the document is replaced with absent, and
    /// the predicate and any analysis reasoning are cleared. The
    /// transformation config shape survives (it is typically overwritten by
    /// auto-analysis after the fetch succeeds).
    pub fn begin_fetch(&mut self) {
        self.document = None;
        self.channel = None;
        self.predicate = None;
        self.analysis_reasoning = None;
    }

    /// Install a successfully acquired document.
    pub fn complete_fetch(&mut self, outcome: FetchSuccess) {
        info!(channel = %outcome.channel, "session document replaced");
        self.document = Some(outcome.document);
        self.channel = Some(outcome.channel);
    }

    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }

    /// Which channel produced the current document, for badging only.
    pub fn channel(&self) -> Option<FetchChannel> {
        self.channel
    }

    pub fn config(&self) -> &TransformationConfig {
        &self.config
    }

    /// Wholesale config replacement (manual configuration path).
    pub fn set_config(&mut self, config: TransformationConfig) {
        self.config = config;
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    /// Activate a predicate, fully replacing any previous one.
    pub fn set_predicate(&mut self, source: impl Into<String>) {
        self.predicate = Some(source.into());
    }

    pub fn clear_predicate(&mut self) {
        self.predicate = None;
    }

    pub fn analysis_reasoning(&self) -> Option<&str> {
        self.analysis_reasoning.as_deref()
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Apply a schema-inference result. The proposed config is installed
    /// only when the collaborator actually proposed one; a failure result
    /// (empty fields, reasoning carries the error) leaves the existing
    /// configuration untouched.
    pub fn apply_inference(&mut self, result: &SchemaInferenceResult) {
        if result.has_proposal() {
            self.config = result.config();
        }
        self.analysis_reasoning = Some(result.reasoning.clone());
    }

    /// Record a conversational turn and apply its side effects: a returned
    /// filter replaces the active predicate, a returned config replaces the
    /// transformation config. Either may be absent.
    pub fn apply_chat(&mut self, query: impl Into<String>, reply: ChatReply) {
        if let Some(filter) = &reply.filter_code {
            debug!(filter = %filter, "chat turn activated a predicate");
            self.predicate = Some(filter.clone());
        }
        if let Some(config) = &reply.suggested_config {
            self.config = config.clone();
        }
        self.transcript.push(ChatTurn {
            query: query.into(),
            reply: reply.reply,
            applied_predicate: reply.filter_code,
            applied_config: reply.suggested_config,
        });
    }

    /// The processed view, recomputed fresh from document + config +
    /// predicate. Absent document yields `None`.
    pub fn processed_view(&self) -> Option<Value> {
        self.document
            .as_ref()
            .map(|doc| transform::derive_view(doc, &self.config, self.predicate.as_deref()))
    }

    /// The current projection over the processed view.
    pub fn projection(&self) -> Option<transform::Projection> {
        self.processed_view()
            .map(|view| transform::project(&view, &self.config))
    }

    /// Key-picker candidates from the processed view.
    pub fn available_keys(&self) -> Vec<String> {
        self.processed_view()
            .map(|view| transform::available_keys(&view, &self.config))
            .unwrap_or_default()
    }

    /// Serialize the projection for download as `data_<epoch-ms>.json`.
    pub fn export(&self) -> Option<Export> {
        let projection = self.projection()?;
        let value = projection.to_value();
        let json = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "null".to_string());
        Some(Export {
            file_name: format!("data_{}.json", Utc::now().timestamp_millis()),
            json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetched_session() -> Session {
        let mut session = Session::new();
        session.begin_fetch();
        session.complete_fetch(FetchSuccess {
            document: json!({"data": {"list": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]}}),
            channel: FetchChannel::Direct,
            failures: vec![],
        });
        session.set_config(TransformationConfig::new("data.list", "name", "id"));
        session
    }

    #[test]
    fn fresh_fetch_clears_predicate_but_preserves_config() {
        let mut session = fetched_session();
        session.set_predicate("item => item.id === 2");

        session.begin_fetch();
        assert!(session.document().is_none());
        assert!(session.predicate().is_none());
        assert_eq!(session.config(), &TransformationConfig::new("data.list", "name", "id"));
    }

    #[test]
    fn predicate_replacement_is_wholesale() {
        let mut session = fetched_session();
        session.set_predicate("item => item.id === 1");
        session.set_predicate("item => item.id === 2");

        let view = session.processed_view().unwrap();
        assert_eq!(
            crate::path::resolve(&view, "data.list"),
            Some(&json!([{"id": 2, "name": "B"}]))
        );

        session.clear_predicate();
        assert_eq!(session.processed_view().unwrap(), *session.document().unwrap());
    }

    #[test]
    fn failed_inference_leaves_config_untouched() {
        let mut session = fetched_session();
        session.apply_inference(&SchemaInferenceResult {
            reasoning: "Analysis failed: quota exceeded".to_string(),
            ..SchemaInferenceResult::default()
        });
        assert_eq!(session.config(), &TransformationConfig::new("data.list", "name", "id"));
        assert!(session.analysis_reasoning().unwrap().contains("quota"));
    }

    #[test]
    fn successful_inference_installs_config() {
        let mut session = fetched_session();
        session.apply_inference(&SchemaInferenceResult {
            root_path: "data.list".to_string(),
            label_key: "name".to_string(),
            value_key: "id".to_string(),
            reasoning: "list of named items".to_string(),
        });
        assert_eq!(session.config().label_key, "name");
    }

    #[test]
    fn chat_side_effects_and_transcript() {
        let mut session = fetched_session();
        session.apply_chat(
            "only the second one",
            ChatReply {
                reply: "Filtered to id 2.".to_string(),
                filter_code: Some("item => item.id === 2".to_string()),
                suggested_config: None,
            },
        );

        assert_eq!(session.predicate(), Some("item => item.id === 2"));
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].query, "only the second one");

        // A turn with no side effects beyond the reply text.
        session.apply_chat(
            "what is this data?",
            ChatReply {
                reply: "Institutes.".to_string(),
                ..ChatReply::default()
            },
        );
        assert_eq!(session.predicate(), Some("item => item.id === 2"));
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn export_names_and_serializes_rows() {
        let session = fetched_session();
        let export = session.export().unwrap();
        assert!(export.file_name.starts_with("data_"));
        assert!(export.file_name.ends_with(".json"));

        let rows: Value = serde_json::from_str(&export.json).unwrap();
        assert_eq!(rows, json!([{"label": "A", "value": 1}, {"label": "B", "value": 2}]));
    }

    #[test]
    fn no_document_means_no_view_or_export() {
        let session = Session::new();
        assert!(session.processed_view().is_none());
        assert!(session.export().is_none());
        assert!(session.available_keys().is_empty());
    }
}

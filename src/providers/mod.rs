//! External collaborators used by node executors.
//!
//! The engine only talks to LLMs, databases, knowledge bases, voice services and
//! credential stores through these traits. Embedders plug in their own
//! implementations; [`OpenAiProvider`] covers OpenAI-compatible chat APIs.

mod openai;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NodeExecutionError;

pub use openai::OpenAiProvider;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LlmRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        request: LlmRequest,
    ) -> Result<LlmResponse, NodeExecutionError>;
}

#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Run `query` with positional `params` on the named connection.
    async fn query(
        &self,
        connection_id: &str,
        query: &str,
        params: &[Value],
    ) -> Result<Value, NodeExecutionError>;
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Top `top_k` documents for `query`, best match first.
    async fn search(
        &self,
        knowledge_base_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<Value>, NodeExecutionError>;
}

#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Synthesize `text`; the returned value describes the produced audio.
    async fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<Value, NodeExecutionError>;
}

/// Resolved secret material for outgoing HTTP calls.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    pub headers: HashMap<String, String>,
}

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(
        &self,
        credential_id: &str,
    ) -> Result<Credential, NodeExecutionError>;
}

/// The set of collaborators available to an engine. Any of them may be missing;
/// the registry only registers executors whose collaborator is present.
#[derive(Clone, Default)]
pub struct Providers {
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub database: Option<Arc<dyn DatabaseClient>>,
    pub knowledge_base: Option<Arc<dyn KnowledgeBase>>,
    pub voice: Option<Arc<dyn VoiceProvider>>,
    pub credentials: Option<Arc<dyn CredentialResolver>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(
        mut self,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_database(
        mut self,
        database: Arc<dyn DatabaseClient>,
    ) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_knowledge_base(
        mut self,
        knowledge_base: Arc<dyn KnowledgeBase>,
    ) -> Self {
        self.knowledge_base = Some(knowledge_base);
        self
    }

    pub fn with_voice(
        mut self,
        voice: Arc<dyn VoiceProvider>,
    ) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_credentials(
        mut self,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

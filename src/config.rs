use std::{fs, path::Path};

use serde::Deserialize;

use crate::{FlowError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// number of async worker threads, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
    /// scheduling limits
    pub execution: ExecutionConfig,
    /// store config
    pub store: StoreConfig,
    /// http/websocket gateway
    pub gateway: GatewayConfig,
    /// default llm provider
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// default per-node timeout in milliseconds
    pub node_timeout_ms: u64,
    /// default retry budget for retryable node errors
    pub max_retries: u32,
    /// first retry delay in milliseconds, doubled on every attempt
    pub retry_backoff_ms: u64,
    /// upper bound of a single retry delay
    pub retry_max_backoff_ms: u64,
    /// default `maxIterations` for loop nodes
    pub max_loop_iterations: u32,
    /// new executions are rejected while this many are running
    pub max_running_executions: usize,
    /// finished executions whose event history is kept, oldest pruned first
    pub history_retention: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// store type
    pub store_type: StoreType,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    #[default]
    Mem,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// listen address, e.g. `127.0.0.1:8720`
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// base url of an OpenAI-compatible api
    pub base_url: String,
    /// environment variable holding the api key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// model used when a node does not name one
    pub model: String,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_worker_thread_number: 16,
            execution: ExecutionConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
            llm: None,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            node_timeout_ms: 60_000,
            max_retries: 2,
            retry_backoff_ms: 500,
            retry_max_backoff_ms: 10_000,
            max_loop_iterations: 100,
            max_running_executions: 2048,
            history_retention: 1024,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8720".to_string(),
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| FlowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.async_worker_thread_number == 0 {
            return Err(FlowError::Config("async_worker_thread_number must be at least 1".to_string()));
        }
        if self.execution.max_running_executions == 0 {
            return Err(FlowError::Config("execution.max_running_executions must be at least 1".to_string()));
        }
        if self.execution.retry_max_backoff_ms < self.execution.retry_backoff_ms {
            return Err(FlowError::Config("execution.retry_max_backoff_ms must not be lower than retry_backoff_ms".to_string()));
        }
        Ok(())
    }
}

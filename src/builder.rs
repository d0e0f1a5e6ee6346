use std::sync::Arc;

use tokio::runtime::{Builder, Handle};
use tracing::debug;

use crate::{
    Config, Engine, Result,
    providers::{OpenAiProvider, Providers},
    workflow::executors::NodeRegistry,
};

/// Assembles an [`Engine`].
///
/// The engine runs on the caller's tokio runtime when built inside one, and on
/// a runtime of its own (`async_worker_thread_number` workers) otherwise.
#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    providers: Providers,
    registry: Option<NodeRegistry>,
    runtime: Option<Handle>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn providers(
        mut self,
        providers: Providers,
    ) -> Self {
        self.providers = providers;
        self
    }

    /// Replaces the registry derived from the providers.
    pub fn registry(
        mut self,
        registry: NodeRegistry,
    ) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn runtime(
        mut self,
        runtime: Handle,
    ) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let (handle, owned) = match self.runtime.or_else(|| Handle::try_current().ok()) {
            Some(handle) => (handle, None),
            None => {
                let rt = Builder::new_multi_thread().worker_threads(self.config.async_worker_thread_number.into()).enable_all().build()?;
                (rt.handle().clone(), Some(Arc::new(rt)))
            }
        };

        let mut providers = self.providers;
        if providers.llm.is_none() {
            if let Some(llm) = &self.config.llm {
                debug!(base_url = %llm.base_url, model = %llm.model, "using configured llm provider");
                providers.llm = Some(Arc::new(OpenAiProvider::from_config(llm)));
            }
        }

        let registry = self.registry.unwrap_or_else(|| NodeRegistry::with_providers(&providers));
        Engine::new(self.config, registry, providers, handle, owned)
    }
}

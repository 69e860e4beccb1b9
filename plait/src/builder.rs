use std::sync::Arc;

use anyhow::{anyhow, Result};

use plait_actions::{ActionRegistry, LookupAction, SearchCollection};
use plait_context::ContextStore;
use plait_llm::{ModelInvoker, ModelSelection};
use plait_store::Persister;
use plait_thread::{
    CompletionEngine, CompletionStore, ContextRenderer, FolderTreeSource, ThreadCollection,
    ThreadSettings,
};

/// The assembled runtime: engine plus the stores and registry it drives.
pub struct Plait {
    pub engine: CompletionEngine,
    pub threads: ThreadCollection,
    pub completions: Arc<CompletionStore>,
    pub contexts: Arc<ContextStore>,
    pub actions: Arc<ActionRegistry>,
}

/// Wires the engine and its collaborators. Every dependency is passed in
/// explicitly; the model invoker is the only required one.
pub struct EngineBuilder {
    invoker: Option<Arc<dyn ModelInvoker>>,
    search: Option<Arc<dyn SearchCollection>>,
    persister: Option<Arc<dyn Persister>>,
    folder_source: Option<Arc<dyn FolderTreeSource>>,
    renderer: Option<Arc<dyn ContextRenderer>>,
    default_model: Option<ModelSelection>,
    thread_defaults: ThreadSettings,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            invoker: None,
            search: None,
            persister: None,
            folder_source: None,
            renderer: None,
            default_model: None,
            thread_defaults: ThreadSettings::default(),
        }
    }

    /// Set the model invoker (required).
    pub fn invoker(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Wire a search collection; registers the built-in lookup action.
    pub fn search_collection(mut self, search: Arc<dyn SearchCollection>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn persister(mut self, persister: Arc<dyn Persister>) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn folder_source(mut self, source: Arc<dyn FolderTreeSource>) -> Self {
        self.folder_source = Some(source);
        self
    }

    pub fn context_renderer(mut self, renderer: Arc<dyn ContextRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn default_model(mut self, model: ModelSelection) -> Self {
        self.default_model = Some(model);
        self
    }

    pub fn thread_defaults(mut self, settings: ThreadSettings) -> Self {
        self.thread_defaults = settings;
        self
    }

    pub async fn build(self) -> Result<Plait> {
        let invoker = self.invoker.ok_or_else(|| anyhow!("Model invoker is required"))?;

        let completions = Arc::new(CompletionStore::new());
        let contexts = Arc::new(ContextStore::new());
        let actions = Arc::new(ActionRegistry::new());

        if let Some(search) = self.search {
            actions
                .register(Arc::new(LookupAction::new(search, contexts.clone())))
                .await;
        }

        let mut engine = CompletionEngine::new(
            invoker,
            actions.clone(),
            contexts.clone(),
            completions.clone(),
        );
        if let Some(persister) = self.persister {
            engine = engine.with_persister(persister);
        }
        if let Some(source) = self.folder_source {
            engine = engine.with_folder_source(source);
        }
        if let Some(renderer) = self.renderer {
            engine = engine.with_context_renderer(renderer);
        }
        if let Some(model) = self.default_model {
            engine = engine.with_default_model(model);
        }

        Ok(Plait {
            engine,
            threads: ThreadCollection::with_defaults(self.thread_defaults),
            completions,
            contexts,
            actions,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

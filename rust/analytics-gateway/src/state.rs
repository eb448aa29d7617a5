use crate::{
    config::AppConfig, datamanager::DataManager, llm::CompletionProvider, prompt::PromptService,
    query::QueryEngine, saved::SavedQueries, store::SavedQueryStore,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub query: QueryEngine,
    pub prompts: PromptService,
    pub saved: SavedQueries,
}

impl AppState {
    /// Wires the request services around their external collaborators.
    pub fn new(
        config: Arc<AppConfig>,
        data_manager: Arc<dyn DataManager>,
        completion: Option<Arc<dyn CompletionProvider>>,
        store: Arc<dyn SavedQueryStore>,
    ) -> Self {
        let query = QueryEngine::new(Arc::clone(&data_manager), Arc::clone(&config));
        let prompts = PromptService::new(
            Arc::clone(&data_manager),
            completion,
            Arc::clone(&store),
            config.lake.clone(),
        );
        let saved = SavedQueries::new(store, data_manager, config.lake.customer_id.clone());

        Self {
            config,
            query,
            prompts,
            saved,
        }
    }
}

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::PersistenceSettings;
use crate::error::AppResult;
use crate::services::{ArticleCatalog, Dataset, Recommender, UserRegistry};
use crate::storage::BlobStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Mutable tables. Mutations hold the write guard until they are persisted.
    pub inner: Arc<RwLock<AppStateInner>>,
    /// Click-derived ranking and the prediction model, both read-only
    pub recommender: Arc<Recommender>,
    pub store: Arc<dyn BlobStore>,
    pub persistence: PersistenceSettings,
}

/// Inner state that can be modified
pub struct AppStateInner {
    pub users: UserRegistry,
    pub catalog: ArticleCatalog,
}

impl AppState {
    /// Builds the serving context from already-loaded data
    pub fn from_dataset(
        dataset: Dataset,
        store: Arc<dyn BlobStore>,
        persistence: PersistenceSettings,
    ) -> AppResult<Self> {
        let catalog = ArticleCatalog::new(dataset.articles, dataset.embeddings)?;
        let users = UserRegistry::from_clicks(&dataset.clicks);
        let recommender = Recommender::new(dataset.model, &dataset.clicks);

        tracing::info!(
            users = users.len(),
            articles = catalog.len(),
            popular_articles = recommender.popularity().len(),
            "Serving state ready"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(AppStateInner { users, catalog })),
            recommender: Arc::new(recommender),
            store,
            persistence,
        })
    }

    /// Loads the dataset from the blob store and builds the serving context
    pub async fn load(
        store: Arc<dyn BlobStore>,
        persistence: PersistenceSettings,
    ) -> AppResult<Self> {
        let dataset = Dataset::load(store.as_ref(), persistence.timeout).await?;
        Self::from_dataset(dataset, store, persistence)
    }
}

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::{ArticleTable, ClickRecord, EmbeddingMatrix};
use crate::services::predictor::{Predictor, SvdppModel};
use crate::storage::{
    download_with_timeout, BlobStore, ARTICLES_BLOB, CLICKS_BLOB, EMBEDDINGS_BLOB, MODEL_BLOB,
};

/// Everything the service needs at startup, decoded from the blob store
pub struct Dataset {
    pub model: Arc<dyn Predictor>,
    pub articles: ArticleTable,
    pub embeddings: EmbeddingMatrix,
    pub clicks: Vec<ClickRecord>,
}

impl Dataset {
    /// Downloads the four serving artifacts concurrently and decodes them.
    ///
    /// Reads are not retried; any failure aborts startup.
    pub async fn load(store: &dyn BlobStore, timeout: Duration) -> AppResult<Self> {
        let (model, articles, embeddings, clicks) = tokio::try_join!(
            download_with_timeout(store, MODEL_BLOB, timeout),
            download_with_timeout(store, ARTICLES_BLOB, timeout),
            download_with_timeout(store, EMBEDDINGS_BLOB, timeout),
            download_with_timeout(store, CLICKS_BLOB, timeout),
        )?;

        let dataset = Self {
            model: Arc::new(SvdppModel::decode(&model)?),
            articles: ArticleTable::decode_csv(&articles)?,
            embeddings: EmbeddingMatrix::decode(&embeddings)?,
            clicks: decode_clicks(&clicks)?,
        };

        tracing::info!(
            store = %store.describe(),
            articles = dataset.articles.len(),
            embeddings = dataset.embeddings.len(),
            embedding_dim = dataset.embeddings.dim().unwrap_or(0),
            clicks = dataset.clicks.len(),
            "Dataset loaded"
        );

        Ok(dataset)
    }
}

/// Parses the click log CSV. Columns other than the ones in [`ClickRecord`] are ignored.
pub fn decode_clicks(data: &[u8]) -> AppResult<Vec<ClickRecord>> {
    let mut reader = csv::Reader::from_reader(data);
    reader
        .deserialize::<ClickRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::codec(CLICKS_BLOB, e))
}

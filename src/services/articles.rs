use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;

use crate::config::PersistenceSettings;
use crate::error::{AppError, AppResult};
use crate::models::{Article, ArticleId, ArticleTable, EmbeddingMatrix};
use crate::storage::{upload_with_retry, BlobStore, ARTICLES_BLOB, EMBEDDINGS_BLOB};

/// Article table and embedding matrix, kept row-aligned.
///
/// Both tables only change together through [`ArticleRegistrar`], so
/// `articles().len() == embeddings().len()` holds whenever a caller can see them.
#[derive(Debug, Clone, Default)]
pub struct ArticleCatalog {
    articles: ArticleTable,
    embeddings: EmbeddingMatrix,
}

impl ArticleCatalog {
    pub fn new(articles: ArticleTable, embeddings: EmbeddingMatrix) -> AppResult<Self> {
        if articles.len() != embeddings.len() {
            return Err(AppError::Internal(format!(
                "{} articles but {} embedding rows",
                articles.len(),
                embeddings.len()
            )));
        }
        Ok(Self {
            articles,
            embeddings,
        })
    }

    pub fn articles(&self) -> &ArticleTable {
        &self.articles
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    fn append(&mut self, article: Article, embedding: Vec<f32>) {
        self.articles.push(article);
        self.embeddings.push(embedding);
    }

    fn truncate(&mut self, len: usize) {
        self.articles.truncate(len);
        self.embeddings.truncate(len);
    }
}

/// Body of an add-article request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewArticle {
    pub article_id: Option<ArticleId>,
    #[serde(default)]
    pub category_id: i64,
    #[serde(default)]
    pub publisher_id: i64,
    #[serde(default)]
    pub words_count: i64,
}

/// Validates, appends and persists new articles
pub struct ArticleRegistrar<'a> {
    store: &'a dyn BlobStore,
    settings: PersistenceSettings,
}

impl<'a> ArticleRegistrar<'a> {
    pub fn new(store: &'a dyn BlobStore, settings: PersistenceSettings) -> Self {
        Self { store, settings }
    }

    /// Adds an article with a placeholder embedding cloned from a random existing row.
    ///
    /// Both tables are written to the blob store before this returns. If either
    /// upload fails the in-memory append is undone and a storage error is returned.
    /// Callers must hold exclusive access to `catalog` for the whole call.
    pub async fn add_article(
        &self,
        catalog: &mut ArticleCatalog,
        request: NewArticle,
    ) -> AppResult<Article> {
        let article_id = request.article_id.ok_or_else(|| {
            AppError::InvalidInput("Invalid request: 'article_id' is required.".to_string())
        })?;

        if catalog.articles.contains(article_id) {
            tracing::warn!(article_id, "Article already exists");
            return Err(AppError::AlreadyExists("Article already exists.".to_string()));
        }

        let embedding = catalog
            .embeddings
            .random_row(&mut rand::thread_rng())
            .ok_or_else(|| {
                AppError::Internal(
                    "embedding matrix is empty, no row to use as a placeholder".to_string(),
                )
            })?;

        let article = Article {
            article_id,
            category_id: request.category_id,
            created_at_ts: Utc::now().timestamp_millis(),
            publisher_id: request.publisher_id,
            words_count: request.words_count,
        };

        let previous_len = catalog.len();
        catalog.append(article.clone(), embedding);

        if let Err((e, written)) = self.persist(catalog).await {
            catalog.truncate(previous_len);
            tracing::error!(article_id, error = %e, "Persisting article failed, rolled back");
            self.restore(catalog, &written).await;
            return Err(e);
        }

        tracing::info!(
            article_id,
            articles = catalog.len(),
            "Article added and persisted"
        );
        Ok(article)
    }

    /// Uploads both tables. On failure also returns which blobs were already replaced.
    async fn persist(
        &self,
        catalog: &ArticleCatalog,
    ) -> Result<(), (AppError, Vec<&'static str>)> {
        let embeddings = catalog.embeddings.encode().map_err(|e| (e, Vec::new()))?;
        let articles = catalog.articles.encode_csv().map_err(|e| (e, Vec::new()))?;

        let mut written = Vec::new();
        for (name, data) in [(EMBEDDINGS_BLOB, embeddings), (ARTICLES_BLOB, articles)] {
            let result = upload_with_retry(self.store, name, Bytes::from(data), &self.settings).await;
            if let Err(e) = result {
                return Err((e, written));
            }
            written.push(name);
        }
        Ok(())
    }

    /// Best-effort rewrite of already-replaced blobs from the rolled-back tables
    async fn restore(&self, catalog: &ArticleCatalog, written: &[&'static str]) {
        for &name in written {
            let encoded = if name == EMBEDDINGS_BLOB {
                catalog.embeddings.encode()
            } else {
                catalog.articles.encode_csv()
            };
            let result = match encoded {
                Ok(data) => {
                    upload_with_retry(self.store, name, Bytes::from(data), &self.settings).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => tracing::info!(blob = name, "Restored blob after failed commit"),
                Err(e) => tracing::error!(
                    blob = name,
                    error = %e,
                    "Could not restore blob, durable copy is ahead of memory"
                ),
            }
        }
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ArticleId;
use crate::error::{AppError, AppResult};

/// Article metadata, one row of `articles_metadata.csv`.
///
/// Field order matches the CSV column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub article_id: ArticleId,
    pub category_id: i64,
    /// Creation time in epoch milliseconds
    pub created_at_ts: i64,
    pub publisher_id: i64,
    pub words_count: i64,
}

/// Ordered, append-only article table.
///
/// Row order is insertion order; row `i` lines up with row `i` of the embedding matrix.
#[derive(Debug, Clone, Default)]
pub struct ArticleTable {
    rows: Vec<Article>,
    ids: HashSet<ArticleId>,
}

impl ArticleTable {
    /// Builds a table from rows in order, rejecting duplicate ids
    pub fn from_rows(rows: Vec<Article>) -> AppResult<Self> {
        let mut ids = HashSet::with_capacity(rows.len());
        for article in &rows {
            if !ids.insert(article.article_id) {
                return Err(AppError::codec(
                    crate::storage::ARTICLES_BLOB,
                    format!("duplicate article_id {}", article.article_id),
                ));
            }
        }
        Ok(Self { rows, ids })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, article_id: ArticleId) -> bool {
        self.ids.contains(&article_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Article> {
        self.rows.iter()
    }

    /// Article ids in table order
    pub fn ids(&self) -> impl Iterator<Item = ArticleId> + '_ {
        self.rows.iter().map(|a| a.article_id)
    }

    /// Appends a row. The caller has already checked the id is new.
    pub(crate) fn push(&mut self, article: Article) {
        self.ids.insert(article.article_id);
        self.rows.push(article);
    }

    /// Drops every row past `len`
    pub(crate) fn truncate(&mut self, len: usize) {
        for article in self.rows.drain(len.min(self.rows.len())..) {
            self.ids.remove(&article.article_id);
        }
    }

    /// Parses the CSV artifact (header row required)
    pub fn decode_csv(data: &[u8]) -> AppResult<Self> {
        let mut reader = csv::Reader::from_reader(data);
        let rows = reader
            .deserialize::<Article>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::codec(crate::storage::ARTICLES_BLOB, e))?;
        Self::from_rows(rows)
    }

    /// Serializes the table back to CSV with a header row
    pub fn encode_csv(&self) -> AppResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for article in &self.rows {
            writer
                .serialize(article)
                .map_err(|e| AppError::codec(crate::storage::ARTICLES_BLOB, e))?;
        }
        writer
            .into_inner()
            .map_err(|e| AppError::codec(crate::storage::ARTICLES_BLOB, e))
    }
}

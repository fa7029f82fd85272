use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::storage::EMBEDDINGS_BLOB;

/// Dense article embeddings, one row per article in article-table order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    rows: Vec<Vec<f32>>,
}

impl EmbeddingMatrix {
    /// Builds a matrix, checking every row has the same dimension
    pub fn from_rows(rows: Vec<Vec<f32>>) -> AppResult<Self> {
        if let Some(first) = rows.first() {
            let dim = first.len();
            if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
                return Err(AppError::codec(
                    EMBEDDINGS_BLOB,
                    format!("row {} has {} values, expected {}", index, row.len(), dim),
                ));
            }
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of each row, `None` while the matrix is empty
    pub fn dim(&self) -> Option<usize> {
        self.rows.first().map(Vec::len)
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Copy of a uniformly chosen existing row
    pub fn random_row<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec<f32>> {
        if self.rows.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.rows.len());
        Some(self.rows[index].clone())
    }

    /// Appends a row. The caller guarantees the dimension matches.
    pub(crate) fn push(&mut self, row: Vec<f32>) {
        self.rows.push(row);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    pub fn decode(data: &[u8]) -> AppResult<Self> {
        let matrix: EmbeddingMatrix =
            postcard::from_bytes(data).map_err(|e| AppError::codec(EMBEDDINGS_BLOB, e))?;
        Self::from_rows(matrix.rows)
    }

    pub fn encode(&self) -> AppResult<Vec<u8>> {
        postcard::to_stdvec(self).map_err(|e| AppError::codec(EMBEDDINGS_BLOB, e))
    }
}

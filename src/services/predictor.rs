use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{ArticleId, UserId};
use crate::storage::MODEL_BLOB;

/// Scoring capability of the pre-trained collaborative-filtering model.
///
/// The model is read-only here; it is never retrained by this service.
#[cfg_attr(test, mockall::automock)]
pub trait Predictor: Send + Sync {
    /// Estimated rating of `article_id` by `user_id`
    fn predict(&self, user_id: UserId, article_id: ArticleId) -> f64;
}

/// Latent factors learned for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFactors {
    pub bias: f64,
    pub factors: Vec<f64>,
    /// Items the user interacted with during training (implicit feedback)
    pub rated_items: Vec<ArticleId>,
}

/// Latent factors learned for one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFactors {
    pub bias: f64,
    pub factors: Vec<f64>,
    pub implicit_factors: Vec<f64>,
}

/// SVD++ model parameters as exported by the training pipeline.
///
/// Estimate: `mu + b_u + b_i + q_i . (p_u + |N(u)|^-1/2 * sum(y_j for j in N(u)))`.
/// Terms belonging to an unknown user or item are dropped, and the result is
/// clipped to the rating scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvdppModel {
    pub global_mean: f64,
    pub rating_scale: (f64, f64),
    pub users: HashMap<UserId, UserFactors>,
    pub items: HashMap<ArticleId, ItemFactors>,
    /// `p_u` plus the normalized implicit term, precomputed per user
    #[serde(skip)]
    user_vectors: HashMap<UserId, Vec<f64>>,
}

impl SvdppModel {
    pub fn new(
        global_mean: f64,
        rating_scale: (f64, f64),
        users: HashMap<UserId, UserFactors>,
        items: HashMap<ArticleId, ItemFactors>,
    ) -> AppResult<Self> {
        let mut model = Self {
            global_mean,
            rating_scale,
            users,
            items,
            user_vectors: HashMap::new(),
        };
        model.prepare()?;
        Ok(model)
    }

    pub fn decode(data: &[u8]) -> AppResult<Self> {
        let mut model: SvdppModel =
            postcard::from_bytes(data).map_err(|e| AppError::codec(MODEL_BLOB, e))?;
        model.prepare()?;
        Ok(model)
    }

    pub fn encode(&self) -> AppResult<Vec<u8>> {
        postcard::to_stdvec(self).map_err(|e| AppError::codec(MODEL_BLOB, e))
    }

    fn prepare(&mut self) -> AppResult<()> {
        let (low, high) = self.rating_scale;
        if !(low <= high) {
            return Err(AppError::codec(
                MODEL_BLOB,
                format!("invalid rating scale ({}, {})", low, high),
            ));
        }

        let rank = self
            .users
            .values()
            .map(|u| u.factors.len())
            .chain(self.items.values().map(|i| i.factors.len()))
            .next()
            .unwrap_or(0);

        let ragged_user = self.users.iter().find(|(_, u)| u.factors.len() != rank);
        let ragged_item = self
            .items
            .iter()
            .find(|(_, i)| i.factors.len() != rank || i.implicit_factors.len() != rank);
        if let Some((id, _)) = ragged_user {
            return Err(AppError::codec(
                MODEL_BLOB,
                format!("user {} factors do not have rank {}", id, rank),
            ));
        }
        if let Some((id, _)) = ragged_item {
            return Err(AppError::codec(
                MODEL_BLOB,
                format!("item {} factors do not have rank {}", id, rank),
            ));
        }

        self.user_vectors = self
            .users
            .iter()
            .map(|(&user_id, user)| {
                let mut vector = user.factors.clone();
                let implicit: Vec<&ItemFactors> = user
                    .rated_items
                    .iter()
                    .filter_map(|j| self.items.get(j))
                    .collect();
                if !user.rated_items.is_empty() {
                    let norm = (user.rated_items.len() as f64).sqrt();
                    for item in implicit {
                        for (v, y) in vector.iter_mut().zip(&item.implicit_factors) {
                            *v += y / norm;
                        }
                    }
                }
                (user_id, vector)
            })
            .collect();

        Ok(())
    }
}

impl Predictor for SvdppModel {
    fn predict(&self, user_id: UserId, article_id: ArticleId) -> f64 {
        let user = self.users.get(&user_id);
        let item = self.items.get(&article_id);

        let mut estimate = self.global_mean;
        if let Some(user) = user {
            estimate += user.bias;
        }
        if let Some(item) = item {
            estimate += item.bias;
        }
        if let (Some(vector), Some(item)) = (self.user_vectors.get(&user_id), item) {
            estimate += item
                .factors
                .iter()
                .zip(vector)
                .map(|(q, p)| q * p)
                .sum::<f64>();
        }

        let (low, high) = self.rating_scale;
        estimate.clamp(low, high)
    }
}

use serde::{Deserialize, Serialize, Serializer};

pub mod article;
pub mod embedding;

pub use article::{Article, ArticleTable};
pub use embedding::EmbeddingMatrix;

/// Identifier of a reader
pub type UserId = i64;

/// Identifier of an article
pub type ArticleId = i64;

/// Score text returned in place of an estimate for cold-start recommendations
pub const POPULAR_SCORE_SENTINEL: &str = "N/A (Popular Article)";

/// One row of the historical click log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClickRecord {
    pub user_id: UserId,
    pub click_article_id: ArticleId,
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub click_timestamp: Option<i64>,
}

/// Score attached to a single recommendation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Estimate produced by the prediction model
    Estimated(f64),
    /// No personalized estimate; the article was picked by popularity
    Popular,
}

impl Score {
    pub fn estimate(&self) -> Option<f64> {
        match self {
            Score::Estimated(value) => Some(*value),
            Score::Popular => None,
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::Estimated(value) => serializer.serialize_f64(*value),
            Score::Popular => serializer.serialize_str(POPULAR_SCORE_SENTINEL),
        }
    }
}

/// A single recommended article returned to the client
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Recommendation {
    pub article_id: ArticleId,
    pub title: String,
    pub score: Score,
}

impl Recommendation {
    pub fn new(article_id: ArticleId, score: Score) -> Self {
        Self {
            article_id,
            title: article_title(article_id),
            score,
        }
    }
}

/// Recommendations for one user, ordered best first
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    pub recommendations: Vec<Recommendation>,
}

/// Display title for an article. No title data is stored, so it is derived from the id.
pub fn article_title(article_id: ArticleId) -> String {
    format!("Article {}", article_id)
}

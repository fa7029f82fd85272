use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{ArticleId, ClickRecord, Recommendation, RecommendationResponse, Score, UserId},
    services::{
        articles::ArticleCatalog, popularity::PopularityRanker, predictor::Predictor,
        users::UserRegistry,
    },
};

/// Number of articles returned per request
pub const RECOMMENDATION_COUNT: usize = 5;

/// Parses the raw `user_id` query value
pub fn parse_user_id(raw: Option<&str>) -> AppResult<UserId> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        AppError::InvalidInput("Please provide a user_id in the query string".to_string())
    })?;
    raw.parse::<UserId>()
        .map_err(|_| AppError::InvalidInput("Invalid user_id. Must be an integer.".to_string()))
}

/// Chooses between popularity and collaborative-filtering recommendations.
///
/// Users with no click history get the most popular articles. Everyone else is
/// scored by the prediction model against every article in the catalog.
pub struct Recommender {
    predictor: Arc<dyn Predictor>,
    popularity: PopularityRanker,
    users_with_history: HashSet<UserId>,
}

impl Recommender {
    pub fn new(predictor: Arc<dyn Predictor>, clicks: &[ClickRecord]) -> Self {
        Self {
            predictor,
            popularity: PopularityRanker::from_clicks(clicks),
            users_with_history: clicks.iter().map(|c| c.user_id).collect(),
        }
    }

    pub fn popularity(&self) -> &PopularityRanker {
        &self.popularity
    }

    /// Whether the user appears in the click log
    pub fn has_history(&self, user_id: UserId) -> bool {
        self.users_with_history.contains(&user_id)
    }

    /// Top recommendations for a registered user
    pub fn recommend(
        &self,
        user_id: UserId,
        users: &UserRegistry,
        catalog: &ArticleCatalog,
    ) -> AppResult<RecommendationResponse> {
        if !users.exists(user_id) {
            return Err(AppError::NotFound(
                "User not found. Please add the user first.".to_string(),
            ));
        }

        let recommendations = if self.has_history(user_id) {
            tracing::debug!(user_id, articles = catalog.len(), "Personalized recommendations");
            self.personalized(user_id, catalog)
        } else {
            tracing::debug!(user_id, "Cold start, recommending popular articles");
            self.popular()
        };

        Ok(RecommendationResponse {
            user_id,
            recommendations,
        })
    }

    fn popular(&self) -> Vec<Recommendation> {
        self.popularity
            .top_popular(RECOMMENDATION_COUNT)
            .into_iter()
            .map(|article_id| Recommendation::new(article_id, Score::Popular))
            .collect()
    }

    // Scores the whole catalog on every call; one model call per article.
    fn personalized(&self, user_id: UserId, catalog: &ArticleCatalog) -> Vec<Recommendation> {
        let mut scored: Vec<(ArticleId, f64)> = catalog
            .articles()
            .ids()
            .map(|article_id| (article_id, self.predictor.predict(user_id, article_id)))
            .collect();

        // Stable sort keeps catalog order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(RECOMMENDATION_COUNT)
            .map(|(article_id, score)| Recommendation::new(article_id, Score::Estimated(score)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, ArticleTable, EmbeddingMatrix};
    use crate::services::predictor::MockPredictor;

    fn click(user_id: UserId, article_id: i64) -> ClickRecord {
        ClickRecord {
            user_id,
            click_article_id: article_id,
            session_id: None,
            click_timestamp: None,
        }
    }

    fn catalog(ids: &[i64]) -> ArticleCatalog {
        let rows = ids
            .iter()
            .map(|&article_id| Article {
                article_id,
                category_id: 0,
                created_at_ts: 0,
                publisher_id: 0,
                words_count: 0,
            })
            .collect();
        let embeddings =
            EmbeddingMatrix::from_rows(ids.iter().map(|_| vec![0.0]).collect()).unwrap();
        ArticleCatalog::new(ArticleTable::from_rows(rows).unwrap(), embeddings).unwrap()
    }

    fn clicks() -> Vec<ClickRecord> {
        let mut rows = vec![click(1, 10), click(1, 20), click(2, 20)];
        rows.extend((0..5).map(|_| click(3, 20)));
        rows.extend((0..2).map(|_| click(3, 10)));
        rows.push(click(3, 30));
        rows
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id(Some("42")).unwrap(), 42);
        assert_eq!(parse_user_id(Some(" 7 ")).unwrap(), 7);
        assert!(matches!(parse_user_id(None), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_user_id(Some("")), Err(AppError::InvalidInput(_))));
        assert!(matches!(
            parse_user_id(Some("abc")),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_user_id(Some("1.5")),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let mut predictor = MockPredictor::new();
        predictor.expect_predict().never();
        let recommender = Recommender::new(Arc::new(predictor), &clicks());
        let users = UserRegistry::from_clicks(&clicks());

        let result = recommender.recommend(99, &users, &catalog(&[10, 20]));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_cold_start_returns_popular_with_sentinel() {
        let mut predictor = MockPredictor::new();
        predictor.expect_predict().never();
        let recommender = Recommender::new(Arc::new(predictor), &clicks());
        let mut users = UserRegistry::from_clicks(&clicks());
        users.add_user(42).unwrap();

        let response = recommender
            .recommend(42, &users, &catalog(&[10, 20, 30]))
            .unwrap();

        assert_eq!(response.user_id, 42);
        let ids: Vec<i64> = response.recommendations.iter().map(|r| r.article_id).collect();
        assert_eq!(ids, recommender.popularity().top_popular(RECOMMENDATION_COUNT));
        assert_eq!(ids, vec![20, 10, 30]);
        assert!(response
            .recommendations
            .iter()
            .all(|r| r.score == Score::Popular));
        assert_eq!(response.recommendations[0].title, "Article 20");
    }

    #[test]
    fn test_personalized_top_five_by_score() {
        let mut predictor = MockPredictor::new();
        predictor
            .expect_predict()
            .returning(|_, article_id| (article_id % 7) as f64);
        let recommender = Recommender::new(Arc::new(predictor), &clicks());
        let users = UserRegistry::from_clicks(&clicks());
        let catalog = catalog(&(1..=20).collect::<Vec<_>>());

        let response = recommender.recommend(1, &users, &catalog).unwrap();

        assert_eq!(response.recommendations.len(), RECOMMENDATION_COUNT);
        let scores: Vec<f64> = response
            .recommendations
            .iter()
            .map(|r| r.score.estimate().unwrap())
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(scores[0], 6.0);
        // 6 and 13 score 6; stable order keeps 6 first
        assert_eq!(response.recommendations[0].article_id, 6);
        assert_eq!(response.recommendations[1].article_id, 13);
        assert!(response
            .recommendations
            .iter()
            .all(|r| catalog.articles().contains(r.article_id)));
    }

    #[test]
    fn test_personalized_with_small_catalog() {
        let mut predictor = MockPredictor::new();
        predictor.expect_predict().times(2).returning(|_, _| 3.0);
        let recommender = Recommender::new(Arc::new(predictor), &clicks());
        let users = UserRegistry::from_clicks(&clicks());

        let response = recommender.recommend(2, &users, &catalog(&[10, 20])).unwrap();
        assert_eq!(response.recommendations.len(), 2);
    }

    #[test]
    fn test_recommend_is_repeatable() {
        let mut predictor = MockPredictor::new();
        predictor
            .expect_predict()
            .returning(|user_id, article_id| ((user_id * 31 + article_id) % 11) as f64);
        let recommender = Recommender::new(Arc::new(predictor), &clicks());
        let users = UserRegistry::from_clicks(&clicks());
        let catalog = catalog(&(100..140).collect::<Vec<_>>());

        let first = recommender.recommend(3, &users, &catalog).unwrap();
        let second = recommender.recommend(3, &users, &catalog).unwrap();
        assert_eq!(first, second);
    }
}

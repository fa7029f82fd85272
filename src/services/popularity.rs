use std::collections::HashMap;

use crate::models::{ArticleId, ClickRecord};

/// Global popularity ranking derived from the click log.
///
/// The click log is read-only after load, so the ranking is computed once.
/// Equal click counts are ordered by ascending article id.
#[derive(Debug, Clone, Default)]
pub struct PopularityRanker {
    ranked: Vec<(ArticleId, usize)>,
}

impl PopularityRanker {
    pub fn from_clicks(clicks: &[ClickRecord]) -> Self {
        let mut counts: HashMap<ArticleId, usize> = HashMap::new();
        for click in clicks {
            *counts.entry(click.click_article_id).or_default() += 1;
        }

        let mut ranked: Vec<(ArticleId, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Self { ranked }
    }

    /// The `n` most clicked articles, most clicked first
    pub fn top_popular(&self, n: usize) -> Vec<ArticleId> {
        self.ranked.iter().take(n).map(|(id, _)| *id).collect()
    }

    /// Click count for an article, zero if it was never clicked
    pub fn clicks_for(&self, article_id: ArticleId) -> usize {
        self.ranked
            .iter()
            .find(|(id, _)| *id == article_id)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Number of distinct clicked articles
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clicks(counts: &[(ArticleId, usize)]) -> Vec<ClickRecord> {
        let mut rows = Vec::new();
        let mut user_id = 0;
        for &(article_id, count) in counts {
            for _ in 0..count {
                user_id += 1;
                rows.push(ClickRecord {
                    user_id,
                    click_article_id: article_id,
                    session_id: None,
                    click_timestamp: None,
                });
            }
        }
        rows
    }

    #[test]
    fn test_top_popular_orders_by_click_count() {
        let ranker = PopularityRanker::from_clicks(&clicks(&[(10, 3), (20, 7), (30, 1)]));
        assert_eq!(ranker.top_popular(2), vec![20, 10]);
        assert_eq!(ranker.top_popular(5), vec![20, 10, 30]);
    }

    #[test]
    fn test_empty_click_log() {
        let ranker = PopularityRanker::from_clicks(&[]);
        assert!(ranker.is_empty());
        assert!(ranker.top_popular(5).is_empty());
    }

    #[test]
    fn test_counts_are_non_increasing() {
        let ranker =
            PopularityRanker::from_clicks(&clicks(&[(1, 2), (2, 2), (3, 5), (4, 1), (5, 2)]));
        let top = ranker.top_popular(5);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0], 3);
        let counts: Vec<usize> = top.iter().map(|id| ranker.clicks_for(*id)).collect();
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ranker.clicks_for(99), 0);
    }
}

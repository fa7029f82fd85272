use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::request_id::RequestId;
use crate::models::{Article, ArticleId, RecommendationResponse, UserId};
use crate::services::{recommendations::parse_user_id, ArticleRegistrar, NewArticle};

use super::extract::{ApiJson, ApiQuery};
use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    /// Kept as text so a non-integer value is reported as a 400 with a clear message
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddArticleResponse {
    pub message: String,
    pub article_id: ArticleId,
    pub category_id: i64,
    pub created_at_ts: i64,
    pub publisher_id: i64,
    pub words_count: i64,
}

impl From<Article> for AddArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            message: "Article added successfully.".to_string(),
            article_id: article.article_id,
            category_id: article.category_id,
            created_at_ts: article.created_at_ts,
            publisher_id: article.publisher_id,
            words_count: article.words_count,
        }
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Register a new user
pub async fn add_user(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(request): ApiJson<AddUserRequest>,
) -> AppResult<(StatusCode, String)> {
    let user_id = request.user_id.ok_or_else(|| {
        AppError::InvalidInput("Invalid request: 'user_id' is required.".to_string())
    })?;

    let mut inner = state.inner.write().await;
    if let Err(e) = inner.users.add_user(user_id) {
        tracing::info!(request_id = %request_id, user_id, "User already registered");
        return Err(e);
    }

    tracing::info!(
        request_id = %request_id,
        user_id,
        users = inner.users.len(),
        "User added"
    );

    Ok((
        StatusCode::CREATED,
        format!("User {} added successfully.", user_id),
    ))
}

/// Recommend articles for a user
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiQuery(params): ApiQuery<RecommendQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let user_id = parse_user_id(params.user_id.as_deref())?;

    let inner = state.inner.read().await;
    let response = state
        .recommender
        .recommend(user_id, &inner.users, &inner.catalog)?;

    tracing::info!(
        request_id = %request_id,
        user_id,
        count = response.recommendations.len(),
        cold_start = !state.recommender.has_history(user_id),
        "Recommendations served"
    );

    Ok(Json(response))
}

/// Register a new article with a placeholder embedding
pub async fn add_article(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(request): ApiJson<NewArticle>,
) -> AppResult<(StatusCode, Json<AddArticleResponse>)> {
    tracing::info!(
        request_id = %request_id,
        article_id = ?request.article_id,
        "Processing add article request"
    );

    let mut inner = state.inner.write().await;
    let registrar = ArticleRegistrar::new(state.store.as_ref(), state.persistence);
    let article = registrar.add_article(&mut inner.catalog, request).await?;

    Ok((StatusCode::CREATED, Json(AddArticleResponse::from(article))))
}

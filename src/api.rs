use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    app_state::AppState,
    auth::Viewer,
    error::AppResult,
    models::UserMention,
    services::{
        user_service::{NotificationListView, UserProfileView},
        TweetService, UserService,
    },
    views::{self, FeedPage, TweetDetailView},
};

// Pagination params arrive as raw strings so that garbage values coerce to
// the defaults instead of tripping the extractor's own 400.
#[derive(Deserialize)]
pub struct FeedQuery {
    pub page_number: Option<String>,
    pub surplus: Option<String>,
}

impl FeedQuery {
    fn page_number(&self) -> Option<i64> {
        self.page_number.as_deref().and_then(|v| v.parse().ok())
    }

    fn surplus(&self) -> Option<i64> {
        self.surplus.as_deref().and_then(|v| v.parse().ok())
    }
}

#[derive(Deserialize)]
pub struct CreateTweetRequest {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
    pub user_mention: Option<UserMention>,
}

// GET /api/tweets - public feed, viewer optional
pub async fn list_tweets_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<FeedPage>> {
    let page = views::feed(
        &state.store,
        query.page_number(),
        query.surplus(),
        viewer.user_id(),
    )
    .await?;
    Ok(Json(page))
}

// GET /api/tweets/{id} - detail with two-level comment tree
pub async fn tweet_detail_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> AppResult<Json<TweetDetailView>> {
    let detail = views::tweet_detail(&state.store, id, viewer.user_id()).await?;
    Ok(Json(detail))
}

// POST /api/tweets - private
pub async fn create_tweet_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<CreateTweetRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let actor = viewer.identity()?;
    let content = req.content.as_deref().unwrap_or("");
    TweetService::new(state.store.clone())
        .create_tweet(actor, content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Successfully created a tweet" })),
    ))
}

// POST /api/tweets/{id}/comments - private
pub async fn create_comment_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let actor = viewer.identity()?;
    TweetService::new(state.store.clone())
        .create_comment(actor, id, req.content.as_deref(), req.user_mention)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Successfully created a comment" })),
    ))
}

// PUT /api/tweets/{id}/love - private
pub async fn love_tweet_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let actor = viewer.identity()?;
    TweetService::new(state.store.clone())
        .toggle_love(actor, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/tweets/{id} - private, author only
pub async fn delete_tweet_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let actor = viewer.identity()?;
    TweetService::new(state.store.clone())
        .delete_tweet(actor, id)
        .await?;
    Ok(Json(
        json!({ "message": "Successfully deleted the tweet and its comments" }),
    ))
}

// GET /api/users/{id} - public profile
pub async fn user_profile_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> AppResult<Json<UserProfileView>> {
    let profile = UserService::new(state.store.clone())
        .profile(id, viewer.user_id())
        .await?;
    Ok(Json(profile))
}

// PUT /api/users/{id}/follow - private
pub async fn follow_user_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let actor = viewer.identity()?;
    let following = UserService::new(state.store.clone())
        .toggle_follow(actor, id)
        .await?;
    Ok(Json(json!({ "following": following })))
}

// GET /api/notifications - private, clears the unread counter
pub async fn notifications_handler(
    State(state): State<AppState>,
    viewer: Viewer,
) -> AppResult<Json<NotificationListView>> {
    let actor = viewer.identity()?;
    let list = UserService::new(state.store.clone())
        .notifications(actor)
        .await?;
    Ok(Json(list))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/tweets",
            get(list_tweets_handler).post(create_tweet_handler),
        )
        .route(
            "/api/tweets/{id}",
            get(tweet_detail_handler).delete(delete_tweet_handler),
        )
        .route("/api/tweets/{id}/comments", post(create_comment_handler))
        .route("/api/tweets/{id}/love", put(love_tweet_handler))
        .route("/api/users/{id}", get(user_profile_handler))
        .route("/api/users/{id}/follow", put(follow_user_handler))
        .route("/api/notifications", get(notifications_handler))
        .with_state(state)
}

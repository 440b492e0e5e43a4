use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::{Tweet, UserMention};
use crate::store::{Collection, DocumentStore, Stored};

/// Feed page size, fixed by the API contract.
pub const PAGE_LIMIT: i64 = 10;

/// Public shape of a tweet. `loved` / `can_be_deleted` only exist for an
/// authenticated viewer; `user_mention` only on second-level replies inside a
/// detail view. Redacted fields (the love set itself, author credentials)
/// never appear here.
#[derive(Debug, Clone, Serialize)]
pub struct TweetView {
    pub user_id: i64,
    pub link_to_author: String,
    pub username: String,
    pub content: String,
    pub love_count: usize,
    pub reply_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_be_deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_mention: Option<UserMention>,
}

/// Project a stored tweet for a viewer. `reply_count` comes from the caller
/// because children live behind a parent-id index, not on the record.
pub fn project(tweet: &Stored<Tweet>, reply_count: usize, viewer_id: Option<i64>) -> TweetView {
    let mut view = TweetView {
        user_id: tweet.value.author_id,
        link_to_author: format!("/users/{}", tweet.value.author_id),
        username: tweet.value.author_username.clone(),
        content: tweet.value.content.clone(),
        love_count: tweet.value.love_count(),
        reply_count,
        loved: None,
        can_be_deleted: None,
        user_mention: None,
    };

    if let Some(viewer_id) = viewer_id {
        view.loved = Some(tweet.value.loved_by_users.contains(&viewer_id));
        view.can_be_deleted = Some(tweet.value.author_id == viewer_id);
    }

    view
}

/// A level-1 comment with its own replies attached.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub tweet: TweetView,
    pub comments: Vec<TweetView>,
}

/// Root tweet plus the full two-level comment tree.
#[derive(Debug, Clone, Serialize)]
pub struct TweetDetailView {
    #[serde(flatten)]
    pub tweet: TweetView,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub page_number: i64,
    pub total_page: i64,
    pub tweets: Vec<TweetView>,
}

/// Newest-first page of the tweet collection. `surplus` is an extra skip on
/// top of the page offset, compensating for items the client already holds.
pub async fn feed(
    store: &DocumentStore,
    page_number: Option<i64>,
    surplus: Option<i64>,
    viewer_id: Option<i64>,
) -> AppResult<FeedPage> {
    let page_number = page_number.unwrap_or(1).max(1);
    let surplus = surplus.unwrap_or(0).max(0);
    let skip = (page_number - 1) * PAGE_LIMIT + surplus;

    let total = store.count(Collection::Tweets).await?;
    let total_page = (total + PAGE_LIMIT - 1) / PAGE_LIMIT;

    let rows: Vec<Stored<Tweet>> = store.list(Collection::Tweets, PAGE_LIMIT, skip).await?;
    let mut tweets = Vec::with_capacity(rows.len());
    for row in rows {
        let reply_count = store.count_children(Collection::Tweets, row.id).await?;
        tweets.push(project(&row, reply_count as usize, viewer_id));
    }

    Ok(FeedPage {
        page_number,
        total_page,
        tweets,
    })
}

/// Detail view of one tweet: the root plus its comments and, under each
/// comment, the second-level replies. Ordering at both levels is reply
/// order; the depth guard on creation bounds the walk at two levels.
pub async fn tweet_detail(
    store: &DocumentStore,
    id: i64,
    viewer_id: Option<i64>,
) -> AppResult<TweetDetailView> {
    let root: Stored<Tweet> = store
        .get(Collection::Tweets, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tweet not found".to_string()))?;

    let level1: Vec<Stored<Tweet>> = store.children(Collection::Tweets, id).await?;
    let mut comments = Vec::with_capacity(level1.len());

    for comment in &level1 {
        let level2: Vec<Stored<Tweet>> = store.children(Collection::Tweets, comment.id).await?;
        let replies = level2
            .iter()
            .map(|reply| {
                // depth-2 records cannot have children of their own
                let mut view = project(reply, 0, viewer_id);
                view.user_mention = reply.value.user_mention.clone();
                view
            })
            .collect();

        comments.push(CommentView {
            tweet: project(comment, level2.len(), viewer_id),
            comments: replies,
        });
    }

    Ok(TweetDetailView {
        tweet: project(&root, level1.len(), viewer_id),
        comments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tweet;

    fn stored(tweet: Tweet, id: i64) -> Stored<Tweet> {
        Stored {
            id,
            created_at: 0,
            updated_at: 0,
            value: tweet,
        }
    }

    #[test]
    fn projection_reports_exact_love_count() {
        let mut tweet = Tweet::new(1, "alice", "hello").unwrap();
        tweet.toggle_love(2);
        tweet.toggle_love(3);
        let view = project(&stored(tweet, 10), 4, None);

        assert_eq!(view.love_count, 2);
        assert_eq!(view.reply_count, 4);
        assert_eq!(view.link_to_author, "/users/1");
        assert!(view.loved.is_none());
        assert!(view.can_be_deleted.is_none());
    }

    #[test]
    fn projection_derives_viewer_booleans() {
        let mut tweet = Tweet::new(1, "alice", "hello").unwrap();
        tweet.toggle_love(2);
        let doc = stored(tweet, 10);

        let author = project(&doc, 0, Some(1));
        assert_eq!(author.loved, Some(false));
        assert_eq!(author.can_be_deleted, Some(true));

        let fan = project(&doc, 0, Some(2));
        assert_eq!(fan.loved, Some(true));
        assert_eq!(fan.can_be_deleted, Some(false));
    }

    #[test]
    fn anonymous_view_serializes_without_viewer_fields() {
        let tweet = Tweet::new(1, "alice", "hello").unwrap();
        let value = serde_json::to_value(project(&stored(tweet, 10), 0, None)).unwrap();
        let fields = value.as_object().unwrap();
        assert!(!fields.contains_key("loved"));
        assert!(!fields.contains_key("can_be_deleted"));
        assert!(!fields.contains_key("user_mention"));
        assert!(!fields.contains_key("password_hash"));
    }

    #[tokio::test]
    async fn feed_applies_page_and_surplus_skip() {
        let store = DocumentStore::in_memory().await.unwrap();
        for i in 1..=25 {
            store
                .create(
                    Collection::Tweets,
                    Tweet::new(1, "alice", &format!("t{}", i)).unwrap(),
                )
                .await
                .unwrap();
        }

        // skip (2-1)*10 + 3 = 13, so ranks 14..=23 by recency: t12 down to t3
        let page = feed(&store, Some(2), Some(3), None).await.unwrap();
        assert_eq!(page.page_number, 2);
        assert_eq!(page.total_page, 3);
        let contents: Vec<_> = page.tweets.iter().map(|t| t.content.as_str()).collect();
        let expected: Vec<String> = (3..=12).rev().map(|i| format!("t{}", i)).collect();
        assert_eq!(contents, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn feed_floors_page_and_surplus() {
        let store = DocumentStore::in_memory().await.unwrap();
        for i in 0..3 {
            store
                .create(
                    Collection::Tweets,
                    Tweet::new(1, "alice", &format!("t{}", i)).unwrap(),
                )
                .await
                .unwrap();
        }

        let page = feed(&store, Some(-5), Some(-2), None).await.unwrap();
        assert_eq!(page.page_number, 1);
        assert_eq!(page.tweets.len(), 3);
        assert_eq!(page.total_page, 1);
    }

    #[tokio::test]
    async fn detail_builds_two_level_tree_with_mentions() {
        let store = DocumentStore::in_memory().await.unwrap();
        let root = store
            .create(Collection::Tweets, Tweet::new(1, "alice", "root").unwrap())
            .await
            .unwrap();
        let c1 = store
            .create(
                Collection::Tweets,
                Tweet::reply(2, "bob", "first", &root, None).unwrap(),
            )
            .await
            .unwrap();
        let mention = UserMention {
            user_id: 2,
            username: "bob".to_string(),
        };
        store
            .create(
                Collection::Tweets,
                Tweet::reply(1, "alice", "deep", &c1, Some(mention.clone())).unwrap(),
            )
            .await
            .unwrap();
        store
            .create(
                Collection::Tweets,
                Tweet::reply(3, "dave", "second", &root, None).unwrap(),
            )
            .await
            .unwrap();

        let detail = tweet_detail(&store, root.id, None).await.unwrap();
        assert_eq!(detail.tweet.reply_count, 2);
        assert_eq!(detail.comments.len(), 2);
        assert_eq!(detail.comments[0].tweet.content, "first");
        assert_eq!(detail.comments[1].tweet.content, "second");

        let replies = &detail.comments[0].comments;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, "deep");
        assert_eq!(replies[0].user_mention, Some(mention));
        // mentions never leak onto level-1 views
        assert!(detail.comments[0].tweet.user_mention.is_none());
    }

    #[tokio::test]
    async fn detail_of_missing_tweet_is_not_found() {
        let store = DocumentStore::in_memory().await.unwrap();
        assert!(matches!(
            tweet_detail(&store, 404, None).await,
            Err(AppError::NotFound(_))
        ));
    }
}

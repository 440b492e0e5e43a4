use std::sync::Arc;

use crate::auth::Identity;
use crate::error::{AppError, AppResult};
use crate::models::{NotificationAction, Tweet, User, UserMention};
use crate::services::NotificationFanout;
use crate::store::{Collection, DocumentStore, Stored};

/// Tweet mutation service: create, comment, love, delete. Reads go through
/// `views`; this module owns every write against the tweet collection.
pub struct TweetService {
    store: Arc<DocumentStore>,
}

impl TweetService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        TweetService { store }
    }

    /// Create a root tweet, record it on the author, and fan a "made a new
    /// tweet" notification out to every follower. Fan-out failures never
    /// undo the tweet itself.
    pub async fn create_tweet(&self, actor: &Identity, content: &str) -> AppResult<i64> {
        let tweet = Tweet::new(actor.user_id, &actor.username, content)?;
        let created = self.store.create(Collection::Tweets, tweet).await?;

        let mut author = self.require_user(actor.user_id).await?;
        author.value.tweets.push(created.id);
        self.store.save(&author).await?;

        let link = format!("/tweets/{}", created.id);
        let mut fanout = NotificationFanout::new(&self.store);
        for follower_id in &author.value.followers {
            fanout.enqueue(*follower_id, NotificationAction::NewTweet, link.clone());
        }
        fanout.drain().await;

        Ok(created.id)
    }

    /// Reply to a tweet or to a first-level comment. The parent's author is
    /// told about the reply unless they wrote it themselves.
    pub async fn create_comment(
        &self,
        actor: &Identity,
        parent_id: i64,
        content: Option<&str>,
        user_mention: Option<UserMention>,
    ) -> AppResult<i64> {
        let content = match content {
            Some(content) if !content.is_empty() => content,
            _ => return Err(AppError::BadRequest("Missing content field".to_string())),
        };

        let parent = self.require_tweet(parent_id).await?;
        let comment = Tweet::reply(actor.user_id, &actor.username, content, &parent, user_mention)?;
        let created = self.store.create(Collection::Tweets, comment).await?;

        if parent.value.author_id != actor.user_id {
            let action = if parent.value.is_comment() {
                NotificationAction::Replied
            } else {
                NotificationAction::Commented
            };
            let mut fanout = NotificationFanout::new(&self.store);
            fanout.enqueue(
                parent.value.author_id,
                action,
                format!("/tweets/{}", parent.id),
            );
            fanout.drain().await;
        }

        Ok(created.id)
    }

    /// Flip the actor's love on a tweet. Turning it on notifies the author.
    /// Returns whether the tweet is loved after the call.
    pub async fn toggle_love(&self, actor: &Identity, tweet_id: i64) -> AppResult<bool> {
        let mut tweet = self.require_tweet(tweet_id).await?;
        let now_loved = tweet.value.toggle_love(actor.user_id);
        self.store.save(&tweet).await?;

        if now_loved && tweet.value.author_id != actor.user_id {
            let mut fanout = NotificationFanout::new(&self.store);
            fanout.enqueue(
                tweet.value.author_id,
                NotificationAction::LovedTweet,
                format!("/tweets/{}", tweet_id),
            );
            fanout.drain().await;
        }

        Ok(now_loved)
    }

    /// Delete a tweet and its whole reply lineage, children before parents so
    /// no child ever dangles. Best effort: a failure mid-cascade leaves the
    /// already-deleted records gone.
    pub async fn delete_tweet(&self, actor: &Identity, tweet_id: i64) -> AppResult<()> {
        let tweet = self.require_tweet(tweet_id).await?;
        if tweet.value.author_id != actor.user_id {
            return Err(AppError::Unauthorized(
                "Only the author can delete this tweet".to_string(),
            ));
        }

        let level1: Vec<Stored<Tweet>> =
            self.store.children(Collection::Tweets, tweet_id).await?;
        for comment in level1 {
            let level2: Vec<Stored<Tweet>> =
                self.store.children(Collection::Tweets, comment.id).await?;
            for reply in level2 {
                self.store.delete(reply.id).await?;
            }
            self.store.delete(comment.id).await?;
        }
        self.store.delete(tweet_id).await?;

        Ok(())
    }

    async fn require_tweet(&self, id: i64) -> AppResult<Stored<Tweet>> {
        self.store
            .get(Collection::Tweets, id)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid id or tweet not found".to_string()))
    }

    async fn require_user(&self, id: i64) -> AppResult<Stored<User>> {
        self.store
            .get(Collection::Users, id)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid user ID or user not found".to_string()))
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};

// 4-15 chars of [a-zA-Z0-9._], no leading/trailing or doubled separators.
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9]|[._][a-zA-Z0-9]){3,14}$")
        .unwrap_or_else(|e| panic!("invalid username regex: {}", e))
});

/// An account record. `password_hash` is stored at rest and never reaches any
/// projected view; hashing itself happens in the registration collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub tweets: Vec<i64>,
    #[serde(default)]
    pub followers: BTreeSet<i64>,
    #[serde(default)]
    pub following_count: i64,
    #[serde(default)]
    pub notifications: Vec<i64>,
    #[serde(default)]
    pub new_notification_count: i64,
}

impl User {
    pub fn new(username: &str, password_hash: &str) -> AppResult<Self> {
        if !Self::valid_username(username) {
            return Err(AppError::BadRequest("Invalid username".to_string()));
        }
        Ok(User {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            tweets: Vec::new(),
            followers: BTreeSet::new(),
            following_count: 0,
            notifications: Vec::new(),
            new_notification_count: 0,
        })
    }

    pub fn valid_username(username: &str) -> bool {
        username.len() <= 15 && USERNAME_RE.is_match(username)
    }

    /// Flip `follower_id`'s membership in this user's follower set. Returns
    /// true when the follow is active after the call.
    pub fn toggle_follower(&mut self, follower_id: i64) -> bool {
        if self.followers.remove(&follower_id) {
            false
        } else {
            self.followers.insert(follower_id);
            true
        }
    }

    pub fn follower_count(&self) -> usize {
        self.followers.len()
    }

    pub fn tweet_count(&self) -> usize {
        self.tweets.len()
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::store::Stored;

/// Back-reference to the user a reply is directed at. Only ever set on
/// second-level replies and carried verbatim from the client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMention {
    pub user_id: i64,
    pub username: String,
}

/// A tweet or a reply. Replies are the same record type with `depth > 0`;
/// `depth` is capped at [`Tweet::MAX_DEPTH`] so threads never nest further
/// than reply-to-reply. Children are found by `parent_id` lookup rather than
/// an embedded id list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_mention: Option<UserMention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub depth: u8,
    #[serde(default)]
    pub loved_by_users: BTreeSet<i64>,
}

impl Tweet {
    pub const MAX_CONTENT_CHARS: usize = 280;
    pub const MAX_DEPTH: u8 = 2;

    /// A new root tweet (depth 0, no parent).
    pub fn new(author_id: i64, author_username: &str, content: &str) -> AppResult<Self> {
        Self::validate_content(content)?;
        Ok(Tweet {
            author_id,
            author_username: author_username.to_string(),
            content: content.to_string(),
            user_mention: None,
            parent_id: None,
            depth: 0,
            loved_by_users: BTreeSet::new(),
        })
    }

    /// A reply under `parent`. Rejected when the parent already sits at the
    /// maximum nesting depth.
    pub fn reply(
        author_id: i64,
        author_username: &str,
        content: &str,
        parent: &Stored<Tweet>,
        user_mention: Option<UserMention>,
    ) -> AppResult<Self> {
        Self::validate_content(content)?;
        if !parent.value.accepts_replies() {
            return Err(AppError::BadRequest(
                "Only two levels of comments are allowed".to_string(),
            ));
        }
        Ok(Tweet {
            author_id,
            author_username: author_username.to_string(),
            content: content.to_string(),
            user_mention,
            parent_id: Some(parent.id),
            depth: parent.value.depth + 1,
            loved_by_users: BTreeSet::new(),
        })
    }

    fn validate_content(content: &str) -> AppResult<()> {
        if content.is_empty() {
            return Err(AppError::BadRequest("Missing content field".to_string()));
        }
        if content.chars().count() > Self::MAX_CONTENT_CHARS {
            return Err(AppError::BadRequest(format!(
                "Content must be at most {} characters",
                Self::MAX_CONTENT_CHARS
            )));
        }
        Ok(())
    }

    pub fn is_comment(&self) -> bool {
        self.depth > 0
    }

    pub fn accepts_replies(&self) -> bool {
        self.depth < Self::MAX_DEPTH
    }

    /// Flip the viewer's membership in the love set. Returns true when the
    /// tweet is loved after the call.
    pub fn toggle_love(&mut self, user_id: i64) -> bool {
        if self.loved_by_users.remove(&user_id) {
            false
        } else {
            self.loved_by_users.insert(user_id);
            true
        }
    }

    pub fn love_count(&self) -> usize {
        self.loved_by_users.len()
    }
}

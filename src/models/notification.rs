use serde::{Deserialize, Serialize};

/// The fixed set of activity strings a notification can carry. Serialized
/// as the exact wire phrases the frontend renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationAction {
    #[serde(rename = "made a new tweet")]
    NewTweet,
    #[serde(rename = "like your tweet")]
    LovedTweet,
    #[serde(rename = "is following you")]
    Following,
    #[serde(rename = "commented on your tweet")]
    Commented,
    #[serde(rename = "replied to your comment")]
    Replied,
}

/// One activity entry, created by fan-out or a direct reaction and immutable
/// afterwards. `user_name` is the recipient; `link` points at the entity
/// that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user_name: String,
    pub action: NotificationAction,
    pub link: String,
}

impl Notification {
    pub fn new(user_name: &str, action: NotificationAction, link: String) -> Self {
        Notification {
            user_name: user_name.to_string(),
            action,
            link,
        }
    }
}

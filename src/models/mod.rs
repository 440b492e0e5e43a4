pub mod notification;
pub mod tweet;
pub mod user;

pub use notification::{Notification, NotificationAction};
pub use tweet::{Tweet, UserMention};
pub use user::User;

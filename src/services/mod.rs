pub mod fanout;
pub mod tweet_service;
pub mod user_service;

pub use fanout::NotificationFanout;
pub use tweet_service::TweetService;
pub use user_service::UserService;

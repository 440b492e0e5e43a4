use serde::Serialize;
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::{AppError, AppResult};
use crate::models::{Notification, NotificationAction, User};
use crate::services::NotificationFanout;
use crate::store::{Collection, DocumentStore, Stored};

/// Public profile shape: counts only, never credentials. `is_following` is
/// viewer-relative and absent for anonymous requests.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfileView {
    pub user_id: i64,
    pub username: String,
    pub tweet_count: usize,
    pub follower_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationListView {
    pub new_notification_count: i64,
    pub notifications: Vec<Notification>,
}

/// Follow/profile/notification operations on the user collection.
pub struct UserService {
    store: Arc<DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        UserService { store }
    }

    /// Toggle the actor's follow on `target_id`, mirroring love semantics:
    /// membership lives on the target, the running count on the actor.
    /// Turning the follow on notifies the target. Returns whether the follow
    /// is active after the call.
    pub async fn toggle_follow(&self, actor: &Identity, target_id: i64) -> AppResult<bool> {
        if target_id == actor.user_id {
            return Err(AppError::BadRequest(
                "Cannot follow yourself".to_string(),
            ));
        }

        let mut target = self.require_user(target_id).await?;
        let now_following = target.value.toggle_follower(actor.user_id);
        self.store.save(&target).await?;

        let mut follower = self.require_user(actor.user_id).await?;
        if now_following {
            follower.value.following_count += 1;
        } else {
            follower.value.following_count = (follower.value.following_count - 1).max(0);
        }
        self.store.save(&follower).await?;

        if now_following {
            let mut fanout = NotificationFanout::new(&self.store);
            fanout.enqueue(
                target_id,
                NotificationAction::Following,
                format!("/users/{}", actor.user_id),
            );
            fanout.drain().await;
        }

        Ok(now_following)
    }

    pub async fn profile(&self, user_id: i64, viewer_id: Option<i64>) -> AppResult<UserProfileView> {
        let user = self.require_user(user_id).await?;
        Ok(UserProfileView {
            user_id: user.id,
            username: user.value.username.clone(),
            tweet_count: user.value.tweet_count(),
            follower_count: user.value.follower_count(),
            is_following: viewer_id.map(|id| user.value.followers.contains(&id)),
        })
    }

    /// The viewer's notifications in append order. Reading them resets the
    /// unread counter; the response carries the pre-reset count.
    pub async fn notifications(&self, actor: &Identity) -> AppResult<NotificationListView> {
        let mut user = self.require_user(actor.user_id).await?;

        let mut notifications = Vec::with_capacity(user.value.notifications.len());
        for id in &user.value.notifications {
            if let Some(doc) = self
                .store
                .get::<Notification>(Collection::Notifications, *id)
                .await?
            {
                notifications.push(doc.value);
            }
        }

        let new_notification_count = user.value.new_notification_count;
        if new_notification_count != 0 {
            user.value.new_notification_count = 0;
            self.store.save(&user).await?;
        }

        Ok(NotificationListView {
            new_notification_count,
            notifications,
        })
    }

    async fn require_user(&self, id: i64) -> AppResult<Stored<User>> {
        self.store
            .get(Collection::Users, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Arc<DocumentStore>, UserService) {
        let store = Arc::new(DocumentStore::in_memory().await.unwrap());
        (store.clone(), UserService::new(store))
    }

    async fn make_user(store: &DocumentStore, name: &str) -> Identity {
        let doc = store
            .create(Collection::Users, User::new(name, "hash").unwrap())
            .await
            .unwrap();
        Identity {
            user_id: doc.id,
            username: name.to_string(),
        }
    }

    #[tokio::test]
    async fn follow_toggle_mirrors_love_semantics() {
        let (store, service) = setup().await;
        let alice = make_user(&store, "alice").await;
        let bob = make_user(&store, "bob_1").await;

        assert!(service.toggle_follow(&alice, bob.user_id).await.unwrap());
        let target = store
            .get::<User>(Collection::Users, bob.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(target.value.followers.contains(&alice.user_id));
        assert_eq!(target.value.new_notification_count, 1);
        let actor = store
            .get::<User>(Collection::Users, alice.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(actor.value.following_count, 1);

        // second toggle unfollows and does not notify again
        assert!(!service.toggle_follow(&alice, bob.user_id).await.unwrap());
        let target = store
            .get::<User>(Collection::Users, bob.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(target.value.followers.is_empty());
        assert_eq!(target.value.new_notification_count, 1);
        let actor = store
            .get::<User>(Collection::Users, alice.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(actor.value.following_count, 0);
    }

    #[tokio::test]
    async fn follow_rejects_missing_target_and_self() {
        let (store, service) = setup().await;
        let alice = make_user(&store, "alice").await;

        assert!(matches!(
            service.toggle_follow(&alice, 9999).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.toggle_follow(&alice, alice.user_id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn profile_counts_and_viewer_relative_follow() {
        let (store, service) = setup().await;
        let alice = make_user(&store, "alice").await;
        let bob = make_user(&store, "bob_1").await;
        service.toggle_follow(&bob, alice.user_id).await.unwrap();

        let anonymous = service.profile(alice.user_id, None).await.unwrap();
        assert_eq!(anonymous.username, "alice");
        assert_eq!(anonymous.follower_count, 1);
        assert!(anonymous.is_following.is_none());

        let seen_by_bob = service
            .profile(alice.user_id, Some(bob.user_id))
            .await
            .unwrap();
        assert_eq!(seen_by_bob.is_following, Some(true));

        assert!(matches!(
            service.profile(9999, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reading_notifications_resets_unread_counter() {
        let (store, service) = setup().await;
        let alice = make_user(&store, "alice").await;
        let bob = make_user(&store, "bob_1").await;
        service.toggle_follow(&bob, alice.user_id).await.unwrap();

        let list = service.notifications(&alice).await.unwrap();
        assert_eq!(list.new_notification_count, 1);
        assert_eq!(list.notifications.len(), 1);
        assert_eq!(list.notifications[0].action, NotificationAction::Following);
        assert_eq!(
            list.notifications[0].link,
            format!("/users/{}", bob.user_id)
        );

        let list = service.notifications(&alice).await.unwrap();
        assert_eq!(list.new_notification_count, 0);
        assert_eq!(list.notifications.len(), 1);
    }
}

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use std::sync::Arc;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::store::{Collection, DocumentStore};

/// A verified acting user, resolved from the request's bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// Per-request viewer context. Public routes accept either variant; private
/// routes call [`Viewer::identity`] and fail with 401 when anonymous.
#[derive(Debug, Clone)]
pub enum Viewer {
    Anonymous,
    User(Identity),
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(identity) => Some(identity.user_id),
        }
    }

    pub fn identity(&self) -> AppResult<&Identity> {
        match self {
            Viewer::Anonymous => Err(AppError::Unauthenticated(
                "User is not authorized".to_string(),
            )),
            Viewer::User(identity) => Ok(identity),
        }
    }
}

/// Token verification collaborator. The service only depends on this trait;
/// swapping in a real JWT or session verifier is a one-struct change.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to an identity. `Ok(None)` means the token is
    /// unknown or stale and the request proceeds anonymously.
    async fn verify(&self, token: &str) -> AppResult<Option<Identity>>;
}

/// Development-grade provider: the token is the user's document id, checked
/// against the store so deleted accounts stop resolving.
pub struct StoreIdentityProvider {
    store: Arc<DocumentStore>,
}

impl StoreIdentityProvider {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        StoreIdentityProvider { store }
    }
}

#[async_trait]
impl IdentityProvider for StoreIdentityProvider {
    async fn verify(&self, token: &str) -> AppResult<Option<Identity>> {
        let Ok(user_id) = token.parse::<i64>() else {
            return Ok(None);
        };
        let user: Option<_> = self.store.get::<User>(Collection::Users, user_id).await?;
        Ok(user.map(|doc| Identity {
            user_id: doc.id,
            username: doc.value.username,
        }))
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        let Some(header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Viewer::Anonymous);
        };
        let value = header
            .to_str()
            .map_err(|_| AppError::BadRequest("Malformed authorization header".to_string()))?;
        let Some(token) = value.strip_prefix("Bearer ") else {
            return Ok(Viewer::Anonymous);
        };
        match state.auth.verify(token).await? {
            Some(identity) => Ok(Viewer::User(identity)),
            None => Ok(Viewer::Anonymous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_viewer_is_rejected_by_identity() {
        let viewer = Viewer::Anonymous;
        assert!(viewer.user_id().is_none());
        assert!(matches!(
            viewer.identity(),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn store_provider_resolves_known_users_only() {
        let store = Arc::new(DocumentStore::in_memory().await.unwrap());
        let alice = store
            .create(Collection::Users, User::new("alice", "hash").unwrap())
            .await
            .unwrap();

        let provider = StoreIdentityProvider::new(store);
        let identity = provider
            .verify(&alice.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.user_id, alice.id);
        assert_eq!(identity.username, "alice");

        assert!(provider.verify("999").await.unwrap().is_none());
        assert!(provider.verify("not-a-token").await.unwrap().is_none());
    }
}

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        google::ProviderProfile,
        jwt::JwtKeys,
        password::{burn_verification, hash_password, verify_password},
    },
    errors::ApiError,
    users::{
        repo::{StoreError, UniqueField, UserStore},
        repo_types::{NewUser, PublicUser, User},
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Signs a fresh token for `user` and pairs it with the public profile.
pub fn issue_token(keys: &JwtKeys, user: &User) -> Result<AuthResponse, ApiError> {
    let token = keys
        .sign(user)
        .map_err(ApiError::internal("Error generating token"))?;
    Ok(AuthResponse {
        token,
        user: PublicUser::from(user),
    })
}

pub async fn register(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: RegisterRequest,
) -> Result<AuthResponse, ApiError> {
    let email = normalize_email(&req.email);
    let name = req.name.trim().to_string();

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    if store.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let password_hash =
        hash_password(&req.password).map_err(ApiError::internal("Error creating user"))?;

    // a concurrent registration can still win between lookup and insert;
    // the unique index turns that into the same conflict
    let user = store
        .create(NewUser {
            email: Some(email),
            password_hash: Some(password_hash),
            name,
            ..Default::default()
        })
        .await?;

    info!(user_id = %user.id, "user registered");
    issue_token(keys, &user)
}

pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<AuthResponse, ApiError> {
    let email = normalize_email(&req.email);
    let invalid = || ApiError::unauthorized("Invalid credentials");

    let user = store
        .find_by_email(&email)
        .await
        .map_err(|e| match e {
            StoreError::Other(source) => ApiError::Internal {
                message: "Error logging in",
                source,
            },
            other => other.into(),
        })?;

    let Some(user) = user else {
        burn_verification(&req.password);
        warn!(%email, "login unknown email");
        return Err(invalid());
    };

    let Some(hash) = user.password_hash.as_deref() else {
        burn_verification(&req.password);
        warn!(user_id = %user.id, "login attempt on oauth-only account");
        return Err(invalid());
    };

    let ok = verify_password(&req.password, hash).map_err(ApiError::internal("Error logging in"))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    issue_token(keys, &user)
}

/// Maps a provider identity onto a local user, creating it on first sight.
///
/// Lookup is by provider id. Creation relies on the store's unique indexes:
/// losing a race on the provider id re-reads the winner, and an email that
/// already belongs to a local account is linked when the provider vouches
/// for it.
pub async fn find_or_create_google_user(
    store: &dyn UserStore,
    profile: &ProviderProfile,
) -> Result<User, ApiError> {
    if let Some(user) = store.find_by_google_id(&profile.id).await? {
        return Ok(user);
    }

    let new = NewUser {
        email: profile.email.clone(),
        google_id: Some(profile.id.clone()),
        password_hash: None,
        name: profile.name.clone().unwrap_or_default(),
        avatar: profile.avatar.clone(),
    };

    match store.create(new).await {
        Ok(user) => {
            info!(user_id = %user.id, "user created from google profile");
            Ok(user)
        }
        Err(StoreError::Conflict(UniqueField::GoogleId)) => refetch_google_user(store, profile).await,
        Err(StoreError::Conflict(UniqueField::Email)) => link_existing_account(store, profile).await,
        Err(e) => Err(e.into()),
    }
}

async fn refetch_google_user(
    store: &dyn UserStore,
    profile: &ProviderProfile,
) -> Result<User, ApiError> {
    store
        .find_by_google_id(&profile.id)
        .await?
        .ok_or_else(|| ApiError::Internal {
            message: "Error creating user",
            source: anyhow::anyhow!("google id conflicted but no user holds it"),
        })
}

async fn link_existing_account(
    store: &dyn UserStore,
    profile: &ProviderProfile,
) -> Result<User, ApiError> {
    let conflict = || ApiError::Conflict("An account with this email already exists".into());

    if !profile.email_verified {
        warn!("google email unverified, refusing to link");
        return Err(conflict());
    }
    let Some(email) = profile.email.as_deref() else {
        return Err(conflict());
    };
    let Some(existing) = store.find_by_email(email).await? else {
        return Err(conflict());
    };
    if existing.google_id.is_some() {
        return Err(conflict());
    }

    match store
        .link_google_id(existing.id, &profile.id, profile.avatar.as_deref())
        .await
    {
        Ok(Some(user)) => {
            info!(user_id = %user.id, "google identity linked to existing account");
            Ok(user)
        }
        Ok(None) | Err(StoreError::Conflict(UniqueField::GoogleId)) => {
            refetch_google_user(store, profile).await
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::JwtConfig,
        users::{memory::MemoryUserStore, repo_types::ProfileUpdate},
    };

    /// Store whose first lookups answer from before a competing callback
    /// committed: `find_by_google_id` misses once and `find_by_email` returns
    /// the row without its Google id once.
    struct LaggingStore {
        inner: MemoryUserStore,
        miss_google_id: AtomicBool,
        stale_email: AtomicBool,
    }

    impl LaggingStore {
        fn new(inner: MemoryUserStore) -> Self {
            Self {
                inner,
                miss_google_id: AtomicBool::new(true),
                stale_email: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl UserStore for LaggingStore {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            let found = self.inner.find_by_email(email).await?;
            if self.stale_email.swap(false, Ordering::SeqCst) {
                return Ok(found.map(|u| User {
                    google_id: None,
                    ..u
                }));
            }
            Ok(found)
        }

        async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
            if self.miss_google_id.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_google_id(google_id).await
        }

        async fn create(&self, new: NewUser) -> Result<User, StoreError> {
            self.inner.create(new).await
        }

        async fn link_google_id(
            &self,
            id: Uuid,
            google_id: &str,
            avatar: Option<&str>,
        ) -> Result<Option<User>, StoreError> {
            self.inner.link_google_id(id, google_id, avatar).await
        }

        async fn update_profile(
            &self,
            id: Uuid,
            update: ProfileUpdate,
        ) -> Result<Option<User>, StoreError> {
            self.inner.update_profile(id, update).await
        }
    }

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test".into(),
            issuer: "test".into(),
            audience: "test".into(),
        })
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            name: "A".into(),
        }
    }

    fn profile(id: &str, email: &str, verified: bool) -> ProviderProfile {
        ProviderProfile {
            id: id.into(),
            email: Some(email.into()),
            email_verified: verified,
            name: Some("Google User".into()),
            avatar: Some("https://img/g.png".into()),
        }
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
    }

    #[tokio::test]
    async fn second_registration_conflicts() {
        let store = MemoryUserStore::new();
        register(&store, &keys(), register_req("a@x.com", "secret1"))
            .await
            .expect("first");
        let err = register(&store, &keys(), register_req(" A@X.com ", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let store = MemoryUserStore::new();
        for req in [
            register_req("nope", "secret1"),
            register_req("a@x.com", "short"),
            RegisterRequest {
                name: "  ".into(),
                ..register_req("a@x.com", "secret1")
            },
        ] {
            let err = register(&store, &keys(), req).await.unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn login_token_matches_stored_user() {
        let store = MemoryUserStore::new();
        let keys = keys();
        register(&store, &keys, register_req("a@x.com", "secret1"))
            .await
            .unwrap();
        let resp = login(
            &store,
            &keys,
            LoginRequest {
                email: "a@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .expect("login");

        let stored = store.find_by_email("a@x.com").await.unwrap().unwrap();
        let claims = keys.verify(&resp.token).unwrap();
        assert_eq!(claims.sub, stored.id);
        assert_eq!(claims.email, stored.email);
        assert_eq!(claims.role, stored.role);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let store = MemoryUserStore::new();
        register(&store, &keys(), register_req("a@x.com", "secret1"))
            .await
            .unwrap();

        let wrong_password = login(
            &store,
            &keys(),
            LoginRequest {
                email: "a@x.com".into(),
                password: "secret2".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown_email = login(
            &store,
            &keys(),
            LoginRequest {
                email: "b@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(wrong_password.status(), unknown_email.status());
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn oauth_only_account_cannot_password_login() {
        let store = MemoryUserStore::new();
        find_or_create_google_user(&store, &profile("g-1", "g@x.com", true))
            .await
            .unwrap();
        let err = login(
            &store,
            &keys(),
            LoginRequest {
                email: "g@x.com".into(),
                password: "anything".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn google_user_created_once() {
        let store = MemoryUserStore::new();
        let p = profile("g-1", "g@x.com", true);
        let first = find_or_create_google_user(&store, &p).await.unwrap();
        let second = find_or_create_google_user(&store, &p).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
        assert!(first.password_hash.is_none());
        assert_eq!(first.name, "Google User");
    }

    #[tokio::test]
    async fn verified_google_email_links_local_account() {
        let store = MemoryUserStore::new();
        let local = register(&store, &keys(), register_req("g@x.com", "secret1"))
            .await
            .unwrap();
        let user = find_or_create_google_user(&store, &profile("g-1", "g@x.com", true))
            .await
            .unwrap();
        assert_eq!(user.id, local.user.id);
        assert_eq!(user.google_id.as_deref(), Some("g-1"));
        assert!(user.password_hash.is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unverified_google_email_does_not_link() {
        let store = MemoryUserStore::new();
        register(&store, &keys(), register_req("g@x.com", "secret1"))
            .await
            .unwrap();
        let err = find_or_create_google_user(&store, &profile("g-1", "g@x.com", false))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn losing_the_google_id_race_returns_the_winner() {
        let inner = MemoryUserStore::new();
        let winner = inner
            .create(NewUser {
                google_id: Some("g-1".into()),
                name: "Winner".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let store = LaggingStore::new(inner);

        let mut p = profile("g-1", "g@x.com", true);
        p.email = None;
        let user = find_or_create_google_user(&store, &p).await.unwrap();
        assert_eq!(user.id, winner.id);
        assert_eq!(store.inner.len(), 1);
    }

    #[tokio::test]
    async fn losing_the_link_race_returns_the_linked_account() {
        let inner = MemoryUserStore::new();
        let local = inner
            .create(NewUser {
                email: Some("g@x.com".into()),
                password_hash: Some("hash".into()),
                name: "Local".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        inner
            .link_google_id(local.id, "g-1", None)
            .await
            .unwrap()
            .expect("linked by the other callback");
        let store = LaggingStore::new(inner);
        store.stale_email.store(true, Ordering::SeqCst);

        let user = find_or_create_google_user(&store, &profile("g-1", "g@x.com", true))
            .await
            .unwrap();
        assert_eq!(user.id, local.id);
        assert_eq!(user.google_id.as_deref(), Some("g-1"));
        assert_eq!(store.inner.len(), 1);
    }
}

//! Account endpoints: login, registration, logout, and profile.

use serde::Serialize;
use tracing::{info, warn};

use super::RefreshTokenStore;
use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::{LoginResponse, ProfileUpdate, RegisterRequest, User};

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh: &'a str,
}

/// Clone is cheap - it wraps a shared [`ApiClient`].
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.session().is_authenticated()
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let request = ApiRequest::post("/auth/register/")
            .with_json(request)?
            .without_refresh();
        self.client.send_json(request).await
    }

    /// Exchange credentials for a token pair. The access token goes into the
    /// session, the refresh token into durable storage.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = ApiRequest::post("/auth/token/")
            .with_json(&Credentials { email, password })?
            .without_refresh();
        let login: LoginResponse = self.client.send_json(request).await?;

        self.client
            .session()
            .set_auth(login.user.clone(), login.access.clone());
        self.client
            .token_store()
            .save(&login.refresh)
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;

        info!(user_id = login.user.id, "Logged in");
        Ok(login)
    }

    /// Revoke the refresh token on the server and forget the session locally.
    /// Local state is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let stored = self
            .client
            .token_store()
            .load()
            .map_err(|e| ApiError::Storage(format!("{:#}", e)));

        if let Ok(Some(ref refresh)) = stored {
            let revoke = ApiRequest::post("/auth/logout/")
                .with_json(&RefreshBody { refresh })
                .map(ApiRequest::without_refresh);
            let result = match revoke {
                Ok(request) => self.client.send(request).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(error = %e, "Logout request failed");
            }
        }

        self.client.session().clear();
        self.client
            .token_store()
            .remove()
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;
        info!("Logged out");

        stored.map(|_| ())
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.client.get("/auth/users/me/").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let user: User = self.client.patch("/auth/users/me/", update).await?;
        self.client.session().update_user(user.clone());
        Ok(user)
    }
}

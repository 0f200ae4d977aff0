//! HTTP client for the fieldlog server, usable as the backend of a
//! capture `Shell`.

use std::sync::Mutex;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use fieldlog_core::store::{Authenticator, ObjectStore, RecordStore, StoreError};
use fieldlog_types::api::{AuthResponse, LoginRequest, RegisterRequest, UpdateStatusRequest};
use fieldlog_types::models::{Capture, CaptureStatus, NewCapture, User};

struct Session {
    token: String,
    user: User,
}

/// Talks to `fieldlog-server` over HTTP. Holds the bearer token of the
/// signed-in user; every store call is scoped to that user by the server.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    session: Mutex<Option<Session>>,
}

/// Map a non-success response to the store error callers see.
pub fn status_error(status: StatusCode, body: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED => StoreError::Unauthorized,
        StatusCode::FORBIDDEN => StoreError::Forbidden,
        StatusCode::NOT_FOUND => StoreError::NotFound,
        StatusCode::CONFLICT => StoreError::Conflict,
        _ if body.is_empty() => StoreError::Rejected(status.to_string()),
        _ => StoreError::Rejected(format!("{status}: {body}")),
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let req = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.map(str::to_string),
        };
        let resp = self.client.post(self.endpoint("/auth/register")).json(&req);
        let auth: AuthResponse = decode(send(resp).await?).await?;
        Ok(self.start_session(auth))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, StoreError> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp = self.client.post(self.endpoint("/auth/login")).json(&req);
        let auth: AuthResponse = decode(send(resp).await?).await?;
        Ok(self.start_session(auth))
    }

    fn start_session(&self, auth: AuthResponse) -> User {
        info!(user_id = %auth.user.id, "Signed in");
        let user = auth.user.clone();
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(Session { token: auth.token, user: auth.user });
        user
    }

    fn token(&self) -> Result<String, StoreError> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(StoreError::Unauthorized)
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        let token = self.token()?;
        Ok(self.client.request(method, self.endpoint(path)).bearer_auth(token))
    }
}

async fn send(req: RequestBuilder) -> Result<Response, StoreError> {
    let resp = req.send().await.map_err(transport)?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!(%status, "Request rejected");
    Err(status_error(status, body))
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, StoreError> {
    resp.json().await.map_err(transport)
}

impl RecordStore for HttpBackend {
    async fn insert(&self, capture: NewCapture) -> Result<Capture, StoreError> {
        let req = self.authed(Method::POST, "/captures")?.json(&capture);
        decode(send(req).await?).await
    }

    async fn list(&self, owner: Uuid) -> Result<Vec<Capture>, StoreError> {
        let req = self
            .authed(Method::GET, "/captures")?
            .query(&[("user_id", owner.to_string())]);
        decode(send(req).await?).await
    }

    async fn update_status(&self, id: Uuid, status: CaptureStatus) -> Result<Capture, StoreError> {
        let req = self
            .authed(Method::PATCH, &format!("/captures/{id}/status"))?
            .json(&UpdateStatusRequest { status });
        decode(send(req).await?).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let req = self.authed(Method::DELETE, &format!("/captures/{id}"))?;
        send(req).await?;
        Ok(())
    }
}

impl ObjectStore for HttpBackend {
    async fn upload(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let req = self
            .authed(Method::PUT, &format!("/storage/photos/{name}"))?
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes);
        send(req).await?;
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        self.endpoint(&format!("/storage/photos/{name}"))
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        let req = self.authed(Method::DELETE, &format!("/storage/photos/{name}"))?;
        send(req).await?;
        Ok(())
    }
}

impl Authenticator for HttpBackend {
    fn current_user(&self) -> Option<User> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.user.clone())
    }

    /// Tokens are stateless; signing out forgets the local session.
    async fn sign_out(&self) -> Result<(), StoreError> {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}

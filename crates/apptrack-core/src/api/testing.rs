//! In-process fakes for exercising the client without a network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::StatusCode;
use tokio::sync::Notify;

use super::refresh::REFRESH_PATH;
use super::request::{ApiRequest, ApiResponse, Method, RequestBody};
use super::transport::Transport;
use super::ApiError;
use crate::auth::Navigator;

#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub method: Method,
    pub path: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

enum RefreshReply {
    Grant { access: String, refresh: Option<String> },
    Raw(u16, String),
}

/// A scripted backend. Resource paths answer 200 when the bearer token
/// matches the token the server currently accepts and 401 otherwise; a
/// granted refresh rotates the accepted token.
pub(crate) struct FakeServer {
    accepted: Mutex<Option<String>>,
    refresh_reply: Mutex<RefreshReply>,
    scripted: Mutex<HashMap<String, VecDeque<(u16, String)>>>,
    sent: Mutex<Vec<Sent>>,
    hold: AtomicBool,
    gate: Notify,
    held_paths: Mutex<HashSet<String>>,
    path_gate: Notify,
}

impl FakeServer {
    pub fn new(accepted: &str) -> Arc<Self> {
        Arc::new(Self {
            accepted: Mutex::new(Some(accepted.to_string())),
            refresh_reply: Mutex::new(RefreshReply::Raw(401, r#"{"detail":"Token is invalid or expired"}"#.to_string())),
            scripted: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            hold: AtomicBool::new(false),
            gate: Notify::new(),
            held_paths: Mutex::new(HashSet::new()),
            path_gate: Notify::new(),
        })
    }

    pub fn grant_refresh(&self, access: &str) {
        *self.refresh_reply.lock().unwrap() = RefreshReply::Grant {
            access: access.to_string(),
            refresh: None,
        };
    }

    pub fn grant_refresh_with_rotation(&self, access: &str, refresh: &str) {
        *self.refresh_reply.lock().unwrap() = RefreshReply::Grant {
            access: access.to_string(),
            refresh: Some(refresh.to_string()),
        };
    }

    pub fn reject_refresh(&self, status: u16) {
        self.reply_to_refresh_with(status, r#"{"detail":"Token is invalid or expired"}"#);
    }

    pub fn reply_to_refresh_with(&self, status: u16, body: &str) {
        *self.refresh_reply.lock().unwrap() = RefreshReply::Raw(status, body.to_string());
    }

    /// Make refresh calls wait until [`FakeServer::release_refresh`].
    pub fn hold_refresh(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_refresh(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    /// Receive requests to `path` but answer only after
    /// [`FakeServer::release_path`], judging them by the token they arrived with.
    pub fn hold_path(&self, path: &str) {
        self.held_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn release_path(&self, path: &str) {
        self.held_paths.lock().unwrap().remove(path);
        self.path_gate.notify_one();
    }

    /// Stop accepting any token, as if every session had been revoked.
    pub fn revoke_all(&self) {
        *self.accepted.lock().unwrap() = None;
    }

    /// Answer `path` with these responses in order; the last one repeats.
    pub fn script(&self, path: &str, responses: Vec<(u16, &str)>) {
        let responses = responses.into_iter().map(|(s, b)| (s, b.to_string())).collect();
        self.scripted.lock().unwrap().insert(path.to_string(), responses);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, path: &str) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| s.path == path).collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.sent_to(REFRESH_PATH).len()
    }

    pub fn last_refresh_body(&self) -> Option<serde_json::Value> {
        self.sent_to(REFRESH_PATH).pop().and_then(|s| match s.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        })
    }

    async fn handle(&self, url: String, request: &ApiRequest) -> ApiResponse {
        self.sent.lock().unwrap().push(Sent {
            method: request.method.clone(),
            path: request.path.clone(),
            url,
            query: request.query.clone(),
            bearer: request.bearer_token().map(str::to_string),
            body: request.body.clone(),
        });

        if request.path == REFRESH_PATH {
            if self.hold.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
            return self.refresh_response();
        }

        let held = self.held_paths.lock().unwrap().contains(&request.path);
        if held {
            self.path_gate.notified().await;
        }

        if let Some((status, body)) = self.next_scripted(&request.path) {
            return respond(status, &body);
        }

        let accepted = self.accepted.lock().unwrap().clone();
        match (accepted, request.bearer_token()) {
            (Some(accepted), Some(sent)) if accepted == sent => respond(
                200,
                &serde_json::json!({ "path": request.path, "token": sent }).to_string(),
            ),
            _ => respond(401, r#"{"detail":"Given token not valid for any token type"}"#),
        }
    }

    fn refresh_response(&self) -> ApiResponse {
        match &*self.refresh_reply.lock().unwrap() {
            RefreshReply::Grant { access, refresh } => {
                *self.accepted.lock().unwrap() = Some(access.clone());
                let body = match refresh {
                    Some(refresh) => serde_json::json!({ "access": access, "refresh": refresh }),
                    None => serde_json::json!({ "access": access }),
                };
                respond(200, &body.to_string())
            }
            RefreshReply::Raw(status, body) => respond(*status, body),
        }
    }

    fn next_scripted(&self, path: &str) -> Option<(u16, String)> {
        let mut scripted = self.scripted.lock().unwrap();
        let queue = scripted.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn respond(status: u16, body: &str) -> ApiResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    ApiResponse::new(status, body.to_string())
}

impl Transport for FakeServer {
    fn send<'a>(&'a self, url: String, request: &'a ApiRequest) -> BoxFuture<'a, Result<ApiResponse, ApiError>> {
        async move { Ok(self.handle(url, request).await) }.boxed()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, path: &str) {
        self.redirects.lock().unwrap().push(path.to_string());
    }
}

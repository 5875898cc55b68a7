//! Ordered request decoration applied to every outbound request.

use reqwest::header::{self, HeaderValue};

use super::request::ApiRequest;
use super::ApiError;
use crate::auth::SessionState;

/// One named step run on a request right before it is sent.
pub trait RequestStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, request: &mut ApiRequest) -> Result<(), ApiError>;
}

/// Asks for JSON responses unless the caller said otherwise.
pub struct DefaultHeaders;

impl RequestStage for DefaultHeaders {
    fn name(&self) -> &'static str {
        "default-headers"
    }

    fn apply(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        request
            .headers
            .entry(header::ACCEPT)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(())
    }
}

/// Attaches the current access token as a bearer credential.
///
/// A token pinned by a refresh wins over the session, so a replayed request
/// carries exactly the token its refresh produced. Requests go out
/// anonymously when there is no token at all.
pub struct BearerAuth {
    session: SessionState,
}

impl BearerAuth {
    pub fn new(session: SessionState) -> Self {
        Self { session }
    }
}

impl RequestStage for BearerAuth {
    fn name(&self) -> &'static str {
        "bearer-auth"
    }

    fn apply(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        let token = match request.pinned_token() {
            Some(pinned) => Some(pinned.to_string()),
            None => self.session.access_token(),
        };
        if let Some(token) = token {
            request.set_bearer(&token)?;
        }
        Ok(())
    }
}

pub fn default_stages(session: SessionState) -> Vec<Box<dyn RequestStage>> {
    vec![Box::new(DefaultHeaders), Box::new(BearerAuth::new(session))]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(stages: &[Box<dyn RequestStage>], request: &mut ApiRequest) {
        for stage in stages {
            stage.apply(request).unwrap();
        }
    }

    #[test]
    fn test_anonymous_request_passes_through() {
        let stages = default_stages(SessionState::new());
        let mut request = ApiRequest::get("/dashboard/summary/");
        run(&stages, &mut request);
        assert_eq!(request.bearer_token(), None);
        assert_eq!(request.headers.get(header::ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_session_token_is_attached() {
        let session = SessionState::new();
        session.set_access_token("A1".to_string());
        let stages = default_stages(session);

        let mut request = ApiRequest::get("/applications/");
        run(&stages, &mut request);
        assert_eq!(request.bearer_token(), Some("A1"));
    }

    #[test]
    fn test_pinned_token_wins() {
        let session = SessionState::new();
        session.set_access_token("A1".to_string());
        let stages = default_stages(session);

        let mut request = ApiRequest::get("/applications/");
        request.pin_token("A2".to_string());
        run(&stages, &mut request);
        assert_eq!(request.bearer_token(), Some("A2"));
    }

    #[test]
    fn test_explicit_accept_header_is_kept() {
        let stages = default_stages(SessionState::new());
        let mut request = ApiRequest::get("/applications/");
        request
            .headers
            .insert(header::ACCEPT, HeaderValue::from_static("text/csv"));
        run(&stages, &mut request);
        assert_eq!(request.headers.get(header::ACCEPT).unwrap(), "text/csv");
    }
}

//! Redirect-to-login side effect used when a session cannot be recovered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, path: &str);
}

/// Records that the user has to log in again.
///
/// A terminal has no login screen to jump to, so the front end polls
/// [`LoginRedirect::login_required`] after a command fails.
#[derive(Debug, Clone, Default)]
pub struct LoginRedirect {
    required: Arc<AtomicBool>,
}

impl LoginRedirect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login_required(&self) -> bool {
        self.required.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.required.store(false, Ordering::SeqCst);
    }
}

impl Navigator for LoginRedirect {
    fn redirect_to_login(&self, path: &str) {
        warn!(path, "Session expired, login required");
        self.required.store(true, Ordering::SeqCst);
    }
}

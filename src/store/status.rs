//! Process-wide status line.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
struct Inner {
    text: String,
    expires_at: Option<Instant>,
}

/// Single human-readable status message.
///
/// A timed message pins the line until it expires; untimed updates issued
/// in the meantime are dropped so an error stays visible.
#[derive(Debug, Default)]
pub struct StatusLine {
    inner: Mutex<Inner>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status text, optionally pinning it for `ttl`.
    pub fn set(&self, text: impl Into<String>, ttl: Option<Duration>) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let now = Instant::now();

        match ttl {
            Some(ttl) => {
                inner.text = text.into();
                inner.expires_at = Some(now + ttl);
            }
            None => {
                if inner.expires_at.is_some_and(|at| now < at) {
                    return;
                }
                inner.text = text.into();
                inner.expires_at = None;
            }
        }
    }

    /// Current status text.
    pub fn get(&self) -> String {
        self.inner
            .lock()
            .map(|inner| inner.text.clone())
            .unwrap_or_default()
    }
}

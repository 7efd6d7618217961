use std::path::PathBuf;
use std::time::Duration;

use crate::constants;

/// Which prior turns are sent upstream as `history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPolicy {
    /// Always send `history: []`; the whole transcript travels in `message`.
    #[default]
    Empty,
    /// Send every turn except the last one as `history`.
    Forward,
}

impl HistoryPolicy {
    pub fn from_flag(forward: bool) -> Self {
        if forward {
            HistoryPolicy::Forward
        } else {
            HistoryPolicy::Empty
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub upstream_url: String,
    pub history_policy: HistoryPolicy,
    /// `None` leaves the HTTP client's default in place.
    pub upstream_timeout: Option<Duration>,
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl ProxyConfig {
    pub fn new(upstream_url: impl Into<String>) -> Self {
        Self {
            upstream_url: upstream_url.into(),
            ..Self::default()
        }
    }

    pub fn with_history_policy(mut self, policy: HistoryPolicy) -> Self {
        self.history_policy = policy;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upstream_timeout = timeout;
        self
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_url: constants::UPSTREAM_URL.clone(),
            history_policy: HistoryPolicy::default(),
            upstream_timeout: None,
            template_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        }
    }
}

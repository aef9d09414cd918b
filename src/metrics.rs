use std::sync::atomic::{AtomicU64, Ordering};

use crate::client::ErrorKind;

#[derive(Debug, Default)]
pub struct Metrics {
    api_requests: AtomicU64,
    unauthorized: AtomicU64,
    not_found: AtomicU64,
    client_errors: AtomicU64,
    transport_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub api_requests: u64,
    pub unauthorized: u64,
    pub not_found: u64,
    pub client_errors: u64,
    pub transport_errors: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_api_request(&self) {
        self.api_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::Unauthorized => &self.unauthorized,
            ErrorKind::NotFound => &self.not_found,
            ErrorKind::Client => &self.client_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            api_requests: self.api_requests.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

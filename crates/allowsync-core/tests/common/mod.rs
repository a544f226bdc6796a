//! Test doubles and common utilities for reconciliation contract tests
//!
//! This module provides minimal test doubles that record every call so
//! tests can assert on exactly which outbound operations a tick issued.

#![allow(dead_code)]

use allowsync_core::error::{Error, Result};
use allowsync_core::traits::{
    AddressSource, NotificationTransport, PolicyRecord, PolicyStore, ReplaceRequest,
    ResolvedAddress,
};
use allowsync_core::{NotificationConfig, Notifier, Reconciler, TransportRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An address source with a scripted answer
pub struct FixedAddressSource {
    answer: Mutex<std::result::Result<String, String>>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl FixedAddressSource {
    /// Always resolve to `address`
    pub fn new(address: &str) -> Self {
        Self {
            answer: Mutex::new(Ok(address.to_string())),
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Always fail with a resolution error
    pub fn failing(reason: &str) -> Self {
        Self {
            answer: Mutex::new(Err(reason.to_string())),
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering (to hold a tick in flight)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change the answer for subsequent calls
    pub fn set_address(&self, address: &str) {
        *self.answer.lock().unwrap() = Ok(address.to_string());
    }

    /// Number of resolve calls
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressSource for FixedAddressSource {
    async fn resolve_current(&self) -> Result<ResolvedAddress> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let answer = self.answer.lock().unwrap().clone();
        match answer {
            Ok(address) => Ok(ResolvedAddress::new(address, "test://fixed")),
            Err(reason) => Err(Error::resolution(10, reason)),
        }
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

/// An in-memory policy store that records writes
///
/// A successful write updates the stored record, so repeated ticks behave
/// like they would against the real service.
pub struct MockPolicyStore {
    record: Mutex<PolicyRecord>,
    fail_fetch: Option<String>,
    fail_update: Option<String>,
    fetch_count: AtomicUsize,
    writes: Mutex<Vec<serde_json::Value>>,
}

impl MockPolicyStore {
    /// A store whose include list is empty
    pub fn empty() -> Self {
        Self::with_record(PolicyRecord {
            id: "grp-test".to_string(),
            name: "home".to_string(),
            ..Default::default()
        })
    }

    /// A store whose first include entry is `stored`
    pub fn holding(stored: &str) -> Self {
        let record: PolicyRecord = serde_json::from_value(serde_json::json!({
            "id": "grp-test",
            "name": "home",
            "include": [{"ip": {"ip": stored}}],
        }))
        .unwrap();
        Self::with_record(record)
    }

    pub fn with_record(record: PolicyRecord) -> Self {
        Self {
            record: Mutex::new(record),
            fail_fetch: None,
            fail_update: None,
            fetch_count: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Make every fetch fail
    pub fn failing_fetch(mut self, reason: &str) -> Self {
        self.fail_fetch = Some(reason.to_string());
        self
    }

    /// Make every write fail
    pub fn failing_update(mut self, reason: &str) -> Self {
        self.fail_update = Some(reason.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Number of write attempts (including failed ones)
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// JSON bodies of every write attempt
    pub fn write_bodies(&self) -> Vec<serde_json::Value> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PolicyStore for MockPolicyStore {
    async fn fetch_policy(&self) -> Result<PolicyRecord> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(ref reason) = self.fail_fetch {
            return Err(Error::policy_fetch(reason.clone()));
        }
        Ok(self.record.lock().unwrap().clone())
    }

    async fn replace_policy(&self, address: &str) -> Result<()> {
        let request = ReplaceRequest::single_host(address);
        self.writes
            .lock()
            .unwrap()
            .push(serde_json::to_value(&request).unwrap());

        if let Some(ref reason) = self.fail_update {
            return Err(Error::policy_update(reason.clone()));
        }

        self.record.lock().unwrap().include = request.include;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

/// A notification transport that records every message
#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingTransport {
    /// A transport whose every send fails (after recording the attempt)
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, _url: &str, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(Error::notification("transport down"));
        }
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "recording"
    }
}

/// Notification target URL served by [`RecordingTransport`]
pub const TEST_TARGET: &str = "test://notify.example.net/hook";

/// Build a notifier that routes to `transport`
pub fn notifier_with(transport: Arc<RecordingTransport>) -> Notifier {
    let registry = Arc::new(TransportRegistry::new());
    registry.register_transport("test", transport);
    Notifier::new(
        Some(NotificationConfig {
            url: TEST_TARGET.to_string(),
            identifier: None,
        }),
        registry,
    )
}

/// Build a reconciler over shared doubles
pub fn reconciler(
    source: Arc<FixedAddressSource>,
    store: Arc<MockPolicyStore>,
    notifier: Notifier,
) -> Reconciler {
    Reconciler::new(source, store, notifier)
}

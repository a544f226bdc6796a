//! Reconciliation engine
//!
//! The Reconciler is responsible for one tick of:
//! - Resolving the current public address via AddressSource
//! - Reading the remote access group via PolicyStore
//! - Deciding whether the group needs a write
//! - Writing the new address and notifying about the outcome
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ AddressSource │────▶│  Reconciler  │────▶│ PolicyStore │
//! │ (resolve)     │     │              │     │ (read/put)  │
//! └───────────────┘     └──────────────┘     └─────────────┘
//!                              │
//!                              ▼
//!                       ┌─────────────┐
//!                       │  Notifier   │
//!                       │ (best-effort)│
//!                       └─────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Resolve the address (failure ends the tick)
//! 2. Fetch the policy record (failure ends the tick)
//! 3. Compare: empty include list → create, stored address (minus `/32`)
//!    equal → no-op, otherwise → update
//! 4. Replace the include list with the single new address
//! 5. Notify about the outcome
//!
//! Nothing survives between ticks. The remote record is the only record of
//! what was last configured, so re-running without an external change is
//! always a no-op.

use crate::notifier::{NotificationEvent, Notifier};
use crate::traits::{AddressSource, PolicyRecord, PolicyStore};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Step of the tick that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Address resolution
    Resolve,
    /// Policy fetch
    Fetch,
    /// Policy update
    Update,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Resolve => "address resolution",
            FailureStage::Fetch => "policy fetch",
            FailureStage::Update => "policy update",
        })
    }
}

/// Terminal outcome of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stored address already matches; nothing written
    Unchanged {
        address: String,
    },

    /// Include list was empty and has been initialised
    Created {
        address: String,
    },

    /// Stored address differed and has been replaced
    Updated {
        previous: String,
        address: String,
    },

    /// The tick stopped early
    Failed {
        stage: FailureStage,
        error: String,
    },

    /// Another tick was still in flight
    Skipped,
}

impl TickOutcome {
    /// Whether this tick issued a successful write
    pub fn wrote(&self) -> bool {
        matches!(self, TickOutcome::Created { .. } | TickOutcome::Updated { .. })
    }

    /// Whether this tick failed
    pub fn is_failure(&self) -> bool {
        matches!(self, TickOutcome::Failed { .. })
    }
}

/// Decision taken after comparing the stored and resolved addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Addresses match
    NoOp,
    /// No usable stored address; first-time setup
    Create,
    /// Stored address differs
    Update {
        previous: String,
    },
}

impl Plan {
    /// Compare a fetched record with the resolved address
    ///
    /// The stored address has one trailing `/32` removed and is then
    /// compared byte-for-byte.
    pub fn decide(record: &PolicyRecord, address: &str) -> Self {
        match record.current_host_address() {
            None => Plan::Create,
            Some(stored) if stored == address => Plan::NoOp,
            Some(stored) => Plan::Update {
                previous: stored.to_string(),
            },
        }
    }
}

/// Orchestrates resolve → fetch → compare → write → notify
///
/// ## Single Flight
///
/// At most one tick runs at a time. A call to [`Reconciler::run_once`]
/// while another is in progress returns [`TickOutcome::Skipped`] without
/// any outbound request.
pub struct Reconciler {
    /// Address source
    source: Arc<dyn AddressSource>,

    /// Remote policy store
    store: Arc<dyn PolicyStore>,

    /// Status notifications
    notifier: Notifier,

    /// Held for the duration of a tick
    in_flight: Mutex<()>,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        source: Arc<dyn AddressSource>,
        store: Arc<dyn PolicyStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
            in_flight: Mutex::new(()),
        }
    }

    /// The notifier used for tick outcomes
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Run one tick end-to-end
    ///
    /// Never returns an error: failures are logged, notified and reported
    /// as [`TickOutcome::Failed`] so the next tick is unaffected.
    pub async fn run_once(&self) -> TickOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("Previous reconciliation still running, skipping this tick");
            return TickOutcome::Skipped;
        };

        info!("Checking if IP update is needed...");
        self.reconcile().await
    }

    async fn reconcile(&self) -> TickOutcome {
        // Resolving
        let resolved = match self.source.resolve_current().await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("Error getting current IP: {}", e);
                return self
                    .fail(FailureStage::Resolve, NotificationEvent::resolve_failed(&e), e)
                    .await;
            }
        };
        let address = resolved.address.trim().to_string();
        info!(
            "Current public IP: {} (via {}, {} provider(s) skipped)",
            address,
            resolved.provider,
            resolved.skipped.len()
        );

        // Fetching
        let record = match self.store.fetch_policy().await {
            Ok(record) => record,
            Err(e) => {
                error!("Error getting {} access group: {}", self.store.store_name(), e);
                return self
                    .fail(FailureStage::Fetch, NotificationEvent::fetch_failed(&e), e)
                    .await;
            }
        };

        // Comparing
        match Plan::decide(&record, &address) {
            Plan::NoOp => {
                info!("IP is already up to date, no action needed");
                TickOutcome::Unchanged { address }
            }
            Plan::Create => {
                info!("No IP found in access group {}, updating...", record.id);
                self.create(address).await
            }
            Plan::Update { previous } => {
                info!(
                    "IP mismatch detected. Updating access group from {} to {}",
                    previous, address
                );
                self.update(previous, address).await
            }
        }
    }

    async fn create(&self, address: String) -> TickOutcome {
        if let Err(e) = self.store.replace_policy(&address).await {
            error!("Error updating access group: {}", e);
            return self
                .fail(FailureStage::Update, NotificationEvent::create_failed(&e), e)
                .await;
        }

        info!("Successfully updated access group with IP: {}", address);
        self.notifier
            .notify_best_effort(&NotificationEvent::created(&address))
            .await;
        TickOutcome::Created { address }
    }

    async fn update(&self, previous: String, address: String) -> TickOutcome {
        if let Err(e) = self.store.replace_policy(&address).await {
            error!("Error updating access group: {}", e);
            let event = NotificationEvent::update_failed(&previous, &address, &e);
            return self.fail(FailureStage::Update, event, e).await;
        }

        info!("Successfully updated access group with IP: {}", address);
        self.notifier
            .notify_best_effort(&NotificationEvent::updated(&previous, &address))
            .await;
        TickOutcome::Updated { previous, address }
    }

    async fn fail(
        &self,
        stage: FailureStage,
        event: NotificationEvent,
        error: crate::Error,
    ) -> TickOutcome {
        debug!("Tick failed during {}", stage);
        self.notifier.notify_best_effort(&event).await;
        TickOutcome::Failed {
            stage,
            error: error.to_string(),
        }
    }
}

// # allowsync-core
//
// Core library for keeping a remote access allowlist in sync with the
// operator's current public IP address.
//
// ## Architecture Overview
//
// - **AddressSource**: Trait for discovering the current public address
// - **PolicyStore**: Trait for reading and overwriting the remote allow-list record
// - **NotificationTransport**: Trait for delivering status messages by URL
// - **Reconciler**: Runs one resolve → fetch → compare → write → notify tick
// - **Scheduler**: Runs the reconciler immediately and then on a cron cadence
// - **TransportRegistry**: Scheme-keyed registry of notification transports
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from integrations
// 2. **Stateless Ticks**: The remote record is the only source of truth
// 3. **Plugin-Based**: Notification transports are registered by URL scheme
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Best-Effort Side Channel**: Notification failures never change an outcome

pub mod config;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod registry;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use config::{NotificationConfig, SyncConfig};
pub use engine::{FailureStage, Plan, Reconciler, TickOutcome};
pub use error::{Error, Result};
pub use notifier::{NotificationEvent, NotificationKind, Notifier};
pub use registry::TransportRegistry;
pub use scheduler::{Schedule, Scheduler};
pub use traits::{AddressSource, NotificationTransport, PolicyRecord, PolicyStore, ResolvedAddress};

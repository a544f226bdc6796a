//! Core traits for the allowsync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressSource`]: Discover the current public address
//! - [`PolicyStore`]: Read and overwrite the remote allow-list record
//! - [`NotificationTransport`]: Deliver status messages to an external channel

pub mod address_source;
pub mod notification;
pub mod policy_store;

pub use address_source::{AddressSource, ProviderFailure, ResolvedAddress};
pub use notification::NotificationTransport;
pub use policy_store::{IncludeRule, IpRule, PolicyRecord, PolicyStore, ReplaceRequest};

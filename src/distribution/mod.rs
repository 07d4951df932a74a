//! Alert distribution service
//!
//! ## Architecture Overview
//!
//! ```text
//!   supervisors ──(one alert per connection)──► Ingress task
//!                                                 │ 1. append to audit log
//!                                                 │ 2. broadcast
//!                                                 ▼
//!   subscribers ◄──(raw alert lines)────── SubscriberRegistry ◄── Egress task
//!                                                               (accepts subscribers)
//! ```
//!
//! Ingress and egress run as independent long-lived tasks on two adjacent
//! ports. The registry is the only state both touch, and it guards itself
//! with one internal lock.
//!
//! Delivery is best effort: no acknowledgements, no retries, a subscriber
//! whose send fails is dropped.

pub mod audit;
mod egress;
pub mod ingress;
pub mod registry;
pub mod server;
pub mod stats;

pub use audit::AuditLog;
pub use registry::{BroadcastReport, RegistryFull, SlotId, SubscriberRegistry};
pub use server::{DistributionHandle, DistributionServer};
pub use stats::ServerStats;

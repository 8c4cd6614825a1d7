//! Offline-first cache engine.
//!
//! Every intercepted request is classified by URL shape and handled by
//! exactly one strategy:
//!
//! | Class | Strategy | Partition |
//! |---|---|---|
//! | non-GET / non-http(s) | pass through | none |
//! | backend API | network only, JSON 503 when offline | none |
//! | hashed build asset | cache first | static |
//! | image optimization | cache first | image |
//! | navigation | network first, offline page fallback | dynamic |
//! | everything else | stale-while-revalidate | dynamic |
//!
//! The lifecycle controller precaches the app shell on install and drops
//! partitions of older generations on activate; the messenger accepts
//! page-to-worker commands.

pub mod error;
pub mod fallback;
pub mod host;
pub mod lifecycle;
pub mod messenger;
pub mod precache;
pub mod router;
pub mod script;
pub mod strategies;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::HostError;
pub use lifecycle::{InstallReport, LifecycleController, LifecycleState};
pub use router::{RequestClass, RouteRules, Strategy, classify};
pub use strategies::{Handled, Strategies};
pub use worker::ServiceWorker;

//! Client-side code for tillcache.
//!
//! This crate provides the network fetcher used by the cache engine and the
//! page-side coordinator that registers the worker and feeds it asset lists.

pub mod coordinator;
pub mod fetch;

pub use coordinator::{
    ConnectivityEvent, ConnectivityMonitor, Coordinator, Navigation, RegistrationState, WorkerHandle,
    scan_build_assets,
};

pub use fetch::{FetchClient, FetchConfig, Fetcher, UrlError, resolve};

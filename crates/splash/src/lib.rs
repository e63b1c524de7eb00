//! KubeSnooze splash page
//!
//! Served in place of a sleeping environment's ingress backend. Each
//! page load asks for a wake, debounced so a burst of visitors
//! triggers a single run.

pub mod api;
pub mod config;
pub mod page;

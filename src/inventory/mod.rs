//! Host inventory construction: provider backends, reconciliation, cache.

pub mod cache;
pub mod error;
pub mod provider;
pub mod readiness;
pub mod reconciler;

pub use cache::{ComponentHosts, HostCache};
pub use error::ProviderError;
pub use provider::{expand_desired, unmanaged_hosts, DesiredHost, ProviderBackend, ProviderInstance};
pub use readiness::{NoopProbe, ReadinessProbe, TcpProbe};
pub use reconciler::Reconciler;

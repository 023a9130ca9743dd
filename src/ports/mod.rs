pub mod adapter;
pub mod dialer;
pub mod identity;
pub mod tracking;

pub use adapter::{AdapterRegistry, ProxyAdapter};
pub use dialer::{BoxedStream, Dialer, ProxyStream};
pub use identity::ClientIdentityRegistry;
pub use tracking::TrackingPort;

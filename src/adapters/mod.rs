pub mod dial;
pub mod http;
pub mod registry;
pub mod tls;
pub mod tracking;

pub use dial::{ChainDialer, TcpDialer};
pub use http::HttpAdapter;
pub use registry::{AdapterEnv, AdapterTable};
pub use tls::{ClientIdentityCatalog, TlsProfile, TlsWrapper};
pub use tracking::ConnectionTracker;

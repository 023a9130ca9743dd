pub mod context;
pub mod errors;
pub mod models;
pub mod options;
pub mod service;

pub use context::DialContext;
pub use errors::*;
pub use models::*;
pub use options::{HttpOption, ProfileConfig};
pub use service::ConnectService;

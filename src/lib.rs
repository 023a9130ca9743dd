pub mod adapters;
pub mod connection;
pub mod domain;
pub mod ports;

pub use connection::NegotiatedConn;
pub use domain::{DialContext, DialError, Result};

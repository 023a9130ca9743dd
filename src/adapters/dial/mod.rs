pub mod chain;
pub mod tcp;

pub use chain::{resolve, ChainDialer};
pub use tcp::{tcp_keep_alive, TcpDialer};

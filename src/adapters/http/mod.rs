pub mod adapter;
pub mod handshake;

pub use adapter::HttpAdapter;
pub use handshake::{shake_hand, HandshakeState, Outcome, MAX_RESPONSE_HEADER_SIZE};

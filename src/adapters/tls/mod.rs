pub mod fingerprint;
pub mod stream;
pub mod verifier;

pub use fingerprint::{ClientFingerprint, ClientIdentity, ClientIdentityCatalog};
pub use stream::{TlsProfile, TlsWrapper, DEFAULT_TLS_TIMEOUT};
pub use verifier::NoVerifier;

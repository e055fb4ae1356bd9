//! Security provider seam
//!
//! The GSS-style token machine (NTLM in practice) lives outside this
//! crate. The engine drives it through a three-method capability and
//! treats the token bytes as opaque.

use bytes::Bytes;

use crate::error::Result;
use crate::settings::Credentials;

/// Progress report from the security provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Another leg is expected
    Continue,
    /// The security context is established
    Complete,
    /// The provider failed; the session is unusable
    Error,
}

/// Stateful token producer/consumer for one session.
///
/// The three-leg sequence is `initial_token` (sent in the bind),
/// `accept_token` (the server's challenge from the bind_ack), then
/// `next_token` (sent in the auth3) when the provider asks to continue.
pub trait AuthOracle: Send {
    fn initial_token(&mut self) -> (Bytes, AuthStatus);
    fn accept_token(&mut self, token: &[u8]) -> AuthStatus;
    fn next_token(&mut self) -> (Bytes, AuthStatus);
}

/// Builds an oracle once credentials are resolved.
///
/// Construction is deferred past credential prompting so a cancelled
/// prompt never touches the security provider.
pub trait AuthOracleFactory: Send {
    fn create(&self, credentials: &Credentials, target_host: &str) -> Result<Box<dyn AuthOracle>>;
}

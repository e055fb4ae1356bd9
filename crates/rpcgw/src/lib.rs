//! RPC-over-HTTP v2 client core for a Terminal Services Gateway
//!
//! This crate implements the secure bind handshake of the connection-
//! oriented RPC client that tunnels RDP traffic through an HTTP gateway:
//! construction of the SECURE_BIND PDU with its embedded GSS token,
//! parsing of the SECURE_BIND_ACK with fragment-size renegotiation, and
//! transmission of the RPC_AUTH_3 third leg, together with the call
//! tracking and channel framing the sequence depends on.
//!
//! The wire format is connection-oriented DCE RPC (C706, MS-RPCE); the
//! virtual connection is composed of two HTTP byte pipes, one per
//! direction, surfaced here as the [`InChannel`] and [`OutChannel`]
//! traits. The NTLM token machine is an external collaborator behind the
//! [`AuthOracle`] trait.
//!
//! # Example
//!
//! ```no_run
//! use rpcgw::{BindEngine, GatewaySettings};
//! # use rpcgw::{AuthOracle, AuthOracleFactory, Credentials};
//! # use rpcgw::{StreamInChannel, StreamOutChannel};
//! # struct Ntlm;
//! # impl AuthOracleFactory for Ntlm {
//! #     fn create(
//! #         &self,
//! #         _: &Credentials,
//! #         _: &str,
//! #     ) -> rpcgw::Result<Box<dyn AuthOracle>> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # async fn connect(
//! #     in_leg: tokio::io::DuplexStream,
//! #     out_leg: tokio::io::DuplexStream,
//! # ) -> rpcgw::Result<()> {
//! let settings = GatewaySettings {
//!     gateway_username: "user".into(),
//!     gateway_password: "pass".into(),
//!     gateway_hostname: "gateway.example.com".into(),
//!     ..Default::default()
//! };
//!
//! let mut engine = BindEngine::new(
//!     settings,
//!     Box::new(Ntlm),
//!     Box::new(StreamInChannel::new(in_leg)),
//!     Box::new(StreamOutChannel::new(out_leg)),
//! );
//!
//! let negotiated = engine.run().await?;
//! println!("max transmit fragment: {}", negotiated.max_xmit_frag);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod bind;
pub mod call;
pub mod channel;
pub mod error;
pub mod pdu;
pub mod security;
pub mod settings;

// Re-export error types
pub use error::{BindError, Result};

// Handshake engine exports
pub use bind::{
    BindEngine, BindState, NegotiatedParameters, BIND_CALL_ID, DEFAULT_MAX_FRAG_SIZE,
    DEFAULT_RECV_TIMEOUT,
};

// PDU codec exports
pub use pdu::{
    // PDU structures
    Auth3Pdu,
    BindAck,
    BindAckPdu,
    BindPdu,
    ContextElement,
    PacketType,
    PduHeader,
    PduWriter,
    // Supporting types
    SyntaxId,
    Uuid,
    // Constants
    BTFN_SYNTAX,
    BTFN_SYNTAX_IF_VERSION,
    BTFN_UUID,
    NDR_DREP,
    NDR_SYNTAX,
    NDR_SYNTAX_IF_VERSION,
    NDR_UUID,
    PFC_CONC_MPX,
    PFC_FIRST_FRAG,
    PFC_LAST_FRAG,
    PFC_SUPPORT_HEADER_SIGN,
    RPC_VERSION,
    RPC_VERSION_MINOR,
    TSGU_SYNTAX,
    TSGU_SYNTAX_IF_VERSION,
    TSGU_UUID,
};

// Security exports
pub use security::{auth_pad_length, AuthLevel, AuthType, AuthVerifier};

// Call tracking exports
pub use call::{CallRegistry, RpcCall};

// Channel exports
pub use channel::{
    recv_pdu, InChannel, OutChannel, StreamInChannel, StreamOutChannel, DEFAULT_MAX_PDU_SIZE,
};

// Settings and collaborator exports
pub use auth::{AuthOracle, AuthOracleFactory, AuthStatus};
pub use settings::{CredentialPrompt, Credentials, GatewaySettings, PromptOutcome};

//! Secure bind handshake engine
//!
//! Drives the three-PDU sequence that establishes an authenticated RPC
//! session over the virtual connection:
//!
//! ```text
//!     Client                                              Server
//!        |                                                   |
//!        |-------------------SECURE_BIND-------------------->|
//!        |                                                   |
//!        |<----------------SECURE_BIND_ACK-------------------|
//!        |                                                   |
//!        |--------------------RPC_AUTH_3-------------------->|
//!        |                                                   |
//! ```
//!
//! The engine is strictly sequential: each leg finishes before the next
//! begins, and the only suspension points are channel operations.

use std::time::Duration;

use tracing::debug;

use crate::auth::{AuthOracleFactory, AuthStatus};
use crate::call::CallRegistry;
use crate::channel::{recv_pdu, InChannel, OutChannel, DEFAULT_MAX_PDU_SIZE};
use crate::error::{BindError, Result};
use crate::pdu::{Auth3Pdu, BindAck, BindPdu};
use crate::settings::{CredentialPrompt, Credentials, GatewaySettings, PromptOutcome};

/// All three handshake PDUs share this call id.
pub const BIND_CALL_ID: u32 = 2;

/// Desired fragment sizes offered in the bind (0x0FF8)
pub const DEFAULT_MAX_FRAG_SIZE: u16 = 4088;

/// Deadline for the bind_ack unless the caller supplies one
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// Handshake phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Init,
    BindSent,
    AwaitingBindAck,
    Auth3Send,
    Established,
    Failed,
}

/// Fragment sizes agreed with the server.
///
/// The receive size is an upper bound on what the peer will send; buffers
/// may be larger, but no transmitted fragment may exceed the transmit size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedParameters {
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
}

/// State machine for one virtual connection's secure bind.
///
/// Owns its settings snapshot, call registry, and both channel legs; the
/// auth oracle is built after credentials resolve and dropped with the
/// engine. Distinct engines are fully independent.
pub struct BindEngine {
    settings: GatewaySettings,
    oracle_factory: Box<dyn AuthOracleFactory>,
    in_channel: Box<dyn InChannel>,
    out_channel: Box<dyn OutChannel>,
    prompt: Option<Box<dyn CredentialPrompt>>,
    registry: CallRegistry,
    state: BindState,
    max_xmit_frag: u16,
    max_recv_frag: u16,
    recv_timeout: Duration,
}

impl BindEngine {
    pub fn new(
        settings: GatewaySettings,
        oracle_factory: Box<dyn AuthOracleFactory>,
        in_channel: Box<dyn InChannel>,
        out_channel: Box<dyn OutChannel>,
    ) -> Self {
        Self {
            settings,
            oracle_factory,
            in_channel,
            out_channel,
            prompt: None,
            registry: CallRegistry::new(),
            state: BindState::Init,
            max_xmit_frag: DEFAULT_MAX_FRAG_SIZE,
            max_recv_frag: DEFAULT_MAX_FRAG_SIZE,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
        }
    }

    /// Install the host credential prompt. Without one, incomplete gateway
    /// credentials are passed to the oracle factory as configured.
    pub fn with_credential_prompt(mut self, prompt: Box<dyn CredentialPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn state(&self) -> BindState {
        self.state
    }

    /// Settings snapshot, including any prompt results and session
    /// credential propagation.
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Outstanding-call registry, for diagnostics.
    pub fn call_registry(&self) -> &CallRegistry {
        &self.registry
    }

    /// Run the handshake to completion.
    ///
    /// Terminal on first failure: the registry is cleared and the engine
    /// parks in `Failed`. `Cancelled` means the user aborted at the
    /// credential prompt or the host interrupted a channel operation.
    pub async fn run(&mut self) -> Result<NegotiatedParameters> {
        match self.handshake().await {
            Ok(params) => {
                self.state = BindState::Established;
                debug!(
                    max_xmit_frag = params.max_xmit_frag,
                    max_recv_frag = params.max_recv_frag,
                    "secure bind established"
                );
                Ok(params)
            }
            Err(err) => {
                self.registry.clear();
                self.state = BindState::Failed;
                Err(err)
            }
        }
    }

    async fn handshake(&mut self) -> Result<NegotiatedParameters> {
        let credentials = self.resolve_credentials()?;
        let mut oracle = self
            .oracle_factory
            .create(&credentials, &self.settings.gateway_hostname)?;

        // Leg 1: SECURE_BIND
        self.state = BindState::BindSent;
        let (token, status) = oracle.initial_token();
        if status == AuthStatus::Error {
            return Err(BindError::AuthOracleInitFailed);
        }

        debug!(call_id = BIND_CALL_ID, "sending bind PDU");
        let frame = BindPdu::secure(BIND_CALL_ID, self.max_xmit_frag, self.max_recv_frag, token)
            .encode()?;
        self.registry.new_call(BIND_CALL_ID, 0)?;
        self.send_frame(&frame).await?;

        // Leg 2: SECURE_BIND_ACK
        self.state = BindState::AwaitingBindAck;
        let reply = tokio::time::timeout(
            self.recv_timeout,
            recv_pdu(self.out_channel.as_mut(), DEFAULT_MAX_PDU_SIZE),
        )
        .await
        .map_err(|_| BindError::Timeout)??;

        let ack = BindAck::parse(&reply)?;
        debug!(
            max_xmit_frag = ack.max_xmit_frag,
            max_recv_frag = ack.max_recv_frag,
            auth_length = ack.auth_value.len(),
            "received bind_ack PDU"
        );

        // The server reports its own perspective: its transmit size bounds
        // what we will receive, and vice versa.
        self.max_recv_frag = ack.max_xmit_frag;
        self.max_xmit_frag = ack.max_recv_frag;
        self.registry.complete(BIND_CALL_ID)?;

        match oracle.accept_token(&ack.auth_value) {
            AuthStatus::Complete => return Ok(self.negotiated()),
            AuthStatus::Error => return Err(BindError::AuthOracleInitFailed),
            AuthStatus::Continue => {}
        }

        // Leg 3: RPC_AUTH_3
        self.state = BindState::Auth3Send;
        let (token, status) = oracle.next_token();
        if status == AuthStatus::Error {
            return Err(BindError::AuthOracleInitFailed);
        }

        debug!(call_id = BIND_CALL_ID, "sending auth3 PDU");
        let frame =
            Auth3Pdu::new(BIND_CALL_ID, self.max_xmit_frag, self.max_recv_frag, token).encode()?;
        self.registry.ensure_call(BIND_CALL_ID, 0);
        self.send_frame(&frame).await?;

        Ok(self.negotiated())
    }

    /// Resolve the gateway credential triple, prompting the host when the
    /// configured values are incomplete. A cancelled prompt aborts before
    /// the oracle or either channel is touched.
    fn resolve_credentials(&mut self) -> Result<Credentials> {
        if self.settings.needs_gateway_credentials() {
            if let Some(prompt) = self.prompt.as_mut() {
                match prompt.prompt(&self.settings) {
                    PromptOutcome::Cancel => return Err(BindError::Cancelled),
                    PromptOutcome::Proceed(credentials) => {
                        let mut settings = std::mem::take(&mut self.settings)
                            .with_gateway_credentials(credentials);
                        if settings.use_same_credentials_for_session {
                            settings = settings.propagate_gateway_credentials();
                        }
                        self.settings = settings;
                    }
                }
            }
        }

        Ok(self.settings.gateway_credentials())
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let sent = self.in_channel.send(frame).await.map_err(BindError::channel)?;
        if sent != frame.len() {
            return Err(BindError::ChannelIoError(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: {sent} of {} bytes", frame.len()),
            )));
        }
        Ok(())
    }

    fn negotiated(&self) -> NegotiatedParameters {
        NegotiatedParameters {
            max_xmit_frag: self.max_xmit_frag,
            max_recv_frag: self.max_recv_frag,
        }
    }
}

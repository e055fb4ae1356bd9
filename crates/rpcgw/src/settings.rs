//! Gateway session settings and credential resolution
//!
//! The engine works on an owned snapshot taken at session start; nothing
//! here mutates shared configuration. Credential updates are expressed as
//! transformations returning a new value.

/// Credential triple for one authentication target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub domain: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        domain: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            domain: domain.into(),
            password: password.into(),
        }
    }
}

/// Configuration surface consumed by the bind engine.
///
/// Empty strings mean "not configured"; missing gateway credentials
/// trigger the credential prompt before any channel traffic.
#[derive(Debug, Clone, Default)]
pub struct GatewaySettings {
    pub gateway_username: String,
    pub gateway_domain: String,
    pub gateway_password: String,
    pub gateway_hostname: String,
    pub username: String,
    pub domain: String,
    pub password: String,
    pub use_same_credentials_for_session: bool,
}

impl GatewaySettings {
    pub fn needs_gateway_credentials(&self) -> bool {
        self.gateway_username.is_empty() || self.gateway_password.is_empty()
    }

    pub fn gateway_credentials(&self) -> Credentials {
        Credentials {
            username: self.gateway_username.clone(),
            domain: self.gateway_domain.clone(),
            password: self.gateway_password.clone(),
        }
    }

    /// Replace the gateway credential triple.
    pub fn with_gateway_credentials(mut self, credentials: Credentials) -> Self {
        self.gateway_username = credentials.username;
        self.gateway_domain = credentials.domain;
        self.gateway_password = credentials.password;
        self
    }

    /// Copy the gateway credential triple into the session slots.
    ///
    /// All three fields move together; there is no state in which only
    /// some of them have been taken over.
    pub fn propagate_gateway_credentials(mut self) -> Self {
        self.username = self.gateway_username.clone();
        self.domain = self.gateway_domain.clone();
        self.password = self.gateway_password.clone();
        self
    }
}

/// Outcome of asking the host for gateway credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Proceed(Credentials),
    Cancel,
}

/// Host-side credential prompt, invoked at most once per session when the
/// configured gateway credentials are incomplete.
pub trait CredentialPrompt: Send {
    fn prompt(&mut self, settings: &GatewaySettings) -> PromptOutcome;
}

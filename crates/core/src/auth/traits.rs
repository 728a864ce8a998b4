use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

/// Why a console request could not be tied to a professional.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential header was sent.
    #[error("No console credentials supplied")]
    NotAuthenticated,

    /// A key was sent but matches no configured professional.
    #[error("Unknown console key: {0}")]
    InvalidCredentials(String),

    /// The authenticator itself is misconfigured.
    #[error("Authenticator misconfigured: {0}")]
    ConfigurationError(String),
}

/// Resolves the professional operating a console from request headers.
///
/// The resulting profile only scopes what the queue shows; it does not gate
/// which queue operations may be called.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Map a request to the identity (and profile) of its professional.
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Config name of this method, e.g. `"api_key"`.
    fn method_name(&self) -> &'static str;
}

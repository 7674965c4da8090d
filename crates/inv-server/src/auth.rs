//! Caller identity for inbound connections.
//!
//! The only identity the object layer knows is a handle string, matched
//! against each object's access modes. Over HTTP it comes from the subject
//! DN of a mutually validated client certificate, forwarded in a header by
//! the TLS-terminating proxy.

use async_trait::async_trait;
use inv_types::validate_handle;

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub handle: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn handle(handle: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    /// Subject DN of a verified client certificate.
    ClientDn(String),
    Anonymous,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity>;
}

/// Treats every caller as anonymous.
pub struct AnonymousAuth;

#[async_trait]
impl AuthProvider for AnonymousAuth {
    async fn authenticate(&self, _credentials: &Credentials) -> ServerResult<Identity> {
        Ok(Identity::anonymous())
    }
}

/// Uses the certificate's common name as the handle.
pub struct DnAuth {
    /// Reject callers without a certificate.
    pub require_certificate: bool,
}

#[async_trait]
impl AuthProvider for DnAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity> {
        match credentials {
            Credentials::ClientDn(dn) => {
                let cn = common_name(dn)
                    .ok_or_else(|| ServerError::AuthFailed(format!("no CN in subject {dn:?}")))?;
                validate_handle(cn).map_err(|e| ServerError::AuthFailed(e.to_string()))?;
                tracing::debug!(handle = cn, "client certificate accepted");
                Ok(Identity::handle(cn))
            }
            Credentials::Anonymous if self.require_certificate => {
                Err(ServerError::AuthFailed("client certificate required".into()))
            }
            Credentials::Anonymous => Ok(Identity::anonymous()),
        }
    }
}

/// Common name of a subject DN, in either RFC 4514 (`CN=a,O=b`) or OpenSSL
/// one-line (`/O=b/CN=a`) form. The most specific CN wins.
pub fn common_name(dn: &str) -> Option<&str> {
    let parts: Vec<&str> = if dn.starts_with('/') {
        dn.split('/').collect()
    } else {
        dn.split(',').collect()
    };
    let mut cn = None;
    for part in parts {
        if let Some((attr, value)) = part.trim().split_once('=') {
            if attr.trim().eq_ignore_ascii_case("CN") && !value.trim().is_empty() {
                cn = Some(value.trim());
                if !dn.starts_with('/') {
                    // RFC 4514 lists the most specific RDN first.
                    break;
                }
            }
        }
    }
    cn
}

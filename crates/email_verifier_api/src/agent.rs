//! Request identity
//!
//! Agent-signature verification happens in an external middleware; on
//! success it attaches an [`AgentIdentity`] to the request extensions. This
//! module consumes that contract and falls back to the client IP taken from
//! the first `x-forwarded-for` hop, then `x-real-ip`, then `"unknown"`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use verify_core::Identity;

/// Attached to the request by the agent-signature middleware.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub uid: String,
}

/// Resolved caller identity for rate limiting and usage accounting.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub agent: Option<AgentIdentity>,
    pub client_ip: String,
}

impl RequestIdentity {
    /// The rate-limit identity: agent UID when authenticated, else IP.
    pub fn rate_key(&self) -> Identity {
        match &self.agent {
            Some(agent) => Identity::agent(agent.uid.clone()),
            None => Identity::ip(self.client_ip.clone()),
        }
    }
}

/// First `x-forwarded-for` hop, then `x-real-ip`, then `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first_hop) = value.split(',').next() {
                let first_hop = first_hop.trim();
                if !first_hop.is_empty() {
                    return first_hop.to_string();
                }
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return value.trim().to_string();
        }
    }
    "unknown".to_string()
}

impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            agent: parts.extensions.get::<AgentIdentity>().cloned(),
            client_ip: client_ip(&parts.headers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;
    use verify_core::IdentityKind;

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("192.0.2.1, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "192.0.2.1");
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.2"));
        assert_eq!(client_ip(&headers), "192.0.2.2");
    }

    #[test]
    fn unknown_without_headers() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn agent_identity_wins_over_ip() {
        let identity = RequestIdentity {
            agent: Some(AgentIdentity { uid: "agent-7".into() }),
            client_ip: "192.0.2.1".into(),
        };
        let key = identity.rate_key();
        assert_eq!(key.kind, IdentityKind::Agent);
        assert_eq!(key.key, "agent-7");

        let identity = RequestIdentity {
            agent: None,
            client_ip: "192.0.2.1".into(),
        };
        assert_eq!(identity.rate_key().kind, IdentityKind::Ip);
    }
}

//! Bearer credential decoration for admin backend calls

use reqwest::RequestBuilder;

/// Attaches the moderator credential to outgoing admin requests
///
/// The token itself is minted elsewhere (signed admin token or session token);
/// it is opaque here.
#[derive(Clone, Default)]
pub struct AdminAuth {
    token: Option<String>,
}

impl AdminAuth {
    pub fn bearer(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: if token.trim().is_empty() { None } else { Some(token) },
        }
    }

    /// No credential; requests go out undecorated
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    pub fn decorate(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

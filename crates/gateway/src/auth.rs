use {
    secrecy::{ExposeSecret, Secret},
    subtle::ConstantTimeEq,
};

// ── Types ────────────────────────────────────────────────────────────────────

/// Resolved gateway auth configuration. No token means auth is disabled.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAuth {
    pub token: Option<Secret<String>>,
}

impl ResolvedAuth {
    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }
}

/// Result of an authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub ok: bool,
    pub reason: Option<&'static str>,
}

impl AuthResult {
    fn allow() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn deny(reason: &'static str) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

// ── Auth logic ───────────────────────────────────────────────────────────────

/// Resolve auth from the configured token; blank tokens disable auth.
pub fn resolve_auth(token: Option<String>) -> ResolvedAuth {
    ResolvedAuth {
        token: token.filter(|t| !t.is_empty()).map(Secret::new),
    }
}

/// Check the token a peer presented in its connect request.
pub fn authorize_connect(auth: &ResolvedAuth, provided_token: Option<&str>) -> AuthResult {
    let Some(expected) = auth.token.as_ref() else {
        return AuthResult::allow();
    };
    let Some(given) = provided_token else {
        return AuthResult::deny("token_missing");
    };
    if bool::from(given.as_bytes().ct_eq(expected.expose_secret().as_bytes())) {
        AuthResult::allow()
    } else {
        AuthResult::deny("token_mismatch")
    }
}

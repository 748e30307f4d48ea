// src/models/auth.rs

use serde::{Deserialize, Serialize};

// Claims carried by the bearer token. `sub` is the auth id issued by the
// identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Caller identity, inserted into request extensions by `auth_guard`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Profile id.
    pub sub: i64,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

pub mod claims;
pub mod extractors;
pub mod guards;
pub mod middleware;

pub use claims::{AuthUser, Claims};

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use util::config;

/// Issues a bearer token for a profile and returns it with its RFC 3339 expiry.
///
/// Sign-in lives outside this service; this exists for tooling and tests.
pub fn generate_jwt(profile_id: i64) -> Result<(String, String), jsonwebtoken::errors::Error> {
    let expiry = Utc::now() + Duration::minutes(config::jwt_duration_minutes() as i64);

    let claims = Claims {
        sub: profile_id,
        exp: expiry.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config::jwt_secret().as_bytes()),
    )?;

    Ok((token, expiry.to_rfc3339()))
}

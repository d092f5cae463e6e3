use actix_web::{dev::Payload, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

use crate::error::ApiError;

const TOKEN_TTL_HOURS: i64 = 24;

/// `sub` is the identity provider's user id (the user's `clerk_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

fn secret() -> Result<String, jsonwebtoken::errors::Error> {
    env::var("JWT_SECRET").map_err(|_| ErrorKind::InvalidKeyFormat.into())
}

/// Validate a JWT and return its claims.
fn decode_jwt(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Extractor yielding validated `Claims`. Use `Option<Auth>` where signing in
/// is optional.
pub struct Auth(pub Claims);

impl Auth {
    pub fn clerk_id(&self) -> &str {
        &self.0.sub
    }
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() else {
            return ready(Err(ApiError::Unauthorized));
        };
        ready(decode_jwt(bearer.token()).map(Auth).map_err(|_| ApiError::Unauthorized))
    }
}

/// Issue a token for an identity-provider user id.
pub fn create_jwt(clerk_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = secret()?;
    let exp = (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize;
    let claims = Claims { sub: clerk_id.to_string(), exp };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

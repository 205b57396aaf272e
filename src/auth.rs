// Optional bearer-token authentication for search requests

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{config::Settings, models::Actor};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub exp: usize,  // Expiration time (seconds since epoch)
}

/// Verifies an HS256 token and returns its subject.
pub fn verify_token(token: &str, secret: &str) -> Result<Actor, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoded = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(Actor { id: decoded.claims.sub })
}

// Searches are open to everyone; a valid token only attributes the search to
// a user. Missing or bad credentials therefore never reject the request.
#[derive(Debug, Clone, Default)]
pub struct OptionalActor(pub Option<Actor>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalActor
where
    S: Send + Sync,
    Arc<Settings>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(TypedHeader(Authorization(bearer))) =
            parts.extract::<TypedHeader<Authorization<Bearer>>>().await
        else {
            return Ok(OptionalActor(None));
        };

        let settings = Arc::<Settings>::from_ref(state);
        let Some(secret) = settings.jwt_secret.as_deref() else {
            debug!("Bearer token ignored: no JWT secret configured");
            return Ok(OptionalActor(None));
        };

        match verify_token(bearer.token(), secret) {
            Ok(actor) => {
                debug!("Token validated for user: {}", actor.id);
                Ok(OptionalActor(Some(actor)))
            }
            Err(e) => {
                warn!("Token validation failed, treating request as anonymous: {}", e);
                Ok(OptionalActor(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, exp: usize) -> String {
        let claims = Claims { sub: sub.into(), exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn in_an_hour() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn valid_token_yields_actor() {
        let actor = verify_token(&token("s3cret", "user-7", in_an_hour()), "s3cret").unwrap();
        assert_eq!(actor.id, "user-7");
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        assert!(verify_token(&token("other", "user-7", in_an_hour()), "s3cret").is_err());
        assert!(verify_token(&token("s3cret", "user-7", 1_000), "s3cret").is_err());
    }
}

use crate::errors::ServiceError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header set by the upstream auth platform with the signed-in user's id
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Who is performing a back-office action.
///
/// Authentication itself lives in the hosted platform; this only reads the id it
/// forwards so movements and status history can record the actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actor(pub Option<Uuid>);

impl Actor {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor(None));
        };

        let value = raw
            .to_str()
            .map_err(|_| {
                ServiceError::InvalidInput(format!("{} is not valid text", ACTOR_HEADER))
            })?;

        Uuid::parse_str(value.trim())
            .map(|id| Actor(Some(id)))
            .map_err(|_| ServiceError::InvalidInput(format!("{} must be a UUID", ACTOR_HEADER)))
    }
}

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    response::Response,
};
use tracing::debug;

use crate::pages;

/// A numeric id from the route. Anything that isn't an integer is a 404,
/// not a 400.
#[derive(Debug, Clone, Copy)]
pub struct Id(pub i64);

impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i64>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(Id(id)),
            Err(rejection) => {
                debug!(path = %parts.uri.path(), %rejection, "Non-numeric id in path");
                Err(pages::not_found())
            }
        }
    }
}

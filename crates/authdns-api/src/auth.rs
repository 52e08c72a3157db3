//! Bearer-token authentication
//!
//! The management API historically authenticates with the non-standard
//! `Authentication: Bearer <token>` header; the standard `Authorization`
//! header is accepted as well since that is what most HTTP clients emit.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::ApiState;

pub async fn require_bearer(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = format!("Bearer {}", state.token);
    let presented = ["authentication", "authorization"].iter().any(|header| {
        request
            .headers()
            .get(*header)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == expected)
    });

    if presented {
        next.run(request).await
    } else {
        ApiError::Unauthorized.into_response()
    }
}

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Shared-secret header check for the admin CRUD surface (spec.md §6's
/// admin surface, outside the hard core). The admission/reputation
/// endpoints are deliberately left off this middleware — they are the
/// guarded workload's own hot path, not an admin operation.
pub async fn auth_middleware(State(api_key): State<String>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let provided = req.headers().get("X-Admission-Key").and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == api_key.as_str() => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

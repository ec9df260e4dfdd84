use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Response, StatusCode},
    middleware::Next,
};
use base64::{engine::general_purpose::STANDARD as base64, Engine};
use tracing::warn;

use crate::AppState;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Checks an `Authorization` header value of the form `Basic <base64(user:pass)>`.
    pub fn matches_header(&self, auth_header: Option<&str>) -> bool {
        let Some(encoded) = auth_header.and_then(|value| value.strip_prefix("Basic ")) else {
            return false;
        };
        let Ok(decoded) = base64.decode(encoded.trim()) else {
            return false;
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return false;
        };

        match credentials.split_once(':') {
            Some((username, password)) => {
                username == self.username && password == self.password
            }
            None => false,
        }
    }
}

fn unauthorized() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        header::HeaderValue::from_static("Basic realm=\"Please enter your credentials\""),
    );
    response
}

pub async fn basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response<Body> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    if state.credentials.matches_header(auth_header) {
        next.run(request).await
    } else {
        if auth_header.is_some() {
            warn!("Rejected dashboard credentials for {}", request.uri().path());
        }
        unauthorized()
    }
}

//! Auth endpoints: login/logout/refresh, registration, email confirmation,
//! password change and password reset.
//!
//! Handlers translate [`AuthError`] kinds into HTTP statuses and manage the
//! refresh cookie; all account logic lives in [`AuthService`].

use axum::{
    extract::{Extension, Path},
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, REFERRER_POLICY, RETRY_AFTER, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::{
    types::{
        LoginRequest, MessageResponse, PasswordChangeRequest, PasswordResetConfirmRequest,
        PasswordResetRequest, RegisterRequest, TokenResponse,
    },
    valid_email,
};
use crate::auth::{AuthConfig, AuthError, AuthService, Identity, ResendOutcome, TokenPair};

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 403, description = "Account is blocked"),
        (status = 429, description = "Too many failed attempts")
    ),
    tag = "auth"
)]
pub async fn login(
    auth: Extension<Arc<AuthService>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    match auth.login(&request.email, &request.password).await {
        Ok(pair) => token_response(auth.config(), &pair),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Refresh cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout(auth: Extension<Arc<AuthService>>) -> Response {
    // Tokens are stateless; logout only clears the cookie.
    let mut headers = HeaderMap::new();
    match clear_refresh_cookie(auth.config()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build refresh cookie: {err}");
        }
    }
    (StatusCode::NO_CONTENT, headers).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Fresh access token issued", body = TokenResponse),
        (status = 401, description = "Missing, invalid, or wrong-type refresh token"),
        (status = 403, description = "Account is blocked")
    ),
    tag = "auth"
)]
pub async fn refresh(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> Response {
    let Some(token) = extract_refresh_cookie(&headers, auth.config()) else {
        return error_response(&AuthError::TokenInvalid);
    };
    match auth.refresh(&token).await {
        Ok(pair) => {
            // Only an access token is minted; the refresh cookie stays as is.
            (
                StatusCode::OK,
                Json(TokenResponse {
                    access_token: pair.access,
                    token_type: "bearer".to_string(),
                    expires_in: auth.config().access_ttl_seconds(),
                }),
            )
                .into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, confirmation email queued", body = MessageResponse),
        (status = 409, description = "Email is already registered"),
        (status = 422, description = "Malformed email address")
    ),
    tag = "auth"
)]
pub async fn register(
    auth: Extension<Arc<AuthService>>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    if !valid_email(request.email.trim()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(MessageResponse {
                message: "Invalid email address".to_string(),
            }),
        )
            .into_response();
    }
    match auth.register(&request.email, &request.password).await {
        Ok(_record) => (
            StatusCode::CREATED,
            Json(MessageResponse {
                message: "Account created, check your inbox to confirm your email".to_string(),
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/email-confirm/{token}",
    params(
        ("token" = String, Path, description = "Signed confirmation token from the email link")
    ),
    responses(
        (status = 200, description = "Email confirmed", body = MessageResponse),
        (status = 422, description = "Link is invalid or expired")
    ),
    tag = "auth"
)]
pub async fn email_confirm(
    Path(token): Path<String>,
    auth: Extension<Arc<AuthService>>,
) -> Response {
    match auth.confirm_email(&token).await {
        Ok(()) => with_no_referrer(
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Email confirmed".to_string(),
                }),
            )
                .into_response(),
        ),
        Err(err) => with_no_referrer(error_response(&err)),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/email-confirm-resend",
    responses(
        (status = 200, description = "Confirmation email queued or already confirmed", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "auth"
)]
pub async fn email_confirm_resend(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> Response {
    let identity = match authenticate(&headers, &auth) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    match auth.resend_confirmation(identity.user_id).await {
        Ok(ResendOutcome::Sent) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Confirmation email sent".to_string(),
            }),
        )
            .into_response(),
        Ok(ResendOutcome::AlreadyConfirmed) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Email is already confirmed".to_string(),
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password-change",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 422, description = "Current password does not match")
    ),
    tag = "auth"
)]
pub async fn password_change(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    Json(request): Json<PasswordChangeRequest>,
) -> Response {
    let identity = match authenticate(&headers, &auth) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    match auth
        .change_password(
            identity.user_id,
            &request.current_password,
            &request.new_password,
        )
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Password changed".to_string(),
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset link sent if the email is registered", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn password_reset(
    auth: Extension<Arc<AuthService>>,
    Json(request): Json<PasswordResetRequest>,
) -> Response {
    // Identical response for known and unknown emails.
    match auth.request_password_reset(&request.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "If the email is registered, a reset link has been sent".to_string(),
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset-confirm/{token}",
    params(
        ("token" = String, Path, description = "Signed reset token from the email link")
    ),
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 422, description = "Link is invalid, expired, or already used")
    ),
    tag = "auth"
)]
pub async fn password_reset_confirm(
    Path(token): Path<String>,
    auth: Extension<Arc<AuthService>>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Response {
    match auth.confirm_password_reset(&token, &request.password).await {
        Ok(()) => with_no_referrer(
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Password reset".to_string(),
                }),
            )
                .into_response(),
        ),
        Err(err) => with_no_referrer(error_response(&err)),
    }
}

/// Resolve the bearer access token into an [`Identity`] or a ready
/// error response.
fn authenticate(headers: &HeaderMap, auth: &AuthService) -> Result<Identity, Response> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(error_response(&AuthError::TokenInvalid));
    };
    auth.authenticate_access(&token)
        .map_err(|err| error_response(&err))
}

fn token_response(config: &AuthConfig, pair: &TokenPair) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(refresh) = &pair.refresh {
        match refresh_cookie(config, refresh) {
            Ok(cookie) => {
                headers.insert(SET_COOKIE, cookie);
            }
            Err(err) => {
                error!("Failed to build refresh cookie: {err}");
            }
        }
    }
    (
        StatusCode::OK,
        headers,
        Json(TokenResponse {
            access_token: pair.access.clone(),
            token_type: "bearer".to_string(),
            expires_in: config.access_ttl_seconds(),
        }),
    )
        .into_response()
}

/// Map an [`AuthError`] kind onto its HTTP status. Infrastructure faults
/// are logged here and surface as an opaque 500.
fn error_response(err: &AuthError) -> Response {
    let status = match err {
        AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
        AuthError::AccountBlocked => StatusCode::FORBIDDEN,
        AuthError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::DuplicateEmail => StatusCode::CONFLICT,
        AuthError::WrongPassword | AuthError::LinkInvalid => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::WrongTokenType | AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
        AuthError::AdminRequired => StatusCode::FORBIDDEN,
        AuthError::Internal(inner) => {
            error!("Auth flow failed: {inner}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut headers = HeaderMap::new();
    if let AuthError::TooManyAttempts {
        retry_after_seconds,
    } = err
    {
        if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
            headers.insert(RETRY_AFTER, value);
        }
    }

    (
        status,
        headers,
        Json(MessageResponse {
            message: err.to_string(),
        }),
    )
        .into_response()
}

/// Token-in-URL responses must not leak the link via the Referer header.
fn with_no_referrer(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    response
}

/// Build a secure `HttpOnly` cookie carrying the refresh token.
fn refresh_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.refresh_cookie_name();
    let max_age = config.refresh_ttl_seconds();
    HeaderValue::from_str(&format!(
        "{name}={token}; Path=/; HttpOnly; SameSite=Lax; Secure; Max-Age={max_age}"
    ))
}

fn clear_refresh_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.refresh_cookie_name();
    HeaderValue::from_str(&format!(
        "{name}=; Path=/; HttpOnly; SameSite=Lax; Secure; Max-Age=0"
    ))
}

fn extract_refresh_cookie(headers: &HeaderMap, config: &AuthConfig) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == config.refresh_cookie_name() && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        clear_refresh_cookie, error_response, extract_bearer_token, extract_refresh_cookie,
        refresh_cookie,
    };
    use crate::auth::{AuthConfig, AuthError};
    use anyhow::{anyhow, Result};
    use axum::http::{
        header::{AUTHORIZATION, COOKIE, RETRY_AFTER},
        HeaderMap, HeaderValue, StatusCode,
    };
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("test-secret".to_string()),
            "torgi.dev".to_string(),
        )
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            error_response(&AuthError::InvalidCredentials).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(&AuthError::AccountBlocked).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            error_response(&AuthError::DuplicateEmail).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_response(&AuthError::WrongPassword).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            error_response(&AuthError::LinkInvalid).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            error_response(&AuthError::WrongTokenType).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            error_response(&AuthError::TokenInvalid).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            error_response(&AuthError::AdminRequired).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            error_response(&AuthError::Internal(anyhow!("boom"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn too_many_attempts_sets_retry_after() {
        let response = error_response(&AuthError::TooManyAttempts {
            retry_after_seconds: 120,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER),
            Some(&HeaderValue::from_static("120"))
        );
    }

    #[test]
    fn refresh_cookie_round_trip() -> Result<()> {
        let config = config();
        let cookie = refresh_cookie(&config, "token-value")?;
        let cookie_str = cookie.to_str()?;
        assert!(cookie_str.starts_with("refresh=token-value;"));
        assert!(cookie_str.contains("HttpOnly"));
        assert!(cookie_str.contains("Secure"));

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("other=1; {cookie_str}"))?,
        );
        assert_eq!(
            extract_refresh_cookie(&headers, &config),
            Some("token-value".to_string())
        );
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_immediately() -> Result<()> {
        let cookie = clear_refresh_cookie(&config())?;
        assert!(cookie.to_str()?.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn missing_or_empty_cookie_is_none() -> Result<()> {
        let config = config();
        let headers = HeaderMap::new();
        assert_eq!(extract_refresh_cookie(&headers, &config), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("refresh="));
        assert_eq!(extract_refresh_cookie(&headers, &config), None);
        Ok(())
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::{JwtClaims, JwtService},
    models::{
        refresh_token::RefreshTokenResponse,
        user::{AuthResponseCookie, ChangePasswordRequest, LoginRequest, RegisterRequest,
            UserProfile},
    },
    services::{auth_service::AuthService, AppState},
};

fn build_refresh_cookie(state: &AppState, token: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build(("refresh_token", token))
        .path("/api/v1/auth")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// POST /api/v1/auth/register - Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Validate request
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, format!("Validation error: {}", e)));
    }

    tracing::info!("Registering new user: {}", req.email);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    match service.register(req).await {
        Ok(response) => {
            tracing::info!("User registered successfully");

            // Set refresh_token as HTTP-only cookie
            let cookie = build_refresh_cookie(
                &state,
                response.refresh_token.clone(),
                time::Duration::days(30),
            );
            let jar = jar.add(cookie);

            // Return only access_token and user in JSON
            let response_body = AuthResponseCookie {
                access_token: response.access_token,
                user: response.user,
            };

            Ok((StatusCode::CREATED, jar, Json(response_body)))
        }
        Err(e) => {
            tracing::error!("Failed to register user: {}", e);
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

/// POST /api/v1/auth/login - Login with email and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Extract IP and User-Agent from headers
    let headers = request.headers();
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    // Extract JSON body
    let body_bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read body: {}", e),
            )
        })?;

    let req: LoginRequest = serde_json::from_slice(&body_bytes)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e)))?;

    // Validate request
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, format!("Validation error: {}", e)));
    }

    tracing::info!("Login attempt for user: {}", req.email);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    let email = req.email.clone();
    let remember_me = req.remember_me;

    // Check if account is locked due to failed login attempts
    let is_locked = service.check_failed_attempts(&email).await.unwrap_or(false); // Default to unlocked if Redis check fails

    if is_locked {
        tracing::warn!("Login blocked for {}: too many failed attempts", email);
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            "Too many failed login attempts. Please try again later.".to_string(),
        ));
    }

    match service.login(req, ip, user_agent).await {
        Ok(response) => {
            tracing::info!("User logged in successfully");

            // Clear failed login attempts on successful login
            let _ = service.clear_failed_attempts(&email).await;

            let max_age = if remember_me {
                time::Duration::days(30)
            } else {
                time::Duration::days(1)
            };
            let cookie = build_refresh_cookie(&state, response.refresh_token.clone(), max_age);
            let jar = jar.add(cookie);

            let response_body = AuthResponseCookie {
                access_token: response.access_token,
                user: response.user,
            };

            Ok((StatusCode::OK, jar, Json(response_body)))
        }
        Err(e) => {
            tracing::warn!("Failed login: {}", e);

            // Increment failed login attempts counter
            let count = service.increment_failed_attempts(&email).await.unwrap_or(0);
            tracing::warn!("Failed login attempts for {}: {}/5", email, count);

            Err((StatusCode::UNAUTHORIZED, e.to_string()))
        }
    }
}

/// POST /api/v1/auth/refresh - Refresh access token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::debug!("Refreshing access token");

    // Read refresh_token from HTTP-only cookie
    let refresh_token = jar
        .get("refresh_token")
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                "Missing refresh token cookie".to_string(),
            )
        })?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    match service.refresh_token(&refresh_token).await {
        Ok(access_token) => {
            tracing::debug!("Access token refreshed successfully");
            Ok((StatusCode::OK, Json(RefreshTokenResponse { access_token })))
        }
        Err(e) => {
            tracing::warn!("Failed to refresh token: {}", e);
            Err((StatusCode::UNAUTHORIZED, e.to_string()))
        }
    }
}

/// POST /api/v1/auth/logout - Logout (revoke refresh token)
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Logging out user");

    // Read refresh_token from HTTP-only cookie
    let refresh_token = jar
        .get("refresh_token")
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                "Missing refresh token cookie".to_string(),
            )
        })?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    match service.logout(&refresh_token).await {
        Ok(user_id) => {
            tracing::info!("User {} logged out successfully", user_id);

            // Clear the refresh_token cookie
            let cookie = build_refresh_cookie(&state, String::new(), time::Duration::ZERO);
            let jar = jar.add(cookie);

            Ok((StatusCode::NO_CONTENT, jar))
        }
        Err(e) => {
            tracing::error!("Failed to logout: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// GET /api/v1/auth/me - Get current user profile (protected)
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::debug!("Getting current user profile for user_id: {}", claims.sub);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    match service.get_user_by_id(&claims.sub).await {
        Ok(user) => {
            let profile = UserProfile::from(user);
            Ok((StatusCode::OK, Json(profile)))
        }
        Err(e) => {
            tracing::error!("Failed to get user: {}", e);
            Err((StatusCode::NOT_FOUND, e.to_string()))
        }
    }
}

/// POST /api/v1/auth/change-password - Change password (protected)
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Validate request
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, format!("Validation error: {}", e)));
    }

    tracing::info!("Changing password for user_id: {}", claims.sub);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    // Get current user
    let user = service
        .get_user_by_id(&claims.sub)
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;

    // Verify old password
    if !service
        .verify_password(&req.old_password, &user.password_hash)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    {
        return Err((StatusCode::UNAUTHORIZED, "Invalid old password".to_string()));
    }

    // Hash new password
    let new_password_hash = service
        .hash_password(&req.new_password)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // Update password in database
    use mongodb::bson::{doc, oid::ObjectId};
    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let users_collection = state.mongo.collection::<mongodb::bson::Document>("users");
    users_collection
        .update_one(
            doc! { "_id": user_id },
            doc! {
                "$set": {
                    "password_hash": new_password_hash,
                    "updatedAt": mongodb::bson::DateTime::now()
                }
            },
        )
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to update password: {}", e),
            )
        })?;

    tracing::info!("Password changed successfully for user_id: {}", claims.sub);

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Password changed successfully" })),
    ))
}

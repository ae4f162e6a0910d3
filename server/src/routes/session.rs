//! Credential login, logout, and the principal snapshot for the UI guard.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{Duration, Utc};
use entity::{sessions, users};
use platform_authz::PermissionFlags;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use serde_json::{Value, json};
use time::Duration as TimeDuration;
use uuid::Uuid;

use crate::{
    auth::{self, CurrentUser, SESSION_COOKIE},
    error::{HttpError, HttpResult, db_error},
    http::AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(request): Json<LoginRequest>,
) -> HttpResult<(PrivateCookieJar, Json<Value>)> {
    let user = users::Entity::find()
        .filter(users::Column::Email.eq(request.email))
        .one(&state.pool)
        .await
        .map_err(db_error)?;
    let Some(user) = user else {
        return Err(HttpError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials",
        ));
    };
    if !auth::verify_password(&request.password, &user.password_hash) {
        return Err(HttpError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials",
        ));
    }
    if user.status != users::AccountStatus::Active {
        return Err(HttpError::new(StatusCode::FORBIDDEN, "Account is inactive"));
    }

    let ttl_days = state.config.session_ttl_days;
    let session_id = Uuid::new_v4();
    let now = Utc::now();
    sessions::ActiveModel {
        id: Set(session_id),
        user_id: Set(user.id),
        created_at: Set(now.into()),
        expires_at: Set((now + Duration::days(ttl_days)).into()),
        ip: Set(None),
        user_agent: Set(None),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;

    let mut active: users::ActiveModel = user.clone().into();
    active.last_login_at = Set(Some(now.into()));
    let user = active.update(&state.pool).await.map_err(db_error)?;

    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::days(ttl_days))
        .build();
    let jar = jar.add(cookie);

    let principal = auth::principal_for(&user);
    Ok((
        jar,
        Json(json!({
            "success": true,
            "data": {
                "user": user,
                "permissions": PermissionFlags::for_principal(&principal),
            },
        })),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> HttpResult<(PrivateCookieJar, StatusCode)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(session_id) = Uuid::parse_str(cookie.value()) {
            let _ = sessions::Entity::delete_by_id(session_id)
                .exec(&state.pool)
                .await;
        }
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    Ok((jar, StatusCode::NO_CONTENT))
}

/// Principal snapshot for the client-side guard. Informational only — every
/// request is still checked by the gate.
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> HttpResult<Json<Value>> {
    let user = users::Entity::find_by_id(current.id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| HttpError::new(StatusCode::UNAUTHORIZED, "user not found"))?;
    let principal = auth::principal_for(&user);
    Ok(Json(json!({
        "success": true,
        "data": {
            "user": user,
            "role": principal.role,
            "permissionLevel": principal.permission_level,
            "permissions": PermissionFlags::for_principal(&principal),
        },
    })))
}

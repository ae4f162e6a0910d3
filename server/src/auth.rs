//! Session resolution and password helpers.
//!
//! The middleware here loads the principal for the current request; it never
//! makes allow/deny decisions — that is the gate's job. Inactive accounts
//! resolve to no principal at all, so downstream code only ever sees active
//! users.

use anyhow::anyhow;
use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use entity::{sessions, users};
use platform_authz::{PermissionLevel, Principal, Role};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    error::{HttpResult, db_error},
    http::AppState,
};

pub const SESSION_COOKIE: &str = "__Host-wt_session";

/// Request-scoped view of the authenticated user, for handlers that need
/// more than the bare principal (reporter name, email).
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub principal: Principal,
}

pub fn principal_for(user: &users::Model) -> Principal {
    Principal {
        id: user.id,
        role: match user.role {
            users::Role::Admin => Role::Admin,
            users::Role::Supervisor => Role::Supervisor,
            users::Role::User => Role::User,
        },
        permission_level: match user.permission_level {
            users::PermissionLevel::View => PermissionLevel::View,
            users::PermissionLevel::Edit => PermissionLevel::Edit,
        },
    }
}

/// Middleware: resolve the session cookie into a [`Principal`] and a
/// [`CurrentUser`] in request extensions. Requests without a valid session
/// pass through without either; the gate turns that into a denial where a
/// policy requires authentication.
pub async fn resolve_principal(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    match load_session_user(&state, &jar).await {
        Ok(Some(user)) => {
            let principal = principal_for(&user);
            req.extensions_mut().insert(principal.clone());
            req.extensions_mut().insert(CurrentUser {
                id: user.id,
                name: user.name,
                email: user.email,
                principal,
            });
            next.run(req).await
        }
        Ok(None) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

async fn load_session_user(
    state: &AppState,
    jar: &PrivateCookieJar,
) -> HttpResult<Option<users::Model>> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let Ok(session_id) = Uuid::parse_str(cookie.value()) else {
        return Ok(None);
    };
    let Some(session) = sessions::Entity::find_by_id(session_id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
    else {
        return Ok(None);
    };
    if session.expires_at.with_timezone(&Utc) < Utc::now() {
        let _ = sessions::Entity::delete_by_id(session_id)
            .exec(&state.pool)
            .await;
        return Ok(None);
    }
    let Some(user) = users::Entity::find_by_id(session.user_id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
    else {
        return Ok(None);
    };
    if user.status != users::AccountStatus::Active {
        return Ok(None);
    }
    Ok(Some(user))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("password hashing failed: {err}"))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

//! User account management. Mutations are admin-gated at the router; the
//! handlers re-check nothing — the gate is the enforcement boundary.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use entity::users;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    auth::{self, CurrentUser},
    error::{HttpError, HttpResult, db_error},
    http::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: users::Role,
    pub permission_level: users::PermissionLevel,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub role: users::Role,
    pub permission_level: users::PermissionLevel,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub status: Option<users::AccountStatus>,
}

fn validate_identity(name: &str, email: &str) -> HttpResult<()> {
    let mut errors = serde_json::Map::new();
    if name.trim().is_empty() || name.len() > 255 {
        errors.insert(
            "name".into(),
            json!(["must be a non-empty string of at most 255 characters"]),
        );
    }
    if email.trim().is_empty() || !email.contains('@') || email.len() > 255 {
        errors.insert("email".into(), json!(["must be a valid email address"]));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(HttpError::validation(
            "Validation failed",
            Value::Object(errors),
        ))
    }
}

async fn email_taken(state: &AppState, email: &str, ignore: Option<Uuid>) -> HttpResult<bool> {
    let mut query = users::Entity::find().filter(users::Column::Email.eq(email));
    if let Some(id) = ignore {
        query = query.filter(users::Column::Id.ne(id));
    }
    Ok(query.one(&state.pool).await.map_err(db_error)?.is_some())
}

pub async fn list(State(state): State<AppState>) -> HttpResult<Json<Value>> {
    let records = users::Entity::find()
        .order_by_desc(users::Column::CreatedAt)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(json!({ "success": true, "data": records })))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> HttpResult<(StatusCode, Json<Value>)> {
    validate_identity(&request.name, &request.email)?;
    if request.password.len() < 8 {
        return Err(HttpError::validation(
            "Validation failed",
            json!({ "password": ["must be at least 8 characters"] }),
        ));
    }
    if email_taken(&state, &request.email, None).await? {
        return Err(HttpError::validation(
            "Validation failed",
            json!({ "email": ["has already been taken"] }),
        ));
    }

    let password_hash = auth::hash_password(&request.password).map_err(HttpError::internal)?;
    let now = Utc::now();
    let record = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(request.name),
        email: Set(request.email),
        password_hash: Set(password_hash),
        role: Set(request.role),
        permission_level: Set(request.permission_level),
        status: Set(users::AccountStatus::Active),
        department: Set(request.department),
        last_login_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "data": record,
        })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> HttpResult<Json<Value>> {
    let record = users::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| HttpError::not_found("User not found"))?;
    validate_identity(&request.name, &request.email)?;
    if email_taken(&state, &request.email, Some(id)).await? {
        return Err(HttpError::validation(
            "Validation failed",
            json!({ "email": ["has already been taken"] }),
        ));
    }

    let mut active: users::ActiveModel = record.into();
    active.name = Set(request.name);
    active.email = Set(request.email);
    active.role = Set(request.role);
    active.permission_level = Set(request.permission_level);
    active.department = Set(request.department);
    if let Some(status) = request.status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now().into());
    let record = active.update(&state.pool).await.map_err(db_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "User updated successfully",
        "data": record,
    })))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Value>> {
    if id == current.id {
        return Err(HttpError::bad_request("You cannot delete your own account"));
    }
    let result = users::Entity::delete_by_id(id)
        .exec(&state.pool)
        .await
        .map_err(db_error)?;
    if result.rows_affected == 0 {
        return Err(HttpError::not_found("User not found"));
    }
    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}

pub async fn update_last_login(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Value>> {
    let record = users::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| HttpError::not_found("User not found"))?;
    let mut active: users::ActiveModel = record.into();
    active.last_login_at = Set(Some(Utc::now().into()));
    let record = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(json!({
        "success": true,
        "message": "Last login updated",
        "data": record,
    })))
}

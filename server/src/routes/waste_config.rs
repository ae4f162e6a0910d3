//! Reference-data CRUD: waste types and disposition methods.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use entity::{dispositions, waste_types};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    error::{HttpError, HttpResult, db_error},
    http::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ReferenceInput {
    pub name: String,
    #[serde(default)]
    pub svg: Option<String>,
}

fn validate_name(input: &ReferenceInput) -> HttpResult<()> {
    if input.name.trim().is_empty() || input.name.len() > 255 {
        return Err(HttpError::validation(
            "Validation failed",
            json!({ "name": ["must be a non-empty string of at most 255 characters"] }),
        ));
    }
    Ok(())
}

pub async fn list_waste_types(State(state): State<AppState>) -> HttpResult<Json<Value>> {
    let records = waste_types::Entity::find()
        .order_by_asc(waste_types::Column::Name)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(json!({ "success": true, "data": records })))
}

pub async fn create_waste_type(
    State(state): State<AppState>,
    Json(input): Json<ReferenceInput>,
) -> HttpResult<(StatusCode, Json<Value>)> {
    validate_name(&input)?;
    let exists = waste_types::Entity::find()
        .filter(waste_types::Column::Name.eq(input.name.clone()))
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .is_some();
    if exists {
        return Err(HttpError::validation(
            "Validation failed",
            json!({ "name": ["has already been taken"] }),
        ));
    }
    let record = waste_types::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(input.name),
        svg: Set(input.svg),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Waste type created successfully",
            "data": record,
        })),
    ))
}

pub async fn update_waste_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ReferenceInput>,
) -> HttpResult<Json<Value>> {
    validate_name(&input)?;
    let record = waste_types::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| HttpError::not_found("Waste type not found"))?;
    let mut active: waste_types::ActiveModel = record.into();
    active.name = Set(input.name);
    active.svg = Set(input.svg);
    let record = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(json!({
        "success": true,
        "message": "Waste type updated successfully",
        "data": record,
    })))
}

pub async fn delete_waste_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Value>> {
    let result = waste_types::Entity::delete_by_id(id)
        .exec(&state.pool)
        .await
        .map_err(db_error)?;
    if result.rows_affected == 0 {
        return Err(HttpError::not_found("Waste type not found"));
    }
    Ok(Json(json!({
        "success": true,
        "message": "Waste type deleted successfully",
    })))
}

pub async fn list_dispositions(State(state): State<AppState>) -> HttpResult<Json<Value>> {
    let records = dispositions::Entity::find()
        .order_by_asc(dispositions::Column::Name)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(json!({ "success": true, "data": records })))
}

pub async fn create_disposition(
    State(state): State<AppState>,
    Json(input): Json<ReferenceInput>,
) -> HttpResult<(StatusCode, Json<Value>)> {
    validate_name(&input)?;
    let exists = dispositions::Entity::find()
        .filter(dispositions::Column::Name.eq(input.name.clone()))
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .is_some();
    if exists {
        return Err(HttpError::validation(
            "Validation failed",
            json!({ "name": ["has already been taken"] }),
        ));
    }
    let record = dispositions::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(input.name),
        svg: Set(input.svg),
    }
    .insert(&state.pool)
    .await
    .map_err(db_error)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Disposition created successfully",
            "data": record,
        })),
    ))
}

pub async fn update_disposition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ReferenceInput>,
) -> HttpResult<Json<Value>> {
    validate_name(&input)?;
    let record = dispositions::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| HttpError::not_found("Disposition not found"))?;
    let mut active: dispositions::ActiveModel = record.into();
    active.name = Set(input.name);
    active.svg = Set(input.svg);
    let record = active.update(&state.pool).await.map_err(db_error)?;
    Ok(Json(json!({
        "success": true,
        "message": "Disposition updated successfully",
        "data": record,
    })))
}

pub async fn delete_disposition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Value>> {
    let result = dispositions::Entity::delete_by_id(id)
        .exec(&state.pool)
        .await
        .map_err(db_error)?;
    if result.rows_affected == 0 {
        return Err(HttpError::not_found("Disposition not found"));
    }
    Ok(Json(json!({
        "success": true,
        "message": "Disposition deleted successfully",
    })))
}

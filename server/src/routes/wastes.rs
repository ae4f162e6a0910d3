//! Waste record CRUD. Authorization is handled entirely by the gate; these
//! handlers only validate and persist.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use entity::wastes;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    error::{HttpError, HttpResult, db_error},
    http::AppState,
};

#[derive(Clone, Debug, Deserialize)]
pub struct WasteInput {
    pub type_of_waste: String,
    pub disposition: String,
    pub weight: f64,
    pub unit: String,
    pub input_by: String,
    #[serde(default)]
    pub verified_by: Option<String>,
}

/// The intake form submits either one record or a bulk batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WastePayload {
    Bulk { items: Vec<WasteInput> },
    Single(WasteInput),
}

fn validate(input: &WasteInput, item_label: Option<usize>) -> HttpResult<()> {
    let mut errors = serde_json::Map::new();
    if input.type_of_waste.trim().is_empty() || input.type_of_waste.len() > 255 {
        errors.insert(
            "type_of_waste".into(),
            json!(["must be a non-empty string of at most 255 characters"]),
        );
    }
    if input.disposition.trim().is_empty() || input.disposition.len() > 255 {
        errors.insert(
            "disposition".into(),
            json!(["must be a non-empty string of at most 255 characters"]),
        );
    }
    if !input.weight.is_finite() || input.weight < 0.0 {
        errors.insert("weight".into(), json!(["must be a number of at least 0"]));
    }
    if input.unit.trim().is_empty() || input.unit.len() > 50 {
        errors.insert(
            "unit".into(),
            json!(["must be a non-empty string of at most 50 characters"]),
        );
    }
    if input.input_by.trim().is_empty() || input.input_by.len() > 100 {
        errors.insert(
            "input_by".into(),
            json!(["must be a non-empty string of at most 100 characters"]),
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        let message = match item_label {
            Some(index) => format!("Validation failed for item {}", index + 1),
            None => "Validation failed".to_string(),
        };
        Err(HttpError::validation(message, Value::Object(errors)))
    }
}

fn to_active(input: WasteInput) -> wastes::ActiveModel {
    let now = Utc::now();
    wastes::ActiveModel {
        id: Set(Uuid::new_v4()),
        type_of_waste: Set(input.type_of_waste),
        disposition: Set(input.disposition),
        weight: Set(input.weight),
        unit: Set(input.unit),
        input_by: Set(input.input_by),
        verified_by: Set(input.verified_by),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
}

pub async fn list(State(state): State<AppState>) -> HttpResult<Json<Value>> {
    let records = wastes::Entity::find()
        .order_by_desc(wastes::Column::CreatedAt)
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(json!({ "success": true, "data": records })))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Value>> {
    let record = wastes::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| HttpError::not_found("Waste item not found"))?;
    Ok(Json(json!({ "success": true, "data": record })))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<WastePayload>,
) -> HttpResult<(StatusCode, Json<Value>)> {
    match payload {
        WastePayload::Bulk { items } => {
            // Validate the whole batch before touching the database.
            for (index, item) in items.iter().enumerate() {
                validate(item, Some(index))?;
            }
            let mut created = Vec::with_capacity(items.len());
            for item in items {
                let record = to_active(item).insert(&state.pool).await.map_err(db_error)?;
                created.push(record);
            }
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "message": "Waste items created successfully",
                    "data": created,
                })),
            ))
        }
        WastePayload::Single(item) => {
            validate(&item, None)?;
            let record = to_active(item).insert(&state.pool).await.map_err(db_error)?;
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "message": "Waste item created successfully",
                    "data": record,
                })),
            ))
        }
    }
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<WasteInput>,
) -> HttpResult<Json<Value>> {
    let record = wastes::Entity::find_by_id(id)
        .one(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| HttpError::not_found("Waste item not found"))?;
    validate(&input, None)?;

    let mut active: wastes::ActiveModel = record.into();
    active.type_of_waste = Set(input.type_of_waste);
    active.disposition = Set(input.disposition);
    active.weight = Set(input.weight);
    active.unit = Set(input.unit);
    active.input_by = Set(input.input_by);
    active.verified_by = Set(input.verified_by);
    active.updated_at = Set(Utc::now().into());
    let record = active.update(&state.pool).await.map_err(db_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Waste item updated successfully",
        "data": record,
    })))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Value>> {
    let result = wastes::Entity::delete_by_id(id)
        .exec(&state.pool)
        .await
        .map_err(db_error)?;
    if result.rows_affected == 0 {
        return Err(HttpError::not_found("Waste item not found"));
    }
    Ok(Json(json!({
        "success": true,
        "message": "Waste item deleted successfully",
    })))
}

#[derive(Deserialize)]
pub struct CheckSubmissionQuery {
    pub user_name: String,
}

/// Whether the named reporter has already logged waste today.
pub async fn check_submission(
    State(state): State<AppState>,
    Query(query): Query<CheckSubmissionQuery>,
) -> HttpResult<Json<Value>> {
    let today_start = Utc::now()
        .date_naive()
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    let submitted = wastes::Entity::find()
        .filter(wastes::Column::InputBy.eq(query.user_name))
        .filter(wastes::Column::CreatedAt.gte(today_start))
        .count(&state.pool)
        .await
        .map_err(db_error)?
        > 0;
    Ok(Json(json!({ "submitted": submitted })))
}

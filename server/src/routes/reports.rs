//! Read-only reporting endpoints.

use axum::{Extension, Json, extract::State};
use entity::wastes;
use platform_authz::PermissionFlags;
use sea_orm::{ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    auth::CurrentUser,
    error::{HttpResult, db_error},
    http::AppState,
};

/// Waste log for the reports screen. View-only principals see only the
/// records they entered themselves; editors see everything. The embedded
/// permission flags drive the report UI and are derived from the same engine
/// the gate uses.
pub async fn waste_reports(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> HttpResult<Json<Value>> {
    let flags = PermissionFlags::for_principal(&current.principal);
    let mut query = wastes::Entity::find().order_by_desc(wastes::Column::CreatedAt);
    if flags.is_view_only {
        query = query.filter(wastes::Column::InputBy.eq(current.name.clone()));
    }
    let records = query.all(&state.pool).await.map_err(db_error)?;
    Ok(Json(json!({
        "success": true,
        "data": records,
        "permissions": flags,
    })))
}

#[derive(Debug, FromQueryResult, Serialize)]
struct TypeTotal {
    type_of_waste: String,
    total_weight: Option<f64>,
    entries: i64,
}

/// Aggregate totals per waste type, for the supervisor analytics screen.
pub async fn analytics(State(state): State<AppState>) -> HttpResult<Json<Value>> {
    let totals = wastes::Entity::find()
        .select_only()
        .column(wastes::Column::TypeOfWaste)
        .column_as(wastes::Column::Weight.sum(), "total_weight")
        .column_as(wastes::Column::Id.count(), "entries")
        .group_by(wastes::Column::TypeOfWaste)
        .order_by_asc(wastes::Column::TypeOfWaste)
        .into_model::<TypeTotal>()
        .all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(json!({ "success": true, "data": totals })))
}

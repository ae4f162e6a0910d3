use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One logged disposal event. `input_by` and `verified_by` hold reporter
/// display names, matching what the intake forms submit.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "wastes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub type_of_waste: String,
    pub disposition: String,
    pub weight: f64,
    pub unit: String,
    pub input_by: String,
    pub verified_by: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

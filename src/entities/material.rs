use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Category assigned to materials auto-created by the delivery workflow
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// A catalog entry for a kind of equipment (not a specific physical unit).
/// `stock` counts the serialized units currently in stock and is maintained
/// by serial registration and serial status changes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 255, message = "Material name is required"))]
    pub name: String,

    pub category: String,
    pub stock: i32,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::serial_unit::Entity")]
    SerialUnit,
}

impl Related<super::serial_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SerialUnit.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Ok(self)
    }
}

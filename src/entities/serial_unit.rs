use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a physical serialized unit, independent from the order
/// lifecycle. Driven by assignment, repair, and retirement updates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SerialStatus {
    InStock,
    Assigned,
    InRepair,
    Retired,
    Remote,
}

impl SerialStatus {
    /// Retired units cannot come back; everything else may move freely.
    pub fn can_transition_to(self, target: SerialStatus) -> bool {
        self != SerialStatus::Retired || target == SerialStatus::Retired
    }

    /// Whether a unit in this status counts toward its material's stock.
    pub fn counts_as_stock(self) -> bool {
        self == SerialStatus::InStock
    }
}

/// One physical, uniquely numbered unit of a material. The serial number is
/// an intended-unique business key checked at the application level before
/// insert; there is no database uniqueness constraint.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "serial_units")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub serial_number: String,
    pub material_id: Uuid,
    /// Provenance link to the order line whose delivery produced this unit
    pub order_line_id: Option<Uuid>,
    pub status: String,
    pub purchase_date: DateTime<Utc>,
    pub warranty_end: Option<NaiveDate>,
    pub renewal_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Parse the persisted status string, rejecting unknown values.
    pub fn serial_status(&self) -> Result<SerialStatus, String> {
        self.status
            .parse()
            .map_err(|_| format!("Unknown serial status: {}", self.status))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
    #[sea_orm(
        belongs_to = "super::order_line::Entity",
        from = "Column::OrderLineId",
        to = "super::order_line::Column::Id"
    )]
    OrderLine,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLine.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            SerialStatus::InStock,
            SerialStatus::Assigned,
            SerialStatus::InRepair,
            SerialStatus::Retired,
            SerialStatus::Remote,
        ] {
            let s = status.to_string();
            assert_eq!(s.parse::<SerialStatus>().unwrap(), status);
        }
        assert_eq!(SerialStatus::InRepair.to_string(), "in_repair");
    }

    #[test]
    fn retired_is_a_dead_end() {
        assert!(!SerialStatus::Retired.can_transition_to(SerialStatus::InStock));
        assert!(SerialStatus::Retired.can_transition_to(SerialStatus::Retired));
        assert!(SerialStatus::Assigned.can_transition_to(SerialStatus::InRepair));
        assert!(SerialStatus::Remote.can_transition_to(SerialStatus::Retired));
    }

    #[test]
    fn only_in_stock_counts_as_stock() {
        assert!(SerialStatus::InStock.counts_as_stock());
        assert!(!SerialStatus::Assigned.counts_as_stock());
        assert!(!SerialStatus::InRepair.counts_as_stock());
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Purchase order lifecycle. The ordering of the variants is the lifecycle
/// ordering: transitions may only move forward.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Requested,
    InternalCircuit,
    SupplierOrdered,
    Delivered,
}

impl OrderStatus {
    /// Forward-only lifecycle: skipping intermediate states is allowed,
    /// same-status updates are no-ops, going backward is not.
    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        target >= self
    }

    pub fn is_terminal(self) -> bool {
        self == OrderStatus::Delivered
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Order reference must be between 1 and 50 characters"
    ))]
    pub reference: String,

    pub supplier: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

impl Model {
    /// Parse the persisted status string, rejecting unknown values.
    pub fn order_status(&self) -> Result<OrderStatus, String> {
        self.status
            .parse()
            .map_err(|_| format!("Unknown order status: {}", self.status))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_line::Entity")]
    OrderLine,
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLine.def()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Requested,
            OrderStatus::InternalCircuit,
            OrderStatus::SupplierOrdered,
            OrderStatus::Delivered,
        ] {
            let s = status.to_string();
            assert_eq!(s.parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(OrderStatus::SupplierOrdered.to_string(), "supplier_ordered");
    }

    #[test]
    fn transitions_are_forward_only() {
        use OrderStatus::*;

        assert!(Requested.can_transition_to(InternalCircuit));
        assert!(Requested.can_transition_to(Delivered));
        assert!(InternalCircuit.can_transition_to(SupplierOrdered));
        assert!(SupplierOrdered.can_transition_to(Delivered));
        // no-op transitions are allowed
        assert!(SupplierOrdered.can_transition_to(SupplierOrdered));

        assert!(!Delivered.can_transition_to(SupplierOrdered));
        assert!(!SupplierOrdered.can_transition_to(Requested));
        assert!(!InternalCircuit.can_transition_to(Requested));
    }

    #[test]
    fn delivered_is_terminal() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::SupplierOrdered.is_terminal());
    }
}

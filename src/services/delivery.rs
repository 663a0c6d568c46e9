use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::material::{
        ActiveModel as MaterialActiveModel, Entity as MaterialEntity, DEFAULT_CATEGORY,
    },
    entities::order::{ActiveModel as OrderActiveModel, Entity as OrderEntity, OrderStatus},
    entities::order_line::{self, Entity as OrderLineEntity, Model as OrderLineModel},
    entities::serial_unit::{ActiveModel as SerialActiveModel, SerialStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::serials::{adjust_material_stock, serial_number_exists},
};

/// Serial numbers entered per order line
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmDeliveryRequest {
    /// Map from order line id to the serial numbers delivered for that line.
    /// Blank entries are discarded before processing.
    pub serials_by_line: HashMap<Uuid, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LineDeliveryOutcome {
    pub line_id: Uuid,
    pub material_id: Option<Uuid>,
    /// Serial units persisted for this line in this call
    pub serials_registered: u32,
    /// Present when the line's transaction was rolled back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeliveryOutcome {
    pub order_id: Uuid,
    /// True when every line of the order now satisfies
    /// `delivered_quantity >= quantity`
    pub fully_delivered: bool,
    pub lines: Vec<LineDeliveryOutcome>,
}

/// The order is fully delivered when it has lines and every line's delivered
/// count has reached its ordered count. An order without lines is never
/// considered delivered.
pub fn order_fully_delivered(lines: &[OrderLineModel]) -> bool {
    !lines.is_empty() && lines.iter().all(|line| line.is_satisfied())
}

struct LineResult {
    material_id: Uuid,
    material_created: bool,
    serials_registered: u32,
}

/// Delivery reconciliation workflow: turns entered serial numbers into
/// persisted material/serial records, advances per-line delivery counters,
/// and decides whether the parent order reaches its terminal status.
#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl DeliveryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Confirms a (possibly partial) delivery against an order.
    ///
    /// Each line is processed independently inside its own transaction: the
    /// material auto-create, the serial inserts, and the counter increments
    /// commit or roll back together. One line's failure is reported in its
    /// outcome and never disturbs sibling lines. Counter updates are
    /// server-side increments, so concurrent confirmations cannot lose
    /// updates.
    #[instrument(skip(self, request), fields(order_id = %order_id, confirmed_by = %confirmed_by))]
    pub async fn confirm_delivery(
        &self,
        order_id: Uuid,
        request: ConfirmDeliveryRequest,
        confirmed_by: &str,
    ) -> Result<DeliveryOutcome, ServiceError> {
        let db = &*self.db;

        let order_model = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current_status = order_model
            .order_status()
            .map_err(ServiceError::InvalidStatus)?;

        let lines = OrderLineEntity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_line::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut serials_by_line = request.serials_by_line;
        for unknown in serials_by_line
            .keys()
            .filter(|line_id| !lines.iter().any(|line| line.id == **line_id))
        {
            warn!(order_id = %order_id, line_id = %unknown, "Ignoring serials for unknown order line");
        }

        // Process lines in their stored order so outcomes are deterministic
        let mut outcomes = Vec::new();
        let mut created_materials = Vec::new();
        for line in &lines {
            let serials = match serials_by_line.remove(&line.id) {
                Some(serials) => serials,
                None => continue,
            };

            let serials: Vec<String> = serials
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            if serials.is_empty() {
                continue;
            }

            match self.process_line(line, &serials).await {
                Ok(result) => {
                    if result.material_created {
                        created_materials.push(result.material_id);
                    }
                    outcomes.push(LineDeliveryOutcome {
                        line_id: line.id,
                        material_id: Some(result.material_id),
                        serials_registered: result.serials_registered,
                        error: None,
                    });
                }
                Err(e) => {
                    error!(
                        order_id = %order_id,
                        line_id = %line.id,
                        error = %e,
                        "Delivery line rolled back"
                    );
                    outcomes.push(LineDeliveryOutcome {
                        line_id: line.id,
                        material_id: line.material_id,
                        serials_registered: 0,
                        error: Some(e.response_message()),
                    });
                }
            }
        }

        // A call without any non-blank serial performs no writes and never
        // touches the order status
        if outcomes.is_empty() {
            info!(order_id = %order_id, "Delivery confirmation carried no serial numbers");
            return Ok(DeliveryOutcome {
                order_id,
                fully_delivered: false,
                lines: outcomes,
            });
        }

        if let Some(event_sender) = &self.event_sender {
            for material_id in created_materials {
                event_sender
                    .send_or_log(Event::MaterialCreated(material_id))
                    .await;
            }
        }

        // Completion is determined from a fresh read, not from the in-memory
        // deltas accumulated above
        let lines = OrderLineEntity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let fully_delivered = order_fully_delivered(&lines);

        if fully_delivered {
            if current_status != OrderStatus::Delivered {
                self.mark_delivered(&order_model.id).await?;
                info!(order_id = %order_id, "Order fully delivered");

                if let Some(event_sender) = &self.event_sender {
                    event_sender.send_or_log(Event::OrderDelivered(order_id)).await;
                }
            }
        } else {
            let outstanding = lines.iter().filter(|line| !line.is_satisfied()).count() as u64;
            info!(
                order_id = %order_id,
                outstanding_lines = outstanding,
                "Partial delivery recorded"
            );

            if let Some(event_sender) = &self.event_sender {
                event_sender
                    .send_or_log(Event::OrderPartiallyDelivered {
                        order_id,
                        outstanding_lines: outstanding,
                    })
                    .await;
            }
        }

        Ok(DeliveryOutcome {
            order_id,
            fully_delivered,
            lines: outcomes,
        })
    }

    /// Runs one line's material resolution, serial inserts, and counter
    /// increments inside a single transaction.
    async fn process_line(
        &self,
        line: &OrderLineModel,
        serials: &[String],
    ) -> Result<LineResult, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let (material_id, material_created) = self.resolve_material(&txn, line).await?;

        let now = Utc::now();
        for serial_number in serials {
            if serial_number_exists(&txn, serial_number).await? {
                return Err(ServiceError::Conflict(format!(
                    "Serial number '{}' is already registered",
                    serial_number
                )));
            }

            let serial = SerialActiveModel {
                id: Set(Uuid::new_v4()),
                serial_number: Set(serial_number.clone()),
                material_id: Set(material_id),
                order_line_id: Set(Some(line.id)),
                status: Set(SerialStatus::InStock.to_string()),
                purchase_date: Set(now),
                warranty_end: Set(None),
                renewal_date: Set(None),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            };

            serial.insert(&txn).await.map_err(|e| {
                error!(error = %e, line_id = %line.id, "Failed to insert serial unit");
                ServiceError::DatabaseError(e)
            })?;
        }

        let count = serials.len() as i32;

        // Server-side increment keyed on the line id; never read-modify-write
        OrderLineEntity::update_many()
            .col_expr(
                order_line::Column::DeliveredQuantity,
                Expr::col(order_line::Column::DeliveredQuantity).add(count),
            )
            .col_expr(order_line::Column::UpdatedAt, Expr::value(now))
            .filter(order_line::Column::Id.eq(line.id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        adjust_material_stock(&txn, material_id, count).await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        Ok(LineResult {
            material_id,
            material_created,
            serials_registered: count as u32,
        })
    }

    /// Resolves the line's catalog material by identity, auto-creating it
    /// from the line when absent. Newly created ids are persisted back onto
    /// the line inside the same transaction.
    async fn resolve_material(
        &self,
        txn: &DatabaseTransaction,
        line: &OrderLineModel,
    ) -> Result<(Uuid, bool), ServiceError> {
        if let Some(material_id) = line.material_id {
            let existing = MaterialEntity::find_by_id(material_id)
                .one(txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
            if existing.is_some() {
                return Ok((material_id, false));
            }
            warn!(
                line_id = %line.id,
                material_id = %material_id,
                "Order line references a missing material; creating it from the line"
            );
        }

        let now = Utc::now();
        let material_id = Uuid::new_v4();

        let material = MaterialActiveModel {
            id: Set(material_id),
            name: Set(line.material_name.clone()),
            category: Set(DEFAULT_CATEGORY.to_string()),
            stock: Set(0),
            unit_price: Set(line.unit_price),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        material.insert(txn).await.map_err(|e| {
            error!(error = %e, line_id = %line.id, "Failed to auto-create material");
            ServiceError::DatabaseError(e)
        })?;

        // Populate the lazy catalog link so later deliveries resolve by id
        OrderLineEntity::update_many()
            .col_expr(order_line::Column::MaterialId, Expr::value(material_id))
            .col_expr(order_line::Column::UpdatedAt, Expr::value(now))
            .filter(order_line::Column::Id.eq(line.id))
            .exec(txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(
            line_id = %line.id,
            material_id = %material_id,
            name = %line.material_name,
            "Material auto-created for delivery"
        );

        Ok((material_id, true))
    }

    async fn mark_delivered(&self, order_id: &Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;

        let order_model = OrderEntity::find_by_id(*order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: OrderActiveModel = order_model.into();
        active.status = Set(OrderStatus::Delivered.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let current_version = *active.version.as_ref();
        active.version = Set(current_version + 1);

        active.update(db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to mark order delivered");
            ServiceError::DatabaseError(e)
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line_with(quantity: i32, delivered_quantity: i32) -> OrderLineModel {
        let now = Utc::now();
        OrderLineModel {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            material_id: None,
            material_name: "Screen".to_string(),
            quantity,
            unit_price: dec!(100),
            tax_rate: dec!(0.2),
            delivered_quantity,
            created_at: now,
            updated_at: Some(now),
        }
    }

    #[test]
    fn empty_order_is_never_fully_delivered() {
        assert!(!order_fully_delivered(&[]));
    }

    #[test]
    fn single_unsatisfied_line_blocks_completion() {
        let lines = vec![line_with(3, 3), line_with(2, 1)];
        assert!(!order_fully_delivered(&lines));
    }

    #[test]
    fn over_delivery_still_counts_as_satisfied() {
        let lines = vec![line_with(3, 5)];
        assert!(order_fully_delivered(&lines));
    }

    proptest! {
        /// Completion holds exactly when every line's delivered count
        /// reaches its ordered count
        #[test]
        fn completion_matches_per_line_predicate(
            quantities in prop::collection::vec((1i32..50, 0i32..100), 1..10)
        ) {
            let lines: Vec<OrderLineModel> = quantities
                .iter()
                .map(|(quantity, delivered)| line_with(*quantity, *delivered))
                .collect();

            let expected = quantities.iter().all(|(quantity, delivered)| delivered >= quantity);
            prop_assert_eq!(order_fully_delivered(&lines), expected);
        }
    }
}

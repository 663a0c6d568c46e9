use crate::{
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
        OrderStatus,
    },
    entities::order_line::{
        self, ActiveModel as OrderLineActiveModel, Entity as OrderLineEntity,
        Model as OrderLineModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount must not be negative".into());
        Err(err)
    }
}

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 50, message = "Order reference is required"))]
    pub reference: String,
    #[validate(length(min = 1, message = "Supplier is required"))]
    pub supplier: String,
    /// Defaults to the configured currency when omitted
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    /// Defaults to the tax-inclusive sum of the lines when omitted
    pub total_amount: Option<Decimal>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "An order needs at least one line"))]
    pub lines: Vec<CreateOrderLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderLineRequest {
    /// Catalog id; may be absent for materials not yet in the catalog
    pub material_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Material name is required"))]
    pub material_name: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "validate_non_negative_decimal")]
    pub unit_price: Decimal,
    #[validate(custom = "validate_non_negative_decimal")]
    pub tax_rate: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub reference: String,
    pub supplier: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub lines: Vec<OrderLineResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub material_id: Option<Uuid>,
    pub material_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub delivered_quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Filters accepted by the order listing
#[derive(Debug, Default)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
}

/// Service for managing orders and their lines
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
    default_currency: String,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<Arc<EventSender>>,
        default_currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_currency,
        }
    }

    /// Creates a new order and its lines in one transaction
    #[instrument(skip(self, request), fields(reference = %request.reference, supplier = %request.supplier))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for line in &request.lines {
            line.validate()
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }

        let db = &*self.db;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| self.default_currency.clone());
        let total_amount = request
            .total_amount
            .unwrap_or_else(|| Self::lines_total(&request.lines));

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            reference: Set(request.reference.clone()),
            supplier: Set(request.supplier.clone()),
            total_amount: Set(total_amount),
            currency: Set(currency),
            status: Set(OrderStatus::Requested.to_string()),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let order_model = order_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        let mut line_models = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let line_active_model = OrderLineActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                material_id: Set(line.material_id),
                material_name: Set(line.material_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                tax_rate: Set(line.tax_rate),
                delivered_quantity: Set(0),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            };

            let line_model = line_active_model.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to create order line");
                ServiceError::DatabaseError(e)
            })?;
            line_models.push(line_model);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, lines = line_models.len(), "Order created successfully");

        if let Some(event_sender) = &self.event_sender {
            event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        }

        Self::model_to_response(order_model, line_models)
    }

    /// Retrieves an order and its lines by ID
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order from database");
                ServiceError::DatabaseError(e)
            })?;

        match order {
            Some(order_model) => {
                let lines = self.get_order_lines(order_id).await?;
                Ok(Some(Self::model_to_response_from_lines(order_model, lines)?))
            }
            None => Ok(None),
        }
    }

    /// Fetches the persisted lines of an order
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_lines(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderLineResponse>, ServiceError> {
        let db = &*self.db;

        let lines = OrderLineEntity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_line::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order lines");
                ServiceError::DatabaseError(e)
            })?;

        Ok(lines.into_iter().map(Self::line_to_response).collect())
    }

    /// Lists orders with pagination and optional filters
    #[instrument(skip(self, filter))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        filter: OrderListFilter,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db;

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);

        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            query = query.filter(
                Condition::any()
                    .add(order::Column::Reference.contains(search))
                    .add(order::Column::Supplier.contains(search)),
            );
        }

        let paginator = query.paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page.saturating_sub(1)).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        let mut order_responses = Vec::with_capacity(orders.len());
        for order_model in orders {
            let lines = self.get_order_lines(order_model.id).await?;
            order_responses.push(Self::model_to_response_from_lines(order_model, lines)?);
        }

        Ok(OrderListResponse {
            orders: order_responses,
            total,
            page,
            per_page,
        })
    }

    /// Explicit status override. Transitions are forward-only; the delivery
    /// reconciliation workflow is the other (and usual) writer of `delivered`.
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let new_status: OrderStatus = request.status.parse().map_err(|_| {
            ServiceError::InvalidStatus(format!("Unknown order status: {}", request.status))
        })?;

        let db = &*self.db;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for status update");
            ServiceError::DatabaseError(e)
        })?;

        let order_model = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to find order for status update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found for status update");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        let old_status = order_model
            .order_status()
            .map_err(ServiceError::InvalidStatus)?;

        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition from status '{}' to '{}'",
                old_status, new_status
            )));
        }

        let mut active: OrderActiveModel = order_model.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(now));
        let current_version = *active.version.as_ref();
        active.version = Set(current_version + 1);

        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit status update transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated successfully"
        );

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: new_status.to_string(),
                })
                .await;
        }

        let lines = self.get_order_lines(order_id).await?;
        Self::model_to_response_from_lines(updated, lines)
    }

    /// Hard-deletes an order and its lines. Unrelated to the reconciliation
    /// path, which never deletes.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for order deletion");
            ServiceError::DatabaseError(e)
        })?;

        let order_model = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| ServiceError::DatabaseError(e))?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        OrderLineEntity::delete_many()
            .filter(order_line::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to delete order lines");
                ServiceError::DatabaseError(e)
            })?;

        order_model.delete(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to delete order");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order deletion transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "Order deleted");

        if let Some(event_sender) = &self.event_sender {
            event_sender.send_or_log(Event::OrderDeleted(order_id)).await;
        }

        Ok(())
    }

    /// Tax-inclusive total of the requested lines
    fn lines_total(lines: &[CreateOrderLineRequest]) -> Decimal {
        lines
            .iter()
            .map(|line| {
                let net = line.unit_price * Decimal::from(line.quantity);
                net + net * line.tax_rate
            })
            .sum()
    }

    fn line_to_response(model: OrderLineModel) -> OrderLineResponse {
        OrderLineResponse {
            id: model.id,
            order_id: model.order_id,
            material_id: model.material_id,
            material_name: model.material_name,
            quantity: model.quantity,
            unit_price: model.unit_price,
            tax_rate: model.tax_rate,
            delivered_quantity: model.delivered_quantity,
        }
    }

    fn model_to_response(
        model: OrderModel,
        lines: Vec<OrderLineModel>,
    ) -> Result<OrderResponse, ServiceError> {
        let lines = lines.into_iter().map(Self::line_to_response).collect();
        Self::model_to_response_from_lines(model, lines)
    }

    fn model_to_response_from_lines(
        model: OrderModel,
        lines: Vec<OrderLineResponse>,
    ) -> Result<OrderResponse, ServiceError> {
        let status = model.order_status().map_err(ServiceError::InvalidStatus)?;
        Ok(OrderResponse {
            id: model.id,
            reference: model.reference,
            supplier: model.supplier,
            total_amount: model.total_amount,
            currency: model.currency,
            status,
            notes: model.notes,
            lines,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, unit_price: Decimal, tax_rate: Decimal) -> CreateOrderLineRequest {
        CreateOrderLineRequest {
            material_id: None,
            material_name: "Laptop".to_string(),
            quantity,
            unit_price,
            tax_rate,
        }
    }

    #[test]
    fn lines_total_is_tax_inclusive() {
        let lines = vec![line(2, dec!(100.00), dec!(0.20)), line(1, dec!(50.00), dec!(0))];
        // 2 * 100 * 1.2 + 50 = 290
        assert_eq!(OrderService::lines_total(&lines), dec!(290.00));
    }

    #[test]
    fn create_request_validation_rejects_empty_lines() {
        let request = CreateOrderRequest {
            reference: "CMD-2024-001".into(),
            supplier: "Dell".into(),
            currency: None,
            total_amount: None,
            notes: None,
            lines: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_validation_rejects_zero_quantity() {
        let request = CreateOrderRequest {
            reference: "CMD-2024-001".into(),
            supplier: "Dell".into(),
            currency: Some("EUR".into()),
            total_amount: None,
            notes: None,
            lines: vec![line(0, dec!(10), dec!(0))],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn model_to_response_maps_status() {
        let now = Utc::now();
        let model = OrderModel {
            id: Uuid::new_v4(),
            reference: "CMD-2024-001".to_string(),
            supplier: "Dell".to_string(),
            total_amount: dec!(99.99),
            currency: "EUR".to_string(),
            status: "supplier_ordered".to_string(),
            notes: None,
            created_at: now,
            updated_at: Some(now),
            version: 1,
        };

        let response = OrderService::model_to_response(model, vec![]).unwrap();
        assert_eq!(response.status, OrderStatus::SupplierOrdered);
        assert_eq!(response.total_amount, dec!(99.99));
    }

    #[test]
    fn model_to_response_rejects_unknown_status() {
        let now = Utc::now();
        let model = OrderModel {
            id: Uuid::new_v4(),
            reference: "CMD-2024-001".to_string(),
            supplier: "Dell".to_string(),
            total_amount: dec!(1),
            currency: "EUR".to_string(),
            status: "teleported".to_string(),
            notes: None,
            created_at: now,
            updated_at: None,
            version: 1,
        };

        assert!(OrderService::model_to_response(model, vec![]).is_err());
    }
}

use crate::{
    entities::material::{self, Entity as MaterialEntity},
    entities::serial_unit::{
        self, ActiveModel as SerialActiveModel, Entity as SerialUnitEntity, Model as SerialModel,
        SerialStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterSerialRequest {
    #[validate(length(min = 1, max = 255, message = "Serial number is required"))]
    pub serial_number: String,
    pub material_id: Uuid,
    /// Defaults to `in_stock` when omitted
    pub status: Option<SerialStatus>,
    pub warranty_end: Option<NaiveDate>,
    pub renewal_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSerialStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SerialResponse {
    pub id: Uuid,
    pub serial_number: String,
    pub material_id: Uuid,
    pub order_line_id: Option<Uuid>,
    pub status: SerialStatus,
    pub purchase_date: DateTime<Utc>,
    pub warranty_end: Option<NaiveDate>,
    pub renewal_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SerialListResponse {
    pub serials: Vec<SerialResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Filters accepted by the serial listing
#[derive(Debug, Default)]
pub struct SerialListFilter {
    pub material_id: Option<Uuid>,
    pub status: Option<SerialStatus>,
    pub search: Option<String>,
}

/// Checks whether a serial number is already registered. The business key is
/// intended-unique but not constrained in the schema, so every insert path
/// runs this check first.
pub(crate) async fn serial_number_exists<C: ConnectionTrait>(
    db: &C,
    serial_number: &str,
) -> Result<bool, ServiceError> {
    let count = SerialUnitEntity::find()
        .filter(serial_unit::Column::SerialNumber.eq(serial_number))
        .count(db)
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(count > 0)
}

/// Adjusts a material's stock counter with a server-side increment, so
/// concurrent adjustments cannot lose updates.
pub(crate) async fn adjust_material_stock<C: ConnectionTrait>(
    db: &C,
    material_id: Uuid,
    delta: i32,
) -> Result<(), ServiceError> {
    if delta == 0 {
        return Ok(());
    }

    MaterialEntity::update_many()
        .col_expr(
            material::Column::Stock,
            Expr::col(material::Column::Stock).add(delta),
        )
        .col_expr(material::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(material::Column::Id.eq(material_id))
        .exec(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    Ok(())
}

/// Service for serialized inventory units
#[derive(Clone)]
pub struct SerialService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl SerialService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Manually registers one serialized unit (the non-delivery add path).
    /// The serial number must not already exist anywhere in the inventory.
    #[instrument(skip(self, request), fields(serial_number = %request.serial_number))]
    pub async fn register_serial(
        &self,
        request: RegisterSerialRequest,
    ) -> Result<SerialResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let serial_number = request.serial_number.trim().to_string();
        if serial_number.is_empty() {
            return Err(ServiceError::ValidationError(
                "Serial number is required".to_string(),
            ));
        }

        let db = &*self.db;
        let status = request.status.unwrap_or(SerialStatus::InStock);

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let material = MaterialEntity::find_by_id(request.material_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Material {} not found", request.material_id))
            })?;

        if serial_number_exists(&txn, &serial_number).await? {
            return Err(ServiceError::Conflict(format!(
                "Serial number '{}' is already registered",
                serial_number
            )));
        }

        let now = Utc::now();
        let serial_id = Uuid::new_v4();

        let active_model = SerialActiveModel {
            id: Set(serial_id),
            serial_number: Set(serial_number),
            material_id: Set(material.id),
            order_line_id: Set(None),
            status: Set(status.to_string()),
            purchase_date: Set(now),
            warranty_end: Set(request.warranty_end),
            renewal_date: Set(request.renewal_date),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let model = active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, serial_id = %serial_id, "Failed to insert serial unit");
            ServiceError::DatabaseError(e)
        })?;

        if status.counts_as_stock() {
            adjust_material_stock(&txn, material.id, 1).await?;
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(serial_id = %serial_id, material_id = %material.id, "Serial registered");

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::SerialRegistered {
                    serial_id,
                    material_id: material.id,
                })
                .await;
        }

        Self::model_to_response(model)
    }

    /// Retrieves one serial unit by ID
    #[instrument(skip(self), fields(serial_id = %serial_id))]
    pub async fn get_serial(&self, serial_id: Uuid) -> Result<Option<SerialResponse>, ServiceError> {
        let db = &*self.db;

        let serial = SerialUnitEntity::find_by_id(serial_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, serial_id = %serial_id, "Failed to fetch serial unit");
                ServiceError::DatabaseError(e)
            })?;

        serial.map(Self::model_to_response).transpose()
    }

    /// Lists serial units with pagination and filters
    #[instrument(skip(self, filter))]
    pub async fn list_serials(
        &self,
        page: u64,
        per_page: u64,
        filter: SerialListFilter,
    ) -> Result<SerialListResponse, ServiceError> {
        let db = &*self.db;

        let mut query = SerialUnitEntity::find().order_by_desc(serial_unit::Column::CreatedAt);

        if let Some(material_id) = filter.material_id {
            query = query.filter(serial_unit::Column::MaterialId.eq(material_id));
        }

        if let Some(status) = filter.status {
            query = query.filter(serial_unit::Column::Status.eq(status.to_string()));
        }

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            query = query.filter(serial_unit::Column::SerialNumber.contains(search));
        }

        let paginator = query.paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count serial units");
            ServiceError::DatabaseError(e)
        })?;

        let serials = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page = page, "Failed to fetch serials page");
                ServiceError::DatabaseError(e)
            })?;

        let serials = serials
            .into_iter()
            .map(Self::model_to_response)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SerialListResponse {
            serials,
            total,
            page,
            per_page,
        })
    }

    /// Lifecycle transition for a unit, with stock bookkeeping when the unit
    /// enters or leaves `in_stock`.
    #[instrument(skip(self, request), fields(serial_id = %serial_id, new_status = %request.status))]
    pub async fn update_serial_status(
        &self,
        serial_id: Uuid,
        request: UpdateSerialStatusRequest,
    ) -> Result<SerialResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let new_status: SerialStatus = request.status.parse().map_err(|_| {
            ServiceError::InvalidStatus(format!("Unknown serial status: {}", request.status))
        })?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let serial = SerialUnitEntity::find_by_id(serial_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(serial_id = %serial_id, "Serial unit not found for status update");
                ServiceError::NotFound(format!("Serial unit {} not found", serial_id))
            })?;

        let old_status = serial
            .serial_status()
            .map_err(ServiceError::InvalidStatus)?;

        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition serial from '{}' to '{}'",
                old_status, new_status
            )));
        }

        let material_id = serial.material_id;
        let mut active: SerialActiveModel = serial.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, serial_id = %serial_id, "Failed to update serial status");
            ServiceError::DatabaseError(e)
        })?;

        let stock_delta = match (old_status.counts_as_stock(), new_status.counts_as_stock()) {
            (false, true) => 1,
            (true, false) => -1,
            _ => 0,
        };
        adjust_material_stock(&txn, material_id, stock_delta).await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(
            serial_id = %serial_id,
            old_status = %old_status,
            new_status = %new_status,
            "Serial status updated"
        );

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::SerialStatusChanged {
                    serial_id,
                    old_status: old_status.to_string(),
                    new_status: new_status.to_string(),
                })
                .await;
        }

        Self::model_to_response(updated)
    }

    pub(crate) fn model_to_response(model: SerialModel) -> Result<SerialResponse, ServiceError> {
        let status = model.serial_status().map_err(ServiceError::InvalidStatus)?;
        Ok(SerialResponse {
            id: model.id,
            serial_number: model.serial_number,
            material_id: model.material_id,
            order_line_id: model.order_line_id,
            status,
            purchase_date: model.purchase_date,
            warranty_end: model.warranty_end,
            renewal_date: model.renewal_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

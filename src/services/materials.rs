use crate::{
    entities::material::{
        self, ActiveModel as MaterialActiveModel, Entity as MaterialEntity, Model as MaterialModel,
    },
    entities::serial_unit::{self, Entity as SerialUnitEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMaterialRequest {
    #[validate(length(min = 1, max = 255, message = "Material name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateMaterialRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub category: Option<String>,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaterialResponse {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub stock: i32,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaterialListResponse {
    pub materials: Vec<MaterialResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for the materials catalog
#[derive(Clone)]
pub struct MaterialService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl MaterialService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a catalog material. New materials start with zero stock;
    /// stock only moves through serial registration and status changes.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_material(
        &self,
        request: CreateMaterialRequest,
    ) -> Result<MaterialResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db;
        let now = Utc::now();
        let material_id = Uuid::new_v4();

        let active_model = MaterialActiveModel {
            id: Set(material_id),
            name: Set(request.name.clone()),
            category: Set(request.category),
            stock: Set(0),
            unit_price: Set(request.unit_price),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let model = active_model.insert(db).await.map_err(|e| {
            error!(error = %e, material_id = %material_id, "Failed to create material");
            ServiceError::DatabaseError(e)
        })?;

        info!(material_id = %material_id, name = %model.name, "Material created");

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::MaterialCreated(material_id))
                .await;
        }

        Ok(Self::model_to_response(model))
    }

    /// Retrieves a material by ID
    #[instrument(skip(self), fields(material_id = %material_id))]
    pub async fn get_material(
        &self,
        material_id: Uuid,
    ) -> Result<Option<MaterialResponse>, ServiceError> {
        let db = &*self.db;

        let material = MaterialEntity::find_by_id(material_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, material_id = %material_id, "Failed to fetch material");
                ServiceError::DatabaseError(e)
            })?;

        Ok(material.map(Self::model_to_response))
    }

    /// Lists materials with pagination, optional category filter and name search
    #[instrument(skip(self))]
    pub async fn list_materials(
        &self,
        page: u64,
        per_page: u64,
        category: Option<String>,
        search: Option<String>,
    ) -> Result<MaterialListResponse, ServiceError> {
        let db = &*self.db;

        let mut query = MaterialEntity::find().order_by_asc(material::Column::Name);

        if let Some(category) = category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            query = query.filter(material::Column::Category.eq(category));
        }

        if let Some(search) = search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(material::Column::Name.contains(search));
        }

        let paginator = query.paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count materials");
            ServiceError::DatabaseError(e)
        })?;

        let materials = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page = page, "Failed to fetch materials page");
                ServiceError::DatabaseError(e)
            })?;

        Ok(MaterialListResponse {
            materials: materials.into_iter().map(Self::model_to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Updates the mutable fields of a material
    #[instrument(skip(self, request), fields(material_id = %material_id))]
    pub async fn update_material(
        &self,
        material_id: Uuid,
        request: UpdateMaterialRequest,
    ) -> Result<MaterialResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db;

        let material = MaterialEntity::find_by_id(material_id)
            .one(db)
            .await
            .map_err(|e| ServiceError::DatabaseError(e))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Material {} not found", material_id))
            })?;

        let mut active: MaterialActiveModel = material.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(category) = request.category {
            active.category = Set(category);
        }
        if let Some(unit_price) = request.unit_price {
            active.unit_price = Set(unit_price);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, material_id = %material_id, "Failed to update material");
            ServiceError::DatabaseError(e)
        })?;

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::MaterialUpdated(material_id))
                .await;
        }

        Ok(Self::model_to_response(updated))
    }

    /// Deletes a material. Rejected while serial units still reference it.
    #[instrument(skip(self), fields(material_id = %material_id))]
    pub async fn delete_material(&self, material_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;

        let material = MaterialEntity::find_by_id(material_id)
            .one(db)
            .await
            .map_err(|e| ServiceError::DatabaseError(e))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Material {} not found", material_id))
            })?;

        let serial_count = SerialUnitEntity::find()
            .filter(serial_unit::Column::MaterialId.eq(material_id))
            .count(db)
            .await
            .map_err(|e| ServiceError::DatabaseError(e))?;

        if serial_count > 0 {
            return Err(ServiceError::Conflict(format!(
                "Material {} still has {} serialized units",
                material_id, serial_count
            )));
        }

        material.delete(db).await.map_err(|e| {
            error!(error = %e, material_id = %material_id, "Failed to delete material");
            ServiceError::DatabaseError(e)
        })?;

        info!(material_id = %material_id, "Material deleted");

        if let Some(event_sender) = &self.event_sender {
            event_sender
                .send_or_log(Event::MaterialDeleted(material_id))
                .await;
        }

        Ok(())
    }

    pub(crate) fn model_to_response(model: MaterialModel) -> MaterialResponse {
        MaterialResponse {
            id: model.id,
            name: model.name,
            category: model.category,
            stock: model.stock,
            unit_price: model.unit_price,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub mod common;
pub mod materials;
pub mod orders;
pub mod quotes;
pub mod serials;

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::quotes::{QuoteExtractionService, QuoteExtractionSettings};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub delivery: Arc<crate::services::delivery::DeliveryService>,
    pub materials: Arc<crate::services::materials::MaterialService>,
    pub serials: Arc<crate::services::serials::SerialService>,
    /// Absent when no extraction endpoint is configured
    pub quotes: Option<Arc<QuoteExtractionService>>,
}

impl AppServices {
    /// Build the service container shared by all handlers.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Result<Self, crate::errors::ServiceError> {
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
            config.default_currency.clone(),
        ));
        let delivery = Arc::new(crate::services::delivery::DeliveryService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let materials = Arc::new(crate::services::materials::MaterialService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let serials = Arc::new(crate::services::serials::SerialService::new(
            db_pool,
            Some(event_sender),
        ));

        let quotes = match QuoteExtractionSettings::from_config(&config.extraction) {
            Ok(settings) => Some(Arc::new(QuoteExtractionService::new(settings)?)),
            Err(_) => {
                info!("Quote extraction endpoint not configured; /quotes/extract is disabled");
                None
            }
        };

        Ok(Self {
            orders,
            delivery,
            materials,
            serials,
            quotes,
        })
    }
}

// Core services
pub mod orders;

// Delivery reconciliation workflow
pub mod delivery;

// Catalog and serialized inventory
pub mod materials;
pub mod serials;

// External services
pub mod quotes;

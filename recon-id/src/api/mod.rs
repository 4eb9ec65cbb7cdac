//! HTTP API handlers for recon-id

pub mod contacts;
pub mod health;
pub mod identify;

pub use contacts::list_contacts;
pub use health::health_routes;
pub use identify::identify;

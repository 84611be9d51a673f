mod annotation_store;
mod click_store;
mod connection;
mod mapping_store;
pub mod models;

pub use annotation_store::AnnotationStore;
pub use click_store::ClickStore;
pub use connection::{connect, connect_sqlite, infer_backend_from_url, run_migrations};
pub use mapping_store::{AssignOutcome, MappingStore};
pub use models::{Annotation, ClickRecord, DeviceType, Mapping};

//! Request and response models for the web API.

pub mod common;
pub mod error;

pub use common::{ItemList, ServiceStatus, TemplateQuery};
pub use error::ErrorResponse;

pub mod catalog;
pub mod types;

pub use catalog::{FieldCatalog, FieldDescriptor, FieldRow};
pub use types::*;

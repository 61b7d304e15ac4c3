#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_match)]
#![allow(clippy::collapsible_else_if)]

pub mod action;
pub mod config;
pub mod core;
pub mod filter;
pub mod logging;

// Re-export commonly used types
pub use action::Action;
pub use config::{Config, FilterSettings};
pub use core::{FieldCatalog, FieldDescriptor, FieldType};
pub use filter::{
    Condition, ConditionValue, Conjunction, FilterCompiler, FilterMode, FilterModeController, Group, ListView, Node,
    Operator, OperatorCatalog, SimpleFilterMap, WirePayload,
};

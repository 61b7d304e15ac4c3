//! Record-list filtering: operators, condition trees, validation, the simple
//! view adapter, the wire compiler and the mode controller.

pub mod compile;
pub mod controller;
pub mod operator;
pub mod simple;
pub mod tree;
pub mod validate;
pub mod value;
pub mod wire;

pub use compile::{count_leaves, FilterCompiler, Hydrated};
pub use controller::{ControllerError, FilterMode, FilterModeController, FilterState, ListView};
pub use operator::{Operator, OperatorCatalog, ValueShape, ValueWidget};
pub use simple::{NotRepresentable, SimpleFilter, SimpleFilterAdapter, SimpleFilterMap};
pub use tree::{Condition, Conjunction, Group, Node, TreeError, TreeLine};
pub use validate::{validate, validate_condition, validate_for_insert, InvalidReason};
pub use value::{ConditionValue, Presence, Timespan};
pub use wire::{CompileError, WirePayload};

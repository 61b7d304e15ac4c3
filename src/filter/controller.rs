//! FilterModeController: simple/advanced mode state machine over a list view
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::config::FilterSettings;
use crate::core::{FieldCatalog, FieldDescriptor};
use crate::filter::compile::FilterCompiler;
use crate::filter::operator::{Operator, OperatorCatalog, ValueWidget};
use crate::filter::simple::{SimpleFilter, SimpleFilterAdapter, SimpleFilterMap};
use crate::filter::tree::{Condition, Conjunction, Group, TreeError, TreeLine};
use crate::filter::validate::{self, InvalidReason};
use crate::filter::value::ConditionValue;
use crate::filter::wire::{CompileError, WirePayload};

/// List whose records the filters apply to
pub trait ListView {
    /// Payload the list is currently filtered by
    fn current_filters(&self) -> WirePayload;

    /// Advanced condition list the list remembers for the advanced editor
    fn advanced_filters(&self) -> Option<Value> {
        None
    }

    /// Replace the list's filters; the list re-queries
    fn apply_filters(&mut self, payload: WirePayload);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum FilterMode {
    #[default]
    Simple,
    Advanced,
}

/// Refused controller operation; the state is left as it was
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Invalid(#[from] InvalidReason),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("unknown field {0}")]
    UnknownField(String),
    #[error("operator {operator} is not available for field {field}")]
    UnsupportedOperator { field: String, operator: Operator },
    #[error("only available in {expected} mode")]
    WrongMode { expected: FilterMode },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub mode: FilterMode,
    /// Draft edited in advanced mode; in simple mode, the one-level tree of `simple`
    pub tree: Group,
    /// Tree as of the last apply, restored by discard
    pub applied_tree: Group,
    pub simple: SimpleFilterMap,
    /// Reserved keys other than the advanced key; carried through every apply
    pub reserved: Map<String, Value>,
    /// Last payload handed to the list
    pub applied: WirePayload,
}

pub struct FilterModeController<L: ListView> {
    list: L,
    catalog: FieldCatalog,
    settings: FilterSettings,
    operators: OperatorCatalog,
    state: FilterState,
    action_tx: Option<UnboundedSender<Action>>,
}

impl<L: ListView> FilterModeController<L> {
    /// Create a controller and hydrate it from the list's current filters
    pub fn new(list: L, catalog: FieldCatalog, settings: FilterSettings) -> Self {
        let operators = OperatorCatalog::new(&settings);
        let mut controller = Self {
            list,
            catalog,
            settings,
            operators,
            state: FilterState::default(),
            action_tx: None,
        };
        controller.hydrate();
        controller
    }

    pub fn register_action_handler(&mut self, tx: UnboundedSender<Action>) -> color_eyre::Result<()> {
        self.action_tx = Some(tx);
        Ok(())
    }

    fn compiler(&self) -> FilterCompiler<'_> {
        FilterCompiler::new(&self.catalog, &self.settings)
    }

    fn adapter(&self) -> SimpleFilterAdapter<'_> {
        SimpleFilterAdapter::new(&self.catalog, &self.settings)
    }

    /// Rebuild the editing state from the list's current filters.
    ///
    /// A payload without field filters falls back to the advanced conditions
    /// the list remembers, if any. A payload that cannot be read leaves the
    /// list untouched and starts an empty simple view.
    pub fn hydrate(&mut self) {
        let payload = self.list.current_filters();
        let hydrated = self.compiler().hydrate(&payload);
        match hydrated {
            Ok(mut hydrated) => {
                if hydrated.mode == FilterMode::Simple && hydrated.simple.is_empty() {
                    if let Some(tree) = self.remembered_tree() {
                        hydrated.mode = FilterMode::Advanced;
                        hydrated.tree = tree;
                    }
                }
                debug!("Hydrated {} filters in {} mode", hydrated.tree.count_leaves(), hydrated.mode);
                self.state = FilterState {
                    mode: hydrated.mode,
                    applied_tree: hydrated.tree.clone(),
                    tree: hydrated.tree,
                    simple: hydrated.simple,
                    reserved: hydrated.reserved,
                    applied: payload,
                };
            }
            Err(e) => {
                error!("Could not read current filters, starting empty: {}", e);
                let reserved = self.reserved_of(&payload);
                self.state = FilterState {
                    reserved,
                    applied: payload,
                    ..FilterState::default()
                };
            }
        }
    }

    /// Advanced conditions the list remembers, when readable and non-empty
    fn remembered_tree(&self) -> Option<Group> {
        let raw = self.list.advanced_filters()?;
        match self.compiler().conditions_from_wire(&raw) {
            Ok(tree) if !tree.is_empty() => Some(tree),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring unreadable advanced filters: {}", e);
                None
            }
        }
    }

    fn reserved_of(&self, payload: &WirePayload) -> Map<String, Value> {
        payload
            .iter()
            .filter(|(key, _)| {
                **key != self.settings.advanced_key && self.settings.is_reserved(key, &self.catalog)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn mode(&self) -> FilterMode {
        self.state.mode
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn tree(&self) -> &Group {
        &self.state.tree
    }

    pub fn simple_filters(&self) -> &SimpleFilterMap {
        &self.state.simple
    }

    pub fn applied(&self) -> &WirePayload {
        &self.state.applied
    }

    pub fn list(&self) -> &L {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut L {
        &mut self.list
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Swap in a fresh catalog snapshot. Fields already chosen keep their descriptors.
    pub fn set_catalog(&mut self, catalog: FieldCatalog) {
        debug!("Filter catalog replaced with {} fields", catalog.len());
        self.catalog = catalog;
    }

    /// Indented lines for the advanced tree view
    pub fn tree_lines(&self) -> Vec<TreeLine> {
        self.state.tree.render_lines()
    }

    /// Number of conditions in the applied filters
    pub fn badge_count(&self) -> usize {
        self.compiler()
            .hydrate(&self.state.applied)
            .map(|hydrated| hydrated.tree.count_leaves())
            .unwrap_or(0)
    }

    /// Operators offered for a field
    pub fn operators_for(&self, fieldname: &str) -> &'static [Operator] {
        self.adapter().operators_for(&self.operators, fieldname)
    }

    /// Descriptor for the chosen field of the condition at `path`, taken from
    /// the current catalog when it still lists the field
    fn field_at(&self, path: &[usize]) -> Option<&FieldDescriptor> {
        let field = self.state.tree.condition_at(path)?.field.as_ref()?;
        Some(self.catalog.get(&field.name).unwrap_or(field))
    }

    /// Operators offered for the condition at `path`, once it has a field
    pub fn operators_at(&self, path: &[usize]) -> Option<&'static [Operator]> {
        let field = self.field_at(path)?;
        Some(self.operators.operators_for(field.field_type, &field.name))
    }

    /// Widget for the value of the condition at `path`
    pub fn value_widget_at(&self, path: &[usize]) -> Option<ValueWidget> {
        let operator = self.state.tree.condition_at(path)?.operator?;
        let field = self.field_at(path)?;
        Some(self.operators.value_widget(field.field_type, operator, &field.options))
    }

    fn require_mode(&self, expected: FilterMode) -> Result<(), ControllerError> {
        if self.state.mode == expected {
            Ok(())
        } else {
            Err(ControllerError::WrongMode { expected })
        }
    }

    fn push(&mut self, payload: WirePayload) {
        info!("Applying filters: {:?}", payload.0);
        self.list.apply_filters(payload.clone());
        self.state.applied = payload.clone();
        if let Some(tx) = &self.action_tx {
            if tx.send(Action::FiltersApplied(payload)).is_err() {
                debug!("Filter change listener is gone");
            }
        }
    }

    fn with_reserved(&self, mut payload: WirePayload) -> WirePayload {
        payload.extend(self.state.reserved.clone());
        payload
    }

    fn apply_simple(&mut self) -> WirePayload {
        let payload = self.with_reserved(self.compiler().compile_simple(&self.state.simple));
        let tree = self.adapter().to_tree(&self.state.simple);
        self.state.applied_tree = tree.clone();
        self.state.tree = tree;
        self.push(payload.clone());
        payload
    }

    /// Set the simple-mode filter for a field and apply right away
    pub fn set_simple_filter(
        &mut self,
        fieldname: &str,
        operator: Operator,
        value: ConditionValue,
    ) -> Result<WirePayload, ControllerError> {
        self.require_mode(FilterMode::Simple)?;
        let field = self
            .catalog
            .get(fieldname)
            .cloned()
            .ok_or_else(|| ControllerError::UnknownField(fieldname.to_string()))?;
        if !self.operators.supports(&field, operator) {
            return Err(ControllerError::UnsupportedOperator {
                field: field.name,
                operator,
            });
        }
        validate::validate_condition(&Condition::new(field, operator, value.clone()))?;
        self.state.simple.insert(fieldname, SimpleFilter::new(operator, value));
        Ok(self.apply_simple())
    }

    /// Drop the simple-mode filter for a field; an emptied map applies an empty payload
    pub fn remove_simple_filter(&mut self, fieldname: &str) -> Result<WirePayload, ControllerError> {
        self.require_mode(FilterMode::Simple)?;
        if self.state.simple.remove(fieldname).is_none() {
            return Ok(self.state.applied.clone());
        }
        Ok(self.apply_simple())
    }

    /// Select tags and apply them alongside whatever is applied now.
    ///
    /// Several tags are sent as one list under the tags key; they are not
    /// turned into an OR group.
    pub fn set_tags(&mut self, tags: Vec<String>) -> WirePayload {
        let mut selected: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags.into_iter().map(|t| t.trim().to_string()) {
            if !tag.is_empty() && !selected.contains(&tag) {
                selected.push(tag);
            }
        }
        let key = self.settings.tags_key.clone();
        let mut payload = self.state.applied.clone();
        if selected.is_empty() {
            self.state.reserved.remove(&key);
            payload.remove(&key);
        } else {
            let value = Value::Array(selected.into_iter().map(Value::String).collect());
            self.state.reserved.insert(key.clone(), value.clone());
            payload.insert(key, value);
        }
        self.push(payload.clone());
        payload
    }

    /// Append a blank condition to a group; refused while the tree has an incomplete part
    pub fn add_condition(&mut self, group_path: &[usize]) -> Result<Vec<usize>, ControllerError> {
        self.require_mode(FilterMode::Advanced)?;
        Ok(self.state.tree.insert_condition(group_path, usize::MAX, Condition::blank())?)
    }

    /// Append a nested group holding one blank condition; returns the condition's path
    pub fn add_group(&mut self, group_path: &[usize], conjunction: Conjunction) -> Result<Vec<usize>, ControllerError> {
        self.require_mode(FilterMode::Advanced)?;
        let group = self.state.tree.insert_group(group_path, usize::MAX, conjunction)?;
        Ok(self.state.tree.insert_condition(&group, 0, Condition::blank())?)
    }

    /// Remove a condition or group; returns the path to select next
    pub fn remove_item(&mut self, path: &[usize]) -> Result<Vec<usize>, ControllerError> {
        self.require_mode(FilterMode::Advanced)?;
        Ok(self.state.tree.remove_item(path)?)
    }

    pub fn set_conjunction(&mut self, group_path: &[usize], conjunction: Conjunction) -> Result<(), ControllerError> {
        self.require_mode(FilterMode::Advanced)?;
        Ok(self.state.tree.set_conjunction(group_path, conjunction)?)
    }

    /// Choose the field of a condition; operator and value reset to the field's defaults
    pub fn set_field(&mut self, path: &[usize], fieldname: &str) -> Result<(), ControllerError> {
        self.require_mode(FilterMode::Advanced)?;
        let field = self
            .catalog
            .get(fieldname)
            .cloned()
            .ok_or_else(|| ControllerError::UnknownField(fieldname.to_string()))?;
        let (operator, value) = self.operators.defaults_for(&field);
        Ok(self.state.tree.replace_condition(path, Condition::new(field, operator, value))?)
    }

    /// Change the operator of a condition. The value is cleared when the new
    /// operator expects a different shape.
    pub fn set_operator(&mut self, path: &[usize], operator: Operator) -> Result<(), ControllerError> {
        self.require_mode(FilterMode::Advanced)?;
        self.state
            .tree
            .condition_at(path)
            .ok_or_else(|| TreeError::NotACondition(path.to_vec()))?;
        let field = self
            .field_at(path)
            .ok_or_else(|| InvalidReason::MissingField { path: path.to_vec() })?;
        if !self.operators.supports(field, operator) {
            return Err(ControllerError::UnsupportedOperator {
                field: field.name.clone(),
                operator,
            });
        }
        let condition = self
            .state
            .tree
            .condition_at_mut(path)
            .ok_or_else(|| TreeError::NotACondition(path.to_vec()))?;
        if condition.value.shape() != operator.value_shape() {
            condition.value = ConditionValue::empty_for(operator);
        }
        condition.operator = Some(operator);
        Ok(())
    }

    pub fn set_value(&mut self, path: &[usize], value: ConditionValue) -> Result<(), ControllerError> {
        self.require_mode(FilterMode::Advanced)?;
        let condition = self
            .state
            .tree
            .condition_at_mut(path)
            .ok_or_else(|| TreeError::NotACondition(path.to_vec()))?;
        condition.value = value;
        Ok(())
    }

    /// Set a condition's value from raw widget text
    pub fn set_value_input(&mut self, path: &[usize], input: &str) -> Result<(), ControllerError> {
        let operator = self
            .state
            .tree
            .condition_at(path)
            .ok_or_else(|| TreeError::NotACondition(path.to_vec()))?
            .operator
            .ok_or_else(|| InvalidReason::MissingOperator { path: path.to_vec() })?;
        self.set_value(path, ConditionValue::parse_input(operator, input))
    }

    /// Apply the current mode's filters. Advanced mode compiles the draft tree
    /// and refuses while it is invalid or empty.
    pub fn apply(&mut self) -> Result<WirePayload, ControllerError> {
        match self.state.mode {
            FilterMode::Simple => Ok(self.apply_simple()),
            FilterMode::Advanced => {
                let compiled = self
                    .compiler()
                    .compile_tree(&self.state.tree)
                    .inspect_err(|e| warn!("Refusing to apply advanced filters: {}", e))?;
                let payload = self.with_reserved(compiled);
                self.state.applied_tree = self.state.tree.clone();
                self.push(payload.clone());
                Ok(payload)
            }
        }
    }

    /// Throw away advanced edits made since the last apply
    pub fn discard(&mut self) {
        if self.state.mode == FilterMode::Simple {
            debug!("Simple filters apply immediately; nothing to discard");
            return;
        }
        self.state.tree = self.state.applied_tree.clone();
    }

    /// Remove every field filter and the advanced tree, and return to simple
    /// mode. Other reserved keys such as tags stay applied.
    pub fn clear(&mut self) -> WirePayload {
        self.state.mode = FilterMode::Simple;
        self.state.tree = Group::default();
        self.state.applied_tree = Group::default();
        self.state.simple.clear();
        let payload = self.with_reserved(WirePayload::new());
        self.push(payload.clone());
        payload
    }

    /// Switch between simple and advanced editing.
    ///
    /// Entering advanced mode keeps the applied filters and starts from the
    /// list's remembered advanced conditions, or an empty group. Leaving it
    /// clears the tree and the applied filters.
    pub fn switch_mode(&mut self, mode: FilterMode) -> Result<(), ControllerError> {
        if self.state.mode == mode {
            return Ok(());
        }
        info!("Switching filters from {} to {} mode", self.state.mode, mode);
        match mode {
            FilterMode::Advanced => {
                let tree = self.remembered_tree().unwrap_or_default();
                self.state.simple.clear();
                self.state.applied_tree = tree.clone();
                self.state.tree = tree;
                self.state.mode = FilterMode::Advanced;
            }
            FilterMode::Simple => {
                self.clear();
            }
        }
        Ok(())
    }

    /// Handle an edit action. Refused edits come back as [`Action::Error`].
    pub fn update(&mut self, action: Action) -> color_eyre::Result<Option<Action>> {
        let outcome = match action {
            Action::AddCondition { group } => self.add_condition(&group).map(drop),
            Action::AddGroup { group, conjunction } => self.add_group(&group, conjunction).map(drop),
            Action::RemoveItem { path } => self.remove_item(&path).map(drop),
            Action::SetConjunction { group, conjunction } => self.set_conjunction(&group, conjunction),
            Action::SetField { path, fieldname } => self.set_field(&path, &fieldname),
            Action::SetOperator { path, operator } => self.set_operator(&path, operator),
            Action::SetValue { path, value } => self.set_value(&path, value),
            Action::SetValueInput { path, input } => self.set_value_input(&path, &input),
            Action::SetSimpleFilter {
                fieldname,
                operator,
                value,
            } => self.set_simple_filter(&fieldname, operator, value).map(drop),
            Action::RemoveSimpleFilter { fieldname } => self.remove_simple_filter(&fieldname).map(drop),
            Action::SetTags(tags) => {
                self.set_tags(tags);
                Ok(())
            }
            Action::SwitchMode(mode) => self.switch_mode(mode),
            Action::ApplyFilters => self.apply().map(drop),
            Action::DiscardFilters => {
                self.discard();
                Ok(())
            }
            Action::ClearFilters => {
                self.clear();
                Ok(())
            }
            Action::FiltersApplied(_) | Action::Error(_) => return Ok(None),
        };
        match outcome {
            Ok(()) => Ok(None),
            Err(e) => {
                debug!("Refused filter edit: {}", e);
                Ok(Some(Action::Error(e.to_string())))
            }
        }
    }
}

//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining provider and resource
//! schemas, including attribute types, blocks, and validation.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    /// cty JSON type representation, as expected in Schema.Attribute.type
    pub fn to_type_json(&self) -> serde_json::Value {
        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(elem) => json!(["list", elem.to_type_json()]),
            AttributeType::Set(elem) => json!(["set", elem.to_type_json()]),
            AttributeType::Map(elem) => json!(["map", elem.to_type_json()]),
            AttributeType::Object(fields) => {
                let fields: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_type_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_type_json().to_string().into_bytes()
    }

    /// Bring a value in line with this type: objects get every declared
    /// attribute (null when absent) and lose undeclared ones
    pub fn conform(&self, value: &mut Dynamic) {
        match (self, value) {
            (AttributeType::Object(fields), Dynamic::Map(map)) => {
                map.retain(|k, _| fields.contains_key(k));
                for (name, ty) in fields {
                    let entry = map.entry(name.clone()).or_insert(Dynamic::Null);
                    ty.conform(entry);
                }
            }
            (AttributeType::List(elem), Dynamic::List(items))
            | (AttributeType::Set(elem), Dynamic::List(items)) => {
                for item in items {
                    elem.conform(item);
                }
            }
            (AttributeType::Map(elem), Dynamic::Map(map)) => {
                for item in map.values_mut() {
                    elem.conform(item);
                }
            }
            _ => {}
        }
    }

    /// Whether a known, non-null value has the shape of this type
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::Number, Dynamic::Number(_)) => true,
            (AttributeType::Bool, Dynamic::Bool(_)) => true,
            (AttributeType::List(elem), Dynamic::List(items))
            | (AttributeType::Set(elem), Dynamic::List(items)) => {
                items.iter().all(|item| elem.accepts(item))
            }
            (AttributeType::Map(elem), Dynamic::Map(map)) => map.values().all(|v| elem.accepts(v)),
            (AttributeType::Object(fields), Dynamic::Map(map)) => map
                .iter()
                .all(|(k, v)| fields.get(k).is_some_and(|ty| ty.accepts(v))),
            _ => false,
        }
    }
}

/// Schema is returned by providers and resources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64, // Increment when schema changes require migration
    pub block: Block, // Root block containing all attributes
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// Fill absent attributes with null so the value matches the schema type
    pub fn conform(&self, value: &mut DynamicValue) {
        self.block.conform(&mut value.value);
    }

    /// Framework-level checks run during ValidateResourceConfig
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.block
            .validate(&config.value, &AttributePath::root(), &mut diagnostics);
        diagnostics
    }
}

/// Block represents a configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

impl Block {
    pub fn new() -> Self {
        Self {
            version: 0,
            attributes: Vec::new(),
            block_types: Vec::new(),
            description: String::new(),
            description_kind: StringKind::Plain,
            deprecated: false,
        }
    }

    pub fn conform(&self, value: &mut Dynamic) {
        let Dynamic::Map(map) = value else {
            return;
        };

        map.retain(|k, _| {
            self.attributes.iter().any(|a| &a.name == k)
                || self.block_types.iter().any(|b| &b.type_name == k)
        });

        for attr in &self.attributes {
            let entry = map.entry(attr.name.clone()).or_insert(Dynamic::Null);
            attr.r#type.conform(entry);
        }

        for nested in &self.block_types {
            let entry = map.entry(nested.type_name.clone()).or_insert(Dynamic::Null);
            if entry.is_null() {
                *entry = match nested.nesting {
                    NestingMode::List | NestingMode::Set => Dynamic::List(Vec::new()),
                    NestingMode::Map | NestingMode::Group => Dynamic::Map(HashMap::new()),
                    _ => Dynamic::Null,
                };
            }

            let is_object = matches!(entry, Dynamic::Map(_)) && nested.nesting != NestingMode::Map;
            if is_object {
                nested.block.conform(entry);
                continue;
            }
            match entry {
                Dynamic::List(items) => {
                    for item in items.iter_mut() {
                        nested.block.conform(item);
                    }
                }
                Dynamic::Map(items) => {
                    for item in items.values_mut() {
                        nested.block.conform(item);
                    }
                }
                _ => {}
            }
        }
    }

    fn validate(&self, value: &Dynamic, base: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let empty = HashMap::new();
        let map = match value {
            Dynamic::Map(m) => m,
            Dynamic::Null => &empty,
            _ => return,
        };

        for attr in &self.attributes {
            let path = child_path(base, &attr.name);
            let value = map.get(&attr.name).unwrap_or(&Dynamic::Null);

            if attr.required && value.is_null() {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument \"{}\" is required, but no definition was found.", path),
                    )
                    .with_attribute(path),
                );
                continue;
            }

            if attr.computed && !attr.optional && !attr.required && !value.is_null() {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid configuration",
                        format!("\"{}\": this field cannot be set", path),
                    )
                    .with_attribute(path),
                );
                continue;
            }

            if value.is_null() || value.is_unknown() {
                continue;
            }

            if !attr.r#type.accepts(value) {
                diagnostics.push(
                    Diagnostic::error(
                        "Incorrect attribute value type",
                        format!("\"{}\": got {}", path, value.type_name()),
                    )
                    .with_attribute(path),
                );
                continue;
            }

            if attr.deprecated {
                diagnostics.push(
                    Diagnostic::warning(
                        "Argument is deprecated",
                        if attr.deprecation_message.is_empty() {
                            format!("\"{}\" is deprecated", path)
                        } else {
                            attr.deprecation_message.clone()
                        },
                    )
                    .with_attribute(path.clone()),
                );
            }

            if !value.is_fully_known() {
                continue;
            }

            for validator in &attr.validators {
                let response = validator.validate(ValidatorRequest {
                    config_value: DynamicValue::new(value.clone()),
                    path: path.clone(),
                });
                diagnostics.extend(response.diagnostics);
            }
        }

        for nested in &self.block_types {
            let path = child_path(base, &nested.type_name);
            match map.get(&nested.type_name) {
                Some(Dynamic::List(items)) => {
                    let count = items.len() as i64;
                    if count < nested.min_items || (nested.max_items > 0 && count > nested.max_items)
                    {
                        diagnostics.push(
                            Diagnostic::error(
                                "Invalid number of blocks",
                                format!(
                                    "\"{}\" requires between {} and {} blocks, got {}",
                                    path, nested.min_items, nested.max_items, count
                                ),
                            )
                            .with_attribute(path.clone()),
                        );
                    }
                    for (idx, item) in items.iter().enumerate() {
                        nested
                            .block
                            .validate(item, &path.clone().index(idx as i64), diagnostics);
                    }
                }
                Some(item)
                    if matches!(item, Dynamic::Map(_)) && nested.nesting != NestingMode::Map =>
                {
                    nested.block.validate(item, &path, diagnostics)
                }
                Some(Dynamic::Null) | None if nested.min_items > 0 => {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required block",
                            format!("At least {} \"{}\" block is required", nested.min_items, path),
                        )
                        .with_attribute(path),
                    );
                }
                _ => {}
            }
        }
    }
}

impl std::default::Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

fn child_path(base: &AttributePath, name: &str) -> AttributePath {
    base.clone().attribute(name)
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn Default>>,
    pub deprecated: bool,
    pub deprecation_message: String,
}

// Manual Debug implementation since validators/modifiers don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("description", &self.description)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .field("default", &self.default.is_some())
            .field("deprecated", &self.deprecated)
            .finish()
    }
}

/// NestedBlock represents a nested configuration block
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
}

/// NestingMode defines how nested blocks are structured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Invalid,
    Single,
    List,
    Set,
    Map,
    Group,
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// Validator performs validation on attribute values during planning
/// Validators only see known, non-null values
pub trait Validator: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Perform validation
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

/// Request for validators
pub struct ValidatorRequest {
    pub config_value: DynamicValue,
    pub path: AttributePath,
}

/// Response from validators
pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// PlanModifier modifies planned values during planning
/// Common uses: RequiresReplace, UseStateForUnknown
pub trait PlanModifier: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Modify the planned value
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

/// Request for plan modifiers
pub struct PlanModifierRequest {
    pub config_value: DynamicValue,
    pub state_value: DynamicValue,
    pub plan_value: DynamicValue,
    pub path: AttributePath,
}

/// Response from plan modifiers
pub struct PlanModifierResponse {
    pub plan_value: DynamicValue,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Default provides default values for optional attributes
/// Called when attribute is not set in configuration
pub trait Default: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Provide default value
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

/// Request for default values
pub struct DefaultRequest {
    pub path: AttributePath,
}

/// Response with default value
pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// AttributeBuilder provides fluent API for building attributes
/// ALWAYS use this instead of constructing Attribute directly
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    /// Create a new attribute builder
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
                deprecated: false,
                deprecation_message: String::new(),
            },
        }
    }

    /// Set description
    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    /// Mark as computed
    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    /// Mark as deprecated, with the warning shown when it is set
    pub fn deprecated(mut self, message: &str) -> Self {
        self.attribute.deprecated = true;
        self.attribute.deprecation_message = message.to_string();
        self
    }

    /// Add validator
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.attribute.validators.push(validator);
        self
    }

    /// Add plan modifier
    pub fn plan_modifier(mut self, modifier: Arc<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(modifier);
        self
    }

    /// Set default
    pub fn default(mut self, default: Arc<dyn Default>) -> Self {
        self.attribute.default = Some(default);
        self
    }

    /// Finalize the attribute
    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
/// ALWAYS use this for consistency
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block::new(),
            },
        }
    }

    /// Set schema version
    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    /// Add attribute
    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    /// Add nested block
    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    /// Set description
    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    /// Set description kind
    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    /// Finalize the schema
    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The conventional `timeouts { default = "..." }` block
pub fn timeouts_block() -> NestedBlock {
    NestedBlock {
        type_name: "timeouts".to_string(),
        block: Block {
            attributes: vec![AttributeBuilder::new("default", AttributeType::String)
                .description("Default timeout for create, update and delete, e.g. \"90m\"")
                .optional()
                .build()],
            ..Block::new()
        },
        nesting: NestingMode::Single,
        min_items: 0,
        max_items: 1,
    }
}

//! Declarative metadata describing what the host exposes to scripts.
//!
//! Only [`EnumDescriptor`] and [`EnumValueDescriptor`] affect runtime
//! behaviour: they feed the [`EnumCache`](crate::EnumCache). Function and
//! variable descriptors exist for documentation and are exported as JSON by
//! [`DocRegistry`].

use std::collections::HashSet;

use serde::Serialize;

/// Description used when none was supplied.
pub const NO_DESCRIPTION: &str = "No description provided.";

/// Documentation for a host function exposed to scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FunctionDescriptor {
    /// Script-visible name.
    pub name: String,
    /// What the function does.
    pub description: String,
    /// What the function returns.
    pub returns: String,
    /// Additional notes.
    pub notes: String,
    /// Caveats callers should know about.
    pub warning: String,
    /// What success looks like.
    pub success: String,
    /// A short usage example.
    pub code_example: String,
}

impl FunctionDescriptor {
    /// Create a descriptor with the given script-visible name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the return value documentation.
    pub fn returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }

    /// Set the notes.
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Set the warning.
    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = warning.into();
        self
    }

    /// Set the success description.
    pub fn success(mut self, success: impl Into<String>) -> Self {
        self.success = success.into();
        self
    }

    /// Set the code example.
    pub fn code_example(mut self, code_example: impl Into<String>) -> Self {
        self.code_example = code_example.into();
        self
    }
}

/// Documentation for a host variable exposed to scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableDescriptor {
    /// Script-visible name.
    pub name: String,
    /// What the variable holds.
    pub description: String,
}

impl VariableDescriptor {
    /// Create a variable descriptor.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Metadata for one member of a host enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValueDescriptor {
    /// Member name as seen by scripts.
    pub member: String,
    /// Integer value of the member.
    pub value: i64,
    /// Documentation for the member.
    pub description: String,
    /// Hidden members are never projected into a script host.
    pub hidden: bool,
}

impl EnumValueDescriptor {
    /// A visible member with the default description.
    pub fn new(member: impl Into<String>, value: i64) -> Self {
        Self {
            member: member.into(),
            value,
            description: NO_DESCRIPTION.to_string(),
            hidden: false,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set whether the member is hidden from scripts.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

/// Metadata for a host enumeration projected into scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDescriptor {
    /// Global name the enumeration is exposed under.
    pub name: String,
    /// Documentation for the enumeration.
    pub description: String,
    /// Members in declaration order.
    pub values: Vec<EnumValueDescriptor>,
}

impl EnumDescriptor {
    /// An empty enumeration with the default description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: NO_DESCRIPTION.to_string(),
            values: Vec::new(),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a member.
    pub fn value(mut self, value: EnumValueDescriptor) -> Self {
        self.values.push(value);
        self
    }

    /// Members that scripts can see.
    pub fn visible_values(&self) -> impl Iterator<Item = &EnumValueDescriptor> {
        self.values.iter().filter(|v| !v.hidden)
    }
}

/// A host enumeration that can describe itself to scripts.
///
/// Usually implemented with `#[derive(ScriptEnum)]`.
pub trait ScriptEnum {
    /// The descriptor registered for this type.
    fn descriptor() -> EnumDescriptor;
}

/// Errors raised while registering metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two enumerations declared the same exposed name.
    #[error("Duplicate script enum name: {0}")]
    DuplicateEnum(String),
    /// The exposed name cannot be referenced from scripts.
    #[error("Invalid script enum name: '{0}'")]
    InvalidName(String),
}

/// The explicit set of enumerations the enum cache is built from.
#[derive(Debug, Clone, Default)]
pub struct EnumRegistry {
    enums: Vec<EnumDescriptor>,
    names: HashSet<String>,
}

impl EnumRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type implementing [`ScriptEnum`].
    pub fn register<T: ScriptEnum>(&mut self) -> Result<(), RegistryError> {
        self.register_descriptor(T::descriptor())
    }

    /// Register a descriptor. A duplicate name is rejected and the existing
    /// registration is kept.
    pub fn register_descriptor(&mut self, descriptor: EnumDescriptor) -> Result<(), RegistryError> {
        if !is_valid_identifier(&descriptor.name) {
            tracing::warn!(name = %descriptor.name, "rejecting script enum with invalid name");
            return Err(RegistryError::InvalidName(descriptor.name));
        }
        if !self.names.insert(descriptor.name.clone()) {
            tracing::warn!(name = %descriptor.name, "rejecting duplicate script enum");
            return Err(RegistryError::DuplicateEnum(descriptor.name));
        }
        self.enums.push(descriptor);
        Ok(())
    }

    /// Look up a registered descriptor by exposed name.
    pub fn get(&self, name: &str) -> Option<&EnumDescriptor> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Registered descriptors in registration order.
    pub fn descriptors(&self) -> &[EnumDescriptor] {
        &self.enums
    }

    /// Number of registered enumerations.
    pub fn len(&self) -> usize {
        self.enums.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
    }
}

/// Collected documentation for everything a host exposes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocRegistry {
    functions: Vec<FunctionDescriptor>,
    variables: Vec<VariableDescriptor>,
    enums: Vec<EnumDescriptor>,
}

impl DocRegistry {
    /// Create an empty documentation registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the enum documentation from an enum registry.
    pub fn from_enums(registry: &EnumRegistry) -> Self {
        Self {
            enums: registry.descriptors().to_vec(),
            ..Default::default()
        }
    }

    /// Add a function.
    pub fn function(&mut self, function: FunctionDescriptor) -> &mut Self {
        self.functions.push(function);
        self
    }

    /// Add a variable.
    pub fn variable(&mut self, variable: VariableDescriptor) -> &mut Self {
        self.variables.push(variable);
        self
    }

    /// Add an enumeration.
    pub fn enumeration(&mut self, descriptor: EnumDescriptor) -> &mut Self {
        self.enums.push(descriptor);
        self
    }

    /// Documented functions.
    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Documented variables.
    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    /// Documented enumerations.
    pub fn enums(&self) -> &[EnumDescriptor] {
        &self.enums
    }

    /// Export for an external documentation generator.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "functions": self.functions,
            "variables": self.variables,
            "enums": self.enums,
        })
    }
}

/// Whether `name` can be used as a script global.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.chars().any(|c| c != '_')
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn color() -> EnumDescriptor {
        EnumDescriptor::new("Color")
            .value(EnumValueDescriptor::new("RED", 0))
            .value(EnumValueDescriptor::new("GREEN", 1))
            .value(EnumValueDescriptor::new("HIDDEN", 2).hidden(true))
    }

    #[test]
    fn duplicate_enum_keeps_first() {
        let mut registry = EnumRegistry::new();
        registry.register_descriptor(color()).unwrap();

        let other = EnumDescriptor::new("Color").value(EnumValueDescriptor::new("BLUE", 7));
        assert_eq!(
            registry.register_descriptor(other),
            Err(RegistryError::DuplicateEnum("Color".into()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Color").unwrap().values.len(), 3);
    }

    #[test]
    fn invalid_names_rejected() {
        let mut registry = EnumRegistry::new();
        for name in ["", "1st", "has space", "a.b", "__"] {
            assert_eq!(
                registry.register_descriptor(EnumDescriptor::new(name)),
                Err(RegistryError::InvalidName(name.into()))
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn visible_values_skip_hidden() {
        let color = color();
        let names: Vec<_> = color.visible_values().map(|v| v.member.as_str()).collect();
        assert_eq!(names, vec!["RED", "GREEN"]);
    }

    #[test]
    fn value_defaults() {
        let value = EnumValueDescriptor::new("A", 3);
        assert_eq!(value.description, NO_DESCRIPTION);
        assert!(!value.hidden);
    }

    #[test]
    fn doc_export() {
        let mut registry = EnumRegistry::new();
        registry.register_descriptor(color()).unwrap();

        let mut docs = DocRegistry::from_enums(&registry);
        docs.function(
            FunctionDescriptor::new("spawn")
                .description("Spawn an entity")
                .returns("entity id")
                .code_example("spawn(\"crate\")"),
        )
        .variable(VariableDescriptor::new("frame", "Current frame number"));

        let json = docs.to_json();
        assert_eq!(json["functions"][0]["name"], "spawn");
        assert_eq!(json["functions"][0]["code_example"], "spawn(\"crate\")");
        assert_eq!(json["variables"][0]["description"], "Current frame number");
        assert_eq!(json["enums"][0]["values"][2]["hidden"], true);
    }
}

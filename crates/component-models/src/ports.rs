//! Ports and data-type compatibility

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Direction of a port on a component model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    /// The component reads samples from this port
    Input,
    /// The component writes samples to this port
    Output,
}

impl PortDirection {
    /// The direction a connected peer port must have
    pub fn opposite(self) -> Self {
        match self {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        }
    }
}

/// A typed port on a component or service model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique per direction within the owning model
    pub name: String,
    /// Data direction
    pub direction: PortDirection,
    /// Name of the transported data type
    pub data_type: String,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            data_type: data_type.into(),
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            data_type: data_type.into(),
        }
    }
}

/// Data-type compatibility table fed by the external typekit loader
///
/// Two types are compatible when they are equal or registered as aliases of
/// the same canonical type. The planner never inspects type contents; it only
/// needs this equivalence when wiring ports.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    aliases: IndexMap<String, String>,
}

impl TypeRegistry {
    /// Create an empty registry where only equal type names are compatible
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias` as another name for `canonical`
    pub fn register_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(alias.into(), canonical.into());
    }

    /// Resolve a type name to its canonical spelling
    pub fn canonical<'a>(&'a self, data_type: &'a str) -> &'a str {
        let mut current = data_type;
        // Alias chains are short; no cycle guard needed beyond the table itself
        while let Some(next) = self.aliases.get(current) {
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Whether two data types may be connected
    pub fn compatible(&self, a: &str, b: &str) -> bool {
        a == b || self.canonical(a) == self.canonical(b)
    }
}

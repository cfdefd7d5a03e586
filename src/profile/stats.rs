//! Named stat storage for one profile segment.

use crate::types::StatBlock;
use serde_json::Value;

/// Named, arbitrarily-shaped values attached to a profile segment
/// (login-reward cursors, energy counters, active-chest pointers, ...).
///
/// Stats have no guid: they are looked up by name and replaced wholesale.
/// There is no merge; callers read, modify, and write back.
#[derive(Clone, Debug, Default)]
pub struct StatTable {
    attributes: serde_json::Map<String, Value>,
}

impl StatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(stats: StatBlock) -> Self {
        Self {
            attributes: stats.attributes,
        }
    }

    pub fn to_document(&self) -> StatBlock {
        StatBlock {
            attributes: self.attributes.clone(),
        }
    }

    /// Current value, or `None` if the stat was never set.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Replace the stat wholesale.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> + '_ {
        self.attributes.iter()
    }
}

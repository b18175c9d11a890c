use std::collections::BTreeMap;

use super::impedance::ImpedanceTable;
use super::table::Table;
use crate::error::{QcError, Result};

pub const CHANNEL_IMPEDANCES_KEY: &str = "channel_impedances";
pub const DEVICE_GROUP: &str = "device";

/// Logical key of a device relation, e.g. `device/shapes`
pub fn device_key(name: &str) -> String {
    format!("{}/{}", DEVICE_GROUP, name)
}

/// Named bundle of tables produced by one scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpedanceStructures {
    entries: BTreeMap<String, Table>,
}

impl ImpedanceStructures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, table: Table) {
        self.entries.insert(key.into(), table);
    }

    pub fn get(&self, key: &str) -> Option<&Table> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decoded `channel_impedances` entry
    pub fn impedance_table(&self) -> Result<ImpedanceTable> {
        let table = self
            .get(CHANNEL_IMPEDANCES_KEY)
            .ok_or_else(|| QcError::EntryNotFound(CHANNEL_IMPEDANCES_KEY.to_string()))?;
        ImpedanceTable::from_table(table)
    }
}

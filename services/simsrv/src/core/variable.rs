//! Variable Model and Registry
//!
//! A [`SimVariable`] tracks one simulator variable through its lifecycle:
//! declared by name, resolved to a memory address, then read and written.
//! The [`VariableRegistry`] keeps the working set in declaration order, the
//! order the poller walks and the monitor displays.

use crate::core::codec::{PlcType, PlcValue};
use crate::core::resolver::{trimmed_text, Resolution};
use crate::utils::error::{Result, SimSrvError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// One simulator variable and everything known about it.
#[derive(Debug, Clone)]
pub struct SimVariable {
    /// Variable name as the simulator knows it, e.g. `Motor.Speed` or
    /// `Alarms[3]` for one element of a declared range
    pub name: String,
    /// Declared type tag, e.g. `INT` or `STRING[20]`
    pub type_text: Option<String>,
    /// Inclusive bounds of the declared range this entry came from
    pub low_index: Option<i64>,
    /// See [`Self::low_index`]
    pub high_index: Option<i64>,
    /// Address resolution, present once the endpoint has answered a
    /// `GetVarAddrText` for this name
    pub resolution: Option<Resolution>,
    /// Most recently read or decoded value
    pub value: Option<PlcValue>,
    /// When `value` was last updated
    pub updated_at: Option<DateTime<Utc>>,
    /// Most recent per-variable failure, cleared on a successful read
    pub last_error: Option<String>,
}

impl SimVariable {
    /// Create an undeclared, unresolved variable.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_text: None,
            low_index: None,
            high_index: None,
            resolution: None,
            value: None,
            updated_at: None,
            last_error: None,
        }
    }

    /// Create a variable with its declared type tag.
    pub fn with_type(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        let mut var = Self::new(name);
        var.type_text = Some(type_text.into());
        var
    }

    /// Whether this variable has been resolved to an address.
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Store a fresh resolution.
    pub fn apply_resolution(&mut self, resolution: Resolution) {
        self.resolution = Some(resolution);
    }

    /// Revision token as command text, empty while unresolved.
    pub fn revision_text(&self) -> String {
        self.resolution
            .as_ref()
            .map(|r| trimmed_text(&r.revision))
            .unwrap_or_default()
    }

    /// Address as command text, empty while unresolved.
    pub fn address_text(&self) -> String {
        self.resolution
            .as_ref()
            .map(|r| trimmed_text(&r.address))
            .unwrap_or_default()
    }

    /// Resolved size in bytes, zero while unresolved.
    pub fn size(&self) -> usize {
        self.resolution.as_ref().map_or(0, |r| r.size)
    }

    /// Parse the declared type tag.
    pub fn plc_type(&self) -> Result<PlcType> {
        match &self.type_text {
            Some(tag) => PlcType::from_tag(tag),
            None => Err(SimSrvError::UnsupportedType(format!(
                "Variable '{}' has no declared type",
                self.name
            ))),
        }
    }

    /// Record a successful read.
    pub fn record_value(&mut self, value: PlcValue) {
        self.value = Some(value);
        self.updated_at = Some(Utc::now());
        self.last_error = None;
    }

    /// Record a per-variable failure without discarding the last good value.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }
}

/// Read-only view of one variable for display and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct VariableSnapshot {
    pub name: String,
    pub type_text: Option<String>,
    pub address: String,
    pub size: usize,
    pub value: Option<PlcValue>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl From<&SimVariable> for VariableSnapshot {
    fn from(var: &SimVariable) -> Self {
        Self {
            name: var.name.clone(),
            type_text: var.type_text.clone(),
            address: var.address_text(),
            size: var.size(),
            value: var.value.clone(),
            updated_at: var.updated_at,
            last_error: var.last_error.clone(),
        }
    }
}

/// The working set of variables, iterated in declaration order.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    variables: HashMap<String, SimVariable>,
    /// Declaration order, one entry per name in `variables`
    order: Vec<String>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variable. A replaced variable keeps its
    /// original position in declaration order.
    pub fn upsert(&mut self, variable: SimVariable) {
        if !self.variables.contains_key(&variable.name) {
            self.order.push(variable.name.clone());
        }
        self.variables.insert(variable.name.clone(), variable);
    }

    pub fn get(&self, name: &str) -> Option<&SimVariable> {
        self.variables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SimVariable> {
        self.variables.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Variable names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Snapshots of every variable in declaration order.
    pub fn snapshot(&self) -> Vec<VariableSnapshot> {
        self.order
            .iter()
            .filter_map(|name| self.variables.get(name))
            .map(VariableSnapshot::from)
            .collect()
    }

    /// Drop every variable, for a declaration reload.
    pub fn clear(&mut self) {
        self.variables.clear();
        self.order.clear();
    }
}

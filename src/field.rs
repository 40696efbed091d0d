//! The `SetField<T>` trait and its implementations in this module provide a single generic,
//! overloaded `set<T>()` on the store for every value kind a field update can carry.

use crate::error::{Error, FieldKind};
use crate::platform::FileSystem;
use crate::store::ConfigStore;
use alloc::string::{String, ToString};
use serde_json::Value;

/// A value for a field update. Closed over the kinds the configuration document knows.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i32),
    Text(String),
    Real(f32),
    Boolean(bool),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Real(_) => FieldKind::Real,
            FieldValue::Boolean(_) => FieldKind::Boolean,
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Integer(v) => Value::from(v),
            FieldValue::Text(v) => Value::from(v),
            FieldValue::Real(v) => Value::from(v),
            FieldValue::Boolean(v) => Value::from(v),
        }
    }
}

pub trait SetField<T> {
    fn set_field(&mut self, name: &str, value: T) -> Result<(), Error>;
}

impl<T, S: SetField<T>> SetField<T> for &mut S {
    fn set_field(&mut self, name: &str, value: T) -> Result<(), Error> {
        (*self).set_field(name, value)
    }
}

impl<F: FileSystem> SetField<i32> for ConfigStore<F> {
    fn set_field(&mut self, name: &str, value: i32) -> Result<(), Error> {
        self.update_field(name, FieldValue::Integer(value))
    }
}

impl<F: FileSystem> SetField<&str> for ConfigStore<F> {
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.update_field(name, FieldValue::Text(value.to_string()))
    }
}

impl<F: FileSystem> SetField<String> for ConfigStore<F> {
    fn set_field(&mut self, name: &str, value: String) -> Result<(), Error> {
        self.update_field(name, FieldValue::Text(value))
    }
}

impl<F: FileSystem> SetField<f32> for ConfigStore<F> {
    fn set_field(&mut self, name: &str, value: f32) -> Result<(), Error> {
        self.update_field(name, FieldValue::Real(value))
    }
}

impl<F: FileSystem> SetField<bool> for ConfigStore<F> {
    fn set_field(&mut self, name: &str, value: bool) -> Result<(), Error> {
        self.update_field(name, FieldValue::Boolean(value))
    }
}

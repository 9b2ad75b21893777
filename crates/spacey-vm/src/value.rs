// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Values exchanged between the loader, the script engine and the host.
//!
//! Values are designed to be thread-safe and can be shared between async
//! tasks. Objects are reference types: cloning an [`Object`] clones the
//! handle, not the properties.

use crate::error::Result;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Property table in insertion order, as enumerated by `Object.keys`
pub type PropertyMap = IndexMap<String, Value>;

/// A script value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Mutable object reference
    Object(Object),
    /// Module namespace object
    Namespace(Namespace),
    /// Host-native function
    Function(NativeFunction),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            // NaN != NaN falls out of f64 comparison
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Namespace(a), Value::Namespace(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Value {
    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is null or undefined.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns the number if this is a number value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object handle if this is an object value.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Read a property. Objects and namespaces expose their own keys,
    /// everything else reads as undefined.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(o) => o.get(key),
            Value::Namespace(ns) => ns.get(key).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) | Value::Namespace(_) => "object",
            Value::Function(_) => "function",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Namespace(_) => write!(f, "[object Module]"),
            Value::Function(func) => write!(f, "[Function: {} (native)]", func.name()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Namespace> for Value {
    fn from(ns: Namespace) -> Self {
        Value::Namespace(ns)
    }
}

/// A shared, mutable property map (a plain script object).
#[derive(Clone, Default)]
pub struct Object {
    properties: Arc<RwLock<PropertyMap>>,
}

impl Object {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from existing properties
    pub fn from_map(map: PropertyMap) -> Self {
        Self {
            properties: Arc::new(RwLock::new(map)),
        }
    }

    /// Get a property, undefined when absent
    pub fn get(&self, key: &str) -> Value {
        self.properties.read().get(key).cloned().unwrap_or_default()
    }

    /// Check whether an own property exists
    pub fn has(&self, key: &str) -> bool {
        self.properties.read().contains_key(key)
    }

    /// Set a property
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.write().insert(key.into(), value.into());
    }

    /// Delete a property, returning its previous value
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.properties.write().shift_remove(key)
    }

    /// Own enumerable property names, in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.properties.read().keys().cloned().collect()
    }

    /// Number of own properties
    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    /// Check if the object has no properties
    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }

    /// Copy of the current properties
    pub fn snapshot(&self) -> PropertyMap {
        self.properties.read().clone()
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.properties, &other.properties)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.properties.read().iter()).finish()
    }
}

/// An immutable module namespace: export name to value.
///
/// The export name set is fixed once the namespace is built.
#[derive(Clone, Default)]
pub struct Namespace {
    exports: Arc<PropertyMap>,
}

impl Namespace {
    /// Build a namespace from an export table
    pub fn new(exports: PropertyMap) -> Self {
        Self {
            exports: Arc::new(exports),
        }
    }

    /// Get an export by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.exports.get(name)
    }

    /// Get the default export
    pub fn default_export(&self) -> Option<&Value> {
        self.exports.get("default")
    }

    /// Export names, in export order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    /// Iterate over (name, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.exports.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Check if the namespace has no exports
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// Borrow the export table
    pub fn as_map(&self) -> &PropertyMap {
        &self.exports
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Arc::ptr_eq(&self.exports, &other.exports)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.exports.iter()).finish()
    }
}

type NativeFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// A function implemented by the host.
#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    /// Wrap a Rust closure
    pub fn new(
        name: &str,
        func: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &NativeFunction) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}

/// Convert a JSON document into a script value
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(arr) => {
            let mut map: PropertyMap = arr
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), json_to_value(v)))
                .collect();
            map.insert("length".to_string(), Value::Number(arr.len() as f64));
            Value::Object(Object::from_map(map))
        }
        serde_json::Value::Object(obj) => {
            let map = obj
                .iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect();
            Value::Object(Object::from_map(map))
        }
    }
}

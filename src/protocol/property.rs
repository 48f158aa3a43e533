//! # Property Registry
//!
//! Per-connection table of named, typed properties backed by getter and
//! setter callbacks.
//!
//! ## Access Mode
//! The mode is derived from the callbacks present: readable iff a getter is
//! registered, writable iff a setter is. Registering neither is allowed and
//! yields a property nobody can read or write.
//!
//! ## String Getter Renegotiation
//! ```text
//! Get ──► getter(buffer[INITIAL_STRING_CAPACITY])
//!           ├─ Ok                        ──► value
//!           └─ BufferTooSmall{required}  ──► getter(buffer[required])
//!                                              ├─ Ok                ──► value
//!                                              └─ BufferTooSmall    ──► Internal
//! ```
//! `BufferTooSmall` never leaves [`PropertyRegistry::read`].
//!
//! ## Reentrancy
//! Descriptors are reference counted and the table lock is released before a
//! callback runs, so callbacks may register, unregister or read properties
//! of their own connection.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};

use crate::core::value::{Value, ValueKind};
use crate::error::{constants, LipcError, Result};
use crate::service::Lipc;

/// Name of the read-only pseudo-property listing all registered properties
pub const PROPERTIES_PSEUDO: &str = "_properties";

/// Capacity of the first buffer handed to a string getter
pub const INITIAL_STRING_CAPACITY: usize = 128;

/// String getter invocations per read; only one resize is meaningful
pub const MAX_GETTER_ATTEMPTS: usize = 2;

/// Opaque user data stored with a registration and handed back on unregister
pub type Context = Arc<dyn Any + Send + Sync>;

pub type IntGetter = Box<dyn Fn(&PropertyCall<'_>) -> Result<i32> + Send + Sync>;
pub type IntSetter = Box<dyn Fn(&PropertyCall<'_>, i32) -> Result<()> + Send + Sync>;
pub type StringGetter =
    Box<dyn Fn(&PropertyCall<'_>, &mut StringBuffer) -> Result<()> + Send + Sync>;
pub type StringSetter = Box<dyn Fn(&PropertyCall<'_>, &str) -> Result<()> + Send + Sync>;

/// Property value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Integer,
    String,
}

impl PropertyKind {
    /// Type label used in property listings
    pub fn label(self) -> &'static str {
        match self {
            PropertyKind::Integer => "Int",
            PropertyKind::String => "Str",
        }
    }

    pub fn value_kind(self) -> ValueKind {
        match self {
            PropertyKind::Integer => ValueKind::Integer,
            PropertyKind::String => ValueKind::Text,
        }
    }
}

/// Access mode derived from the registered callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    None,
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    pub fn from_callbacks(readable: bool, writable: bool) -> Self {
        match (readable, writable) {
            (true, true) => AccessMode::ReadWrite,
            (true, false) => AccessMode::Read,
            (false, true) => AccessMode::Write,
            (false, false) => AccessMode::None,
        }
    }

    pub fn readable(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }

    /// Mode token used in property listings
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::None => "-",
            AccessMode::Read => "r",
            AccessMode::Write => "w",
            AccessMode::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a callback gets to see about the invocation
pub struct PropertyCall<'a> {
    lipc: &'a Lipc,
    name: &'a str,
    context: Option<&'a Context>,
}

impl<'a> PropertyCall<'a> {
    pub(crate) fn new(lipc: &'a Lipc, name: &'a str, context: Option<&'a Context>) -> Self {
        Self { lipc, name, context }
    }

    /// The connection serving the request
    pub fn lipc(&self) -> &'a Lipc {
        self.lipc
    }

    /// Property name
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn context(&self) -> Option<&'a Context> {
        self.context
    }

    /// Context downcast to a concrete type
    pub fn context_as<T: Any>(&self) -> Option<&'a T> {
        self.context.and_then(|ctx| ctx.downcast_ref::<T>())
    }
}

/// Bounded output buffer handed to string getters.
///
/// Its capacity counts a terminator slot, so a string of `n` bytes needs a
/// capacity of at least `n + 1`.
#[derive(Debug)]
pub struct StringBuffer {
    data: String,
    capacity: usize,
}

impl StringBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            data: String::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the content with `value`.
    ///
    /// Fails with `BufferTooSmall` carrying the needed capacity if `value`
    /// does not fit, leaving the buffer untouched.
    pub fn write(&mut self, value: &str) -> Result<()> {
        let required = value.len() + 1;
        if required > self.capacity {
            return Err(LipcError::BufferTooSmall { required });
        }
        self.data.clear();
        self.data.push_str(value);
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    fn into_string(self) -> String {
        self.data
    }
}

/// Integer property callbacks
#[derive(Default)]
pub struct IntProperty {
    getter: Option<IntGetter>,
    setter: Option<IntSetter>,
}

impl IntProperty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&PropertyCall<'_>) -> Result<i32> + Send + Sync + 'static,
    {
        self.getter = Some(Box::new(getter));
        self
    }

    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&PropertyCall<'_>, i32) -> Result<()> + Send + Sync + 'static,
    {
        self.setter = Some(Box::new(setter));
        self
    }
}

/// String property callbacks
#[derive(Default)]
pub struct StringProperty {
    getter: Option<StringGetter>,
    setter: Option<StringSetter>,
}

impl StringProperty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&PropertyCall<'_>, &mut StringBuffer) -> Result<()> + Send + Sync + 'static,
    {
        self.getter = Some(Box::new(getter));
        self
    }

    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&PropertyCall<'_>, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.setter = Some(Box::new(setter));
        self
    }
}

/// Typed getter/setter capability of a registered property
pub enum PropertyHandler {
    Integer(IntProperty),
    String(StringProperty),
}

impl From<IntProperty> for PropertyHandler {
    fn from(p: IntProperty) -> Self {
        PropertyHandler::Integer(p)
    }
}

impl From<StringProperty> for PropertyHandler {
    fn from(p: StringProperty) -> Self {
        PropertyHandler::String(p)
    }
}

impl PropertyHandler {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyHandler::Integer(_) => PropertyKind::Integer,
            PropertyHandler::String(_) => PropertyKind::String,
        }
    }

    pub fn mode(&self) -> AccessMode {
        match self {
            PropertyHandler::Integer(p) => {
                AccessMode::from_callbacks(p.getter.is_some(), p.setter.is_some())
            }
            PropertyHandler::String(p) => {
                AccessMode::from_callbacks(p.getter.is_some(), p.setter.is_some())
            }
        }
    }

    /// Invoke the getter, renegotiating the buffer for string properties
    pub fn get(&self, call: &PropertyCall<'_>) -> Result<Value> {
        match self {
            PropertyHandler::Integer(p) => {
                let getter = p.getter.as_ref().ok_or(LipcError::AccessNotAllowed)?;
                match getter(call) {
                    Ok(v) => Ok(Value::Integer(v)),
                    Err(LipcError::BufferTooSmall { .. }) => {
                        Err(LipcError::internal(constants::ERR_INT_GETTER_BUFFER))
                    }
                    Err(e) => Err(e),
                }
            }
            PropertyHandler::String(p) => {
                let getter = p.getter.as_ref().ok_or(LipcError::AccessNotAllowed)?;
                read_string(getter, call).map(Value::Text)
            }
        }
    }

    /// Invoke the setter with `value`, which must match the property kind
    pub fn set(&self, call: &PropertyCall<'_>, value: Value) -> Result<()> {
        match (self, value) {
            (PropertyHandler::Integer(p), Value::Integer(v)) => {
                let setter = p.setter.as_ref().ok_or(LipcError::AccessNotAllowed)?;
                setter(call, v)
            }
            (PropertyHandler::String(p), Value::Text(s)) => {
                let setter = p.setter.as_ref().ok_or(LipcError::AccessNotAllowed)?;
                setter(call, &s)
            }
            (handler, value) => Err(LipcError::invalid_arg(format!(
                "{} property cannot take a {} value",
                handler.kind().label(),
                value.kind()
            ))),
        }
    }
}

fn read_string(getter: &StringGetter, call: &PropertyCall<'_>) -> Result<String> {
    let mut capacity = INITIAL_STRING_CAPACITY;
    for attempt in 1..=MAX_GETTER_ATTEMPTS {
        let mut buffer = StringBuffer::with_capacity(capacity);
        match getter(call, &mut buffer) {
            Ok(()) => return Ok(buffer.into_string()),
            Err(LipcError::BufferTooSmall { required }) if attempt < MAX_GETTER_ATTEMPTS => {
                debug!(
                    property = call.name(),
                    capacity, required, "String getter asked for a larger buffer"
                );
                call.lipc().metrics().buffer_renegotiation();
                capacity = required.max(capacity);
            }
            Err(LipcError::BufferTooSmall { .. }) => break,
            Err(e) => return Err(e),
        }
    }
    Err(LipcError::internal(constants::ERR_RENEGOTIATION_EXHAUSTED))
}

/// A registered property
pub struct PropertyDescriptor {
    name: String,
    handler: PropertyHandler,
    context: Option<Context>,
}

impl PropertyDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.handler.kind()
    }

    pub fn mode(&self) -> AccessMode {
        self.handler.mode()
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    fn call<'a>(&'a self, lipc: &'a Lipc) -> PropertyCall<'a> {
        PropertyCall::new(lipc, &self.name, self.context.as_ref())
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("mode", &self.mode())
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

/// Property table of one connection, in registration order
#[derive(Debug, Default)]
pub struct PropertyRegistry {
    entries: RwLock<Vec<Arc<PropertyDescriptor>>>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, replacing any previous registration and silently
    /// dropping its context.
    #[instrument(skip(self, handler, context), level = "debug")]
    pub fn register(
        &self,
        name: &str,
        handler: impl Into<PropertyHandler>,
        context: Option<Context>,
    ) -> Result<()> {
        validate_property_name(name)?;
        let descriptor = Arc::new(PropertyDescriptor {
            name: name.to_string(),
            handler: handler.into(),
            context,
        });
        debug!(kind = ?descriptor.kind(), mode = %descriptor.mode(), "Registering property");

        let mut entries = self
            .entries
            .write()
            .map_err(|_| LipcError::internal(constants::ERR_REGISTRY_LOCK))?;
        entries.retain(|d| d.name != name);
        entries.push(descriptor);
        Ok(())
    }

    /// Remove `name` and hand back its context
    pub fn unregister(&self, name: &str) -> Result<Option<Context>> {
        let removed = {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| LipcError::internal(constants::ERR_REGISTRY_LOCK))?;
            let pos = entries
                .iter()
                .position(|d| d.name == name)
                .ok_or(LipcError::NoSuchProperty)?;
            entries.remove(pos)
        };
        debug!(property = name, "Unregistered property");
        Ok(removed.context.clone())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<PropertyDescriptor>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LipcError::internal(constants::ERR_REGISTRY_LOCK))?;
        entries
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or(LipcError::NoSuchProperty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `"<name> <Type> <mode> "` for every property, most recently
    /// registered first, with a trailing space.
    pub fn listing(&self) -> Result<String> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LipcError::internal(constants::ERR_REGISTRY_LOCK))?;
        let mut out = String::new();
        for d in entries.iter().rev() {
            out.push_str(&d.name);
            out.push(' ');
            out.push_str(d.kind().label());
            out.push(' ');
            out.push_str(d.mode().as_str());
            out.push(' ');
        }
        Ok(out)
    }

    /// Serve a read of `name` expecting a value of `kind`
    pub fn read(&self, lipc: &Lipc, name: &str, kind: PropertyKind) -> Result<Value> {
        if name == PROPERTIES_PSEUDO {
            return match kind {
                PropertyKind::String => self.listing().map(Value::Text),
                PropertyKind::Integer => Err(LipcError::invalid_arg(
                    "property listing is a string property",
                )),
            };
        }

        let descriptor = self.lookup(name)?;
        ensure_kind(&descriptor, kind)?;
        descriptor.handler.get(&descriptor.call(lipc))
    }

    /// Serve a write of `value` to `name`
    pub fn write(&self, lipc: &Lipc, name: &str, value: Value) -> Result<()> {
        if name == PROPERTIES_PSEUDO {
            return Err(LipcError::AccessNotAllowed);
        }

        let descriptor = self.lookup(name)?;
        descriptor.handler.set(&descriptor.call(lipc), value)
    }
}

fn ensure_kind(descriptor: &PropertyDescriptor, kind: PropertyKind) -> Result<()> {
    if descriptor.kind() != kind {
        return Err(LipcError::invalid_arg(format!(
            "property {:?} is {}, not {}",
            descriptor.name,
            descriptor.kind().label(),
            kind.label()
        )));
    }
    Ok(())
}

/// Property names are non-empty, whitespace-free and may not start with `_`
pub fn validate_property_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LipcError::invalid_arg("property name cannot be empty"));
    }
    if name.starts_with('_') {
        return Err(LipcError::invalid_arg(format!(
            "property name {name:?} is reserved"
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(LipcError::invalid_arg(format!(
            "property name {name:?} contains whitespace"
        )));
    }
    Ok(())
}

//! # Events
//!
//! Named, parameterized notifications emitted by a service.
//!
//! Parameters are an ordered list of integers and strings read back through
//! a cursor. Typed reads check the parameter kind at the cursor and leave
//! the cursor in place on mismatch.
//!
//! Events built with [`Lipc::new_event`](crate::Lipc::new_event) are
//! writable. Events handed to subscription callbacks are read-only views:
//! each callback receives its own copy with the cursor at 0.
//!
//! ## Format Strings
//! [`build_params`] is the convenience path behind
//! `create_and_send_event_with_parameters`. Only `%d` and `%s` are
//! understood, optionally with a `.0` precision (`%.0d`, `%.0s`), which is
//! accepted and ignored. Whitespace between specifiers is skipped; any other
//! text is rejected.

use std::fmt;

use crate::core::value::{Value, ValueKind};
use crate::error::{LipcError, Result};
use crate::protocol::message::EventMessage;

/// An event and its parameter cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    source: String,
    name: String,
    params: Vec<Value>,
    cursor: usize,
    read_only: bool,
}

impl Event {
    pub(crate) fn new(source: &str, name: &str) -> Self {
        Self {
            source: source.to_string(),
            name: name.to_string(),
            params: Vec::new(),
            cursor: 0,
            read_only: false,
        }
    }

    /// Read-only view of a received event
    pub(crate) fn received(message: EventMessage) -> Self {
        Self {
            source: message.source,
            name: message.name,
            params: message.params,
            cursor: 0,
            read_only: true,
        }
    }

    /// Service the event originates from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn add_int_param(&mut self, value: i32) -> Result<()> {
        self.push(Value::Integer(value))
    }

    pub fn add_string_param(&mut self, value: &str) -> Result<()> {
        self.push(Value::Text(value.to_string()))
    }

    fn push(&mut self, value: Value) -> Result<()> {
        if self.read_only {
            return Err(LipcError::OperationNotAllowed);
        }
        self.params.push(value);
        Ok(())
    }

    /// Read the integer at the cursor and advance
    pub fn get_int_param(&mut self) -> Result<i32> {
        match self.params.get(self.cursor) {
            Some(Value::Integer(v)) => {
                let v = *v;
                self.cursor += 1;
                Ok(v)
            }
            _ => Err(LipcError::NoSuchParam),
        }
    }

    /// Read the string at the cursor and advance
    pub fn get_string_param(&mut self) -> Result<&str> {
        let index = self.cursor;
        match self.params.get(index) {
            Some(Value::Text(_)) => self.cursor += 1,
            _ => return Err(LipcError::NoSuchParam),
        }
        match &self.params[index] {
            Value::Text(s) => Ok(s),
            _ => Err(LipcError::NoSuchParam),
        }
    }

    /// Move the cursor back to the first parameter
    pub fn rewind_params(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn to_message(&self) -> EventMessage {
        EventMessage {
            source: self.source.clone(),
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.source, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

/// Argument consumed by a format-string specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventArg<'a> {
    Int(i32),
    Str(&'a str),
}

impl EventArg<'_> {
    fn kind(&self) -> ValueKind {
        match self {
            EventArg::Int(_) => ValueKind::Integer,
            EventArg::Str(_) => ValueKind::Text,
        }
    }
}

impl From<i32> for EventArg<'_> {
    fn from(v: i32) -> Self {
        EventArg::Int(v)
    }
}

impl<'a> From<&'a str> for EventArg<'a> {
    fn from(v: &'a str) -> Self {
        EventArg::Str(v)
    }
}

impl<'a> From<&'a String> for EventArg<'a> {
    fn from(v: &'a String) -> Self {
        EventArg::Str(v.as_str())
    }
}

/// Parse a format string into the parameter kinds it asks for
pub fn parse_format(format: &str) -> Result<Vec<ValueKind>> {
    let mut kinds = Vec::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if c != '%' {
            return Err(LipcError::invalid_arg(format!(
                "unexpected {c:?} in event format {format:?}"
            )));
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            if chars.next() != Some('0') {
                return Err(LipcError::invalid_arg(format!(
                    "only a .0 precision is accepted in {format:?}"
                )));
            }
        }
        match chars.next() {
            Some('d') => kinds.push(ValueKind::Integer),
            Some('s') => kinds.push(ValueKind::Text),
            Some(other) => {
                return Err(LipcError::invalid_arg(format!(
                    "unsupported conversion %{other} in {format:?}"
                )))
            }
            None => {
                return Err(LipcError::invalid_arg(format!(
                    "dangling % in {format:?}"
                )))
            }
        }
    }

    Ok(kinds)
}

/// Match `args` against `format` left to right and produce the parameters
pub fn build_params(format: &str, args: &[EventArg<'_>]) -> Result<Vec<Value>> {
    let kinds = parse_format(format)?;
    if kinds.len() != args.len() {
        return Err(LipcError::invalid_arg(format!(
            "format {format:?} takes {} arguments, {} given",
            kinds.len(),
            args.len()
        )));
    }

    kinds
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (kind, arg))| match arg {
            EventArg::Int(v) if *kind == ValueKind::Integer => Ok(Value::Integer(*v)),
            EventArg::Str(s) if *kind == ValueKind::Text => Ok(Value::Text((*s).to_string())),
            _ => Err(LipcError::invalid_arg(format!(
                "argument {i} is {}, format wants {kind}",
                arg.kind()
            ))),
        })
        .collect()
}

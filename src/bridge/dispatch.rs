//! Call context handed to thunks, and dispatch tables for synthesized objects.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::bridge::{
    types::{Outcome, Thunk},
    value::{ObjectHandle, Value},
    Runtime,
};

/// Everything a [`Thunk`] gets to see about the call it is serving.
pub struct CallContext<'a> {
    /// The runtime the call was made through, for nested calls
    pub runtime: &'a Runtime,
    /// Receiver; `None` for static calls
    pub this: Option<&'a ObjectHandle>,
    /// Name of the member being invoked
    pub member: &'a str,
    /// Arguments in declaration order
    pub args: &'a [Value],
}

impl<'a> CallContext<'a> {
    /// Argument `index`, if passed.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index)
    }

    /// The receiver's host object if it is a `T`.
    #[must_use]
    pub fn this_as<T: std::any::Any>(&self) -> Option<&'a T> {
        self.this?.downcast_ref::<T>()
    }
}

/// How a synthesized object answers one member.
#[derive(Clone)]
pub enum Behavior {
    /// Always return this value
    Constant(Value),
    /// Run this thunk
    Call(Thunk),
}

impl Behavior {
    fn run(&self, call: &CallContext<'_>) -> Outcome {
        match self {
            Behavior::Constant(value) => Ok(value.clone()),
            Behavior::Call(thunk) => thunk(call),
        }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Behavior::Call(_) => f.write_str("Call(..)"),
        }
    }
}

/// Member name to behavior mapping backing a synthesized object.
///
/// ```rust
/// use mcsc::bridge::{DispatchTable, Value};
///
/// // Grants everything, but reports a fixed name
/// let table = DispatchTable::constant(Value::Bool(true))
///     .with_constant("getName", Value::from("validator"));
/// assert!(table.answers("hasPermission"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    members: HashMap<String, Behavior>,
    fallback: Option<Behavior>,
}

impl DispatchTable {
    /// An empty table; members without an entry are unanswerable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table answering every member with `value`.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        DispatchTable {
            members: HashMap::new(),
            fallback: Some(Behavior::Constant(value)),
        }
    }

    /// Answer `member` with `value`.
    #[must_use]
    pub fn with_constant(mut self, member: &str, value: Value) -> Self {
        self.members
            .insert(member.to_string(), Behavior::Constant(value));
        self
    }

    /// Answer `member` by running `body`.
    #[must_use]
    pub fn with_call<F>(mut self, member: &str, body: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.members
            .insert(member.to_string(), Behavior::Call(Arc::new(body)));
        self
    }

    /// Answer members without an entry using `behavior`.
    #[must_use]
    pub fn with_fallback(mut self, behavior: Behavior) -> Self {
        self.fallback = Some(behavior);
        self
    }

    /// `true` if calling `member` would produce an answer.
    #[must_use]
    pub fn answers(&self, member: &str) -> bool {
        self.members.contains_key(member) || self.fallback.is_some()
    }

    pub(crate) fn dispatch(&self, call: &CallContext<'_>) -> Option<Outcome> {
        self.members
            .get(call.member)
            .or(self.fallback.as_ref())
            .map(|behavior| behavior.run(call))
    }
}

/// Host object behind a synthesized handle.
pub(crate) struct Proxy {
    pub(crate) interface: String,
    pub(crate) table: DispatchTable,
}

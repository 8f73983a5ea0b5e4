//! Values crossing the bridge and opaque handles into the host's object graph.

use std::{any::Any, fmt, sync::Arc};

use strum::{Display, EnumIter};

use crate::{BridgeError, Result};

/// Opaque reference to a live host object.
///
/// A handle pairs the object's runtime type name with the object itself. It is cheap to
/// clone (clones refer to the same object), meaningful only inside the current process
/// and never serialized.
#[derive(Clone)]
pub struct ObjectHandle {
    runtime_type: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl ObjectHandle {
    /// Wrap a host object whose runtime type is `runtime_type`.
    pub fn new<T>(runtime_type: &str, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        ObjectHandle {
            runtime_type: normalize_type_name(runtime_type).into(),
            value: Arc::new(value),
        }
    }

    /// Binary name of the object's runtime type (`com.mojang.brigadier.ParseResults`).
    #[must_use]
    pub fn runtime_type(&self) -> &str {
        &self.runtime_type
    }

    /// Borrow the underlying host object if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// `true` if both handles refer to the same object.
    #[must_use]
    pub fn same_object(&self, other: &ObjectHandle) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.value).cast::<()>() as usize
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("runtime_type", &self.runtime_type)
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.runtime_type, self.address())
    }
}

/// The shape of a [`Value`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum ValueKind {
    Void,
    Null,
    Bool,
    Int,
    Long,
    String,
    List,
    Object,
}

/// An argument to or result of a bridge call.
#[derive(Debug, Clone)]
pub enum Value {
    /// Result of a member declared `void`
    Void,
    /// The null reference
    Null,
    /// `boolean`
    Bool(bool),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `java.lang.String`
    Str(String),
    /// A host collection, marshalled element by element
    List(Vec<Value>),
    /// Any other object
    Object(ObjectHandle),
}

impl Value {
    /// The shape of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Void => ValueKind::Void,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Str(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean value.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedValue`] for any other shape.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(value) => Ok(*value),
            other => Err(other.unexpected(ValueKind::Bool)),
        }
    }

    /// The `int` value.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedValue`] for any other shape.
    pub fn as_int(&self) -> Result<i32> {
        match self {
            Value::Int(value) => Ok(*value),
            other => Err(other.unexpected(ValueKind::Int)),
        }
    }

    /// The `long` value; `int` values widen.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedValue`] for any other shape.
    pub fn as_long(&self) -> Result<i64> {
        match self {
            Value::Long(value) => Ok(*value),
            Value::Int(value) => Ok(i64::from(*value)),
            other => Err(other.unexpected(ValueKind::Long)),
        }
    }

    /// The string value.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedValue`] for any other shape.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(value) => Ok(value),
            other => Err(other.unexpected(ValueKind::String)),
        }
    }

    /// The string value, `None` for null.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedValue`] for any other shape.
    pub fn as_opt_str(&self) -> Result<Option<&str>> {
        match self {
            Value::Null => Ok(None),
            other => other.as_str().map(Some),
        }
    }

    /// The list elements.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedValue`] for any other shape.
    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.unexpected(ValueKind::List)),
        }
    }

    /// Borrow the object handle.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedValue`] for any other shape, in particular when a
    /// call chain continues from a `void` or `null` result.
    pub fn as_object(&self) -> Result<&ObjectHandle> {
        match self {
            Value::Object(handle) => Ok(handle),
            other => Err(other.unexpected(ValueKind::Object)),
        }
    }

    /// Take the object handle.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedValue`] for any other shape.
    pub fn into_object(self) -> Result<ObjectHandle> {
        match self {
            Value::Object(handle) => Ok(handle),
            other => Err(other.unexpected(ValueKind::Object)),
        }
    }

    fn unexpected(&self, expected: ValueKind) -> crate::Error {
        BridgeError::UnexpectedValue {
            expected,
            found: self.kind(),
        }
        .into()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same_object(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<ObjectHandle> for Value {
    fn from(value: ObjectHandle) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Convert an internal (`a/b/C`) or binary (`a.b.C`) type name to binary form.
pub(crate) fn normalize_type_name(name: &str) -> String {
    name.replace('/', ".")
}

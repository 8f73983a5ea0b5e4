//! Type definitions the host registers with the bridge.
//!
//! A [`TypeDef`] describes one host class or interface by name: its supertypes, its
//! instance and static methods and its static fields. Method bodies are [`Thunk`]s that
//! forward into the host. The bridge resolves members purely by [`MethodSignature`], so
//! the validator needs no compile-time knowledge of the host's API.
//!
//! # Examples
//!
//! ```rust
//! use mcsc::bridge::{MethodSignature, TypeDef, Value};
//!
//! let def = TypeDef::class("demo.Greeter")
//!     .extends("java.lang.Object")
//!     .method(MethodSignature::new("greet", ["java.lang.String"]), |call| {
//!         let name = call.arg(0).and_then(|v| v.as_str().ok()).unwrap_or("nobody");
//!         Ok(Value::from(format!("hello {name}")))
//!     })
//!     .static_field("DEFAULT_NAME", "world");
//!
//! assert!(def.find_method(&MethodSignature::new("greet", ["java.lang.String"]), false).is_some());
//! ```

use std::{collections::HashMap, fmt, sync::Arc};

use strum::Display;

use crate::bridge::{
    dispatch::CallContext,
    value::{normalize_type_name, ObjectHandle, Value},
};

/// What a [`Thunk`] produces: the member's result, or the exception object it raised.
pub type Outcome = std::result::Result<Value, ObjectHandle>;

/// The body of a bridged method.
pub type Thunk = Arc<dyn Fn(&CallContext<'_>) -> Outcome + Send + Sync>;

/// Name plus parameter types; the identity used to pick among overloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Member name
    pub name: String,
    /// Binary names of the declared parameter types
    pub parameter_types: Vec<String>,
}

impl MethodSignature {
    /// Build a signature; parameter type names may use `/` or `.` separators.
    pub fn new<I, S>(name: &str, parameter_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        MethodSignature {
            name: name.to_string(),
            parameter_types: parameter_types
                .into_iter()
                .map(|ty| normalize_type_name(ty.as_ref()))
                .collect(),
        }
    }

    /// A signature without parameters.
    #[must_use]
    pub fn nullary(name: &str) -> Self {
        MethodSignature {
            name: name.to_string(),
            parameter_types: Vec::new(),
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_types.join(", "))
    }
}

/// Class or interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TypeKind {
    /// Concrete or abstract class
    Class,
    /// Interface; the only kind [`crate::bridge::Runtime::synthesize`] accepts
    Interface,
}

/// A declared method, with a body unless it is abstract.
#[derive(Clone)]
pub struct Method {
    /// Identity of the method
    pub signature: MethodSignature,
    /// Implementation; `None` for abstract and interface methods
    pub body: Option<Thunk>,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("signature", &self.signature)
            .field("abstract", &self.body.is_none())
            .finish()
    }
}

/// A host type as seen by the bridge.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Binary name (`com.mojang.brigadier.CommandDispatcher`)
    pub name: String,
    /// Class or interface
    pub kind: TypeKind,
    /// Direct superclass and superinterfaces
    pub supertypes: Vec<String>,
    methods: Vec<Method>,
    static_methods: Vec<Method>,
    static_fields: HashMap<String, Value>,
}

impl TypeDef {
    fn with_kind(name: &str, kind: TypeKind) -> Self {
        TypeDef {
            name: normalize_type_name(name),
            kind,
            supertypes: Vec::new(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            static_fields: HashMap::new(),
        }
    }

    /// Start describing a class.
    #[must_use]
    pub fn class(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    /// Start describing an interface.
    #[must_use]
    pub fn interface(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    /// Add a direct supertype.
    #[must_use]
    pub fn extends(mut self, supertype: &str) -> Self {
        self.supertypes.push(normalize_type_name(supertype));
        self
    }

    /// Add an instance method.
    #[must_use]
    pub fn method<F>(mut self, signature: MethodSignature, body: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.methods.push(Method {
            signature,
            body: Some(Arc::new(body)),
        });
        self
    }

    /// Declare an instance method without a body.
    #[must_use]
    pub fn abstract_method(mut self, signature: MethodSignature) -> Self {
        self.methods.push(Method {
            signature,
            body: None,
        });
        self
    }

    /// Add a static method.
    #[must_use]
    pub fn static_method<F>(mut self, signature: MethodSignature, body: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.static_methods.push(Method {
            signature,
            body: Some(Arc::new(body)),
        });
        self
    }

    /// Add a static field with a fixed value.
    #[must_use]
    pub fn static_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.static_fields.insert(name.to_string(), value.into());
        self
    }

    /// `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// The method declared directly on this type with exactly this signature.
    #[must_use]
    pub fn find_method(&self, signature: &MethodSignature, is_static: bool) -> Option<&Method> {
        let methods = if is_static {
            &self.static_methods
        } else {
            &self.methods
        };
        methods.iter().find(|method| method.signature == *signature)
    }

    /// Declared instance methods.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    /// The value of a static field declared directly on this type.
    #[must_use]
    pub fn static_field_value(&self, name: &str) -> Option<&Value> {
        self.static_fields.get(name)
    }
}

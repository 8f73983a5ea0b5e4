//! Generic runtime bridge into the host's object graph.
//!
//! The validator drives the host's command grammar without compile-time bindings to it.
//! The host side registers [`TypeDef`]s with a [`Runtime`]; the validator then resolves
//! types and members by name and [`MethodSignature`], invokes them on opaque
//! [`ObjectHandle`]s and gets [`Value`]s back.
//!
//! # Failure classes
//!
//! Callers must be able to tell "the call could not be made" from "the call ran and the
//! target raised an error". The former is [`BridgeError::NotFound`],
//! [`BridgeError::MemberNotFound`] or [`BridgeError::UnexpectedValue`]; the latter is
//! always [`BridgeError::InvocationFailure`] carrying the raised exception object.
//!
//! # Key Components
//!
//! - [`crate::bridge::Runtime`] - Concurrent type registry and invoker
//! - [`crate::bridge::TypeDef`] - Host type description with method thunks
//! - [`crate::bridge::DispatchTable`] - Behavior of synthesized interface objects
//! - [`crate::bridge::Value`] / [`crate::bridge::ObjectHandle`] - Call arguments and results
//!
//! # Examples
//!
//! ```rust
//! use mcsc::bridge::{DispatchTable, MethodSignature, Runtime, TypeDef, Value};
//!
//! let runtime = Runtime::new();
//! runtime.register(
//!     TypeDef::interface("demo.PermissionSource")
//!         .abstract_method(MethodSignature::new("hasPermission", ["int"])),
//! );
//!
//! let source = runtime.synthesize("demo.PermissionSource", DispatchTable::constant(Value::Bool(true)))?;
//! let granted = runtime.invoke(
//!     &source,
//!     &MethodSignature::new("hasPermission", ["int"]),
//!     &[Value::Int(4)],
//! )?;
//! assert!(granted.as_bool()?);
//! # Ok::<(), mcsc::Error>(())
//! ```

mod dispatch;
mod types;
mod value;

pub use dispatch::{Behavior, CallContext, DispatchTable};
pub use types::{Method, MethodSignature, Outcome, Thunk, TypeDef, TypeKind};
pub use value::{ObjectHandle, Value, ValueKind};

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use dashmap::DashMap;

use crate::{bridge::dispatch::Proxy, bridge::value::normalize_type_name, BridgeError, Result};

/// A resolved host type.
pub type TypeHandle = Arc<TypeDef>;

/// Registry of host types and the entry point for every bridged call.
///
/// The registry is a concurrent map, so the host may register types from any thread while
/// the validator thread is making calls.
#[derive(Default)]
pub struct Runtime {
    types: DashMap<String, TypeHandle>,
}

impl Runtime {
    /// Create an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `def`, replacing any earlier definition of the same name.
    pub fn register(&self, def: TypeDef) {
        log::trace!("Registering {} {}", def.kind, def.name);
        self.types.insert(def.name.clone(), Arc::new(def));
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look up a type by binary or internal name.
    ///
    /// # Errors
    /// Returns [`BridgeError::NotFound`] if no such type is registered.
    pub fn resolve(&self, type_name: &str) -> Result<TypeHandle> {
        let name = normalize_type_name(type_name);
        self.types
            .get(&name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BridgeError::NotFound(name).into())
    }

    /// `true` if `type_name` is the handle's runtime type or one of its supertypes.
    #[must_use]
    pub fn is_instance(&self, target: &ObjectHandle, type_name: &str) -> bool {
        let wanted = normalize_type_name(type_name);
        let start = match target.downcast_ref::<Proxy>() {
            Some(proxy) => proxy.interface.clone(),
            None => target.runtime_type().to_string(),
        };
        self.hierarchy(&start).iter().any(|def| def.name == wanted)
    }

    /// Invoke an instance method on `target`.
    ///
    /// The method is looked up on the runtime type first and then breadth-first through its
    /// supertypes; abstract declarations only count for synthesized objects.
    ///
    /// # Errors
    /// Returns [`BridgeError::MemberNotFound`] if no implementation matches `signature`,
    /// and [`BridgeError::InvocationFailure`] if the callee raised an exception.
    pub fn invoke(
        &self,
        target: &ObjectHandle,
        signature: &MethodSignature,
        args: &[Value],
    ) -> Result<Value> {
        let call = CallContext {
            runtime: self,
            this: Some(target),
            member: &signature.name,
            args,
        };

        if let Some(proxy) = target.downcast_ref::<Proxy>() {
            let declared = self
                .hierarchy(&proxy.interface)
                .iter()
                .any(|def| def.find_method(signature, false).is_some());
            let outcome = if declared {
                proxy.table.dispatch(&call)
            } else {
                None
            };
            return match outcome {
                Some(outcome) => settle(outcome),
                None => Err(BridgeError::MemberNotFound {
                    type_name: proxy.interface.clone(),
                    member: signature.clone(),
                }
                .into()),
            };
        }

        let body = self
            .hierarchy(target.runtime_type())
            .iter()
            .find_map(|def| def.find_method(signature, false)?.body.clone());
        match body {
            Some(body) => settle(body(&call)),
            None => Err(BridgeError::MemberNotFound {
                type_name: target.runtime_type().to_string(),
                member: signature.clone(),
            }
            .into()),
        }
    }

    /// Invoke a static method of `type_name`.
    ///
    /// # Errors
    /// Returns [`BridgeError::NotFound`] for an unknown type, [`BridgeError::MemberNotFound`]
    /// for an unknown method, and [`BridgeError::InvocationFailure`] if the callee raised.
    pub fn invoke_static(
        &self,
        type_name: &str,
        signature: &MethodSignature,
        args: &[Value],
    ) -> Result<Value> {
        let root = self.resolve(type_name)?;
        let body = self
            .hierarchy(&root.name)
            .iter()
            .find_map(|def| def.find_method(signature, true)?.body.clone());
        let Some(body) = body else {
            return Err(BridgeError::MemberNotFound {
                type_name: root.name.clone(),
                member: signature.clone(),
            }
            .into());
        };

        settle(body(&CallContext {
            runtime: self,
            this: None,
            member: &signature.name,
            args,
        }))
    }

    /// Read a static field of `type_name` or one of its supertypes.
    ///
    /// # Errors
    /// Returns [`BridgeError::NotFound`] for an unknown type and
    /// [`BridgeError::MemberNotFound`] for an unknown field.
    pub fn read_static_field(&self, type_name: &str, field: &str) -> Result<Value> {
        let root = self.resolve(type_name)?;
        self.hierarchy(&root.name)
            .iter()
            .find_map(|def| def.static_field_value(field).cloned())
            .ok_or_else(|| {
                BridgeError::MemberNotFound {
                    type_name: root.name.clone(),
                    member: MethodSignature::nullary(field),
                }
                .into()
            })
    }

    /// Create an object implementing `interface`, answering calls from `behavior`.
    ///
    /// Only members declared by the interface or its superinterfaces can be invoked on the
    /// result; for those, `behavior` decides the answer.
    ///
    /// # Errors
    /// Returns [`BridgeError::NotFound`] for an unknown type and
    /// [`BridgeError::NotAnInterface`] if it is a class.
    pub fn synthesize(&self, interface: &str, behavior: DispatchTable) -> Result<ObjectHandle> {
        let def = self.resolve(interface)?;
        if !def.is_interface() {
            return Err(BridgeError::NotAnInterface(def.name.clone()).into());
        }

        log::debug!("Synthesizing an implementation of {}", def.name);
        Ok(ObjectHandle::new(
            &format!("$Proxy.{}", def.name),
            Proxy {
                interface: def.name.clone(),
                table: behavior,
            },
        ))
    }

    /// `type_name` followed by all its registered supertypes, breadth-first.
    ///
    /// Supertypes that are not registered (`java.lang.Object`, usually) are skipped.
    fn hierarchy(&self, type_name: &str) -> Vec<TypeHandle> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([type_name.to_string()]);
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let Ok(def) = self.resolve(&name) else {
                continue;
            };
            queue.extend(def.supertypes.iter().cloned());
            result.push(def);
        }
        result
    }
}

fn settle(outcome: Outcome) -> Result<Value> {
    outcome.map_err(|cause| {
        log::debug!("Callee raised {}", cause);
        BridgeError::InvocationFailure(cause).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[derive(Debug)]
    struct Counter(i32);

    fn runtime() -> Runtime {
        let runtime = Runtime::new();
        runtime.register(
            TypeDef::class("demo.Base")
                .method(MethodSignature::nullary("describe"), |_| Ok(Value::from("base"))),
        );
        runtime.register(
            TypeDef::class("demo.Counter")
                .extends("demo.Base")
                .extends("java.lang.Object")
                .method(MethodSignature::nullary("get"), |call| {
                    let counter = call.this_as::<Counter>().map_or(0, |c| c.0);
                    Ok(Value::Int(counter))
                })
                .method(MethodSignature::nullary("explode"), |_| {
                    Err(ObjectHandle::new("demo.Boom", "boom"))
                })
                .static_method(MethodSignature::new("of", ["int"]), |call| {
                    let start = call.arg(0).and_then(|v| v.as_int().ok()).unwrap_or(0);
                    Ok(Value::Object(ObjectHandle::new("demo.Counter", Counter(start))))
                })
                .static_field("ZERO", Value::Int(0)),
        );
        runtime.register(
            TypeDef::interface("demo.Named").abstract_method(MethodSignature::nullary("name")),
        );
        runtime.register(
            TypeDef::interface("demo.Titled")
                .extends("demo.Named")
                .abstract_method(MethodSignature::nullary("title")),
        );
        runtime
    }

    #[test]
    fn test_resolve() {
        let runtime = runtime();
        assert_eq!(runtime.resolve("demo/Counter").unwrap().name, "demo.Counter");
        assert!(matches!(
            runtime.resolve("demo.Missing"),
            Err(Error::Bridge(BridgeError::NotFound(name))) if name == "demo.Missing"
        ));
    }

    #[test]
    fn test_static_then_instance_chain() {
        let runtime = runtime();
        let counter = runtime
            .invoke_static("demo.Counter", &MethodSignature::new("of", ["int"]), &[Value::Int(41)])
            .unwrap()
            .into_object()
            .unwrap();
        let value = runtime
            .invoke(&counter, &MethodSignature::nullary("get"), &[])
            .unwrap();
        assert_eq!(value, Value::Int(41));

        let inherited = runtime
            .invoke(&counter, &MethodSignature::nullary("describe"), &[])
            .unwrap();
        assert_eq!(inherited.as_str().unwrap(), "base");
        assert!(runtime.is_instance(&counter, "demo.Base"));
    }

    #[test]
    fn test_lookup_failure_vs_callee_failure() {
        let runtime = runtime();
        let counter = ObjectHandle::new("demo.Counter", Counter(1));

        let missing = runtime.invoke(&counter, &MethodSignature::new("get", ["int"]), &[]);
        assert!(matches!(
            missing,
            Err(Error::Bridge(BridgeError::MemberNotFound { ref type_name, .. })) if type_name == "demo.Counter"
        ));

        let raised = runtime.invoke(&counter, &MethodSignature::nullary("explode"), &[]);
        match raised {
            Err(Error::Bridge(BridgeError::InvocationFailure(cause))) => {
                assert_eq!(cause.runtime_type(), "demo.Boom");
                assert_eq!(cause.downcast_ref::<&str>(), Some(&"boom"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_static_field() {
        let runtime = runtime();
        assert_eq!(
            runtime.read_static_field("demo.Counter", "ZERO").unwrap(),
            Value::Int(0)
        );
        assert!(matches!(
            runtime.read_static_field("demo.Counter", "ONE"),
            Err(Error::Bridge(BridgeError::MemberNotFound { .. }))
        ));
    }

    #[test]
    fn test_synthesize_answers_every_member() {
        let runtime = runtime();
        let proxy = runtime
            .synthesize("demo.Titled", DispatchTable::constant(Value::from("constant")))
            .unwrap();

        for member in ["name", "title"] {
            let answer = runtime
                .invoke(&proxy, &MethodSignature::nullary(member), &[])
                .unwrap();
            assert_eq!(answer.as_str().unwrap(), "constant");
        }
        assert!(runtime.is_instance(&proxy, "demo.Named"));

        assert!(matches!(
            runtime.invoke(&proxy, &MethodSignature::nullary("undeclared"), &[]),
            Err(Error::Bridge(BridgeError::MemberNotFound { .. }))
        ));
    }

    #[test]
    fn test_synthesize_rejects_classes() {
        let runtime = runtime();
        assert!(matches!(
            runtime.synthesize("demo.Counter", DispatchTable::constant(Value::Null)),
            Err(Error::Bridge(BridgeError::NotAnInterface(_)))
        ));
    }

    #[test]
    fn test_concurrent_registration() {
        let runtime = Arc::new(Runtime::new());
        let threads: Vec<_> = (0..4)
            .map(|i| {
                let runtime = Arc::clone(&runtime);
                std::thread::spawn(move || {
                    runtime.register(TypeDef::class(&format!("demo.T{i}")));
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(runtime.len(), 4);
    }
}

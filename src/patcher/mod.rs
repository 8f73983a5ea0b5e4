//! Instruction stream patcher.
//!
//! The patcher finds the point in a host's entry method where the top-level server
//! object is constructed and stored into a local, and splices in a call that hands that
//! local to a fixed external hook:
//!
//! ```text
//! invokestatic  MinecraftServer.spin(...)     <- construction call (owner on allow-list)
//! astore        5                             <- first reference store after it
//! aload         5                             <- inserted
//! invokestatic  server/Main.init(Object)V     <- inserted
//! ...                                         <- original code continues
//! ```
//!
//! Matching is by semantic shape (owner or return type on an allow-list) rather than by
//! byte offsets, so different compiler outputs of the same source are handled alike. The
//! stream is re-encoded through [`crate::assembly::StreamEncoder`], which keeps branches,
//! switches, the exception table and the offset-bearing debug and verification tables
//! pointed at the same original instructions.
//!
//! # Key Components
//!
//! - [`crate::patcher::locate`] - Find the [`InjectionPoint`]
//! - [`crate::patcher::patch`] - Insert the hook call after the store
//! - [`crate::patcher::inject`] - End-to-end: class bytes in, patched class bytes out
//! - [`crate::patcher::InjectOptions`] / [`crate::patcher::HookSymbol`] - Configuration
//!
//! # Examples
//!
//! ```rust,no_run
//! use mcsc::patcher::{inject, HookSymbol, InjectOptions};
//!
//! let original = std::fs::read("net/minecraft/server/Main.class")?;
//! let options = InjectOptions::default()
//!     .with_hook(HookSymbol::new("server.Main", "init", "(Ljava/lang/Object;)V"));
//! let patched = inject(&original, &options)?;
//! std::fs::write("Main.class", patched)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;

use crate::{
    assembly::{decode_stream, Instruction, StreamEncoder},
    classfile::{code::CodeAttribute, ClassFile, ConstantPool},
    Error, PatchError, Result,
};

/// Type treated as the host root by default.
pub const DEFAULT_HOST_ROOT: &str = "net.minecraft.server.MinecraftServer";

/// The external entry point the injected call targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSymbol {
    /// Owner class, binary (`server.Main`) or internal (`server/Main`) form
    pub owner: String,
    /// Static method name
    pub name: String,
    /// Method descriptor; must take exactly one reference argument
    pub descriptor: String,
}

impl HookSymbol {
    /// Create a hook symbol.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        HookSymbol {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Check that the descriptor has the `(L...;)V` or `([...)V` shape.
    ///
    /// The inserted `aload` pushes exactly one reference, which the call must consume
    /// without leaving a result behind.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidHook`] for any other descriptor.
    pub fn validate(&self) -> Result<()> {
        let invalid = || Error::from(PatchError::InvalidHook(self.descriptor.clone()));
        let Some(rest) = self.descriptor.strip_prefix('(') else {
            return Err(invalid());
        };
        let Some(param_len) = reference_type_len(rest) else {
            return Err(invalid());
        };
        if &rest[param_len..] != ")V" {
            return Err(invalid());
        }
        Ok(())
    }

    /// Owner in the `/`-separated form used inside class files.
    #[must_use]
    pub fn internal_owner(&self) -> String {
        self.owner.replace('.', "/")
    }
}

impl Default for HookSymbol {
    fn default() -> Self {
        HookSymbol::new("server.Main", "init", "(Ljava/lang/Object;)V")
    }
}

impl fmt::Display for HookSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Length of the reference field type at the start of `text`, if there is one.
fn reference_type_len(text: &str) -> Option<usize> {
    let dims = text.bytes().take_while(|&b| b == b'[').count();
    let element = &text[dims..];
    let element_len = match element.bytes().next()? {
        b'L' => element.find(';').filter(|&end| end > 1)? + 1,
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' if dims > 0 => 1,
        _ => return None,
    };
    Some(dims + element_len)
}

/// Where the hook call goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionPoint {
    /// Index of the construction call in the instruction sequence
    pub call_index: usize,
    /// Index of the reference store following it
    pub store_index: usize,
    /// Local slot the store writes
    pub local_slot: u16,
}

/// Settings for [`inject`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectOptions {
    /// Name of the method to patch
    pub method: String,
    /// Host root types, binary or internal form
    pub roots: Vec<String>,
    /// Call target of the inserted instruction pair
    pub hook: HookSymbol,
}

impl Default for InjectOptions {
    fn default() -> Self {
        InjectOptions {
            method: "main".to_string(),
            roots: vec![DEFAULT_HOST_ROOT.to_string()],
            hook: HookSymbol::default(),
        }
    }
}

impl InjectOptions {
    /// Patch the method called `method` instead of `main`.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Replace the host root allow-list.
    #[must_use]
    pub fn with_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Target a different hook.
    #[must_use]
    pub fn with_hook(mut self, hook: HookSymbol) -> Self {
        self.hook = hook;
        self
    }
}

/// A method's decoded code, as consumed and produced by the patcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCode {
    /// The `Code` attribute, including `max_stack`, `max_locals` and the offset tables
    pub attribute: CodeAttribute,
    /// The decoded form of `attribute.code`
    pub instructions: Vec<Instruction>,
}

impl MethodCode {
    /// Decode the instruction stream of a `Code` attribute.
    ///
    /// # Errors
    /// Fails if the code array does not decode.
    pub fn new(attribute: CodeAttribute) -> Result<Self> {
        let instructions = decode_stream(&attribute.code)?;
        Ok(MethodCode {
            attribute,
            instructions,
        })
    }
}

fn matches_root(class: &str, roots: &[String]) -> bool {
    roots
        .iter()
        .any(|root| root.len() == class.len() && root.replace('.', "/") == class)
}

/// Find the construction call and the reference store that follows it.
///
/// A call qualifies when any of the four invoke instructions references a method whose
/// owner, or whose descriptor's return type, is on `roots`. The first qualifying call
/// wins; the store is the first `astore`, `astore_<n>` or `wide astore` after it.
///
/// # Errors
/// Returns [`PatchError::NoConstructionCall`] if no call qualifies and
/// [`PatchError::NoStoreFollowing`] if the stream ends before a store.
pub fn locate(method: &MethodCode, pool: &ConstantPool, roots: &[String]) -> Result<InjectionPoint> {
    let mut call_index = None;
    for (index, instruction) in method.instructions.iter().enumerate() {
        if !instruction.is_invoke() {
            continue;
        }
        let Some(constant) = instruction.constant_index() else {
            continue;
        };

        // invokedynamic call sites have no owner class; only the return type counts
        let (owner, return_class) = match pool.member_ref(constant) {
            Ok(member) => (Some(member.owner.clone()), member.return_class().map(str::to_string)),
            Err(_) => match pool.get(constant) {
                Some(crate::classfile::Constant::InvokeDynamic {
                    name_and_type_index,
                    ..
                }) => {
                    let (_, descriptor) = pool.name_and_type(*name_and_type_index)?;
                    let return_class = descriptor
                        .rsplit_once(')')
                        .and_then(|(_, ret)| ret.strip_prefix('L'))
                        .and_then(|ret| ret.strip_suffix(';'))
                        .map(str::to_string);
                    (None, return_class)
                }
                _ => return Err(PatchError::InvalidConstant(constant).into()),
            },
        };

        let owner_matches = owner.as_deref().is_some_and(|o| matches_root(o, roots));
        let return_matches = return_class
            .as_deref()
            .is_some_and(|r| matches_root(r, roots));
        if owner_matches || return_matches {
            log::debug!(
                "Construction call at offset {} ({})",
                instruction.offset,
                instruction
            );
            call_index = Some(index);
            break;
        }
    }

    let Some(call_index) = call_index else {
        return Err(PatchError::NoConstructionCall.into());
    };

    method.instructions[call_index + 1..]
        .iter()
        .enumerate()
        .find_map(|(relative, instruction)| {
            instruction
                .reference_store_slot()
                .map(|local_slot| InjectionPoint {
                    call_index,
                    store_index: call_index + 1 + relative,
                    local_slot,
                })
        })
        .ok_or_else(|| PatchError::NoStoreFollowing { call_index }.into())
}

/// Insert `aload point.local_slot; invokestatic hook` right after the store.
///
/// The hook's `Methodref` is appended to `pool`, or reused if present. The returned method
/// has its stream re-encoded, every offset table relocated and `max_stack` raised to at
/// least 1.
///
/// # Errors
/// Returns [`PatchError::InvalidHook`] if `hook` would unbalance the operand stack,
/// [`PatchError::BranchOutOfRange`] if a conditional branch can no longer reach its
/// target, [`PatchError::ConstantPoolOverflow`] if the pool is full, or a codec error if
/// the stream is inconsistent with `point`.
pub fn patch(
    method: &MethodCode,
    point: &InjectionPoint,
    hook: &HookSymbol,
    pool: &mut ConstantPool,
) -> Result<MethodCode> {
    if point.store_index >= method.instructions.len() {
        return Err(out_of_bounds_error!());
    }
    hook.validate()?;

    let hook_index =
        pool.find_or_add_method_ref(&hook.internal_owner(), &hook.name, &hook.descriptor)?;

    let original_len = u32::try_from(method.attribute.code.len())
        .map_err(|_| malformed_error!("Code array too large"))?;
    let mut encoder = StreamEncoder::new(&method.instructions, original_len);
    encoder.insert(
        point.store_index + 1,
        vec![
            Instruction::load_reference(point.local_slot),
            Instruction::invoke_static(hook_index),
        ],
    )?;
    let encoded = encoder.finalize()?;

    let mut attribute = method.attribute.clone();
    attribute.relocate(&encoded)?;
    attribute.code = encoded.code;
    attribute.max_stack = attribute.max_stack.max(1);

    log::debug!(
        "Inserted call to {} after store to local {} ({} -> {} bytes)",
        hook,
        point.local_slot,
        original_len,
        attribute.code.len()
    );

    MethodCode::new(attribute)
}

/// Parse a class file, patch the method named in `options` and serialize the result.
///
/// # Errors
/// Returns [`PatchError::MethodNotFound`] or [`PatchError::MissingCode`] if the method
/// cannot be patched, any error of [`locate`] and [`patch`], and codec errors for
/// malformed input.
pub fn inject(class_bytes: &[u8], options: &InjectOptions) -> Result<Vec<u8>> {
    options.hook.validate()?;
    let mut class = ClassFile::parse(class_bytes)?;

    let Some(method_index) = class.method_index(&options.method) else {
        return Err(PatchError::MethodNotFound(options.method.clone()).into());
    };
    let method = &class.methods[method_index];
    let Some(code_index) = class.code_attribute_index(method) else {
        return Err(PatchError::MissingCode(options.method.clone()).into());
    };

    let attribute = CodeAttribute::parse(&method.attributes[code_index].info, &class.constant_pool)?;
    let code = MethodCode::new(attribute)?;
    let point = locate(&code, &class.constant_pool, &options.roots)?;
    log::info!(
        "Injecting {} into {}.{} after instruction {} (local {})",
        options.hook,
        class.class_name()?,
        options.method,
        point.store_index,
        point.local_slot
    );

    let patched = patch(&code, &point, &options.hook, &mut class.constant_pool)?;
    class.methods[method_index].attributes[code_index].info = patched.attribute.to_bytes()?;
    class.to_bytes()
}

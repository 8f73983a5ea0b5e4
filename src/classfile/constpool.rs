//! Constant pool of a class file.
//!
//! The pool is stored as a slot vector that mirrors the on-disk indexing: slot `0` is
//! unused, and the slot following a `Long` or `Double` entry is empty because those
//! entries occupy two indices.
//!
//! Besides parsing and writing, the pool supports the two operations the patcher needs:
//! resolving a member reference to readable names ([`ConstantPool::member_ref`]) and
//! appending, or reusing, the entries for a new method reference
//! ([`ConstantPool::find_or_add_method_ref`]).

use std::fmt;

use crate::{
    file::{io::push_be, parser::Parser},
    PatchError, Result,
};

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// A single constant pool entry.
///
/// Floating point constants are kept as their raw bit patterns so that writing a pool
/// reproduces the input byte for byte, NaN payloads included.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Constant {
    /// Modified UTF-8 bytes, exactly as stored in the class file
    Utf8(Vec<u8>),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl Constant {
    /// Build a `Utf8` entry from a Rust string.
    #[must_use]
    pub fn utf8(value: &str) -> Self {
        Constant::Utf8(encode_modified_utf8(value))
    }

    /// `true` for the entries that occupy two pool slots.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let tag = parser.read_be::<u8>()?;
        let constant = match tag {
            TAG_UTF8 => Constant::Utf8(parser.read_prefixed_bytes()?.to_vec()),
            TAG_INTEGER => Constant::Integer(parser.read_be()?),
            TAG_FLOAT => Constant::Float(parser.read_be()?),
            TAG_LONG => Constant::Long(parser.read_be()?),
            TAG_DOUBLE => Constant::Double(parser.read_be()?),
            TAG_CLASS => Constant::Class {
                name_index: parser.read_be()?,
            },
            TAG_STRING => Constant::String {
                string_index: parser.read_be()?,
            },
            TAG_FIELDREF => Constant::FieldRef {
                class_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_METHODREF => Constant::MethodRef {
                class_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                class_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_NAME_AND_TYPE => Constant::NameAndType {
                name_index: parser.read_be()?,
                descriptor_index: parser.read_be()?,
            },
            TAG_METHOD_HANDLE => Constant::MethodHandle {
                reference_kind: parser.read_be()?,
                reference_index: parser.read_be()?,
            },
            TAG_METHOD_TYPE => Constant::MethodType {
                descriptor_index: parser.read_be()?,
            },
            TAG_DYNAMIC => Constant::Dynamic {
                bootstrap_method_attr_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method_attr_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_MODULE => Constant::Module {
                name_index: parser.read_be()?,
            },
            TAG_PACKAGE => Constant::Package {
                name_index: parser.read_be()?,
            },
            other => {
                return Err(malformed_error!(
                    "Unknown constant pool tag {} at offset {}",
                    other,
                    parser.pos() - 1
                ))
            }
        };

        Ok(constant)
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Constant::Utf8(bytes) => {
                let Ok(len) = u16::try_from(bytes.len()) else {
                    return Err(malformed_error!(
                        "Utf8 constant of {} bytes exceeds 65535",
                        bytes.len()
                    ));
                };
                out.push(TAG_UTF8);
                push_be(out, len);
                out.extend_from_slice(bytes);
            }
            Constant::Integer(value) => {
                out.push(TAG_INTEGER);
                push_be(out, *value);
            }
            Constant::Float(bits) => {
                out.push(TAG_FLOAT);
                push_be(out, *bits);
            }
            Constant::Long(value) => {
                out.push(TAG_LONG);
                push_be(out, *value);
            }
            Constant::Double(bits) => {
                out.push(TAG_DOUBLE);
                push_be(out, *bits);
            }
            Constant::Class { name_index } => {
                out.push(TAG_CLASS);
                push_be(out, *name_index);
            }
            Constant::String { string_index } => {
                out.push(TAG_STRING);
                push_be(out, *string_index);
            }
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            } => {
                out.push(TAG_FIELDREF);
                push_be(out, *class_index);
                push_be(out, *name_and_type_index);
            }
            Constant::MethodRef {
                class_index,
                name_and_type_index,
            } => {
                out.push(TAG_METHODREF);
                push_be(out, *class_index);
                push_be(out, *name_and_type_index);
            }
            Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                out.push(TAG_INTERFACE_METHODREF);
                push_be(out, *class_index);
                push_be(out, *name_and_type_index);
            }
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => {
                out.push(TAG_NAME_AND_TYPE);
                push_be(out, *name_index);
                push_be(out, *descriptor_index);
            }
            Constant::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                out.push(TAG_METHOD_HANDLE);
                out.push(*reference_kind);
                push_be(out, *reference_index);
            }
            Constant::MethodType { descriptor_index } => {
                out.push(TAG_METHOD_TYPE);
                push_be(out, *descriptor_index);
            }
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                out.push(TAG_DYNAMIC);
                push_be(out, *bootstrap_method_attr_index);
                push_be(out, *name_and_type_index);
            }
            Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                out.push(TAG_INVOKE_DYNAMIC);
                push_be(out, *bootstrap_method_attr_index);
                push_be(out, *name_and_type_index);
            }
            Constant::Module { name_index } => {
                out.push(TAG_MODULE);
                push_be(out, *name_index);
            }
            Constant::Package { name_index } => {
                out.push(TAG_PACKAGE);
                push_be(out, *name_index);
            }
        }

        Ok(())
    }
}

/// A field, method or interface method reference with all indices resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Owner class in internal form (`java/lang/Object`)
    pub owner: String,
    /// Member name
    pub name: String,
    /// Field or method descriptor
    pub descriptor: String,
}

impl MemberRef {
    /// For a method descriptor returning an object type, the returned class in internal form.
    #[must_use]
    pub fn return_class(&self) -> Option<&str> {
        let (_, ret) = self.descriptor.rsplit_once(')')?;
        ret.strip_prefix('L')?.strip_suffix(';')
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// The constant pool of a class file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantPool {
    /// Slot `i` holds constant `#i`; slot 0 and the upper halves of wide entries are `None`
    entries: Vec<Option<Constant>>,
}

impl ConstantPool {
    /// Create an empty pool (only the reserved slot 0).
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![None],
        }
    }

    /// Parse `constant_pool_count` followed by the entries.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown tags or a wide entry in the last slot,
    /// and [`crate::Error::OutOfBounds`] on truncated input.
    pub fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let count = parser.read_be::<u16>()?;
        if count == 0 {
            return Err(malformed_error!("constant_pool_count must be at least 1"));
        }

        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(None);
        while entries.len() < usize::from(count) {
            let constant = Constant::parse(parser)?;
            let wide = constant.is_wide();
            entries.push(Some(constant));
            if wide {
                if entries.len() >= usize::from(count) {
                    return Err(malformed_error!("Wide constant occupies the last pool slot"));
                }
                entries.push(None);
            }
        }

        Ok(ConstantPool { entries })
    }

    /// Write `constant_pool_count` followed by the entries.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an entry cannot be represented.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        push_be(out, self.count());
        for constant in self.entries.iter().flatten() {
            constant.write(out)?;
        }
        Ok(())
    }

    /// The on-disk `constant_pool_count`: number of slots including slot 0.
    #[must_use]
    pub fn count(&self) -> u16 {
        u16::try_from(self.entries.len()).unwrap_or(u16::MAX)
    }

    /// Look up constant `#index`.
    #[must_use]
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(usize::from(index))?.as_ref()
    }

    /// Iterate over `(index, constant)` pairs, skipping empty slots.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries.iter().enumerate().filter_map(|(index, slot)| {
            let index = u16::try_from(index).ok()?;
            slot.as_ref().map(|constant| (index, constant))
        })
    }

    /// Append a constant and return its index.
    ///
    /// # Errors
    /// Returns [`PatchError::ConstantPoolOverflow`] if the pool has no room left.
    pub fn push(&mut self, constant: Constant) -> Result<u16> {
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + slots > usize::from(u16::MAX) {
            return Err(PatchError::ConstantPoolOverflow.into());
        }

        let index = self.count();
        self.entries.push(Some(constant));
        if slots == 2 {
            self.entries.push(None);
        }
        Ok(index)
    }

    /// Decode the `Utf8` constant at `index`.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidConstant`] if `#index` is not a `Utf8` entry.
    pub fn utf8(&self, index: u16) -> Result<String> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => Ok(decode_modified_utf8(bytes)),
            _ => Err(PatchError::InvalidConstant(index).into()),
        }
    }

    /// Resolve the `Class` constant at `index` to its internal name.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidConstant`] if `#index` is not a `Class` entry.
    pub fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index) {
            Some(Constant::Class { name_index }) => self.utf8(*name_index),
            _ => Err(PatchError::InvalidConstant(index).into()),
        }
    }

    /// Resolve the `NameAndType` constant at `index` to `(name, descriptor)`.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidConstant`] if `#index` is not a `NameAndType` entry.
    pub fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.get(index) {
            Some(Constant::NameAndType {
                name_index,
                descriptor_index,
            }) => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(PatchError::InvalidConstant(index).into()),
        }
    }

    /// Resolve a `Fieldref`, `Methodref` or `InterfaceMethodref` at `index`.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidConstant`] if `#index` or anything it references has the
    /// wrong kind.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef> {
        let (class_index, name_and_type_index) = match self.get(index) {
            Some(
                Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                },
            ) => (*class_index, *name_and_type_index),
            _ => return Err(PatchError::InvalidConstant(index).into()),
        };

        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Ok(MemberRef {
            owner,
            name,
            descriptor,
        })
    }

    /// Index of an existing `Utf8` constant equal to `value`, or a newly appended one.
    ///
    /// # Errors
    /// Returns [`PatchError::ConstantPoolOverflow`] when appending is impossible.
    pub fn find_or_add_utf8(&mut self, value: &str) -> Result<u16> {
        let encoded = encode_modified_utf8(value);
        if let Some(index) = self.find(|c| matches!(c, Constant::Utf8(bytes) if *bytes == encoded))
        {
            return Ok(index);
        }
        self.push(Constant::Utf8(encoded))
    }

    /// Index of a `Class` constant for `internal_name`, appending it if needed.
    ///
    /// # Errors
    /// Returns [`PatchError::ConstantPoolOverflow`] when appending is impossible.
    pub fn find_or_add_class(&mut self, internal_name: &str) -> Result<u16> {
        let name_index = self.find_or_add_utf8(internal_name)?;
        let constant = Constant::Class { name_index };
        match self.find(|c| *c == constant) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    /// Index of a `NameAndType` constant, appending it if needed.
    ///
    /// # Errors
    /// Returns [`PatchError::ConstantPoolOverflow`] when appending is impossible.
    pub fn find_or_add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.find_or_add_utf8(name)?;
        let descriptor_index = self.find_or_add_utf8(descriptor)?;
        let constant = Constant::NameAndType {
            name_index,
            descriptor_index,
        };
        match self.find(|c| *c == constant) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    /// Index of a `Methodref` constant for `owner.name descriptor`, appending the
    /// constant and everything it references if needed.
    ///
    /// # Errors
    /// Returns [`PatchError::ConstantPoolOverflow`] when appending is impossible.
    pub fn find_or_add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class_index = self.find_or_add_class(owner)?;
        let name_and_type_index = self.find_or_add_name_and_type(name, descriptor)?;
        let constant = Constant::MethodRef {
            class_index,
            name_and_type_index,
        };
        match self.find(|c| *c == constant) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    fn find(&self, predicate: impl Fn(&Constant) -> bool) -> Option<u16> {
        self.iter()
            .find(|(_, constant)| predicate(constant))
            .map(|(index, _)| index)
    }
}

/// Decode the JVM's modified UTF-8 into a Rust string.
///
/// Modified UTF-8 encodes NUL as `C0 80` and supplementary characters as a pair of
/// three-byte surrogates. Malformed sequences decode to U+FFFD.
#[must_use]
pub fn decode_modified_utf8(bytes: &[u8]) -> String {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = u16::from(bytes[i]);
        if b0 & 0x80 == 0 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            let b1 = u16::from(bytes[i + 1]);
            units.push(((b0 & 0x1F) << 6) | (b1 & 0x3F));
            i += 2;
        } else if b0 & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            let b1 = u16::from(bytes[i + 1]);
            let b2 = u16::from(bytes[i + 2]);
            units.push(((b0 & 0x0F) << 12) | ((b1 & 0x3F) << 6) | (b2 & 0x3F));
            i += 3;
        } else {
            units.push(0xFFFD);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}

/// Encode a Rust string as the JVM's modified UTF-8.
#[must_use]
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_modified_utf8_nul_and_ascii() {
        let encoded = encode_modified_utf8("a\0b");
        assert_eq!(encoded, [b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode_modified_utf8(&encoded), "a\0b");
    }

    #[test]
    fn test_modified_utf8_supplementary() {
        let encoded = encode_modified_utf8("\u{1F600}");
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode_modified_utf8(&encoded), "\u{1F600}");
    }

    #[test]
    fn test_parse_wide_entries() {
        let mut data = Vec::new();
        push_be(&mut data, 4u16);
        data.push(TAG_LONG);
        push_be(&mut data, -5i64);
        data.push(TAG_UTF8);
        push_be(&mut data, 2u16);
        data.extend_from_slice(b"hi");

        let pool = ConstantPool::parse(&mut Parser::new(&data)).unwrap();
        assert_eq!(pool.get(1), Some(&Constant::Long(-5)));
        assert_eq!(pool.get(2), None);
        assert_eq!(pool.utf8(3).unwrap(), "hi");

        let mut written = Vec::new();
        pool.write(&mut written).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn test_unknown_tag() {
        let data = [0x00, 0x02, 0x02, 0x00];
        let result = ConstantPool::parse(&mut Parser::new(&data));
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_member_ref_resolution() {
        let mut pool = ConstantPool::new();
        let index = pool
            .find_or_add_method_ref(
                "net/minecraft/server/MinecraftServer",
                "spin",
                "(Ljava/util/function/Function;)Lnet/minecraft/server/MinecraftServer;",
            )
            .unwrap();

        let member = pool.member_ref(index).unwrap();
        assert_eq!(member.owner, "net/minecraft/server/MinecraftServer");
        assert_eq!(member.name, "spin");
        assert_eq!(
            member.return_class(),
            Some("net/minecraft/server/MinecraftServer")
        );
    }

    #[test]
    fn test_find_or_add_reuses_entries() {
        let mut pool = ConstantPool::new();
        let first = pool
            .find_or_add_method_ref("server/Main", "init", "(Ljava/lang/Object;)V")
            .unwrap();
        let count = pool.count();
        let second = pool
            .find_or_add_method_ref("server/Main", "init", "(Ljava/lang/Object;)V")
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(pool.count(), count);
    }

    #[test]
    fn test_invalid_reference() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.find_or_add_utf8("x").unwrap();
        assert!(matches!(
            pool.class_name(utf8),
            Err(Error::Patch(PatchError::InvalidConstant(1)))
        ));
        assert!(pool.member_ref(42).is_err());
    }

    #[test]
    fn test_return_class_primitive() {
        let member = MemberRef {
            owner: "a/B".into(),
            name: "c".into(),
            descriptor: "()V".into(),
        };
        assert_eq!(member.return_class(), None);
    }
}

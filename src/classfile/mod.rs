//! JVM class file container codec.
//!
//! This module reads and writes the class file format far enough to patch a single
//! method: the constant pool is fully decoded, fields, methods and attributes are kept
//! as structured records, and attribute payloads stay raw bytes unless a caller asks
//! for a decoded view (see [`crate::classfile::code::CodeAttribute`]). Parsing followed
//! by [`ClassFile::to_bytes`] reproduces the input exactly.
//!
//! # Key Components
//!
//! - [`crate::classfile::ClassFile`] - The parsed container
//! - [`crate::classfile::constpool::ConstantPool`] - Constant pool with lookup and append
//! - [`crate::classfile::code::CodeAttribute`] - Decoded `Code` attribute
//! - [`crate::classfile::AccessFlags`] - Class and member access flags
//!
//! # Examples
//!
//! ```rust,no_run
//! use mcsc::classfile::ClassFile;
//!
//! let bytes = std::fs::read("net/minecraft/server/Main.class")?;
//! let class = ClassFile::parse(&bytes)?;
//! println!("{} has {} methods", class.class_name()?, class.methods.len());
//!
//! if let Some(main) = class.method("main") {
//!     let code = class.code(main)?;
//!     println!("main is {} bytes long", code.code.len());
//! }
//! # Ok::<(), mcsc::Error>(())
//! ```

use bitflags::bitflags;

pub mod code;
pub mod constpool;

pub use code::CodeAttribute;
pub use constpool::{Constant, ConstantPool, MemberRef};

use crate::{
    file::{io::push_be, parser::Parser},
    PatchError, Result,
};

/// Magic number at the start of every class file.
pub const MAGIC: u32 = 0xCAFE_BABE;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Access flags of classes, fields and methods.
    ///
    /// Some bits carry different meanings depending on what they are attached to, which is
    /// why several constants share a value.
    pub struct AccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Class: treat superclass methods specially in invokespecial
        const SUPER = 0x0020;
        /// Method: declared synchronized
        const SYNCHRONIZED = 0x0020;
        /// Field: declared volatile
        const VOLATILE = 0x0040;
        /// Method: compiler-generated bridge
        const BRIDGE = 0x0040;
        /// Field: declared transient
        const TRANSIENT = 0x0080;
        /// Method: variable arity
        const VARARGS = 0x0080;
        /// Method: implemented natively
        const NATIVE = 0x0100;
        /// Class: is an interface
        const INTERFACE = 0x0200;
        /// Declared abstract
        const ABSTRACT = 0x0400;
        /// Method: strict floating point
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Class: annotation interface
        const ANNOTATION = 0x2000;
        /// Enum class or constant
        const ENUM = 0x4000;
        /// Class: module descriptor
        const MODULE = 0x8000;
    }
}

/// A raw attribute: name plus undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// `Utf8` constant holding the attribute name
    pub name_index: u16,
    /// Attribute payload
    pub info: Vec<u8>,
}

impl Attribute {
    /// Read `attribute_name_index`, `attribute_length` and the payload.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the payload is truncated.
    pub fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let name_index = parser.read_be::<u16>()?;
        let length = parser.read_be::<u32>()?;
        let info = parser.read_bytes(length as usize)?.to_vec();
        Ok(Attribute { name_index, info })
    }

    /// Write the attribute in class file layout.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the payload exceeds 4 GiB.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let Ok(length) = u32::try_from(self.info.len()) else {
            return Err(malformed_error!("Attribute of {} bytes is too large", self.info.len()));
        };
        push_be(out, self.name_index);
        push_be(out, length);
        out.extend_from_slice(&self.info);
        Ok(())
    }
}

fn parse_attributes(parser: &mut Parser<'_>) -> Result<Vec<Attribute>> {
    let count = parser.read_be::<u16>()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        attributes.push(Attribute::parse(parser)?);
    }
    Ok(attributes)
}

fn write_attributes(attributes: &[Attribute], out: &mut Vec<u8>) -> Result<()> {
    let Ok(count) = u16::try_from(attributes.len()) else {
        return Err(malformed_error!("Too many attributes: {}", attributes.len()));
    };
    push_be(out, count);
    for attribute in attributes {
        attribute.write(out)?;
    }
    Ok(())
}

/// A field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Access and property flags
    pub access_flags: AccessFlags,
    /// `Utf8` constant holding the simple name
    pub name_index: u16,
    /// `Utf8` constant holding the descriptor
    pub descriptor_index: u16,
    /// Member attributes (`Code`, `Signature`, ...)
    pub attributes: Vec<Attribute>,
}

impl MemberInfo {
    fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        Ok(MemberInfo {
            access_flags: AccessFlags::from_bits_retain(parser.read_be()?),
            name_index: parser.read_be()?,
            descriptor_index: parser.read_be()?,
            attributes: parse_attributes(parser)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        push_be(out, self.access_flags.bits());
        push_be(out, self.name_index);
        push_be(out, self.descriptor_index);
        write_attributes(&self.attributes, out)
    }
}

/// A parsed class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    /// Minor version
    pub minor_version: u16,
    /// Major version (52 = Java 8, 65 = Java 21, ...)
    pub major_version: u16,
    /// Constant pool
    pub constant_pool: ConstantPool,
    /// Class access flags
    pub access_flags: AccessFlags,
    /// `Class` constant of this class
    pub this_class: u16,
    /// `Class` constant of the superclass, 0 for `java/lang/Object`
    pub super_class: u16,
    /// `Class` constants of the direct superinterfaces
    pub interfaces: Vec<u16>,
    /// Declared fields
    pub fields: Vec<MemberInfo>,
    /// Declared methods
    pub methods: Vec<MemberInfo>,
    /// Class attributes
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Parse a complete class file.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a wrong magic number, unknown constant tags or
    /// trailing data, and [`crate::Error::OutOfBounds`] for truncated input.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);
        let magic = parser.read_be::<u32>()?;
        if magic != MAGIC {
            return Err(malformed_error!("Invalid class file magic 0x{:08X}", magic));
        }

        let minor_version = parser.read_be()?;
        let major_version = parser.read_be()?;
        let constant_pool = ConstantPool::parse(&mut parser)?;
        let access_flags = AccessFlags::from_bits_retain(parser.read_be()?);
        let this_class = parser.read_be()?;
        let super_class = parser.read_be()?;

        let interface_count = parser.read_be::<u16>()?;
        let mut interfaces = Vec::with_capacity(usize::from(interface_count));
        for _ in 0..interface_count {
            interfaces.push(parser.read_be()?);
        }

        let field_count = parser.read_be::<u16>()?;
        let mut fields = Vec::with_capacity(usize::from(field_count));
        for _ in 0..field_count {
            fields.push(MemberInfo::parse(&mut parser)?);
        }

        let method_count = parser.read_be::<u16>()?;
        let mut methods = Vec::with_capacity(usize::from(method_count));
        for _ in 0..method_count {
            methods.push(MemberInfo::parse(&mut parser)?);
        }

        let attributes = parse_attributes(&mut parser)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after class file",
                parser.remaining()
            ));
        }

        Ok(ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Serialize the class file.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a table grew beyond what the format can express.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        push_be(&mut out, MAGIC);
        push_be(&mut out, self.minor_version);
        push_be(&mut out, self.major_version);
        self.constant_pool.write(&mut out)?;
        push_be(&mut out, self.access_flags.bits());
        push_be(&mut out, self.this_class);
        push_be(&mut out, self.super_class);

        push_be(&mut out, count_u16(self.interfaces.len())?);
        for interface in &self.interfaces {
            push_be(&mut out, *interface);
        }

        push_be(&mut out, count_u16(self.fields.len())?);
        for field in &self.fields {
            field.write(&mut out)?;
        }

        push_be(&mut out, count_u16(self.methods.len())?);
        for method in &self.methods {
            method.write(&mut out)?;
        }

        write_attributes(&self.attributes, &mut out)?;
        Ok(out)
    }

    /// Internal name of this class.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidConstant`] if `this_class` is not a `Class` constant.
    pub fn class_name(&self) -> Result<String> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Name of a field or method.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidConstant`] if the name index is not a `Utf8` constant.
    pub fn member_name(&self, member: &MemberInfo) -> Result<String> {
        self.constant_pool.utf8(member.name_index)
    }

    /// Descriptor of a field or method.
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidConstant`] if the index is not a `Utf8` constant.
    pub fn member_descriptor(&self, member: &MemberInfo) -> Result<String> {
        self.constant_pool.utf8(member.descriptor_index)
    }

    /// Position of the first method called `name` in [`Self::methods`].
    #[must_use]
    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|method| self.member_name(method).is_ok_and(|n| n == name))
    }

    /// The first method called `name`.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MemberInfo> {
        self.method_index(name).map(|index| &self.methods[index])
    }

    /// The first method called `name`, mutably.
    pub fn method_mut(&mut self, name: &str) -> Option<&mut MemberInfo> {
        let index = self.method_index(name)?;
        self.methods.get_mut(index)
    }

    /// Position of the `Code` attribute within `member.attributes`.
    #[must_use]
    pub fn code_attribute_index(&self, member: &MemberInfo) -> Option<usize> {
        member
            .attributes
            .iter()
            .position(|attribute| self.constant_pool.utf8(attribute.name_index).is_ok_and(|n| n == "Code"))
    }

    /// Decode the `Code` attribute of `member`.
    ///
    /// # Errors
    /// Returns [`PatchError::MissingCode`] if the member has none, or a codec error if the
    /// attribute is corrupted.
    pub fn code(&self, member: &MemberInfo) -> Result<CodeAttribute> {
        let Some(index) = self.code_attribute_index(member) else {
            let name = self.member_name(member).unwrap_or_default();
            return Err(PatchError::MissingCode(name).into());
        };
        CodeAttribute::parse(&member.attributes[index].info, &self.constant_pool)
    }
}

fn count_u16(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| malformed_error!("Table with {} entries is too large", len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::classes::ClassBuilder, Error};

    #[test]
    fn test_parse_write_identity() {
        let bytes = ClassBuilder::new("demo/Main")
            .method("helper", "()V", vec![0xB1], 0, 1)
            .method("main", "([Ljava/lang/String;)V", vec![0x2A, 0x4C, 0xB1], 1, 2)
            .build();

        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.class_name().unwrap(), "demo/Main");
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.method_index("main"), Some(1));
        assert!(class.method("absent").is_none());
        assert_eq!(class.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_code_lookup() {
        let bytes = ClassBuilder::new("demo/Main")
            .method("main", "([Ljava/lang/String;)V", vec![0x00, 0xB1], 1, 1)
            .build();
        let class = ClassFile::parse(&bytes).unwrap();
        let main = class.method("main").unwrap();
        let code = class.code(main).unwrap();
        assert_eq!(code.code, [0x00, 0xB1]);
        assert!(main.access_flags.contains(AccessFlags::PUBLIC | AccessFlags::STATIC));
    }

    #[test]
    fn test_missing_code() {
        let mut class = ClassFile::parse(
            &ClassBuilder::new("demo/Main")
                .method("main", "()V", vec![0xB1], 0, 0)
                .build(),
        )
        .unwrap();
        class.method_mut("main").unwrap().attributes.clear();

        let main = class.method("main").unwrap();
        assert!(matches!(
            class.code(main),
            Err(Error::Patch(PatchError::MissingCode(name))) if name == "main"
        ));
    }

    #[test]
    fn test_bad_magic() {
        let result = ClassFile::parse(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52]);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_truncated() {
        let bytes = ClassBuilder::new("demo/Main").build();
        let result = ClassFile::parse(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_trailing_data() {
        let mut bytes = ClassBuilder::new("demo/Main").build();
        bytes.push(0);
        assert!(matches!(
            ClassFile::parse(&bytes),
            Err(Error::Malformed { .. })
        ));
    }
}

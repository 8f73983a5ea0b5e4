//! The `Code` attribute and its offset-bearing sub-attributes.
//!
//! Besides `max_stack`, `max_locals` and the raw instruction bytes, a `Code` attribute
//! carries several tables that refer to bytecode offsets: the exception table,
//! `LineNumberTable`, `LocalVariableTable`, `LocalVariableTypeTable` and `StackMapTable`.
//! These are decoded into absolute offsets so they can be moved when the instruction
//! stream grows (see [`CodeAttribute::relocate`]). Any other sub-attribute is carried
//! through unchanged.

use crate::{
    classfile::{constpool::ConstantPool, Attribute},
    file::{io::push_be, parser::Parser},
    Result,
};

/// Translation of bytecode offsets from an old instruction stream to a rewritten one.
pub trait OffsetMap {
    /// New offset of the instruction that started at `old`.
    ///
    /// # Errors
    /// Fails if `old` is not an instruction boundary of the old stream.
    fn start(&self, old: u32) -> Result<u32>;

    /// New value of an exclusive range end that was `old`.
    ///
    /// Differs from [`OffsetMap::start`] where code was inserted right before the
    /// instruction at `old`: the range end stays in front of the inserted code.
    ///
    /// # Errors
    /// Fails if `old` is not an instruction boundary of the old stream.
    fn end(&self, old: u32) -> Result<u32>;
}

/// One row of the exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// First covered offset (inclusive)
    pub start_pc: u32,
    /// End of the covered range (exclusive)
    pub end_pc: u32,
    /// Offset of the handler
    pub handler_pc: u32,
    /// `Class` constant of the caught type, 0 for `finally`
    pub catch_type: u16,
}

/// One row of a `LineNumberTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    /// First instruction of the line
    pub start_pc: u32,
    /// Source line
    pub line: u16,
}

/// One row of a `LocalVariableTable` or `LocalVariableTypeTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    /// First offset where the variable is live
    pub start_pc: u32,
    /// Length of the live range in bytes
    pub length: u32,
    /// `Utf8` constant holding the variable name
    pub name_index: u16,
    /// `Utf8` constant holding the descriptor (or signature for the type table)
    pub descriptor_index: u16,
    /// Local slot
    pub index: u16,
}

/// Verification type of a stack map frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// `Class` constant of the object type
    Object(u16),
    /// Offset of the `new` instruction that created the value
    Uninitialized(u32),
}

impl VerificationType {
    fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let tag = parser.read_be::<u8>()?;
        Ok(match tag {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(parser.read_be()?),
            8 => VerificationType::Uninitialized(u32::from(parser.read_be::<u16>()?)),
            other => return Err(malformed_error!("Invalid verification type tag {}", other)),
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            VerificationType::Top => out.push(0),
            VerificationType::Integer => out.push(1),
            VerificationType::Float => out.push(2),
            VerificationType::Double => out.push(3),
            VerificationType::Long => out.push(4),
            VerificationType::Null => out.push(5),
            VerificationType::UninitializedThis => out.push(6),
            VerificationType::Object(index) => {
                out.push(7);
                push_be(out, *index);
            }
            VerificationType::Uninitialized(offset) => {
                out.push(8);
                push_be(out, to_u16(*offset)?);
            }
        }
        Ok(())
    }

    fn relocate(&mut self, map: &impl OffsetMap) -> Result<()> {
        if let VerificationType::Uninitialized(offset) = self {
            *offset = map.start(*offset)?;
        }
        Ok(())
    }
}

/// Shape of a stack map frame, independent of its compressed on-disk form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Same locals as the previous frame, empty stack
    Same,
    /// Same locals as the previous frame, one stack item
    SameLocals1(VerificationType),
    /// Previous locals minus the last `n`, empty stack
    Chop(u8),
    /// Previous locals plus these, empty stack
    Append(Vec<VerificationType>),
    /// Explicit locals and stack
    Full {
        /// Local slots
        locals: Vec<VerificationType>,
        /// Operand stack
        stack: Vec<VerificationType>,
    },
}

/// A stack map frame at an absolute bytecode offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    /// Absolute offset the frame applies to
    pub offset: u32,
    /// Frame contents
    pub kind: FrameKind,
}

/// A decoded sub-attribute of `Code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeAttr {
    /// `LineNumberTable`
    LineNumbers {
        /// `Utf8` constant naming the attribute
        name_index: u16,
        /// Table rows
        entries: Vec<LineNumber>,
    },
    /// `LocalVariableTable` or `LocalVariableTypeTable`
    LocalVariables {
        /// `Utf8` constant naming the attribute
        name_index: u16,
        /// Table rows
        entries: Vec<LocalVariable>,
    },
    /// `StackMapTable`
    StackMapTable {
        /// `Utf8` constant naming the attribute
        name_index: u16,
        /// Frames in ascending offset order
        frames: Vec<StackMapFrame>,
    },
    /// Anything else, carried verbatim
    Raw(Attribute),
}

/// A method's decoded `Code` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local slots
    pub max_locals: u16,
    /// Raw instruction stream
    pub code: Vec<u8>,
    /// Exception handlers, in priority order
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attributes
    pub attributes: Vec<CodeAttr>,
}

impl CodeAttribute {
    /// Decode the `info` bytes of a `Code` attribute.
    ///
    /// `pool` is needed to recognise the sub-attributes by name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] for corrupted
    /// data.
    pub fn parse(info: &[u8], pool: &ConstantPool) -> Result<Self> {
        let mut parser = Parser::new(info);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;
        let code_length = parser.read_be::<u32>()?;
        if code_length == 0 || code_length > 0xFFFF {
            return Err(malformed_error!("Invalid code_length {}", code_length));
        }
        let code = parser.read_bytes(code_length as usize)?.to_vec();

        let exception_count = parser.read_be::<u16>()?;
        let mut exception_table = Vec::with_capacity(usize::from(exception_count));
        for _ in 0..exception_count {
            exception_table.push(ExceptionEntry {
                start_pc: u32::from(parser.read_be::<u16>()?),
                end_pc: u32::from(parser.read_be::<u16>()?),
                handler_pc: u32::from(parser.read_be::<u16>()?),
                catch_type: parser.read_be()?,
            });
        }

        let attribute_count = parser.read_be::<u16>()?;
        let mut attributes = Vec::with_capacity(usize::from(attribute_count));
        for _ in 0..attribute_count {
            let raw = Attribute::parse(&mut parser)?;
            attributes.push(CodeAttr::decode(raw, pool)?);
        }

        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after Code attribute",
                parser.remaining()
            ));
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// Encode back into the `info` bytes of a `Code` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an offset or length no longer fits its field.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.code.len() + 64);
        push_be(&mut out, self.max_stack);
        push_be(&mut out, self.max_locals);
        push_be(&mut out, to_u32(self.code.len())?);
        out.extend_from_slice(&self.code);

        push_be(&mut out, to_u16(self.exception_table.len() as u32)?);
        for entry in &self.exception_table {
            push_be(&mut out, to_u16(entry.start_pc)?);
            push_be(&mut out, to_u16(entry.end_pc)?);
            push_be(&mut out, to_u16(entry.handler_pc)?);
            push_be(&mut out, entry.catch_type);
        }

        push_be(&mut out, to_u16(self.attributes.len() as u32)?);
        for attribute in &self.attributes {
            attribute.encode()?.write(&mut out)?;
        }

        Ok(out)
    }

    /// Move every offset held by the exception table and the sub-attributes through `map`.
    ///
    /// The instruction bytes themselves are not touched; the caller replaces [`Self::code`]
    /// with the stream `map` was produced from.
    ///
    /// # Errors
    /// Fails if any recorded offset is not an instruction boundary of the old stream.
    pub fn relocate(&mut self, map: &impl OffsetMap) -> Result<()> {
        for entry in &mut self.exception_table {
            entry.start_pc = map.start(entry.start_pc)?;
            entry.end_pc = map.end(entry.end_pc)?;
            entry.handler_pc = map.start(entry.handler_pc)?;
        }

        for attribute in &mut self.attributes {
            match attribute {
                CodeAttr::LineNumbers { entries, .. } => {
                    for entry in entries {
                        entry.start_pc = map.start(entry.start_pc)?;
                    }
                }
                CodeAttr::LocalVariables { entries, .. } => {
                    for entry in entries {
                        let start = map.start(entry.start_pc)?;
                        let end = map.end(entry.start_pc + entry.length)?;
                        entry.start_pc = start;
                        entry.length = end.saturating_sub(start);
                    }
                }
                CodeAttr::StackMapTable { frames, .. } => {
                    for frame in frames {
                        frame.offset = map.start(frame.offset)?;
                        match &mut frame.kind {
                            FrameKind::Same | FrameKind::Chop(_) => {}
                            FrameKind::SameLocals1(item) => item.relocate(map)?,
                            FrameKind::Append(items) => {
                                for item in items {
                                    item.relocate(map)?;
                                }
                            }
                            FrameKind::Full { locals, stack } => {
                                for item in locals.iter_mut().chain(stack.iter_mut()) {
                                    item.relocate(map)?;
                                }
                            }
                        }
                    }
                }
                CodeAttr::Raw(_) => {}
            }
        }

        Ok(())
    }

    /// The `LineNumberTable` rows, across all such attributes.
    pub fn line_numbers(&self) -> impl Iterator<Item = &LineNumber> {
        self.attributes.iter().flat_map(|attribute| match attribute {
            CodeAttr::LineNumbers { entries, .. } => entries.as_slice(),
            _ => &[],
        })
    }

    /// The stack map frames, if the method has a `StackMapTable`.
    #[must_use]
    pub fn stack_map(&self) -> Option<&[StackMapFrame]> {
        self.attributes.iter().find_map(|attribute| match attribute {
            CodeAttr::StackMapTable { frames, .. } => Some(frames.as_slice()),
            _ => None,
        })
    }
}

impl CodeAttr {
    fn decode(raw: Attribute, pool: &ConstantPool) -> Result<Self> {
        let Ok(name) = pool.utf8(raw.name_index) else {
            return Ok(CodeAttr::Raw(raw));
        };

        let mut parser = Parser::new(&raw.info);
        let decoded = match name.as_str() {
            "LineNumberTable" => {
                let count = parser.read_be::<u16>()?;
                let mut entries = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    entries.push(LineNumber {
                        start_pc: u32::from(parser.read_be::<u16>()?),
                        line: parser.read_be()?,
                    });
                }
                CodeAttr::LineNumbers {
                    name_index: raw.name_index,
                    entries,
                }
            }
            "LocalVariableTable" | "LocalVariableTypeTable" => {
                let count = parser.read_be::<u16>()?;
                let mut entries = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    entries.push(LocalVariable {
                        start_pc: u32::from(parser.read_be::<u16>()?),
                        length: u32::from(parser.read_be::<u16>()?),
                        name_index: parser.read_be()?,
                        descriptor_index: parser.read_be()?,
                        index: parser.read_be()?,
                    });
                }
                CodeAttr::LocalVariables {
                    name_index: raw.name_index,
                    entries,
                }
            }
            "StackMapTable" => CodeAttr::StackMapTable {
                name_index: raw.name_index,
                frames: parse_frames(&mut parser)?,
            },
            _ => return Ok(CodeAttr::Raw(raw)),
        };

        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes in {} attribute",
                parser.remaining(),
                name
            ));
        }
        Ok(decoded)
    }

    fn encode(&self) -> Result<Attribute> {
        let mut info = Vec::new();
        let name_index = match self {
            CodeAttr::LineNumbers {
                name_index,
                entries,
            } => {
                push_be(&mut info, to_u16(entries.len() as u32)?);
                for entry in entries {
                    push_be(&mut info, to_u16(entry.start_pc)?);
                    push_be(&mut info, entry.line);
                }
                *name_index
            }
            CodeAttr::LocalVariables {
                name_index,
                entries,
            } => {
                push_be(&mut info, to_u16(entries.len() as u32)?);
                for entry in entries {
                    push_be(&mut info, to_u16(entry.start_pc)?);
                    push_be(&mut info, to_u16(entry.length)?);
                    push_be(&mut info, entry.name_index);
                    push_be(&mut info, entry.descriptor_index);
                    push_be(&mut info, entry.index);
                }
                *name_index
            }
            CodeAttr::StackMapTable { name_index, frames } => {
                write_frames(frames, &mut info)?;
                *name_index
            }
            CodeAttr::Raw(raw) => return Ok(raw.clone()),
        };

        Ok(Attribute { name_index, info })
    }
}

fn parse_types(parser: &mut Parser<'_>, count: usize) -> Result<Vec<VerificationType>> {
    let mut types = Vec::with_capacity(count);
    for _ in 0..count {
        types.push(VerificationType::parse(parser)?);
    }
    Ok(types)
}

fn parse_frames(parser: &mut Parser<'_>) -> Result<Vec<StackMapFrame>> {
    let count = parser.read_be::<u16>()?;
    let mut frames = Vec::with_capacity(usize::from(count));
    let mut previous: Option<u32> = None;

    for _ in 0..count {
        let frame_type = parser.read_be::<u8>()?;
        let (delta, kind) = match frame_type {
            0..=63 => (u32::from(frame_type), FrameKind::Same),
            64..=127 => (
                u32::from(frame_type - 64),
                FrameKind::SameLocals1(VerificationType::parse(parser)?),
            ),
            247 => {
                let delta = u32::from(parser.read_be::<u16>()?);
                (delta, FrameKind::SameLocals1(VerificationType::parse(parser)?))
            }
            248..=250 => (
                u32::from(parser.read_be::<u16>()?),
                FrameKind::Chop(251 - frame_type),
            ),
            251 => (u32::from(parser.read_be::<u16>()?), FrameKind::Same),
            252..=254 => {
                let delta = u32::from(parser.read_be::<u16>()?);
                let locals = parse_types(parser, usize::from(frame_type - 251))?;
                (delta, FrameKind::Append(locals))
            }
            255 => {
                let delta = u32::from(parser.read_be::<u16>()?);
                let local_count = parser.read_be::<u16>()?;
                let locals = parse_types(parser, usize::from(local_count))?;
                let stack_count = parser.read_be::<u16>()?;
                let stack = parse_types(parser, usize::from(stack_count))?;
                (delta, FrameKind::Full { locals, stack })
            }
            reserved => {
                return Err(malformed_error!("Reserved stack map frame type {}", reserved))
            }
        };

        let offset = match previous {
            None => delta,
            Some(prev) => prev + delta + 1,
        };
        previous = Some(offset);
        frames.push(StackMapFrame { offset, kind });
    }

    Ok(frames)
}

fn write_frames(frames: &[StackMapFrame], out: &mut Vec<u8>) -> Result<()> {
    push_be(out, to_u16(frames.len() as u32)?);
    let mut previous: Option<u32> = None;

    for frame in frames {
        let delta = match previous {
            None => frame.offset,
            Some(prev) => frame
                .offset
                .checked_sub(prev + 1)
                .ok_or_else(|| malformed_error!("Stack map frames out of order at {}", frame.offset))?,
        };
        previous = Some(frame.offset);

        match &frame.kind {
            FrameKind::Same if delta <= 63 => out.push(delta as u8),
            FrameKind::Same => {
                out.push(251);
                push_be(out, to_u16(delta)?);
            }
            FrameKind::SameLocals1(item) if delta <= 63 => {
                out.push(64 + delta as u8);
                item.write(out)?;
            }
            FrameKind::SameLocals1(item) => {
                out.push(247);
                push_be(out, to_u16(delta)?);
                item.write(out)?;
            }
            FrameKind::Chop(count) => {
                if !(1..=3).contains(count) {
                    return Err(malformed_error!("Cannot chop {} locals", count));
                }
                out.push(251 - count);
                push_be(out, to_u16(delta)?);
            }
            FrameKind::Append(locals) => {
                if !(1..=3).contains(&locals.len()) {
                    return Err(malformed_error!("Cannot append {} locals", locals.len()));
                }
                out.push(251 + locals.len() as u8);
                push_be(out, to_u16(delta)?);
                for item in locals {
                    item.write(out)?;
                }
            }
            FrameKind::Full { locals, stack } => {
                out.push(255);
                push_be(out, to_u16(delta)?);
                push_be(out, to_u16(locals.len() as u32)?);
                for item in locals {
                    item.write(out)?;
                }
                push_be(out, to_u16(stack.len() as u32)?);
                for item in stack {
                    item.write(out)?;
                }
            }
        }
    }

    Ok(())
}

fn to_u16(value: u32) -> Result<u16> {
    u16::try_from(value).map_err(|_| malformed_error!("Value {} does not fit into u16", value))
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| malformed_error!("Value {} does not fit into u32", value))
}

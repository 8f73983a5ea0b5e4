//! JVM instruction representation, operand types and control-flow metadata.
//!
//! The central type is [`crate::assembly::instruction::Instruction`], which aggregates
//! everything known about one decoded instruction. Branch operands are stored as
//! absolute bytecode offsets rather than the relative displacements found on disk, so an
//! instruction keeps pointing at the same target when it is moved; the encoder turns
//! them back into displacements.
//!
//! # Key Components
//!
//! - [`crate::assembly::instruction::Instruction`] - Complete decoded instruction
//! - [`crate::assembly::instruction::Operand`] - Type-safe operand representation
//! - [`crate::assembly::instruction::OperandType`] - Operand layout of an opcode
//! - [`crate::assembly::instruction::FlowType`] - Control flow classification
//!
//! # Examples
//!
//! ```rust
//! use mcsc::assembly::{Instruction, Operand};
//!
//! let load = Instruction::load_reference(1);
//! assert_eq!(load.mnemonic, "aload_1");
//! assert_eq!(load.local_slot(), Some(1));
//!
//! let call = Instruction::invoke_static(12);
//! assert_eq!(call.operand, Operand::Constant(12));
//! assert_eq!(call.size, 3);
//! ```

use std::fmt;

use crate::assembly::{
    instructions::{lookup, JvmInstruction, INSTRUCTIONS},
    opcodes,
};

/// Operand layout following an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// Signed byte immediate (`bipush`)
    Byte,
    /// Signed short immediate (`sipush`)
    Short,
    /// One-byte constant pool index (`ldc`)
    ConstantByte,
    /// Two-byte constant pool index
    Constant,
    /// Local slot, one byte or two after `wide`
    Local,
    /// Local slot and signed increment (`iinc`)
    Iinc,
    /// 16-bit branch displacement
    Branch16,
    /// 32-bit branch displacement
    Branch32,
    /// Padded jump table
    TableSwitch,
    /// Padded match/offset pairs
    LookupSwitch,
    /// Constant pool index, argument count and a zero byte
    InvokeInterface,
    /// Constant pool index and two zero bytes
    InvokeDynamic,
    /// Primitive array type code (`newarray`)
    ArrayType,
    /// Constant pool index and dimension count
    MultiANewArray,
    /// The `wide` prefix
    Wide,
}

/// Control flow behavior of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location
    UnconditionalBranch,
    /// Jump to a subroutine (`jsr`, `jsr_w`)
    Subroutine,
    /// Call to another method
    Call,
    /// Returns from the method or subroutine
    Return,
    /// Multi-way branch
    Switch,
    /// Exception throwing
    Throw,
}

/// A decoded operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// `bipush` immediate
    Byte(i8),
    /// `sipush` immediate
    Short(i16),
    /// Constant pool index
    Constant(u16),
    /// Local variable slot
    Local(u16),
    /// `iinc` slot and increment
    Iinc {
        /// Local variable slot
        index: u16,
        /// Signed increment
        delta: i16,
    },
    /// Absolute branch target
    Target(u32),
    /// `tableswitch` with absolute targets
    TableSwitch {
        /// Absolute default target
        default: u32,
        /// Lowest matched key
        low: i32,
        /// Highest matched key
        high: i32,
        /// Absolute targets for `low..=high`
        targets: Vec<u32>,
    },
    /// `lookupswitch` with absolute targets
    LookupSwitch {
        /// Absolute default target
        default: u32,
        /// `(key, absolute target)` pairs, sorted by key
        pairs: Vec<(i32, u32)>,
    },
    /// `invokeinterface` operands
    InvokeInterface {
        /// `InterfaceMethodref` constant
        index: u16,
        /// Argument slot count including the receiver
        count: u8,
    },
    /// `invokedynamic` call site constant
    InvokeDynamic(u16),
    /// `newarray` element type code
    ArrayType(u8),
    /// `multianewarray` operands
    MultiANewArray {
        /// `Class` constant of the array type
        index: u16,
        /// Dimensions to create
        dimensions: u8,
    },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Byte(value) => write!(f, "{value}"),
            Operand::Short(value) => write!(f, "{value}"),
            Operand::Constant(index) | Operand::InvokeDynamic(index) => write!(f, "#{index}"),
            Operand::Local(index) => write!(f, "{index}"),
            Operand::Iinc { index, delta } => write!(f, "{index}, {delta}"),
            Operand::Target(target) => write!(f, "{target}"),
            Operand::TableSwitch {
                default,
                low,
                targets,
                ..
            } => {
                write!(f, "{{")?;
                for (key, target) in (*low..).zip(targets) {
                    write!(f, " {key}: {target};")?;
                }
                write!(f, " default: {default} }}")
            }
            Operand::LookupSwitch { default, pairs } => {
                write!(f, "{{")?;
                for (key, target) in pairs {
                    write!(f, " {key}: {target};")?;
                }
                write!(f, " default: {default} }}")
            }
            Operand::InvokeInterface { index, count } => write!(f, "#{index}, {count}"),
            Operand::ArrayType(code) => write!(f, "{}", array_type_name(*code)),
            Operand::MultiANewArray { index, dimensions } => write!(f, "#{index}, {dimensions}"),
        }
    }
}

fn array_type_name(code: u8) -> &'static str {
    match code {
        4 => "boolean",
        5 => "char",
        6 => "float",
        7 => "double",
        8 => "byte",
        9 => "short",
        10 => "int",
        11 => "long",
        _ => "?",
    }
}

/// A decoded JVM instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the first byte (the `wide` prefix if present) within the method's code
    pub offset: u32,
    /// Encoded size in bytes, including prefix and padding
    pub size: u32,
    /// Opcode byte (never `wide`; see [`Self::wide`])
    pub opcode: u8,
    /// `true` if the instruction was prefixed with `wide`
    pub wide: bool,
    /// Mnemonic, e.g. `"aload_1"`
    pub mnemonic: &'static str,
    /// How this instruction affects control flow
    pub flow_type: FlowType,
    /// The operand data for this instruction
    pub operand: Operand,
}

impl Instruction {
    /// Build an instruction that is not yet placed in a stream (offset 0).
    ///
    /// Returns `None` for opcodes outside the table.
    #[must_use]
    pub fn synthesize(opcode: u8, operand: Operand) -> Option<Self> {
        lookup(opcode).map(|info| Self::from_table(info, opcode, operand))
    }

    /// Load a reference from local `slot` using the shortest encoding.
    #[must_use]
    pub fn load_reference(slot: u16) -> Self {
        let (opcode, operand) = match slot {
            0..=3 => (opcodes::ALOAD_0 + slot as u8, Operand::None),
            _ => (opcodes::ALOAD, Operand::Local(slot)),
        };
        Self::known(opcode, operand)
    }

    /// `invokestatic` of the `Methodref` constant at `index`.
    #[must_use]
    pub fn invoke_static(index: u16) -> Self {
        Self::known(opcodes::INVOKESTATIC, Operand::Constant(index))
    }

    fn known(opcode: u8, operand: Operand) -> Self {
        Self::from_table(&INSTRUCTIONS[usize::from(opcode)], opcode, operand)
    }

    fn from_table(info: &JvmInstruction, opcode: u8, operand: Operand) -> Self {
        let mut instruction = Instruction {
            offset: 0,
            size: 0,
            opcode,
            wide: false,
            mnemonic: info.instr,
            flow_type: info.flow,
            operand,
        };
        instruction.wide = instruction.requires_wide();
        instruction.size = instruction.fixed_size().unwrap_or(1);
        instruction
    }

    /// Operand layout of this instruction's opcode.
    #[must_use]
    pub fn operand_type(&self) -> OperandType {
        lookup(self.opcode).map_or(OperandType::None, |info| info.op_type)
    }

    /// `true` if the operand cannot be encoded without the `wide` prefix.
    #[must_use]
    pub fn requires_wide(&self) -> bool {
        match self.operand {
            Operand::Local(index) => index > 0xFF,
            Operand::Iinc { index, delta } => index > 0xFF || i8::try_from(delta).is_err(),
            _ => false,
        }
    }

    /// Encoded size for every layout except the padded switches, whose size depends on
    /// where the instruction is placed.
    #[must_use]
    pub fn fixed_size(&self) -> Option<u32> {
        let wide = self.wide || self.requires_wide();
        Some(match self.operand_type() {
            OperandType::None | OperandType::Wide => 1,
            OperandType::Byte | OperandType::ConstantByte | OperandType::ArrayType => 2,
            OperandType::Short | OperandType::Constant | OperandType::Branch16 => 3,
            OperandType::Local if wide => 4,
            OperandType::Local => 2,
            OperandType::Iinc if wide => 6,
            OperandType::Iinc => 3,
            OperandType::MultiANewArray => 4,
            OperandType::Branch32 | OperandType::InvokeInterface | OperandType::InvokeDynamic => {
                5
            }
            OperandType::TableSwitch | OperandType::LookupSwitch => return None,
        })
    }

    /// Check if this instruction can transfer control to an explicit target.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.flow_type,
            FlowType::ConditionalBranch
                | FlowType::UnconditionalBranch
                | FlowType::Subroutine
                | FlowType::Switch
        )
    }

    /// Check if this is one of the four method invocation instructions.
    #[must_use]
    pub fn is_invoke(&self) -> bool {
        (opcodes::INVOKEVIRTUAL..=opcodes::INVOKEDYNAMIC).contains(&self.opcode)
    }

    /// Absolute targets of this instruction, in operand order (`default` first for switches).
    #[must_use]
    pub fn targets(&self) -> Vec<u32> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            Operand::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, target)| *target))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Constant pool index referenced by this instruction, if any.
    #[must_use]
    pub fn constant_index(&self) -> Option<u16> {
        match self.operand {
            Operand::Constant(index)
            | Operand::InvokeDynamic(index)
            | Operand::InvokeInterface { index, .. }
            | Operand::MultiANewArray { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Local slot read or written by a load, store, `ret` or `iinc`.
    #[must_use]
    pub fn local_slot(&self) -> Option<u16> {
        match self.operand {
            Operand::Local(index) | Operand::Iinc { index, .. } => return Some(index),
            _ => {}
        }

        let implicit = |first: u8| {
            (first..first + 4)
                .contains(&self.opcode)
                .then(|| u16::from(self.opcode - first))
        };
        [
            opcodes::ILOAD_0,
            opcodes::LLOAD_0,
            opcodes::FLOAD_0,
            opcodes::DLOAD_0,
            opcodes::ALOAD_0,
            opcodes::ISTORE_0,
            opcodes::LSTORE_0,
            opcodes::FSTORE_0,
            opcodes::DSTORE_0,
            opcodes::ASTORE_0,
        ]
        .into_iter()
        .find_map(implicit)
    }

    /// If this instruction stores a reference into a local (`astore`, `astore_<n>` or
    /// `wide astore`), the slot it writes.
    #[must_use]
    pub fn reference_store_slot(&self) -> Option<u16> {
        match self.opcode {
            opcodes::ASTORE | opcodes::ASTORE_0..=opcodes::ASTORE_3 => self.local_slot(),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}: ", self.offset)?;
        if self.wide {
            write!(f, "wide ")?;
        }
        write!(f, "{}", self.mnemonic)?;
        if self.operand != Operand::None {
            write!(f, " {}", self.operand)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reference_shortest_form() {
        assert_eq!(Instruction::load_reference(0).mnemonic, "aload_0");
        assert_eq!(Instruction::load_reference(3).size, 1);

        let byte_form = Instruction::load_reference(200);
        assert_eq!(byte_form.mnemonic, "aload");
        assert!(!byte_form.wide);
        assert_eq!(byte_form.size, 2);

        let wide_form = Instruction::load_reference(300);
        assert!(wide_form.wide);
        assert_eq!(wide_form.size, 4);
        assert_eq!(wide_form.local_slot(), Some(300));
    }

    #[test]
    fn test_reference_store_slot() {
        let implicit = Instruction::synthesize(opcodes::ASTORE_2, Operand::None).unwrap();
        assert_eq!(implicit.reference_store_slot(), Some(2));

        let explicit = Instruction::synthesize(opcodes::ASTORE, Operand::Local(9)).unwrap();
        assert_eq!(explicit.reference_store_slot(), Some(9));

        let int_store = Instruction::synthesize(opcodes::ISTORE_1, Operand::None).unwrap();
        assert_eq!(int_store.local_slot(), Some(1));
        assert_eq!(int_store.reference_store_slot(), None);
    }

    #[test]
    fn test_targets_order() {
        let switch = Instruction::synthesize(
            opcodes::LOOKUPSWITCH,
            Operand::LookupSwitch {
                default: 40,
                pairs: vec![(1, 20), (5, 30)],
            },
        )
        .unwrap();
        assert_eq!(switch.targets(), [40, 20, 30]);
        assert!(switch.is_branch());
        assert_eq!(switch.fixed_size(), None);
    }

    #[test]
    fn test_iinc_wide_delta() {
        let iinc = Instruction::synthesize(
            opcodes::IINC,
            Operand::Iinc {
                index: 1,
                delta: 1000,
            },
        )
        .unwrap();
        assert!(iinc.wide);
        assert_eq!(iinc.size, 6);
    }

    #[test]
    fn test_display() {
        let mut call = Instruction::invoke_static(7);
        call.offset = 12;
        assert_eq!(call.to_string(), "   12: invokestatic #7");

        let wide = Instruction::load_reference(256);
        assert_eq!(wide.to_string(), "    0: wide aload 256");
    }
}

//! JVM instruction decoding.
//!
//! - [`crate::assembly::decoder::decode_instruction`] - decode one instruction at the cursor
//! - [`crate::assembly::decoder::decode_stream`] - decode a method's complete code array
//!
//! Relative branch displacements are converted to absolute offsets while decoding, and
//! the `wide` prefix is folded into the instruction it modifies.
//!
//! # Examples
//!
//! ```rust
//! use mcsc::assembly::decode_stream;
//!
//! // aload_0, ifnull +4, nop, return
//! let code = [0x2A, 0xC6, 0x00, 0x04, 0x00, 0xB1];
//! let instructions = decode_stream(&code)?;
//! assert_eq!(instructions.len(), 4);
//! assert_eq!(instructions[1].targets(), [5]);
//! # Ok::<(), mcsc::Error>(())
//! ```

use crate::{
    assembly::{
        instruction::{Instruction, Operand, OperandType},
        instructions::lookup,
        opcodes,
    },
    file::parser::Parser,
    Result,
};

/// Decode the instruction at the parser's position.
///
/// The parser must span the method's entire code array: switch padding is aligned
/// relative to its start.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown opcodes, an invalid `wide` prefix,
/// inverted `tableswitch` bounds or branch targets before the start of the code, and
/// [`crate::Error::OutOfBounds`] for truncated operands.
pub fn decode_instruction(parser: &mut Parser<'_>) -> Result<Instruction> {
    let start = parser.pos();
    let offset = to_offset(start)?;
    let mut opcode = parser.read_be::<u8>()?;

    let wide = opcode == opcodes::WIDE;
    if wide {
        opcode = parser.read_be::<u8>()?;
        let allowed = matches!(
            opcode,
            opcodes::ILOAD..=opcodes::ALOAD
                | opcodes::ISTORE..=opcodes::ASTORE
                | opcodes::RET
                | opcodes::IINC
        );
        if !allowed {
            return Err(malformed_error!(
                "Invalid opcode 0x{:02X} after wide at offset {}",
                opcode,
                start
            ));
        }
    }

    let Some(info) = lookup(opcode) else {
        return Err(malformed_error!(
            "Invalid opcode 0x{:02X} at offset {}",
            opcode,
            start
        ));
    };

    let operand = match info.op_type {
        OperandType::None => Operand::None,
        OperandType::Byte => Operand::Byte(parser.read_be()?),
        OperandType::Short => Operand::Short(parser.read_be()?),
        OperandType::ConstantByte => Operand::Constant(u16::from(parser.read_be::<u8>()?)),
        OperandType::Constant => Operand::Constant(parser.read_be()?),
        OperandType::Local if wide => Operand::Local(parser.read_be()?),
        OperandType::Local => Operand::Local(u16::from(parser.read_be::<u8>()?)),
        OperandType::Iinc if wide => Operand::Iinc {
            index: parser.read_be()?,
            delta: parser.read_be()?,
        },
        OperandType::Iinc => Operand::Iinc {
            index: u16::from(parser.read_be::<u8>()?),
            delta: i16::from(parser.read_be::<i8>()?),
        },
        OperandType::Branch16 => {
            Operand::Target(resolve(offset, i32::from(parser.read_be::<i16>()?))?)
        }
        OperandType::Branch32 => Operand::Target(resolve(offset, parser.read_be::<i32>()?)?),
        OperandType::TableSwitch => {
            parser.align(4)?;
            let default = resolve(offset, parser.read_be()?)?;
            let low = parser.read_be::<i32>()?;
            let high = parser.read_be::<i32>()?;
            if high < low {
                return Err(malformed_error!(
                    "tableswitch at {} has high {} below low {}",
                    start,
                    high,
                    low
                ));
            }

            let count = i64::from(high) - i64::from(low) + 1;
            if count * 4 > parser.remaining() as i64 {
                return Err(out_of_bounds_error!());
            }
            let mut targets = Vec::with_capacity(count as usize);
            for _ in 0..count {
                targets.push(resolve(offset, parser.read_be()?)?);
            }
            Operand::TableSwitch {
                default,
                low,
                high,
                targets,
            }
        }
        OperandType::LookupSwitch => {
            parser.align(4)?;
            let default = resolve(offset, parser.read_be()?)?;
            let npairs = parser.read_be::<i32>()?;
            if npairs < 0 || i64::from(npairs) * 8 > parser.remaining() as i64 {
                return Err(malformed_error!(
                    "lookupswitch at {} has invalid pair count {}",
                    start,
                    npairs
                ));
            }
            let mut pairs = Vec::with_capacity(npairs as usize);
            for _ in 0..npairs {
                let key = parser.read_be::<i32>()?;
                pairs.push((key, resolve(offset, parser.read_be()?)?));
            }
            Operand::LookupSwitch { default, pairs }
        }
        OperandType::InvokeInterface => {
            let index = parser.read_be()?;
            let count = parser.read_be()?;
            parser.advance_by(1)?;
            Operand::InvokeInterface { index, count }
        }
        OperandType::InvokeDynamic => {
            let index = parser.read_be()?;
            parser.advance_by(2)?;
            Operand::InvokeDynamic(index)
        }
        OperandType::ArrayType => Operand::ArrayType(parser.read_be()?),
        OperandType::MultiANewArray => Operand::MultiANewArray {
            index: parser.read_be()?,
            dimensions: parser.read_be()?,
        },
        OperandType::Wide => {
            return Err(malformed_error!("Nested wide prefix at offset {}", start));
        }
    };

    Ok(Instruction {
        offset,
        size: to_offset(parser.pos() - start)?,
        opcode,
        wide,
        mnemonic: info.instr,
        flow_type: info.flow,
        operand,
    })
}

/// Decode a method's complete code array into an instruction sequence.
///
/// # Errors
/// Fails if any instruction is invalid or truncated.
pub fn decode_stream(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut parser = Parser::new(code);
    let mut instructions = Vec::new();
    while parser.has_more_data() {
        instructions.push(decode_instruction(&mut parser)?);
    }
    Ok(instructions)
}

fn resolve(offset: u32, displacement: i32) -> Result<u32> {
    let target = i64::from(offset) + i64::from(displacement);
    u32::try_from(target).map_err(|_| {
        malformed_error!(
            "Branch at offset {} jumps to invalid offset {}",
            offset,
            target
        )
    })
}

fn to_offset(position: usize) -> Result<u32> {
    u32::try_from(position).map_err(|_| malformed_error!("Offset {} out of range", position))
}

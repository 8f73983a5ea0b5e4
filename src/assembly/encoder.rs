//! JVM instruction stream encoding with branch target resolution.
//!
//! [`StreamEncoder`] is the reverse of [`crate::assembly::decode_stream`]: it takes a
//! decoded instruction sequence, optionally with new instructions spliced in, and lays it
//! out again. Branch operands of the decoded instructions hold absolute offsets into the
//! *original* stream; the encoder treats each such offset as a label naming the
//! instruction that started there, so every branch, switch and (through
//! [`EncodedStream`]'s [`OffsetMap`] implementation) every exception range or debug table
//! entry keeps pointing at the same instruction after the layout changed.
//!
//! # Layout
//!
//! Instruction sizes are resolved iteratively:
//!
//! - `tableswitch`/`lookupswitch` padding is recomputed from each instruction's new offset
//! - `goto`/`jsr` whose displacement no longer fits 16 bits are widened to
//!   `goto_w`/`jsr_w`, which may move later instructions and trigger another pass
//! - conditional branches have no wide form; if one no longer fits, encoding fails with
//!   [`crate::PatchError::BranchOutOfRange`]
//!
//! # Examples
//!
//! ```rust
//! use mcsc::assembly::{decode_stream, Instruction, StreamEncoder};
//!
//! // aload_0, astore_1, return
//! let original = decode_stream(&[0x2A, 0x4C, 0xB1])?;
//! let mut encoder = StreamEncoder::new(&original, 3);
//! encoder.insert(2, vec![Instruction::load_reference(1)])?;
//!
//! let encoded = encoder.finalize()?;
//! assert_eq!(encoded.code, [0x2A, 0x4C, 0x2B, 0xB1]);
//! # Ok::<(), mcsc::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{
        instruction::{Instruction, Operand, OperandType},
        instructions::INSTRUCTIONS,
        opcodes,
    },
    classfile::code::OffsetMap,
    file::io::push_be,
    PatchError, Result,
};

/// Largest code array the class file format allows.
const MAX_CODE_LENGTH: u32 = 0xFFFF;

struct Item {
    /// Old `(start, end)` offsets for instructions of the original stream
    origin: Option<(u32, u32)>,
    instruction: Instruction,
}

/// Re-encodes an instruction sequence after insertions.
pub struct StreamEncoder {
    items: Vec<Item>,
    original_len: u32,
}

/// The result of [`StreamEncoder::finalize`].
///
/// Besides the new code bytes it records where every original instruction ended up, which
/// makes it an [`OffsetMap`] for relocating the tables of a `Code` attribute.
#[derive(Debug, Clone)]
pub struct EncodedStream {
    /// The re-encoded instruction stream
    pub code: Vec<u8>,
    starts: HashMap<u32, u32>,
    ends: HashMap<u32, u32>,
    original_len: u32,
}

impl StreamEncoder {
    /// Start from a decoded stream whose code array was `original_len` bytes long.
    #[must_use]
    pub fn new(instructions: &[Instruction], original_len: u32) -> Self {
        let items = instructions
            .iter()
            .map(|instruction| Item {
                origin: Some((instruction.offset, instruction.offset + instruction.size)),
                instruction: instruction.clone(),
            })
            .collect();

        StreamEncoder {
            items,
            original_len,
        }
    }

    /// Number of instructions currently in the stream.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if the stream holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert `instructions` so that the first of them ends up at position `index`.
    ///
    /// Branch targets of inserted instructions, if any, are interpreted as offsets in the
    /// original stream just like those of the decoded instructions.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is past the end of the stream.
    pub fn insert(&mut self, index: usize, instructions: Vec<Instruction>) -> Result<()> {
        if index > self.items.len() {
            return Err(out_of_bounds_error!());
        }

        let new_items = instructions.into_iter().map(|instruction| Item {
            origin: None,
            instruction,
        });
        self.items.splice(index..index, new_items);
        Ok(())
    }

    /// Lay out and encode the stream.
    ///
    /// # Errors
    /// Returns [`PatchError::BranchOutOfRange`] if a conditional branch cannot reach its
    /// target, or [`crate::Error::Malformed`] if a branch target is not an instruction
    /// boundary of the original stream or the code grows beyond 65535 bytes.
    pub fn finalize(self) -> Result<EncodedStream> {
        let labels: HashMap<u32, usize> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| item.origin.map(|(start, _)| (start, position)))
            .collect();

        let mut targets = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let mut resolved = Vec::new();
            for target in item.instruction.targets() {
                let Some(&position) = labels.get(&target) else {
                    return Err(malformed_error!(
                        "Branch target {} is not an instruction boundary",
                        target
                    ));
                };
                resolved.push(position);
            }
            targets.push(resolved);
        }

        let mut forms: Vec<u8> = self.items.iter().map(|item| item.instruction.opcode).collect();
        let offsets = loop {
            let offsets = self.layout(&forms)?;
            let mut widened = false;
            for (position, item) in self.items.iter().enumerate() {
                if INSTRUCTIONS[usize::from(forms[position])].op_type != OperandType::Branch16 {
                    continue;
                }
                let Some(&target) = targets[position].first() else {
                    continue;
                };
                let displacement = i64::from(offsets[target]) - i64::from(offsets[position]);
                if i16::try_from(displacement).is_ok() {
                    continue;
                }
                match item.instruction.opcode {
                    opcodes::GOTO => {
                        forms[position] = opcodes::GOTO_W;
                        widened = true;
                    }
                    opcodes::JSR => {
                        forms[position] = opcodes::JSR_W;
                        widened = true;
                    }
                    _ => {
                        return Err(PatchError::BranchOutOfRange {
                            offset: offsets[position],
                            target: offsets[target],
                        }
                        .into())
                    }
                }
            }
            if !widened {
                break offsets;
            }
        };

        let total = offsets.last().copied().unwrap_or(0);
        if total > MAX_CODE_LENGTH {
            return Err(malformed_error!("Code length {} exceeds {}", total, MAX_CODE_LENGTH));
        }

        let mut code = Vec::with_capacity(total as usize);
        let mut starts = HashMap::with_capacity(self.items.len());
        let mut ends = HashMap::with_capacity(self.items.len());
        for (position, item) in self.items.iter().enumerate() {
            let start = offsets[position];
            let target_offsets: Vec<u32> = targets[position].iter().map(|&t| offsets[t]).collect();
            emit(
                &item.instruction,
                forms[position],
                start,
                &target_offsets,
                &mut code,
            )?;
            if let Some((old_start, old_end)) = item.origin {
                starts.insert(old_start, start);
                ends.insert(old_end, offsets[position + 1]);
            }
        }

        Ok(EncodedStream {
            code,
            starts,
            ends,
            original_len: self.original_len,
        })
    }

    /// Offsets of every item for the given opcode choice, plus the total length as the
    /// final element.
    fn layout(&self, forms: &[u8]) -> Result<Vec<u32>> {
        let mut offsets = Vec::with_capacity(self.items.len() + 1);
        let mut offset = 0u32;
        for (position, item) in self.items.iter().enumerate() {
            offsets.push(offset);
            let size = encoded_size(&item.instruction, forms[position], offset)?;
            offset = offset
                .checked_add(size)
                .ok_or_else(|| malformed_error!("Code length overflow"))?;
        }
        offsets.push(offset);
        Ok(offsets)
    }
}

fn switch_padding(offset: u32) -> u32 {
    (4 - (offset + 1) % 4) % 4
}

fn encoded_size(instruction: &Instruction, opcode: u8, offset: u32) -> Result<u32> {
    let info = &INSTRUCTIONS[usize::from(opcode)];
    let wide = instruction.wide || instruction.requires_wide();
    Ok(match (&info.op_type, &instruction.operand) {
        (OperandType::Branch32, _) => 5,
        (OperandType::TableSwitch, Operand::TableSwitch { targets, .. }) => {
            1 + switch_padding(offset) + 12 + 4 * count_u32(targets.len())?
        }
        (OperandType::LookupSwitch, Operand::LookupSwitch { pairs, .. }) => {
            1 + switch_padding(offset) + 8 + 8 * count_u32(pairs.len())?
        }
        (OperandType::Local, _) if wide => 4,
        (OperandType::Iinc, _) if wide => 6,
        _ => instruction
            .fixed_size()
            .ok_or_else(|| malformed_error!("Operand does not match {}", info.instr))?,
    })
}

fn count_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| malformed_error!("Switch with {} entries", len))
}

fn emit(
    instruction: &Instruction,
    opcode: u8,
    offset: u32,
    targets: &[u32],
    out: &mut Vec<u8>,
) -> Result<()> {
    let info = &INSTRUCTIONS[usize::from(opcode)];
    let wide = instruction.wide || instruction.requires_wide();
    let relative = |target: u32| -> i32 { (i64::from(target) - i64::from(offset)) as i32 };
    let mismatch = || {
        malformed_error!(
            "Operand {:?} does not match {}",
            instruction.operand,
            info.instr
        )
    };

    if wide && matches!(info.op_type, OperandType::Local | OperandType::Iinc) {
        out.push(opcodes::WIDE);
    }
    out.push(opcode);

    match (info.op_type, &instruction.operand) {
        (OperandType::None, Operand::None) => {}
        (OperandType::Byte, Operand::Byte(value)) => push_be(out, *value),
        (OperandType::Short, Operand::Short(value)) => push_be(out, *value),
        (OperandType::ConstantByte, Operand::Constant(index)) => {
            let Ok(index) = u8::try_from(*index) else {
                return Err(malformed_error!("ldc cannot address constant #{}", index));
            };
            push_be(out, index);
        }
        (OperandType::Constant, Operand::Constant(index)) => push_be(out, *index),
        (OperandType::Local, Operand::Local(index)) if wide => push_be(out, *index),
        (OperandType::Local, Operand::Local(index)) => push_be(out, *index as u8),
        (OperandType::Iinc, Operand::Iinc { index, delta }) if wide => {
            push_be(out, *index);
            push_be(out, *delta);
        }
        (OperandType::Iinc, Operand::Iinc { index, delta }) => {
            push_be(out, *index as u8);
            push_be(out, *delta as i8);
        }
        (OperandType::Branch16, Operand::Target(_)) => {
            let target = targets.first().copied().ok_or_else(mismatch)?;
            push_be(out, relative(target) as i16);
        }
        (OperandType::Branch32, Operand::Target(_)) => {
            let target = targets.first().copied().ok_or_else(mismatch)?;
            push_be(out, relative(target));
        }
        (OperandType::TableSwitch, Operand::TableSwitch { low, high, .. }) => {
            out.extend(std::iter::repeat(0).take(switch_padding(offset) as usize));
            let (default, cases) = targets.split_first().ok_or_else(mismatch)?;
            push_be(out, relative(*default));
            push_be(out, *low);
            push_be(out, *high);
            for target in cases {
                push_be(out, relative(*target));
            }
        }
        (OperandType::LookupSwitch, Operand::LookupSwitch { pairs, .. }) => {
            out.extend(std::iter::repeat(0).take(switch_padding(offset) as usize));
            let (default, cases) = targets.split_first().ok_or_else(mismatch)?;
            push_be(out, relative(*default));
            push_be(out, count_u32(pairs.len())? as i32);
            for ((key, _), target) in pairs.iter().zip(cases) {
                push_be(out, *key);
                push_be(out, relative(*target));
            }
        }
        (OperandType::InvokeInterface, Operand::InvokeInterface { index, count }) => {
            push_be(out, *index);
            push_be(out, *count);
            out.push(0);
        }
        (OperandType::InvokeDynamic, Operand::InvokeDynamic(index)) => {
            push_be(out, *index);
            out.extend_from_slice(&[0, 0]);
        }
        (OperandType::ArrayType, Operand::ArrayType(code)) => push_be(out, *code),
        (OperandType::MultiANewArray, Operand::MultiANewArray { index, dimensions }) => {
            push_be(out, *index);
            push_be(out, *dimensions);
        }
        _ => return Err(mismatch()),
    }

    Ok(())
}

impl EncodedStream {
    /// Length of the re-encoded stream.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.code.len() as u32
    }

    /// `true` if the stream is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl OffsetMap for EncodedStream {
    fn start(&self, old: u32) -> Result<u32> {
        if old == self.original_len {
            return Ok(self.len());
        }
        self.starts
            .get(&old)
            .copied()
            .ok_or_else(|| malformed_error!("Offset {} is not an instruction boundary", old))
    }

    fn end(&self, old: u32) -> Result<u32> {
        if old == 0 {
            return Ok(0);
        }
        self.ends
            .get(&old)
            .copied()
            .ok_or_else(|| malformed_error!("Offset {} is not an instruction boundary", old))
    }
}

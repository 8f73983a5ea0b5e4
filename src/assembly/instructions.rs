//! Static opcode table for the JVM instruction set.
//!
//! [`INSTRUCTIONS`] is indexed by opcode byte (`0x00` - `0xC9`) and describes how each
//! instruction is spelled, which operand layout follows it and how it affects control
//! flow. Both the decoder and the encoder read from this table, so the two directions
//! cannot disagree about an instruction's shape.

use crate::assembly::instruction::{FlowType, OperandType};

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JvmInstruction {
    /// Mnemonic as printed by `javap`
    pub instr: &'static str,
    /// Layout of the bytes following the opcode
    pub op_type: OperandType,
    /// Effect on control flow
    pub flow: FlowType,
}

impl JvmInstruction {
    const fn new(instr: &'static str, op_type: OperandType, flow: FlowType) -> Self {
        JvmInstruction {
            instr,
            op_type,
            flow,
        }
    }
}

/// Opcode table, indexed by opcode byte.
pub static INSTRUCTIONS: [JvmInstruction; 202] = [
    JvmInstruction::new("nop", OperandType::None, FlowType::Sequential), // 0x00
    JvmInstruction::new("aconst_null", OperandType::None, FlowType::Sequential), // 0x01
    JvmInstruction::new("iconst_m1", OperandType::None, FlowType::Sequential), // 0x02
    JvmInstruction::new("iconst_0", OperandType::None, FlowType::Sequential), // 0x03
    JvmInstruction::new("iconst_1", OperandType::None, FlowType::Sequential), // 0x04
    JvmInstruction::new("iconst_2", OperandType::None, FlowType::Sequential), // 0x05
    JvmInstruction::new("iconst_3", OperandType::None, FlowType::Sequential), // 0x06
    JvmInstruction::new("iconst_4", OperandType::None, FlowType::Sequential), // 0x07
    JvmInstruction::new("iconst_5", OperandType::None, FlowType::Sequential), // 0x08
    JvmInstruction::new("lconst_0", OperandType::None, FlowType::Sequential), // 0x09
    JvmInstruction::new("lconst_1", OperandType::None, FlowType::Sequential), // 0x0A
    JvmInstruction::new("fconst_0", OperandType::None, FlowType::Sequential), // 0x0B
    JvmInstruction::new("fconst_1", OperandType::None, FlowType::Sequential), // 0x0C
    JvmInstruction::new("fconst_2", OperandType::None, FlowType::Sequential), // 0x0D
    JvmInstruction::new("dconst_0", OperandType::None, FlowType::Sequential), // 0x0E
    JvmInstruction::new("dconst_1", OperandType::None, FlowType::Sequential), // 0x0F
    JvmInstruction::new("bipush", OperandType::Byte, FlowType::Sequential), // 0x10
    JvmInstruction::new("sipush", OperandType::Short, FlowType::Sequential), // 0x11
    JvmInstruction::new("ldc", OperandType::ConstantByte, FlowType::Sequential), // 0x12
    JvmInstruction::new("ldc_w", OperandType::Constant, FlowType::Sequential), // 0x13
    JvmInstruction::new("ldc2_w", OperandType::Constant, FlowType::Sequential), // 0x14
    JvmInstruction::new("iload", OperandType::Local, FlowType::Sequential), // 0x15
    JvmInstruction::new("lload", OperandType::Local, FlowType::Sequential), // 0x16
    JvmInstruction::new("fload", OperandType::Local, FlowType::Sequential), // 0x17
    JvmInstruction::new("dload", OperandType::Local, FlowType::Sequential), // 0x18
    JvmInstruction::new("aload", OperandType::Local, FlowType::Sequential), // 0x19
    JvmInstruction::new("iload_0", OperandType::None, FlowType::Sequential), // 0x1A
    JvmInstruction::new("iload_1", OperandType::None, FlowType::Sequential), // 0x1B
    JvmInstruction::new("iload_2", OperandType::None, FlowType::Sequential), // 0x1C
    JvmInstruction::new("iload_3", OperandType::None, FlowType::Sequential), // 0x1D
    JvmInstruction::new("lload_0", OperandType::None, FlowType::Sequential), // 0x1E
    JvmInstruction::new("lload_1", OperandType::None, FlowType::Sequential), // 0x1F
    JvmInstruction::new("lload_2", OperandType::None, FlowType::Sequential), // 0x20
    JvmInstruction::new("lload_3", OperandType::None, FlowType::Sequential), // 0x21
    JvmInstruction::new("fload_0", OperandType::None, FlowType::Sequential), // 0x22
    JvmInstruction::new("fload_1", OperandType::None, FlowType::Sequential), // 0x23
    JvmInstruction::new("fload_2", OperandType::None, FlowType::Sequential), // 0x24
    JvmInstruction::new("fload_3", OperandType::None, FlowType::Sequential), // 0x25
    JvmInstruction::new("dload_0", OperandType::None, FlowType::Sequential), // 0x26
    JvmInstruction::new("dload_1", OperandType::None, FlowType::Sequential), // 0x27
    JvmInstruction::new("dload_2", OperandType::None, FlowType::Sequential), // 0x28
    JvmInstruction::new("dload_3", OperandType::None, FlowType::Sequential), // 0x29
    JvmInstruction::new("aload_0", OperandType::None, FlowType::Sequential), // 0x2A
    JvmInstruction::new("aload_1", OperandType::None, FlowType::Sequential), // 0x2B
    JvmInstruction::new("aload_2", OperandType::None, FlowType::Sequential), // 0x2C
    JvmInstruction::new("aload_3", OperandType::None, FlowType::Sequential), // 0x2D
    JvmInstruction::new("iaload", OperandType::None, FlowType::Sequential), // 0x2E
    JvmInstruction::new("laload", OperandType::None, FlowType::Sequential), // 0x2F
    JvmInstruction::new("faload", OperandType::None, FlowType::Sequential), // 0x30
    JvmInstruction::new("daload", OperandType::None, FlowType::Sequential), // 0x31
    JvmInstruction::new("aaload", OperandType::None, FlowType::Sequential), // 0x32
    JvmInstruction::new("baload", OperandType::None, FlowType::Sequential), // 0x33
    JvmInstruction::new("caload", OperandType::None, FlowType::Sequential), // 0x34
    JvmInstruction::new("saload", OperandType::None, FlowType::Sequential), // 0x35
    JvmInstruction::new("istore", OperandType::Local, FlowType::Sequential), // 0x36
    JvmInstruction::new("lstore", OperandType::Local, FlowType::Sequential), // 0x37
    JvmInstruction::new("fstore", OperandType::Local, FlowType::Sequential), // 0x38
    JvmInstruction::new("dstore", OperandType::Local, FlowType::Sequential), // 0x39
    JvmInstruction::new("astore", OperandType::Local, FlowType::Sequential), // 0x3A
    JvmInstruction::new("istore_0", OperandType::None, FlowType::Sequential), // 0x3B
    JvmInstruction::new("istore_1", OperandType::None, FlowType::Sequential), // 0x3C
    JvmInstruction::new("istore_2", OperandType::None, FlowType::Sequential), // 0x3D
    JvmInstruction::new("istore_3", OperandType::None, FlowType::Sequential), // 0x3E
    JvmInstruction::new("lstore_0", OperandType::None, FlowType::Sequential), // 0x3F
    JvmInstruction::new("lstore_1", OperandType::None, FlowType::Sequential), // 0x40
    JvmInstruction::new("lstore_2", OperandType::None, FlowType::Sequential), // 0x41
    JvmInstruction::new("lstore_3", OperandType::None, FlowType::Sequential), // 0x42
    JvmInstruction::new("fstore_0", OperandType::None, FlowType::Sequential), // 0x43
    JvmInstruction::new("fstore_1", OperandType::None, FlowType::Sequential), // 0x44
    JvmInstruction::new("fstore_2", OperandType::None, FlowType::Sequential), // 0x45
    JvmInstruction::new("fstore_3", OperandType::None, FlowType::Sequential), // 0x46
    JvmInstruction::new("dstore_0", OperandType::None, FlowType::Sequential), // 0x47
    JvmInstruction::new("dstore_1", OperandType::None, FlowType::Sequential), // 0x48
    JvmInstruction::new("dstore_2", OperandType::None, FlowType::Sequential), // 0x49
    JvmInstruction::new("dstore_3", OperandType::None, FlowType::Sequential), // 0x4A
    JvmInstruction::new("astore_0", OperandType::None, FlowType::Sequential), // 0x4B
    JvmInstruction::new("astore_1", OperandType::None, FlowType::Sequential), // 0x4C
    JvmInstruction::new("astore_2", OperandType::None, FlowType::Sequential), // 0x4D
    JvmInstruction::new("astore_3", OperandType::None, FlowType::Sequential), // 0x4E
    JvmInstruction::new("iastore", OperandType::None, FlowType::Sequential), // 0x4F
    JvmInstruction::new("lastore", OperandType::None, FlowType::Sequential), // 0x50
    JvmInstruction::new("fastore", OperandType::None, FlowType::Sequential), // 0x51
    JvmInstruction::new("dastore", OperandType::None, FlowType::Sequential), // 0x52
    JvmInstruction::new("aastore", OperandType::None, FlowType::Sequential), // 0x53
    JvmInstruction::new("bastore", OperandType::None, FlowType::Sequential), // 0x54
    JvmInstruction::new("castore", OperandType::None, FlowType::Sequential), // 0x55
    JvmInstruction::new("sastore", OperandType::None, FlowType::Sequential), // 0x56
    JvmInstruction::new("pop", OperandType::None, FlowType::Sequential), // 0x57
    JvmInstruction::new("pop2", OperandType::None, FlowType::Sequential), // 0x58
    JvmInstruction::new("dup", OperandType::None, FlowType::Sequential), // 0x59
    JvmInstruction::new("dup_x1", OperandType::None, FlowType::Sequential), // 0x5A
    JvmInstruction::new("dup_x2", OperandType::None, FlowType::Sequential), // 0x5B
    JvmInstruction::new("dup2", OperandType::None, FlowType::Sequential), // 0x5C
    JvmInstruction::new("dup2_x1", OperandType::None, FlowType::Sequential), // 0x5D
    JvmInstruction::new("dup2_x2", OperandType::None, FlowType::Sequential), // 0x5E
    JvmInstruction::new("swap", OperandType::None, FlowType::Sequential), // 0x5F
    JvmInstruction::new("iadd", OperandType::None, FlowType::Sequential), // 0x60
    JvmInstruction::new("ladd", OperandType::None, FlowType::Sequential), // 0x61
    JvmInstruction::new("fadd", OperandType::None, FlowType::Sequential), // 0x62
    JvmInstruction::new("dadd", OperandType::None, FlowType::Sequential), // 0x63
    JvmInstruction::new("isub", OperandType::None, FlowType::Sequential), // 0x64
    JvmInstruction::new("lsub", OperandType::None, FlowType::Sequential), // 0x65
    JvmInstruction::new("fsub", OperandType::None, FlowType::Sequential), // 0x66
    JvmInstruction::new("dsub", OperandType::None, FlowType::Sequential), // 0x67
    JvmInstruction::new("imul", OperandType::None, FlowType::Sequential), // 0x68
    JvmInstruction::new("lmul", OperandType::None, FlowType::Sequential), // 0x69
    JvmInstruction::new("fmul", OperandType::None, FlowType::Sequential), // 0x6A
    JvmInstruction::new("dmul", OperandType::None, FlowType::Sequential), // 0x6B
    JvmInstruction::new("idiv", OperandType::None, FlowType::Sequential), // 0x6C
    JvmInstruction::new("ldiv", OperandType::None, FlowType::Sequential), // 0x6D
    JvmInstruction::new("fdiv", OperandType::None, FlowType::Sequential), // 0x6E
    JvmInstruction::new("ddiv", OperandType::None, FlowType::Sequential), // 0x6F
    JvmInstruction::new("irem", OperandType::None, FlowType::Sequential), // 0x70
    JvmInstruction::new("lrem", OperandType::None, FlowType::Sequential), // 0x71
    JvmInstruction::new("frem", OperandType::None, FlowType::Sequential), // 0x72
    JvmInstruction::new("drem", OperandType::None, FlowType::Sequential), // 0x73
    JvmInstruction::new("ineg", OperandType::None, FlowType::Sequential), // 0x74
    JvmInstruction::new("lneg", OperandType::None, FlowType::Sequential), // 0x75
    JvmInstruction::new("fneg", OperandType::None, FlowType::Sequential), // 0x76
    JvmInstruction::new("dneg", OperandType::None, FlowType::Sequential), // 0x77
    JvmInstruction::new("ishl", OperandType::None, FlowType::Sequential), // 0x78
    JvmInstruction::new("lshl", OperandType::None, FlowType::Sequential), // 0x79
    JvmInstruction::new("ishr", OperandType::None, FlowType::Sequential), // 0x7A
    JvmInstruction::new("lshr", OperandType::None, FlowType::Sequential), // 0x7B
    JvmInstruction::new("iushr", OperandType::None, FlowType::Sequential), // 0x7C
    JvmInstruction::new("lushr", OperandType::None, FlowType::Sequential), // 0x7D
    JvmInstruction::new("iand", OperandType::None, FlowType::Sequential), // 0x7E
    JvmInstruction::new("land", OperandType::None, FlowType::Sequential), // 0x7F
    JvmInstruction::new("ior", OperandType::None, FlowType::Sequential), // 0x80
    JvmInstruction::new("lor", OperandType::None, FlowType::Sequential), // 0x81
    JvmInstruction::new("ixor", OperandType::None, FlowType::Sequential), // 0x82
    JvmInstruction::new("lxor", OperandType::None, FlowType::Sequential), // 0x83
    JvmInstruction::new("iinc", OperandType::Iinc, FlowType::Sequential), // 0x84
    JvmInstruction::new("i2l", OperandType::None, FlowType::Sequential), // 0x85
    JvmInstruction::new("i2f", OperandType::None, FlowType::Sequential), // 0x86
    JvmInstruction::new("i2d", OperandType::None, FlowType::Sequential), // 0x87
    JvmInstruction::new("l2i", OperandType::None, FlowType::Sequential), // 0x88
    JvmInstruction::new("l2f", OperandType::None, FlowType::Sequential), // 0x89
    JvmInstruction::new("l2d", OperandType::None, FlowType::Sequential), // 0x8A
    JvmInstruction::new("f2i", OperandType::None, FlowType::Sequential), // 0x8B
    JvmInstruction::new("f2l", OperandType::None, FlowType::Sequential), // 0x8C
    JvmInstruction::new("f2d", OperandType::None, FlowType::Sequential), // 0x8D
    JvmInstruction::new("d2i", OperandType::None, FlowType::Sequential), // 0x8E
    JvmInstruction::new("d2l", OperandType::None, FlowType::Sequential), // 0x8F
    JvmInstruction::new("d2f", OperandType::None, FlowType::Sequential), // 0x90
    JvmInstruction::new("i2b", OperandType::None, FlowType::Sequential), // 0x91
    JvmInstruction::new("i2c", OperandType::None, FlowType::Sequential), // 0x92
    JvmInstruction::new("i2s", OperandType::None, FlowType::Sequential), // 0x93
    JvmInstruction::new("lcmp", OperandType::None, FlowType::Sequential), // 0x94
    JvmInstruction::new("fcmpl", OperandType::None, FlowType::Sequential), // 0x95
    JvmInstruction::new("fcmpg", OperandType::None, FlowType::Sequential), // 0x96
    JvmInstruction::new("dcmpl", OperandType::None, FlowType::Sequential), // 0x97
    JvmInstruction::new("dcmpg", OperandType::None, FlowType::Sequential), // 0x98
    JvmInstruction::new("ifeq", OperandType::Branch16, FlowType::ConditionalBranch), // 0x99
    JvmInstruction::new("ifne", OperandType::Branch16, FlowType::ConditionalBranch), // 0x9A
    JvmInstruction::new("iflt", OperandType::Branch16, FlowType::ConditionalBranch), // 0x9B
    JvmInstruction::new("ifge", OperandType::Branch16, FlowType::ConditionalBranch), // 0x9C
    JvmInstruction::new("ifgt", OperandType::Branch16, FlowType::ConditionalBranch), // 0x9D
    JvmInstruction::new("ifle", OperandType::Branch16, FlowType::ConditionalBranch), // 0x9E
    JvmInstruction::new("if_icmpeq", OperandType::Branch16, FlowType::ConditionalBranch), // 0x9F
    JvmInstruction::new("if_icmpne", OperandType::Branch16, FlowType::ConditionalBranch), // 0xA0
    JvmInstruction::new("if_icmplt", OperandType::Branch16, FlowType::ConditionalBranch), // 0xA1
    JvmInstruction::new("if_icmpge", OperandType::Branch16, FlowType::ConditionalBranch), // 0xA2
    JvmInstruction::new("if_icmpgt", OperandType::Branch16, FlowType::ConditionalBranch), // 0xA3
    JvmInstruction::new("if_icmple", OperandType::Branch16, FlowType::ConditionalBranch), // 0xA4
    JvmInstruction::new("if_acmpeq", OperandType::Branch16, FlowType::ConditionalBranch), // 0xA5
    JvmInstruction::new("if_acmpne", OperandType::Branch16, FlowType::ConditionalBranch), // 0xA6
    JvmInstruction::new("goto", OperandType::Branch16, FlowType::UnconditionalBranch), // 0xA7
    JvmInstruction::new("jsr", OperandType::Branch16, FlowType::Subroutine), // 0xA8
    JvmInstruction::new("ret", OperandType::Local, FlowType::Return), // 0xA9
    JvmInstruction::new("tableswitch", OperandType::TableSwitch, FlowType::Switch), // 0xAA
    JvmInstruction::new("lookupswitch", OperandType::LookupSwitch, FlowType::Switch), // 0xAB
    JvmInstruction::new("ireturn", OperandType::None, FlowType::Return), // 0xAC
    JvmInstruction::new("lreturn", OperandType::None, FlowType::Return), // 0xAD
    JvmInstruction::new("freturn", OperandType::None, FlowType::Return), // 0xAE
    JvmInstruction::new("dreturn", OperandType::None, FlowType::Return), // 0xAF
    JvmInstruction::new("areturn", OperandType::None, FlowType::Return), // 0xB0
    JvmInstruction::new("return", OperandType::None, FlowType::Return), // 0xB1
    JvmInstruction::new("getstatic", OperandType::Constant, FlowType::Sequential), // 0xB2
    JvmInstruction::new("putstatic", OperandType::Constant, FlowType::Sequential), // 0xB3
    JvmInstruction::new("getfield", OperandType::Constant, FlowType::Sequential), // 0xB4
    JvmInstruction::new("putfield", OperandType::Constant, FlowType::Sequential), // 0xB5
    JvmInstruction::new("invokevirtual", OperandType::Constant, FlowType::Call), // 0xB6
    JvmInstruction::new("invokespecial", OperandType::Constant, FlowType::Call), // 0xB7
    JvmInstruction::new("invokestatic", OperandType::Constant, FlowType::Call), // 0xB8
    JvmInstruction::new("invokeinterface", OperandType::InvokeInterface, FlowType::Call), // 0xB9
    JvmInstruction::new("invokedynamic", OperandType::InvokeDynamic, FlowType::Call), // 0xBA
    JvmInstruction::new("new", OperandType::Constant, FlowType::Sequential), // 0xBB
    JvmInstruction::new("newarray", OperandType::ArrayType, FlowType::Sequential), // 0xBC
    JvmInstruction::new("anewarray", OperandType::Constant, FlowType::Sequential), // 0xBD
    JvmInstruction::new("arraylength", OperandType::None, FlowType::Sequential), // 0xBE
    JvmInstruction::new("athrow", OperandType::None, FlowType::Throw), // 0xBF
    JvmInstruction::new("checkcast", OperandType::Constant, FlowType::Sequential), // 0xC0
    JvmInstruction::new("instanceof", OperandType::Constant, FlowType::Sequential), // 0xC1
    JvmInstruction::new("monitorenter", OperandType::None, FlowType::Sequential), // 0xC2
    JvmInstruction::new("monitorexit", OperandType::None, FlowType::Sequential), // 0xC3
    JvmInstruction::new("wide", OperandType::Wide, FlowType::Sequential), // 0xC4
    JvmInstruction::new("multianewarray", OperandType::MultiANewArray, FlowType::Sequential), // 0xC5
    JvmInstruction::new("ifnull", OperandType::Branch16, FlowType::ConditionalBranch), // 0xC6
    JvmInstruction::new("ifnonnull", OperandType::Branch16, FlowType::ConditionalBranch), // 0xC7
    JvmInstruction::new("goto_w", OperandType::Branch32, FlowType::UnconditionalBranch), // 0xC8
    JvmInstruction::new("jsr_w", OperandType::Branch32, FlowType::Subroutine), // 0xC9
];

/// Look up the table entry for `opcode`.
#[must_use]
pub fn lookup(opcode: u8) -> Option<&'static JvmInstruction> {
    INSTRUCTIONS.get(usize::from(opcode))
}

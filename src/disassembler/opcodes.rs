//! The CIL opcode table.
//!
//! One-byte opcodes and the two-byte opcodes behind the `0xFE` prefix, with their
//! mnemonics and operand encodings.
//!
//! # Reference
//! - [ECMA-335 III.1.2.1 and III.3-4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

/// Encoding of the inline operand that follows an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed 8-bit immediate
    Int8,
    /// Unsigned 8-bit index or immediate
    UInt8,
    /// Unsigned 16-bit index
    UInt16,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Metadata token
    Token,
    /// Signed 8-bit branch displacement
    ShortBranch,
    /// Signed 32-bit branch displacement
    Branch,
    /// Jump table: count followed by 32-bit displacements
    Switch,
}

/// A CIL opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    /// Encoded value; two-byte opcodes carry the `0xFE` prefix in the high byte
    pub value: u16,
    /// ILAsm mnemonic
    pub name: &'static str,
    /// Inline operand
    pub operand: OperandType,
}

const fn op(value: u16, name: &'static str, operand: OperandType) -> Option<OpCode> {
    Some(OpCode {
        value,
        name,
        operand,
    })
}

/// Look up a one-byte opcode; `None` for reserved values and the `0xFE` prefix.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn lookup(byte: u8) -> Option<OpCode> {
    use OperandType::{
        Branch, Float32, Float64, Int32, Int64, Int8, None as Plain, ShortBranch, Switch, Token,
        UInt8,
    };

    let value = u16::from(byte);
    match byte {
        0x00 => op(value, "nop", Plain),
        0x01 => op(value, "break", Plain),
        0x02 => op(value, "ldarg.0", Plain),
        0x03 => op(value, "ldarg.1", Plain),
        0x04 => op(value, "ldarg.2", Plain),
        0x05 => op(value, "ldarg.3", Plain),
        0x06 => op(value, "ldloc.0", Plain),
        0x07 => op(value, "ldloc.1", Plain),
        0x08 => op(value, "ldloc.2", Plain),
        0x09 => op(value, "ldloc.3", Plain),
        0x0A => op(value, "stloc.0", Plain),
        0x0B => op(value, "stloc.1", Plain),
        0x0C => op(value, "stloc.2", Plain),
        0x0D => op(value, "stloc.3", Plain),
        0x0E => op(value, "ldarg.s", UInt8),
        0x0F => op(value, "ldarga.s", UInt8),
        0x10 => op(value, "starg.s", UInt8),
        0x11 => op(value, "ldloc.s", UInt8),
        0x12 => op(value, "ldloca.s", UInt8),
        0x13 => op(value, "stloc.s", UInt8),
        0x14 => op(value, "ldnull", Plain),
        0x15 => op(value, "ldc.i4.m1", Plain),
        0x16 => op(value, "ldc.i4.0", Plain),
        0x17 => op(value, "ldc.i4.1", Plain),
        0x18 => op(value, "ldc.i4.2", Plain),
        0x19 => op(value, "ldc.i4.3", Plain),
        0x1A => op(value, "ldc.i4.4", Plain),
        0x1B => op(value, "ldc.i4.5", Plain),
        0x1C => op(value, "ldc.i4.6", Plain),
        0x1D => op(value, "ldc.i4.7", Plain),
        0x1E => op(value, "ldc.i4.8", Plain),
        0x1F => op(value, "ldc.i4.s", Int8),
        0x20 => op(value, "ldc.i4", Int32),
        0x21 => op(value, "ldc.i8", Int64),
        0x22 => op(value, "ldc.r4", Float32),
        0x23 => op(value, "ldc.r8", Float64),
        0x25 => op(value, "dup", Plain),
        0x26 => op(value, "pop", Plain),
        0x27 => op(value, "jmp", Token),
        0x28 => op(value, "call", Token),
        0x29 => op(value, "calli", Token),
        0x2A => op(value, "ret", Plain),
        0x2B => op(value, "br.s", ShortBranch),
        0x2C => op(value, "brfalse.s", ShortBranch),
        0x2D => op(value, "brtrue.s", ShortBranch),
        0x2E => op(value, "beq.s", ShortBranch),
        0x2F => op(value, "bge.s", ShortBranch),
        0x30 => op(value, "bgt.s", ShortBranch),
        0x31 => op(value, "ble.s", ShortBranch),
        0x32 => op(value, "blt.s", ShortBranch),
        0x33 => op(value, "bne.un.s", ShortBranch),
        0x34 => op(value, "bge.un.s", ShortBranch),
        0x35 => op(value, "bgt.un.s", ShortBranch),
        0x36 => op(value, "ble.un.s", ShortBranch),
        0x37 => op(value, "blt.un.s", ShortBranch),
        0x38 => op(value, "br", Branch),
        0x39 => op(value, "brfalse", Branch),
        0x3A => op(value, "brtrue", Branch),
        0x3B => op(value, "beq", Branch),
        0x3C => op(value, "bge", Branch),
        0x3D => op(value, "bgt", Branch),
        0x3E => op(value, "ble", Branch),
        0x3F => op(value, "blt", Branch),
        0x40 => op(value, "bne.un", Branch),
        0x41 => op(value, "bge.un", Branch),
        0x42 => op(value, "bgt.un", Branch),
        0x43 => op(value, "ble.un", Branch),
        0x44 => op(value, "blt.un", Branch),
        0x45 => op(value, "switch", Switch),
        0x46 => op(value, "ldind.i1", Plain),
        0x47 => op(value, "ldind.u1", Plain),
        0x48 => op(value, "ldind.i2", Plain),
        0x49 => op(value, "ldind.u2", Plain),
        0x4A => op(value, "ldind.i4", Plain),
        0x4B => op(value, "ldind.u4", Plain),
        0x4C => op(value, "ldind.i8", Plain),
        0x4D => op(value, "ldind.i", Plain),
        0x4E => op(value, "ldind.r4", Plain),
        0x4F => op(value, "ldind.r8", Plain),
        0x50 => op(value, "ldind.ref", Plain),
        0x51 => op(value, "stind.ref", Plain),
        0x52 => op(value, "stind.i1", Plain),
        0x53 => op(value, "stind.i2", Plain),
        0x54 => op(value, "stind.i4", Plain),
        0x55 => op(value, "stind.i8", Plain),
        0x56 => op(value, "stind.r4", Plain),
        0x57 => op(value, "stind.r8", Plain),
        0x58 => op(value, "add", Plain),
        0x59 => op(value, "sub", Plain),
        0x5A => op(value, "mul", Plain),
        0x5B => op(value, "div", Plain),
        0x5C => op(value, "div.un", Plain),
        0x5D => op(value, "rem", Plain),
        0x5E => op(value, "rem.un", Plain),
        0x5F => op(value, "and", Plain),
        0x60 => op(value, "or", Plain),
        0x61 => op(value, "xor", Plain),
        0x62 => op(value, "shl", Plain),
        0x63 => op(value, "shr", Plain),
        0x64 => op(value, "shr.un", Plain),
        0x65 => op(value, "neg", Plain),
        0x66 => op(value, "not", Plain),
        0x67 => op(value, "conv.i1", Plain),
        0x68 => op(value, "conv.i2", Plain),
        0x69 => op(value, "conv.i4", Plain),
        0x6A => op(value, "conv.i8", Plain),
        0x6B => op(value, "conv.r4", Plain),
        0x6C => op(value, "conv.r8", Plain),
        0x6D => op(value, "conv.u4", Plain),
        0x6E => op(value, "conv.u8", Plain),
        0x6F => op(value, "callvirt", Token),
        0x70 => op(value, "cpobj", Token),
        0x71 => op(value, "ldobj", Token),
        0x72 => op(value, "ldstr", Token),
        0x73 => op(value, "newobj", Token),
        0x74 => op(value, "castclass", Token),
        0x75 => op(value, "isinst", Token),
        0x76 => op(value, "conv.r.un", Plain),
        0x79 => op(value, "unbox", Token),
        0x7A => op(value, "throw", Plain),
        0x7B => op(value, "ldfld", Token),
        0x7C => op(value, "ldflda", Token),
        0x7D => op(value, "stfld", Token),
        0x7E => op(value, "ldsfld", Token),
        0x7F => op(value, "ldsflda", Token),
        0x80 => op(value, "stsfld", Token),
        0x81 => op(value, "stobj", Token),
        0x82 => op(value, "conv.ovf.i1.un", Plain),
        0x83 => op(value, "conv.ovf.i2.un", Plain),
        0x84 => op(value, "conv.ovf.i4.un", Plain),
        0x85 => op(value, "conv.ovf.i8.un", Plain),
        0x86 => op(value, "conv.ovf.u1.un", Plain),
        0x87 => op(value, "conv.ovf.u2.un", Plain),
        0x88 => op(value, "conv.ovf.u4.un", Plain),
        0x89 => op(value, "conv.ovf.u8.un", Plain),
        0x8A => op(value, "conv.ovf.i.un", Plain),
        0x8B => op(value, "conv.ovf.u.un", Plain),
        0x8C => op(value, "box", Token),
        0x8D => op(value, "newarr", Token),
        0x8E => op(value, "ldlen", Plain),
        0x8F => op(value, "ldelema", Token),
        0x90 => op(value, "ldelem.i1", Plain),
        0x91 => op(value, "ldelem.u1", Plain),
        0x92 => op(value, "ldelem.i2", Plain),
        0x93 => op(value, "ldelem.u2", Plain),
        0x94 => op(value, "ldelem.i4", Plain),
        0x95 => op(value, "ldelem.u4", Plain),
        0x96 => op(value, "ldelem.i8", Plain),
        0x97 => op(value, "ldelem.i", Plain),
        0x98 => op(value, "ldelem.r4", Plain),
        0x99 => op(value, "ldelem.r8", Plain),
        0x9A => op(value, "ldelem.ref", Plain),
        0x9B => op(value, "stelem.i", Plain),
        0x9C => op(value, "stelem.i1", Plain),
        0x9D => op(value, "stelem.i2", Plain),
        0x9E => op(value, "stelem.i4", Plain),
        0x9F => op(value, "stelem.i8", Plain),
        0xA0 => op(value, "stelem.r4", Plain),
        0xA1 => op(value, "stelem.r8", Plain),
        0xA2 => op(value, "stelem.ref", Plain),
        0xA3 => op(value, "ldelem", Token),
        0xA4 => op(value, "stelem", Token),
        0xA5 => op(value, "unbox.any", Token),
        0xB3 => op(value, "conv.ovf.i1", Plain),
        0xB4 => op(value, "conv.ovf.u1", Plain),
        0xB5 => op(value, "conv.ovf.i2", Plain),
        0xB6 => op(value, "conv.ovf.u2", Plain),
        0xB7 => op(value, "conv.ovf.i4", Plain),
        0xB8 => op(value, "conv.ovf.u4", Plain),
        0xB9 => op(value, "conv.ovf.i8", Plain),
        0xBA => op(value, "conv.ovf.u8", Plain),
        0xC2 => op(value, "refanyval", Token),
        0xC3 => op(value, "ckfinite", Plain),
        0xC6 => op(value, "mkrefany", Token),
        0xD0 => op(value, "ldtoken", Token),
        0xD1 => op(value, "conv.u2", Plain),
        0xD2 => op(value, "conv.u1", Plain),
        0xD3 => op(value, "conv.i", Plain),
        0xD4 => op(value, "conv.ovf.i", Plain),
        0xD5 => op(value, "conv.ovf.u", Plain),
        0xD6 => op(value, "add.ovf", Plain),
        0xD7 => op(value, "add.ovf.un", Plain),
        0xD8 => op(value, "mul.ovf", Plain),
        0xD9 => op(value, "mul.ovf.un", Plain),
        0xDA => op(value, "sub.ovf", Plain),
        0xDB => op(value, "sub.ovf.un", Plain),
        0xDC => op(value, "endfinally", Plain),
        0xDD => op(value, "leave", Branch),
        0xDE => op(value, "leave.s", ShortBranch),
        0xDF => op(value, "stind.i", Plain),
        0xE0 => op(value, "conv.u", Plain),
        _ => None,
    }
}

/// Look up the opcode `0xFE <byte>`.
#[must_use]
pub fn lookup_extended(byte: u8) -> Option<OpCode> {
    use OperandType::{None as Plain, Token, UInt16, UInt8};

    let value = 0xFE00 | u16::from(byte);
    match byte {
        0x00 => op(value, "arglist", Plain),
        0x01 => op(value, "ceq", Plain),
        0x02 => op(value, "cgt", Plain),
        0x03 => op(value, "cgt.un", Plain),
        0x04 => op(value, "clt", Plain),
        0x05 => op(value, "clt.un", Plain),
        0x06 => op(value, "ldftn", Token),
        0x07 => op(value, "ldvirtftn", Token),
        0x09 => op(value, "ldarg", UInt16),
        0x0A => op(value, "ldarga", UInt16),
        0x0B => op(value, "starg", UInt16),
        0x0C => op(value, "ldloc", UInt16),
        0x0D => op(value, "ldloca", UInt16),
        0x0E => op(value, "stloc", UInt16),
        0x0F => op(value, "localloc", Plain),
        0x11 => op(value, "endfilter", Plain),
        0x12 => op(value, "unaligned.", UInt8),
        0x13 => op(value, "volatile.", Plain),
        0x14 => op(value, "tail.", Plain),
        0x15 => op(value, "initobj", Token),
        0x16 => op(value, "constrained.", Token),
        0x17 => op(value, "cpblk", Plain),
        0x18 => op(value, "initblk", Plain),
        0x19 => op(value, "no.", UInt8),
        0x1A => op(value, "rethrow", Plain),
        0x1C => op(value, "sizeof", Token),
        0x1D => op(value, "refanytype", Plain),
        0x1E => op(value, "readonly.", Plain),
        _ => None,
    }
}

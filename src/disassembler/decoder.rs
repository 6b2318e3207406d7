//! Instruction decoding.
//!
//! [`decode_instruction`] reads one instruction from a [`Parser`] positioned inside a method
//! body's code; [`decode_stream`] decodes a whole code block. Branch displacements are
//! resolved to absolute IL offsets, measured from the start of the following instruction.

use std::fmt;

use crate::{
    disassembler::opcodes::{lookup, lookup_extended, OpCode, OperandType},
    file::parser::Parser,
    metadata::token::Token,
    Result,
};

/// Decoded inline operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Signed immediate
    Int(i64),
    /// Argument or local index, alignment or check mask
    UInt(u16),
    /// `float32` immediate
    Float32(f32),
    /// `float64` immediate
    Float64(f64),
    /// Metadata token
    Token(Token),
    /// Absolute branch target
    Target(u32),
    /// Absolute targets of a `switch`
    Switch(Vec<u32>),
}

/// One decoded CIL instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset in the method's code
    pub offset: u32,
    /// Encoded size including the operand
    pub size: u32,
    /// The opcode
    pub opcode: OpCode,
    /// The operand
    pub operand: Operand,
}

impl Instruction {
    /// The mnemonic.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.name
    }

    /// Offset of the next instruction.
    #[must_use]
    pub fn next_offset(&self) -> u32 {
        self.offset + self.size
    }
}

/// Formats an IL offset as an ILAsm label.
#[derive(Debug, Clone, Copy)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}", self.0)
    }
}

fn target(next: u32, displacement: i64) -> Result<u32> {
    u32::try_from(i64::from(next) + displacement)
        .map_err(|_| malformed_error!("Branch target before the method start: {}", displacement))
}

/// Decode the instruction at the parser's position.
///
/// # Errors
/// Returns an error for reserved opcodes, truncated operands and branches that leave the
/// 32-bit offset range.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let start = parser.pos();
    let first = parser.read_le::<u8>()?;
    let opcode = if first == 0xFE {
        let second = parser.read_le::<u8>()?;
        lookup_extended(second)
            .ok_or_else(|| malformed_error!("Invalid opcode FE {:02X} at IL_{:04x}", second, start))?
    } else {
        lookup(first)
            .ok_or_else(|| malformed_error!("Invalid opcode {:02X} at IL_{:04x}", first, start))?
    };

    let operand = match opcode.operand {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Int(i64::from(parser.read_le::<i8>()?)),
        OperandType::UInt8 => Operand::UInt(u16::from(parser.read_le::<u8>()?)),
        OperandType::UInt16 => Operand::UInt(parser.read_le::<u16>()?),
        OperandType::Int32 => Operand::Int(i64::from(parser.read_le::<i32>()?)),
        OperandType::Int64 => Operand::Int(parser.read_le::<i64>()?),
        OperandType::Float32 => Operand::Float32(parser.read_le::<f32>()?),
        OperandType::Float64 => Operand::Float64(parser.read_le::<f64>()?),
        OperandType::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandType::ShortBranch => {
            let displacement = parser.read_le::<i8>()?;
            Operand::Target(target(parser.pos() as u32, i64::from(displacement))?)
        }
        OperandType::Branch => {
            let displacement = parser.read_le::<i32>()?;
            Operand::Target(target(parser.pos() as u32, i64::from(displacement))?)
        }
        OperandType::Switch => {
            let count = parser.read_le::<u32>()? as usize;
            let table_end = parser
                .pos()
                .checked_add(count.checked_mul(4).ok_or(crate::Error::OutOfBounds)?)
                .ok_or(crate::Error::OutOfBounds)?;
            if table_end > parser.len() {
                return Err(crate::Error::OutOfBounds);
            }

            let mut displacements = Vec::with_capacity(count);
            for _ in 0..count {
                displacements.push(parser.read_le::<i32>()?);
            }
            let next = parser.pos() as u32;
            Operand::Switch(
                displacements
                    .into_iter()
                    .map(|displacement| target(next, i64::from(displacement)))
                    .collect::<Result<_>>()?,
            )
        }
    };

    Ok(Instruction {
        offset: start as u32,
        size: (parser.pos() - start) as u32,
        opcode,
        operand,
    })
}

/// Decode all instructions of `code`.
///
/// # Errors
/// Returns the first decoding error.
pub fn decode_stream(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut parser = Parser::new(code);
    let mut instructions = Vec::new();
    while parser.has_more_data() {
        instructions.push(decode_instruction(&mut parser)?);
    }
    Ok(instructions)
}

//! CIL instruction decoding.
//!
//! This module turns the code bytes of a method body into [`Instruction`]s. The IL renderer
//! walks the decoded stream to print one line per instruction, with branch operands
//! already resolved to the labels of their targets.
//!
//! # Key Types
//! - [`Instruction`] - A decoded CIL instruction
//! - [`Operand`] - Its inline operand
//! - [`OpCode`] and [`OperandType`] - Entries of the opcode table
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//! - [`decode_stream`] - Decode a whole code block
//!
//! # Example
//! ```rust
//! use ildecomp::disassembler::decode_stream;
//!
//! let instructions = decode_stream(&[0x00, 0x2A])?; // nop, ret
//! assert_eq!(instructions[1].mnemonic(), "ret");
//! assert_eq!(instructions[1].offset, 1);
//! # Ok::<(), ildecomp::Error>(())
//! ```

mod decoder;
mod opcodes;

pub use decoder::{decode_instruction, decode_stream, Instruction, Label, Operand};
pub use opcodes::{lookup, lookup_extended, OpCode, OperandType};

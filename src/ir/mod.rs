//! Module intermediate representation: word buffers, opcodes, instruction
//! and operand enumeration.

pub mod buffer;
pub mod format;
pub mod operands;
pub mod reader;
pub mod schema;

pub use buffer::{ModuleBuffer, ModuleBufferMut, ModuleWriter, WordPool};
pub use format::{
    pack_word0, unpack_word0, Decoration, Dim, LayoutSection, ModuleHeader, Op, StorageClass,
    GENERATOR, HEADER_WORDS, MAGIC, MAX_SECTION,
};
pub use operands::{decode_string, encode_string, Operand, OperandIter, OperandValue};
pub use reader::{
    FunctionIter, FunctionIterMut, Instr, InstrMut, OrderedIter, SequentialIter, SequentialIterMut,
};
pub use schema::{schema, InstructionSchema, OperandKind, OperandSlot, Quantifier};

use thiserror::Error;

/// Errors raised while reading a module. Header problems surface when a
/// buffer view is constructed; instruction and operand problems surface
/// lazily, at the element that is malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    #[error("malformed instruction at word {offset}: {reason}")]
    MalformedInstruction { offset: usize, reason: String },

    #[error("malformed operand at word {offset}: {reason}")]
    MalformedOperand { offset: usize, reason: String },
}

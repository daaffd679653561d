//! Intrinsic lowering: turning typed call sites into instruction sequences.
//!
//! The front end hands this layer typed operand values (an id plus a
//! canonical type handle) and a builder/context pair; the lowering routines
//! in [`byte_buffer`] and [`texture`] emit fully encoded instructions
//! through the word writer. Anything outside the enumerated combinations
//! fails fast with [`LowerError::UnsupportedFeature`] naming the
//! combination; there is no partial emission.

pub mod byte_buffer;
pub mod context;
pub mod texture;

pub use context::{FunctionBuilder, LowerContext};

use thiserror::Error;

use crate::ir::format::{Op, StorageClass};
use crate::symbols::{ScalarKind, TypeDesc, TypeHandle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LowerError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

/// Shorthand for the fail-fast path.
pub(crate) fn unsupported<T>(what: impl Into<String>) -> Result<T, LowerError> {
    Err(LowerError::UnsupportedFeature(what.into()))
}

/// A typed id: the unit of data the lowering routines pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value {
    pub id: u32,
    pub ty: TypeHandle,
}

/// Pointee type and storage class of a pointer-typed value.
pub(crate) fn pointee(
    ctx: &LowerContext,
    value: Value,
) -> Result<(TypeHandle, StorageClass), LowerError> {
    match ctx.types.get(value.ty) {
        TypeDesc::Pointer { base, storage } => Ok((*base, *storage)),
        _ => unsupported(format!(
            "expected a pointer output, got {}",
            ctx.types.name(value.ty)
        )),
    }
}

/// Reinterpret or convert an unsigned word `value` to `target`'s scalar
/// kind: identity for uint, bit-pattern cast for int, numeric conversion
/// for float.
pub(crate) fn convert_from_uint(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    value: Value,
    target: TypeHandle,
) -> Result<Value, LowerError> {
    match ctx.types.scalar_kind(target) {
        Some(ScalarKind::UInt) => Ok(value),
        Some(ScalarKind::Int) => builder.emit_result(ctx, Op::Bitcast, target, &[value.id]),
        Some(ScalarKind::Float) => {
            builder.emit_result(ctx, Op::ConvertUToF, target, &[value.id])
        }
        _ => unsupported(format!(
            "cannot convert a word value to {}",
            ctx.types.name(target)
        )),
    }
}

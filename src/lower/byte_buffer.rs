//! Lowering for byte-addressed buffer intrinsics.
//!
//! A byte-addressed buffer is typed as one runtime array of 32-bit words
//! behind a block struct, so every access first turns the byte offset into
//! an element index (`offset >> 2`, unsigned) and then chains through the
//! single member at that index:
//!
//! ```text
//!   byte_offset ──> ShiftRightLogical 2 ──> AccessChain [buf, 0, index+lane]
//!                                                       │
//!                                           Load/Store/Atomic on uint word
//! ```
//!
//! Wide loads and stores cover 1 to 4 consecutive words, one chain per
//! lane. Values move through the buffer as raw bits: a non-uint result or
//! operand type is a whole-value `OpBitcast`, never a numeric conversion.

use crate::ir::format::{scope, semantics, Op, StorageClass};
use crate::symbols::{ScalarKind, TypeDesc, TypeHandle};

use super::{
    convert_from_uint, pointee, unsupported, FunctionBuilder, LowerContext, LowerError, Value,
};

/// Read-modify-write atomics that share one emission shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicOp {
    Add,
    Min,
    Max,
    And,
    Or,
    Xor,
    Exchange,
}

/// `buffer` as (buffer storage class, writability), rejecting any other
/// pointee.
fn buffer_info(ctx: &LowerContext, buffer: Value) -> Result<(StorageClass, bool), LowerError> {
    let (base, storage) = pointee(ctx, buffer)?;
    match ctx.types.get(base) {
        TypeDesc::ByteBuffer { rw } => Ok((storage, *rw)),
        _ => unsupported(format!(
            "byte-addressed access through {}",
            ctx.types.name(buffer.ty)
        )),
    }
}

/// Word index of `byte_offset`, an unsigned shift so negative bit patterns
/// never index backwards.
fn element_index(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    byte_offset: Value,
) -> Result<Value, LowerError> {
    let uint = ctx.types.uint();
    let two = ctx.const_u32(2)?;
    builder.emit_result(ctx, Op::ShiftRightLogical, uint, &[byte_offset.id, two.id])
}

/// Chain to the word at `element` plus `lane`.
fn element_pointer(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    buffer: Value,
    element: Value,
    storage: StorageClass,
    lane: u32,
) -> Result<Value, LowerError> {
    let uint = ctx.types.uint();
    let index = if lane == 0 {
        element
    } else {
        let step = ctx.const_u32(lane)?;
        builder.emit_result(ctx, Op::IAdd, uint, &[element.id, step.id])?
    };
    let zero = ctx.const_u32(0)?;
    let ptr_uint = ctx.types.pointer(uint, storage);
    builder.emit_result(
        ctx,
        Op::AccessChain,
        ptr_uint,
        &[buffer.id, zero.id, index.id],
    )
}

/// Load 1 to 4 consecutive words starting at `byte_offset`, reinterpreted
/// as `result_ty`. A status output is not representable here and fails
/// fast.
pub fn load(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    buffer: Value,
    byte_offset: Value,
    result_ty: TypeHandle,
    status: Option<Value>,
) -> Result<Value, LowerError> {
    if status.is_some() {
        return unsupported("byte-addressed buffer load with a status output");
    }
    let (storage, _) = buffer_info(ctx, buffer)?;
    let Some(lanes) = ctx.types.component_count(result_ty) else {
        return unsupported(format!(
            "byte-addressed buffer load into {}",
            ctx.types.name(result_ty)
        ));
    };
    if lanes == 0 || lanes > 4 {
        return unsupported(format!("byte-addressed buffer load of {lanes} lanes"));
    }

    let uint = ctx.types.uint();
    let element = element_index(ctx, builder, byte_offset)?;
    let mut lane_ids = Vec::with_capacity(lanes as usize);
    for lane in 0..lanes as u32 {
        let ptr = element_pointer(ctx, builder, buffer, element, storage, lane)?;
        let word = builder.emit_result(ctx, Op::Load, uint, &[ptr.id])?;
        lane_ids.push(word.id);
    }

    let raw_ty = ctx.types.scalar_or_vector(uint, lanes);
    let raw = if lanes == 1 {
        Value {
            id: lane_ids[0],
            ty: raw_ty,
        }
    } else {
        builder.emit_result(ctx, Op::CompositeConstruct, raw_ty, &lane_ids)?
    };

    if ctx.types.scalar_kind(result_ty) == Some(ScalarKind::UInt) {
        Ok(raw)
    } else {
        builder.emit_result(ctx, Op::Bitcast, result_ty, &[raw.id])
    }
}

/// Store the raw bits of `value` (1 to 4 lanes) starting at `byte_offset`.
pub fn store(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    buffer: Value,
    byte_offset: Value,
    value: Value,
) -> Result<(), LowerError> {
    let (storage, rw) = buffer_info(ctx, buffer)?;
    if !rw {
        return unsupported("store to a read-only byte-addressed buffer");
    }
    let Some(lanes) = ctx.types.component_count(value.ty) else {
        return unsupported(format!(
            "byte-addressed buffer store of {}",
            ctx.types.name(value.ty)
        ));
    };
    if lanes == 0 || lanes > 4 {
        return unsupported(format!("byte-addressed buffer store of {lanes} lanes"));
    }

    let uint = ctx.types.uint();
    let raw = if ctx.types.scalar_kind(value.ty) == Some(ScalarKind::UInt) {
        value
    } else {
        let raw_ty = ctx.types.scalar_or_vector(uint, lanes);
        builder.emit_result(ctx, Op::Bitcast, raw_ty, &[value.id])?
    };

    let element = element_index(ctx, builder, byte_offset)?;
    for lane in 0..lanes as u32 {
        let word = if lanes == 1 {
            raw
        } else {
            builder.emit_result(ctx, Op::CompositeExtract, uint, &[raw.id, lane])?
        };
        let ptr = element_pointer(ctx, builder, buffer, element, storage, lane)?;
        builder.emit(Op::Store, None, None, &[ptr.id, word.id]);
    }
    Ok(())
}

/// Store the buffer size in bytes through `out`: the runtime array length
/// times four.
pub fn get_dimensions(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    buffer: Value,
    out: Value,
) -> Result<(), LowerError> {
    buffer_info(ctx, buffer)?;
    let (out_ty, _) = pointee(ctx, out)?;

    let uint = ctx.types.uint();
    let count = builder.emit_result(ctx, Op::ArrayLength, uint, &[buffer.id, 0])?;
    let four = ctx.const_u32(4)?;
    let bytes = builder.emit_result(ctx, Op::IMul, uint, &[count.id, four.id])?;
    let result = convert_from_uint(ctx, builder, bytes, out_ty)?;
    builder.emit(Op::Store, None, None, &[out.id, result.id]);
    Ok(())
}

/// Scope and semantics constant ids shared by every atomic form. Device
/// scope, relaxed ordering.
fn atomic_scope(
    ctx: &mut LowerContext,
) -> Result<(Value, Value), LowerError> {
    let scope = ctx.const_u32(scope::DEVICE)?;
    let sem = ctx.const_u32(semantics::RELAXED)?;
    Ok((scope, sem))
}

/// Pointer to the single word an atomic operates on, rejecting read-only
/// buffers.
fn atomic_pointer(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    buffer: Value,
    byte_offset: Value,
) -> Result<Value, LowerError> {
    let (storage, rw) = buffer_info(ctx, buffer)?;
    if !rw {
        return unsupported("atomic on a read-only byte-addressed buffer");
    }
    let element = element_index(ctx, builder, byte_offset)?;
    element_pointer(ctx, builder, buffer, element, storage, 0)
}

/// One read-modify-write atomic on the word at `byte_offset`. When
/// `original` is given, the pre-operation value is converted to its
/// pointee type and stored through it; otherwise the result is dropped.
pub fn atomic(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    op: AtomicOp,
    buffer: Value,
    byte_offset: Value,
    value: Value,
    original: Option<Value>,
) -> Result<(), LowerError> {
    let kind = ctx.types.scalar_kind(value.ty);
    let opcode = match (op, kind) {
        (AtomicOp::Add, _) => Op::AtomicIAdd,
        (AtomicOp::Min, Some(ScalarKind::Int)) => Op::AtomicSMin,
        (AtomicOp::Min, Some(ScalarKind::UInt)) => Op::AtomicUMin,
        (AtomicOp::Max, Some(ScalarKind::Int)) => Op::AtomicSMax,
        (AtomicOp::Max, Some(ScalarKind::UInt)) => Op::AtomicUMax,
        (AtomicOp::And, _) => Op::AtomicAnd,
        (AtomicOp::Or, _) => Op::AtomicOr,
        (AtomicOp::Xor, _) => Op::AtomicXor,
        (AtomicOp::Exchange, _) => Op::AtomicExchange,
        (AtomicOp::Min | AtomicOp::Max, _) => {
            return unsupported(format!(
                "atomic {op:?} on {}",
                ctx.types.name(value.ty)
            ));
        }
    };
    if kind.is_none() || kind == Some(ScalarKind::Float) || kind == Some(ScalarKind::Bool) {
        return unsupported(format!("atomic {op:?} on {}", ctx.types.name(value.ty)));
    }

    let ptr = atomic_pointer(ctx, builder, buffer, byte_offset)?;
    let (scope, sem) = atomic_scope(ctx)?;
    let uint = ctx.types.uint();
    let previous = builder.emit_result(
        ctx,
        opcode,
        uint,
        &[ptr.id, scope.id, sem.id, value.id],
    )?;

    if let Some(out) = original {
        let (out_ty, _) = pointee(ctx, out)?;
        let converted = convert_from_uint(ctx, builder, previous, out_ty)?;
        builder.emit(Op::Store, None, None, &[out.id, converted.id]);
    }
    Ok(())
}

/// Compare-and-swap reporting the original word through `original`. The
/// unequal path carries the same relaxed semantics as the equal path.
pub fn compare_exchange(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    buffer: Value,
    byte_offset: Value,
    comparator: Value,
    value: Value,
    original: Value,
) -> Result<(), LowerError> {
    let previous = emit_compare_exchange(ctx, builder, buffer, byte_offset, comparator, value)?;
    let (out_ty, _) = pointee(ctx, original)?;
    let converted = convert_from_uint(ctx, builder, previous, out_ty)?;
    builder.emit(Op::Store, None, None, &[original.id, converted.id]);
    Ok(())
}

/// Compare-and-swap with the original value discarded.
pub fn compare_store(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    buffer: Value,
    byte_offset: Value,
    comparator: Value,
    value: Value,
) -> Result<(), LowerError> {
    emit_compare_exchange(ctx, builder, buffer, byte_offset, comparator, value)?;
    Ok(())
}

fn emit_compare_exchange(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    buffer: Value,
    byte_offset: Value,
    comparator: Value,
    value: Value,
) -> Result<Value, LowerError> {
    let ptr = atomic_pointer(ctx, builder, buffer, byte_offset)?;
    let (scope, sem) = atomic_scope(ctx)?;
    let uint = ctx.types.uint();
    builder.emit_result(
        ctx,
        Op::AtomicCompareExchange,
        uint,
        &[ptr.id, scope.id, sem.id, sem.id, value.id, comparator.id],
    )
}

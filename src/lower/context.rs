//! The builder/context pair consumed by the lowering routines.
//!
//! [`LowerContext`] owns what is global to a module: the type registry, the
//! id watermark (which becomes the header bound), the memoized type and
//! constant ids, and the writer holding type/constant/decoration
//! instructions. [`FunctionBuilder`] is the per-function half: a word
//! writer plus the convenience of allocating a result id and registering a
//! result type in one step. Keeping the two streams separate means the
//! assembled module genuinely needs the ordering pass only when someone
//! appends out of order, not because emission itself interleaved sections.

use std::collections::HashMap;

use crate::ir::buffer::{ModuleWriter, WordPool};
use crate::ir::format::{Decoration, Op, StorageClass};
use crate::symbols::{ScalarKind, TypeDesc, TypeHandle, TypeRegistry};

use super::{LowerError, Value};

/// Module-global lowering state.
pub struct LowerContext {
    pub types: TypeRegistry,
    bound: u32,
    type_ids: HashMap<TypeHandle, u32>,
    const_ids: HashMap<(TypeHandle, u32), u32>,
    globals: ModuleWriter,
}

impl LowerContext {
    /// Fresh context; ids start at 1, as id 0 is never valid.
    pub fn new() -> Self {
        Self::with_writer(ModuleWriter::new())
    }

    /// Fresh context whose global stream borrows its store from `pool`.
    pub fn with_pool(pool: &WordPool) -> Self {
        Self::with_writer(pool.acquire())
    }

    fn with_writer(globals: ModuleWriter) -> Self {
        Self {
            types: TypeRegistry::new(),
            bound: 1,
            type_ids: HashMap::new(),
            const_ids: HashMap::new(),
            globals,
        }
    }

    /// Allocate a fresh id, advancing the bound watermark.
    pub fn fresh_id(&mut self) -> u32 {
        let id = self.bound;
        self.bound += 1;
        id
    }

    /// One past the highest id handed out so far.
    pub fn bound(&self) -> u32 {
        self.bound
    }

    /// The type/constant/decoration instruction stream.
    pub fn globals(&self) -> &[u32] {
        self.globals.words()
    }

    /// Id of a type, declaring it (and its dependencies) on first use.
    pub fn type_id(&mut self, handle: TypeHandle) -> Result<u32, LowerError> {
        if let Some(&id) = self.type_ids.get(&handle) {
            return Ok(id);
        }
        let desc = self.types.get(handle).clone();
        let id = match desc {
            TypeDesc::Void => self.declare_type(handle, Op::TypeVoid, &[]),
            TypeDesc::Scalar(ScalarKind::Bool) => self.declare_type(handle, Op::TypeBool, &[]),
            TypeDesc::Scalar(ScalarKind::Int) => {
                self.declare_type(handle, Op::TypeInt, &[32, 1])
            }
            TypeDesc::Scalar(ScalarKind::UInt) => {
                self.declare_type(handle, Op::TypeInt, &[32, 0])
            }
            TypeDesc::Scalar(ScalarKind::Float) => {
                self.declare_type(handle, Op::TypeFloat, &[32])
            }
            TypeDesc::Vector { base, size } => {
                let base_id = self.type_id(base)?;
                self.declare_type(handle, Op::TypeVector, &[base_id, size as u32])
            }
            TypeDesc::Matrix { column, columns } => {
                let column_id = self.type_id(column)?;
                self.declare_type(handle, Op::TypeMatrix, &[column_id, columns as u32])
            }
            TypeDesc::Array {
                element,
                length: Some(length),
            } => {
                let element_id = self.type_id(element)?;
                let length_id = self.const_u32(length)?.id;
                self.declare_type(handle, Op::TypeArray, &[element_id, length_id])
            }
            TypeDesc::Array {
                element,
                length: None,
            } => {
                let element_id = self.type_id(element)?;
                self.declare_type(handle, Op::TypeRuntimeArray, &[element_id])
            }
            TypeDesc::Struct { members, .. } => {
                let mut member_ids = Vec::with_capacity(members.len());
                for (_, member) in &members {
                    member_ids.push(self.type_id(*member)?);
                }
                self.declare_type(handle, Op::TypeStruct, &member_ids)
            }
            TypeDesc::Sampler => self.declare_type(handle, Op::TypeSampler, &[]),
            TypeDesc::Texture {
                sampled,
                dim,
                arrayed,
                multisampled,
                rw,
            } => {
                let sampled_id = self.type_id(sampled)?;
                self.declare_type(
                    handle,
                    Op::TypeImage,
                    &[
                        sampled_id,
                        dim as u32,
                        0, // no depth-comparison hint
                        arrayed as u32,
                        multisampled as u32,
                        if rw { 2 } else { 1 },
                        0, // format Unknown
                    ],
                )
            }
            TypeDesc::SampledImage { image } => {
                let image_id = self.type_id(image)?;
                self.declare_type(handle, Op::TypeSampledImage, &[image_id])
            }
            TypeDesc::ByteBuffer { rw } => self.declare_byte_buffer(handle, rw)?,
            TypeDesc::Pointer { base, storage } => {
                let base_id = self.type_id(base)?;
                self.declare_type(handle, Op::TypePointer, &[storage as u32, base_id])
            }
        };
        Ok(id)
    }

    fn declare_type(&mut self, handle: TypeHandle, op: Op, operands: &[u32]) -> u32 {
        let id = self.fresh_id();
        self.globals.instruction(op, None, Some(id), operands);
        self.type_ids.insert(handle, id);
        id
    }

    /// A byte-addressed buffer is a block-decorated struct wrapping one
    /// runtime array of uint with a 4-byte stride.
    fn declare_byte_buffer(&mut self, handle: TypeHandle, rw: bool) -> Result<u32, LowerError> {
        let uint = self.types.uint();
        let words = self.types.intern(TypeDesc::Array {
            element: uint,
            length: None,
        });
        let words_id = self.type_id(words)?;
        let id = self.declare_type(handle, Op::TypeStruct, &[words_id]);

        self.globals.instruction(
            Op::Decorate,
            None,
            None,
            &[words_id, Decoration::ArrayStride as u32, 4],
        );
        self.globals.instruction(
            Op::MemberDecorate,
            None,
            None,
            &[id, 0, Decoration::Offset as u32, 0],
        );
        self.globals
            .instruction(Op::Decorate, None, None, &[id, Decoration::BufferBlock as u32]);
        if !rw {
            self.globals.instruction(
                Op::MemberDecorate,
                None,
                None,
                &[id, 0, Decoration::NonWritable as u32],
            );
        }
        Ok(id)
    }

    /// Compile an unsigned literal to a constant id, memoized by value.
    pub fn const_u32(&mut self, value: u32) -> Result<Value, LowerError> {
        let ty = self.types.uint();
        self.constant(ty, value)
    }

    pub fn const_i32(&mut self, value: i32) -> Result<Value, LowerError> {
        let ty = self.types.int();
        self.constant(ty, value as u32)
    }

    pub fn const_f32(&mut self, value: f32) -> Result<Value, LowerError> {
        let ty = self.types.float();
        self.constant(ty, value.to_bits())
    }

    fn constant(&mut self, ty: TypeHandle, bits: u32) -> Result<Value, LowerError> {
        if let Some(&id) = self.const_ids.get(&(ty, bits)) {
            return Ok(Value { id, ty });
        }
        let type_id = self.type_id(ty)?;
        let id = self.fresh_id();
        self.globals
            .instruction(Op::Constant, Some(type_id), Some(id), &[bits]);
        self.const_ids.insert((ty, bits), id);
        Ok(Value { id, ty })
    }

    /// Declare a module-scope variable of `ty` in `storage`, returning its
    /// pointer-typed value.
    pub fn global_variable(
        &mut self,
        ty: TypeHandle,
        storage: StorageClass,
    ) -> Result<Value, LowerError> {
        let ptr_ty = self.types.pointer(ty, storage);
        let ptr_ty_id = self.type_id(ptr_ty)?;
        let id = self.fresh_id();
        self.globals
            .instruction(Op::Variable, Some(ptr_ty_id), Some(id), &[storage as u32]);
        Ok(Value { id, ty: ptr_ty })
    }

    /// Assemble header + globals + `body` into one finished module.
    pub fn assemble(&self, body: &[u32]) -> Vec<u32> {
        let mut writer = ModuleWriter::new();
        writer.begin_module();
        writer.extend(self.globals.words());
        writer.extend(body);
        writer.finish(self.bound).to_vec()
    }
}

impl Default for LowerContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-function instruction stream.
pub struct FunctionBuilder {
    code: ModuleWriter,
}

impl FunctionBuilder {
    pub fn new() -> Self {
        Self {
            code: ModuleWriter::new(),
        }
    }

    /// Builder whose store is borrowed from `pool`.
    pub fn with_pool(pool: &WordPool) -> Self {
        Self {
            code: pool.acquire(),
        }
    }

    /// Append one encoded instruction.
    pub fn emit(&mut self, op: Op, result_type: Option<u32>, result: Option<u32>, operands: &[u32]) {
        self.code.instruction(op, result_type, result, operands);
    }

    /// Append an instruction that produces a value: registers `ty`,
    /// allocates the result id, and returns both as a [`Value`].
    pub fn emit_result(
        &mut self,
        ctx: &mut LowerContext,
        op: Op,
        ty: TypeHandle,
        operands: &[u32],
    ) -> Result<Value, LowerError> {
        let type_id = ctx.type_id(ty)?;
        let id = ctx.fresh_id();
        self.code.instruction(op, Some(type_id), Some(id), operands);
        Ok(Value { id, ty })
    }

    pub fn words(&self) -> &[u32] {
        self.code.words()
    }
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::reader::SequentialIter;
    use crate::ir::ModuleBuffer;

    #[test]
    fn test_type_ids_are_memoized() {
        let mut ctx = LowerContext::new();
        let float = ctx.types.float();
        let float3 = ctx.types.vector(float, 3);
        let a = ctx.type_id(float3).unwrap();
        let b = ctx.type_id(float3).unwrap();
        assert_eq!(a, b);
        // One OpTypeFloat and one OpTypeVector, nothing duplicated.
        let ops: Vec<_> = SequentialIter::new(ctx.globals())
            .map(|r| r.unwrap().opcode.unwrap())
            .collect();
        assert_eq!(ops, vec![Op::TypeFloat, Op::TypeVector]);
    }

    #[test]
    fn test_constants_are_memoized() {
        let mut ctx = LowerContext::new();
        let a = ctx.const_u32(4).unwrap();
        let b = ctx.const_u32(4).unwrap();
        let c = ctx.const_u32(5).unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        // Same bits under a different type is a different constant.
        let d = ctx.const_i32(4).unwrap();
        assert_ne!(a.id, d.id);
    }

    #[test]
    fn test_bound_tracks_allocations() {
        let mut ctx = LowerContext::new();
        assert_eq!(ctx.bound(), 1);
        let first = ctx.fresh_id();
        assert_eq!(first, 1);
        ctx.const_u32(7).unwrap();
        assert!(ctx.bound() > 2); // type id + constant id
    }

    #[test]
    fn test_byte_buffer_declaration_shape() {
        let mut ctx = LowerContext::new();
        let buf = ctx.types.intern(TypeDesc::ByteBuffer { rw: true });
        ctx.type_id(buf).unwrap();
        let ops: Vec<_> = SequentialIter::new(ctx.globals())
            .map(|r| r.unwrap().opcode.unwrap())
            .collect();
        assert_eq!(
            ops,
            vec![
                Op::TypeInt,
                Op::TypeRuntimeArray,
                Op::TypeStruct,
                Op::Decorate,       // ArrayStride
                Op::MemberDecorate, // Offset
                Op::Decorate,       // BufferBlock
            ]
        );
    }

    #[test]
    fn test_assemble_is_a_valid_module() {
        let mut ctx = LowerContext::new();
        let mut builder = FunctionBuilder::new();
        let uint = ctx.types.uint();
        let four = ctx.const_u32(4).unwrap();
        builder
            .emit_result(&mut ctx, Op::IAdd, uint, &[four.id, four.id])
            .unwrap();

        let words = ctx.assemble(builder.words());
        let module = ModuleBuffer::new(&words).unwrap();
        assert_eq!(module.bound(), ctx.bound());
        let count = module.instructions().filter(|r| r.is_ok()).count();
        assert_eq!(count, 3); // OpTypeInt, OpConstant, OpIAdd
    }
}

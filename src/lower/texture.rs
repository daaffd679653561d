//! Lowering for texture intrinsics.
//!
//! The routines here take already-loaded image and sampler values; the
//! caller is responsible for `OpLoad`ing its globals first. Three shapes of
//! emission come out of this module:
//!
//! ```text
//!   Load            coord+mip ──> extract mip, truncate coord ──> OpImageFetch
//!   Sample family   image + sampler ──> OpSampledImage ──> OpImageSample*Lod
//!   GetDimensions   OpImageQuerySize[Lod] ──> per-component extract + store
//! ```
//!
//! Fetched coordinates carry the mip level as a trailing component, so the
//! level is peeled off with `OpCompositeExtract` and the coordinate is
//! truncated with `OpVectorShuffle` before it ever reaches the image
//! instruction. Every shape and argument combination outside the ones
//! spelled out below fails fast with [`LowerError::UnsupportedFeature`].

use crate::ir::format::{image_operands, Dim, Op};
use crate::symbols::{ScalarKind, TypeDesc, TypeHandle};

use super::{
    convert_from_uint, pointee, unsupported, FunctionBuilder, LowerContext, LowerError, Value,
};

#[derive(Debug, Clone, Copy)]
struct Shape {
    sampled: TypeHandle,
    dim: Dim,
    arrayed: bool,
    multisampled: bool,
    rw: bool,
}

impl Shape {
    /// Coordinate components before the array layer.
    fn natural_comps(self) -> u8 {
        match self.dim {
            Dim::D1 => 1,
            Dim::D2 => 2,
            Dim::D3 => 3,
            Dim::Cube => 3,
        }
    }

    /// Coordinate components including the array layer.
    fn access_comps(self) -> u8 {
        self.natural_comps() + self.arrayed as u8
    }

    /// Components reported by a dimension query. A cube face is queried as
    /// a 2D extent.
    fn query_comps(self) -> u8 {
        let base = match self.dim {
            Dim::D1 => 1,
            Dim::D2 | Dim::Cube => 2,
            Dim::D3 => 3,
        };
        base + self.arrayed as u8
    }
}

fn shape_of(ctx: &LowerContext, texture: Value) -> Result<Shape, LowerError> {
    match ctx.types.get(texture.ty) {
        TypeDesc::Texture {
            sampled,
            dim,
            arrayed,
            multisampled,
            rw,
        } => Ok(Shape {
            sampled: *sampled,
            dim: *dim,
            arrayed: *arrayed,
            multisampled: *multisampled,
            rw: *rw,
        }),
        _ => unsupported(format!(
            "texture access through {}",
            ctx.types.name(texture.ty)
        )),
    }
}

/// Operand tail for an image instruction: the mask word followed by the
/// words of each present qualifier in bit order. All absent emits nothing.
fn operand_tail(lod: Option<u32>, offset: Option<u32>, sample: Option<u32>) -> Vec<u32> {
    let mut mask = 0;
    let mut operands = Vec::with_capacity(3);
    if let Some(id) = lod {
        mask |= image_operands::LOD;
        operands.push(id);
    }
    if let Some(id) = offset {
        mask |= image_operands::CONST_OFFSET;
        operands.push(id);
    }
    if let Some(id) = sample {
        mask |= image_operands::SAMPLE;
        operands.push(id);
    }
    if mask == 0 {
        return Vec::new();
    }
    let mut words = Vec::with_capacity(1 + operands.len());
    words.push(mask);
    words.extend(operands);
    words
}

/// Peel the trailing mip component off `coord`, returning the truncated
/// access coordinate and the mip level.
fn split_mip(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    coord: Value,
    access_comps: u8,
) -> Result<(Value, Value), LowerError> {
    let base = match ctx.types.scalar_kind(coord.ty) {
        Some(ScalarKind::Int) => ctx.types.int(),
        Some(ScalarKind::UInt) => ctx.types.uint(),
        _ => {
            return unsupported(format!(
                "fetch coordinate of type {}",
                ctx.types.name(coord.ty)
            ))
        }
    };
    if ctx.types.component_count(coord.ty) != Some(access_comps + 1) {
        return unsupported(format!(
            "fetch coordinate {} for a {}-component access",
            ctx.types.name(coord.ty),
            access_comps
        ));
    }

    let mip = builder.emit_result(
        ctx,
        Op::CompositeExtract,
        base,
        &[coord.id, access_comps as u32],
    )?;
    let access = if access_comps == 1 {
        builder.emit_result(ctx, Op::CompositeExtract, base, &[coord.id, 0])?
    } else {
        let access_ty = ctx.types.vector(base, access_comps);
        let mut operands = vec![coord.id, coord.id];
        operands.extend(0..access_comps as u32);
        builder.emit_result(ctx, Op::VectorShuffle, access_ty, &operands)?
    };
    Ok((access, mip))
}

/// Texel fetch. Read-write textures read directly; multisampled textures
/// fetch at the coordinate with the sample index in the operand tail;
/// single-sampled textures carry the mip level as the trailing coordinate
/// component, which is split off before the fetch. An optional texel
/// offset rides in the tail. A status output is not representable and
/// fails fast.
pub fn load(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    texture: Value,
    coord: Value,
    sample_index: Option<Value>,
    offset: Option<Value>,
    status: Option<Value>,
) -> Result<Value, LowerError> {
    if status.is_some() {
        return unsupported("texture load with a status output");
    }
    let shape = shape_of(ctx, texture)?;
    if shape.dim == Dim::Cube {
        return unsupported("texture load on a cube shape");
    }
    let result_ty = ctx.types.vector(shape.sampled, 4);

    if shape.rw {
        if sample_index.is_some() || offset.is_some() {
            return unsupported("qualified load on a read-write texture");
        }
        if ctx.types.component_count(coord.ty) != Some(shape.access_comps()) {
            return unsupported(format!(
                "load coordinate {} for a {}-component access",
                ctx.types.name(coord.ty),
                shape.access_comps()
            ));
        }
        return builder.emit_result(ctx, Op::ImageRead, result_ty, &[texture.id, coord.id]);
    }

    if shape.multisampled {
        // No mip dimension to address; the sample index picks the slot.
        let Some(sample) = sample_index else {
            return unsupported("multisampled load without a sample index");
        };
        if ctx.types.component_count(coord.ty) != Some(shape.access_comps()) {
            return unsupported(format!(
                "load coordinate {} for a {}-component access",
                ctx.types.name(coord.ty),
                shape.access_comps()
            ));
        }
        let mut operands = vec![texture.id, coord.id];
        operands.extend(operand_tail(
            None,
            offset.map(|o| o.id),
            Some(sample.id),
        ));
        return builder.emit_result(ctx, Op::ImageFetch, result_ty, &operands);
    }

    if sample_index.is_some() {
        return unsupported("sample index on a single-sampled texture");
    }
    let (access, mip) = split_mip(ctx, builder, coord, shape.access_comps())?;
    let mut operands = vec![texture.id, access.id];
    operands.extend(operand_tail(Some(mip.id), offset.map(|o| o.id), None));
    builder.emit_result(ctx, Op::ImageFetch, result_ty, &operands)
}

fn combine(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    texture: Value,
    sampler: Value,
) -> Result<Value, LowerError> {
    if !matches!(ctx.types.get(sampler.ty), TypeDesc::Sampler) {
        return unsupported(format!(
            "sampling with {} as the sampler",
            ctx.types.name(sampler.ty)
        ));
    }
    let combined_ty = ctx.types.intern(TypeDesc::SampledImage { image: texture.ty });
    builder.emit_result(
        ctx,
        Op::SampledImage,
        combined_ty,
        &[texture.id, sampler.id],
    )
}

fn sampleable(ctx: &LowerContext, shape: Shape) -> Result<(), LowerError> {
    if shape.rw || shape.multisampled {
        return unsupported("sampling a read-write or multisampled texture");
    }
    if ctx.types.scalar_kind(shape.sampled) != Some(ScalarKind::Float) {
        return unsupported(format!(
            "sampling a texture of {}",
            ctx.types.name(shape.sampled)
        ));
    }
    Ok(())
}

/// Sample at the implicitly computed level of detail, with an optional
/// texel offset.
pub fn sample(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    texture: Value,
    sampler: Value,
    coord: Value,
    offset: Option<Value>,
) -> Result<Value, LowerError> {
    let shape = shape_of(ctx, texture)?;
    sampleable(ctx, shape)?;
    let combined = combine(ctx, builder, texture, sampler)?;
    let result_ty = ctx.types.vector(shape.sampled, 4);
    let mut operands = vec![combined.id, coord.id];
    operands.extend(operand_tail(None, offset.map(|o| o.id), None));
    builder.emit_result(ctx, Op::ImageSampleImplicitLod, result_ty, &operands)
}

/// Sample at an explicit level of detail. An integer level is converted to
/// float first.
pub fn sample_level(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    texture: Value,
    sampler: Value,
    coord: Value,
    level: Value,
    offset: Option<Value>,
) -> Result<Value, LowerError> {
    let shape = shape_of(ctx, texture)?;
    sampleable(ctx, shape)?;
    let level = to_float(ctx, builder, level)?;
    let combined = combine(ctx, builder, texture, sampler)?;
    let result_ty = ctx.types.vector(shape.sampled, 4);
    let mut operands = vec![combined.id, coord.id];
    operands.extend(operand_tail(Some(level.id), offset.map(|o| o.id), None));
    builder.emit_result(ctx, Op::ImageSampleExplicitLod, result_ty, &operands)
}

/// Depth-comparison sample at the implicit level of detail. The result is
/// the scalar comparison value.
pub fn sample_cmp(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    texture: Value,
    sampler: Value,
    coord: Value,
    dref: Value,
    offset: Option<Value>,
) -> Result<Value, LowerError> {
    let shape = shape_of(ctx, texture)?;
    sampleable(ctx, shape)?;
    let combined = combine(ctx, builder, texture, sampler)?;
    let mut operands = vec![combined.id, coord.id, dref.id];
    operands.extend(operand_tail(None, offset.map(|o| o.id), None));
    builder.emit_result(ctx, Op::ImageSampleDrefImplicitLod, shape.sampled, &operands)
}

/// Depth-comparison sample pinned to the base level: the explicit-lod form
/// with a synthesized literal 0.0 level.
pub fn sample_cmp_level_zero(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    texture: Value,
    sampler: Value,
    coord: Value,
    dref: Value,
    offset: Option<Value>,
) -> Result<Value, LowerError> {
    let shape = shape_of(ctx, texture)?;
    sampleable(ctx, shape)?;
    let zero = ctx.const_f32(0.0)?;
    let combined = combine(ctx, builder, texture, sampler)?;
    let mut operands = vec![combined.id, coord.id, dref.id];
    operands.extend(operand_tail(Some(zero.id), offset.map(|o| o.id), None));
    builder.emit_result(ctx, Op::ImageSampleDrefExplicitLod, shape.sampled, &operands)
}

fn to_float(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    value: Value,
) -> Result<Value, LowerError> {
    let float = ctx.types.float();
    match ctx.types.scalar_kind(value.ty) {
        Some(ScalarKind::Float) => Ok(value),
        Some(ScalarKind::Int) => builder.emit_result(ctx, Op::ConvertSToF, float, &[value.id]),
        Some(ScalarKind::UInt) => builder.emit_result(ctx, Op::ConvertUToF, float, &[value.id]),
        _ => unsupported(format!(
            "level of detail of type {}",
            ctx.types.name(value.ty)
        )),
    }
}

/// Dimension query. `size_outs` receives one extent component per output
/// pointer in query order, so a 2D array writes width, height, then the
/// layer count. `levels_out` and `samples_out` add the mip and sample
/// count queries when present.
pub fn get_dimensions(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    texture: Value,
    level: Option<Value>,
    size_outs: &[Value],
    levels_out: Option<Value>,
    samples_out: Option<Value>,
) -> Result<(), LowerError> {
    let shape = shape_of(ctx, texture)?;
    let comps = shape.query_comps();
    if size_outs.len() != comps as usize {
        return unsupported(format!(
            "dimension query with {} outputs on a {}-component shape",
            size_outs.len(),
            comps
        ));
    }
    if level.is_some() && (shape.rw || shape.multisampled) {
        return unsupported("per-level dimension query on a read-write or multisampled texture");
    }
    if samples_out.is_some() && !shape.multisampled {
        return unsupported("sample-count query on a single-sampled texture");
    }
    if levels_out.is_some() && (shape.rw || shape.multisampled) {
        return unsupported("mip-count query on a read-write or multisampled texture");
    }

    let uint = ctx.types.uint();
    let size_ty = ctx.types.scalar_or_vector(uint, comps);
    let size = match level {
        Some(level) => builder.emit_result(
            ctx,
            Op::ImageQuerySizeLod,
            size_ty,
            &[texture.id, level.id],
        )?,
        None => builder.emit_result(ctx, Op::ImageQuerySize, size_ty, &[texture.id])?,
    };

    for (index, out) in size_outs.iter().enumerate() {
        let component = if comps == 1 {
            size
        } else {
            builder.emit_result(ctx, Op::CompositeExtract, uint, &[size.id, index as u32])?
        };
        write_out(ctx, builder, component, *out)?;
    }
    if let Some(out) = levels_out {
        let levels = builder.emit_result(ctx, Op::ImageQueryLevels, uint, &[texture.id])?;
        write_out(ctx, builder, levels, out)?;
    }
    if let Some(out) = samples_out {
        let samples = builder.emit_result(ctx, Op::ImageQuerySamples, uint, &[texture.id])?;
        write_out(ctx, builder, samples, out)?;
    }
    Ok(())
}

fn write_out(
    ctx: &mut LowerContext,
    builder: &mut FunctionBuilder,
    value: Value,
    out: Value,
) -> Result<(), LowerError> {
    let (out_ty, _) = pointee(ctx, out)?;
    let converted = convert_from_uint(ctx, builder, value, out_ty)?;
    builder.emit(Op::Store, None, None, &[out.id, converted.id]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::format::StorageClass;
    use crate::ir::reader::{Instr, SequentialIter};

    fn texture_value(ctx: &mut LowerContext, dim: Dim, arrayed: bool, rw: bool) -> Value {
        let float = ctx.types.float();
        let ty = ctx.types.intern(TypeDesc::Texture {
            sampled: float,
            dim,
            arrayed,
            multisampled: false,
            rw,
        });
        Value {
            id: ctx.fresh_id(),
            ty,
        }
    }

    fn ms_texture_value(ctx: &mut LowerContext, dim: Dim) -> Value {
        let float = ctx.types.float();
        let ty = ctx.types.intern(TypeDesc::Texture {
            sampled: float,
            dim,
            arrayed: false,
            multisampled: true,
            rw: false,
        });
        Value {
            id: ctx.fresh_id(),
            ty,
        }
    }

    fn sampler_value(ctx: &mut LowerContext) -> Value {
        let ty = ctx.types.intern(TypeDesc::Sampler);
        Value {
            id: ctx.fresh_id(),
            ty,
        }
    }

    fn instrs(words: &[u32]) -> Vec<Instr<'_>> {
        SequentialIter::new(words).map(|r| r.unwrap()).collect()
    }

    fn opcodes(words: &[u32]) -> Vec<Op> {
        instrs(words).iter().map(|i| i.opcode.unwrap()).collect()
    }

    #[test]
    fn test_fetch_peels_the_mip_level_off_the_coordinate() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 3),
        };
        load(&mut ctx, &mut b, tex, coord, None, None, None).unwrap();

        let seq = instrs(b.words());
        assert_eq!(
            opcodes(b.words()),
            vec![Op::CompositeExtract, Op::VectorShuffle, Op::ImageFetch]
        );
        // The mip extract reads component 2, the shuffle keeps 0 and 1.
        assert_eq!(seq[0].words()[4], 2);
        assert_eq!(&seq[1].words()[5..], &[0, 1]);
        // The fetch coordinate is the truncated shuffle, never the raw
        // three-component value, and the level rides in the operand tail.
        let fetch = &seq[2];
        let mip_id = seq[0].result_id().unwrap();
        let access_id = seq[1].result_id().unwrap();
        assert_eq!(fetch.words()[4], access_id);
        assert_eq!(fetch.words()[5], image_operands::LOD);
        assert_eq!(fetch.words()[6], mip_id);
    }

    #[test]
    fn test_fetch_from_a_1d_texture_extracts_both_components() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D1, false, false);
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 2),
        };
        load(&mut ctx, &mut b, tex, coord, None, None, None).unwrap();
        assert_eq!(
            opcodes(b.words()),
            vec![Op::CompositeExtract, Op::CompositeExtract, Op::ImageFetch]
        );
    }

    #[test]
    fn test_read_write_load_reads_directly() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, true);
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 2),
        };
        load(&mut ctx, &mut b, tex, coord, None, None, None).unwrap();
        assert_eq!(opcodes(b.words()), vec![Op::ImageRead]);
    }

    #[test]
    fn test_load_rejections() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let cube = texture_value(&mut ctx, Dim::Cube, false, false);
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 4),
        };
        assert!(load(&mut ctx, &mut b, cube, coord, None, None, None).is_err());

        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let uint = ctx.types.uint();
        let status = ctx.global_variable(uint, StorageClass::Function).unwrap();
        let coord3 = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 3),
        };
        assert!(load(&mut ctx, &mut b, tex, coord3, None, None, Some(status)).is_err());
    }

    #[test]
    fn test_sample_combines_image_and_sampler() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let smp = sampler_value(&mut ctx);
        let float = ctx.types.float();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(float, 2),
        };
        let result = sample(&mut ctx, &mut b, tex, smp, coord, None).unwrap();
        assert_eq!(
            opcodes(b.words()),
            vec![Op::SampledImage, Op::ImageSampleImplicitLod]
        );
        assert_eq!(ctx.types.component_count(result.ty), Some(4));
    }

    #[test]
    fn test_sample_level_converts_an_integer_level() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let smp = sampler_value(&mut ctx);
        let float = ctx.types.float();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(float, 2),
        };
        let level = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.int(),
        };
        sample_level(&mut ctx, &mut b, tex, smp, coord, level, None).unwrap();
        let ops = opcodes(b.words());
        assert_eq!(
            ops,
            vec![Op::ConvertSToF, Op::SampledImage, Op::ImageSampleExplicitLod]
        );
        let seq = instrs(b.words());
        let explicit = seq.last().unwrap();
        assert_eq!(explicit.words()[5], image_operands::LOD);
    }

    #[test]
    fn test_sample_cmp_level_zero_synthesizes_the_base_level() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let smp = sampler_value(&mut ctx);
        let float = ctx.types.float();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(float, 2),
        };
        let dref = Value {
            id: ctx.fresh_id(),
            ty: float,
        };
        let result = sample_cmp_level_zero(&mut ctx, &mut b, tex, smp, coord, dref, None).unwrap();
        assert_eq!(result.ty, float);
        let seq = instrs(b.words());
        let instr = seq.last().unwrap();
        assert_eq!(instr.opcode, Some(Op::ImageSampleDrefExplicitLod));
        let zero = ctx.const_f32(0.0).unwrap();
        assert_eq!(instr.words()[6], image_operands::LOD);
        assert_eq!(instr.words()[7], zero.id);
    }

    #[test]
    fn test_2d_array_dimensions_map_positionally() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, true, false);
        let uint = ctx.types.uint();
        let outs = [
            ctx.global_variable(uint, StorageClass::Function).unwrap(),
            ctx.global_variable(uint, StorageClass::Function).unwrap(),
            ctx.global_variable(uint, StorageClass::Function).unwrap(),
        ];
        let level = Value {
            id: ctx.fresh_id(),
            ty: uint,
        };
        get_dimensions(&mut ctx, &mut b, tex, Some(level), &outs, None, None).unwrap();

        let seq = instrs(b.words());
        assert_eq!(seq[0].opcode, Some(Op::ImageQuerySizeLod));
        // Width, height, then the layer count, stored to the outputs in
        // declaration order.
        let stores: Vec<_> = seq
            .iter()
            .filter(|i| i.opcode == Some(Op::Store))
            .map(|i| i.words()[1])
            .collect();
        assert_eq!(stores, vec![outs[0].id, outs[1].id, outs[2].id]);
        let extracts: Vec<_> = seq
            .iter()
            .filter(|i| i.opcode == Some(Op::CompositeExtract))
            .map(|i| i.words()[4])
            .collect();
        assert_eq!(extracts, vec![0, 1, 2]);
    }

    #[test]
    fn test_dimension_query_output_count_must_match_the_shape() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let uint = ctx.types.uint();
        let out = ctx.global_variable(uint, StorageClass::Function).unwrap();
        let err = get_dimensions(&mut ctx, &mut b, tex, None, &[out], None, None).unwrap_err();
        assert!(matches!(err, LowerError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_multisampled_fetch_carries_the_sample_index() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = ms_texture_value(&mut ctx, Dim::D2);
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 2),
        };
        let sample = Value {
            id: ctx.fresh_id(),
            ty: int,
        };
        load(&mut ctx, &mut b, tex, coord, Some(sample), None, None).unwrap();

        // No mip to peel off: the coordinate passes through untouched.
        assert_eq!(opcodes(b.words()), vec![Op::ImageFetch]);
        let seq = instrs(b.words());
        let fetch = &seq[0];
        assert_eq!(fetch.words()[4], coord.id);
        assert_eq!(fetch.words()[5], image_operands::SAMPLE);
        assert_eq!(fetch.words()[6], sample.id);
    }

    #[test]
    fn test_multisampled_fetch_requires_a_sample_index() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = ms_texture_value(&mut ctx, Dim::D2);
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 2),
        };
        let err = load(&mut ctx, &mut b, tex, coord, None, None, None).unwrap_err();
        assert!(matches!(err, LowerError::UnsupportedFeature(_)));
        assert!(b.words().is_empty());
    }

    #[test]
    fn test_fetch_offset_follows_the_level_in_the_tail() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 3),
        };
        let offset = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 2),
        };
        load(&mut ctx, &mut b, tex, coord, None, Some(offset), None).unwrap();

        let seq = instrs(b.words());
        let fetch = seq.last().unwrap();
        assert_eq!(fetch.opcode, Some(Op::ImageFetch));
        // Qualifier words follow the mask in ascending bit order.
        assert_eq!(
            fetch.words()[5],
            image_operands::LOD | image_operands::CONST_OFFSET
        );
        let mip_id = seq[0].result_id().unwrap();
        assert_eq!(fetch.words()[6], mip_id);
        assert_eq!(fetch.words()[7], offset.id);
    }

    #[test]
    fn test_sample_index_on_a_single_sampled_texture_is_rejected() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 3),
        };
        let sample = Value {
            id: ctx.fresh_id(),
            ty: int,
        };
        assert!(load(&mut ctx, &mut b, tex, coord, Some(sample), None, None).is_err());
    }

    #[test]
    fn test_sample_with_an_offset_sets_const_offset() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let smp = sampler_value(&mut ctx);
        let float = ctx.types.float();
        let int = ctx.types.int();
        let coord = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(float, 2),
        };
        let offset = Value {
            id: ctx.fresh_id(),
            ty: ctx.types.vector(int, 2),
        };
        sample(&mut ctx, &mut b, tex, smp, coord, Some(offset)).unwrap();

        let seq = instrs(b.words());
        let sampled = seq.last().unwrap();
        assert_eq!(sampled.opcode, Some(Op::ImageSampleImplicitLod));
        assert_eq!(sampled.words()[5], image_operands::CONST_OFFSET);
        assert_eq!(sampled.words()[6], offset.id);
    }

    #[test]
    fn test_mip_count_query() {
        let mut ctx = LowerContext::new();
        let mut b = FunctionBuilder::new();
        let tex = texture_value(&mut ctx, Dim::D2, false, false);
        let uint = ctx.types.uint();
        let outs = [
            ctx.global_variable(uint, StorageClass::Function).unwrap(),
            ctx.global_variable(uint, StorageClass::Function).unwrap(),
        ];
        let levels = ctx.global_variable(uint, StorageClass::Function).unwrap();
        get_dimensions(&mut ctx, &mut b, tex, None, &outs, Some(levels), None).unwrap();
        let ops = opcodes(b.words());
        assert_eq!(ops[0], Op::ImageQuerySize);
        assert!(ops.contains(&Op::ImageQueryLevels));
    }
}

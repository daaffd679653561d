//! Binary module format: words, opcodes, header, layout sections.
//!
//! Everything in a module is a 32-bit word. An instruction packs its own
//! length next to its opcode, so a stream can be walked without any schema:
//!
//! ```text
//! ┌────────────────────┬────────────────────┐
//! │  Word count        │  Opcode            │   word 0
//! │  bits 16..32       │  bits 0..16        │
//! ├────────────────────┴────────────────────┤
//! │  result type id (when declared)         │   word 1
//! │  result id (when declared)              │   word 2
//! │  operands ...                           │   words 3..word_count
//! └─────────────────────────────────────────┘
//! ```
//!
//! A module starts with a fixed 5-word header:
//!
//! ```text
//! ┌──────────┬──────────┬───────────┬──────────┬──────────┐
//! │  Magic   │ Version  │ Generator │  Bound   │  Schema  │
//! └──────────┴──────────┴───────────┴──────────┴──────────┘
//! ```
//!
//! `bound` is one past the highest id used anywhere in the module and is the
//! allocator watermark for fresh ids.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Module magic number (fixed endianness reference value).
pub const MAGIC: u32 = 0x0723_0203;

/// Header length in words.
pub const HEADER_WORDS: usize = 5;

/// Generator id stamped into headers this crate writes.
pub const GENERATOR: u32 = 0x0053_0001;

/// Pack a version word from major/minor.
pub const fn version(major: u8, minor: u8) -> u32 {
    ((major as u32) << 16) | ((minor as u32) << 8)
}

/// Pack word 0 of an instruction.
pub const fn pack_word0(opcode: u16, word_count: u16) -> u32 {
    ((word_count as u32) << 16) | opcode as u32
}

/// Split word 0 into (opcode, word_count).
pub const fn unpack_word0(word: u32) -> (u16, u16) {
    ((word & 0xFFFF) as u16, (word >> 16) as u16)
}

/// Opcode definitions for the instruction subset this engine reads, reorders
/// and emits. Values are the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum Op {
    Nop = 0,

    // Debug
    Source = 3,
    SourceExtension = 4,
    Name = 5,
    MemberName = 6,
    String = 7,

    // Mode setting
    Extension = 10,
    ExtInstImport = 11,
    ExtInst = 12,
    MemoryModel = 14,
    EntryPoint = 15,
    ExecutionMode = 16,
    Capability = 17,

    // Types
    TypeVoid = 19,
    TypeBool = 20,
    TypeInt = 21,
    TypeFloat = 22,
    TypeVector = 23,
    TypeMatrix = 24,
    TypeImage = 25,
    TypeSampler = 26,
    TypeSampledImage = 27,
    TypeArray = 28,
    TypeRuntimeArray = 29,
    TypeStruct = 30,
    TypePointer = 32,
    TypeFunction = 33,

    // Constants
    ConstantTrue = 41,
    ConstantFalse = 42,
    Constant = 43,
    ConstantComposite = 44,
    ConstantNull = 46,

    // Functions
    Function = 54,
    FunctionParameter = 55,
    FunctionEnd = 56,
    FunctionCall = 57,

    // Memory
    Variable = 59,
    Load = 61,
    Store = 62,
    AccessChain = 65,
    ArrayLength = 68,

    // Annotations
    Decorate = 71,
    MemberDecorate = 72,

    // Composites
    VectorShuffle = 79,
    CompositeConstruct = 80,
    CompositeExtract = 81,
    CompositeInsert = 82,

    // Images
    SampledImage = 86,
    ImageSampleImplicitLod = 87,
    ImageSampleExplicitLod = 88,
    ImageSampleDrefImplicitLod = 89,
    ImageSampleDrefExplicitLod = 90,
    ImageFetch = 95,
    ImageRead = 98,
    ImageWrite = 99,
    Image = 100,
    ImageQuerySizeLod = 103,
    ImageQuerySize = 104,
    ImageQueryLod = 105,
    ImageQueryLevels = 106,
    ImageQuerySamples = 107,

    // Conversions
    ConvertFToU = 109,
    ConvertFToS = 110,
    ConvertSToF = 111,
    ConvertUToF = 112,
    Bitcast = 124,

    // Arithmetic
    SNegate = 126,
    FNegate = 127,
    IAdd = 128,
    FAdd = 129,
    ISub = 130,
    FSub = 131,
    IMul = 132,
    FMul = 133,
    UDiv = 134,
    SDiv = 135,

    Select = 169,

    // Bits
    ShiftRightLogical = 194,
    ShiftRightArithmetic = 195,
    ShiftLeftLogical = 196,
    BitwiseOr = 197,
    BitwiseXor = 198,
    BitwiseAnd = 199,

    // Atomics
    AtomicLoad = 227,
    AtomicStore = 228,
    AtomicExchange = 229,
    AtomicCompareExchange = 230,
    AtomicIIncrement = 232,
    AtomicIDecrement = 233,
    AtomicIAdd = 234,
    AtomicISub = 235,
    AtomicSMin = 236,
    AtomicUMin = 237,
    AtomicSMax = 238,
    AtomicUMax = 239,
    AtomicAnd = 240,
    AtomicOr = 241,
    AtomicXor = 242,

    // Control flow
    Phi = 245,
    Label = 248,
    Branch = 249,
    BranchConditional = 250,
    Switch = 251,
    Return = 253,
    ReturnValue = 254,

    ModuleProcessed = 330,
}

/// Every opcode this engine knows, in wire-value order.
pub const ALL_OPS: &[Op] = &[
    Op::Nop,
    Op::Source,
    Op::SourceExtension,
    Op::Name,
    Op::MemberName,
    Op::String,
    Op::Extension,
    Op::ExtInstImport,
    Op::ExtInst,
    Op::MemoryModel,
    Op::EntryPoint,
    Op::ExecutionMode,
    Op::Capability,
    Op::TypeVoid,
    Op::TypeBool,
    Op::TypeInt,
    Op::TypeFloat,
    Op::TypeVector,
    Op::TypeMatrix,
    Op::TypeImage,
    Op::TypeSampler,
    Op::TypeSampledImage,
    Op::TypeArray,
    Op::TypeRuntimeArray,
    Op::TypeStruct,
    Op::TypePointer,
    Op::TypeFunction,
    Op::ConstantTrue,
    Op::ConstantFalse,
    Op::Constant,
    Op::ConstantComposite,
    Op::ConstantNull,
    Op::Function,
    Op::FunctionParameter,
    Op::FunctionEnd,
    Op::FunctionCall,
    Op::Variable,
    Op::Load,
    Op::Store,
    Op::AccessChain,
    Op::ArrayLength,
    Op::Decorate,
    Op::MemberDecorate,
    Op::VectorShuffle,
    Op::CompositeConstruct,
    Op::CompositeExtract,
    Op::CompositeInsert,
    Op::SampledImage,
    Op::ImageSampleImplicitLod,
    Op::ImageSampleExplicitLod,
    Op::ImageSampleDrefImplicitLod,
    Op::ImageSampleDrefExplicitLod,
    Op::ImageFetch,
    Op::ImageRead,
    Op::ImageWrite,
    Op::Image,
    Op::ImageQuerySizeLod,
    Op::ImageQuerySize,
    Op::ImageQueryLod,
    Op::ImageQueryLevels,
    Op::ImageQuerySamples,
    Op::ConvertFToU,
    Op::ConvertFToS,
    Op::ConvertSToF,
    Op::ConvertUToF,
    Op::Bitcast,
    Op::SNegate,
    Op::FNegate,
    Op::IAdd,
    Op::FAdd,
    Op::ISub,
    Op::FSub,
    Op::IMul,
    Op::FMul,
    Op::UDiv,
    Op::SDiv,
    Op::Select,
    Op::ShiftRightLogical,
    Op::ShiftRightArithmetic,
    Op::ShiftLeftLogical,
    Op::BitwiseOr,
    Op::BitwiseXor,
    Op::BitwiseAnd,
    Op::AtomicLoad,
    Op::AtomicStore,
    Op::AtomicExchange,
    Op::AtomicCompareExchange,
    Op::AtomicIIncrement,
    Op::AtomicIDecrement,
    Op::AtomicIAdd,
    Op::AtomicISub,
    Op::AtomicSMin,
    Op::AtomicUMin,
    Op::AtomicSMax,
    Op::AtomicUMax,
    Op::AtomicAnd,
    Op::AtomicOr,
    Op::AtomicXor,
    Op::Phi,
    Op::Label,
    Op::Branch,
    Op::BranchConditional,
    Op::Switch,
    Op::Return,
    Op::ReturnValue,
    Op::ModuleProcessed,
];

static OP_BY_VALUE: Lazy<HashMap<u16, Op>> =
    Lazy::new(|| ALL_OPS.iter().map(|&op| (op as u16, op)).collect());

impl Op {
    /// Convert from the wire value, returning None for opcodes outside the
    /// supported subset. Unknown opcodes are still enumerable by word count.
    pub fn from_u16(val: u16) -> Option<Self> {
        OP_BY_VALUE.get(&val).copied()
    }

    /// Get the mnemonic for this opcode
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Nop => "OpNop",
            Op::Source => "OpSource",
            Op::SourceExtension => "OpSourceExtension",
            Op::Name => "OpName",
            Op::MemberName => "OpMemberName",
            Op::String => "OpString",
            Op::Extension => "OpExtension",
            Op::ExtInstImport => "OpExtInstImport",
            Op::ExtInst => "OpExtInst",
            Op::MemoryModel => "OpMemoryModel",
            Op::EntryPoint => "OpEntryPoint",
            Op::ExecutionMode => "OpExecutionMode",
            Op::Capability => "OpCapability",
            Op::TypeVoid => "OpTypeVoid",
            Op::TypeBool => "OpTypeBool",
            Op::TypeInt => "OpTypeInt",
            Op::TypeFloat => "OpTypeFloat",
            Op::TypeVector => "OpTypeVector",
            Op::TypeMatrix => "OpTypeMatrix",
            Op::TypeImage => "OpTypeImage",
            Op::TypeSampler => "OpTypeSampler",
            Op::TypeSampledImage => "OpTypeSampledImage",
            Op::TypeArray => "OpTypeArray",
            Op::TypeRuntimeArray => "OpTypeRuntimeArray",
            Op::TypeStruct => "OpTypeStruct",
            Op::TypePointer => "OpTypePointer",
            Op::TypeFunction => "OpTypeFunction",
            Op::ConstantTrue => "OpConstantTrue",
            Op::ConstantFalse => "OpConstantFalse",
            Op::Constant => "OpConstant",
            Op::ConstantComposite => "OpConstantComposite",
            Op::ConstantNull => "OpConstantNull",
            Op::Function => "OpFunction",
            Op::FunctionParameter => "OpFunctionParameter",
            Op::FunctionEnd => "OpFunctionEnd",
            Op::FunctionCall => "OpFunctionCall",
            Op::Variable => "OpVariable",
            Op::Load => "OpLoad",
            Op::Store => "OpStore",
            Op::AccessChain => "OpAccessChain",
            Op::ArrayLength => "OpArrayLength",
            Op::Decorate => "OpDecorate",
            Op::MemberDecorate => "OpMemberDecorate",
            Op::VectorShuffle => "OpVectorShuffle",
            Op::CompositeConstruct => "OpCompositeConstruct",
            Op::CompositeExtract => "OpCompositeExtract",
            Op::CompositeInsert => "OpCompositeInsert",
            Op::SampledImage => "OpSampledImage",
            Op::ImageSampleImplicitLod => "OpImageSampleImplicitLod",
            Op::ImageSampleExplicitLod => "OpImageSampleExplicitLod",
            Op::ImageSampleDrefImplicitLod => "OpImageSampleDrefImplicitLod",
            Op::ImageSampleDrefExplicitLod => "OpImageSampleDrefExplicitLod",
            Op::ImageFetch => "OpImageFetch",
            Op::ImageRead => "OpImageRead",
            Op::ImageWrite => "OpImageWrite",
            Op::Image => "OpImage",
            Op::ImageQuerySizeLod => "OpImageQuerySizeLod",
            Op::ImageQuerySize => "OpImageQuerySize",
            Op::ImageQueryLod => "OpImageQueryLod",
            Op::ImageQueryLevels => "OpImageQueryLevels",
            Op::ImageQuerySamples => "OpImageQuerySamples",
            Op::ConvertFToU => "OpConvertFToU",
            Op::ConvertFToS => "OpConvertFToS",
            Op::ConvertSToF => "OpConvertSToF",
            Op::ConvertUToF => "OpConvertUToF",
            Op::Bitcast => "OpBitcast",
            Op::SNegate => "OpSNegate",
            Op::FNegate => "OpFNegate",
            Op::IAdd => "OpIAdd",
            Op::FAdd => "OpFAdd",
            Op::ISub => "OpISub",
            Op::FSub => "OpFSub",
            Op::IMul => "OpIMul",
            Op::FMul => "OpFMul",
            Op::UDiv => "OpUDiv",
            Op::SDiv => "OpSDiv",
            Op::Select => "OpSelect",
            Op::ShiftRightLogical => "OpShiftRightLogical",
            Op::ShiftRightArithmetic => "OpShiftRightArithmetic",
            Op::ShiftLeftLogical => "OpShiftLeftLogical",
            Op::BitwiseOr => "OpBitwiseOr",
            Op::BitwiseXor => "OpBitwiseXor",
            Op::BitwiseAnd => "OpBitwiseAnd",
            Op::AtomicLoad => "OpAtomicLoad",
            Op::AtomicStore => "OpAtomicStore",
            Op::AtomicExchange => "OpAtomicExchange",
            Op::AtomicCompareExchange => "OpAtomicCompareExchange",
            Op::AtomicIIncrement => "OpAtomicIIncrement",
            Op::AtomicIDecrement => "OpAtomicIDecrement",
            Op::AtomicIAdd => "OpAtomicIAdd",
            Op::AtomicISub => "OpAtomicISub",
            Op::AtomicSMin => "OpAtomicSMin",
            Op::AtomicUMin => "OpAtomicUMin",
            Op::AtomicSMax => "OpAtomicSMax",
            Op::AtomicUMax => "OpAtomicUMax",
            Op::AtomicAnd => "OpAtomicAnd",
            Op::AtomicOr => "OpAtomicOr",
            Op::AtomicXor => "OpAtomicXor",
            Op::Phi => "OpPhi",
            Op::Label => "OpLabel",
            Op::Branch => "OpBranch",
            Op::BranchConditional => "OpBranchConditional",
            Op::Switch => "OpSwitch",
            Op::Return => "OpReturn",
            Op::ReturnValue => "OpReturnValue",
            Op::ModuleProcessed => "OpModuleProcessed",
        }
    }

    /// The layout section this opcode belongs to. `OpVariable` placement
    /// additionally depends on its storage class operand; enumeration uses
    /// the full sort key from `ir::reader` when operands are in hand.
    pub fn section(&self) -> LayoutSection {
        use LayoutSection::*;
        match self {
            Op::Capability => Capabilities,
            Op::Extension => Extensions,
            Op::ExtInstImport => ExtInstImports,
            Op::MemoryModel => MemoryModel,
            Op::EntryPoint => EntryPoints,
            Op::ExecutionMode => ExecutionModes,
            Op::Source | Op::SourceExtension | Op::String => DebugSources,
            Op::Name | Op::MemberName => DebugNames,
            Op::ModuleProcessed => Processed,
            Op::Decorate | Op::MemberDecorate => Decorations,
            Op::TypeVoid
            | Op::TypeBool
            | Op::TypeInt
            | Op::TypeFloat
            | Op::TypeVector
            | Op::TypeMatrix
            | Op::TypeImage
            | Op::TypeSampler
            | Op::TypeSampledImage
            | Op::TypeArray
            | Op::TypeRuntimeArray
            | Op::TypeStruct
            | Op::TypePointer
            | Op::TypeFunction
            | Op::ConstantTrue
            | Op::ConstantFalse
            | Op::Constant
            | Op::ConstantComposite
            | Op::ConstantNull
            | Op::Variable => Globals,
            _ => Functions,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Ordering buckets of the canonical module layout. Function bodies come
/// last and keep their internal order untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LayoutSection {
    Capabilities = 0,
    Extensions = 1,
    ExtInstImports = 2,
    MemoryModel = 3,
    EntryPoints = 4,
    ExecutionModes = 5,
    DebugSources = 6,
    DebugNames = 7,
    Processed = 8,
    Decorations = 9,
    Globals = 10,
    Functions = 15,
}

/// Highest section value; ordered enumeration rescans up to here.
pub const MAX_SECTION: u8 = LayoutSection::Functions as u8;

/// Storage classes carried by pointer types and `OpVariable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StorageClass {
    UniformConstant = 0,
    Input = 1,
    Uniform = 2,
    Output = 3,
    Workgroup = 4,
    CrossWorkgroup = 5,
    Private = 6,
    Function = 7,
    PushConstant = 9,
    StorageBuffer = 12,
}

impl StorageClass {
    pub fn from_u32(val: u32) -> Option<Self> {
        Some(match val {
            0 => StorageClass::UniformConstant,
            1 => StorageClass::Input,
            2 => StorageClass::Uniform,
            3 => StorageClass::Output,
            4 => StorageClass::Workgroup,
            5 => StorageClass::CrossWorkgroup,
            6 => StorageClass::Private,
            7 => StorageClass::Function,
            9 => StorageClass::PushConstant,
            12 => StorageClass::StorageBuffer,
            _ => return None,
        })
    }
}

/// Image dimensionality for `OpTypeImage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Dim {
    D1 = 0,
    D2 = 1,
    D3 = 2,
    Cube = 3,
}

impl Dim {
    pub fn from_u32(val: u32) -> Option<Self> {
        if val <= 3 {
            Some(unsafe { std::mem::transmute::<u32, Dim>(val) })
        } else {
            None
        }
    }
}

/// Execution scope ids used by atomic instructions.
pub mod scope {
    pub const CROSS_DEVICE: u32 = 0;
    pub const DEVICE: u32 = 1;
    pub const WORKGROUP: u32 = 2;
    pub const SUBGROUP: u32 = 3;
    pub const INVOCATION: u32 = 4;
}

/// Memory semantics bits used by atomic instructions. Relaxed is the
/// absence of every bit.
pub mod semantics {
    pub const RELAXED: u32 = 0x0;
    pub const ACQUIRE: u32 = 0x2;
    pub const RELEASE: u32 = 0x4;
    pub const ACQUIRE_RELEASE: u32 = 0x8;
}

/// Image operand bits, ordered by bit position; operand words follow the
/// mask in that same order.
pub mod image_operands {
    pub const BIAS: u32 = 0x01;
    pub const LOD: u32 = 0x02;
    pub const GRAD: u32 = 0x04;
    pub const CONST_OFFSET: u32 = 0x08;
    pub const OFFSET: u32 = 0x10;
    pub const CONST_OFFSETS: u32 = 0x20;
    pub const SAMPLE: u32 = 0x40;
    pub const MIN_LOD: u32 = 0x80;
}

/// Decoration enumerants; the extra operand words each one carries are
/// looked up in [`crate::ir::schema::decoration_operands`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum Decoration {
    RelaxedPrecision = 0,
    SpecId = 1,
    Block = 2,
    BufferBlock = 3,
    RowMajor = 4,
    ColMajor = 5,
    ArrayStride = 6,
    MatrixStride = 7,
    GlslShared = 8,
    GlslPacked = 9,
    CPacked = 10,
    BuiltIn = 11,
    NoPerspective = 13,
    Flat = 14,
    Patch = 15,
    Centroid = 16,
    Sample = 17,
    Invariant = 18,
    Restrict = 19,
    Aliased = 20,
    Volatile = 21,
    Constant = 22,
    Coherent = 23,
    NonWritable = 24,
    NonReadable = 25,
    Uniform = 26,
    Stream = 29,
    Location = 30,
    Component = 31,
    Index = 32,
    Binding = 33,
    DescriptorSet = 34,
    Offset = 35,
    XfbBuffer = 36,
    XfbStride = 37,
    FuncParamAttr = 38,
    FpRoundingMode = 39,
    FpFastMathMode = 40,
    LinkageAttributes = 41,
    NoContraction = 42,
    InputAttachmentIndex = 43,
    Alignment = 44,
}

pub const ALL_DECORATIONS: &[Decoration] = &[
    Decoration::RelaxedPrecision,
    Decoration::SpecId,
    Decoration::Block,
    Decoration::BufferBlock,
    Decoration::RowMajor,
    Decoration::ColMajor,
    Decoration::ArrayStride,
    Decoration::MatrixStride,
    Decoration::GlslShared,
    Decoration::GlslPacked,
    Decoration::CPacked,
    Decoration::BuiltIn,
    Decoration::NoPerspective,
    Decoration::Flat,
    Decoration::Patch,
    Decoration::Centroid,
    Decoration::Sample,
    Decoration::Invariant,
    Decoration::Restrict,
    Decoration::Aliased,
    Decoration::Volatile,
    Decoration::Constant,
    Decoration::Coherent,
    Decoration::NonWritable,
    Decoration::NonReadable,
    Decoration::Uniform,
    Decoration::Stream,
    Decoration::Location,
    Decoration::Component,
    Decoration::Index,
    Decoration::Binding,
    Decoration::DescriptorSet,
    Decoration::Offset,
    Decoration::XfbBuffer,
    Decoration::XfbStride,
    Decoration::FuncParamAttr,
    Decoration::FpRoundingMode,
    Decoration::FpFastMathMode,
    Decoration::LinkageAttributes,
    Decoration::NoContraction,
    Decoration::InputAttachmentIndex,
    Decoration::Alignment,
];

static DECORATION_BY_VALUE: Lazy<HashMap<u32, Decoration>> =
    Lazy::new(|| ALL_DECORATIONS.iter().map(|&d| (d as u32, d)).collect());

impl Decoration {
    pub fn from_u32(val: u32) -> Option<Self> {
        DECORATION_BY_VALUE.get(&val).copied()
    }
}

/// Decoded 5-word module header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHeader {
    pub magic: u32,
    pub version: u32,
    pub generator: u32,
    pub bound: u32,
    pub schema: u32,
}

impl ModuleHeader {
    /// Header for a freshly written module, version 1.0.
    pub fn new(bound: u32) -> Self {
        Self {
            magic: MAGIC,
            version: version(1, 0),
            generator: GENERATOR,
            bound,
            schema: 0,
        }
    }

    /// Decode the leading header words. The caller guarantees
    /// `words.len() >= HEADER_WORDS`.
    pub fn from_words(words: &[u32]) -> Self {
        Self {
            magic: words[0],
            version: words[1],
            generator: words[2],
            bound: words[3],
            schema: words[4],
        }
    }

    pub fn to_words(self) -> [u32; HEADER_WORDS] {
        [
            self.magic,
            self.version,
            self.generator,
            self.bound,
            self.schema,
        ]
    }

    pub fn version_major(&self) -> u8 {
        ((self.version >> 16) & 0xFF) as u8
    }

    pub fn version_minor(&self) -> u8 {
        ((self.version >> 8) & 0xFF) as u8
    }
}

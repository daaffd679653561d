//! Static operand grammar for the supported opcode subset.
//!
//! Each instruction's operand layout is a list of named slots. A slot has a
//! kind (how many words it eats and what they mean) and a quantifier. The
//! table is position-independent data: the operand enumerator in
//! [`crate::ir::operands`] walks it against live words.
//!
//! Decorations are the one place where the grammar is data-dependent: the
//! words that follow a decoration enumerant are shaped by the enumerant
//! itself, so `OpDecorate` and `OpMemberDecorate` end in a lookup through
//! [`decoration_operands`] rather than a fixed slot list.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use super::format::{Decoration, Op};

/// How many words an operand consumes and what they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperandKind {
    /// A reference to another instruction's result id (1 word).
    IdRef,
    /// A literal integer (1 word).
    LiteralInt,
    /// A literal string, 4 bytes per word, terminated by the first word
    /// containing a NUL byte (1..n words).
    LiteralString,
    /// An enumerant from a named value set (1 word).
    ValueEnum(EnumClass),
    /// Id paired with a literal, consumed as one logical operand (2 words).
    PairIdRefLiteral,
    /// Literal paired with an id, consumed as one logical operand (2 words).
    PairLiteralIdRef,
    /// Two ids consumed as one logical operand (2 words).
    PairIdRefIdRef,
}

impl OperandKind {
    /// Fixed word width; None for strings, which are terminator-scanned.
    pub fn width(&self) -> Option<usize> {
        match self {
            OperandKind::LiteralString => None,
            OperandKind::PairIdRefLiteral
            | OperandKind::PairLiteralIdRef
            | OperandKind::PairIdRefIdRef => Some(2),
            _ => Some(1),
        }
    }
}

/// Value sets an enum operand can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnumClass {
    SourceLanguage,
    ExecutionModel,
    AddressingModel,
    MemoryModel,
    ExecutionMode,
    StorageClass,
    Dim,
    ImageFormat,
    AccessQualifier,
    FunctionControl,
    MemoryAccess,
    ImageOperands,
    Capability,
    Decoration,
    BuiltIn,
    FunctionParameterAttribute,
    FpRoundingMode,
    FpFastMathMode,
    LinkageType,
}

/// Operand multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quantifier {
    One,
    /// Present only if words remain.
    ZeroOrOne,
    /// Repeats until no whole operand remains; always the final slot.
    ZeroOrMore,
}

/// One named operand position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperandSlot {
    pub name: &'static str,
    pub kind: OperandKind,
    pub quantifier: Quantifier,
}

/// Operand layout of one opcode.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InstructionSchema {
    pub op: Op,
    pub has_result_type: bool,
    pub has_result: bool,
    pub operands: &'static [OperandSlot],
}

const fn one(name: &'static str, kind: OperandKind) -> OperandSlot {
    OperandSlot {
        name,
        kind,
        quantifier: Quantifier::One,
    }
}

const fn opt(name: &'static str, kind: OperandKind) -> OperandSlot {
    OperandSlot {
        name,
        kind,
        quantifier: Quantifier::ZeroOrOne,
    }
}

const fn rest(name: &'static str, kind: OperandKind) -> OperandSlot {
    OperandSlot {
        name,
        kind,
        quantifier: Quantifier::ZeroOrMore,
    }
}

const fn sig(
    op: Op,
    has_result_type: bool,
    has_result: bool,
    operands: &'static [OperandSlot],
) -> InstructionSchema {
    InstructionSchema {
        op,
        has_result_type,
        has_result,
        operands,
    }
}

use EnumClass as E;
use OperandKind::*;

const UNARY: &[OperandSlot] = &[one("Operand", IdRef)];
const BINARY: &[OperandSlot] = &[one("Operand 1", IdRef), one("Operand 2", IdRef)];
const SHIFT: &[OperandSlot] = &[one("Base", IdRef), one("Shift", IdRef)];
const IMAGE_QUERY: &[OperandSlot] = &[one("Image", IdRef)];
const ATOMIC_RMW: &[OperandSlot] = &[
    one("Pointer", IdRef),
    one("Memory Scope", IdRef),
    one("Semantics", IdRef),
    one("Value", IdRef),
];
const ATOMIC_NULLARY: &[OperandSlot] = &[
    one("Pointer", IdRef),
    one("Memory Scope", IdRef),
    one("Semantics", IdRef),
];

/// The whole grammar, one entry per supported opcode.
pub static SCHEMAS: &[InstructionSchema] = &[
    sig(Op::Nop, false, false, &[]),
    sig(
        Op::Source,
        false,
        false,
        &[
            one("Source Language", ValueEnum(E::SourceLanguage)),
            one("Version", LiteralInt),
            opt("File", IdRef),
            opt("Source", LiteralString),
        ],
    ),
    sig(
        Op::SourceExtension,
        false,
        false,
        &[one("Extension", LiteralString)],
    ),
    sig(
        Op::Name,
        false,
        false,
        &[one("Target", IdRef), one("Name", LiteralString)],
    ),
    sig(
        Op::MemberName,
        false,
        false,
        &[
            one("Type", IdRef),
            one("Member", LiteralInt),
            one("Name", LiteralString),
        ],
    ),
    sig(Op::String, false, true, &[one("String", LiteralString)]),
    sig(Op::Extension, false, false, &[one("Name", LiteralString)]),
    sig(Op::ExtInstImport, false, true, &[one("Name", LiteralString)]),
    sig(
        Op::ExtInst,
        true,
        true,
        &[
            one("Set", IdRef),
            one("Instruction", LiteralInt),
            rest("Operands", IdRef),
        ],
    ),
    sig(
        Op::MemoryModel,
        false,
        false,
        &[
            one("Addressing Model", ValueEnum(E::AddressingModel)),
            one("Memory Model", ValueEnum(E::MemoryModel)),
        ],
    ),
    sig(
        Op::EntryPoint,
        false,
        false,
        &[
            one("Execution Model", ValueEnum(E::ExecutionModel)),
            one("Entry Point", IdRef),
            one("Name", LiteralString),
            rest("Interface", IdRef),
        ],
    ),
    sig(
        Op::ExecutionMode,
        false,
        false,
        &[
            one("Entry Point", IdRef),
            one("Mode", ValueEnum(E::ExecutionMode)),
            rest("Literals", LiteralInt),
        ],
    ),
    sig(
        Op::Capability,
        false,
        false,
        &[one("Capability", ValueEnum(E::Capability))],
    ),
    sig(Op::TypeVoid, false, true, &[]),
    sig(Op::TypeBool, false, true, &[]),
    sig(
        Op::TypeInt,
        false,
        true,
        &[one("Width", LiteralInt), one("Signedness", LiteralInt)],
    ),
    sig(Op::TypeFloat, false, true, &[one("Width", LiteralInt)]),
    sig(
        Op::TypeVector,
        false,
        true,
        &[
            one("Component Type", IdRef),
            one("Component Count", LiteralInt),
        ],
    ),
    sig(
        Op::TypeMatrix,
        false,
        true,
        &[one("Column Type", IdRef), one("Column Count", LiteralInt)],
    ),
    sig(
        Op::TypeImage,
        false,
        true,
        &[
            one("Sampled Type", IdRef),
            one("Dim", ValueEnum(E::Dim)),
            one("Depth", LiteralInt),
            one("Arrayed", LiteralInt),
            one("MS", LiteralInt),
            one("Sampled", LiteralInt),
            one("Format", ValueEnum(E::ImageFormat)),
            opt("Access Qualifier", ValueEnum(E::AccessQualifier)),
        ],
    ),
    sig(Op::TypeSampler, false, true, &[]),
    sig(
        Op::TypeSampledImage,
        false,
        true,
        &[one("Image Type", IdRef)],
    ),
    sig(
        Op::TypeArray,
        false,
        true,
        &[one("Element Type", IdRef), one("Length", IdRef)],
    ),
    sig(
        Op::TypeRuntimeArray,
        false,
        true,
        &[one("Element Type", IdRef)],
    ),
    sig(Op::TypeStruct, false, true, &[rest("Members", IdRef)]),
    sig(
        Op::TypePointer,
        false,
        true,
        &[
            one("Storage Class", ValueEnum(E::StorageClass)),
            one("Type", IdRef),
        ],
    ),
    sig(
        Op::TypeFunction,
        false,
        true,
        &[one("Return Type", IdRef), rest("Parameters", IdRef)],
    ),
    sig(Op::ConstantTrue, true, true, &[]),
    sig(Op::ConstantFalse, true, true, &[]),
    sig(Op::Constant, true, true, &[rest("Value", LiteralInt)]),
    sig(
        Op::ConstantComposite,
        true,
        true,
        &[rest("Constituents", IdRef)],
    ),
    sig(Op::ConstantNull, true, true, &[]),
    sig(
        Op::Function,
        true,
        true,
        &[
            one("Function Control", ValueEnum(E::FunctionControl)),
            one("Function Type", IdRef),
        ],
    ),
    sig(Op::FunctionParameter, true, true, &[]),
    sig(Op::FunctionEnd, false, false, &[]),
    sig(
        Op::FunctionCall,
        true,
        true,
        &[one("Function", IdRef), rest("Arguments", IdRef)],
    ),
    sig(
        Op::Variable,
        true,
        true,
        &[
            one("Storage Class", ValueEnum(E::StorageClass)),
            opt("Initializer", IdRef),
        ],
    ),
    sig(
        Op::Load,
        true,
        true,
        &[
            one("Pointer", IdRef),
            opt("Memory Access", ValueEnum(E::MemoryAccess)),
        ],
    ),
    sig(
        Op::Store,
        false,
        false,
        &[
            one("Pointer", IdRef),
            one("Object", IdRef),
            opt("Memory Access", ValueEnum(E::MemoryAccess)),
        ],
    ),
    sig(
        Op::AccessChain,
        true,
        true,
        &[one("Base", IdRef), rest("Indexes", IdRef)],
    ),
    sig(
        Op::ArrayLength,
        true,
        true,
        &[one("Structure", IdRef), one("Array Member", LiteralInt)],
    ),
    // Decoration extras are data-dependent; see decoration_operands().
    sig(
        Op::Decorate,
        false,
        false,
        &[
            one("Target", IdRef),
            one("Decoration", ValueEnum(E::Decoration)),
        ],
    ),
    sig(
        Op::MemberDecorate,
        false,
        false,
        &[
            one("Structure Type", IdRef),
            one("Member", LiteralInt),
            one("Decoration", ValueEnum(E::Decoration)),
        ],
    ),
    sig(
        Op::VectorShuffle,
        true,
        true,
        &[
            one("Vector 1", IdRef),
            one("Vector 2", IdRef),
            rest("Components", LiteralInt),
        ],
    ),
    sig(
        Op::CompositeConstruct,
        true,
        true,
        &[rest("Constituents", IdRef)],
    ),
    sig(
        Op::CompositeExtract,
        true,
        true,
        &[one("Composite", IdRef), rest("Indexes", LiteralInt)],
    ),
    sig(
        Op::CompositeInsert,
        true,
        true,
        &[
            one("Object", IdRef),
            one("Composite", IdRef),
            rest("Indexes", LiteralInt),
        ],
    ),
    sig(
        Op::SampledImage,
        true,
        true,
        &[one("Image", IdRef), one("Sampler", IdRef)],
    ),
    sig(
        Op::ImageSampleImplicitLod,
        true,
        true,
        &[
            one("Sampled Image", IdRef),
            one("Coordinate", IdRef),
            opt("Image Operands", ValueEnum(E::ImageOperands)),
            rest("Operands", IdRef),
        ],
    ),
    sig(
        Op::ImageSampleExplicitLod,
        true,
        true,
        &[
            one("Sampled Image", IdRef),
            one("Coordinate", IdRef),
            one("Image Operands", ValueEnum(E::ImageOperands)),
            rest("Operands", IdRef),
        ],
    ),
    sig(
        Op::ImageSampleDrefImplicitLod,
        true,
        true,
        &[
            one("Sampled Image", IdRef),
            one("Coordinate", IdRef),
            one("Dref", IdRef),
            opt("Image Operands", ValueEnum(E::ImageOperands)),
            rest("Operands", IdRef),
        ],
    ),
    sig(
        Op::ImageSampleDrefExplicitLod,
        true,
        true,
        &[
            one("Sampled Image", IdRef),
            one("Coordinate", IdRef),
            one("Dref", IdRef),
            one("Image Operands", ValueEnum(E::ImageOperands)),
            rest("Operands", IdRef),
        ],
    ),
    sig(
        Op::ImageFetch,
        true,
        true,
        &[
            one("Image", IdRef),
            one("Coordinate", IdRef),
            opt("Image Operands", ValueEnum(E::ImageOperands)),
            rest("Operands", IdRef),
        ],
    ),
    sig(
        Op::ImageRead,
        true,
        true,
        &[
            one("Image", IdRef),
            one("Coordinate", IdRef),
            opt("Image Operands", ValueEnum(E::ImageOperands)),
            rest("Operands", IdRef),
        ],
    ),
    sig(
        Op::ImageWrite,
        false,
        false,
        &[
            one("Image", IdRef),
            one("Coordinate", IdRef),
            one("Texel", IdRef),
            opt("Image Operands", ValueEnum(E::ImageOperands)),
            rest("Operands", IdRef),
        ],
    ),
    sig(Op::Image, true, true, &[one("Sampled Image", IdRef)]),
    sig(
        Op::ImageQuerySizeLod,
        true,
        true,
        &[one("Image", IdRef), one("Level of Detail", IdRef)],
    ),
    sig(Op::ImageQuerySize, true, true, IMAGE_QUERY),
    sig(
        Op::ImageQueryLod,
        true,
        true,
        &[one("Sampled Image", IdRef), one("Coordinate", IdRef)],
    ),
    sig(Op::ImageQueryLevels, true, true, IMAGE_QUERY),
    sig(Op::ImageQuerySamples, true, true, IMAGE_QUERY),
    sig(Op::ConvertFToU, true, true, UNARY),
    sig(Op::ConvertFToS, true, true, UNARY),
    sig(Op::ConvertSToF, true, true, UNARY),
    sig(Op::ConvertUToF, true, true, UNARY),
    sig(Op::Bitcast, true, true, UNARY),
    sig(Op::SNegate, true, true, UNARY),
    sig(Op::FNegate, true, true, UNARY),
    sig(Op::IAdd, true, true, BINARY),
    sig(Op::FAdd, true, true, BINARY),
    sig(Op::ISub, true, true, BINARY),
    sig(Op::FSub, true, true, BINARY),
    sig(Op::IMul, true, true, BINARY),
    sig(Op::FMul, true, true, BINARY),
    sig(Op::UDiv, true, true, BINARY),
    sig(Op::SDiv, true, true, BINARY),
    sig(
        Op::Select,
        true,
        true,
        &[
            one("Condition", IdRef),
            one("Object 1", IdRef),
            one("Object 2", IdRef),
        ],
    ),
    sig(Op::ShiftRightLogical, true, true, SHIFT),
    sig(Op::ShiftRightArithmetic, true, true, SHIFT),
    sig(Op::ShiftLeftLogical, true, true, SHIFT),
    sig(Op::BitwiseOr, true, true, BINARY),
    sig(Op::BitwiseXor, true, true, BINARY),
    sig(Op::BitwiseAnd, true, true, BINARY),
    sig(Op::AtomicLoad, true, true, ATOMIC_NULLARY),
    sig(
        Op::AtomicStore,
        false,
        false,
        &[
            one("Pointer", IdRef),
            one("Memory Scope", IdRef),
            one("Semantics", IdRef),
            one("Value", IdRef),
        ],
    ),
    sig(Op::AtomicExchange, true, true, ATOMIC_RMW),
    sig(
        Op::AtomicCompareExchange,
        true,
        true,
        &[
            one("Pointer", IdRef),
            one("Memory Scope", IdRef),
            one("Equal Semantics", IdRef),
            one("Unequal Semantics", IdRef),
            one("Value", IdRef),
            one("Comparator", IdRef),
        ],
    ),
    sig(Op::AtomicIIncrement, true, true, ATOMIC_NULLARY),
    sig(Op::AtomicIDecrement, true, true, ATOMIC_NULLARY),
    sig(Op::AtomicIAdd, true, true, ATOMIC_RMW),
    sig(Op::AtomicISub, true, true, ATOMIC_RMW),
    sig(Op::AtomicSMin, true, true, ATOMIC_RMW),
    sig(Op::AtomicUMin, true, true, ATOMIC_RMW),
    sig(Op::AtomicSMax, true, true, ATOMIC_RMW),
    sig(Op::AtomicUMax, true, true, ATOMIC_RMW),
    sig(Op::AtomicAnd, true, true, ATOMIC_RMW),
    sig(Op::AtomicOr, true, true, ATOMIC_RMW),
    sig(Op::AtomicXor, true, true, ATOMIC_RMW),
    sig(
        Op::Phi,
        true,
        true,
        &[rest("Variable, Parent", PairIdRefIdRef)],
    ),
    sig(Op::Label, false, true, &[]),
    sig(Op::Branch, false, false, &[one("Target Label", IdRef)]),
    sig(
        Op::BranchConditional,
        false,
        false,
        &[
            one("Condition", IdRef),
            one("True Label", IdRef),
            one("False Label", IdRef),
            rest("Branch Weights", LiteralInt),
        ],
    ),
    sig(
        Op::Switch,
        false,
        false,
        &[
            one("Selector", IdRef),
            one("Default", IdRef),
            rest("Target", PairLiteralIdRef),
        ],
    ),
    sig(Op::Return, false, false, &[]),
    sig(Op::ReturnValue, false, false, &[one("Value", IdRef)]),
    sig(
        Op::ModuleProcessed,
        false,
        false,
        &[one("Process", LiteralString)],
    ),
];

static SCHEMA_BY_OP: Lazy<HashMap<u16, &'static InstructionSchema>> =
    Lazy::new(|| SCHEMAS.iter().map(|s| (s.op as u16, s)).collect());

/// Look up the operand layout of an opcode.
pub fn schema(op: Op) -> Option<&'static InstructionSchema> {
    SCHEMA_BY_OP.get(&(op as u16)).copied()
}

const DECOR_LITERAL: &[OperandSlot] = &[one("Literal", LiteralInt)];
const DECOR_BUILTIN: &[OperandSlot] = &[one("BuiltIn", ValueEnum(E::BuiltIn))];
const DECOR_PARAM_ATTR: &[OperandSlot] = &[one(
    "Function Parameter Attribute",
    ValueEnum(E::FunctionParameterAttribute),
)];
const DECOR_ROUNDING: &[OperandSlot] = &[one("Rounding Mode", ValueEnum(E::FpRoundingMode))];
const DECOR_FAST_MATH: &[OperandSlot] = &[one("Fast Math Mode", ValueEnum(E::FpFastMathMode))];
const DECOR_LINK: &[OperandSlot] = &[
    one("Name", LiteralString),
    one("Linkage Type", ValueEnum(E::LinkageType)),
];

/// Extra operand words carried by a decoration enumerant. This is the
/// data-dependent half of the grammar: `OpDecorate`'s fixed slots end at the
/// decoration value, and what follows is shaped by that value.
pub fn decoration_operands(decoration: Decoration) -> &'static [OperandSlot] {
    use Decoration as D;
    match decoration {
        D::SpecId
        | D::ArrayStride
        | D::MatrixStride
        | D::Stream
        | D::Location
        | D::Component
        | D::Index
        | D::Binding
        | D::DescriptorSet
        | D::Offset
        | D::XfbBuffer
        | D::XfbStride
        | D::InputAttachmentIndex
        | D::Alignment => DECOR_LITERAL,
        D::BuiltIn => DECOR_BUILTIN,
        D::FuncParamAttr => DECOR_PARAM_ATTR,
        D::FpRoundingMode => DECOR_ROUNDING,
        D::FpFastMathMode => DECOR_FAST_MATH,
        D::LinkageAttributes => DECOR_LINK,
        _ => &[],
    }
}

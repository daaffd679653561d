//! Spvir - Word-Oriented Shader Module Engine
//!
//! A reading, rewriting, and lowering layer for word-oriented shader
//! modules: 32-bit word streams carrying a five-word header followed by
//! variable-length instructions. Built for back ends that need to walk,
//! patch, and extend compiled modules without a full decompile step.
//!
//! # Features
//!
//! - **Zero-copy readers**: borrowed instruction views over raw word slices
//! - **Pooled writers**: growable word buffers recycled through a free list
//! - **Static operand schemas**: per-opcode operand tables driving a lazy,
//!   quantifier-aware operand walk
//! - **Four enumeration orders**: sequential, layout-ordered,
//!   function-bounded, and mutable in-place variants
//! - **Intrinsic lowering**: byte-addressed buffer and texture intrinsics
//!   expanded to encoded instruction sequences
//! - **Canonical type cache**: name-keyed interning with handle-identity
//!   equality and scoped symbol resolution
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │        ir::buffer        │
//!                     │  ModuleBuffer / Writer   │
//!                     └───────┬─────────┬───────┘
//!                             │         │
//!                  ┌──────────▼──┐   ┌──▼──────────┐
//!                  │  ir::reader │   │  ir::schema  │
//!                  │ enumerators │──▶│ operand walk │
//!                  └──────┬──────┘   └──────┬──────┘
//!                         │                 │
//!                  ┌──────▼─────────────────▼──────┐
//!                  │            lower               │
//!                  │  byte_buffer / texture / ctx   │
//!                  └──────────────┬────────────────┘
//!                                 │
//!                         ┌───────▼────────┐
//!                         │    symbols     │
//!                         │ types + scopes │
//!                         └────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use spvir::ir::{ModuleBuffer, ModuleWriter, Op};
//!
//! let mut writer = ModuleWriter::new();
//! writer.begin_module();
//! writer.instruction(Op::TypeVoid, None, Some(1), &[]);
//! let words = writer.finish(2).to_vec();
//!
//! let module = ModuleBuffer::new(&words).unwrap();
//! assert_eq!(module.bound(), 2);
//! let first = module.instructions().next().unwrap().unwrap();
//! assert_eq!(first.opcode, Some(Op::TypeVoid));
//! ```

pub mod ir;
pub mod lower;
pub mod symbols;

pub use ir::{ModuleBuffer, ModuleBufferMut, ModuleError, ModuleWriter, Op, WordPool};
pub use lower::{FunctionBuilder, LowerContext, LowerError};
pub use symbols::{ScopeStack, SymbolError, TypeDesc, TypeHandle, TypeRegistry};

//! Canonical type descriptors and lexical variable scopes.
//!
//! Types live in an arena indexed by [`TypeHandle`]. Interning goes through
//! a canonical-name cache, so two requests for "vector of float, size 3"
//! come back as the same handle and `==` on handles is a full type-equality
//! check. The lowering pass leans on that identity everywhere.
//!
//! The scope stack is the usual lexical discipline: push on block entry, pop
//! on exit, resolve innermost-out. Declaring a name that is live in any open
//! scope is a `DuplicateDeclaration`.

use std::collections::HashMap;
use thiserror::Error;

use crate::ir::format::{Dim, StorageClass};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("duplicate declaration of '{name}'")]
    DuplicateDeclaration { name: String },
}

/// Identity-comparable handle into the type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(u32);

/// 32-bit scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Float,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::UInt => "uint",
            ScalarKind::Float => "float",
        }
    }
}

/// Structural description of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    Void,
    Scalar(ScalarKind),
    Vector {
        base: TypeHandle,
        size: u8,
    },
    /// Columns of `column` vectors.
    Matrix {
        column: TypeHandle,
        columns: u8,
    },
    Array {
        element: TypeHandle,
        /// None for a runtime-sized array.
        length: Option<u32>,
    },
    Struct {
        name: String,
        members: Vec<(String, TypeHandle)>,
    },
    Sampler,
    Texture {
        sampled: TypeHandle,
        dim: Dim,
        arrayed: bool,
        multisampled: bool,
        /// Read-write (storage) texture rather than a sampled one.
        rw: bool,
    },
    /// Byte-addressed raw buffer, backed by a runtime array of uint.
    ByteBuffer {
        rw: bool,
    },
    /// A texture paired with a sampler, as consumed by sampling ops.
    SampledImage {
        image: TypeHandle,
    },
    Pointer {
        base: TypeHandle,
        storage: StorageClass,
    },
}

/// Arena of canonical type descriptors with a name-keyed intern cache.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDesc>,
    by_name: HashMap<String, TypeHandle>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a descriptor, returning the canonical handle for its shape.
    pub fn intern(&mut self, desc: TypeDesc) -> TypeHandle {
        let name = self.name_of_desc(&desc);
        if let Some(&handle) = self.by_name.get(&name) {
            return handle;
        }
        let handle = TypeHandle(self.types.len() as u32);
        self.types.push(desc);
        self.by_name.insert(name, handle);
        handle
    }

    pub fn get(&self, handle: TypeHandle) -> &TypeDesc {
        &self.types[handle.0 as usize]
    }

    /// Canonical (HLSL-flavored) spelling of a type.
    pub fn name(&self, handle: TypeHandle) -> String {
        self.name_of_desc(&self.types[handle.0 as usize])
    }

    fn name_of_desc(&self, desc: &TypeDesc) -> String {
        match desc {
            TypeDesc::Void => "void".into(),
            TypeDesc::Scalar(kind) => kind.name().into(),
            TypeDesc::Vector { base, size } => format!("{}{}", self.name(*base), size),
            TypeDesc::Matrix { column, columns } => {
                format!("{}x{}", self.name(*column), columns)
            }
            TypeDesc::Array { element, length } => match length {
                Some(n) => format!("{}[{}]", self.name(*element), n),
                None => format!("{}[]", self.name(*element)),
            },
            TypeDesc::Struct { name, .. } => name.clone(),
            TypeDesc::Sampler => "SamplerState".into(),
            TypeDesc::Texture {
                sampled,
                dim,
                arrayed,
                multisampled,
                rw,
            } => {
                let mut name = String::new();
                if *rw {
                    name.push_str("RW");
                }
                name.push_str(match dim {
                    Dim::D1 => "Texture1D",
                    Dim::D2 => "Texture2D",
                    Dim::D3 => "Texture3D",
                    Dim::Cube => "TextureCube",
                });
                if *multisampled {
                    name.push_str("MS");
                }
                if *arrayed {
                    name.push_str("Array");
                }
                format!("{}<{}>", name, self.name(*sampled))
            }
            TypeDesc::ByteBuffer { rw } => if *rw {
                "RWByteAddressBuffer"
            } else {
                "ByteAddressBuffer"
            }
            .into(),
            TypeDesc::SampledImage { image } => format!("sampled<{}>", self.name(*image)),
            TypeDesc::Pointer { base, storage } => {
                format!("ptr<{:?}, {}>", storage, self.name(*base))
            }
        }
    }

    // Shorthand constructors for the shapes the lowering pass reaches for
    // constantly.

    pub fn void(&mut self) -> TypeHandle {
        self.intern(TypeDesc::Void)
    }

    pub fn bool(&mut self) -> TypeHandle {
        self.intern(TypeDesc::Scalar(ScalarKind::Bool))
    }

    pub fn int(&mut self) -> TypeHandle {
        self.intern(TypeDesc::Scalar(ScalarKind::Int))
    }

    pub fn uint(&mut self) -> TypeHandle {
        self.intern(TypeDesc::Scalar(ScalarKind::UInt))
    }

    pub fn float(&mut self) -> TypeHandle {
        self.intern(TypeDesc::Scalar(ScalarKind::Float))
    }

    pub fn vector(&mut self, base: TypeHandle, size: u8) -> TypeHandle {
        self.intern(TypeDesc::Vector { base, size })
    }

    /// Scalar for size 1, vector otherwise.
    pub fn scalar_or_vector(&mut self, base: TypeHandle, size: u8) -> TypeHandle {
        if size <= 1 {
            base
        } else {
            self.vector(base, size)
        }
    }

    pub fn pointer(&mut self, base: TypeHandle, storage: StorageClass) -> TypeHandle {
        self.intern(TypeDesc::Pointer { base, storage })
    }

    /// Scalar kind of a type, looking through vectors.
    pub fn scalar_kind(&self, handle: TypeHandle) -> Option<ScalarKind> {
        match self.get(handle) {
            TypeDesc::Scalar(kind) => Some(*kind),
            TypeDesc::Vector { base, .. } => self.scalar_kind(*base),
            _ => None,
        }
    }

    /// Component count: 1 for scalars, N for vectors.
    pub fn component_count(&self, handle: TypeHandle) -> Option<u8> {
        match self.get(handle) {
            TypeDesc::Scalar(_) => Some(1),
            TypeDesc::Vector { size, .. } => Some(*size),
            _ => None,
        }
    }
}

/// A variable binding produced by the front end or the lowering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeHandle,
    /// Result id of the lowered variable, once one exists.
    pub id: Option<u32>,
}

/// Lexical scope stack.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl ScopeStack {
    /// Starts with one open root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope, dropping its bindings. The root scope stays.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declare in the innermost scope. A name live in any open scope is a
    /// duplicate, including the scopes above the current one.
    pub fn declare(&mut self, symbol: Symbol) -> Result<(), SymbolError> {
        if self.scopes.iter().any(|s| s.contains_key(&symbol.name)) {
            return Err(SymbolError::DuplicateDeclaration { name: symbol.name });
        }
        self.scopes
            .last_mut()
            .expect("root scope always open")
            .insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Resolve innermost-to-outermost.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

//! The structural type system.
//!
//! Types are interned in a [`UniqueArena`] owned by the module; every
//! descriptor is referenced through a [`Handle`]. Identity is structural:
//! [`types_equal`] compares descriptors shape-by-shape (with an unresolved
//! array length acting as a wildcard), and [`weak_signature`] /
//! [`TypeRef::strong_signature`] produce the string keys used for overload
//! tables and diagnostics.

use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::arena::{Handle, UniqueArena};

/// Built-in scalar kinds.
///
/// `String`, `Texture` and the sampler kinds are opaque resource types: they
/// can be declared and passed around, but no operator or register lowering
/// accepts them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Void,
    Int,
    Bool,
    Float,
    String,
    Texture,
    Sampler,
    Sampler2D,
    SamplerCube,
}

pub(crate) const SCALAR_KIND_COUNT: usize = 9;

impl ScalarKind {
    /// Source-level spelling of the type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::String => "string",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
            Self::Sampler2D => "sampler2D",
            Self::SamplerCube => "samplerCUBE",
        }
    }

    /// True for kinds that participate in arithmetic.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// True for kinds that can live in registers (4-byte words).
    pub fn is_register(self) -> bool {
        matches!(self, Self::Int | Self::Bool | Self::Float)
    }

    /// True for opaque resource kinds (never legal in expressions).
    pub fn is_resource(self) -> bool {
        matches!(
            self,
            Self::String | Self::Texture | Self::Sampler | Self::Sampler2D | Self::SamplerCube
        )
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of components in a vector, or rows in a matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VectorSize {
    Bi = 2,
    Tri = 3,
    Quad = 4,
}

impl VectorSize {
    /// Component count as a plain integer.
    pub fn count(self) -> u32 {
        self as u32
    }

    /// Maps 2/3/4 back to a size.
    pub fn from_count(n: u32) -> Option<Self> {
        match n {
            2 => Some(Self::Bi),
            3 => Some(Self::Tri),
            4 => Some(Self::Quad),
            _ => None,
        }
    }
}

/// Array extent. `Undefined` means the declared length expression was not a
/// compile-time constant (yet); equality treats it as a wildcard and sizing
/// reports it as unresolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArraySize {
    Constant(u32),
    Undefined,
}

/// A named member of a struct type, with its resolved byte offset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructMember {
    pub name: String,
    pub ty: Handle<Type>,
    pub offset: u32,
}

/// A type descriptor. The optional name is the source-level spelling for
/// named types (builtins, structs); anonymous composites leave it `None`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    pub name: Option<String>,
    pub inner: TypeInner,
}

/// The structural variants.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeInner {
    Scalar(ScalarKind),
    Vector {
        base: Handle<Type>,
        size: VectorSize,
    },
    /// `rows` row vectors of type `row` (HLSL `floatRxC` layout).
    Matrix {
        row: Handle<Type>,
        rows: VectorSize,
    },
    Struct {
        members: Vec<StructMember>,
    },
    Array {
        base: Handle<Type>,
        size: ArraySize,
    },
}

// ---------------------------------------------------------------------------
// Qualifiers
// ---------------------------------------------------------------------------

/// Usage qualifier set for a declared variable or parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Qualifiers(u8);

impl Qualifiers {
    pub const NONE: Self = Self(0);
    pub const UNIFORM: Self = Self(1);
    pub const CONST: Self = Self(1 << 1);
    pub const IN: Self = Self(1 << 2);
    pub const OUT: Self = Self(1 << 3);
    pub const INOUT: Self = Self(1 << 4);

    /// Returns `true` if all flags in `other` are set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no qualifier is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Qualifier names in a fixed order, for the strong signature.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        const ALL: [(Qualifiers, &str); 5] = [
            (Qualifiers::CONST, "const"),
            (Qualifiers::IN, "in"),
            (Qualifiers::INOUT, "inout"),
            (Qualifiers::OUT, "out"),
            (Qualifiers::UNIFORM, "uniform"),
        ];
        ALL.into_iter()
            .filter(move |(q, _)| self.contains(*q))
            .map(|(_, n)| n)
    }
}

impl BitOr for Qualifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Qualifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for name in self.names() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TypeRef
// ---------------------------------------------------------------------------

/// A qualified reference to a type, as carried by declarations and by every
/// typed expression node.
///
/// The readable/writable overrides exist for dataflow the qualifiers alone
/// cannot express: an `out` parameter starts unreadable and becomes readable
/// once an assignment targets it.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRef {
    pub ty: Handle<Type>,
    pub quals: Qualifiers,
    pub readable_override: Option<bool>,
    pub writable_override: Option<bool>,
}

impl TypeRef {
    /// An unqualified reference.
    pub fn new(ty: Handle<Type>) -> Self {
        Self {
            ty,
            quals: Qualifiers::NONE,
            readable_override: None,
            writable_override: None,
        }
    }

    /// A qualified reference.
    pub fn with_quals(ty: Handle<Type>, quals: Qualifiers) -> Self {
        Self {
            ty,
            quals,
            readable_override: None,
            writable_override: None,
        }
    }

    /// Whether reads through this reference are legal.
    pub fn readable(&self) -> bool {
        if let Some(forced) = self.readable_override {
            return forced;
        }
        !(self.quals.contains(Qualifiers::OUT) && !self.quals.contains(Qualifiers::INOUT))
    }

    /// Whether assignment through this reference is legal.
    ///
    /// Uniform and const references are read-only; arrays are assignable as
    /// a whole only when their element type is a base (register) type.
    pub fn writable(&self, types: &UniqueArena<Type>) -> bool {
        if let Some(forced) = self.writable_override {
            return forced;
        }
        if self.quals.contains(Qualifiers::UNIFORM) || self.quals.contains(Qualifiers::CONST) {
            return false;
        }
        if let TypeInner::Array { base, .. } = types[self.ty].inner {
            return is_base(types, base);
        }
        true
    }

    /// Structural equality of the underlying types; qualifiers are ignored.
    pub fn is_equal(&self, other: &TypeRef, types: &UniqueArena<Type>) -> bool {
        types_equal(types, self.ty, other.ty)
    }

    /// Structural equality plus an exact qualifier match.
    pub fn is_strong_equal(&self, other: &TypeRef, types: &UniqueArena<Type>) -> bool {
        self.quals == other.quals && self.is_equal(other, types)
    }

    /// The structural identity key, ignoring qualifiers.
    pub fn weak_signature(&self, types: &UniqueArena<Type>) -> String {
        weak_signature(types, self.ty)
    }

    /// The weak signature prefixed with the qualifier names.
    pub fn strong_signature(&self, types: &UniqueArena<Type>) -> String {
        let mut out = String::new();
        for name in self.quals.names() {
            out.push_str(name);
            out.push('.');
        }
        out.push_str(&weak_signature(types, self.ty));
        out
    }
}

// ---------------------------------------------------------------------------
// Structural queries
// ---------------------------------------------------------------------------

/// Structural equality. Struct member names are ignored; an `Undefined`
/// array length matches any length of the same element type (the length is
/// validated when a size is actually needed, not here).
pub fn types_equal(types: &UniqueArena<Type>, a: Handle<Type>, b: Handle<Type>) -> bool {
    if a == b {
        return true;
    }
    match (&types[a].inner, &types[b].inner) {
        (TypeInner::Scalar(x), TypeInner::Scalar(y)) => x == y,
        (
            TypeInner::Vector { base: b1, size: s1 },
            TypeInner::Vector { base: b2, size: s2 },
        ) => s1 == s2 && types_equal(types, *b1, *b2),
        (
            TypeInner::Matrix { row: r1, rows: n1 },
            TypeInner::Matrix { row: r2, rows: n2 },
        ) => n1 == n2 && types_equal(types, *r1, *r2),
        (TypeInner::Struct { members: m1 }, TypeInner::Struct { members: m2 }) => {
            m1.len() == m2.len()
                && m1
                    .iter()
                    .zip(m2)
                    .all(|(x, y)| types_equal(types, x.ty, y.ty))
        }
        (
            TypeInner::Array { base: b1, size: s1 },
            TypeInner::Array { base: b2, size: s2 },
        ) => {
            let lengths_match = match (s1, s2) {
                (ArraySize::Undefined, _) | (_, ArraySize::Undefined) => true,
                (ArraySize::Constant(x), ArraySize::Constant(y)) => x == y,
            };
            lengths_match && types_equal(types, *b1, *b2)
        }
        _ => false,
    }
}

/// The structural identity key of a type. Equal structures produce equal
/// signatures; an unresolved array length renders as `[?]`.
pub fn weak_signature(types: &UniqueArena<Type>, ty: Handle<Type>) -> String {
    match &types[ty].inner {
        TypeInner::Scalar(kind) => kind.name().to_string(),
        TypeInner::Vector { base, size } => {
            format!("{}{}", weak_signature(types, *base), size.count())
        }
        TypeInner::Matrix { row, rows } => {
            let (base, cols) = match &types[*row].inner {
                TypeInner::Vector { base, size } => (weak_signature(types, *base), size.count()),
                _ => (weak_signature(types, *row), 1),
            };
            format!("{}{}x{}", base, rows.count(), cols)
        }
        TypeInner::Struct { members } => {
            let mut out = String::from("{");
            for member in members {
                out.push_str(&weak_signature(types, member.ty));
                out.push(';');
            }
            out.push('}');
            out
        }
        TypeInner::Array { base, size } => {
            let len = match size {
                ArraySize::Constant(n) => n.to_string(),
                ArraySize::Undefined => "?".to_string(),
            };
            format!("{}[{}]", weak_signature(types, *base), len)
        }
    }
}

/// Padded byte size, or `None` while any array dimension is unresolved or
/// the type is an opaque resource.
pub fn byte_size(types: &UniqueArena<Type>, ty: Handle<Type>) -> Option<u32> {
    match &types[ty].inner {
        TypeInner::Scalar(kind) => match kind {
            ScalarKind::Void => Some(0),
            k if k.is_register() => Some(4),
            _ => None,
        },
        TypeInner::Vector { size, .. } => Some(size.count() * 4),
        TypeInner::Matrix { row, rows } => Some(rows.count() * byte_size(types, *row)?),
        TypeInner::Struct { members } => {
            let mut total = 0u32;
            for member in members {
                total += byte_size(types, member.ty)?;
            }
            Some(total)
        }
        TypeInner::Array { base, size } => match size {
            ArraySize::Constant(n) => Some(n * byte_size(types, *base)?),
            ArraySize::Undefined => None,
        },
    }
}

/// Unwraps vectors, matrices and arrays down to the element scalar kind.
/// Structs have no single base scalar.
pub fn base_scalar(types: &UniqueArena<Type>, ty: Handle<Type>) -> Option<ScalarKind> {
    match &types[ty].inner {
        TypeInner::Scalar(kind) => Some(*kind),
        TypeInner::Vector { base, .. } | TypeInner::Array { base, .. } => {
            base_scalar(types, *base)
        }
        TypeInner::Matrix { row, .. } => base_scalar(types, *row),
        TypeInner::Struct { .. } => None,
    }
}

/// A base type is a register scalar or a vector/matrix built from one,
/// the family operators and registers understand directly.
pub fn is_base(types: &UniqueArena<Type>, ty: Handle<Type>) -> bool {
    match &types[ty].inner {
        TypeInner::Scalar(kind) => kind.is_register(),
        TypeInner::Vector { base, .. } => is_base(types, *base),
        TypeInner::Matrix { row, .. } => is_base(types, *row),
        TypeInner::Struct { .. } | TypeInner::Array { .. } => false,
    }
}

/// True if the type contains an array or an opaque resource anywhere in its
/// structure. Struct equality comparison is only legal when this is false.
pub fn contains_opaque(types: &UniqueArena<Type>, ty: Handle<Type>) -> bool {
    match &types[ty].inner {
        TypeInner::Scalar(kind) => kind.is_resource(),
        TypeInner::Vector { base, .. } => contains_opaque(types, *base),
        TypeInner::Matrix { row, .. } => contains_opaque(types, *row),
        TypeInner::Struct { members } => {
            members.iter().any(|m| contains_opaque(types, m.ty))
        }
        TypeInner::Array { .. } => true,
    }
}

// ---------------------------------------------------------------------------
// Field & swizzle resolution
// ---------------------------------------------------------------------------

/// Result of resolving a `.name` access.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldAccess {
    /// A struct member at a fixed byte offset.
    Member {
        index: u32,
        ty: Handle<Type>,
        offset: u32,
    },
    /// A vector swizzle; `components` holds source component indices in
    /// result order. Writable only when no component repeats.
    Swizzle {
        components: Vec<u8>,
        ty: Handle<Type>,
        writable: bool,
    },
}

const SWIZZLE_ALPHABETS: [[char; 4]; 3] = [
    ['x', 'y', 'z', 'w'],
    ['r', 'g', 'b', 'a'],
    ['s', 't', 'p', 'q'],
];

/// Resolves a member or swizzle access on `ty`.
///
/// Swizzle names must come from a single component alphabet
/// (`xyzw`/`rgba`/`stpq`), every letter must index inside the vector's
/// arity, and the swizzle length may not exceed the arity.
pub fn field_access(
    types: &UniqueArena<Type>,
    sys: &SystemTypes,
    ty: Handle<Type>,
    name: &str,
) -> Option<FieldAccess> {
    match &types[ty].inner {
        TypeInner::Struct { members } => {
            members
                .iter()
                .enumerate()
                .find(|(_, m)| m.name == name)
                .map(|(index, m)| FieldAccess::Member {
                    index: index as u32,
                    ty: m.ty,
                    offset: m.offset,
                })
        }
        TypeInner::Vector { base, size } => {
            let arity = size.count() as usize;
            if name.is_empty() || name.len() > arity {
                return None;
            }
            let components = SWIZZLE_ALPHABETS
                .iter()
                .find_map(|alphabet| swizzle_components(alphabet, arity, name))?;
            let result_ty = if components.len() == 1 {
                *base
            } else {
                let kind = base_scalar(types, *base)?;
                let size = VectorSize::from_count(components.len() as u32)?;
                sys.vector(kind, size)?
            };
            let mut seen = [false; 4];
            let mut writable = true;
            for &c in &components {
                if seen[c as usize] {
                    writable = false;
                }
                seen[c as usize] = true;
            }
            Some(FieldAccess::Swizzle {
                components,
                ty: result_ty,
                writable,
            })
        }
        _ => None,
    }
}

fn swizzle_components(alphabet: &[char; 4], arity: usize, name: &str) -> Option<Vec<u8>> {
    name.chars()
        .map(|c| {
            let index = alphabet.iter().position(|&a| a == c)?;
            (index < arity).then_some(index as u8)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// System types
// ---------------------------------------------------------------------------

/// Handles to every builtin type, interned once per module.
///
/// Covers the scalars, the `float2..=4`/`int2..=4`/`bool2..=4` vector
/// families and the full `<base><rows>x<cols>` matrix family for rows and
/// columns in 2..=4.
#[derive(Clone, Debug)]
pub struct SystemTypes {
    scalars: [Handle<Type>; SCALAR_KIND_COUNT],
    vectors: HashMap<(ScalarKind, VectorSize), Handle<Type>>,
    matrices: HashMap<(ScalarKind, VectorSize, VectorSize), Handle<Type>>,
    names: HashMap<String, Handle<Type>>,
}

const SCALAR_KINDS: [ScalarKind; SCALAR_KIND_COUNT] = [
    ScalarKind::Void,
    ScalarKind::Int,
    ScalarKind::Bool,
    ScalarKind::Float,
    ScalarKind::String,
    ScalarKind::Texture,
    ScalarKind::Sampler,
    ScalarKind::Sampler2D,
    ScalarKind::SamplerCube,
];

const VECTOR_BASES: [ScalarKind; 3] = [ScalarKind::Float, ScalarKind::Int, ScalarKind::Bool];
const VECTOR_SIZES: [VectorSize; 3] = [VectorSize::Bi, VectorSize::Tri, VectorSize::Quad];

impl SystemTypes {
    /// Interns the builtin type family and returns the handle table.
    pub fn register(types: &mut UniqueArena<Type>) -> Self {
        let mut names = HashMap::new();

        let scalars = SCALAR_KINDS.map(|kind| {
            let handle = types.insert(Type {
                name: Some(kind.name().to_string()),
                inner: TypeInner::Scalar(kind),
            });
            names.insert(kind.name().to_string(), handle);
            handle
        });

        let scalar_of = |kind: ScalarKind| scalars[kind as usize];

        let mut vectors = HashMap::new();
        for kind in VECTOR_BASES {
            for size in VECTOR_SIZES {
                let name = format!("{}{}", kind.name(), size.count());
                let handle = types.insert(Type {
                    name: Some(name.clone()),
                    inner: TypeInner::Vector {
                        base: scalar_of(kind),
                        size,
                    },
                });
                vectors.insert((kind, size), handle);
                names.insert(name, handle);
            }
        }

        let mut matrices = HashMap::new();
        for kind in VECTOR_BASES {
            for rows in VECTOR_SIZES {
                for cols in VECTOR_SIZES {
                    let name = format!("{}{}x{}", kind.name(), rows.count(), cols.count());
                    let handle = types.insert(Type {
                        name: Some(name.clone()),
                        inner: TypeInner::Matrix {
                            row: vectors[&(kind, cols)],
                            rows,
                        },
                    });
                    matrices.insert((kind, rows, cols), handle);
                    names.insert(name, handle);
                }
            }
        }

        Self {
            scalars,
            vectors,
            matrices,
            names,
        }
    }

    /// Handle of a builtin scalar.
    pub fn scalar(&self, kind: ScalarKind) -> Handle<Type> {
        self.scalars[kind as usize]
    }

    /// Handle of a builtin vector, if the base kind has a vector family.
    pub fn vector(&self, kind: ScalarKind, size: VectorSize) -> Option<Handle<Type>> {
        self.vectors.get(&(kind, size)).copied()
    }

    /// Handle of a builtin matrix.
    pub fn matrix(
        &self,
        kind: ScalarKind,
        rows: VectorSize,
        cols: VectorSize,
    ) -> Option<Handle<Type>> {
        self.matrices.get(&(kind, rows, cols)).copied()
    }

    /// Looks up any builtin type by its source spelling.
    pub fn by_name(&self, name: &str) -> Option<Handle<Type>> {
        self.names.get(name).copied()
    }

    /// Iterates over `(name, handle)` for scope seeding.
    pub fn names(&self) -> impl Iterator<Item = (&str, Handle<Type>)> {
        self.names.iter().map(|(n, &h)| (n.as_str(), h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (UniqueArena<Type>, SystemTypes) {
        let mut types = UniqueArena::new();
        let sys = SystemTypes::register(&mut types);
        (types, sys)
    }

    #[test]
    fn independently_built_descriptors_are_equal() {
        let (mut types, sys) = fixture();
        let float = sys.scalar(ScalarKind::Float);
        let a = types.insert(Type {
            name: None,
            inner: TypeInner::Array {
                base: float,
                size: ArraySize::Constant(8),
            },
        });
        let b = types.insert(Type {
            name: None,
            inner: TypeInner::Array {
                base: float,
                size: ArraySize::Constant(8),
            },
        });
        assert!(types_equal(&types, a, b));
        assert_eq!(weak_signature(&types, a), weak_signature(&types, b));
        assert_eq!(weak_signature(&types, a), "float[8]");
    }

    #[test]
    fn distinct_scalar_kinds_are_never_equal() {
        let (types, sys) = fixture();
        for a in [ScalarKind::Int, ScalarKind::Float, ScalarKind::Bool] {
            for b in [ScalarKind::Int, ScalarKind::Float, ScalarKind::Bool] {
                let equal = types_equal(&types, sys.scalar(a), sys.scalar(b));
                assert_eq!(equal, a == b, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn undefined_array_length_is_a_wildcard() {
        let (mut types, sys) = fixture();
        let float = sys.scalar(ScalarKind::Float);
        let sized = types.insert(Type {
            name: None,
            inner: TypeInner::Array {
                base: float,
                size: ArraySize::Constant(4),
            },
        });
        let unsized_ = types.insert(Type {
            name: None,
            inner: TypeInner::Array {
                base: float,
                size: ArraySize::Undefined,
            },
        });
        assert!(types_equal(&types, sized, unsized_));
        assert_eq!(byte_size(&types, unsized_), None);
        assert_eq!(byte_size(&types, sized), Some(16));
        // The wildcard does not cross element types.
        let int_arr = types.insert(Type {
            name: None,
            inner: TypeInner::Array {
                base: sys.scalar(ScalarKind::Int),
                size: ArraySize::Undefined,
            },
        });
        assert!(!types_equal(&types, sized, int_arr));
    }

    #[test]
    fn struct_equality_is_structural() {
        let (mut types, sys) = fixture();
        let float = sys.scalar(ScalarKind::Float);
        let a = types.insert(Type {
            name: Some("PointA".into()),
            inner: TypeInner::Struct {
                members: vec![
                    StructMember {
                        name: "px".into(),
                        ty: float,
                        offset: 0,
                    },
                    StructMember {
                        name: "py".into(),
                        ty: float,
                        offset: 4,
                    },
                ],
            },
        });
        let b = types.insert(Type {
            name: Some("PointB".into()),
            inner: TypeInner::Struct {
                members: vec![
                    StructMember {
                        name: "u".into(),
                        ty: float,
                        offset: 0,
                    },
                    StructMember {
                        name: "v".into(),
                        ty: float,
                        offset: 4,
                    },
                ],
            },
        });
        assert!(types_equal(&types, a, b));
        assert_eq!(weak_signature(&types, a), "{float;float;}");
        assert_eq!(byte_size(&types, a), Some(8));
    }

    #[test]
    fn swizzles_resolve_across_all_alphabets() {
        let (types, sys) = fixture();
        for (kind, size) in [
            (ScalarKind::Float, VectorSize::Bi),
            (ScalarKind::Float, VectorSize::Tri),
            (ScalarKind::Float, VectorSize::Quad),
            (ScalarKind::Int, VectorSize::Tri),
            (ScalarKind::Bool, VectorSize::Quad),
        ] {
            let vec_ty = sys.vector(kind, size).unwrap();
            let arity = size.count() as usize;
            for alphabet in SWIZZLE_ALPHABETS {
                // Single letters resolve to the base scalar.
                for &letter in &alphabet[..arity] {
                    let access =
                        field_access(&types, &sys, vec_ty, &letter.to_string()).unwrap();
                    match access {
                        FieldAccess::Swizzle { ty, writable, .. } => {
                            assert_eq!(ty, sys.scalar(kind));
                            assert!(writable);
                        }
                        FieldAccess::Member { .. } => panic!("expected swizzle"),
                    }
                }
                // Full-arity swizzles resolve to a vector of matching arity.
                let full: String = alphabet[..arity].iter().collect();
                match field_access(&types, &sys, vec_ty, &full).unwrap() {
                    FieldAccess::Swizzle { ty, writable, .. } => {
                        assert_eq!(ty, vec_ty);
                        assert!(writable);
                    }
                    FieldAccess::Member { .. } => panic!("expected swizzle"),
                }
            }
        }
    }

    #[test]
    fn swizzle_rejects_foreign_letters_and_out_of_range() {
        let (types, sys) = fixture();
        let float2 = sys.vector(ScalarKind::Float, VectorSize::Bi).unwrap();
        let float3 = sys.vector(ScalarKind::Float, VectorSize::Tri).unwrap();
        // 'v' is in no alphabet.
        assert_eq!(field_access(&types, &sys, float3, "v"), None);
        // 'z' indexes component 2, out of range for a two-component vector.
        assert_eq!(field_access(&types, &sys, float2, "z"), None);
        // Alphabets cannot be mixed.
        assert_eq!(field_access(&types, &sys, float3, "xg"), None);
        // Swizzle length is capped at the arity.
        assert_eq!(field_access(&types, &sys, float2, "xyx"), None);
    }

    #[test]
    fn repeated_swizzle_letters_are_readable_but_not_writable() {
        let (types, sys) = fixture();
        let float3 = sys.vector(ScalarKind::Float, VectorSize::Tri).unwrap();
        match field_access(&types, &sys, float3, "xxy").unwrap() {
            FieldAccess::Swizzle {
                components,
                writable,
                ..
            } => {
                assert_eq!(components, vec![0, 0, 1]);
                assert!(!writable);
            }
            FieldAccess::Member { .. } => panic!("expected swizzle"),
        }
    }

    #[test]
    fn out_parameters_become_readable_via_override() {
        let (_, sys) = fixture();
        let mut out_param = TypeRef::with_quals(sys.scalar(ScalarKind::Float), Qualifiers::OUT);
        assert!(!out_param.readable());
        out_param.readable_override = Some(true);
        assert!(out_param.readable());
        let inout = TypeRef::with_quals(sys.scalar(ScalarKind::Float), Qualifiers::INOUT);
        assert!(inout.readable());
    }

    #[test]
    fn uniform_and_const_are_not_writable() {
        let (types, sys) = fixture();
        let float = sys.scalar(ScalarKind::Float);
        assert!(!TypeRef::with_quals(float, Qualifiers::UNIFORM).writable(&types));
        assert!(!TypeRef::with_quals(float, Qualifiers::CONST).writable(&types));
        assert!(TypeRef::new(float).writable(&types));
    }

    #[test]
    fn arrays_of_struct_elements_are_not_writable() {
        let (mut types, sys) = fixture();
        let float = sys.scalar(ScalarKind::Float);
        let point = types.insert(Type {
            name: Some("P".into()),
            inner: TypeInner::Struct {
                members: vec![StructMember {
                    name: "x".into(),
                    ty: float,
                    offset: 0,
                }],
            },
        });
        let struct_arr = types.insert(Type {
            name: None,
            inner: TypeInner::Array {
                base: point,
                size: ArraySize::Constant(2),
            },
        });
        let float_arr = types.insert(Type {
            name: None,
            inner: TypeInner::Array {
                base: float,
                size: ArraySize::Constant(2),
            },
        });
        assert!(!TypeRef::new(struct_arr).writable(&types));
        assert!(TypeRef::new(float_arr).writable(&types));
    }

    #[test]
    fn strong_signature_includes_qualifiers() {
        let (types, sys) = fixture();
        let float3 = sys.vector(ScalarKind::Float, VectorSize::Tri).unwrap();
        let plain = TypeRef::new(float3);
        let qualified = TypeRef::with_quals(float3, Qualifiers::UNIFORM | Qualifiers::CONST);
        assert_eq!(plain.weak_signature(&types), qualified.weak_signature(&types));
        assert_eq!(plain.strong_signature(&types), "float3");
        assert_eq!(qualified.strong_signature(&types), "const.uniform.float3");
        assert!(plain.is_equal(&qualified, &types));
        assert!(!plain.is_strong_equal(&qualified, &types));
    }

    #[test]
    fn matrix_signatures_spell_rows_by_columns() {
        let (types, sys) = fixture();
        let m = sys
            .matrix(ScalarKind::Float, VectorSize::Bi, VectorSize::Quad)
            .unwrap();
        assert_eq!(weak_signature(&types, m), "float2x4");
        assert_eq!(byte_size(&types, m), Some(32));
        assert_eq!(base_scalar(&types, m), Some(ScalarKind::Float));
    }

    #[test]
    fn system_names_cover_the_builtin_family() {
        let (_, sys) = fixture();
        for name in ["void", "float", "int3", "bool4", "float4x4", "samplerCUBE"] {
            assert!(sys.by_name(name).is_some(), "missing builtin {name}");
        }
        assert!(sys.by_name("float5").is_none());
    }
}

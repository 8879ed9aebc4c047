//! Builtin function environment.
//!
//! [`Environment::bootstrap`] builds the system function table against an
//! interned type family. The table is consulted only after user scopes
//! fail to produce a match, so user declarations may take over a builtin
//! name. Each entry records how the bytecode compiler lowers the call and
//! which shader stages may use it.

use pfx_ir::{
    Handle, MathFunction, ScalarKind, SystemTypes, Type, TypeInner, TypeRef, UniqueArena,
    VectorSize, types_equal,
};

/// How a builtin call is represented in the typed tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lowering {
    /// Component-wise math intrinsic.
    Math(MathFunction),
    /// Atomic bump of a buffer's counter word.
    CounterIncrement,
    /// The flat invocation index of the current dispatch.
    ThreadIndex,
}

/// What a builtin accepts in one parameter position.
#[derive(Clone, Copy, Debug)]
pub enum ParamRule {
    /// Exactly this type, by structural equality.
    Exact(Handle<Type>),
    /// Any array type; buffers are array-typed values.
    Buffer,
}

/// One builtin signature.
#[derive(Clone, Debug)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub params: Vec<ParamRule>,
    pub result: Handle<Type>,
    pub lowering: Lowering,
    pub valid_for_vertex: bool,
    pub valid_for_pixel: bool,
}

impl BuiltinFunction {
    /// First-match test: arity plus per-position structural equality.
    pub fn matches(&self, types: &UniqueArena<Type>, args: &[TypeRef]) -> bool {
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(rule, arg)| match rule {
                ParamRule::Exact(ty) => types_equal(types, *ty, arg.ty),
                ParamRule::Buffer => matches!(types[arg.ty].inner, TypeInner::Array { .. }),
            })
    }
}

/// The bootstrapped builtin table.
#[derive(Clone, Debug)]
pub struct Environment {
    builtins: Vec<BuiltinFunction>,
}

const VECTOR_SIZES: [VectorSize; 3] = [VectorSize::Bi, VectorSize::Tri, VectorSize::Quad];

impl Environment {
    /// Builds the system function table for one interned type family.
    pub fn bootstrap(sys: &SystemTypes) -> Self {
        let float = sys.scalar(ScalarKind::Float);
        let int = sys.scalar(ScalarKind::Int);

        // float, float2, float3, float4: the component-wise family covers
        // every width with one entry each.
        let mut widths = vec![float];
        for size in VECTOR_SIZES {
            widths.push(sys.vector(ScalarKind::Float, size).unwrap());
        }

        let mut builtins = Vec::new();
        let mut math = |name, params: Vec<ParamRule>, result, fun| {
            builtins.push(BuiltinFunction {
                name,
                params,
                result,
                lowering: Lowering::Math(fun),
                valid_for_vertex: true,
                valid_for_pixel: true,
            });
        };

        let unary = [
            ("abs", MathFunction::Abs),
            ("floor", MathFunction::Floor),
            ("ceil", MathFunction::Ceil),
            ("frac", MathFunction::Frac),
            ("sin", MathFunction::Sin),
            ("cos", MathFunction::Cos),
            ("sqrt", MathFunction::Sqrt),
        ];
        for (name, fun) in unary {
            for &ty in &widths {
                math(name, vec![ParamRule::Exact(ty)], ty, fun);
            }
        }
        for (name, fun) in [("min", MathFunction::Min), ("max", MathFunction::Max)] {
            for &ty in &widths {
                math(name, vec![ParamRule::Exact(ty); 2], ty, fun);
            }
        }
        for &ty in &widths {
            math("lerp", vec![ParamRule::Exact(ty); 3], ty, MathFunction::Lerp);
        }
        // dot is defined for vectors only; a scalar dot is just `*`.
        for &ty in &widths[1..] {
            math("dot", vec![ParamRule::Exact(ty); 2], float, MathFunction::Dot);
        }

        // Dispatch-only intrinsics: no shader stage can evaluate them, so
        // using one anywhere under a vertex or pixel entry disqualifies
        // the caller.
        builtins.push(BuiltinFunction {
            name: "incrementCounter",
            params: vec![ParamRule::Buffer],
            result: int,
            lowering: Lowering::CounterIncrement,
            valid_for_vertex: false,
            valid_for_pixel: false,
        });
        builtins.push(BuiltinFunction {
            name: "threadIndex",
            params: Vec::new(),
            result: int,
            lowering: Lowering::ThreadIndex,
            valid_for_vertex: false,
            valid_for_pixel: false,
        });

        Self { builtins }
    }

    /// Candidates for a name, in registration order.
    pub fn candidates<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a BuiltinFunction> {
        self.builtins.iter().filter(move |b| b.name == name)
    }

    /// First builtin whose signature accepts the arguments.
    pub fn resolve(
        &self,
        types: &UniqueArena<Type>,
        name: &str,
        args: &[TypeRef],
    ) -> Option<&BuiltinFunction> {
        self.candidates(name).find(|b| b.matches(types, args))
    }

    /// Whether any builtin carries the name, regardless of signature.
    pub fn knows(&self, name: &str) -> bool {
        self.candidates(name).next().is_some()
    }
}

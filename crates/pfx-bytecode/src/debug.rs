//! Source mapping and reflection over a compiled program.
//!
//! The layout is an in-memory artifact only; it never travels with the
//! encoded binary.

use pfx_ir::Span;

/// Maps a half-open instruction range back to the source span of the
/// statement that produced it.
#[derive(Clone, Debug)]
pub struct SpanRecord {
    pub first: u32,
    pub limit: u32,
    pub span: Span,
}

/// A named patchable window in constant memory.
#[derive(Clone, Debug)]
pub struct UniformWindow {
    pub name: String,
    pub offset: u32,
    pub bytes: u32,
}

/// One entry parameter and the input slot it reads from.
#[derive(Clone, Debug)]
pub struct InputBinding {
    pub name: String,
    pub slot: u32,
    /// Byte size of one element: the element type for buffer parameters,
    /// the parameter type itself otherwise.
    pub element_bytes: u32,
}

#[derive(Clone, Debug, Default)]
pub struct DebugLayout {
    /// Statement ranges in emit order. Inlined statements nest inside
    /// their call site's range and are recorded after it.
    pub spans: Vec<SpanRecord>,
    pub uniforms: Vec<UniformWindow>,
    pub inputs: Vec<InputBinding>,
}

impl DebugLayout {
    /// Records the span of the instructions in `first..limit`. Empty
    /// ranges (statements that emitted nothing) are dropped.
    pub fn note(&mut self, first: u32, limit: u32, span: Span) {
        if first < limit {
            self.spans.push(SpanRecord { first, limit, span });
        }
    }

    /// The source span of one instruction. The latest record wins, which
    /// is the innermost statement when inlining nests ranges.
    pub fn span_for(&self, instruction: u32) -> Option<Span> {
        self.spans
            .iter()
            .rev()
            .find(|r| r.first <= instruction && instruction < r.limit)
            .map(|r| r.span)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformWindow> {
        self.uniforms.iter().find(|w| w.name == name)
    }
}

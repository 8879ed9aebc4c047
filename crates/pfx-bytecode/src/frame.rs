//! The inlining frame stack.
//!
//! Calls are expanded at compile time: each inlined callee pushes a frame
//! that maps its declarations to addresses, and pops it when its body has
//! been emitted. Register offsets come from a single monotonic arena that
//! is never rewound, so no two live values can alias. Symbol keys are
//! declaration handles, which are unique per declaration, so an inner
//! frame can never capture an outer frame's locals by accident; lookups
//! still walk outward so globals bound in the root frame stay visible
//! inside any inlining depth.

use std::collections::HashMap;

use pfx_ir::{Handle, VariableDecl};

use crate::const_pool::ConstClass;

/// How an external buffer access finds its word index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtIndex {
    /// Known at compile time.
    Static(u32),
    /// Held in a register at run time.
    Dynamic(u32),
}

/// A resolved storage location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Addr {
    /// Register-file byte offset.
    Reg(u32),
    /// Constant-memory byte offset (uniform windows and interned values).
    Const(u32),
    /// External buffer slot plus a word index into it.
    External { slot: u32, index: ExtIndex },
    /// The sentinel a failed resolution yields. Must never reach the
    /// instruction stream.
    Invalid,
}

impl Addr {
    /// Shifts an address by a byte offset, for member and static swizzle
    /// access. External addresses move by whole words.
    pub fn offset(self, bytes: u32) -> Addr {
        match self {
            Addr::Reg(r) => Addr::Reg(r + bytes),
            Addr::Const(c) => Addr::Const(c + bytes),
            Addr::External { slot, index } => match index {
                ExtIndex::Static(words) => Addr::External {
                    slot,
                    index: ExtIndex::Static(words + bytes / 4),
                },
                // A dynamic index absorbs static offsets through emitted
                // arithmetic instead; the caller handles that case.
                ExtIndex::Dynamic(_) => Addr::Invalid,
            },
            Addr::Invalid => Addr::Invalid,
        }
    }
}

/// What a frame binds a name to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    /// A declared variable, parameter, or global.
    Var(Handle<VariableDecl>),
    /// A constant already loaded into a register in this frame chain,
    /// keyed by class and bit pattern.
    Loaded(ConstClass, u32),
}

#[derive(Debug, Default)]
struct Frame {
    symbols: HashMap<SymbolKey, Addr>,
    ret_window: u32,
    ret_bytes: u32,
    ret_jumps: Vec<u32>,
}

/// State handed back when a frame pops, so the caller can patch every
/// `return` jump to the frame's exit and read the result window.
#[derive(Debug)]
pub struct PoppedFrame {
    pub ret_window: u32,
    pub ret_bytes: u32,
    pub ret_jumps: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct CallFrames {
    frames: Vec<Frame>,
    arena_top: u32,
}

impl CallFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a frame and allocates its return window up front, so the
    /// entry frame's window always sits at register offset zero.
    pub fn push(&mut self, ret_bytes: u32) -> u32 {
        let ret_window = self.alloca(ret_bytes);
        self.frames.push(Frame {
            symbols: HashMap::new(),
            ret_window,
            ret_bytes,
            ret_jumps: Vec::new(),
        });
        ret_window
    }

    pub fn pop(&mut self) -> PoppedFrame {
        let frame = self.frames.pop().unwrap_or_default();
        PoppedFrame {
            ret_window: frame.ret_window,
            ret_bytes: frame.ret_bytes,
            ret_jumps: frame.ret_jumps,
        }
    }

    /// Claims `bytes` of fresh register space.
    pub fn alloca(&mut self, bytes: u32) -> u32 {
        let offset = self.arena_top;
        self.arena_top += bytes;
        offset
    }

    /// Binds a key in the innermost frame.
    pub fn bind(&mut self, key: SymbolKey, addr: Addr) {
        if let Some(frame) = self.frames.last_mut() {
            frame.symbols.insert(key, addr);
        }
    }

    /// Innermost binding for `key`, walking outward.
    pub fn lookup(&self, key: SymbolKey) -> Option<Addr> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.symbols.get(&key).copied())
    }

    /// Records a `return` jump to patch when the current frame pops.
    pub fn note_ret_jump(&mut self, instruction: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ret_jumps.push(instruction);
        }
    }

    /// Forgets loaded-constant bindings in the innermost frame. Called at
    /// every branch and label, where a cached load stops dominating the
    /// code that follows. Outer frames keep theirs: those loads were
    /// emitted before the current inline site and every path through it.
    pub fn clear_loaded(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.symbols.retain(|key, _| matches!(key, SymbolKey::Var(_)));
        }
    }

    /// The current frame's return window and size.
    pub fn ret_window(&self) -> (u32, u32) {
        self.frames
            .last()
            .map(|f| (f.ret_window, f.ret_bytes))
            .unwrap_or((0, 0))
    }

    /// High-water mark of the register arena, which is the register file
    /// size the finished program needs.
    pub fn register_bytes(&self) -> u32 {
        self.arena_top
    }
}

//! Register bytecode for PFX entry points.
//!
//! [`compile`] flattens one analyzed entry point into a [`Program`]: a
//! fully inlined instruction stream over byte-addressed registers, a
//! deduplicated constant pool with patchable uniform windows, and a debug
//! layout mapping instruction ranges back to source spans. Programs
//! round-trip through a little-endian two-chunk container via
//! [`Program::encode`] and [`Program::decode`].

mod const_pool;
mod debug;
mod frame;
mod op;
mod program;
mod translate;

pub use const_pool::{ConstClass, ConstPool};
pub use debug::{DebugLayout, InputBinding, SpanRecord, UniformWindow};
pub use op::{Instruction, Opcode, Operands};
pub use program::{DecodeError, Program};
pub use translate::{TranslateError, compile};

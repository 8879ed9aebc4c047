//! Virtual machine for PFX bytecode.
//!
//! Executes a compiled [`Program`](pfx_bytecode::Program) under a
//! GPU-style dispatch model: a one-dimensional grid of independent
//! invocations, each with its own register file, sharing only the
//! external [`Buffer`]s bound to input slots. A buffer's head counter
//! word is the one atomic primitive the model offers, enough for the
//! append and free-list patterns effect programs rely on.

mod buffer;
mod machine;

pub use buffer::Buffer;
pub use machine::{Machine, VmError};

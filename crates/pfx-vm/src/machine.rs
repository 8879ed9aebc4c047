//! The interpreter and its host-facing dispatch surface.

use std::sync::Arc;

use pfx_bytecode::{Instruction, Opcode, Program};
use rayon::prelude::*;
use thiserror::Error;

use crate::buffer::Buffer;

/// Faults an execution can raise. Every one of them is a contract
/// violation by the program or the host, never a recoverable condition;
/// a well-compiled program on correctly sized buffers raises none.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid opcode {0} in the instruction stream")]
    MalformedOpcode(u32),
    #[error("register access at byte {0} is outside the register file")]
    RegisterOutOfRange(u32),
    #[error("constant access at byte {0} is outside constant memory")]
    ConstantOutOfRange(u32),
    #[error("no buffer bound to slot {0}")]
    UnboundSlot(u32),
    #[error("element {index} is outside the buffer in slot {slot}")]
    BufferOutOfRange { slot: u32, index: u32 },
    #[error("integer division by zero")]
    DivisionByZero,
    #[error("execution left the instruction stream at instruction {0}")]
    PcOutOfRange(u32),
    #[error("uniform '{0}' does not exist in this program")]
    NoSuchUniform(String),
    #[error("uniform '{name}' is {want} bytes, not {got}")]
    UniformSize { name: String, want: u32, got: u32 },
    #[error("a {groups}x{threads} grid is too large to dispatch")]
    GridTooLarge { groups: u32, threads: u32 },
}

/// A loaded program plus the host state a dispatch runs against: a
/// patchable copy of constant memory and the buffers bound to input
/// slots.
///
/// Every invocation gets its own zeroed register file; the buffers are
/// the only memory invocations share. The grid is one-dimensional, so a
/// dispatch is fully described by a group count and a threads-per-group
/// count, and an invocation sees its global linear index through the
/// thread-index instruction.
#[derive(Debug)]
pub struct Machine {
    program: Program,
    constants: Vec<u32>,
    slots: Vec<Option<Arc<Buffer>>>,
}

impl Machine {
    pub fn new(program: Program) -> Self {
        let constants = program.constants.clone();
        Self {
            program,
            constants,
            slots: Vec::new(),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Binds a buffer to an input slot. Buffers are shared handles; the
    /// same buffer may back several slots or several machines.
    pub fn set_input(&mut self, slot: u32, buffer: Arc<Buffer>) {
        let at = slot as usize;
        if self.slots.len() <= at {
            self.slots.resize_with(at + 1, || None);
        }
        self.slots[at] = Some(buffer);
    }

    /// Patches a named uniform window in this machine's constant memory.
    /// The words must match the window size exactly.
    pub fn set_constant(&mut self, name: &str, words: &[u32]) -> Result<(), VmError> {
        let (offset, want) = match self.program.layout.uniform(name) {
            Some(window) => (window.offset, window.bytes),
            None => return Err(VmError::NoSuchUniform(name.to_owned())),
        };
        let got = words.len() as u32 * 4;
        if got != want {
            return Err(VmError::UniformSize {
                name: name.to_owned(),
                want,
                got,
            });
        }
        let first = (offset / 4) as usize;
        self.constants[first..first + words.len()].copy_from_slice(words);
        Ok(())
    }

    /// Runs the full `groups` x `threads` grid to completion. Invocations
    /// may execute on any number of worker threads; the first fault, if
    /// any, abandons the dispatch.
    pub fn dispatch(&self, groups: u32, threads: u32) -> Result<(), VmError> {
        let total = groups
            .checked_mul(threads)
            .ok_or(VmError::GridTooLarge { groups, threads })?;
        tracing::debug!(entry = %self.program.entry, groups, threads, total, "dispatching grid");
        (0..total)
            .into_par_iter()
            .try_for_each(|thread| self.invoke(thread).map(|_| ()))
    }

    /// Runs a single invocation and yields the first word of the return
    /// window, or zero for a void program.
    pub fn evaluate(&self) -> Result<u32, VmError> {
        Ok(self.evaluate_window()?.first().copied().unwrap_or(0))
    }

    /// Runs a single invocation and yields the whole return window.
    pub fn evaluate_window(&self) -> Result<Vec<u32>, VmError> {
        let regs = self.invoke(0)?;
        let first = (self.program.return_offset / 4) as usize;
        let words = (self.program.return_bytes / 4) as usize;
        regs.get(first..first + words)
            .map(<[u32]>::to_vec)
            .ok_or(VmError::RegisterOutOfRange(self.program.return_offset))
    }

    /// One invocation: a fresh zeroed register file run from instruction
    /// zero until `ret`.
    fn invoke(&self, thread: u32) -> Result<Vec<u32>, VmError> {
        let mut regs = vec![0u32; (self.program.register_bytes / 4) as usize];
        let mut pc = 0u32;
        loop {
            let Some(instruction) = self.program.code.get(pc as usize) else {
                return Err(VmError::PcOutOfRange(pc));
            };
            let opcode = instruction.op().map_err(VmError::MalformedOpcode)?;
            pc = match opcode {
                Opcode::Ret => return Ok(regs),
                Opcode::Jump => instruction.a,
                // A held condition skips the jump that always follows.
                Opcode::JumpIf => {
                    if word(&regs, instruction.a)? != 0 {
                        pc + 2
                    } else {
                        pc + 1
                    }
                }
                _ => {
                    self.step(&mut regs, thread, *instruction, opcode)?;
                    pc + 1
                }
            };
        }
    }

    /// Executes one non-control-flow instruction.
    fn step(
        &self,
        regs: &mut [u32],
        thread: u32,
        instruction: Instruction,
        opcode: Opcode,
    ) -> Result<(), VmError> {
        use Opcode::*;
        match opcode {
            LoadConst => {
                let value = self.constant(instruction.b)?;
                put(regs, instruction.a, value)?;
            }
            Move => {
                let value = word(regs, instruction.b)?;
                put(regs, instruction.a, value)?;
            }
            LoadElement => {
                let index = word(regs, instruction.c)?;
                let value = self
                    .buffer(instruction.b)?
                    .read_element(index)
                    .ok_or(VmError::BufferOutOfRange {
                        slot: instruction.b,
                        index,
                    })?;
                put(regs, instruction.a, value)?;
            }
            StoreElement => {
                let index = word(regs, instruction.b)?;
                let value = word(regs, instruction.c)?;
                if !self.buffer(instruction.a)?.write_element(index, value) {
                    return Err(VmError::BufferOutOfRange {
                        slot: instruction.a,
                        index,
                    });
                }
            }
            CounterIncrement => {
                let ticket = self.buffer(instruction.b)?.bump_counter();
                put(regs, instruction.a, ticket)?;
            }
            ThreadIndex => put(regs, instruction.a, thread)?,
            I32Add | I32Sub | I32Mul | I32Div => {
                let x = word(regs, instruction.b)? as i32;
                let y = word(regs, instruction.c)? as i32;
                let value = match opcode {
                    I32Add => x.wrapping_add(y),
                    I32Sub => x.wrapping_sub(y),
                    I32Mul => x.wrapping_mul(y),
                    _ => {
                        if y == 0 {
                            return Err(VmError::DivisionByZero);
                        }
                        x.wrapping_div(y)
                    }
                };
                put(regs, instruction.a, value as u32)?;
            }
            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max => {
                let x = f32::from_bits(word(regs, instruction.b)?);
                let y = f32::from_bits(word(regs, instruction.c)?);
                let value = match opcode {
                    F32Add => x + y,
                    F32Sub => x - y,
                    F32Mul => x * y,
                    F32Div => x / y,
                    F32Min => x.min(y),
                    _ => x.max(y),
                };
                put(regs, instruction.a, value.to_bits())?;
            }
            I32Equal | I32NotEqual | I32Less | I32LessEqual | I32Greater | I32GreaterEqual => {
                let x = word(regs, instruction.b)? as i32;
                let y = word(regs, instruction.c)? as i32;
                let hit = match opcode {
                    I32Equal => x == y,
                    I32NotEqual => x != y,
                    I32Less => x < y,
                    I32LessEqual => x <= y,
                    I32Greater => x > y,
                    _ => x >= y,
                };
                put(regs, instruction.a, hit as u32)?;
            }
            F32Equal | F32NotEqual | F32Less | F32LessEqual | F32Greater | F32GreaterEqual => {
                let x = f32::from_bits(word(regs, instruction.b)?);
                let y = f32::from_bits(word(regs, instruction.c)?);
                let hit = match opcode {
                    F32Equal => x == y,
                    F32NotEqual => x != y,
                    F32Less => x < y,
                    F32LessEqual => x <= y,
                    F32Greater => x > y,
                    _ => x >= y,
                };
                put(regs, instruction.a, hit as u32)?;
            }
            LogicalAnd | LogicalOr => {
                let x = word(regs, instruction.b)? != 0;
                let y = word(regs, instruction.c)? != 0;
                let value = if opcode == LogicalAnd { x && y } else { x || y };
                put(regs, instruction.a, value as u32)?;
            }
            LogicalNot => {
                let value = (word(regs, instruction.b)? == 0) as u32;
                put(regs, instruction.a, value)?;
            }
            F32ToI32 => {
                let value = f32::from_bits(word(regs, instruction.b)?) as i32;
                put(regs, instruction.a, value as u32)?;
            }
            I32ToF32 => {
                let value = word(regs, instruction.b)? as i32 as f32;
                put(regs, instruction.a, value.to_bits())?;
            }
            F32Abs | F32Floor | F32Ceil | F32Frac | F32Sin | F32Cos | F32Sqrt => {
                let x = f32::from_bits(word(regs, instruction.b)?);
                let value = match opcode {
                    F32Abs => x.abs(),
                    F32Floor => x.floor(),
                    F32Ceil => x.ceil(),
                    // frac() stays in [0, 1) for negatives too.
                    F32Frac => x - x.floor(),
                    F32Sin => x.sin(),
                    F32Cos => x.cos(),
                    _ => x.sqrt(),
                };
                put(regs, instruction.a, value.to_bits())?;
            }
            JumpIf | Jump | Ret => unreachable!("control flow is handled by the fetch loop"),
        }
        Ok(())
    }

    fn constant(&self, byte: u32) -> Result<u32, VmError> {
        self.constants
            .get((byte / 4) as usize)
            .copied()
            .ok_or(VmError::ConstantOutOfRange(byte))
    }

    fn buffer(&self, slot: u32) -> Result<&Buffer, VmError> {
        self.slots
            .get(slot as usize)
            .and_then(|bound| bound.as_deref())
            .ok_or(VmError::UnboundSlot(slot))
    }
}

fn word(regs: &[u32], byte: u32) -> Result<u32, VmError> {
    regs.get((byte / 4) as usize)
        .copied()
        .ok_or(VmError::RegisterOutOfRange(byte))
}

fn put(regs: &mut [u32], byte: u32, value: u32) -> Result<(), VmError> {
    match regs.get_mut((byte / 4) as usize) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(VmError::RegisterOutOfRange(byte)),
    }
}

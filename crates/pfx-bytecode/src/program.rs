//! The compiled program artifact and its binary container.
//!
//! On disk a program is two little-endian chunks, each `[kind, length,
//! payload…]` with the length counted in 32-bit words: one `Constants`
//! chunk of raw constant memory, then one `Code` chunk of four-word
//! instructions. The debug layout and register metadata stay in memory;
//! a decoded program recovers its register file size by scanning operands.

use thiserror::Error;

use crate::debug::DebugLayout;
use crate::op::{Instruction, Operands};

mod chunk {
    pub const CONSTANTS: u32 = 1;
    pub const CODE: u32 = 2;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("binary ends in the middle of a word")]
    UnalignedInput,
    #[error("binary ends in the middle of a chunk")]
    TruncatedChunk,
    #[error("expected chunk {expected}, found {found}")]
    UnexpectedChunk { expected: u32, found: u32 },
    #[error("code chunk length {0} is not a whole number of instructions")]
    RaggedCode(u32),
    #[error("{0} trailing bytes after the code chunk")]
    TrailingBytes(usize),
}

/// A compiled entry point, immutable once built.
#[derive(Clone, Debug, Default)]
pub struct Program {
    /// Entry function name, for reflection and disassembly headers.
    pub entry: String,
    /// Constant memory as raw words.
    pub constants: Vec<u32>,
    pub code: Vec<Instruction>,
    /// Register file size one invocation needs.
    pub register_bytes: u32,
    /// Where the entry's return value lives in the register file.
    pub return_offset: u32,
    pub return_bytes: u32,
    pub layout: DebugLayout,
}

impl Program {
    /// Serializes the constant and code chunks.
    pub fn encode(&self) -> Vec<u8> {
        let code_words = self.code.len() * 4;
        let mut out = Vec::with_capacity((4 + self.constants.len() + code_words) * 4);
        push_word(&mut out, chunk::CONSTANTS);
        push_word(&mut out, self.constants.len() as u32);
        for &word in &self.constants {
            push_word(&mut out, word);
        }
        push_word(&mut out, chunk::CODE);
        push_word(&mut out, code_words as u32);
        for instruction in &self.code {
            for word in instruction.words() {
                push_word(&mut out, word);
            }
        }
        out
    }

    /// Parses an encoded program. The layout does not survive the trip;
    /// the register file size is recovered from the instruction stream
    /// and the return window follows the translator's offset-zero
    /// convention.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() % 4 != 0 {
            return Err(DecodeError::UnalignedInput);
        }
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let mut cursor = 0usize;
        let constants = read_chunk(&words, &mut cursor, chunk::CONSTANTS)?;
        let code_words = read_chunk(&words, &mut cursor, chunk::CODE)?;
        if cursor != words.len() {
            return Err(DecodeError::TrailingBytes((words.len() - cursor) * 4));
        }
        if code_words.len() % 4 != 0 {
            return Err(DecodeError::RaggedCode(code_words.len() as u32));
        }
        let code: Vec<Instruction> = code_words
            .chunks_exact(4)
            .map(|w| Instruction::from_words([w[0], w[1], w[2], w[3]]))
            .collect();

        let register_bytes = scan_register_bytes(&code);
        Ok(Self {
            entry: String::new(),
            constants,
            code,
            register_bytes,
            return_offset: 0,
            return_bytes: 4.min(register_bytes),
            layout: DebugLayout::default(),
        })
    }

    /// A human-readable listing of the whole program.
    pub fn disassemble(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "; entry {}  registers {}B  return r{}+{}B",
            if self.entry.is_empty() {
                "?"
            } else {
                &self.entry
            },
            self.register_bytes,
            self.return_offset,
            self.return_bytes,
        );
        let _ = writeln!(out, "; constants ({} words)", self.constants.len());
        for (i, &word) in self.constants.iter().enumerate() {
            let _ = writeln!(
                out,
                ";   c{:<4} 0x{word:08x}  i32 {}  f32 {}",
                i * 4,
                word as i32,
                f32::from_bits(word)
            );
        }
        for window in &self.layout.uniforms {
            let _ = writeln!(
                out,
                "; uniform {} at c{} ({}B)",
                window.name, window.offset, window.bytes
            );
        }
        for input in &self.layout.inputs {
            let _ = writeln!(
                out,
                "; input {} at s{} ({}B elements)",
                input.name, input.slot, input.element_bytes
            );
        }
        let mut last_span = None;
        for (i, instruction) in self.code.iter().enumerate() {
            let span = self.layout.span_for(i as u32);
            if span != last_span {
                if let Some(span) = span {
                    let _ = writeln!(out, "; source {}..{}", span.start, span.end);
                }
                last_span = span;
            }
            let _ = writeln!(out, "{i:4}  {instruction}");
        }
        out
    }
}

fn push_word(out: &mut Vec<u8>, word: u32) {
    out.extend_from_slice(&word.to_le_bytes());
}

fn read_chunk(words: &[u32], cursor: &mut usize, expected: u32) -> Result<Vec<u32>, DecodeError> {
    let header: &[u32] = words
        .get(*cursor..*cursor + 2)
        .ok_or(DecodeError::TruncatedChunk)?;
    if header[0] != expected {
        return Err(DecodeError::UnexpectedChunk {
            expected,
            found: header[0],
        });
    }
    let length = header[1] as usize;
    let payload = words
        .get(*cursor + 2..*cursor + 2 + length)
        .ok_or(DecodeError::TruncatedChunk)?;
    *cursor += 2 + length;
    Ok(payload.to_vec())
}

/// The register file size implied by the instruction stream: one past the
/// highest register word any operand touches.
fn scan_register_bytes(code: &[Instruction]) -> u32 {
    let mut top = 0u32;
    let mut touch = |reg: u32| top = top.max(reg + 4);
    for instruction in code {
        let Ok(op) = instruction.op() else { continue };
        match op.operands() {
            Operands::None | Operands::Target => {}
            Operands::Dst | Operands::Cond => touch(instruction.a),
            Operands::DstConst | Operands::DstSlot => touch(instruction.a),
            Operands::DstSrc => {
                touch(instruction.a);
                touch(instruction.b);
            }
            Operands::DstSrcSrc => {
                touch(instruction.a);
                touch(instruction.b);
                touch(instruction.c);
            }
            Operands::DstSlotIndex => {
                touch(instruction.a);
                touch(instruction.c);
            }
            Operands::SlotIndexSrc => {
                touch(instruction.b);
                touch(instruction.c);
            }
        }
    }
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Opcode;

    fn sample() -> Program {
        Program {
            entry: "main".into(),
            constants: vec![3, 0x40400000],
            code: vec![
                Instruction::new(Opcode::LoadConst, 0, 0, 0),
                Instruction::new(Opcode::LoadConst, 4, 4, 0),
                Instruction::new(Opcode::I32Add, 8, 0, 4),
                Instruction::new(Opcode::Ret, 0, 0, 0),
            ],
            register_bytes: 12,
            return_offset: 0,
            return_bytes: 4,
            layout: DebugLayout::default(),
        }
    }

    #[test]
    fn encode_decode_round_trips_constants_and_code() {
        let program = sample();
        let bytes = program.encode();
        let back = Program::decode(&bytes).unwrap();
        assert_eq!(back.constants, program.constants);
        assert_eq!(back.code, program.code);
        assert_eq!(back.register_bytes, 12);
        assert_eq!(back.return_offset, 0);
    }

    #[test]
    fn chunk_order_is_enforced() {
        let program = sample();
        let mut bytes = program.encode();
        // Swap the chunk kind words so Code comes first.
        bytes[0] = 2;
        let err = Program::decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedChunk {
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn truncation_and_trailing_bytes_are_rejected() {
        let program = sample();
        let bytes = program.encode();
        assert_eq!(
            Program::decode(&bytes[..bytes.len() - 4]).unwrap_err(),
            DecodeError::TruncatedChunk
        );
        assert_eq!(
            Program::decode(&bytes[..bytes.len() - 2]).unwrap_err(),
            DecodeError::UnalignedInput
        );
        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(
            Program::decode(&padded).unwrap_err(),
            DecodeError::TrailingBytes(4)
        );
    }

    #[test]
    fn disassembly_lists_every_instruction() {
        let program = sample();
        let text = program.disassemble();
        assert!(text.contains("i32.add r8, r0, r4"));
        assert!(text.contains("ret"));
        assert!(text.contains("entry main"));
    }
}

//! The instruction set.
//!
//! Every instruction is four little-endian 32-bit words: an opcode and
//! three operands. Register and constant operands are byte offsets into
//! the register file and constant memory; buffer operands are an input
//! slot number plus a register holding a word index. Opcode values are
//! part of the binary format and never change meaning.

use std::fmt;

/// Operand roles of an opcode, used by the disassembler and by the
/// register-file sizing scan after decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operands {
    /// No operands.
    None,
    /// `a` = destination register.
    Dst,
    /// `a` = destination register, `b` = constant byte offset.
    DstConst,
    /// `a` = destination register, `b` = source register.
    DstSrc,
    /// `a` = destination register, `b` and `c` = source registers.
    DstSrcSrc,
    /// `a` = destination register, `b` = buffer slot.
    DstSlot,
    /// `a` = destination register, `b` = buffer slot, `c` = index register.
    DstSlotIndex,
    /// `a` = buffer slot, `b` = index register, `c` = source register.
    SlotIndexSrc,
    /// `a` = condition register.
    Cond,
    /// `a` = target instruction index.
    Target,
}

macro_rules! opcodes {
    ($($name:ident = $value:literal, $mnemonic:literal, $operands:ident;)*) => {
        /// One VM operation.
        #[repr(u32)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($name = $value,)*
        }

        impl TryFrom<u32> for Opcode {
            type Error = u32;

            fn try_from(word: u32) -> Result<Self, u32> {
                match word {
                    $($value => Ok(Self::$name),)*
                    other => Err(other),
                }
            }
        }

        impl Opcode {
            /// Disassembly spelling.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic,)*
                }
            }

            /// What the three operand words mean for this opcode.
            pub fn operands(self) -> Operands {
                match self {
                    $(Self::$name => Operands::$operands,)*
                }
            }
        }
    };
}

opcodes! {
    LoadConst = 0, "load.const", DstConst;
    Move = 1, "move", DstSrc;
    LoadElement = 2, "load.elem", DstSlotIndex;
    StoreElement = 3, "store.elem", SlotIndexSrc;
    CounterIncrement = 4, "counter.inc", DstSlot;
    ThreadIndex = 5, "thread.index", Dst;
    I32Add = 6, "i32.add", DstSrcSrc;
    I32Sub = 7, "i32.sub", DstSrcSrc;
    I32Mul = 8, "i32.mul", DstSrcSrc;
    I32Div = 9, "i32.div", DstSrcSrc;
    F32Add = 10, "f32.add", DstSrcSrc;
    F32Sub = 11, "f32.sub", DstSrcSrc;
    F32Mul = 12, "f32.mul", DstSrcSrc;
    F32Div = 13, "f32.div", DstSrcSrc;
    I32Equal = 14, "i32.eq", DstSrcSrc;
    I32NotEqual = 15, "i32.ne", DstSrcSrc;
    I32Less = 16, "i32.lt", DstSrcSrc;
    I32LessEqual = 17, "i32.le", DstSrcSrc;
    I32Greater = 18, "i32.gt", DstSrcSrc;
    I32GreaterEqual = 19, "i32.ge", DstSrcSrc;
    F32Equal = 20, "f32.eq", DstSrcSrc;
    F32NotEqual = 21, "f32.ne", DstSrcSrc;
    F32Less = 22, "f32.lt", DstSrcSrc;
    F32LessEqual = 23, "f32.le", DstSrcSrc;
    F32Greater = 24, "f32.gt", DstSrcSrc;
    F32GreaterEqual = 25, "f32.ge", DstSrcSrc;
    LogicalAnd = 26, "log.and", DstSrcSrc;
    LogicalOr = 27, "log.or", DstSrcSrc;
    LogicalNot = 28, "log.not", DstSrc;
    F32ToI32 = 29, "f32.to.i32", DstSrc;
    I32ToF32 = 30, "i32.to.f32", DstSrc;
    F32Abs = 31, "f32.abs", DstSrc;
    F32Floor = 32, "f32.floor", DstSrc;
    F32Ceil = 33, "f32.ceil", DstSrc;
    F32Frac = 34, "f32.frac", DstSrc;
    F32Sin = 35, "f32.sin", DstSrc;
    F32Cos = 36, "f32.cos", DstSrc;
    F32Sqrt = 37, "f32.sqrt", DstSrc;
    F32Min = 38, "f32.min", DstSrcSrc;
    F32Max = 39, "f32.max", DstSrcSrc;
    JumpIf = 40, "jump.if", Cond;
    Jump = 41, "jump", Target;
    Ret = 42, "ret", None;
}

/// One fetched instruction. The opcode is kept as a raw word so decoded
/// programs can carry malformed values through to a VM fault instead of
/// failing silently earlier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u32,
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl Instruction {
    pub fn new(op: Opcode, a: u32, b: u32, c: u32) -> Self {
        Self {
            opcode: op as u32,
            a,
            b,
            c,
        }
    }

    /// Decodes the opcode word, or hands back the malformed value.
    pub fn op(&self) -> Result<Opcode, u32> {
        Opcode::try_from(self.opcode)
    }

    pub fn words(&self) -> [u32; 4] {
        [self.opcode, self.a, self.b, self.c]
    }

    pub fn from_words(words: [u32; 4]) -> Self {
        Self {
            opcode: words[0],
            a: words[1],
            b: words[2],
            c: words[3],
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(op) = self.op() else {
            return write!(f, "op?{} {} {} {}", self.opcode, self.a, self.b, self.c);
        };
        let m = op.mnemonic();
        match op.operands() {
            Operands::None => f.write_str(m),
            Operands::Dst => write!(f, "{m} r{}", self.a),
            Operands::DstConst => write!(f, "{m} r{}, c{}", self.a, self.b),
            Operands::DstSrc => write!(f, "{m} r{}, r{}", self.a, self.b),
            Operands::DstSrcSrc => write!(f, "{m} r{}, r{}, r{}", self.a, self.b, self.c),
            Operands::DstSlot => write!(f, "{m} r{}, s{}", self.a, self.b),
            Operands::DstSlotIndex => write!(f, "{m} r{}, s{}[r{}]", self.a, self.b, self.c),
            Operands::SlotIndexSrc => write!(f, "{m} s{}[r{}], r{}", self.a, self.b, self.c),
            Operands::Cond => write!(f, "{m} r{}", self.a),
            Operands::Target => write!(f, "{m} @{}", self.a),
        }
    }
}

//! Bit layout constants for the one-word and two-word instruction formats.
//!
//! One-word form: `opcode:8 | r1:4 | r2:4`.
//! Two-word form: `opcode:8 | r1:4 | x:4`, followed by an operand word.

pub const OPCODE_WIDTH: u32 = 8;
pub const REG_FIELD_WIDTH: u32 = 4;

pub const OPCODE_OFFSET: u32 = 8;
pub const R1_OFFSET: u32 = 4;
pub const R2_OFFSET: u32 = 0;

pub const OPCODE_MASK: u16 = 0xFF00;
pub const R1_MASK: u16 = 0x00F0;
pub const R2_MASK: u16 = 0x000F;

pub const GENERAL_REGISTER_COUNT: usize = 8;

/// Total addressable words; every address wraps modulo this value.
pub const MEMORY_SIZE: usize = 0x1_0000;

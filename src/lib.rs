//! COMET2: a bit-exact virtual machine for the CASL2 instruction set.
//!
//! A COMET2 machine is 65,536 words of flat, byte-agnostic memory, eight
//! general registers `GR0..GR7`, a program counter `PR`, a stack pointer
//! `SP`, and three condition flags `Z`/`S`/`O`. [`interpreter::Interpreter`]
//! owns that state and runs a fetch-decode-execute loop against it; the
//! `casl2asm` crate produces the memory image this crate runs.
//!
//! ```
//! use comet2::interpreter::Interpreter;
//! use comet2::memory::Memory;
//! use comet2::word::Cell;
//!
//! // LD GR1,=5 / LAD GR2,3 / ADDA GR1,GR2, with the literal pool
//! // trailing the code at address 5.
//! let cells: Vec<Cell> = vec![
//!     0x1010u16, 0x0005, // LD GR1, [5]
//!     0x1220, 0x0003,    // LAD GR2, 3
//!     0x2412,            // ADDA GR1, GR2
//!     0x0005,            // literal pool cell for `=5`
//! ]
//! .into_iter()
//! .map(Cell::new)
//! .collect();
//!
//! let memory = Memory::from_cells(cells);
//! let mut machine = Interpreter::new(memory, 5);
//! machine.run().unwrap();
//! assert_eq!(machine.registers.gr(1), 8);
//! ```

pub mod constants;
pub mod interpreter;
pub mod io;
pub mod memory;
pub mod opcode;
pub mod registers;
pub mod trace;
pub mod word;

pub use interpreter::{Interpreter, RuntimeError};
pub use memory::Memory;
pub use registers::Registers;
pub use word::{Cell, Provenance, Word};

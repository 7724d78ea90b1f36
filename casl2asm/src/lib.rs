//! Assembler for the CASL2 assembly language, targeting the
//! [comet2](../comet2/index.html) virtual processor.
//!
//! The main entry points are [`assemble`] and [`assemble_with_origin`], which
//! accept a program written in CASL2 source and return an [`Assembled`]
//! image ready to load into [`comet2::Memory`]. A [`SourceMap`] is returned
//! alongside it, associating each emitted code word with the source line
//! that produced it.
//!
//! Parsing is implemented with [pest]. A program is lexed one line at a
//! time: each line is either blank, a comment, or a single statement made up
//! of an optional label, a mnemonic, and a comma-separated operand list.
//! Whether a line carries a label is decided purely by column position - a
//! label starts in column 1, while every other statement requires leading
//! whitespace before its mnemonic.
//!
//! # CASL2 Source
//!
//! A program's first statement must be `START`, optionally naming a label
//! that becomes the program's entry address. Its last statement must be
//! `END`. Between them, `DS n` reserves `n` zero cells and `DC` emits one or
//! more literal items (strings, decimal or hexadecimal numbers, or label
//! references).
//!
//! Instructions are assembled directly against [`comet2::opcode::OpCode`].
//! A handful of mnemonics (`LD`, the arithmetic/logical/compare group, and
//! the shift group) are ambiguous between a one-word register form and a
//! two-word address form; the choice is made by operand shape, not spelling.
//!
//! `IN`, `OUT`, `RPUSH`, and `RPOP` are assembler macros: they expand into
//! fixed sequences of ordinary instructions rather than corresponding to a
//! single opcode.
//!
//! An address operand written `=N` references the literal pool: all uses of
//! the same value share one pool cell, appended after the program body once
//! assembly finishes.
//!
//! [pest]: https://docs.rs/pest/

pub mod assembler;
pub mod encode;
pub mod error;
pub mod lexer;
pub mod literals;
pub mod macros;
pub mod source_map;
pub mod symtab;
pub mod unresolved;

#[cfg(test)]
mod e2e;

pub use assembler::{assemble, assemble_with_origin, Assembled};
pub use error::{AssembleError, Result};
pub use source_map::{SourceMap, SourceMapItem};

//! Fetch-decode-execute loop and per-opcode dispatch.
//!
//! Dispatch is a single exhaustive match over [`OpCode`]: one function, one
//! instruction decoded and executed, no virtual dispatch table.

mod exec;

use crate::constants::GENERAL_REGISTER_COUNT;
use crate::io::{self, InputSource, OutputSink};
use crate::memory::{Memory, Storage, StorageMut};
use crate::opcode::OpCode;
use crate::registers::Registers;
use crate::trace::{NullSink as NullTrace, TraceEvent, TraceSink};
use crate::word::Word;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    UnknownOpcode { address: Word, byte: u8 },
    UnknownService { address: Word, service: Word },
    RegisterOutOfRange { address: Word, field: u8 },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::UnknownOpcode { address, byte } => write!(
                f,
                "unknown opcode 0x{:02X} at address 0x{:04X}",
                byte, address
            ),
            RuntimeError::UnknownService { address, service } => write!(
                f,
                "unknown SVC service {} at address 0x{:04X}",
                service, address
            ),
            RuntimeError::RegisterOutOfRange { address, field } => write!(
                f,
                "register field {} out of range at address 0x{:04X}",
                field, address
            ),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Owns the machine state and runs it to completion.
///
/// `input`/`output` default to no-ops (matching "absence of the sink never
/// changes the program's semantics" for output, and the documented
/// zero-count behavior for a missing input source); `trace` defaults to
/// [`NullTrace`].
pub struct Interpreter {
    pub registers: Registers,
    pub memory: Memory,
    pub end: Word,
    pub input: Option<Box<dyn InputSource>>,
    pub output: Box<dyn OutputSink>,
    pub trace: Box<dyn TraceSink>,
    pub admit_all_input: bool,
}

impl Interpreter {
    pub fn new(memory: Memory, end: Word) -> Interpreter {
        Interpreter {
            registers: Registers::new(),
            memory,
            end,
            input: None,
            output: Box::new(io::NullOutput),
            trace: Box::new(NullTrace),
            admit_all_input: false,
        }
    }

    /// Seeds initial register state before `run`, per the "initial-state
    /// seeding hook" the driver is allowed to use.
    pub fn new_seeded(memory: Memory, end: Word, registers: Registers) -> Interpreter {
        let mut interp = Interpreter::new(memory, end);
        interp.registers = registers;
        interp
    }

    /// Pushes `end` onto the stack before the first fetch, so a program
    /// ending in `RET` terminates naturally.
    pub fn enable_virtual_call(&mut self) {
        self.registers.sp = self.registers.sp.wrapping_sub(1);
        self.memory.write(self.registers.sp, self.end);
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.registers.pr != self.end {
            if let Err(e) = self.step() {
                self.trace.on_fault(&self.registers, &e.to_string());
                return Err(e);
            }
        }
        Ok(())
    }

    fn reg_field(address: Word, field_byte: u8) -> Result<usize, RuntimeError> {
        if (field_byte as usize) < GENERAL_REGISTER_COUNT {
            Ok(field_byte as usize)
        } else {
            Err(RuntimeError::RegisterOutOfRange {
                address,
                field: field_byte,
            })
        }
    }

    fn step(&mut self) -> Result<(), RuntimeError> {
        let inst_addr = self.registers.pr;
        let word1 = self.memory.read(inst_addr);
        self.registers.pr = self.registers.pr.wrapping_add(1);

        let byte = (word1 >> 8) as u8;
        let r1_field = ((word1 >> 4) & 0xF) as u8;
        let r2_field = (word1 & 0xF) as u8;

        let opcode = OpCode::from_byte(byte).ok_or(RuntimeError::UnknownOpcode {
            address: inst_addr,
            byte,
        })?;

        let mut words = vec![word1];
        let (ea, word2) = if opcode.is_two_word() {
            let w2 = self.memory.read(self.registers.pr);
            self.registers.pr = self.registers.pr.wrapping_add(1);
            words.push(w2);
            if let OpCode::Svc = opcode {
                // SVC ignores both r-byte fields; word2 is the raw service
                // number, not an effective address.
                (0, w2)
            } else {
                let x = Self::reg_field(inst_addr, r2_field)?;
                let index_value = if x == 0 { 0 } else { self.registers.gr(x) };
                let ea = w2.wrapping_add(index_value);
                (ea, w2)
            }
        } else {
            (0, 0)
        };

        let (detail, mnemonic) = self.execute(inst_addr, opcode, r1_field, r2_field, ea, word2)?;

        self.trace.on_step(&TraceEvent {
            address: inst_addr,
            words: &words,
            mnemonic,
            detail,
            source_line: self.memory.cell(inst_addr).provenance.as_ref().and_then(|p| p.line),
            label: self
                .memory
                .cell(inst_addr)
                .provenance
                .as_ref()
                .and_then(|p| p.label.as_deref()),
        });

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        inst_addr: Word,
        opcode: OpCode,
        r1_field: u8,
        r2_field: u8,
        ea: Word,
        word2: Word,
    ) -> Result<(String, &'static str), RuntimeError> {
        use OpCode::*;

        if let Svc = opcode {
            self.dispatch_svc(inst_addr, word2)?;
            return Ok((format!("{}", word2), "SVC"));
        }

        let r1 = Self::reg_field(inst_addr, r1_field)?;

        macro_rules! flags {
            ($result:expr) => {{
                let r = $result;
                self.registers.z = r.z;
                self.registers.s = r.s;
                self.registers.o = r.o;
                self.registers.set_gr(r1, r.value);
            }};
        }

        let detail;
        match opcode {
            Nop => {
                detail = String::new();
            }

            LdAdr => {
                let value = self.memory.read(ea);
                self.registers.z = value == 0;
                self.registers.s = (value >> 15) & 1 == 1;
                self.registers.o = false;
                self.registers.set_gr(r1, value);
                detail = format!("GR{},{:04X}", r1, ea);
            }
            LdReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                let value = self.registers.gr(r2);
                self.registers.z = value == 0;
                self.registers.s = (value >> 15) & 1 == 1;
                self.registers.o = false;
                self.registers.set_gr(r1, value);
                detail = format!("GR{},GR{}", r1, r2);
            }

            St => {
                self.memory.write(ea, self.registers.gr(r1));
                detail = format!("GR{},{:04X}", r1, ea);
            }

            Lad => {
                self.registers.set_gr(r1, ea);
                detail = format!("GR{},{:04X}", r1, ea);
            }

            Adda => {
                flags!(exec::adda(self.registers.gr(r1), self.memory.read(ea)));
                detail = format!("GR{},{:04X}", r1, ea);
            }
            AddaReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                flags!(exec::adda(self.registers.gr(r1), self.registers.gr(r2)));
                detail = format!("GR{},GR{}", r1, r2);
            }
            Suba => {
                flags!(exec::suba(self.registers.gr(r1), self.memory.read(ea)));
                detail = format!("GR{},{:04X}", r1, ea);
            }
            SubaReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                flags!(exec::suba(self.registers.gr(r1), self.registers.gr(r2)));
                detail = format!("GR{},GR{}", r1, r2);
            }
            Addl => {
                flags!(exec::addl(self.registers.gr(r1), self.memory.read(ea)));
                detail = format!("GR{},{:04X}", r1, ea);
            }
            AddlReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                flags!(exec::addl(self.registers.gr(r1), self.registers.gr(r2)));
                detail = format!("GR{},GR{}", r1, r2);
            }
            Subl => {
                flags!(exec::subl(self.registers.gr(r1), self.memory.read(ea)));
                detail = format!("GR{},{:04X}", r1, ea);
            }
            SublReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                flags!(exec::subl(self.registers.gr(r1), self.registers.gr(r2)));
                detail = format!("GR{},GR{}", r1, r2);
            }

            And => {
                flags!(exec::bitwise(self.registers.gr(r1) & self.memory.read(ea)));
                detail = format!("GR{},{:04X}", r1, ea);
            }
            AndReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                flags!(exec::bitwise(self.registers.gr(r1) & self.registers.gr(r2)));
                detail = format!("GR{},GR{}", r1, r2);
            }
            Or => {
                flags!(exec::bitwise(self.registers.gr(r1) | self.memory.read(ea)));
                detail = format!("GR{},{:04X}", r1, ea);
            }
            OrReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                flags!(exec::bitwise(self.registers.gr(r1) | self.registers.gr(r2)));
                detail = format!("GR{},GR{}", r1, r2);
            }
            Xor => {
                flags!(exec::bitwise(self.registers.gr(r1) ^ self.memory.read(ea)));
                detail = format!("GR{},{:04X}", r1, ea);
            }
            XorReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                flags!(exec::bitwise(self.registers.gr(r1) ^ self.registers.gr(r2)));
                detail = format!("GR{},GR{}", r1, r2);
            }

            Cpa => {
                let (z, s) = exec::cpa(self.registers.gr(r1), self.memory.read(ea));
                self.registers.z = z;
                self.registers.s = s;
                self.registers.o = false;
                detail = format!("GR{},{:04X}", r1, ea);
            }
            CpaReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                let (z, s) = exec::cpa(self.registers.gr(r1), self.registers.gr(r2));
                self.registers.z = z;
                self.registers.s = s;
                self.registers.o = false;
                detail = format!("GR{},GR{}", r1, r2);
            }
            Cpl => {
                let (z, s) = exec::cpl(self.registers.gr(r1), self.memory.read(ea));
                self.registers.z = z;
                self.registers.s = s;
                self.registers.o = false;
                detail = format!("GR{},{:04X}", r1, ea);
            }
            CplReg => {
                let r2 = Self::reg_field(inst_addr, r2_field)?;
                let (z, s) = exec::cpl(self.registers.gr(r1), self.registers.gr(r2));
                self.registers.z = z;
                self.registers.s = s;
                self.registers.o = false;
                detail = format!("GR{},GR{}", r1, r2);
            }

            Sla => {
                if let Some((value, o)) = exec::sla(self.registers.gr(r1), ea) {
                    self.registers.set_zs_from(value);
                    self.registers.o = o;
                    self.registers.set_gr(r1, value);
                }
                detail = format!("GR{},{:04X}", r1, ea);
            }
            Sra => {
                if let Some((value, o)) = exec::sra(self.registers.gr(r1), ea) {
                    self.registers.set_zs_from(value);
                    self.registers.o = o;
                    self.registers.set_gr(r1, value);
                }
                detail = format!("GR{},{:04X}", r1, ea);
            }
            Sll => {
                if let Some((value, o)) = exec::sll(self.registers.gr(r1), ea) {
                    self.registers.z = value == 0;
                    self.registers.s = false;
                    self.registers.o = o;
                    self.registers.set_gr(r1, value);
                }
                detail = format!("GR{},{:04X}", r1, ea);
            }
            Srl => {
                if let Some((value, o)) = exec::srl(self.registers.gr(r1), ea) {
                    self.registers.z = value == 0;
                    self.registers.s = false;
                    self.registers.o = o;
                    self.registers.set_gr(r1, value);
                }
                detail = format!("GR{},{:04X}", r1, ea);
            }

            Jmi => {
                if self.registers.s {
                    self.registers.pr = ea;
                }
                detail = format!("{:04X}", ea);
            }
            Jnz => {
                if !self.registers.z {
                    self.registers.pr = ea;
                }
                detail = format!("{:04X}", ea);
            }
            Jze => {
                if self.registers.z {
                    self.registers.pr = ea;
                }
                detail = format!("{:04X}", ea);
            }
            Jump => {
                self.registers.pr = ea;
                detail = format!("{:04X}", ea);
            }
            Jpl => {
                if !self.registers.s && !self.registers.z {
                    self.registers.pr = ea;
                }
                detail = format!("{:04X}", ea);
            }
            Jov => {
                if self.registers.o {
                    self.registers.pr = ea;
                }
                detail = format!("{:04X}", ea);
            }

            Push => {
                self.registers.sp = self.registers.sp.wrapping_sub(1);
                self.memory.write(self.registers.sp, ea);
                detail = format!("{:04X}", ea);
            }
            Pop => {
                let value = self.memory.read(self.registers.sp);
                self.registers.sp = self.registers.sp.wrapping_add(1);
                self.registers.set_gr(r1, value);
                detail = format!("GR{}", r1);
            }

            Call => {
                self.registers.sp = self.registers.sp.wrapping_sub(1);
                self.memory.write(self.registers.sp, self.registers.pr);
                self.registers.pr = ea;
                detail = format!("{:04X}", ea);
            }
            Ret => {
                let value = self.memory.read(self.registers.sp);
                self.registers.sp = self.registers.sp.wrapping_add(1);
                self.registers.pr = value;
                detail = String::new();
            }

            Svc => unreachable!("handled above"),
        }

        let mnemonic = match opcode {
            Nop => "NOP",
            LdAdr | LdReg => "LD",
            St => "ST",
            Lad => "LAD",
            Adda | AddaReg => "ADDA",
            Suba | SubaReg => "SUBA",
            Addl | AddlReg => "ADDL",
            Subl | SublReg => "SUBL",
            And | AndReg => "AND",
            Or | OrReg => "OR",
            Xor | XorReg => "XOR",
            Cpa | CpaReg => "CPA",
            Cpl | CplReg => "CPL",
            Sla => "SLA",
            Sra => "SRA",
            Sll => "SLL",
            Srl => "SRL",
            Jmi => "JMI",
            Jnz => "JNZ",
            Jze => "JZE",
            Jump => "JUMP",
            Jpl => "JPL",
            Jov => "JOV",
            Push => "PUSH",
            Pop => "POP",
            Call => "CALL",
            Ret => "RET",
            Svc => "SVC",
        };

        Ok((detail, mnemonic))
    }

    fn dispatch_svc(&mut self, address: Word, service: Word) -> Result<(), RuntimeError> {
        match service {
            s if s == io::SVC_IN as Word => {
                let dest = self.registers.gr(1);
                let count_addr = self.registers.gr(2);
                let mut read = 0u16;
                if let Some(input) = self.input.as_deref_mut() {
                    while read < io::MAX_READ_UNITS {
                        match input.read_unit() {
                            None => break,
                            Some(unit) => {
                                if self.admit_all_input || io::is_printable(unit) {
                                    self.memory
                                        .write(dest.wrapping_add(read), Word::from(unit));
                                    read += 1;
                                }
                            }
                        }
                    }
                }
                self.memory.write(count_addr, read);
                Ok(())
            }
            s if s == io::SVC_OUT as Word => {
                let src = self.registers.gr(1);
                let count = self.memory.read(self.registers.gr(2));
                for i in 0..count {
                    let unit = self.memory.read(src.wrapping_add(i)) as u8;
                    self.output.write_unit(unit);
                }
                Ok(())
            }
            _ => Err(RuntimeError::UnknownService { address, service }),
        }
    }
}

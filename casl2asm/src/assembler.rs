//! Two-pass translation: a single forward sweep that emits code words and
//! defers symbolic and literal resolution to a final patching phase.

use crate::error::AssembleError;
use crate::lexer::{self, Operand, Statement};
use crate::literals::LiteralPool;
use crate::macros;
use crate::source_map::{SourceMap, SourceMapItem};
use crate::symtab::SymbolTable;
use crate::unresolved::UnresolvedTable;
use comet2::opcode::OpCode;
use comet2::registers::gr_index;
use std::collections::HashMap;

/// The fully resolved result of assembling one source program.
pub struct Assembled {
    pub memory: comet2::Memory,
    pub entry: u16,
    pub end: u16,
    pub source_map: SourceMap,
    /// Every label defined in the source, mapped to its resolved address.
    pub labels: HashMap<String, u16>,
}

pub fn assemble(source: &str) -> Result<Assembled, AssembleError> {
    assemble_with_origin(source, 0)
}

/// Assembles `source`, leaving `origin` zero cells ahead of the first
/// emitted code word.
pub fn assemble_with_origin(source: &str, origin: u16) -> Result<Assembled, AssembleError> {
    let mut body: Vec<u16> = vec![0; origin as usize];
    let mut symtab = SymbolTable::new();
    let mut unresolved = UnresolvedTable::new();
    let mut literals = LiteralPool::new();
    let mut source_map = SourceMap::new();

    let mut statement_count: u32 = 0;
    let mut start_label: Option<String> = None;
    let mut explicit_entry: Option<u16> = None;
    let mut end: Option<u16> = None;

    for (index, raw_line) in source.lines().enumerate() {
        let line = (index + 1) as u32;
        let text = raw_line.trim_end_matches('\r');

        let statement = match lexer::lex_line(line, text)? {
            Some(statement) => statement,
            None => continue,
        };

        if end.is_some() {
            return Err(AssembleError::EndNotLast { line });
        }

        statement_count += 1;
        let before = body.len() as u16;

        if let Some(label) = &statement.label {
            symtab.define(line, label, before)?;
        }

        process_statement(
            &statement,
            line,
            statement_count,
            &mut body,
            &mut symtab,
            &mut unresolved,
            &mut literals,
            &mut start_label,
            &mut explicit_entry,
            &mut end,
        )?;

        let emitted = body.len() as u16 - before;
        if emitted > 0 {
            source_map.push(SourceMapItem { start_line: line, line_count: emitted as u32 });
        }
    }

    let end = end.ok_or(AssembleError::MissingEnd)?;

    let literal_base = body.len() as u16;
    literals.resolve_into(literal_base, &mut body);
    unresolved.resolve_all(&symtab, &mut body)?;

    let entry = match start_label {
        Some(label) => symtab.resolve(&label).ok_or(AssembleError::UndefinedLabel { label })?,
        None => explicit_entry.unwrap_or(0),
    };

    if body.len() > comet2::constants::MEMORY_SIZE {
        return Err(AssembleError::ProgramTooLarge { len: body.len() });
    }
    body.resize(comet2::constants::MEMORY_SIZE, 0);

    let cells: Vec<comet2::Cell> = body.into_iter().map(comet2::Cell::new).collect();
    let memory = comet2::Memory::from_cells(cells);
    let labels = symtab.into_labels();

    Ok(Assembled { memory, entry, end, source_map, labels })
}

#[allow(clippy::too_many_arguments)]
fn process_statement(
    statement: &Statement,
    line: u32,
    statement_count: u32,
    body: &mut Vec<u16>,
    symtab: &mut SymbolTable,
    unresolved: &mut UnresolvedTable,
    literals: &mut LiteralPool,
    start_label: &mut Option<String>,
    explicit_entry: &mut Option<u16>,
    end: &mut Option<u16>,
) -> Result<(), AssembleError> {
    match statement.mnemonic.as_str() {
        "START" => {
            if statement_count != 1 {
                return Err(AssembleError::StartNotFirst { line });
            }
            match statement.operands.as_slice() {
                [] => *explicit_entry = Some(body.len() as u16),
                [Operand::Ident(label)] => *start_label = Some(label.clone()),
                _ => {
                    return Err(AssembleError::Syntax {
                        line,
                        message: "START takes at most one label operand".to_string(),
                    })
                }
            }
            Ok(())
        }
        "END" => {
            if !statement.operands.is_empty() {
                return Err(AssembleError::WrongArity {
                    line,
                    mnemonic: "END".to_string(),
                    expected: 0,
                    found: statement.operands.len(),
                });
            }
            *end = Some(body.len() as u16);
            Ok(())
        }
        "DS" => {
            let count = match statement.operands.as_slice() {
                [Operand::Number(n)] => *n,
                _ => {
                    return Err(AssembleError::Syntax {
                        line,
                        message: "DS expects a single non-negative size".to_string(),
                    })
                }
            };
            body.extend(std::iter::repeat(0u16).take(count as usize));
            Ok(())
        }
        "DC" => {
            if statement.operands.is_empty() {
                return Err(AssembleError::MalformedDc {
                    line,
                    message: "DC requires at least one item".to_string(),
                });
            }
            for item in &statement.operands {
                encode_dc_item(item, line, body, symtab, unresolved)?;
            }
            Ok(())
        }
        mnemonic => {
            if let Some(expected) = macros::arity(mnemonic) {
                if statement.operands.len() != expected {
                    return Err(arity_error(line, mnemonic, expected, statement.operands.len()));
                }
            }
            if let Some(expansion) = macros::expand(mnemonic, &statement.operands) {
                for (sub_mnemonic, sub_operands) in expansion {
                    encode_instruction(sub_mnemonic, &sub_operands, line, body, symtab, unresolved, literals)?;
                }
                Ok(())
            } else {
                encode_instruction(mnemonic, &statement.operands, line, body, symtab, unresolved, literals)
            }
        }
    }
}

fn encode_dc_item(
    item: &Operand,
    line: u32,
    body: &mut Vec<u16>,
    symtab: &SymbolTable,
    unresolved: &mut UnresolvedTable,
) -> Result<(), AssembleError> {
    match item {
        Operand::Str(s) => {
            for ch in s.chars() {
                body.push((ch as u32 & 0xFF) as u16);
            }
            Ok(())
        }
        Operand::Number(n) => {
            body.push(*n);
            Ok(())
        }
        Operand::Ident(label) => {
            let cell_address = body.len() as u16;
            match symtab.resolve(label) {
                Some(address) => body.push(address),
                None => {
                    body.push(0);
                    unresolved.add(label, cell_address);
                }
            }
            Ok(())
        }
        Operand::Literal(_) => Err(AssembleError::MalformedDc {
            line,
            message: "a `=N` literal is not a valid DC item".to_string(),
        }),
    }
}

fn is_register(operand: &Operand) -> bool {
    matches!(operand, Operand::Ident(name) if gr_index(name).is_some())
}

fn require_register(line: u32, mnemonic: &str, operand: &Operand) -> Result<u8, AssembleError> {
    match operand {
        Operand::Ident(name) => gr_index(name)
            .map(|index| index as u8)
            .ok_or_else(|| AssembleError::BadRegister { line, name: name.clone() }),
        _ => Err(AssembleError::Syntax {
            line,
            message: format!("'{}' expects a register operand", mnemonic),
        }),
    }
}

fn optional_index(line: u32, operand: Option<&Operand>) -> Result<u8, AssembleError> {
    match operand {
        None => Ok(0),
        Some(op) => require_register(line, "index register", op),
    }
}

fn emit_address_operand(
    operand: &Operand,
    line: u32,
    body: &mut Vec<u16>,
    unresolved: &mut UnresolvedTable,
    literals: &mut LiteralPool,
    symtab: &SymbolTable,
) -> Result<(), AssembleError> {
    let cell_address = body.len() as u16;
    match operand {
        Operand::Number(n) => body.push(*n),
        Operand::Literal(n) => {
            body.push(0);
            literals.reference(*n, cell_address);
        }
        Operand::Ident(name) => match symtab.resolve(name) {
            Some(address) => body.push(address),
            None => {
                body.push(0);
                unresolved.add(name, cell_address);
            }
        },
        Operand::Str(_) => {
            return Err(AssembleError::Syntax {
                line,
                message: "a string is not a valid address operand".to_string(),
            })
        }
    }
    Ok(())
}

fn arity_error(line: u32, mnemonic: &str, expected: usize, found: usize) -> AssembleError {
    AssembleError::WrongArity { line, mnemonic: mnemonic.to_string(), expected, found }
}

fn encode_instruction(
    mnemonic: &str,
    operands: &[Operand],
    line: u32,
    body: &mut Vec<u16>,
    symtab: &SymbolTable,
    unresolved: &mut UnresolvedTable,
    literals: &mut LiteralPool,
) -> Result<(), AssembleError> {
    use crate::encode::{one_word, two_word_header};
    use OpCode::*;

    match mnemonic {
        "NOP" => {
            if !operands.is_empty() {
                return Err(arity_error(line, mnemonic, 0, operands.len()));
            }
            body.push(one_word(Nop, 0, 0));
        }
        "RET" => {
            if !operands.is_empty() {
                return Err(arity_error(line, mnemonic, 0, operands.len()));
            }
            body.push(one_word(Ret, 0, 0));
        }
        "LD" => {
            if operands.len() == 2 && is_register(&operands[1]) {
                let r1 = require_register(line, mnemonic, &operands[0])?;
                let r2 = require_register(line, mnemonic, &operands[1])?;
                body.push(one_word(LdReg, r1, r2));
            } else if operands.len() == 2 || operands.len() == 3 {
                let r1 = require_register(line, mnemonic, &operands[0])?;
                let x = optional_index(line, operands.get(2))?;
                body.push(two_word_header(LdAdr, r1, x));
                emit_address_operand(&operands[1], line, body, unresolved, literals, symtab)?;
            } else {
                return Err(arity_error(line, mnemonic, 2, operands.len()));
            }
        }
        "ST" => {
            if operands.len() != 2 && operands.len() != 3 {
                return Err(arity_error(line, mnemonic, 2, operands.len()));
            }
            let r1 = require_register(line, mnemonic, &operands[0])?;
            let x = optional_index(line, operands.get(2))?;
            body.push(two_word_header(St, r1, x));
            emit_address_operand(&operands[1], line, body, unresolved, literals, symtab)?;
        }
        "LAD" => {
            if operands.len() != 2 && operands.len() != 3 {
                return Err(arity_error(line, mnemonic, 2, operands.len()));
            }
            let r1 = require_register(line, mnemonic, &operands[0])?;
            let x = optional_index(line, operands.get(2))?;
            body.push(two_word_header(Lad, r1, x));
            emit_address_operand(&operands[1], line, body, unresolved, literals, symtab)?;
        }
        "ADDA" | "SUBA" | "ADDL" | "SUBL" | "AND" | "OR" | "XOR" | "CPA" | "CPL" => {
            encode_alu(mnemonic, operands, line, body, symtab, unresolved, literals)?;
        }
        "SLA" | "SRA" | "SLL" | "SRL" => {
            if operands.len() != 2 && operands.len() != 3 {
                return Err(arity_error(line, mnemonic, 2, operands.len()));
            }
            let opcode = match mnemonic {
                "SLA" => Sla,
                "SRA" => Sra,
                "SLL" => Sll,
                _ => Srl,
            };
            let r1 = require_register(line, mnemonic, &operands[0])?;
            let x = optional_index(line, operands.get(2))?;
            body.push(two_word_header(opcode, r1, x));
            emit_address_operand(&operands[1], line, body, unresolved, literals, symtab)?;
        }
        "JMI" | "JNZ" | "JZE" | "JUMP" | "JPL" | "JOV" => {
            if operands.is_empty() || operands.len() > 2 {
                return Err(arity_error(line, mnemonic, 1, operands.len()));
            }
            let opcode = match mnemonic {
                "JMI" => Jmi,
                "JNZ" => Jnz,
                "JZE" => Jze,
                "JUMP" => Jump,
                "JPL" => Jpl,
                _ => Jov,
            };
            let x = optional_index(line, operands.get(1))?;
            body.push(two_word_header(opcode, 0, x));
            emit_address_operand(&operands[0], line, body, unresolved, literals, symtab)?;
        }
        "PUSH" => {
            if operands.is_empty() || operands.len() > 2 {
                return Err(arity_error(line, mnemonic, 1, operands.len()));
            }
            let x = optional_index(line, operands.get(1))?;
            body.push(two_word_header(Push, 0, x));
            emit_address_operand(&operands[0], line, body, unresolved, literals, symtab)?;
        }
        "POP" => {
            if operands.len() != 1 {
                return Err(arity_error(line, mnemonic, 1, operands.len()));
            }
            let r1 = require_register(line, mnemonic, &operands[0])?;
            body.push(one_word(Pop, r1, 0));
        }
        "CALL" => {
            if operands.is_empty() || operands.len() > 2 {
                return Err(arity_error(line, mnemonic, 1, operands.len()));
            }
            let x = optional_index(line, operands.get(1))?;
            body.push(two_word_header(Call, 0, x));
            emit_address_operand(&operands[0], line, body, unresolved, literals, symtab)?;
        }
        "SVC" => {
            if operands.len() != 1 {
                return Err(arity_error(line, mnemonic, 1, operands.len()));
            }
            let service = match &operands[0] {
                Operand::Number(n) => *n,
                _ => {
                    return Err(AssembleError::Syntax {
                        line,
                        message: "SVC expects a literal service number".to_string(),
                    })
                }
            };
            body.push(two_word_header(Svc, 0, 0));
            body.push(service);
        }
        _ => return Err(AssembleError::UnknownMnemonic { line, mnemonic: mnemonic.to_string() }),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn encode_alu(
    mnemonic: &str,
    operands: &[Operand],
    line: u32,
    body: &mut Vec<u16>,
    symtab: &SymbolTable,
    unresolved: &mut UnresolvedTable,
    literals: &mut LiteralPool,
) -> Result<(), AssembleError> {
    use crate::encode::{one_word, two_word_header};
    use OpCode::*;

    let (two_word_op, one_word_op) = match mnemonic {
        "ADDA" => (Adda, AddaReg),
        "SUBA" => (Suba, SubaReg),
        "ADDL" => (Addl, AddlReg),
        "SUBL" => (Subl, SublReg),
        "AND" => (And, AndReg),
        "OR" => (Or, OrReg),
        "XOR" => (Xor, XorReg),
        "CPA" => (Cpa, CpaReg),
        "CPL" => (Cpl, CplReg),
        _ => unreachable!("encode_alu only ever receives one of its nine mnemonics"),
    };

    if operands.len() == 2 && is_register(&operands[1]) {
        let r1 = require_register(line, mnemonic, &operands[0])?;
        let r2 = require_register(line, mnemonic, &operands[1])?;
        body.push(one_word(one_word_op, r1, r2));
    } else if operands.len() == 2 || operands.len() == 3 {
        let r1 = require_register(line, mnemonic, &operands[0])?;
        let x = optional_index(line, operands.get(2))?;
        body.push(two_word_header(two_word_op, r1, x));
        emit_address_operand(&operands[1], line, body, unresolved, literals, symtab)?;
    } else {
        return Err(arity_error(line, mnemonic, 2, operands.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use comet2::memory::Storage;

    #[test]
    fn entry_and_end_bracket_the_program() {
        let assembled = assemble("START\n LD GR1,=5\n RET\n END\n").unwrap();
        assert_eq!(assembled.entry, 0);
        assert_eq!(assembled.end, 3);
    }

    #[test]
    fn start_with_label_operand_resolves_a_forward_reference() {
        let source = "START BEGIN\n DS 1\nBEGIN NOP\n END\n";
        let assembled = assemble(source).unwrap();
        assert_eq!(assembled.entry, 1);
    }

    #[test]
    fn literal_pool_reuse_emits_one_shared_cell() {
        let source = "START\n LD GR1,=11\n LD GR2,=11\n END\n";
        let assembled = assemble(source).unwrap();
        assert_eq!(assembled.end, 4);
        let pool_address = assembled.memory.read(1);
        assert_eq!(pool_address, assembled.memory.read(3));
        assert_eq!(assembled.memory.read(pool_address), 11);
    }

    #[test]
    fn undefined_label_is_reported() {
        let source = "START\n JUMP NOWHERE\n END\n";
        assert!(matches!(assemble(source), Err(AssembleError::UndefinedLabel { .. })));
    }

    #[test]
    fn duplicate_label_is_reported() {
        let source = "START\nL NOP\nL NOP\n END\n";
        assert!(matches!(assemble(source), Err(AssembleError::DuplicateLabel { .. })));
    }

    #[test]
    fn end_must_be_last_statement() {
        let source = "START\n END\n NOP\n";
        assert!(matches!(assemble(source), Err(AssembleError::EndNotLast { .. })));
    }

    #[test]
    fn missing_end_is_reported() {
        assert!(matches!(assemble("START\n NOP\n"), Err(AssembleError::MissingEnd)));
    }

    #[test]
    fn dc_string_item_expands_to_one_cell_per_character() {
        let source = "START\n JUMP SKIP\nMSG DC 'hi'\nSKIP NOP\n END\n";
        let assembled = assemble(source).unwrap();
        assert_eq!(assembled.memory.read(2), 'h' as u16);
        assert_eq!(assembled.memory.read(3), 'i' as u16);
    }

    #[test]
    fn rpush_expands_to_seven_push_instructions() {
        let source = "START\n RPUSH\n END\n";
        let assembled = assemble(source).unwrap();
        assert_eq!(assembled.end, 14);
    }

    #[test]
    fn in_with_wrong_arity_is_rejected() {
        let source = "START\n IN BUF\n END\n";
        assert!(matches!(
            assemble(source),
            Err(AssembleError::WrongArity { mnemonic, expected: 2, found: 1, .. }) if mnemonic == "IN"
        ));
    }

    #[test]
    fn out_with_wrong_arity_is_rejected() {
        let source = "START\n OUT BUF,LEN,EXTRA\n END\n";
        assert!(matches!(
            assemble(source),
            Err(AssembleError::WrongArity { mnemonic, expected: 2, found: 3, .. }) if mnemonic == "OUT"
        ));
    }

    #[test]
    fn rpush_with_an_operand_is_rejected() {
        let source = "START\n RPUSH GR1\n END\n";
        assert!(matches!(
            assemble(source),
            Err(AssembleError::WrongArity { mnemonic, expected: 0, found: 1, .. }) if mnemonic == "RPUSH"
        ));
    }

    #[test]
    fn rpop_with_an_operand_is_rejected() {
        let source = "START\n RPOP GR1\n END\n";
        assert!(matches!(
            assemble(source),
            Err(AssembleError::WrongArity { mnemonic, expected: 0, found: 1, .. }) if mnemonic == "RPOP"
        ));
    }

    #[test]
    fn labels_are_retained_on_the_assembled_program() {
        let source = "START\nLOOP NOP\n JUMP LOOP\n END\n";
        let assembled = assemble(source).unwrap();
        assert_eq!(assembled.labels.get("LOOP"), Some(&0));
    }
}

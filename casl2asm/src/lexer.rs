//! Line-level lexing: strips comments, pulls out an optional label, and
//! tokenises the mnemonic and its operand list. DC's item grammar (string,
//! decimal, hex, or label reference) reuses the same operand grammar as
//! ordinary instructions; it is the assembler's job to decide which
//! operand shapes are legal for a given mnemonic.

use crate::error::AssembleError;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct Casl2Parser;

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// A register name (`GR0`..`GR7`) or a label reference; which one it
    /// is depends on where the assembler uses it.
    Ident(String),
    /// A decimal or `#`-prefixed hexadecimal literal, masked to 16 bits.
    Number(u16),
    /// A `=N` literal-pool reference.
    Literal(u16),
    /// A DC string item with `''` already collapsed to a literal quote.
    Str(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statement {
    pub label: Option<String>,
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

/// Lexes one physical source line, already stripped of its line terminator.
/// Returns `None` for a blank or comment-only line.
pub fn lex_line(line: u32, text: &str) -> Result<Option<Statement>, AssembleError> {
    let mut pairs = Casl2Parser::parse(Rule::line, text).map_err(|e| AssembleError::Syntax {
        line,
        message: e.to_string(),
    })?;

    let top = pairs.next().expect("Rule::line always produces exactly one pair");
    let inner = top
        .into_inner()
        .next()
        .expect("Rule::line always wraps one of its three alternatives");

    match inner.as_rule() {
        Rule::blank_line => Ok(None),
        Rule::labeled_line | Rule::unlabeled_line => {
            let is_labeled = inner.as_rule() == Rule::labeled_line;
            let mut parts = inner.into_inner();

            let label = if is_labeled {
                Some(
                    parts
                        .next()
                        .expect("a labeled_line always starts with its label")
                        .as_str()
                        .to_string(),
                )
            } else {
                None
            };

            let mnemonic = parts
                .next()
                .expect("every non-blank line carries a mnemonic")
                .as_str()
                .to_string();

            let operands = match parts.next() {
                Some(pair) if pair.as_rule() == Rule::operand_list => pair
                    .into_inner()
                    .map(|p| build_operand(line, p))
                    .collect::<Result<Vec<_>, _>>()?,
                _ => Vec::new(),
            };

            Ok(Some(Statement { label, mnemonic, operands }))
        }
        _ => unreachable!("Rule::line only wraps labeled_line, unlabeled_line, or blank_line"),
    }
}

fn build_operand(line: u32, pair: Pair<Rule>) -> Result<Operand, AssembleError> {
    let pair = pair
        .into_inner()
        .next()
        .expect("Rule::operand always wraps exactly one alternative");
    match pair.as_rule() {
        Rule::string_lit => Ok(Operand::Str(decode_string(pair.as_str()))),
        Rule::literal_ref => {
            let digits = &pair.as_str()[1..];
            Ok(Operand::Literal(parse_number(line, digits)?))
        }
        Rule::hexnum | Rule::decimal => Ok(Operand::Number(parse_number(line, pair.as_str())?)),
        Rule::identifier => Ok(Operand::Ident(pair.as_str().to_string())),
        other => unreachable!("operand produced an unexpected rule: {:?}", other),
    }
}

fn parse_number(line: u32, text: &str) -> Result<u16, AssembleError> {
    let value = if let Some(hex) = text.strip_prefix('#') {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse::<u32>()
    }
    .map_err(|_| AssembleError::Syntax {
        line,
        message: format!("'{}' is not a valid number", text),
    })?;
    Ok((value & 0xFFFF) as u16)
}

/// Strips the surrounding quotes and collapses doubled `''` to a literal
/// apostrophe. Each remaining character is later masked to its low 8 bits.
fn decode_string(quoted: &str) -> String {
    let body = &quoted[1..quoted.len() - 1];
    body.replace("''", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_only_lines_lex_to_none() {
        assert_eq!(lex_line(1, "").unwrap(), None);
        assert_eq!(lex_line(1, "    ").unwrap(), None);
        assert_eq!(lex_line(1, "; a remark").unwrap(), None);
    }

    #[test]
    fn labeled_instruction_line() {
        let stmt = lex_line(1, "LOOP LAD GR1,1,GR2").unwrap().unwrap();
        assert_eq!(stmt.label.as_deref(), Some("LOOP"));
        assert_eq!(stmt.mnemonic, "LAD");
        assert_eq!(
            stmt.operands,
            vec![
                Operand::Ident("GR1".to_string()),
                Operand::Number(1),
                Operand::Ident("GR2".to_string()),
            ]
        );
    }

    #[test]
    fn unlabeled_instruction_requires_leading_whitespace() {
        let stmt = lex_line(2, "    ADDA GR1,GR2").unwrap().unwrap();
        assert_eq!(stmt.label, None);
        assert_eq!(stmt.mnemonic, "ADDA");

        assert!(lex_line(2, "ADDA GR1,GR2").is_err());
    }

    #[test]
    fn literal_operand_and_trailing_comment() {
        let stmt = lex_line(3, "    LD GR1,=11  ; load the literal").unwrap().unwrap();
        assert_eq!(stmt.operands, vec![Operand::Ident("GR1".to_string()), Operand::Literal(11)]);
    }

    #[test]
    fn dc_string_item_collapses_doubled_quote() {
        let stmt = lex_line(4, "MSG DC 'it''s'").unwrap().unwrap();
        assert_eq!(stmt.operands, vec![Operand::Str("it's".to_string())]);
    }

    #[test]
    fn hex_operand() {
        let stmt = lex_line(5, "    DC #00FF").unwrap().unwrap();
        assert_eq!(stmt.operands, vec![Operand::Number(0x00FF)]);
    }
}

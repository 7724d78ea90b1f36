//! Macro expansion: `IN`, `OUT`, `RPUSH`, `RPOP` desugar at encode time into
//! fixed sequences of ordinary instructions, using the two SVC service
//! numbers (1 = IN, 2 = OUT).

use crate::lexer::Operand;

const SVC_IN: u16 = 1;
const SVC_OUT: u16 = 2;

fn gr(n: u8) -> Operand {
    Operand::Ident(format!("GR{}", n))
}

/// The operand count `mnemonic` requires, or `None` if it is not a macro.
pub fn arity(mnemonic: &str) -> Option<usize> {
    match mnemonic {
        "IN" | "OUT" => Some(2),
        "RPUSH" | "RPOP" => Some(0),
        _ => None,
    }
}

/// Returns the instruction sequence `mnemonic` expands to, or `None` if it
/// is not a macro. Callers must check [`arity`] first; this assumes
/// `operands` already has the right length.
pub fn expand(mnemonic: &str, operands: &[Operand]) -> Option<Vec<(&'static str, Vec<Operand>)>> {
    match mnemonic {
        "IN" => Some(block_io_sequence(operands, SVC_IN)),
        "OUT" => Some(block_io_sequence(operands, SVC_OUT)),
        "RPUSH" => Some(rpush_sequence()),
        "RPOP" => Some(rpop_sequence()),
        _ => None,
    }
}

fn block_io_sequence(operands: &[Operand], service: u16) -> Vec<(&'static str, Vec<Operand>)> {
    let dest = operands[0].clone();
    let size = operands[1].clone();
    vec![
        ("PUSH", vec![Operand::Number(0), gr(1)]),
        ("PUSH", vec![Operand::Number(0), gr(2)]),
        ("LAD", vec![gr(1), dest]),
        ("LAD", vec![gr(2), size]),
        ("SVC", vec![Operand::Number(service)]),
        ("POP", vec![gr(2)]),
        ("POP", vec![gr(1)]),
    ]
}

fn rpush_sequence() -> Vec<(&'static str, Vec<Operand>)> {
    (1..=7).map(|n| ("PUSH", vec![Operand::Number(0), gr(n)])).collect()
}

fn rpop_sequence() -> Vec<(&'static str, Vec<Operand>)> {
    (1..=7).rev().map(|n| ("POP", vec![gr(n)])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_expands_to_the_seven_instruction_sequence() {
        let seq = expand("IN", &[Operand::Ident("BUF".to_string()), Operand::Ident("LEN".to_string())]).unwrap();
        let mnemonics: Vec<&str> = seq.iter().map(|(m, _)| *m).collect();
        assert_eq!(mnemonics, vec!["PUSH", "PUSH", "LAD", "LAD", "SVC", "POP", "POP"]);
        assert_eq!(seq[4].1, vec![Operand::Number(SVC_IN)]);
    }

    #[test]
    fn rpush_and_rpop_cover_gr1_through_gr7_in_opposite_orders() {
        let push = rpush_sequence();
        assert_eq!(push[0].1[1], gr(1));
        assert_eq!(push[6].1[1], gr(7));

        let pop = rpop_sequence();
        assert_eq!(pop[0].1[0], gr(7));
        assert_eq!(pop[6].1[0], gr(1));
    }

    #[test]
    fn non_macro_mnemonics_return_none() {
        assert!(expand("ADDA", &[]).is_none());
    }

    #[test]
    fn arity_reports_the_required_operand_count() {
        assert_eq!(arity("IN"), Some(2));
        assert_eq!(arity("OUT"), Some(2));
        assert_eq!(arity("RPUSH"), Some(0));
        assert_eq!(arity("RPOP"), Some(0));
        assert_eq!(arity("ADDA"), None);
    }
}

//! Assembles a program and runs it to completion, the way `assemble`'s own
//! caller does. These exercise the encoder and the interpreter together;
//! per-instruction semantics have their own focused tests closer to where
//! they're implemented.

use crate::assembler::assemble;
use comet2::io::{OutputSink, SliceInput};
use comet2::Interpreter;
use std::cell::RefCell;
use std::rc::Rc;

struct CapturingOutput(Rc<RefCell<Vec<u8>>>);

impl OutputSink for CapturingOutput {
    fn write_unit(&mut self, unit: u8) {
        self.0.borrow_mut().push(unit);
    }
}

/// Assembles a RET-less straight-line program and runs it to completion:
/// `PR` simply falls off the end of the code into `END`, no virtual call
/// needed.
fn run_straight_line(source: &str) -> Interpreter {
    let assembled = assemble(source).unwrap();
    let mut machine = Interpreter::new(assembled.memory, assembled.end);
    machine.registers.pr = assembled.entry;
    machine.registers.sp = 0xFFFF;
    machine.run().unwrap();
    machine
}

#[test]
fn echo_via_in_out_macros() {
    let source = "\
START
 IN BUF,LEN
 OUT BUF,LEN
 RET
BUF DS 256
LEN DS 1
 END
";
    let assembled = assemble(source).unwrap();
    let mut machine = Interpreter::new(assembled.memory, assembled.end);
    machine.registers.pr = assembled.entry;
    machine.registers.sp = 0xFFFF;
    machine.enable_virtual_call();
    machine.input = Some(Box::new(SliceInput::new(b"hello")));
    let captured = Rc::new(RefCell::new(Vec::new()));
    machine.output = Box::new(CapturingOutput(captured.clone()));
    machine.run().unwrap();

    assert_eq!(&captured.borrow()[..], b"hello");
}

#[test]
fn virtual_call_runs_a_ret_terminated_subroutine() {
    let source = "\
START
 CALL DOUBLE
 RET
DOUBLE ADDA GR1,GR1
 RET
 END
";
    let assembled = assemble(source).unwrap();
    let mut machine = Interpreter::new(assembled.memory, assembled.end);
    machine.registers.pr = assembled.entry;
    machine.registers.sp = 0xFFFF;
    machine.registers.gr[1] = 21;
    machine.enable_virtual_call();
    machine.run().unwrap();

    assert_eq!(machine.registers.gr(1), 42);
}

#[test]
fn signed_addition_overflows_from_max_positive() {
    let source = "\
START
 LD GR1,=32767
 ADDA GR1,=1
 END
";
    let machine = run_straight_line(source);
    assert_eq!(machine.registers.gr(1), 0x8000);
    assert!(machine.registers.o);
    assert!(machine.registers.s);
    assert!(!machine.registers.z);
}

#[test]
fn unsigned_addition_wraps_past_0xffff() {
    let source = "\
START
 LAD GR1,65535
 LAD GR2,1
 ADDL GR1,GR2
 END
";
    let machine = run_straight_line(source);
    assert_eq!(machine.registers.gr(1), 0);
    assert!(machine.registers.o);
    assert!(machine.registers.z);
}

#[test]
fn arithmetic_right_shift_replicates_the_sign_bit() {
    let source = "\
START
 LAD GR1,65280
 SRA GR1,4
 END
";
    let machine = run_straight_line(source);
    assert_eq!(machine.registers.gr(1), 0xFFF0);
    assert!(machine.registers.s);
    assert!(!machine.registers.o);
}

#[test]
fn logical_left_shift_saturates_to_zero_past_sixteen_bits() {
    let source = "\
START
 LAD GR1,48897
 SLL GR1,17
 END
";
    let machine = run_straight_line(source);
    assert_eq!(machine.registers.gr(1), 0);
    assert!(!machine.registers.o);
}

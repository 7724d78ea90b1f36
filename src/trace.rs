//! The trace sink: a pure observer of fetch/decode/execute events.
//!
//! Renders each decoded instruction as one line of
//! `[addr] bytes mnemonic operands ; effect`. A `TraceSink` never
//! influences interpretation; dropping it changes nothing about a
//! program's result.

use crate::registers::Registers;
use crate::word::Word;
use std::io::Write;

/// One fetch/decode/execute event, reported after the instruction has
/// already executed so the sink can show before/after register state.
pub struct TraceEvent<'a> {
    pub address: Word,
    pub words: &'a [Word],
    pub mnemonic: &'static str,
    pub detail: String,
    pub source_line: Option<u32>,
    pub label: Option<&'a str>,
}

pub trait TraceSink {
    fn on_step(&mut self, event: &TraceEvent);

    /// Called once, on any fatal runtime error, with the register state at
    /// the point of failure.
    fn on_fault(&mut self, registers: &Registers, message: &str);
}

/// The default sink: discards every event.
#[derive(Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn on_step(&mut self, _event: &TraceEvent) {}

    fn on_fault(&mut self, _registers: &Registers, _message: &str) {}
}

/// Renders events as human-readable lines to any [`Write`] stream.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> TextSink<W> {
        TextSink { out }
    }
}

impl<W: Write> TraceSink for TextSink<W> {
    fn on_step(&mut self, event: &TraceEvent) {
        let bytes: String = event
            .words
            .iter()
            .map(|w| format!("{:04X}", w))
            .collect::<Vec<_>>()
            .join(" ");

        let origin = match (event.source_line, event.label) {
            (Some(line), Some(label)) => format!("  ; line {} ({})", line, label),
            (Some(line), None) => format!("  ; line {}", line),
            (None, Some(label)) => format!("  ; ({})", label),
            (None, None) => String::new(),
        };

        let _ = writeln!(
            self.out,
            "[{:04X}] {:<10} {:<8} {}{}",
            event.address, bytes, event.mnemonic, event.detail, origin
        );
    }

    fn on_fault(&mut self, registers: &Registers, message: &str) {
        let _ = writeln!(self.out, "*** {}", message);
        let _ = writeln!(
            self.out,
            "GR0={:04X} GR1={:04X} GR2={:04X} GR3={:04X} GR4={:04X} GR5={:04X} GR6={:04X} GR7={:04X}",
            registers.gr[0],
            registers.gr[1],
            registers.gr[2],
            registers.gr[3],
            registers.gr[4],
            registers.gr[5],
            registers.gr[6],
            registers.gr[7],
        );
        let _ = writeln!(
            self.out,
            "PR={:04X} SP={:04X} Z={} S={} O={}",
            registers.pr,
            registers.sp,
            registers.z as u8,
            registers.s as u8,
            registers.o as u8,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_sink_formats_a_step() {
        let mut buf = Vec::new();
        {
            let mut sink = TextSink::new(&mut buf);
            sink.on_step(&TraceEvent {
                address: 0x10,
                words: &[0x2410],
                mnemonic: "ADDA",
                detail: "GR1,GR0".to_string(),
                source_line: Some(7),
                label: None,
            });
        }
        let rendered = String::from_utf8(buf).unwrap();
        assert!(rendered.starts_with("[0010] 2410"));
        assert!(rendered.contains("ADDA"));
        assert!(rendered.contains("line 7"));
    }
}

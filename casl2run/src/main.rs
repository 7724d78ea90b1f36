use clap::Parser;
use comet2::io::{ReaderInput, WriterOutput};
use comet2::registers::Registers;
use comet2::trace::{NullSink, TextSink, TraceSink};
use comet2::word::Word;
use comet2::{Interpreter, Memory, RuntimeError};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

/// Runs CASL2 source or an already-assembled COMET2 memory image.
#[derive(Parser)]
#[command(about = "Runs CASL2 source or an assembled COMET2 memory image.")]
struct Cli {
    /// Path to an assembled binary image, mutually exclusive with `--assembly`.
    #[arg(required_unless_present = "assembly")]
    program: Option<PathBuf>,

    /// Path to CASL2 source to assemble and run.
    #[arg(short, long, value_name = "PATH", conflicts_with = "program")]
    assembly: Option<PathBuf>,

    /// Loads raw bytes into memory before running, as `path:offset`.
    #[arg(long, value_name = "PATH:OFFSET")]
    load_raw: Option<String>,

    /// Reads SVC service 1 (`IN`) input from this file instead of stdin.
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Writes SVC service 2 (`OUT`) output to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Writes an execution trace to this file.
    #[arg(long, value_name = "PATH")]
    trace: Option<PathBuf>,

    #[arg(long, value_name = "WORD")]
    gr0: Option<Word>,
    #[arg(long, value_name = "WORD")]
    gr1: Option<Word>,
    #[arg(long, value_name = "WORD")]
    gr2: Option<Word>,
    #[arg(long, value_name = "WORD")]
    gr3: Option<Word>,
    #[arg(long, value_name = "WORD")]
    gr4: Option<Word>,
    #[arg(long, value_name = "WORD")]
    gr5: Option<Word>,
    #[arg(long, value_name = "WORD")]
    gr6: Option<Word>,
    #[arg(long, value_name = "WORD")]
    gr7: Option<Word>,

    /// Initial stack pointer, default `0xFFFF`.
    #[arg(long, value_name = "WORD")]
    sp: Option<Word>,

    #[arg(long)]
    set_z: bool,
    #[arg(long)]
    set_s: bool,
    #[arg(long)]
    set_o: bool,

    /// Overrides the entry address (required when `PROGRAM` is a raw image).
    #[arg(long, value_name = "ADDR")]
    entry: Option<Word>,

    /// Overrides the termination address (required when `PROGRAM` is a raw image).
    #[arg(long, value_name = "ADDR")]
    end: Option<Word>,

    /// Pushes `end` onto the stack before running, so a program ending in
    /// `RET` terminates naturally.
    #[arg(long)]
    virtual_call: bool,

    /// Admits every input byte to `IN`, not just the printable ranges.
    #[arg(long)]
    admit_all_input: bool,
}

#[derive(Debug)]
enum Error {
    Assemble(casl2asm::AssembleError),
    Runtime(RuntimeError),
    MissingEntryOrEnd,
    BadLoadRaw(String),
    Io(std::io::Error, &'static str, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Assemble(err) => write!(f, "assembling input failed: {}", err),
            Error::Runtime(err) => write!(f, "{}", err),
            Error::MissingEntryOrEnd => {
                write!(f, "--entry and --end are required when running a raw image")
            }
            Error::BadLoadRaw(spec) => {
                write!(f, "--load-raw expects PATH:OFFSET, got \"{}\"", spec)
            }
            Error::Io(err, action, path) => {
                write!(f, "{} file \"{}\" failed: {}", action, path.display(), err)
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    match casl2run_main(&cli) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}

fn casl2run_main(cli: &Cli) -> Result<(), Error> {
    let (mut memory, mut entry, mut end) = load_program(cli)?;

    if let Some(spec) = &cli.load_raw {
        let (path, offset) = parse_load_raw(spec)?;
        let file = File::open(&path).map_err(|err| Error::Io(err, "reading", path.clone()))?;
        memory
            .load_bytes(offset, BufReader::new(file))
            .map_err(|err| Error::Io(err, "reading", path.clone()))?;
    }

    if let Some(addr) = cli.entry {
        entry = addr;
    }
    if let Some(addr) = cli.end {
        end = addr;
    }

    let registers = seeded_registers(cli, entry);
    let mut interpreter = Interpreter::new_seeded(memory, end, registers);

    if cli.virtual_call {
        interpreter.enable_virtual_call();
    }
    interpreter.admit_all_input = cli.admit_all_input;

    if let Some(path) = &cli.input {
        let file = File::open(path).map_err(|err| Error::Io(err, "reading", path.clone()))?;
        interpreter.input = Some(Box::new(ReaderInput::new(BufReader::new(file))));
    } else {
        interpreter.input = Some(Box::new(ReaderInput::new(io::stdin())));
    }

    if let Some(path) = &cli.output {
        let file = File::create(path).map_err(|err| Error::Io(err, "writing", path.clone()))?;
        interpreter.output = Box::new(WriterOutput::new(BufWriter::new(file)));
    } else {
        interpreter.output = Box::new(comet2::io::write_stdout());
    }

    let trace_file = match &cli.trace {
        Some(path) => Some(File::create(path).map_err(|err| Error::Io(err, "writing", path.clone()))?),
        None => None,
    };
    interpreter.trace = match trace_file {
        Some(file) => Box::new(TextSink::new(BufWriter::new(file))) as Box<dyn TraceSink>,
        None => Box::new(NullSink),
    };

    interpreter.run().map_err(Error::Runtime)
}

fn load_program(cli: &Cli) -> Result<(Memory, Word, Word), Error> {
    if let Some(path) = &cli.assembly {
        let source = std::fs::read_to_string(path)
            .map_err(|err| Error::Io(err, "reading", path.clone()))?;
        let assembled = casl2asm::assemble(&source).map_err(Error::Assemble)?;
        return Ok((assembled.memory, assembled.entry, assembled.end));
    }

    let path = cli.program.as_ref().expect("clap requires PROGRAM or --assembly");
    let file = File::open(path).map_err(|err| Error::Io(err, "reading", path.clone()))?;
    let memory =
        Memory::load_dump(BufReader::new(file)).map_err(|err| Error::Io(err, "reading", path.clone()))?;

    match (cli.entry, cli.end) {
        (Some(entry), Some(end)) => Ok((memory, entry, end)),
        _ => Err(Error::MissingEntryOrEnd),
    }
}

fn parse_load_raw(spec: &str) -> Result<(PathBuf, Word), Error> {
    let (path, offset) = spec
        .rsplit_once(':')
        .ok_or_else(|| Error::BadLoadRaw(spec.to_string()))?;
    let offset: Word = offset
        .parse()
        .map_err(|_| Error::BadLoadRaw(spec.to_string()))?;
    Ok((PathBuf::from(path), offset))
}

fn seeded_registers(cli: &Cli, entry: Word) -> Registers {
    let mut registers = Registers::new();
    registers.pr = entry;
    registers.sp = cli.sp.unwrap_or(0xFFFF);
    registers.gr[0] = cli.gr0.unwrap_or(0);
    registers.gr[1] = cli.gr1.unwrap_or(0);
    registers.gr[2] = cli.gr2.unwrap_or(0);
    registers.gr[3] = cli.gr3.unwrap_or(0);
    registers.gr[4] = cli.gr4.unwrap_or(0);
    registers.gr[5] = cli.gr5.unwrap_or(0);
    registers.gr[6] = cli.gr6.unwrap_or(0);
    registers.gr[7] = cli.gr7.unwrap_or(0);
    registers.z = cli.set_z;
    registers.s = cli.set_s;
    registers.o = cli.set_o;
    registers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli() -> Cli {
        Cli {
            program: None,
            assembly: None,
            load_raw: None,
            input: None,
            output: None,
            trace: None,
            gr0: None,
            gr1: None,
            gr2: None,
            gr3: None,
            gr4: None,
            gr5: None,
            gr6: None,
            gr7: None,
            sp: None,
            set_z: false,
            set_s: false,
            set_o: false,
            entry: None,
            end: None,
            virtual_call: false,
            admit_all_input: false,
        }
    }

    #[test]
    fn parse_load_raw_splits_on_the_last_colon() {
        let (path, offset) = parse_load_raw("data.bin:256").unwrap();
        assert_eq!(path, PathBuf::from("data.bin"));
        assert_eq!(offset, 256);
    }

    #[test]
    fn parse_load_raw_rejects_a_missing_offset() {
        assert!(parse_load_raw("data.bin").is_err());
    }

    #[test]
    fn seeded_registers_defaults_sp_to_top_of_memory() {
        let cli = bare_cli();
        let registers = seeded_registers(&cli, 0x10);
        assert_eq!(registers.pr, 0x10);
        assert_eq!(registers.sp, 0xFFFF);
        assert!(!registers.z);
    }

    #[test]
    fn seeded_registers_honors_explicit_overrides() {
        let mut cli = bare_cli();
        cli.gr3 = Some(42);
        cli.sp = Some(0x2000);
        cli.set_o = true;
        let registers = seeded_registers(&cli, 0);
        assert_eq!(registers.gr[3], 42);
        assert_eq!(registers.sp, 0x2000);
        assert!(registers.o);
    }
}

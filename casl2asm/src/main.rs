use byteorder::WriteBytesExt;
use casl2asm::error::AssembleError;
use casl2asm::source_map::SourceMapItem;
use casl2util::Endian;
use clap::Parser;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(about = "Assembles CASL2 source into a COMET2 memory image.")]
struct Cli {
    /// Source file to assemble, or `-` for stdin.
    input: String,

    /// Writes the assembled binary image to this path.
    #[arg(long, value_name = "PATH")]
    dump: Option<PathBuf>,

    /// Prints the resolved entry/end addresses and symbol table instead of
    /// dumping.
    #[arg(long)]
    labels: bool,

    /// Lexes and parses the source without encoding or patching it.
    #[arg(long)]
    parse_only: bool,

    /// Leaves this many zero cells ahead of the first emitted word.
    #[arg(long, value_name = "N", default_value_t = 0)]
    data_offset: u16,

    /// Writes the source map (start line, line count per emitted word) here.
    #[arg(long, value_name = "PATH")]
    source_map: Option<PathBuf>,
}

#[derive(Debug)]
enum IOErrorContext {
    ReadInput,
    WriteOutput,
}

#[derive(Debug)]
enum Error {
    Assemble(AssembleError),
    Io(std::io::Error, IOErrorContext, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, context, path) => writeln!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IOErrorContext::ReadInput => "Reading input",
                    IOErrorContext::WriteOutput => "Writing output",
                },
                path.display(),
                err
            ),
            Error::Assemble(err) => write!(f, "Assembling input failed: {}", err),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = casl2asm_main(&cli) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn read_source(input: &str) -> Result<String, Error> {
    if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, PathBuf::from("-")))?;
        return Ok(text);
    }

    let path = Path::new(input);
    let file =
        File::open(path).map_err(|err| Error::Io(err, IOErrorContext::ReadInput, path.to_owned()))?;
    let mut text = String::new();
    BufReader::new(file)
        .read_to_string(&mut text)
        .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, path.to_owned()))?;
    Ok(text)
}

fn casl2asm_main(cli: &Cli) -> Result<(), Error> {
    let source = read_source(&cli.input)?;

    if cli.parse_only {
        let mut lines = 0;
        for (index, line) in source.lines().enumerate() {
            if casl2asm::lexer::lex_line((index + 1) as u32, line.trim_end_matches('\r'))
                .map_err(Error::Assemble)?
                .is_some()
            {
                lines += 1;
            }
        }
        println!("parsed {} statements without error", lines);
        return Ok(());
    }

    let assembled =
        casl2asm::assemble_with_origin(&source, cli.data_offset).map_err(Error::Assemble)?;

    if cli.labels {
        println!("entry: {:04X}", assembled.entry);
        println!("end:   {:04X}", assembled.end);
        let mut labels: Vec<(&String, &u16)> = assembled.labels.iter().collect();
        labels.sort_by_key(|(name, _)| name.as_str());
        for (name, address) in labels {
            println!("{:<8} {:04X}", name, address);
        }
        return Ok(());
    }

    if let Some(dump_path) = &cli.dump {
        let file = File::create(dump_path)
            .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, dump_path.clone()))?;
        assembled
            .memory
            .dump(BufWriter::new(file))
            .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, dump_path.clone()))?;
    }

    if let Some(map_path) = &cli.source_map {
        write_source_map(&assembled.source_map, map_path)
            .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, map_path.clone()))?;
    }

    Ok(())
}

fn write_source_map(source_map: &[SourceMapItem], path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in source_map.iter() {
        writer.write_u32::<Endian>(item.start_line)?;
        writer.write_u32::<Endian>(item.line_count)?;
    }
    Ok(())
}

//! Punto de entrada ("driver").
//!
//! Este módulo lee el programa, ejecuta la pipeline de compilación
//! y expone una CLI para inspeccionar las salidas de cada fase.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, Command};
use log::{LevelFilter, Log, Metadata, Record};
use simpsim_compiler::{
    compile,
    ir::{self, optimize::Passes},
    source::Source,
    Compilation,
};

use std::{
    fs::File,
    io::{self, Write},
    str::FromStr,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("SimpSIM compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .default_value("-")
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Assembly output file ('-' for stdout)"),
        )
        .arg(Arg::new("tokens").long("tokens").help("Print the token list"))
        .arg(Arg::new("symbols").long("symbols").help("Print the symbol table"))
        .arg(
            Arg::new("ir")
                .long("ir")
                .help("Print original and optimized three-address code"),
        )
        .arg(
            Arg::new("registers")
                .long("registers")
                .help("Print the register map"),
        )
        .arg(
            Arg::new("no-opt")
                .long("no-opt")
                .takes_value(true)
                .multiple_occurrences(true)
                .value_name("PASS")
                .help("Disable an optimizer pass (cse, dce, copy, jumps, algebra, conditions, redundant, all)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Increase log verbosity"),
        )
        .get_matches();

    init_logger(args.occurrences_of("verbose"));

    let mut passes = Passes::all();
    for name in args.values_of("no-opt").into_iter().flatten() {
        passes.remove(Passes::from_str(name)?);
    }

    // Se extraen argumentos necesarios
    let input = args.value_of("input").unwrap_or("-");
    let output = args.value_of("output").unwrap_or("-");

    let (source, text) = match input {
        "-" => Source::read(io::stdin(), "<stdin>").context("Failed to read from stdin")?,
        path => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open for reading: {}", path))?;

            Source::read(file, path).with_context(|| format!("Failed to read: {}", path))?
        }
    };

    let compilation = compile(&text, passes);
    let mut stdout = io::stdout();

    if args.is_present("tokens") {
        for token in &compilation.tokens {
            writeln!(stdout, "{}:{}", token.location(), token.val())?;
        }
    }

    if !compilation.is_ok() {
        eprint!("{}", compilation.diagnostics.render(&source));
        bail!("{} error(s) found", compilation.diagnostics.len());
    }

    if args.is_present("symbols") {
        write!(stdout, "{}", compilation.symbols)?;
    }

    if args.is_present("ir") {
        print_ir(&mut stdout, &compilation)?;
    }

    let translation = match compilation.translation {
        Some(translation) => translation,
        None => bail!("No code was generated"),
    };

    if args.is_present("registers") {
        write!(stdout, "{}", translation.registers)?;
    }

    match output {
        "-" => write_lines(&mut stdout, &translation.assembly)
            .context("Failed to emit to stdout")?,

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            write_lines(&mut file, &translation.assembly)
                .with_context(|| format!("Failed to emit to file: {}", path))?;
        }
    }

    log::info!("{}", translation.summary);
    Ok(())
}

fn print_ir<W: Write>(output: &mut W, compilation: &Compilation) -> io::Result<()> {
    writeln!(output, "; original")?;
    write_lines(output, &ir::render(&compilation.tac))?;

    if let Some(optimization) = &compilation.optimization {
        writeln!(output, "; optimized, {} round(s) with changes", optimization.changes)?;
        write_lines(output, &ir::render(&optimization.code))?;

        for (index, original) in &optimization.original_by_index {
            writeln!(output, "; changed {}: {}", index, original)?;
        }
    }

    Ok(())
}

fn write_lines<W: Write>(output: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(output, "{}", line)?;
    }

    Ok(())
}

/// Logger mínimo hacia stderr.
struct Stderr;

static LOGGER: Stderr = Stderr;

impl Log for Stderr {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logger(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // Solo falla si ya hay un logger instalado
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

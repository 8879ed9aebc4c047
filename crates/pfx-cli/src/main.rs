use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pfx_vm::{Buffer, Machine};

/// pfx — effect compiler and bytecode runner
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input effect source file
    input: PathBuf,

    /// Entry point to compile
    #[arg(short, long, default_value = "main")]
    entry: String,

    /// Output path for the encoded bytecode container
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the typed module to stderr after analysis
    #[arg(long)]
    emit_ir: bool,

    /// Print the disassembled program to stdout
    #[arg(long)]
    emit_asm: bool,

    /// Run the compiled entry point and report the result
    #[arg(long)]
    run: bool,

    /// Dispatch grid: number of groups (with --run)
    #[arg(long, default_value = "1")]
    groups: u32,

    /// Dispatch grid: threads per group (with --run)
    #[arg(long, default_value = "1")]
    threads: u32,

    /// Words in the zero-filled buffer bound to each input slot (with --run)
    #[arg(long, default_value = "64")]
    buffer_words: u32,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // 1. Read source file.
    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;

    // 2. Parse to a syntax tree.
    let unit = pfx_parser::parse(&source).map_err(|e| {
        let (line, col) = e.span().line_col(&source);
        miette::miette!("{}:{line}:{col}: {e}", cli.input.display())
    })?;

    // 3. Analyze, then surface the accumulated report with positions.
    let analysis = pfx_analysis::analyze(unit).map_err(|e| {
        let (line, col) = e.span().line_col(&source);
        miette::miette!("{}:{line}:{col}: {e}", cli.input.display())
    })?;
    for diag in analysis.report.iter() {
        match diag.span {
            Some(span) => {
                let (line, col) = span.line_col(&source);
                eprintln!("{}:{line}:{col}: {diag}", cli.input.display());
            }
            None => eprintln!("{}: {diag}", cli.input.display()),
        }
    }
    if !analysis.success() {
        return Err(miette::miette!(
            "compilation failed with {} error(s)",
            analysis.report.error_count()
        ));
    }

    // 4. Optionally dump the typed module.
    if cli.emit_ir {
        eprintln!("{}", pfx_ir::dump_module(&analysis.module));
    }

    // 5. Translate the requested entry point to bytecode.
    let program = pfx_bytecode::compile(&analysis.module, &cli.entry)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("bytecode translation failed")?;

    // 6. Disassembly and container output.
    if cli.emit_asm {
        print!("{}", program.disassemble());
    }
    if let Some(path) = &cli.output {
        std::fs::write(path, program.encode())
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    }

    // 7. Optionally execute.
    if cli.run {
        let inputs: Vec<(String, u32)> = program
            .layout
            .inputs
            .iter()
            .map(|input| (input.name.clone(), input.slot))
            .collect();
        let return_bytes = program.return_bytes;
        let mut machine = Machine::new(program);
        let mut buffers = Vec::new();
        for (name, slot) in inputs {
            let buffer = Arc::new(Buffer::with_len(cli.buffer_words));
            machine.set_input(slot, buffer.clone());
            buffers.push((name, buffer));
        }

        if cli.groups == 1 && cli.threads == 1 {
            let value = machine
                .evaluate()
                .map_err(|e| miette::miette!("{e}"))
                .wrap_err("execution faulted")?;
            if return_bytes == 0 {
                println!("{} returned", cli.entry);
            } else {
                println!(
                    "{} = 0x{value:08x}  i32 {}  f32 {}",
                    cli.entry,
                    value as i32,
                    f32::from_bits(value)
                );
            }
        } else {
            machine
                .dispatch(cli.groups, cli.threads)
                .map_err(|e| miette::miette!("{e}"))
                .wrap_err("dispatch faulted")?;
            println!("dispatched {}x{} invocations", cli.groups, cli.threads);
        }
        for (name, buffer) in &buffers {
            let words = buffer.to_words();
            let head: Vec<u32> = words.iter().copied().take(8).collect();
            println!(
                "buffer {name}: counter {}, {} words, head {head:?}",
                buffer.read_counter(),
                words.len()
            );
        }
    }

    Ok(())
}

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tlua_compiler::{CompileOptions, Compiler, SourceFile};

#[derive(Parser)]
#[command(
    name = "tlua",
    version,
    about = "Type-check annotated Lua and emit plain Lua.",
    long_about = "Parse an annotated Lua source file, check it against the structural type \
                  algebra, and print the equivalent plain Lua to stdout. Diagnostics go to \
                  stderr; the exit code is non-zero when any error-severity diagnostic was \
                  reported."
)]
struct Cli {
    /// Path to an annotated source file; reads stdin when omitted.
    input: Option<PathBuf>,

    /// Run the checker but do not print the emitted source.
    #[arg(long)]
    check: bool,

    /// Skip seeding the base library declarations.
    #[arg(long)]
    no_stdlib: bool,

    /// Directory searched by require() type resolution; may repeat.
    #[arg(long = "path", value_name = "DIR")]
    paths: Vec<PathBuf>,

    /// Dump the token stream produced by the lexer.
    #[arg(long)]
    dump_tokens: bool,
}

fn read_input(input: &Option<PathBuf>) -> Result<SourceFile> {
    match input {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(SourceFile::from_path(path, contents))
        }
        None => {
            let mut contents = String::new();
            std::io::stdin()
                .read_to_string(&mut contents)
                .context("failed to read stdin")?;
            Ok(SourceFile::inline("<stdin>", contents))
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let source = read_input(&cli.input)?;

    let options = CompileOptions {
        stdlib: !cli.no_stdlib,
        module_roots: cli.paths.clone(),
        dump_tokens: cli.dump_tokens,
    };
    let mut compiler = Compiler::new(options)?;

    let result = compiler.compile(&source);

    for diagnostic in compiler.diagnostics().entries() {
        eprintln!("{diagnostic}");
    }

    match result {
        Ok(compilation) => {
            if !cli.check {
                print!("{}", compilation.new_source);
            }
            if compiler.diagnostics().has_errors() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

use std::{path::PathBuf, process::ExitCode};

use clap::{CommandFactory, Parser as ClapParser, ValueEnum, error::ErrorKind};
use colored::Colorize;
use itertools::Itertools;
use tacc::{
    CompilationResult, Compiler, CompilerOptions,
    frontend::SourceFile,
    middle::{optimization::DEFAULT_MAX_PASSES, tac::pretty_print::pretty_print_tac},
};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    source_files: Vec<PathBuf>,

    /// Which stage output to print
    #[arg(long, value_enum, default_value_t = Emit::All)]
    emit: Emit,

    /// Skip the TAC optimizer
    #[arg(long)]
    no_optimize: bool,

    /// Upper bound on optimizer rounds
    #[arg(long, default_value_t = DEFAULT_MAX_PASSES)]
    max_passes: usize,

    /// Also write the report, without colors, to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Syntax,
    Semantic,
    Tac,
    Optimized,
    Quadruples,
    Errors,
    All,
}

impl Emit {
    fn includes(self, section: Emit) -> bool {
        self == Emit::All || self == section
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    if args.source_files.is_empty() {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing source files!")
            .exit();
    }

    for source_file in &args.source_files {
        if !source_file.exists() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Source file '{}' does not exist!", source_file.display()),
                )
                .exit()
        }

        if !source_file.is_file() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Input path '{}' is not a file!", source_file.display()),
                )
                .exit()
        }
    }

    /* Read in source files */

    let mut source_files = Vec::new();
    for path in &args.source_files {
        match SourceFile::read(path.clone()) {
            Ok(source_file) => source_files.push(source_file),
            Err(error) => Args::command()
                .error(
                    ErrorKind::Io,
                    format!("Failed to read '{}': {error}", path.display()),
                )
                .exit(),
        }
    }

    let mut compiler = Compiler::new(CompilerOptions {
        optimize: !args.no_optimize,
        max_optimization_passes: args.max_passes,
    });

    let mut report = Vec::new();
    let mut failed = false;

    for source_file in &source_files {
        log::info!("compiling {}", source_file.origin);

        let result = compiler.compile(&source_file.contents);
        failed |= result.has_errors();

        report.push(
            format!("=== {} ===", source_file.origin)
                .bold()
                .to_string(),
        );
        report.extend(render_sections(&result, args.emit));
    }

    let report = report.join("\n");
    println!("{report}");

    if let Some(path) = &args.output {
        let plain = strip_ansi_escapes::strip_str(&report);

        if let Err(error) = std::fs::write(path, plain + "\n") {
            eprintln!(
                "{} failed to write '{}': {error}",
                "error:".red().bold(),
                path.display()
            );
            return ExitCode::FAILURE;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn section(title: &str, body: String) -> String {
    format!("{}\n{body}\n", format!("--- {title} ---").cyan().bold())
}

fn render_sections(result: &CompilationResult, emit: Emit) -> Vec<String> {
    let mut sections = Vec::new();

    if emit.includes(Emit::Tokens) {
        let tokens = result
            .tokens
            .iter()
            .map(|token| {
                format!(
                    "{:>4}:{:<4} {} {}",
                    token.line,
                    token.column,
                    format!("{:<24}", format!("{:?}", token.kind)).blue(),
                    token.lexeme
                )
            })
            .join("\n");
        sections.push(section("Tokens", tokens));
    }

    if emit.includes(Emit::Syntax) {
        sections.push(section("Syntactic analysis", result.syntax_report.clone()));
    }

    if emit.includes(Emit::Semantic) {
        sections.push(section("Semantic analysis", result.semantic_report.clone()));
    }

    if emit.includes(Emit::Tac) {
        sections.push(section("Three-address code", pretty_print_tac(&result.tac)));
    }

    if emit.includes(Emit::Optimized) {
        sections.push(section(
            "Optimized three-address code",
            pretty_print_tac(&result.optimized_tac),
        ));
    }

    if emit.includes(Emit::Quadruples) {
        sections.push(section("Quadruples", result.quadruples_text()));
    }

    if emit.includes(Emit::Errors) {
        let report = result.error_report();
        let report = if result.has_errors() {
            report.red().to_string()
        } else {
            report.green().to_string()
        };
        sections.push(section("Errors", report));
    }

    sections
}

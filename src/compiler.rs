//! Runs the pipeline over one source text: lexer, semantic analysis, TAC
//! generation and optimization. Stages are skipped when an earlier stage
//! recorded an error that makes their input meaningless.

use std::panic::{self, AssertUnwindSafe};

use crate::{
    diagnostics::{CompilationError, ErrorKind, ErrorManager},
    frontend::lexer::{Lexer, Token},
    middle::{
        optimization::{self, DEFAULT_MAX_PASSES},
        semantic::{SemanticAnalyzer, scope::SymbolSnapshot},
        tac::{Instruction, generator::TacGenerator, render_quadruples, render_tac},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// When false the optimized TAC is a copy of the generated TAC
    pub optimize: bool,
    pub max_optimization_passes: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            max_optimization_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// Everything produced by one call to [`Compiler::compile`]
#[derive(Debug, Clone, Default)]
pub struct CompilationResult {
    pub tokens: Vec<Token>,
    pub syntax_report: String,
    pub semantic_report: String,
    pub symbols: Vec<SymbolSnapshot>,
    pub tac: Vec<Instruction>,
    pub optimized_tac: Vec<Instruction>,
    pub errors: Vec<CompilationError>,
}

impl CompilationResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_errors_of(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn tac_text(&self) -> String {
        render_tac(&self.tac)
    }

    pub fn optimized_tac_text(&self) -> String {
        render_tac(&self.optimized_tac)
    }

    pub fn quadruples_text(&self) -> String {
        render_quadruples(&self.optimized_tac)
    }

    pub fn error_report(&self) -> String {
        crate::diagnostics::render_report(&self.errors)
    }
}

/// The compilation manager. Reusable: every call to `compile` starts from an
/// empty error list.
#[derive(Debug, Default)]
pub struct Compiler {
    options: CompilerOptions,
    errors: ErrorManager,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            errors: ErrorManager::new(),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn compile(&mut self, source: &str) -> CompilationResult {
        self.errors.clear();

        let mut result = CompilationResult {
            tokens: Lexer::tokenize(source, &mut self.errors),
            ..Default::default()
        };

        if self.errors.has_errors_of(ErrorKind::Lexical) {
            log::debug!("lexical errors found, skipping analysis and generation");
            result.syntax_report = "Syntactic analysis skipped: lexical errors".to_owned();
            result.semantic_report = self.errors.report();
            result.errors = self.errors.errors().to_vec();
            return result;
        }

        let tokens = &result.tokens;
        let errors = &mut self.errors;
        let analysis = guard(errors, ErrorKind::Semantic, "semantic analysis", |errors| {
            SemanticAnalyzer::analyze(tokens, errors)
        });

        if let Some(analysis) = analysis {
            result.syntax_report = analysis.syntax_report();
            result.symbols = analysis.symbols.clone();
            result.semantic_report = if self.errors.has_errors_of(ErrorKind::Semantic) {
                crate::diagnostics::render_report(self.errors.errors_of(ErrorKind::Semantic))
            } else {
                analysis.symbol_table_report()
            };
        }

        if self.errors.has_errors_of(ErrorKind::Syntactic) {
            log::debug!("syntactic errors found, skipping TAC generation");
            result.errors = self.errors.errors().to_vec();
            return result;
        }

        let tokens = &result.tokens;
        let generated = guard(
            &mut self.errors,
            ErrorKind::Syntactic,
            "TAC generation",
            |errors| match TacGenerator::generate(tokens) {
                Ok(instructions) => instructions,
                Err(error) => {
                    errors.add(error);
                    Vec::new()
                }
            },
        )
        .unwrap_or_default();

        let options = self.options;
        let optimized = if options.optimize {
            let input = generated.clone();
            guard(
                &mut self.errors,
                ErrorKind::Semantic,
                "optimization",
                move |_| optimization::optimize(input, options.max_optimization_passes),
            )
            .unwrap_or_else(|| generated.clone())
        } else {
            generated.clone()
        };

        result.tac = generated;
        result.optimized_tac = optimized;
        result.errors = self.errors.errors().to_vec();

        log::info!(
            "compiled {} tokens into {} instructions ({} after optimization), {} errors",
            result.tokens.len(),
            result.tac.len(),
            result.optimized_tac.len(),
            result.errors.len()
        );

        result
    }
}

/// Runs one stage and turns a panic inside it into a recorded error, so a
/// malformed input can never take the whole pipeline down
fn guard<T>(
    errors: &mut ErrorManager,
    kind: ErrorKind,
    stage: &str,
    run: impl FnOnce(&mut ErrorManager) -> T,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(|| run(&mut *errors))) {
        Ok(value) => Some(value),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown failure".to_owned());

            log::error!("{stage} failed: {reason}");

            errors.add(CompilationError::new(
                kind,
                "Internal error",
                0,
                0,
                format!("Internal error during {stage}: {reason}"),
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::diagnostics::NO_ERRORS_SENTINEL;

    fn compile(source: &str) -> CompilationResult {
        Compiler::default().compile(source)
    }

    #[test]
    fn clean_program_runs_every_stage() {
        let result = compile(indoc! {"
            i = 0;
            while (i < 2) {
                print(i);
                i = i + 1;
            }
        "});

        assert!(!result.has_errors(), "{}", result.error_report());
        assert_eq!(result.error_report(), NO_ERRORS_SENTINEL);
        assert!(result.tac_text().contains("t1 = i < 2"));
        assert!(result.optimized_tac_text().contains("t1 = i < 2"));
        assert!(result.semantic_report.contains('i'));
        assert!(result.syntax_report.starts_with("Syntactic analysis completed"));
    }

    #[test]
    fn lexical_errors_skip_later_stages() {
        let result = compile("x = 1;\ny = x @ 2;");

        assert!(result.has_errors_of(ErrorKind::Lexical));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.error_report(),
            "Error(linea 2, columna 7) \"Unrecognized character '@'\""
        );
        assert!(result.tac.is_empty());
        assert_eq!(result.tokens.last().map(|t| t.kind), Some(crate::frontend::lexer::TokenKind::Eof));
    }

    #[test]
    fn syntactic_errors_skip_generation() {
        let result = compile("x = 1;\nwhile x < 2 { }");

        assert!(result.has_errors_of(ErrorKind::Syntactic));
        assert!(result.tac.is_empty());
        assert!(result.syntax_report.starts_with("Syntactic analysis stopped"));
    }

    #[test]
    fn semantic_errors_still_generate_code() {
        let result = compile("x = 3; y = \"a\"; z = x - y;");

        assert_eq!(result.errors.len(), 1);
        assert!(result.has_errors_of(ErrorKind::Semantic));
        assert!(result.semantic_report.contains("int and String"));
        assert!(result.tac_text().contains("t1 = x - y"));
    }

    #[test]
    fn oversized_literal_is_reported_once_and_still_lowered() {
        let result = compile("a = 1; b = 99999999999999999999; print(a);");

        assert_eq!(result.errors.len(), 1, "{}", result.error_report());
        assert!(result.has_errors_of(ErrorKind::Semantic));
        assert!(!result.tac.is_empty());
        assert!(result.tac_text().contains("param a"));
    }

    #[test]
    fn optimization_can_be_disabled() {
        let mut compiler = Compiler::new(CompilerOptions {
            optimize: false,
            ..Default::default()
        });
        let result = compiler.compile("x = 1 + 2;");

        assert_eq!(result.tac, result.optimized_tac);
        assert_eq!(result.optimized_tac_text(), "t1 = 1 + 2\nx = t1");
        assert!(!compiler.options().optimize);
    }

    #[test]
    fn optimized_output_is_folded() {
        let result = compile("x = 1 + 2;");

        assert_eq!(result.optimized_tac_text(), "x = 3");
        assert_eq!(result.quadruples_text(), "   0: (=, 3, _, x)");
    }

    #[test]
    fn errors_do_not_leak_between_compilations() {
        let mut compiler = Compiler::default();

        assert!(compiler.compile("x = @;").has_errors());
        assert!(!compiler.compile("x = 1;").has_errors());
    }

    #[test]
    fn panicking_stage_becomes_an_error() {
        let mut errors = ErrorManager::new();
        let value: Option<()> = guard(&mut errors, ErrorKind::Semantic, "testing", |_| {
            panic!("boom")
        });

        assert!(value.is_none());
        assert_eq!(errors.errors().len(), 1);
        assert_eq!(errors.errors()[0].message, "Internal error");
        assert!(errors.errors()[0].details.contains("boom"));
    }
}

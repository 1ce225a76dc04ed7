//! Semantic analysis
//!
//! The analyzer walks the token stream with the same recursive descent the
//! TAC generator uses, but instead of emitting code it maintains a stack of
//! scopes and checks the language's rules as it goes:
//!
//!   1) declarations: the first assignment to an unseen name (or a function
//!      parameter) registers it in the current scope with the type of the
//!      assigned value
//!   2) reassignments and operators: types must match exactly, there is no
//!      implicit int/float promotion, and `+` with a `String` is the only
//!      mixed-type operation
//!   3) uses: a name must be visible from the current scope and must have been
//!      assigned before it is read
//!
//! Violations are recorded as semantic errors and analysis continues. Only an
//! unexpected token stops the walk, which is reported as a syntactic error.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use crate::{
    diagnostics::{CompilationError, ErrorManager},
    frontend::{
        cursor::TokenCursor,
        lexer::{Keyword, Token, TokenKind},
    },
};

pub mod scope;
pub mod ty;

use self::{
    scope::{ScopeStack, SymbolSnapshot, VariableInfo},
    ty::{RESERVED_TYPE_NAMES, Type},
};

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<String>,
    pub declared_line: usize,
    /// Type of the first `return` with a value, if any
    pub return_type: Type,
}

/// One statement recognized while walking the tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub depth: usize,
    pub line: usize,
    pub description: String,
}

/// Everything that survives semantic analysis
#[derive(Debug, Clone)]
pub struct Analysis {
    pub outline: Vec<OutlineEntry>,
    pub symbols: Vec<SymbolSnapshot>,
    pub functions: Vec<FunctionSignature>,
    /// False when an unexpected token stopped the walk
    pub completed: bool,
}

impl Analysis {
    pub fn syntax_report(&self) -> String {
        let header = if self.completed {
            format!(
                "Syntactic analysis completed: {} statements",
                self.outline.len()
            )
        } else {
            format!(
                "Syntactic analysis stopped after {} statements",
                self.outline.len()
            )
        };

        std::iter::once(header)
            .chain(self.outline.iter().map(|entry| {
                format!(
                    "{}line {}: {}",
                    "  ".repeat(entry.depth),
                    entry.line,
                    entry.description
                )
            }))
            .join("\n")
    }

    pub fn symbol_table_report(&self) -> String {
        let mut lines = vec![format!(
            "{:<16} {:<8} {:<16} {:<6} {:<9} {}",
            "Name", "Type", "Value", "Line", "Constant", "Scope"
        )];

        lines.extend(self.symbols.iter().map(|symbol| {
            format!(
                "{:<16} {:<8} {:<16} {:<6} {:<9} {}",
                symbol.name,
                symbol.info.ty.to_string(),
                symbol.info.value.as_deref().unwrap_or("-"),
                symbol.info.declared_line,
                if symbol.info.is_constant { "yes" } else { "no" },
                symbol.scope
            )
        }));

        if !self.functions.is_empty() {
            lines.push(String::new());
            lines.push("Functions".to_owned());
            lines.extend(self.functions.iter().map(|function| {
                format!(
                    "{}({}) -> {} (line {})",
                    function.name,
                    function.parameters.join(", "),
                    function.return_type,
                    function.declared_line
                )
            }));
        }

        lines.join("\n")
    }
}

/// Type and, for plain literals, the literal text of an analyzed expression
#[derive(Debug, Clone)]
struct Value {
    ty: Type,
    literal: Option<String>,
}

impl Value {
    fn unknown() -> Self {
        Self {
            ty: Type::Unknown,
            literal: None,
        }
    }

    fn of_type(ty: Type) -> Self {
        Self { ty, literal: None }
    }
}

type AnalysisResult<T = ()> = Result<T, CompilationError>;

#[derive(Debug)]
pub struct SemanticAnalyzer<'t, 'e> {
    cursor: TokenCursor<'t>,
    errors: &'e mut ErrorManager,
    scopes: ScopeStack,
    functions: BTreeMap<String, FunctionSignature>,
    /// Every name that is the target of an assignment somewhere in the input
    assigned_names: HashSet<String>,
    current_function: Option<String>,
    /// Number of enclosing loops and switches `break` can leave
    breakable_depth: usize,
    outline: Vec<OutlineEntry>,
    outline_depth: usize,
}

impl<'t, 'e> SemanticAnalyzer<'t, 'e> {
    pub fn analyze(tokens: &'t [Token], errors: &'e mut ErrorManager) -> Analysis {
        let mut analyzer = Self {
            cursor: TokenCursor::new(tokens),
            errors,
            scopes: ScopeStack::new(),
            functions: BTreeMap::new(),
            assigned_names: HashSet::new(),
            current_function: None,
            breakable_depth: 0,
            outline: Vec::new(),
            outline_depth: 0,
        };

        analyzer.collect_declarations(tokens);

        let completed = match analyzer.analyze_program() {
            Ok(()) => true,
            Err(error) => {
                analyzer.errors.add(error);
                false
            }
        };

        log::debug!(
            "semantic analysis finished: {} statements, {} symbols, {} functions",
            analyzer.outline.len(),
            analyzer.scopes.snapshot().len(),
            analyzer.functions.len()
        );

        let mut functions = analyzer.functions.into_values().collect::<Vec<_>>();
        functions.sort_by_key(|function| function.declared_line);

        Analysis {
            outline: analyzer.outline,
            symbols: analyzer.scopes.snapshot(),
            functions,
            completed,
        }
    }

    fn report(&mut self, token: &Token, message: &str, details: String) {
        self.errors.add(CompilationError::semantic(
            token.line,
            token.column,
            message,
            details,
        ));
    }

    fn record_outline(&mut self, line: usize, description: impl Into<String>) {
        self.outline.push(OutlineEntry {
            depth: self.outline_depth,
            line,
            description: description.into(),
        });
    }

    /// Finds function signatures and assigned names ahead of the walk so that
    /// calls may precede definitions and so that reads before the first
    /// assignment can be told apart from reads of unknown names.
    fn collect_declarations(&mut self, tokens: &'t [Token]) {
        for (index, token) in tokens.iter().enumerate() {
            let next = tokens.get(index + 1).map(|t| t.kind);

            if token.kind == TokenKind::Identifier && next == Some(TokenKind::Equals) {
                self.assigned_names.insert(token.lexeme.clone());
            }

            if !token.is_keyword(Keyword::Function) {
                continue;
            }

            let Some(name) = tokens
                .get(index + 1)
                .filter(|t| t.kind == TokenKind::Identifier)
            else {
                continue;
            };

            let parameters = tokens[index + 2..]
                .iter()
                .skip(1)
                .take_while(|t| t.kind != TokenKind::CloseParen && t.kind != TokenKind::Eof)
                .filter(|t| t.kind == TokenKind::Identifier)
                .map(|t| t.lexeme.clone())
                .collect::<Vec<_>>();

            if self.functions.contains_key(&name.lexeme) {
                self.report(
                    name,
                    "Redeclared identifier",
                    format!("Function '{}' is already declared", name.lexeme),
                );
                continue;
            }

            self.functions.insert(
                name.lexeme.clone(),
                FunctionSignature {
                    name: name.lexeme.clone(),
                    parameters,
                    declared_line: name.line,
                    return_type: Type::Unknown,
                },
            );
        }
    }

    fn analyze_program(&mut self) -> AnalysisResult {
        while !self.cursor.is_eof() {
            self.analyze_statement()?;
        }

        Ok(())
    }

    fn analyze_statement(&mut self) -> AnalysisResult {
        let token = self.cursor.peek();

        match token.kind {
            TokenKind::Keyword(_) if self.cursor.peek_nth(1).kind == TokenKind::Equals => {
                self.analyze_reserved_word_assignment()
            }
            TokenKind::Keyword(Keyword::Function) => self.analyze_function(),
            TokenKind::Keyword(Keyword::Const) => self.analyze_constant(),
            TokenKind::Keyword(Keyword::If) => self.analyze_if(),
            TokenKind::Keyword(Keyword::While) => self.analyze_while(),
            TokenKind::Keyword(Keyword::For) => self.analyze_for(),
            TokenKind::Keyword(Keyword::Switch) => self.analyze_switch(),
            TokenKind::Keyword(Keyword::Break) => self.analyze_break(),
            TokenKind::Keyword(Keyword::Return) => self.analyze_return(),
            TokenKind::Keyword(keyword @ (Keyword::Print | Keyword::Println)) => {
                self.analyze_print(keyword)
            }
            TokenKind::IntegerLiteral
                if self.cursor.peek_nth(1).kind == TokenKind::Identifier
                    && self.cursor.peek_nth(2).kind == TokenKind::Equals =>
            {
                self.analyze_invalid_identifier_assignment()
            }
            TokenKind::Identifier => {
                self.analyze_simple_statement()?;
                self.cursor
                    .expect_next_to_be(TokenKind::Semicolon, "';'")?;
                Ok(())
            }
            TokenKind::Semicolon => {
                self.cursor.next();
                Ok(())
            }
            _ => Err(TokenCursor::unexpected(token, "a statement")),
        }
    }

    // while = 5;
    fn analyze_reserved_word_assignment(&mut self) -> AnalysisResult {
        let keyword = self.cursor.next();
        self.cursor.next();

        self.record_outline(keyword.line, format!("assignment '{}'", keyword.lexeme));
        self.report(
            keyword,
            "Reserved word",
            format!(
                "'{}' is a reserved word and cannot be used as an identifier",
                keyword.lexeme
            ),
        );

        self.analyze_expression()?;
        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    // 2abc = 5;
    fn analyze_invalid_identifier_assignment(&mut self) -> AnalysisResult {
        let number = self.cursor.next();
        let rest = self.cursor.next();
        self.cursor.next();

        let name = format!("{}{}", number.lexeme, rest.lexeme);
        self.record_outline(number.line, format!("assignment '{name}'"));
        self.report(
            number,
            "Invalid identifier",
            format!(
                "Identifier '{name}' must start with a letter or underscore and contain only letters, digits or underscores"
            ),
        );

        self.analyze_expression()?;
        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    /// Reports names that are reserved or malformed. Returns whether the name
    /// may be bound.
    fn check_identifier(&mut self, name: &Token) -> bool {
        if RESERVED_TYPE_NAMES.contains(&name.lexeme.as_str()) {
            self.report(
                name,
                "Reserved word",
                format!(
                    "'{}' is a reserved word and cannot be used as an identifier",
                    name.lexeme
                ),
            );
            return false;
        }

        if !ty::is_valid_identifier(&name.lexeme) {
            self.report(
                name,
                "Invalid identifier",
                format!(
                    "Identifier '{}' must start with a letter or underscore and contain only letters, digits or underscores",
                    name.lexeme
                ),
            );
            return false;
        }

        true
    }

    // function suma(a, b) { ... }
    fn analyze_function(&mut self) -> AnalysisResult {
        let keyword = self.cursor.expect_keyword(Keyword::Function)?;
        let name = self
            .cursor
            .expect_next_to_be(TokenKind::Identifier, "a function name")?;

        self.record_outline(keyword.line, format!("function '{}'", name.lexeme));

        if self.current_function.is_some() {
            self.report(
                name,
                "Nested function",
                format!(
                    "Function '{}' must be declared at the top level",
                    name.lexeme
                ),
            );
        }

        self.check_identifier(name);

        let parameters = self.parse_parameter_list()?;

        self.scopes.push_scope(name.lexeme.as_str());

        for parameter in parameters {
            if !self.check_identifier(parameter) {
                continue;
            }

            if self.scopes.get_shallow_binding(&parameter.lexeme).is_some() {
                self.report(
                    parameter,
                    "Redeclared identifier",
                    format!(
                        "Parameter '{}' is already declared in function '{}'",
                        parameter.lexeme, name.lexeme
                    ),
                );
                continue;
            }

            self.scopes.add_shallow_binding(
                parameter.lexeme.as_str(),
                VariableInfo {
                    ty: Type::Unknown,
                    value: None,
                    declared_line: parameter.line,
                    is_constant: false,
                },
            );
        }

        let enclosing_function = self.current_function.replace(name.lexeme.clone());
        let enclosing_breakable = std::mem::take(&mut self.breakable_depth);

        let result = self.analyze_block_body();

        self.breakable_depth = enclosing_breakable;
        self.current_function = enclosing_function;
        self.scopes.pop_scope();

        result
    }

    // (a, b)
    fn parse_parameter_list(&mut self) -> AnalysisResult<Vec<&'t Token>> {
        let mut parameters = Vec::new();

        self.cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;

        if !self.cursor.next_is(TokenKind::CloseParen) {
            parameters.push(
                self.cursor
                    .expect_next_to_be(TokenKind::Identifier, "a parameter name")?,
            );

            while self.cursor.eat(TokenKind::Comma).is_some() {
                parameters.push(
                    self.cursor
                        .expect_next_to_be(TokenKind::Identifier, "a parameter name")?,
                );
            }
        }

        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;

        Ok(parameters)
    }

    /// `{ statement* }` inside a fresh scope
    fn analyze_block(&mut self, scope_name: String) -> AnalysisResult {
        self.scopes.push_scope(scope_name);
        let result = self.analyze_block_body();
        self.scopes.pop_scope();
        result
    }

    /// `{ statement* }` in whatever scope is current
    fn analyze_block_body(&mut self) -> AnalysisResult {
        self.cursor
            .expect_next_to_be(TokenKind::OpenBrace, "'{'")?;

        self.outline_depth += 1;

        while !self.cursor.next_is(TokenKind::CloseBrace) && !self.cursor.is_eof() {
            if let Err(error) = self.analyze_statement() {
                self.outline_depth -= 1;
                return Err(error);
            }
        }

        self.outline_depth -= 1;

        self.cursor
            .expect_next_to_be(TokenKind::CloseBrace, "'}'")?;
        Ok(())
    }

    // const PI = 3.14;
    fn analyze_constant(&mut self) -> AnalysisResult {
        let keyword = self.cursor.expect_keyword(Keyword::Const)?;
        let name = self
            .cursor
            .expect_next_to_be(TokenKind::Identifier, "a constant name")?;
        self.cursor.expect_next_to_be(TokenKind::Equals, "'='")?;

        self.record_outline(keyword.line, format!("constant '{}'", name.lexeme));

        let value = self.analyze_expression()?;
        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;

        if !self.check_identifier(name) {
            return Ok(());
        }

        if self.scopes.get_shallow_binding(&name.lexeme).is_some() {
            self.report(
                name,
                "Redeclared identifier",
                format!(
                    "'{}' is already declared in scope '{}'",
                    name.lexeme,
                    self.scopes.current_name()
                ),
            );
            return Ok(());
        }

        self.scopes.add_shallow_binding(
            name.lexeme.as_str(),
            VariableInfo {
                ty: value.ty,
                value: value.literal,
                declared_line: name.line,
                is_constant: true,
            },
        );

        Ok(())
    }

    /// `( expr )` that must evaluate to a boolean
    fn analyze_condition(&mut self, construct: &str) -> AnalysisResult {
        let open = self
            .cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;
        let condition = self.analyze_expression()?;
        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;

        self.check_condition_type(open, construct, condition.ty);

        Ok(())
    }

    fn check_condition_type(&mut self, at: &Token, construct: &str, ty: Type) {
        if !ty.is_compatible_with(Type::Boolean) {
            self.report(
                at,
                "Incompatible types",
                format!("Condition of '{construct}' must be boolean but found {ty}"),
            );
        }
    }

    // if (x > 1) { ... } else if (...) { ... } else { ... }
    fn analyze_if(&mut self) -> AnalysisResult {
        let keyword = self.cursor.expect_keyword(Keyword::If)?;
        self.record_outline(keyword.line, "if");

        self.analyze_condition("if")?;
        self.analyze_block(format!("if@{}", keyword.line))?;

        if let Some(else_keyword) = self.cursor.eat(TokenKind::Keyword(Keyword::Else)) {
            if self.cursor.next_is_keyword(Keyword::If) {
                return self.analyze_if();
            }

            self.record_outline(else_keyword.line, "else");
            self.analyze_block(format!("else@{}", else_keyword.line))?;
        }

        Ok(())
    }

    // while (i < 10) { ... }
    fn analyze_while(&mut self) -> AnalysisResult {
        let keyword = self.cursor.expect_keyword(Keyword::While)?;
        self.record_outline(keyword.line, "while");

        self.analyze_condition("while")?;

        self.breakable_depth += 1;
        let result = self.analyze_block(format!("while@{}", keyword.line));
        self.breakable_depth -= 1;

        result
    }

    // for (i = 0; i < 10; i++) { ... }
    fn analyze_for(&mut self) -> AnalysisResult {
        let keyword = self.cursor.expect_keyword(Keyword::For)?;
        self.record_outline(keyword.line, "for");

        self.scopes.push_scope(format!("for@{}", keyword.line));
        self.breakable_depth += 1;

        let result = self.analyze_for_clauses_and_body();

        self.breakable_depth -= 1;
        self.scopes.pop_scope();

        result
    }

    fn analyze_for_clauses_and_body(&mut self) -> AnalysisResult {
        self.cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;

        if !self.cursor.next_is(TokenKind::Semicolon) {
            self.analyze_simple_statement()?;
        }
        let separator = self
            .cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;

        if !self.cursor.next_is(TokenKind::Semicolon) {
            let condition = self.analyze_expression()?;
            self.check_condition_type(separator, "for", condition.ty);
        }
        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;

        if !self.cursor.next_is(TokenKind::CloseParen) {
            self.analyze_simple_statement()?;
        }
        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;

        self.analyze_block_body()
    }

    // switch (opcion) { case 1: ... break; default: ... }
    fn analyze_switch(&mut self) -> AnalysisResult {
        let keyword = self.cursor.expect_keyword(Keyword::Switch)?;
        self.record_outline(keyword.line, "switch");

        self.cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;
        let subject = self.analyze_expression()?;
        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;
        self.cursor
            .expect_next_to_be(TokenKind::OpenBrace, "'{'")?;

        self.scopes.push_scope(format!("switch@{}", keyword.line));
        self.breakable_depth += 1;
        self.outline_depth += 1;

        let result = self.analyze_switch_arms(subject.ty);

        self.outline_depth -= 1;
        self.breakable_depth -= 1;
        self.scopes.pop_scope();

        result?;

        self.cursor
            .expect_next_to_be(TokenKind::CloseBrace, "'}'")?;
        Ok(())
    }

    fn analyze_switch_arms(&mut self, subject: Type) -> AnalysisResult {
        let mut seen_constants = HashSet::new();
        let mut seen_default = false;

        loop {
            let token = self.cursor.peek();

            match token.kind {
                TokenKind::Keyword(Keyword::Case) => {
                    self.cursor.next();
                    let negated = self.cursor.eat(TokenKind::Minus).is_some();
                    let constant = self.cursor.next();

                    let Some(ty) = Type::of_literal(constant.kind) else {
                        return Err(TokenCursor::unexpected(constant, "a case constant"));
                    };

                    if negated && !matches!(ty, Type::Int | Type::Float) {
                        return Err(TokenCursor::unexpected(constant, "a numeric case constant"));
                    }

                    self.record_outline(token.line, format!("case {}", constant.lexeme));
                    self.check_literal(constant, negated);

                    if !ty.is_compatible_with(subject) {
                        self.report(
                            constant,
                            "Incompatible types",
                            format!(
                                "Case constant {} is {ty} but the switch value is {subject}",
                                constant.lexeme
                            ),
                        );
                    }

                    let text = format!("{}{}", if negated { "-" } else { "" }, constant.lexeme);
                    if !seen_constants.insert(text.clone()) {
                        self.report(
                            constant,
                            "Duplicate case",
                            format!("Case {text} appears more than once in this switch"),
                        );
                    }

                    self.cursor.expect_next_to_be(TokenKind::Colon, "':'")?;
                    self.analyze_case_body()?;
                }
                TokenKind::Keyword(Keyword::Default) => {
                    self.cursor.next();
                    self.record_outline(token.line, "default");

                    if seen_default {
                        self.report(
                            token,
                            "Duplicate case",
                            "'default' appears more than once in this switch".to_owned(),
                        );
                    }
                    seen_default = true;

                    self.cursor.expect_next_to_be(TokenKind::Colon, "':'")?;
                    self.analyze_case_body()?;
                }
                TokenKind::CloseBrace => return Ok(()),
                _ => return Err(TokenCursor::unexpected(token, "'case', 'default' or '}'")),
            }
        }
    }

    fn analyze_case_body(&mut self) -> AnalysisResult {
        self.outline_depth += 1;
        let result = self.analyze_case_statements();
        self.outline_depth -= 1;

        result
    }

    /// Statements up to the next `case`, `default` or the closing brace
    fn analyze_case_statements(&mut self) -> AnalysisResult {
        while !matches!(
            self.cursor.peek().kind,
            TokenKind::Keyword(Keyword::Case | Keyword::Default)
                | TokenKind::CloseBrace
                | TokenKind::Eof
        ) {
            self.analyze_statement()?;
        }

        Ok(())
    }

    fn analyze_break(&mut self) -> AnalysisResult {
        let keyword = self.cursor.expect_keyword(Keyword::Break)?;
        self.record_outline(keyword.line, "break");

        if self.breakable_depth == 0 {
            self.report(
                keyword,
                "Misplaced break",
                "'break' can only appear inside a loop or a switch".to_owned(),
            );
        }

        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    // return x + 1;
    fn analyze_return(&mut self) -> AnalysisResult {
        let keyword = self.cursor.expect_keyword(Keyword::Return)?;
        self.record_outline(keyword.line, "return");

        let value = if self.cursor.next_is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.analyze_expression()?)
        };

        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;

        match &self.current_function {
            Some(function) => {
                if let (Some(value), Some(signature)) = (value, self.functions.get_mut(function))
                {
                    if signature.return_type == Type::Unknown {
                        signature.return_type = value.ty;
                    }
                }
            }
            None => self.report(
                keyword,
                "Misplaced return",
                "'return' can only appear inside a function".to_owned(),
            ),
        }

        Ok(())
    }

    // println("total: " + total);
    fn analyze_print(&mut self, keyword: Keyword) -> AnalysisResult {
        let token = self.cursor.expect_keyword(keyword)?;
        self.record_outline(token.line, token.lexeme.as_str());

        self.analyze_arguments()?;
        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    /// `( (expr (, expr)*)? )`
    fn analyze_arguments(&mut self) -> AnalysisResult<Vec<Value>> {
        let mut arguments = Vec::new();

        self.cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;

        if !self.cursor.next_is(TokenKind::CloseParen) {
            arguments.push(self.analyze_expression()?);

            while self.cursor.eat(TokenKind::Comma).is_some() {
                arguments.push(self.analyze_expression()?);
            }
        }

        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;

        Ok(arguments)
    }

    /// Assignment, compound assignment, increment or call, without the
    /// trailing semicolon. Shared with `for` clauses.
    fn analyze_simple_statement(&mut self) -> AnalysisResult {
        let name = self
            .cursor
            .expect_next_to_be(TokenKind::Identifier, "an identifier")?;
        let operator = self.cursor.peek();

        match operator.kind {
            TokenKind::Equals => {
                self.cursor.next();
                self.record_outline(name.line, format!("assignment '{}'", name.lexeme));

                let value = self.analyze_expression()?;
                self.assign(name, value);
            }
            TokenKind::PlusEquals | TokenKind::MinusEquals => {
                self.cursor.next();
                self.record_outline(
                    name.line,
                    format!("compound assignment '{}'", name.lexeme),
                );

                let value = self.analyze_expression()?;
                let arithmetic = match operator.kind {
                    TokenKind::PlusEquals => TokenKind::Plus,
                    _ => TokenKind::Minus,
                };
                self.update(name, operator, |current| {
                    ty::binary_result_type(arithmetic, current, value.ty)
                });
            }
            TokenKind::Increment | TokenKind::Decrement => {
                self.cursor.next();
                self.record_outline(
                    name.line,
                    format!("{} '{}'", operator.kind.symbol(), name.lexeme),
                );

                self.update(name, operator, |current| {
                    ty::unary_result_type(TokenKind::Minus, current)
                });
            }
            TokenKind::OpenParen => {
                self.record_outline(name.line, format!("call '{}'", name.lexeme));
                self.analyze_call(name)?;
            }
            _ => {
                return Err(TokenCursor::unexpected(
                    operator,
                    "'=', '+=', '-=', '++', '--' or '('",
                ));
            }
        }

        Ok(())
    }

    /// Declares `name` in the current scope, or reassigns the visible binding
    /// if the value's type matches the declared type exactly
    fn assign(&mut self, name: &Token, value: Value) {
        if !self.check_identifier(name) {
            return;
        }

        let violation = match self.scopes.get_binding_mut(&name.lexeme) {
            Some(info) if info.is_constant => Some((
                "Constant reassignment",
                format!("Cannot reassign constant '{}'", name.lexeme),
            )),
            Some(info) if info.ty == Type::Unknown => {
                info.ty = value.ty;
                info.value = value.literal;
                None
            }
            Some(info) if info.ty.is_compatible_with(value.ty) => {
                info.value = value.literal;
                None
            }
            Some(info) => Some((
                "Incompatible types",
                format!(
                    "Incompatible types: '{}' is {} but the assigned value is {}",
                    name.lexeme, info.ty, value.ty
                ),
            )),
            None => {
                self.scopes.add_shallow_binding(
                    name.lexeme.as_str(),
                    VariableInfo {
                        ty: value.ty,
                        value: value.literal,
                        declared_line: name.line,
                        is_constant: false,
                    },
                );
                None
            }
        };

        if let Some((message, details)) = violation {
            self.report(name, message, details);
        }
    }

    /// Read-modify-write of an existing binding (`+=`, `++`, ...)
    fn update(
        &mut self,
        name: &Token,
        operator: &Token,
        result_type: impl FnOnce(Type) -> Result<Type, String>,
    ) {
        let Some(info) = self.scopes.get_binding_mut(&name.lexeme) else {
            self.report_unresolved(name);
            return;
        };

        let violation = if info.is_constant {
            Some((
                "Constant reassignment",
                format!("Cannot reassign constant '{}'", name.lexeme),
            ))
        } else {
            match result_type(info.ty) {
                Ok(ty) if ty.is_compatible_with(info.ty) => {
                    info.value = None;
                    None
                }
                Ok(ty) => Some((
                    "Incompatible types",
                    format!(
                        "Incompatible types: '{}' is {} but '{}' produces {ty}",
                        name.lexeme,
                        info.ty,
                        operator.kind.symbol()
                    ),
                )),
                Err(details) => Some(("Incompatible types", details)),
            }
        };

        if let Some((message, details)) = violation {
            self.report(operator, message, details);
        }
    }

    fn report_unresolved(&mut self, name: &Token) {
        let (message, details) = if self.functions.contains_key(&name.lexeme) {
            (
                "Invalid use of function",
                format!(
                    "Function '{}' cannot be used as a value",
                    name.lexeme
                ),
            )
        } else if self.scopes.was_bound_in_closed_scope(&name.lexeme) {
            (
                "Out of scope",
                format!("Variable '{}' is out of scope", name.lexeme),
            )
        } else if self.assigned_names.contains(&name.lexeme) {
            (
                "Uninitialized variable",
                format!(
                    "Variable '{}' is used before being initialized",
                    name.lexeme
                ),
            )
        } else {
            (
                "Undeclared variable",
                format!("Variable '{}' is not declared", name.lexeme),
            )
        };

        self.report(name, message, details);
    }

    fn check_literal(&mut self, token: &Token, negated: bool) {
        if let Err(details) = ty::check_literal(token, negated) {
            self.report(token, "Literal out of range", details);
        }
    }

    fn analyze_expression(&mut self) -> AnalysisResult<Value> {
        self.analyze_logical_or()
    }

    /// Left-associative chain of `operators` between `operand`s
    fn analyze_binary_level(
        &mut self,
        operators: &[TokenKind],
        operand: fn(&mut Self) -> AnalysisResult<Value>,
    ) -> AnalysisResult<Value> {
        let mut lhs = operand(self)?;

        while let Some(operator) = self.cursor.eat_any(operators) {
            let rhs = operand(self)?;
            lhs = self.check_binary(operator, lhs, rhs);
        }

        Ok(lhs)
    }

    fn analyze_logical_or(&mut self) -> AnalysisResult<Value> {
        self.analyze_binary_level(&[TokenKind::LogicalOr], Self::analyze_logical_and)
    }

    fn analyze_logical_and(&mut self) -> AnalysisResult<Value> {
        self.analyze_binary_level(&[TokenKind::LogicalAnd], Self::analyze_equality)
    }

    fn analyze_equality(&mut self) -> AnalysisResult<Value> {
        self.analyze_binary_level(
            &[TokenKind::DoubleEquals, TokenKind::NotEquals],
            Self::analyze_relational,
        )
    }

    fn analyze_relational(&mut self) -> AnalysisResult<Value> {
        self.analyze_binary_level(
            &[
                TokenKind::LessThan,
                TokenKind::LessThanOrEqualTo,
                TokenKind::GreaterThan,
                TokenKind::GreaterThanOrEqualTo,
            ],
            Self::analyze_additive,
        )
    }

    fn analyze_additive(&mut self) -> AnalysisResult<Value> {
        self.analyze_binary_level(
            &[TokenKind::Plus, TokenKind::Minus],
            Self::analyze_multiplicative,
        )
    }

    fn analyze_multiplicative(&mut self) -> AnalysisResult<Value> {
        self.analyze_binary_level(
            &[TokenKind::Asterisk, TokenKind::Divide, TokenKind::Modulus],
            Self::analyze_unary,
        )
    }

    fn check_binary(&mut self, operator: &Token, lhs: Value, rhs: Value) -> Value {
        if matches!(operator.kind, TokenKind::Divide | TokenKind::Modulus)
            && rhs.literal.as_deref().is_some_and(ty::is_zero_literal)
        {
            self.report(
                operator,
                "Division by zero",
                format!(
                    "Division by zero: right operand of '{}' is the literal {}",
                    operator.kind.symbol(),
                    rhs.literal.as_deref().unwrap_or("0")
                ),
            );
        }

        match ty::binary_result_type(operator.kind, lhs.ty, rhs.ty) {
            Ok(ty) => Value::of_type(ty),
            Err(details) => {
                self.report(operator, "Incompatible types", details);
                Value::unknown()
            }
        }
    }

    fn analyze_unary(&mut self) -> AnalysisResult<Value> {
        let Some(operator) = self.cursor.eat_any(&[TokenKind::Minus, TokenKind::Bang]) else {
            return self.analyze_primary();
        };

        // -2147483648 is only representable through the minus sign
        if operator.kind == TokenKind::Minus
            && matches!(
                self.cursor.peek().kind,
                TokenKind::IntegerLiteral | TokenKind::FloatLiteral
            )
        {
            let literal = self.cursor.next();
            self.check_literal(literal, true);

            return Ok(Value {
                ty: Type::of_literal(literal.kind).unwrap_or(Type::Unknown),
                literal: Some(format!("-{}", literal.lexeme)),
            });
        }

        let operand = self.analyze_unary()?;

        match ty::unary_result_type(operator.kind, operand.ty) {
            Ok(ty) => Ok(Value::of_type(ty)),
            Err(details) => {
                self.report(operator, "Incompatible types", details);
                Ok(Value::unknown())
            }
        }
    }

    fn analyze_primary(&mut self) -> AnalysisResult<Value> {
        let token = self.cursor.peek();

        match token.kind {
            TokenKind::FormattedString => {
                self.cursor.next();
                self.check_literal(token, false);
                self.check_interpolations(token);

                Ok(Value::of_type(Type::String))
            }
            kind if kind.is_literal() => {
                self.cursor.next();
                self.check_literal(token, false);

                Ok(Value {
                    ty: Type::of_literal(kind).unwrap_or(Type::Unknown),
                    literal: Some(token.lexeme.clone()),
                })
            }
            TokenKind::Identifier => {
                self.cursor.next();

                if self.cursor.next_is(TokenKind::OpenParen) {
                    return self.analyze_call(token);
                }

                Ok(self.lookup(token))
            }
            TokenKind::OpenParen => {
                self.cursor.next();
                let value = self.analyze_expression()?;
                self.cursor
                    .expect_next_to_be(TokenKind::CloseParen, "')'")?;

                Ok(value)
            }
            _ => Err(TokenCursor::unexpected(token, "an expression")),
        }
    }

    fn lookup(&mut self, name: &Token) -> Value {
        match self.scopes.get_binding(&name.lexeme) {
            Some(info) => Value::of_type(info.ty),
            None => {
                self.report_unresolved(name);
                Value::unknown()
            }
        }
    }

    /// Every `{name}` hole in a formatted string must name a visible variable
    fn check_interpolations(&mut self, token: &Token) {
        for hole in interpolation_holes(&token.lexeme) {
            let name = hole.trim();

            if !ty::is_valid_identifier(name) {
                self.report(
                    token,
                    "Invalid interpolation",
                    format!("'{{{hole}}}' does not name a variable"),
                );
                continue;
            }

            if self.scopes.get_binding(name).is_none() {
                let named = Token {
                    kind: TokenKind::Identifier,
                    lexeme: name.to_owned(),
                    line: token.line,
                    column: token.column,
                };
                self.report_unresolved(&named);
            }
        }
    }

    // suma(a, 2)
    fn analyze_call(&mut self, name: &Token) -> AnalysisResult<Value> {
        let arguments = self.analyze_arguments()?;

        let Some(signature) = self.functions.get(&name.lexeme) else {
            self.report(
                name,
                "Undeclared function",
                format!("Function '{}' is not declared", name.lexeme),
            );
            return Ok(Value::unknown());
        };

        let (expected, return_type) = (signature.parameters.len(), signature.return_type);

        if expected != arguments.len() {
            self.report(
                name,
                "Wrong argument count",
                format!(
                    "Function '{}' expects {expected} arguments but {} were given",
                    name.lexeme,
                    arguments.len()
                ),
            );
        }

        Ok(Value::of_type(return_type))
    }
}

/// Contents of the `{...}` holes of a formatted string lexeme
fn interpolation_holes(lexeme: &str) -> Vec<&str> {
    let mut holes = Vec::new();
    let mut rest = lexeme;

    while let Some(start) = rest.find('{') {
        let Some(length) = rest[start + 1..].find('}') else {
            break;
        };

        holes.push(&rest[start + 1..start + 1 + length]);
        rest = &rest[start + 1 + length + 1..];
    }

    holes
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{diagnostics::ErrorKind, frontend::lexer::Lexer};

    fn analyze(source: &str) -> (Analysis, Vec<CompilationError>) {
        let mut errors = ErrorManager::new();
        let tokens = Lexer::tokenize(source, &mut errors);
        let analysis = SemanticAnalyzer::analyze(&tokens, &mut errors);
        (analysis, errors.into_errors())
    }

    fn semantic_details(source: &str) -> Vec<String> {
        analyze(source)
            .1
            .into_iter()
            .filter(|e| e.kind == ErrorKind::Semantic)
            .map(|e| e.details)
            .collect()
    }

    fn symbol<'a>(analysis: &'a Analysis, name: &str) -> &'a SymbolSnapshot {
        analysis
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no symbol named {name}"))
    }

    #[test]
    fn declarations_infer_types() {
        let (analysis, errors) = analyze(indoc! {r#"
            edad = 17;
            altura = 1.75;
            nombre = "Ana";
            activo = true;
            inicial = 'A';
        "#});

        assert!(errors.is_empty(), "{errors:?}");
        assert!(analysis.completed);
        assert_eq!(symbol(&analysis, "edad").info.ty, Type::Int);
        assert_eq!(symbol(&analysis, "edad").info.value.as_deref(), Some("17"));
        assert_eq!(symbol(&analysis, "altura").info.ty, Type::Float);
        assert_eq!(symbol(&analysis, "nombre").info.ty, Type::String);
        assert_eq!(symbol(&analysis, "activo").info.ty, Type::Boolean);
        assert_eq!(symbol(&analysis, "inicial").info.ty, Type::Char);
        assert_eq!(symbol(&analysis, "inicial").info.declared_line, 5);
    }

    #[test]
    fn reassignment_with_same_type_is_accepted() {
        let (analysis, errors) = analyze("a = 5; a = 7;");

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(symbol(&analysis, "a").info.value.as_deref(), Some("7"));
    }

    #[test]
    fn reassignment_with_other_type_is_rejected() {
        let details = semantic_details("a = 5; a = \"hi\";");

        assert_eq!(details.len(), 1);
        assert!(details[0].contains("int") && details[0].contains("String"));
    }

    #[test]
    fn mixed_arithmetic_reports_exactly_one_error() {
        let details = semantic_details("x = 3; y = \"a\"; z = x - y;");

        assert_eq!(
            details,
            vec!["Incompatible types int and String for operator '-'".to_owned()]
        );
    }

    #[test]
    fn string_concatenation_accepts_mixed_types() {
        let (analysis, errors) = analyze("x = 3; y = \"a\"; z = x + y;");

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(symbol(&analysis, "z").info.ty, Type::String);
    }

    #[test]
    fn no_implicit_numeric_promotion() {
        let details = semantic_details("x = 1; y = 2.5; z = x * y;");

        assert_eq!(details.len(), 1);
        assert!(details[0].contains("int and float"), "{}", details[0]);
    }

    #[test]
    fn boolean_arithmetic_is_rejected() {
        let details = semantic_details("a = true; b = false; c = a + b;");

        assert_eq!(details.len(), 1);
        assert!(details[0].contains("Boolean operand"), "{}", details[0]);
    }

    #[test]
    fn constants_cannot_be_reassigned() {
        let (_, errors) = analyze(indoc! {"
            const LIMITE = 10;
            LIMITE = 11;
            LIMITE++;
        "});

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.message == "Constant reassignment"));
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn redeclaring_constant_in_same_scope_is_rejected() {
        let details = semantic_details("x = 1; const x = 2;");

        assert_eq!(details.len(), 1);
        assert!(details[0].contains("already declared"));
    }

    #[test]
    fn division_by_literal_zero_is_flagged() {
        let (_, errors) = analyze("a = 10; b = a / 0; c = a % 0; d = 1.5 / 0.0; e = a / 2;");

        let zero_divisions = errors
            .iter()
            .filter(|e| e.message == "Division by zero")
            .collect::<Vec<_>>();
        assert_eq!(zero_divisions.len(), 3);
        assert_eq!((zero_divisions[0].line, zero_divisions[0].column), (1, 15));
    }

    #[test]
    fn use_before_initialization() {
        let (_, errors) = analyze("print(x); x = 5;");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Uninitialized variable");
        assert_eq!((errors[0].line, errors[0].column), (1, 7));
    }

    #[test]
    fn undeclared_variable() {
        let (_, errors) = analyze("y = fantasma + 1;");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Undeclared variable");
    }

    #[test]
    fn block_variables_go_out_of_scope() {
        let (analysis, errors) = analyze(indoc! {"
            x = 1;
            if (x > 0) {
                y = 2;
                x = y;
            }
            print(y);
        "});

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Out of scope");
        assert_eq!(errors[0].line, 6);
        assert_eq!(symbol(&analysis, "y").scope, "if@2");
    }

    #[test]
    fn function_scope_and_parameters() {
        let (analysis, errors) = analyze(indoc! {"
            function suma(a, b) {
                total = a + b;
                return total;
            }
            r = suma(1, 2);
            print(total);
        "});

        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].message, "Out of scope");
        assert_eq!(symbol(&analysis, "a").scope, "suma");
        assert_eq!(symbol(&analysis, "total").scope, "suma");
        assert_eq!(analysis.functions.len(), 1);
        assert_eq!(analysis.functions[0].parameters, vec!["a", "b"]);
    }

    #[test]
    fn call_checks() {
        let (_, errors) = analyze(indoc! {"
            function doble(n) { return n * 2; }
            a = doble(1, 2);
            b = triple(3);
        "});

        assert_eq!(
            errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            vec!["Wrong argument count", "Undeclared function"]
        );
    }

    #[test]
    fn return_type_flows_to_call_sites() {
        let (analysis, errors) = analyze(indoc! {r#"
            function saludo() { return "hola"; }
            s = saludo();
            n = 1;
            m = n - saludo();
        "#});

        assert_eq!(symbol(&analysis, "s").info.ty, Type::String);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].details.contains("int and String"));
    }

    #[test]
    fn reserved_words_cannot_be_identifiers() {
        let (_, errors) = analyze("while = 3; int = 4; 2abc = 5;");

        assert_eq!(
            errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            vec!["Reserved word", "Reserved word", "Invalid identifier"]
        );
    }

    #[test]
    fn literal_ranges() {
        let (_, errors) = analyze("a = 2147483648; b = -2147483648; c = 2147483647;");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Literal out of range");
        assert_eq!(errors[0].column, 5);
    }

    #[test]
    fn conditions_must_be_boolean() {
        let (_, errors) = analyze("x = 1; while (x) { x = x - 1; }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].details.contains("while"));
    }

    #[test]
    fn break_outside_loop() {
        let (_, errors) = analyze("x = 1; break;");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Misplaced break");
    }

    #[test]
    fn switch_cases_match_subject_type() {
        let (_, errors) = analyze(indoc! {r#"
            opcion = 2;
            switch (opcion) {
                case 1: print("uno"); break;
                case "dos": print("dos"); break;
                case 1: print("otra vez");
                default: print("otro");
            }
        "#});

        assert_eq!(
            errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            vec!["Incompatible types", "Duplicate case"]
        );
    }

    #[test]
    fn for_loop_variable_is_local_to_the_loop() {
        let (analysis, errors) = analyze(indoc! {"
            suma = 0;
            for (i = 0; i < 3; i++) {
                suma += i;
            }
        "});

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(symbol(&analysis, "i").scope, "for@2");
        assert_eq!(symbol(&analysis, "suma").info.value, None);
    }

    #[test]
    fn formatted_string_holes_must_be_visible() {
        let (_, errors) = analyze(r#"nombre = "Ana"; s = f"hola {nombre}, {apellido}";"#);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].details.contains("apellido"));
    }

    #[test]
    fn unexpected_token_stops_analysis_with_syntactic_error() {
        let (analysis, errors) = analyze("x = 1;\nif x > 0 { }\ny = ;");

        assert!(!analysis.completed);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Syntactic);
        assert_eq!((errors[0].line, errors[0].column), (2, 4));
    }

    #[test]
    fn syntax_report_outlines_nested_statements() {
        let (analysis, _) = analyze(indoc! {"
            i = 0;
            while (i < 2) {
                print(i);
                i = i + 1;
            }
        "});

        assert_eq!(
            analysis.syntax_report(),
            indoc! {"
                Syntactic analysis completed: 4 statements
                line 1: assignment 'i'
                line 2: while
                  line 3: print
                  line 4: assignment 'i'"}
        );
    }

    #[test]
    fn symbol_table_report_lists_symbols() {
        let (analysis, _) = analyze("const PI = 3.14;");
        let report = analysis.symbol_table_report();

        assert!(report.starts_with("Name"));
        assert!(report.contains("PI"));
        assert!(report.contains("float"));
        assert!(report.contains("yes"));
    }

    #[test]
    fn interpolation_holes_are_extracted() {
        assert_eq!(
            interpolation_holes(r#"f"{a} y { b } {""#),
            vec!["a", " b "]
        );
    }
}

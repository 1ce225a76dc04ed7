//! Lowers the token stream straight into TAC with recursive descent. No
//! syntax tree is built: every parsing function emits the instructions for
//! what it just consumed and returns the operand that holds its value.

use crate::{
    diagnostics::CompilationError,
    frontend::{
        cursor::TokenCursor,
        lexer::{Keyword, Token, TokenKind},
    },
    index::Index,
    middle::tac::{
        BinaryOperator, Instruction, Label, LabelId, Literal, Operand, Place, Temporary,
        UnaryOperator,
    },
};

type GenerationResult<T = ()> = Result<T, CompilationError>;

#[derive(Debug)]
pub struct TacGenerator<'t> {
    cursor: TokenCursor<'t>,
    instructions: Vec<Instruction>,
    /// Last temporary handed out; numbering starts at `t1`
    temporaries: usize,
    /// Last label handed out; numbering starts at `L1`
    labels: usize,
    /// Exit labels of the enclosing loops and switches, innermost last
    break_targets: Vec<Label>,
}

impl<'t> TacGenerator<'t> {
    pub fn generate(tokens: &'t [Token]) -> GenerationResult<Vec<Instruction>> {
        let mut generator = Self {
            cursor: TokenCursor::new(tokens),
            instructions: Vec::new(),
            temporaries: 0,
            labels: 0,
            break_targets: Vec::new(),
        };

        while !generator.cursor.is_eof() {
            generator.lower_statement()?;
        }

        log::debug!(
            "generated {} instructions using {} temporaries and {} labels",
            generator.instructions.len(),
            generator.temporaries,
            generator.labels
        );

        Ok(generator.instructions)
    }

    fn emit(&mut self, instruction: Instruction) {
        log::trace!("emit {instruction}");
        self.instructions.push(instruction);
    }

    fn new_temporary(&mut self) -> Temporary {
        self.temporaries += 1;
        Temporary::new(self.temporaries)
    }

    fn new_label(&mut self) -> Label {
        self.labels += 1;
        Label::Local(LabelId::new(self.labels))
    }

    fn lower_statement(&mut self) -> GenerationResult {
        let token = self.cursor.peek();

        match token.kind {
            TokenKind::Keyword(_) if self.cursor.peek_nth(1).kind == TokenKind::Equals => {
                // already diagnosed as a reserved word
                let name = self.cursor.next();
                self.cursor.next();
                self.lower_assignment_to(name.lexeme.clone())?;
                self.cursor
                    .expect_next_to_be(TokenKind::Semicolon, "';'")?;
            }
            TokenKind::Keyword(Keyword::Function) => self.lower_function()?,
            TokenKind::Keyword(Keyword::Const) => {
                self.cursor.next();
                let name = self
                    .cursor
                    .expect_next_to_be(TokenKind::Identifier, "a constant name")?;
                self.cursor.expect_next_to_be(TokenKind::Equals, "'='")?;
                self.lower_assignment_to(name.lexeme.clone())?;
                self.cursor
                    .expect_next_to_be(TokenKind::Semicolon, "';'")?;
            }
            TokenKind::Keyword(Keyword::If) => self.lower_if()?,
            TokenKind::Keyword(Keyword::While) => self.lower_while()?,
            TokenKind::Keyword(Keyword::For) => self.lower_for()?,
            TokenKind::Keyword(Keyword::Switch) => self.lower_switch()?,
            TokenKind::Keyword(Keyword::Break) => {
                self.cursor.next();
                match self.break_targets.last().cloned() {
                    Some(target) => self.emit(Instruction::Goto(target)),
                    None => log::debug!("dropping 'break' outside of a loop or switch"),
                }
                self.cursor
                    .expect_next_to_be(TokenKind::Semicolon, "';'")?;
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.cursor.next();
                let value = if self.cursor.next_is(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.lower_expression()?)
                };
                self.emit(Instruction::Return(value));
                self.cursor
                    .expect_next_to_be(TokenKind::Semicolon, "';'")?;
            }
            TokenKind::Keyword(Keyword::Print | Keyword::Println) => {
                self.cursor.next();
                self.lower_call(token.lexeme.as_str())?;
                self.cursor
                    .expect_next_to_be(TokenKind::Semicolon, "';'")?;
            }
            TokenKind::IntegerLiteral
                if self.cursor.peek_nth(1).kind == TokenKind::Identifier
                    && self.cursor.peek_nth(2).kind == TokenKind::Equals =>
            {
                // already diagnosed as an invalid identifier
                let number = self.cursor.next();
                let rest = self.cursor.next();
                self.cursor.next();
                self.lower_assignment_to(format!("{}{}", number.lexeme, rest.lexeme))?;
                self.cursor
                    .expect_next_to_be(TokenKind::Semicolon, "';'")?;
            }
            TokenKind::Identifier => {
                self.lower_simple_statement()?;
                self.cursor
                    .expect_next_to_be(TokenKind::Semicolon, "';'")?;
            }
            TokenKind::Semicolon => {
                self.cursor.next();
            }
            _ => return Err(TokenCursor::unexpected(token, "a statement")),
        }

        Ok(())
    }

    fn lower_assignment_to(&mut self, name: String) -> GenerationResult {
        let source = self.lower_expression()?;
        self.emit(Instruction::Copy {
            destination: Place::Variable(name),
            source,
        });
        Ok(())
    }

    /// LABEL func_f, one `pop` per parameter (last parameter first), the
    /// body, and a trailing `ret` unless the body already ends with one
    fn lower_function(&mut self) -> GenerationResult {
        self.cursor.expect_keyword(Keyword::Function)?;
        let name = self
            .cursor
            .expect_next_to_be(TokenKind::Identifier, "a function name")?;

        let mut parameters = Vec::new();
        self.cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;
        if !self.cursor.next_is(TokenKind::CloseParen) {
            loop {
                let parameter = self
                    .cursor
                    .expect_next_to_be(TokenKind::Identifier, "a parameter name")?;
                parameters.push(parameter.lexeme.clone());

                if self.cursor.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;

        self.emit(Instruction::Label(Label::Function(name.lexeme.clone())));
        for parameter in parameters.into_iter().rev() {
            self.emit(Instruction::Pop(Place::Variable(parameter)));
        }

        let enclosing_breaks = std::mem::take(&mut self.break_targets);
        let body = self.lower_block();
        self.break_targets = enclosing_breaks;
        body?;

        if !matches!(self.instructions.last(), Some(Instruction::Return(_))) {
            self.emit(Instruction::Return(None));
        }

        Ok(())
    }

    fn lower_block(&mut self) -> GenerationResult {
        self.cursor
            .expect_next_to_be(TokenKind::OpenBrace, "'{'")?;

        while !self.cursor.next_is(TokenKind::CloseBrace) && !self.cursor.is_eof() {
            self.lower_statement()?;
        }

        self.cursor
            .expect_next_to_be(TokenKind::CloseBrace, "'}'")?;
        Ok(())
    }

    /// `( expr )`
    fn lower_condition(&mut self) -> GenerationResult<Operand> {
        self.cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;
        let condition = self.lower_expression()?;
        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;

        Ok(condition)
    }

    fn lower_if(&mut self) -> GenerationResult {
        self.cursor.expect_keyword(Keyword::If)?;

        let condition = self.lower_condition()?;
        let otherwise = self.new_label();
        let end = self.new_label();

        self.emit(Instruction::IfFalse {
            condition,
            target: otherwise.clone(),
        });
        self.lower_block()?;
        self.emit(Instruction::Goto(end.clone()));
        self.emit(Instruction::Label(otherwise));

        if self.cursor.eat(TokenKind::Keyword(Keyword::Else)).is_some() {
            if self.cursor.next_is_keyword(Keyword::If) {
                self.lower_if()?;
            } else {
                self.lower_block()?;
            }
        }

        self.emit(Instruction::Label(end));
        Ok(())
    }

    fn lower_while(&mut self) -> GenerationResult {
        self.cursor.expect_keyword(Keyword::While)?;

        let start = self.new_label();
        let end = self.new_label();

        self.emit(Instruction::Label(start.clone()));
        let condition = self.lower_condition()?;
        self.emit(Instruction::IfFalse {
            condition,
            target: end.clone(),
        });

        self.lower_loop_body(end.clone())?;

        self.emit(Instruction::Goto(start));
        self.emit(Instruction::Label(end));
        Ok(())
    }

    fn lower_loop_body(&mut self, exit: Label) -> GenerationResult {
        self.break_targets.push(exit);
        let body = self.lower_block();
        self.break_targets.pop();
        body
    }

    /// The increment clause comes before the body in the source but runs
    /// after it, so it is lowered into a detached buffer and spliced in
    /// once the body has been emitted
    fn lower_for(&mut self) -> GenerationResult {
        self.cursor.expect_keyword(Keyword::For)?;
        self.cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;

        if !self.cursor.next_is(TokenKind::Semicolon) {
            self.lower_simple_statement()?;
        }
        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;

        let start = self.new_label();
        let end = self.new_label();
        self.emit(Instruction::Label(start.clone()));

        if !self.cursor.next_is(TokenKind::Semicolon) {
            let condition = self.lower_expression()?;
            self.emit(Instruction::IfFalse {
                condition,
                target: end.clone(),
            });
        }
        self.cursor
            .expect_next_to_be(TokenKind::Semicolon, "';'")?;

        let enclosing = std::mem::take(&mut self.instructions);
        let increment = if self.cursor.next_is(TokenKind::CloseParen) {
            Ok(())
        } else {
            self.lower_simple_statement()
        };
        let increment_code = std::mem::replace(&mut self.instructions, enclosing);
        increment?;

        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;

        self.lower_loop_body(end.clone())?;

        self.instructions.extend(increment_code);
        self.emit(Instruction::Goto(start));
        self.emit(Instruction::Label(end));
        Ok(())
    }

    /// Each `case` compares the subject against its constant and skips its
    /// statements when they differ. `default` statements run unconditionally
    /// where they appear.
    fn lower_switch(&mut self) -> GenerationResult {
        self.cursor.expect_keyword(Keyword::Switch)?;

        let subject = self.lower_condition()?;
        self.cursor
            .expect_next_to_be(TokenKind::OpenBrace, "'{'")?;

        let end = self.new_label();
        self.break_targets.push(end.clone());
        let arms = self.lower_switch_arms(&subject);
        self.break_targets.pop();
        arms?;

        self.cursor
            .expect_next_to_be(TokenKind::CloseBrace, "'}'")?;
        self.emit(Instruction::Label(end));
        Ok(())
    }

    fn lower_switch_arms(&mut self, subject: &Operand) -> GenerationResult {
        loop {
            let token = self.cursor.peek();

            match token.kind {
                TokenKind::Keyword(Keyword::Case) => {
                    self.cursor.next();
                    let negated = self.cursor.eat(TokenKind::Minus).is_some();
                    let constant = self.cursor.next();

                    if !constant.kind.is_literal() {
                        return Err(TokenCursor::unexpected(constant, "a case constant"));
                    }

                    let constant = self.lower_literal(constant, negated)?;
                    let matches = self.new_temporary();
                    self.emit(Instruction::Binary {
                        operator: BinaryOperator::Equals,
                        destination: Place::Temporary(matches),
                        lhs: subject.clone(),
                        rhs: constant,
                    });

                    let next = self.new_label();
                    self.emit(Instruction::IfFalse {
                        condition: Operand::temporary(matches),
                        target: next.clone(),
                    });

                    self.cursor.expect_next_to_be(TokenKind::Colon, "':'")?;
                    self.lower_case_statements()?;
                    self.emit(Instruction::Label(next));
                }
                TokenKind::Keyword(Keyword::Default) => {
                    self.cursor.next();
                    self.cursor.expect_next_to_be(TokenKind::Colon, "':'")?;
                    self.lower_case_statements()?;
                }
                TokenKind::CloseBrace => return Ok(()),
                _ => return Err(TokenCursor::unexpected(token, "'case', 'default' or '}'")),
            }
        }
    }

    fn lower_case_statements(&mut self) -> GenerationResult {
        while !matches!(
            self.cursor.peek().kind,
            TokenKind::Keyword(Keyword::Case | Keyword::Default)
                | TokenKind::CloseBrace
                | TokenKind::Eof
        ) {
            self.lower_statement()?;
        }

        Ok(())
    }

    /// Assignment, compound assignment, increment or call, without the
    /// trailing semicolon
    fn lower_simple_statement(&mut self) -> GenerationResult {
        let name = self
            .cursor
            .expect_next_to_be(TokenKind::Identifier, "an identifier")?;
        let operator = self.cursor.peek();
        let target = Place::Variable(name.lexeme.clone());

        match operator.kind {
            TokenKind::Equals => {
                self.cursor.next();
                self.lower_assignment_to(name.lexeme.clone())?;
            }
            TokenKind::PlusEquals | TokenKind::MinusEquals => {
                self.cursor.next();
                let rhs = self.lower_expression()?;
                self.emit(Instruction::Binary {
                    operator: if operator.kind == TokenKind::PlusEquals {
                        BinaryOperator::Add
                    } else {
                        BinaryOperator::Subtract
                    },
                    destination: target.clone(),
                    lhs: Operand::Place(target),
                    rhs,
                });
            }
            TokenKind::Increment | TokenKind::Decrement => {
                self.cursor.next();
                self.emit(Instruction::Binary {
                    operator: if operator.kind == TokenKind::Increment {
                        BinaryOperator::Add
                    } else {
                        BinaryOperator::Subtract
                    },
                    destination: target.clone(),
                    lhs: Operand::Place(target),
                    rhs: Operand::Literal(Literal::Integer(1)),
                });
            }
            TokenKind::OpenParen => {
                self.lower_call(name.lexeme.as_str())?;
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

    /// Evaluates every argument first, then pushes them left to right and
    /// calls into a fresh temporary
    fn lower_call(&mut self, function: &str) -> GenerationResult<Operand> {
        let mut arguments = Vec::new();

        self.cursor
            .expect_next_to_be(TokenKind::OpenParen, "'('")?;
        if !self.cursor.next_is(TokenKind::CloseParen) {
            arguments.push(self.lower_expression()?);

            while self.cursor.eat(TokenKind::Comma).is_some() {
                arguments.push(self.lower_expression()?);
            }
        }
        self.cursor
            .expect_next_to_be(TokenKind::CloseParen, "')'")?;

        let argument_count = arguments.len();
        for argument in arguments {
            self.emit(Instruction::Param(argument));
        }

        let result = self.new_temporary();
        self.emit(Instruction::Call {
            function: function.to_owned(),
            argument_count,
            destination: Place::Temporary(result),
        });

        Ok(Operand::temporary(result))
    }

    fn lower_expression(&mut self) -> GenerationResult<Operand> {
        self.lower_logical_or()
    }

    /// Left-associative chain of `operators` between `operand`s, one
    /// temporary per operation
    fn lower_binary_level(
        &mut self,
        operators: &[TokenKind],
        operand: fn(&mut Self) -> GenerationResult<Operand>,
    ) -> GenerationResult<Operand> {
        let mut lhs = operand(self)?;

        while let Some(token) = self.cursor.eat_any(operators) {
            let rhs = operand(self)?;
            let Some(operator) = BinaryOperator::from_token(token.kind) else {
                return Err(TokenCursor::unexpected(token, "a binary operator"));
            };

            let destination = self.new_temporary();
            self.emit(Instruction::Binary {
                operator,
                destination: Place::Temporary(destination),
                lhs,
                rhs,
            });
            lhs = Operand::temporary(destination);
        }

        Ok(lhs)
    }

    fn lower_logical_or(&mut self) -> GenerationResult<Operand> {
        self.lower_binary_level(&[TokenKind::LogicalOr], Self::lower_logical_and)
    }

    fn lower_logical_and(&mut self) -> GenerationResult<Operand> {
        self.lower_binary_level(&[TokenKind::LogicalAnd], Self::lower_equality)
    }

    fn lower_equality(&mut self) -> GenerationResult<Operand> {
        self.lower_binary_level(
            &[TokenKind::DoubleEquals, TokenKind::NotEquals],
            Self::lower_relational,
        )
    }

    fn lower_relational(&mut self) -> GenerationResult<Operand> {
        self.lower_binary_level(
            &[
                TokenKind::LessThan,
                TokenKind::LessThanOrEqualTo,
                TokenKind::GreaterThan,
                TokenKind::GreaterThanOrEqualTo,
            ],
            Self::lower_additive,
        )
    }

    fn lower_additive(&mut self) -> GenerationResult<Operand> {
        self.lower_binary_level(
            &[TokenKind::Plus, TokenKind::Minus],
            Self::lower_multiplicative,
        )
    }

    fn lower_multiplicative(&mut self) -> GenerationResult<Operand> {
        self.lower_binary_level(
            &[TokenKind::Asterisk, TokenKind::Divide, TokenKind::Modulus],
            Self::lower_unary,
        )
    }

    fn lower_unary(&mut self) -> GenerationResult<Operand> {
        let Some(token) = self.cursor.eat_any(&[TokenKind::Minus, TokenKind::Bang]) else {
            return self.lower_primary();
        };

        if token.kind == TokenKind::Minus
            && matches!(
                self.cursor.peek().kind,
                TokenKind::IntegerLiteral | TokenKind::FloatLiteral
            )
        {
            let literal = self.cursor.next();
            return self.lower_literal(literal, true);
        }

        let operand = self.lower_unary()?;
        let destination = self.new_temporary();
        self.emit(Instruction::Unary {
            operator: if token.kind == TokenKind::Minus {
                UnaryOperator::Negate
            } else {
                UnaryOperator::Not
            },
            destination: Place::Temporary(destination),
            operand,
        });

        Ok(Operand::temporary(destination))
    }

    fn lower_primary(&mut self) -> GenerationResult<Operand> {
        let token = self.cursor.next();

        match token.kind {
            kind if kind.is_literal() => self.lower_literal(token, false),
            TokenKind::Identifier => {
                if self.cursor.next_is(TokenKind::OpenParen) {
                    return self.lower_call(token.lexeme.as_str());
                }

                Ok(Operand::variable(token.lexeme.as_str()))
            }
            TokenKind::OpenParen => {
                let value = self.lower_expression()?;
                self.cursor
                    .expect_next_to_be(TokenKind::CloseParen, "')'")?;
                Ok(value)
            }
            _ => Err(TokenCursor::unexpected(token, "an expression")),
        }
    }

    fn lower_literal(&self, token: &Token, negated: bool) -> GenerationResult<Operand> {
        let literal = match token.kind {
            TokenKind::IntegerLiteral => {
                let value = wrapping_integer(&token.lexeme);
                let value = if negated { value.wrapping_neg() } else { value };
                Literal::Integer(value as i64)
            }
            TokenKind::FloatLiteral => {
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    CompilationError::semantic(
                        token.line,
                        token.column,
                        "Literal out of range",
                        format!("Float literal {} cannot be represented", token.lexeme),
                    )
                })?;
                Literal::Float(if negated { -value } else { value })
            }
            TokenKind::BooleanLiteral if !negated => Literal::Boolean(token.lexeme == "true"),
            TokenKind::CharLiteral if !negated => Literal::Char(token.lexeme.clone()),
            TokenKind::StringLiteral if !negated => Literal::String(token.lexeme.clone()),
            TokenKind::FormattedString if !negated => {
                Literal::FormattedString(token.lexeme.clone())
            }
            _ => return Err(TokenCursor::unexpected(token, "a literal")),
        };

        Ok(Operand::Literal(literal))
    }
}

/// Reads a run of decimal digits in the 32-bit wrapping domain the folder
/// computes in. Out of range literals are reported by the analyzer, so here
/// they only need some value.
fn wrapping_integer(digits: &str) -> i32 {
    digits
        .bytes()
        .filter(u8::is_ascii_digit)
        .fold(0i32, |value, digit| {
            value.wrapping_mul(10).wrapping_add((digit - b'0') as i32)
        })
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{
        diagnostics::{ErrorKind, ErrorManager},
        frontend::lexer::Lexer,
        middle::tac::render_tac,
    };

    fn generate(source: &str) -> String {
        let tokens = Lexer::tokenize(source, &mut ErrorManager::new());
        let instructions = TacGenerator::generate(&tokens).unwrap();
        render_tac(&instructions)
    }

    #[test]
    fn expressions_follow_precedence() {
        assert_eq!(
            generate("x = a + b * c;"),
            indoc! {"
                t1 = b * c
                t2 = a + t1
                x = t2"}
        );
        assert_eq!(
            generate("ok = a < 1 || b && !c;"),
            indoc! {"
                t1 = a < 1
                t2 = NOT c
                t3 = b AND t2
                t4 = t1 OR t3
                ok = t4"}
        );
    }

    #[test]
    fn negative_literals_are_folded_but_other_negations_are_not() {
        assert_eq!(
            generate("x = -5; y = -x; z = -(2.5);"),
            indoc! {"
                x = -5
                t1 = MINUS x
                y = t1
                t2 = MINUS 2.5
                z = t2"}
        );
    }

    #[test]
    fn if_else() {
        assert_eq!(
            generate(indoc! {r#"
                if (x > 1) {
                    println("big");
                } else {
                    println("small");
                }
            "#}),
            indoc! {r#"
                t1 = x > 1
                IF_FALSE t1 GOTO L1
                param "big"
                t2 = call println, 1
                GOTO L2
                LABEL L1
                param "small"
                t3 = call println, 1
                LABEL L2"#}
        );
    }

    #[test]
    fn while_loop() {
        assert_eq!(
            generate("i = 0; while (i < 2) { print(i); i = i + 1; }"),
            indoc! {"
                i = 0
                LABEL L1
                t1 = i < 2
                IF_FALSE t1 GOTO L2
                param i
                t2 = call print, 1
                t3 = i + 1
                i = t3
                GOTO L1
                LABEL L2"}
        );
    }

    #[test]
    fn for_increment_runs_after_body() {
        assert_eq!(
            generate("for (i = 0; i < 3; i += 1) { s = s + i; }"),
            indoc! {"
                i = 0
                LABEL L1
                t1 = i < 3
                IF_FALSE t1 GOTO L2
                t2 = s + i
                s = t2
                i = i + 1
                GOTO L1
                LABEL L2"}
        );
    }

    #[test]
    fn for_increment_temporaries_are_numbered_before_the_body() {
        assert_eq!(
            generate("for (i = 0; i < 3; i = i + 1) { s = s + i; }"),
            indoc! {"
                i = 0
                LABEL L1
                t1 = i < 3
                IF_FALSE t1 GOTO L2
                t3 = s + i
                s = t3
                t2 = i + 1
                i = t2
                GOTO L1
                LABEL L2"}
        );
    }

    #[test]
    fn else_if_chains_nest() {
        assert_eq!(
            generate(indoc! {"
                if (x > 1) {
                    a = 1;
                } else if (x > 0) {
                    a = 2;
                } else {
                    a = 3;
                }
            "}),
            indoc! {"
                t1 = x > 1
                IF_FALSE t1 GOTO L1
                a = 1
                GOTO L2
                LABEL L1
                t2 = x > 0
                IF_FALSE t2 GOTO L3
                a = 2
                GOTO L4
                LABEL L3
                a = 3
                LABEL L4
                LABEL L2"}
        );
    }

    #[test]
    fn oversized_integer_literals_wrap() {
        assert_eq!(
            generate("x = 4294967301; y = -2147483648;"),
            indoc! {"
                x = 5
                y = -2147483648"}
        );
    }

    #[test]
    fn break_jumps_to_innermost_exit() {
        assert_eq!(
            generate("while (true) { break; }"),
            indoc! {"
                LABEL L1
                IF_FALSE true GOTO L2
                GOTO L2
                GOTO L1
                LABEL L2"}
        );
    }

    #[test]
    fn switch_compares_each_case() {
        assert_eq!(
            generate(indoc! {r#"
                switch (op) {
                    case 1: print("uno"); break;
                    case -2: print("menos dos");
                    default: print("otro");
                }
            "#}),
            indoc! {r#"
                t1 = op == 1
                IF_FALSE t1 GOTO L2
                param "uno"
                t2 = call print, 1
                GOTO L1
                LABEL L2
                t3 = op == -2
                IF_FALSE t3 GOTO L3
                param "menos dos"
                t4 = call print, 1
                LABEL L3
                param "otro"
                t5 = call print, 1
                LABEL L1"#}
        );
    }

    #[test]
    fn functions_pop_parameters_in_reverse() {
        assert_eq!(
            generate(indoc! {"
                function suma(a, b) {
                    return a + b;
                }
                function vacia() { }
                r = suma(1, x * 2);
            "}),
            indoc! {"
                LABEL func_suma
                pop b
                pop a
                t1 = a + b
                ret t1
                LABEL func_vacia
                ret
                t2 = x * 2
                param 1
                param t2
                t3 = call suma, 2
                r = t3"}
        );
    }

    #[test]
    fn empty_argument_list() {
        assert_eq!(generate("println();"), "t1 = call println, 0");
    }

    #[test]
    fn compound_assignment_and_increments() {
        assert_eq!(
            generate("c += 2; c--; const K = 'a';"),
            indoc! {"
                c = c + 2
                c = c - 1
                K = 'a'"}
        );
    }

    #[test]
    fn unexpected_token_is_a_syntactic_error() {
        let tokens = Lexer::tokenize("x = (1 + ;", &mut ErrorManager::new());
        let error = TacGenerator::generate(&tokens).unwrap_err();

        assert_eq!(error.kind, ErrorKind::Syntactic);
        assert_eq!((error.line, error.column), (1, 10));
    }
}

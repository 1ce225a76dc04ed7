use hashbrown::{HashMap, HashSet};

use crate::middle::tac::{
    BinaryOperator, Instruction, Literal, Opcode, Operand, Place, Temporary, UnaryOperator,
};

/// Upper bound on optimization rounds when none is configured
pub const DEFAULT_MAX_PASSES: usize = 10;

// Runs common subexpression elimination, constant folding/propagation and
// dead code elimination in that order, and repeats the whole round while any
// of them changed something, up to `max_passes` rounds.
pub fn optimize(mut instructions: Vec<Instruction>, max_passes: usize) -> Vec<Instruction> {
    for pass in 1..=max_passes {
        let before = instructions.len();

        let mut changed = eliminate_common_subexpressions(&mut instructions);
        changed |= fold_constants(&mut instructions);
        changed |= eliminate_dead_code(&mut instructions);

        log::debug!(
            "optimization pass {pass}: {before} -> {} instructions{}",
            instructions.len(),
            if changed { "" } else { ", fixpoint reached" }
        );

        if !changed {
            break;
        }
    }

    instructions
}

/// Normalized right-hand side of a unary or binary instruction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExpressionKey {
    opcode: Opcode,
    operands: Vec<String>,
}

impl ExpressionKey {
    fn of(instruction: &Instruction) -> Option<Self> {
        match instruction {
            Instruction::Unary {
                operator, operand, ..
            } => Some(Self {
                opcode: operator.opcode(),
                operands: vec![operand.signature()],
            }),
            Instruction::Binary {
                operator, lhs, rhs, ..
            } => {
                let mut operands = vec![lhs.signature(), rhs.signature()];

                // "a" + "b" is not "b" + "a"
                let is_text = |operand: &Operand| operand.as_literal().is_some_and(Literal::is_text);
                if operator.is_commutative() && !is_text(lhs) && !is_text(rhs) {
                    operands.sort();
                }

                Some(Self {
                    opcode: operator.opcode(),
                    operands,
                })
            }
            _ => None,
        }
    }

    fn mentions(&self, place: &Place) -> bool {
        let signature = Operand::Place(place.clone()).signature();
        self.operands.contains(&signature)
    }
}

/// Local common subexpression elimination. Within a basic block, an
/// expression that was already computed into a place that still holds it is
/// replaced by a copy of that place.
fn eliminate_common_subexpressions(instructions: &mut [Instruction]) -> bool {
    let mut available: HashMap<ExpressionKey, Place> = HashMap::new();
    let mut changed = false;

    for instruction in instructions.iter_mut() {
        if matches!(instruction, Instruction::Label(_)) {
            available.clear();
        }

        let key = ExpressionKey::of(instruction);

        let reuse = match (&key, instruction.destination()) {
            (Some(key), Some(destination)) => available
                .get(key)
                .filter(|holder| *holder != destination)
                .map(|holder| Instruction::Copy {
                    destination: destination.clone(),
                    source: Operand::Place(holder.clone()),
                }),
            _ => None,
        };

        if let Some(copy) = reuse {
            log::trace!("cse: {instruction} -> {copy}");
            *instruction = copy;
            changed = true;
        }

        if let Some(destination) = instruction.destination().cloned() {
            available.retain(|key, holder| !key.mentions(&destination) && *holder != destination);

            let computes = matches!(
                instruction,
                Instruction::Unary { .. } | Instruction::Binary { .. }
            );

            if let Some(key) = key.filter(|key| computes && !key.mentions(&destination)) {
                available.insert(key, destination);
            }
        }

        if instruction.ends_block() || matches!(instruction, Instruction::Call { .. }) {
            available.clear();
        }
    }

    changed
}

/// Every place that is written by exactly one instruction
fn single_definitions(instructions: &[Instruction]) -> HashSet<Place> {
    let mut definitions: HashMap<&Place, usize> = HashMap::new();

    for destination in instructions.iter().filter_map(Instruction::destination) {
        *definitions.entry(destination).or_default() += 1;
    }

    definitions
        .into_iter()
        .filter(|(_, count)| *count == 1)
        .map(|(place, _)| place.clone())
        .collect()
}

/// Constant propagation and folding, tracked linearly through the stream.
///
/// A place becomes constant when it is assigned a number or boolean literal
/// and stops being constant the next time anything else writes it. Control
/// can reach a label from several places and a call can run arbitrary code,
/// so at those points only places with a single definition in the whole
/// stream keep their constant. That is what stops loop-carried variables
/// from being folded into their loop tests.
fn fold_constants(instructions: &mut [Instruction]) -> bool {
    let stable = single_definitions(instructions);
    let mut constants: HashMap<Place, Literal> = HashMap::new();
    let mut changed = false;

    for instruction in instructions.iter_mut() {
        if matches!(instruction, Instruction::Label(_)) {
            constants.retain(|place, _| stable.contains(place));
        }

        // names passed to calls or returned are kept for readability
        let temporaries_only = matches!(
            instruction,
            Instruction::Param(_) | Instruction::Return(_)
        );

        for operand in instruction.operands_mut() {
            let Operand::Place(place) = operand else {
                continue;
            };

            if temporaries_only && !place.is_temporary() {
                continue;
            }

            if let Some(literal) = constants.get(&*place) {
                *operand = Operand::Literal(literal.clone());
                changed = true;
            }
        }

        let folded = evaluate(instruction).zip(instruction.destination().cloned());

        if let Some((value, destination)) = folded {
            log::trace!("fold: {instruction} -> {destination} = {value}");

            *instruction = Instruction::Copy {
                destination,
                source: Operand::Literal(value),
            };
            changed = true;
        }

        match &*instruction {
            Instruction::Copy {
                destination,
                source: Operand::Literal(literal),
            } if matches!(
                literal,
                Literal::Integer(_) | Literal::Float(_) | Literal::Boolean(_)
            ) =>
            {
                constants.insert(destination.clone(), literal.clone());
            }
            other => {
                if let Some(destination) = other.destination() {
                    constants.remove(destination);
                }
            }
        }

        if matches!(instruction, Instruction::Call { .. }) {
            constants.retain(|place, _| stable.contains(place));
        }
    }

    changed
}

/// Computes the value of an instruction whose operands are all literals.
/// Integers use 32-bit wrapping arithmetic. Division by zero and results
/// that are not finite are left alone.
fn evaluate(instruction: &Instruction) -> Option<Literal> {
    match instruction {
        Instruction::Unary {
            operator,
            operand: Operand::Literal(literal),
            ..
        } => evaluate_unary(*operator, literal),
        Instruction::Binary {
            operator,
            lhs: Operand::Literal(lhs),
            rhs: Operand::Literal(rhs),
            ..
        } => evaluate_binary(*operator, lhs, rhs),
        _ => None,
    }
}

fn evaluate_unary(operator: UnaryOperator, literal: &Literal) -> Option<Literal> {
    match (operator, literal) {
        (UnaryOperator::Negate, Literal::Integer(value)) => {
            Some(Literal::Integer((*value as i32).wrapping_neg() as i64))
        }
        (UnaryOperator::Negate, Literal::Float(value)) => Some(Literal::Float(-value)),
        (UnaryOperator::Not, Literal::Boolean(value)) => Some(Literal::Boolean(!value)),
        _ => None,
    }
}

fn evaluate_binary(operator: BinaryOperator, lhs: &Literal, rhs: &Literal) -> Option<Literal> {
    use BinaryOperator::*;

    match (lhs, rhs) {
        (Literal::Integer(lhs), Literal::Integer(rhs)) => {
            let (lhs, rhs) = (*lhs as i32, *rhs as i32);

            let value = match operator {
                Add => lhs.wrapping_add(rhs),
                Subtract => lhs.wrapping_sub(rhs),
                Multiply => lhs.wrapping_mul(rhs),
                Divide if rhs != 0 => lhs.wrapping_div(rhs),
                Modulus if rhs != 0 => lhs.wrapping_rem(rhs),
                _ => return compare(operator, &lhs, &rhs).map(Literal::Boolean),
            };

            Some(Literal::Integer(value as i64))
        }
        (Literal::Float(lhs), Literal::Float(rhs)) => {
            let value = match operator {
                Add => lhs + rhs,
                Subtract => lhs - rhs,
                Multiply => lhs * rhs,
                Divide if *rhs != 0.0 => lhs / rhs,
                Modulus if *rhs != 0.0 => lhs % rhs,
                _ => return compare(operator, lhs, rhs).map(Literal::Boolean),
            };

            value.is_finite().then_some(Literal::Float(value))
        }
        (Literal::Boolean(lhs), Literal::Boolean(rhs)) => match operator {
            And => Some(Literal::Boolean(*lhs && *rhs)),
            Or => Some(Literal::Boolean(*lhs || *rhs)),
            Equals => Some(Literal::Boolean(lhs == rhs)),
            NotEquals => Some(Literal::Boolean(lhs != rhs)),
            _ => None,
        },
        _ => None,
    }
}

fn compare<T: PartialOrd>(operator: BinaryOperator, lhs: &T, rhs: &T) -> Option<bool> {
    use BinaryOperator::*;

    Some(match operator {
        Equals => lhs == rhs,
        NotEquals => lhs != rhs,
        LessThan => lhs < rhs,
        LessThanOrEqualTo => lhs <= rhs,
        GreaterThan => lhs > rhs,
        GreaterThanOrEqualTo => lhs >= rhs,
        _ => return None,
    })
}

/// Removes copies and computations into temporaries that are never read.
/// Calls, parameters, returns and jumps are always kept.
fn eliminate_dead_code(instructions: &mut Vec<Instruction>) -> bool {
    let used: HashSet<Temporary> = instructions
        .iter()
        .flat_map(Instruction::operands)
        .filter_map(|operand| match operand {
            Operand::Place(Place::Temporary(temporary)) => Some(*temporary),
            _ => None,
        })
        .collect();

    let before = instructions.len();

    instructions.retain(|instruction| match instruction {
        Instruction::Copy {
            destination: Place::Temporary(temporary),
            ..
        }
        | Instruction::Unary {
            destination: Place::Temporary(temporary),
            ..
        }
        | Instruction::Binary {
            destination: Place::Temporary(temporary),
            ..
        } => used.contains(temporary),
        _ => true,
    });

    before != instructions.len()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{
        diagnostics::ErrorManager,
        frontend::lexer::Lexer,
        index::Index,
        middle::tac::{generator::TacGenerator, render_tac},
    };

    fn lower(source: &str) -> Vec<Instruction> {
        let tokens = Lexer::tokenize(source, &mut ErrorManager::new());
        TacGenerator::generate(&tokens).unwrap()
    }

    fn optimized(source: &str) -> String {
        render_tac(&optimize(lower(source), DEFAULT_MAX_PASSES))
    }

    fn t(n: usize) -> Place {
        Place::Temporary(Temporary::new(n))
    }

    fn var(name: &str) -> Place {
        Place::Variable(name.to_owned())
    }

    #[test]
    fn loop_test_survives() {
        let output = optimize(
            lower("i = 0; while (i < 2) { print(i); i = i + 1; }"),
            DEFAULT_MAX_PASSES,
        );

        assert!(
            output.iter().any(|i| i.opcode() == Opcode::LessThan),
            "{}",
            render_tac(&output)
        );
    }

    #[test]
    fn for_loop_test_survives() {
        let output = optimized("for (i = 0; i < 3; i++) { print(i); }");

        assert!(output.contains("t1 = i < 3"), "{output}");
        assert!(output.contains("i = i + 1"), "{output}");
    }

    #[test]
    fn constants_do_not_survive_a_call() {
        let output = optimized("function f() { g = 2; } g = 1; f(); z = g + 1;");

        assert!(output.contains("= g + 1"), "{output}");
        assert!(!output.contains("z = 2"), "{output}");
    }

    #[test]
    fn expressions_are_recomputed_after_a_call() {
        let output = optimized("x = a + b; f(); y = a + b;");

        assert_eq!(
            output.lines().filter(|line| line.ends_with("= a + b")).count(),
            2,
            "{output}"
        );
    }

    #[test]
    fn params_keep_variable_names() {
        let instructions = vec![
            Instruction::Copy {
                destination: var("edad"),
                source: Operand::Literal(Literal::Integer(17)),
            },
            Instruction::Param(Operand::variable("edad")),
            Instruction::Call {
                function: "print".to_owned(),
                argument_count: 1,
                destination: t(2),
            },
        ];

        let output = optimize(instructions.clone(), DEFAULT_MAX_PASSES);

        assert_eq!(output, instructions);
    }

    #[test]
    fn params_of_temporaries_become_literals() {
        let instructions = vec![
            Instruction::Copy {
                destination: t(1),
                source: Operand::Literal(Literal::Integer(5)),
            },
            Instruction::Param(Operand::Place(t(1))),
        ];

        assert_eq!(
            render_tac(&optimize(instructions, DEFAULT_MAX_PASSES)),
            "param 5"
        );
    }

    #[test]
    fn straight_line_arithmetic_is_folded() {
        assert_eq!(
            optimized("a = 2; b = a * 3 + 1; println(b);"),
            indoc! {"
                a = 2
                b = 7
                param b
                t3 = call println, 1"}
        );
    }

    #[test]
    fn folding_wraps_like_32_bit_integers() {
        assert_eq!(optimized("x = 2147483647 + 1;"), "x = -2147483648");
        assert_eq!(optimized("x = 7 / 2; y = -7 % 2;"), "x = 3\ny = -1");
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        assert_eq!(optimized("x = 1 / 0;"), "t1 = 1 / 0\nx = t1");
        assert_eq!(optimized("y = 1.0 / 0.0;"), "t1 = 1.0 / 0.0\ny = t1");
    }

    #[test]
    fn mixed_numeric_types_are_not_folded() {
        assert_eq!(optimized("x = 1 + 2.0;"), "t1 = 1 + 2.0\nx = t1");
    }

    #[test]
    fn minus_and_not_of_literals_fold() {
        assert_eq!(optimized("x = -(3); y = !true;"), "x = -3\ny = false");
    }

    #[test]
    fn common_subexpressions_are_reused_within_a_block() {
        assert_eq!(
            optimized("x = a + b; y = b + a; z = a - b; w = b - a;"),
            indoc! {"
                t1 = a + b
                x = t1
                t2 = t1
                y = t2
                t3 = a - b
                z = t3
                t4 = b - a
                w = t4"}
        );
    }

    #[test]
    fn writes_invalidate_cached_expressions() {
        assert_eq!(
            optimized("x = a * b; a = c; y = a * b;"),
            indoc! {"
                t1 = a * b
                x = t1
                a = c
                t2 = a * b
                y = t2"}
        );
    }

    #[test]
    fn cse_does_not_cross_labels() {
        let output = optimized("x = a + b; while (c) { y = a + b; c = false; }");

        assert_eq!(output.matches("a + b").count(), 2, "{output}");
    }

    #[test]
    fn self_referencing_updates_are_not_cached() {
        assert_eq!(
            optimized("s = s + 1; s = s + 1;"),
            "s = s + 1\ns = s + 1"
        );
    }

    #[test]
    fn string_concatenation_is_not_reordered() {
        let output = optimized(r#"x = "a" + s; y = s + "a";"#);

        assert_eq!(output.matches('+').count(), 2, "{output}");
    }

    #[test]
    fn dead_temporaries_are_removed() {
        let instructions = vec![
            Instruction::Binary {
                operator: BinaryOperator::Add,
                destination: t(1),
                lhs: Operand::variable("a"),
                rhs: Operand::variable("b"),
            },
            Instruction::Binary {
                operator: BinaryOperator::Multiply,
                destination: t(2),
                lhs: Operand::variable("a"),
                rhs: Operand::variable("b"),
            },
            Instruction::Copy {
                destination: var("x"),
                source: Operand::Place(t(2)),
            },
            Instruction::Call {
                function: "f".to_owned(),
                argument_count: 0,
                destination: t(3),
            },
        ];

        let mut output = instructions.clone();
        assert!(eliminate_dead_code(&mut output));
        assert_eq!(output, instructions[1..].to_vec());
        assert!(!eliminate_dead_code(&mut output));
    }

    #[test]
    fn optimizing_twice_changes_nothing() {
        let source = indoc! {"
            function doble(n) { return n * 2; }
            a = 4;
            b = a + 1;
            c = b * b;
            if (c > 10) { println(c); } else { println(doble(a)); }
            i = 0;
            while (i < 3) { i = i + 1; }
        "};

        let once = optimize(lower(source), DEFAULT_MAX_PASSES);
        let twice = optimize(once.clone(), DEFAULT_MAX_PASSES);

        assert_eq!(once, twice);

        let mut folded = once.clone();
        assert!(!fold_constants(&mut folded));
        assert_eq!(folded, once);
    }

    #[test]
    fn zero_passes_leaves_input_untouched() {
        let input = lower("x = 1 + 2;");

        assert_eq!(optimize(input.clone(), 0), input);
    }
}

use colored::Colorize;
use itertools::Itertools;

use crate::middle::tac::{Instruction, Label, Operand, Place};

/// Numbered, colored listing of a TAC sequence. Labels are flush left and
/// everything else is indented under them.
pub fn pretty_print_tac(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .enumerate()
        .map(|(i, instruction)| {
            let number = format!("{i:>4}").bright_black();

            match instruction {
                Instruction::Label(_) => format!("{number} {}", Colored(instruction)),
                _ => format!("{number}     {}", Colored(instruction)),
            }
        })
        .join("\n")
}

/// Display adapter that highlights an instruction for the terminal
pub struct Colored<'a>(pub &'a Instruction);

fn place(place: &Place) -> String {
    match place {
        Place::Variable(name) => name.white().to_string(),
        Place::Temporary(temporary) => temporary.to_string().yellow().to_string(),
    }
}

fn operand(operand: &Operand) -> String {
    match operand {
        Operand::Place(p) => place(p),
        Operand::Literal(literal) => literal.to_string().purple().to_string(),
    }
}

fn label(label: &Label) -> String {
    match label {
        Label::Local(_) => label.to_string().blue().to_string(),
        Label::Function(_) => label.to_string().bright_red().to_string(),
    }
}

impl core::fmt::Display for Colored<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Instruction::Copy {
                destination,
                source,
            } => write!(f, "{} {} {}", place(destination), "=".white(), operand(source)),
            Instruction::Unary {
                operator,
                destination,
                operand: value,
            } => write!(
                f,
                "{} {} {} {}",
                place(destination),
                "=".white(),
                operator.opcode().to_string().cyan(),
                operand(value)
            ),
            Instruction::Binary {
                operator,
                destination,
                lhs,
                rhs,
            } => write!(
                f,
                "{} {} {} {} {}",
                place(destination),
                "=".white(),
                operand(lhs),
                operator.opcode().to_string().white(),
                operand(rhs)
            ),
            Instruction::Label(target) => write!(f, "{} {}", "LABEL".magenta(), label(target)),
            Instruction::Goto(target) => write!(f, "{} {}", "GOTO".cyan(), label(target)),
            Instruction::IfFalse { condition, target } => write!(
                f,
                "{} {} {} {}",
                "IF_FALSE".cyan(),
                operand(condition),
                "GOTO".cyan(),
                label(target)
            ),
            Instruction::Param(value) => write!(f, "{} {}", "param".green(), operand(value)),
            Instruction::Call {
                function,
                argument_count,
                destination,
            } => write!(
                f,
                "{} {} {} {}, {}",
                place(destination),
                "=".white(),
                "call".green(),
                function.blue(),
                argument_count.to_string().purple()
            ),
            Instruction::Return(Some(value)) => write!(f, "{} {}", "ret".cyan(), operand(value)),
            Instruction::Return(None) => write!(f, "{}", "ret".cyan()),
            Instruction::Pop(target) => write!(f, "{} {}", "pop".green(), place(target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        index::Index,
        middle::tac::{BinaryOperator, LabelId, Literal, Temporary, render_tac},
    };

    #[test]
    fn stripped_listing_matches_plain_text() {
        let instructions = vec![
            Instruction::Label(Label::Local(LabelId::new(1))),
            Instruction::Binary {
                operator: BinaryOperator::LessThan,
                destination: Place::Temporary(Temporary::new(1)),
                lhs: Operand::variable("i"),
                rhs: Operand::Literal(Literal::Integer(2)),
            },
            Instruction::Call {
                function: "print".to_owned(),
                argument_count: 1,
                destination: Place::Temporary(Temporary::new(2)),
            },
        ];

        let listing = strip_ansi_escapes::strip_str(pretty_print_tac(&instructions));
        let without_numbers = listing
            .lines()
            .map(|line| line[5..].trim_start())
            .join("\n");

        assert_eq!(without_numbers, render_tac(&instructions));
        assert!(listing.starts_with("   0 LABEL L1"));
    }
}

//! TAC (three-address code). Control flow is flattened into labels and
//! jumps and every expression is broken into instructions with at most two
//! source operands and one destination.

use itertools::Itertools;
use strum::Display;

use crate::{frontend::lexer::TokenKind, index::simple_index};

pub mod generator;
pub mod pretty_print;

simple_index! {
    /// A compiler-introduced intermediate value, printed `t<n>`
    pub struct Temporary;
}

simple_index! {
    /// A jump target introduced for control flow, printed `L<n>`
    pub struct LabelId;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Local(LabelId),
    /// Entry point of a user function, printed `func_<name>`
    Function(String),
}

/// Something an instruction can write to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Place {
    Variable(String),
    Temporary(Temporary),
}

impl Place {
    pub fn is_temporary(&self) -> bool {
        matches!(self, Place::Temporary(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Lexeme including the quotes, e.g. `'a'`
    Char(String),
    /// Lexeme including the quotes
    String(String),
    /// Lexeme including the `f` prefix and the quotes
    FormattedString(String),
}

impl Literal {
    pub fn is_number(&self) -> bool {
        matches!(self, Literal::Integer(_) | Literal::Float(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Literal::Char(_) | Literal::String(_) | Literal::FormattedString(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Place(Place),
    Literal(Literal),
}

impl Operand {
    pub fn variable(name: impl Into<String>) -> Self {
        Operand::Place(Place::Variable(name.into()))
    }

    pub fn temporary(temporary: Temporary) -> Self {
        Operand::Place(Place::Temporary(temporary))
    }

    pub fn as_place(&self) -> Option<&Place> {
        match self {
            Operand::Place(place) => Some(place),
            Operand::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Operand::Literal(literal) => Some(literal),
            Operand::Place(_) => None,
        }
    }

    /// Text that identifies the operand together with its kind, so that the
    /// variable `t1`, the temporary `t1` and the literals `1` and `1.0` never
    /// compare equal
    pub fn signature(&self) -> String {
        match self {
            Operand::Place(Place::Variable(name)) => format!("var:{name}"),
            Operand::Place(Place::Temporary(temporary)) => format!("tmp:{temporary}"),
            Operand::Literal(Literal::Integer(value)) => format!("int:{value}"),
            Operand::Literal(Literal::Float(value)) => format!("float:{value:?}"),
            Operand::Literal(literal) => format!("lit:{literal}"),
        }
    }
}

impl From<Place> for Operand {
    fn from(place: Place) -> Self {
        Operand::Place(place)
    }
}

impl From<Literal> for Operand {
    fn from(literal: Literal) -> Self {
        Operand::Literal(literal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    And,
    Or,
}

impl BinaryOperator {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Plus => Self::Add,
            TokenKind::Minus => Self::Subtract,
            TokenKind::Asterisk => Self::Multiply,
            TokenKind::Divide => Self::Divide,
            TokenKind::Modulus => Self::Modulus,
            TokenKind::DoubleEquals => Self::Equals,
            TokenKind::NotEquals => Self::NotEquals,
            TokenKind::LessThan => Self::LessThan,
            TokenKind::LessThanOrEqualTo => Self::LessThanOrEqualTo,
            TokenKind::GreaterThan => Self::GreaterThan,
            TokenKind::GreaterThanOrEqualTo => Self::GreaterThanOrEqualTo,
            TokenKind::LogicalAnd => Self::And,
            TokenKind::LogicalOr => Self::Or,
            _ => return None,
        })
    }

    /// Operand order does not matter for these
    pub fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Multiply)
    }

    pub fn opcode(self) -> Opcode {
        match self {
            Self::Add => Opcode::Add,
            Self::Subtract => Opcode::Subtract,
            Self::Multiply => Opcode::Multiply,
            Self::Divide => Opcode::Divide,
            Self::Modulus => Opcode::Modulus,
            Self::Equals => Opcode::Equals,
            Self::NotEquals => Opcode::NotEquals,
            Self::LessThan => Opcode::LessThan,
            Self::LessThanOrEqualTo => Opcode::LessThanOrEqualTo,
            Self::GreaterThan => Opcode::GreaterThan,
            Self::GreaterThanOrEqualTo => Opcode::GreaterThanOrEqualTo,
            Self::And => Opcode::And,
            Self::Or => Opcode::Or,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Not,
}

impl UnaryOperator {
    pub fn opcode(self) -> Opcode {
        match self {
            Self::Negate => Opcode::Minus,
            Self::Not => Opcode::Not,
        }
    }
}

/// Tag of an instruction, as it appears in the `op` column of a quadruple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Opcode {
    #[strum(serialize = "=")]
    Copy,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulus,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqualTo,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqualTo,
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "OR")]
    Or,
    #[strum(serialize = "NOT")]
    Not,
    #[strum(serialize = "MINUS")]
    Minus,
    #[strum(serialize = "LABEL")]
    Label,
    #[strum(serialize = "GOTO")]
    Goto,
    #[strum(serialize = "IF_FALSE")]
    IfFalse,
    #[strum(serialize = "param")]
    Param,
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "ret")]
    Return,
    #[strum(serialize = "pop")]
    Pop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Copy {
        destination: Place,
        source: Operand,
    },
    Unary {
        operator: UnaryOperator,
        destination: Place,
        operand: Operand,
    },
    Binary {
        operator: BinaryOperator,
        destination: Place,
        lhs: Operand,
        rhs: Operand,
    },
    Label(Label),
    Goto(Label),
    IfFalse {
        condition: Operand,
        target: Label,
    },
    /// Pushes an argument for the next `call`
    Param(Operand),
    Call {
        function: String,
        argument_count: usize,
        destination: Place,
    },
    Return(Option<Operand>),
    /// Binds the next call-time argument to a parameter name
    Pop(Place),
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Copy { .. } => Opcode::Copy,
            Instruction::Unary { operator, .. } => operator.opcode(),
            Instruction::Binary { operator, .. } => operator.opcode(),
            Instruction::Label(_) => Opcode::Label,
            Instruction::Goto(_) => Opcode::Goto,
            Instruction::IfFalse { .. } => Opcode::IfFalse,
            Instruction::Param(_) => Opcode::Param,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Return(_) => Opcode::Return,
            Instruction::Pop(_) => Opcode::Pop,
        }
    }

    /// The place written by this instruction, if any
    pub fn destination(&self) -> Option<&Place> {
        match self {
            Instruction::Copy { destination, .. }
            | Instruction::Unary { destination, .. }
            | Instruction::Binary { destination, .. }
            | Instruction::Call { destination, .. } => Some(destination),
            Instruction::Pop(place) => Some(place),
            _ => None,
        }
    }

    /// Every operand read by this instruction
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Instruction::Copy { source, .. } => vec![source],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::IfFalse { condition, .. } => vec![condition],
            Instruction::Param(operand) | Instruction::Return(Some(operand)) => vec![operand],
            _ => Vec::new(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Instruction::Copy { source, .. } => vec![source],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::IfFalse { condition, .. } => vec![condition],
            Instruction::Param(operand) | Instruction::Return(Some(operand)) => vec![operand],
            _ => Vec::new(),
        }
    }

    /// True for the instructions after which control does not simply fall
    /// through to the next one
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Instruction::Goto(_) | Instruction::IfFalse { .. } | Instruction::Return(_)
        )
    }

    pub fn quadruple(&self) -> Quadruple {
        let text = |operand: &Operand| Some(operand.to_string());

        let (arg1, arg2, result) = match self {
            Instruction::Copy {
                destination,
                source,
            } => (text(source), None, Some(destination.to_string())),
            Instruction::Unary {
                destination,
                operand,
                ..
            } => (text(operand), None, Some(destination.to_string())),
            Instruction::Binary {
                destination,
                lhs,
                rhs,
                ..
            } => (text(lhs), text(rhs), Some(destination.to_string())),
            Instruction::Label(label) | Instruction::Goto(label) => {
                (None, None, Some(label.to_string()))
            }
            Instruction::IfFalse { condition, target } => {
                (text(condition), None, Some(target.to_string()))
            }
            Instruction::Param(operand) => (text(operand), None, None),
            Instruction::Call {
                function,
                argument_count,
                destination,
            } => (
                Some(function.clone()),
                Some(argument_count.to_string()),
                Some(destination.to_string()),
            ),
            Instruction::Return(value) => (value.as_ref().and_then(text), None, None),
            Instruction::Pop(place) => (None, None, Some(place.to_string())),
        };

        Quadruple {
            op: self.opcode(),
            arg1,
            arg2,
            result,
        }
    }
}

/// The `{op, arg1, arg2, result}` view of an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quadruple {
    pub op: Opcode,
    pub arg1: Option<String>,
    pub arg2: Option<String>,
    pub result: Option<String>,
}

impl core::fmt::Display for Quadruple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let column = |value: &Option<String>| value.clone().unwrap_or_else(|| "_".to_owned());

        write!(
            f,
            "({}, {}, {}, {})",
            self.op,
            column(&self.arg1),
            column(&self.arg2),
            column(&self.result)
        )
    }
}

/// One instruction per line
pub fn render_tac(instructions: &[Instruction]) -> String {
    instructions.iter().join("\n")
}

/// One numbered quadruple per line
pub fn render_quadruples(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .enumerate()
        .map(|(i, instruction)| format!("{i:>4}: {}", instruction.quadruple()))
        .join("\n")
}

impl core::fmt::Display for Temporary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl core::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl core::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Local(id) => write!(f, "{id}"),
            Label::Function(name) => write!(f, "func_{name}"),
        }
    }
}

impl core::fmt::Display for Place {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Place::Variable(name) => f.write_str(name),
            Place::Temporary(temporary) => write!(f, "{temporary}"),
        }
    }
}

impl core::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Integer(value) => write!(f, "{value}"),
            Literal::Float(value) => write!(f, "{value:?}"),
            Literal::Boolean(value) => write!(f, "{value}"),
            Literal::Char(lexeme) | Literal::String(lexeme) | Literal::FormattedString(lexeme) => {
                f.write_str(lexeme)
            }
        }
    }
}

impl core::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Place(place) => write!(f, "{place}"),
            Operand::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

impl core::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Copy {
                destination,
                source,
            } => write!(f, "{destination} = {source}"),
            Instruction::Unary {
                operator,
                destination,
                operand,
            } => write!(f, "{destination} = {} {operand}", operator.opcode()),
            Instruction::Binary {
                operator,
                destination,
                lhs,
                rhs,
            } => write!(f, "{destination} = {lhs} {} {rhs}", operator.opcode()),
            Instruction::Label(label) => write!(f, "LABEL {label}"),
            Instruction::Goto(label) => write!(f, "GOTO {label}"),
            Instruction::IfFalse { condition, target } => {
                write!(f, "IF_FALSE {condition} GOTO {target}")
            }
            Instruction::Param(operand) => write!(f, "param {operand}"),
            Instruction::Call {
                function,
                argument_count,
                destination,
            } => write!(f, "{destination} = call {function}, {argument_count}"),
            Instruction::Return(Some(value)) => write!(f, "ret {value}"),
            Instruction::Return(None) => write!(f, "ret"),
            Instruction::Pop(place) => write!(f, "pop {place}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;

    fn t(n: usize) -> Place {
        Place::Temporary(Temporary::new(n))
    }

    #[test]
    fn text_forms() {
        let instructions = vec![
            Instruction::Copy {
                destination: Place::Variable("x".to_owned()),
                source: Operand::variable("y"),
            },
            Instruction::Binary {
                operator: BinaryOperator::Add,
                destination: t(1),
                lhs: Operand::variable("a"),
                rhs: Operand::variable("b"),
            },
            Instruction::Unary {
                operator: UnaryOperator::Negate,
                destination: t(1),
                operand: Operand::variable("a"),
            },
            Instruction::Label(Label::Local(LabelId::new(1))),
            Instruction::Goto(Label::Local(LabelId::new(1))),
            Instruction::IfFalse {
                condition: Operand::Place(t(1)),
                target: Label::Local(LabelId::new(1)),
            },
            Instruction::Param(Operand::variable("x")),
            Instruction::Call {
                function: "f".to_owned(),
                argument_count: 2,
                destination: t(2),
            },
            Instruction::Return(Some(Operand::variable("x"))),
            Instruction::Pop(Place::Variable("a".to_owned())),
            Instruction::Label(Label::Function("suma".to_owned())),
        ];

        assert_eq!(
            render_tac(&instructions),
            [
                "x = y",
                "t1 = a + b",
                "t1 = MINUS a",
                "LABEL L1",
                "GOTO L1",
                "IF_FALSE t1 GOTO L1",
                "param x",
                "t2 = call f, 2",
                "ret x",
                "pop a",
                "LABEL func_suma",
            ]
            .join("\n")
        );
    }

    #[test]
    fn quadruple_columns() {
        let if_false = Instruction::IfFalse {
            condition: Operand::Place(t(3)),
            target: Label::Local(LabelId::new(2)),
        };
        let quadruple = if_false.quadruple();

        assert_eq!(quadruple.op, Opcode::IfFalse);
        assert_eq!(quadruple.arg1.as_deref(), Some("t3"));
        assert_eq!(quadruple.arg2, None);
        assert_eq!(quadruple.result.as_deref(), Some("L2"));
        assert_eq!(quadruple.to_string(), "(IF_FALSE, t3, _, L2)");

        let and = Instruction::Binary {
            operator: BinaryOperator::And,
            destination: t(1),
            lhs: Operand::Literal(Literal::Boolean(true)),
            rhs: Operand::variable("b"),
        };
        assert_eq!(and.quadruple().to_string(), "(AND, true, b, t1)");
    }

    #[test]
    fn signatures_keep_kinds_apart() {
        assert_ne!(
            Operand::variable("t1").signature(),
            Operand::Place(t(1)).signature()
        );
        assert_ne!(
            Operand::Literal(Literal::Integer(1)).signature(),
            Operand::Literal(Literal::Float(1.0)).signature()
        );
        assert_eq!(Literal::Float(2.0).to_string(), "2.0");
    }

    #[test]
    fn destinations_and_operands() {
        let call = Instruction::Call {
            function: "print".to_owned(),
            argument_count: 0,
            destination: t(4),
        };

        assert_eq!(call.destination(), Some(&t(4)));
        assert!(call.operands().is_empty());
        assert!(!call.ends_block());
        assert!(Instruction::Return(None).ends_block());
    }
}

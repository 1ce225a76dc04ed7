use strum::Display;

use crate::frontend::lexer::{Token, TokenKind};

/// Longest string literal accepted, counted in characters after unescaping
pub const MAX_STRING_LENGTH: usize = 255;

/// Names reserved for the language's types. They are not keywords to the
/// lexer but still cannot be used as identifiers.
pub const RESERVED_TYPE_NAMES: &[&str] = &["int", "float", "boolean", "char", "String", "void", "null"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Type {
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "boolean")]
    Boolean,
    #[strum(serialize = "char")]
    Char,
    #[strum(serialize = "String")]
    String,
    /// Parameters and call results. Compatible with every other type.
    #[strum(serialize = "unknown")]
    Unknown,
}

impl Type {
    pub fn of_literal(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::IntegerLiteral => Some(Self::Int),
            TokenKind::FloatLiteral => Some(Self::Float),
            TokenKind::BooleanLiteral => Some(Self::Boolean),
            TokenKind::CharLiteral => Some(Self::Char),
            TokenKind::StringLiteral | TokenKind::FormattedString => Some(Self::String),
            _ => None,
        }
    }

    pub fn is_compatible_with(self, other: Self) -> bool {
        self == other || self == Self::Unknown || other == Self::Unknown
    }
}

/// Strict typing of a binary operation: both operands must have the same
/// type. `+` with a `String` on either side is concatenation and accepts
/// anything. Returns the details of the violation on error.
pub fn binary_result_type(operator: TokenKind, lhs: Type, rhs: Type) -> Result<Type, String> {
    let symbol = operator.symbol();

    if operator == TokenKind::Plus && (lhs == Type::String || rhs == Type::String) {
        return Ok(Type::String);
    }

    let operand = match (lhs, rhs) {
        (Type::Unknown, ty) | (ty, Type::Unknown) => ty,
        (lhs, rhs) if lhs == rhs => lhs,
        (lhs, rhs) => {
            return Err(format!(
                "Incompatible types {lhs} and {rhs} for operator '{symbol}'"
            ));
        }
    };

    match operator {
        TokenKind::LogicalAnd | TokenKind::LogicalOr => match operand {
            Type::Boolean | Type::Unknown => Ok(Type::Boolean),
            ty => Err(format!(
                "Operator '{symbol}' requires boolean operands but found {ty}"
            )),
        },
        TokenKind::DoubleEquals | TokenKind::NotEquals => Ok(Type::Boolean),
        TokenKind::LessThan
        | TokenKind::LessThanOrEqualTo
        | TokenKind::GreaterThan
        | TokenKind::GreaterThanOrEqualTo => match operand {
            Type::Int | Type::Float | Type::Char | Type::Unknown => Ok(Type::Boolean),
            ty => Err(format!("Operator '{symbol}' cannot be applied to {ty}")),
        },
        TokenKind::Plus
        | TokenKind::Minus
        | TokenKind::Asterisk
        | TokenKind::Divide
        | TokenKind::Modulus => match operand {
            Type::Int | Type::Float | Type::Unknown => Ok(operand),
            Type::Boolean => Err(format!(
                "Boolean operand is not allowed in arithmetic operator '{symbol}'"
            )),
            ty => Err(format!("Operator '{symbol}' cannot be applied to {ty}")),
        },
        _ => Err(format!("'{symbol}' is not a binary operator")),
    }
}

pub fn unary_result_type(operator: TokenKind, operand: Type) -> Result<Type, String> {
    match (operator, operand) {
        (TokenKind::Minus, Type::Int | Type::Float | Type::Unknown) => Ok(operand),
        (TokenKind::Bang, Type::Boolean | Type::Unknown) => Ok(Type::Boolean),
        (operator, ty) => Err(format!(
            "Operator '{}' cannot be applied to {ty}",
            operator.symbol()
        )),
    }
}

/// Checks a literal token against the fixed limits of its type. `negated` is
/// set when the literal is the direct operand of a unary minus.
pub fn check_literal(token: &Token, negated: bool) -> Result<(), String> {
    match token.kind {
        TokenKind::IntegerLiteral => {
            let limit = i32::MAX as i64 + negated as i64;

            match token.lexeme.parse::<i64>() {
                Ok(value) if value <= limit => Ok(()),
                _ => Err(format!(
                    "Integer literal {} is out of range for int",
                    token.lexeme
                )),
            }
        }
        TokenKind::FloatLiteral => match token.lexeme.parse::<f64>() {
            Ok(value) if value.is_finite() && value <= f32::MAX as f64 => Ok(()),
            _ => Err(format!(
                "Float literal {} is out of range for float",
                token.lexeme
            )),
        },
        TokenKind::CharLiteral => {
            let value = unescape(strip_quotes(&token.lexeme));
            let mut chars = value.chars();

            match (chars.next(), chars.next()) {
                (Some(c), None) if c.len_utf16() == 1 => Ok(()),
                (Some(_), None) => Err(format!(
                    "Character literal {} is outside the 16-bit range",
                    token.lexeme
                )),
                _ => Err(format!(
                    "Character literal {} must hold exactly one character",
                    token.lexeme
                )),
            }
        }
        TokenKind::StringLiteral | TokenKind::FormattedString => {
            let body = token.lexeme.strip_prefix('f').unwrap_or(&token.lexeme);
            let length = unescape(strip_quotes(body)).chars().count();

            if length > MAX_STRING_LENGTH {
                Err(format!(
                    "String literal of {length} characters exceeds the maximum of {MAX_STRING_LENGTH}"
                ))
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

/// `0`, `00`, `0.0` and friends
pub fn is_zero_literal(lexeme: &str) -> bool {
    lexeme.parse::<f64>().is_ok_and(|value| value == 0.0)
}

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_quotes(lexeme: &str) -> &str {
    let mut chars = lexeme.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

pub fn unescape(body: &str) -> String {
    let mut output = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('r') => output.push('\r'),
            Some('0') => output.push('\0'),
            Some('u') => {
                let hex = chars.by_ref().take(4).collect::<String>();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => output.push(decoded),
                    None => {
                        output.push_str("\\u");
                        output.push_str(&hex);
                    }
                }
            }
            Some(other) => output.push(other),
            None => output.push('\\'),
        }
    }

    output
}

use once_cell::sync::Lazy;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::diagnostics::{CompilationError, ErrorManager};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// 1-based
    pub line: usize,
    /// 1-based, counted in characters
    pub column: usize,
}

impl Token {
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// Text used when the token shows up in a diagnostic
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_owned(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // while
    Identifier,       // contador

    /* Literals */
    BooleanLiteral,  // true
    CharLiteral,     // 'A'
    IntegerLiteral,  // 1
    FloatLiteral,    // 1.0
    StringLiteral,   // "hola"
    FormattedString, // f"hola {nombre}"

    /* Delimiters */
    OpenParen,    // (
    CloseParen,   // )
    OpenBracket,  // [
    CloseBracket, // ]
    OpenBrace,    // {
    CloseBrace,   // }
    Semicolon,    // ;
    Comma,        // ,
    Colon,        // :
    Dot,          // .

    /* Unary Ops */
    Bang, // !

    /* Unary + Binary Ops */
    Minus, // -

    /* Binary Ops */
    Plus,                 // +
    Asterisk,             // *
    Divide,               // /
    Modulus,              // %
    LogicalAnd,           // &&
    LogicalOr,            // ||
    DoubleEquals,         // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=

    /* Assignment */
    Equals,      // =
    PlusEquals,  // +=
    MinusEquals, // -=
    Increment,   // ++
    Decrement,   // --

    Eof,
}

impl TokenKind {
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::BooleanLiteral
                | Self::CharLiteral
                | Self::IntegerLiteral
                | Self::FloatLiteral
                | Self::StringLiteral
                | Self::FormattedString
        )
    }

    /// Source spelling of operator tokens, used in diagnostics
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Asterisk => "*",
            Self::Divide => "/",
            Self::Modulus => "%",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::DoubleEquals => "==",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqualTo => ">=",
            Self::Bang => "!",
            Self::Equals => "=",
            Self::PlusEquals => "+=",
            Self::MinusEquals => "-=",
            Self::Increment => "++",
            Self::Decrement => "--",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    If,
    Else,
    While,
    For,
    Switch,
    Case,
    Default,
    Break,
    Function,
    Return,
    Print,
    Println,
    Const,
}

/// How a row of the pattern table recognizes its token at the start of the
/// remaining input. Every matcher returns the byte length of the match.
#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// Fixed punctuation
    Exact(&'static str),
    /// Fixed word that must not be followed by an identifier character
    Word(&'static str),
    Scan(fn(&str) -> Option<usize>),
}

impl Matcher {
    fn match_length(&self, input: &str) -> Option<usize> {
        match self {
            Matcher::Exact(text) => input.starts_with(text).then_some(text.len()),
            Matcher::Word(word) => (input.starts_with(word)
                && !input[word.len()..].starts_with(is_identifier_continue))
            .then_some(word.len()),
            Matcher::Scan(scan) => scan(input),
        }
    }
}

#[derive(Debug)]
struct Pattern {
    kind: TokenKind,
    matcher: Matcher,
}

/// Tried top to bottom at every position. The first row that matches wins,
/// so more specific rows must come before more general ones.
static PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    use Matcher::{Exact, Scan, Word};

    let mut patterns = vec![
        (TokenKind::FormattedString, Scan(scan_formatted_string)),
        (TokenKind::StringLiteral, Scan(scan_string)),
        (TokenKind::CharLiteral, Scan(scan_char)),
        (TokenKind::FloatLiteral, Scan(scan_float)),
        (TokenKind::IntegerLiteral, Scan(scan_integer)),
        (TokenKind::DoubleEquals, Exact("==")),
        (TokenKind::NotEquals, Exact("!=")),
        (TokenKind::LessThanOrEqualTo, Exact("<=")),
        (TokenKind::GreaterThanOrEqualTo, Exact(">=")),
        (TokenKind::LogicalAnd, Exact("&&")),
        (TokenKind::LogicalOr, Exact("||")),
        (TokenKind::Increment, Exact("++")),
        (TokenKind::Decrement, Exact("--")),
        (TokenKind::PlusEquals, Exact("+=")),
        (TokenKind::MinusEquals, Exact("-=")),
        (TokenKind::Plus, Exact("+")),
        (TokenKind::Minus, Exact("-")),
        (TokenKind::Asterisk, Exact("*")),
        (TokenKind::Divide, Exact("/")),
        (TokenKind::Modulus, Exact("%")),
        (TokenKind::Equals, Exact("=")),
        (TokenKind::LessThan, Exact("<")),
        (TokenKind::GreaterThan, Exact(">")),
        (TokenKind::Bang, Exact("!")),
        (TokenKind::OpenParen, Exact("(")),
        (TokenKind::CloseParen, Exact(")")),
        (TokenKind::OpenBrace, Exact("{")),
        (TokenKind::CloseBrace, Exact("}")),
        (TokenKind::OpenBracket, Exact("[")),
        (TokenKind::CloseBracket, Exact("]")),
        (TokenKind::Semicolon, Exact(";")),
        (TokenKind::Comma, Exact(",")),
        (TokenKind::Colon, Exact(":")),
        (TokenKind::Dot, Exact(".")),
    ];

    patterns.extend(
        Keyword::iter().map(|keyword| (TokenKind::Keyword(keyword), Word(keyword.into()))),
    );
    patterns.push((TokenKind::BooleanLiteral, Word("true")));
    patterns.push((TokenKind::BooleanLiteral, Word("false")));
    patterns.push((TokenKind::Identifier, Scan(scan_identifier)));

    patterns
        .into_iter()
        .map(|(kind, matcher)| Pattern { kind, matcher })
        .collect()
});

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn scan_digits(input: &str) -> usize {
    input.bytes().take_while(u8::is_ascii_digit).count()
}

fn scan_integer(input: &str) -> Option<usize> {
    let length = scan_digits(input);
    (length > 0).then_some(length)
}

// 12.5 (both sides of the dot are required)
fn scan_float(input: &str) -> Option<usize> {
    let whole = scan_integer(input)?;
    let fraction = scan_digits(input[whole..].strip_prefix('.')?);

    (fraction > 0).then_some(whole + 1 + fraction)
}

fn scan_identifier(input: &str) -> Option<usize> {
    if !input.starts_with(is_identifier_start) {
        return None;
    }

    Some(
        input
            .find(|c: char| !is_identifier_continue(c))
            .unwrap_or(input.len()),
    )
}

/// Quoted text with backslash escapes. May span several lines.
fn scan_quoted(input: &str, quote: char) -> Option<usize> {
    let mut chars = input.char_indices();

    if chars.next()?.1 != quote {
        return None;
    }

    while let Some((index, c)) = chars.next() {
        if c == '\\' {
            chars.next()?;
            continue;
        }

        if c == quote {
            return Some(index + c.len_utf8());
        }
    }

    None
}

fn scan_string(input: &str) -> Option<usize> {
    scan_quoted(input, '"')
}

// f"hola {nombre}"
fn scan_formatted_string(input: &str) -> Option<usize> {
    scan_quoted(input.strip_prefix('f')?, '"').map(|length| length + 1)
}

// 'a', '\n', 'A'
fn scan_char(input: &str) -> Option<usize> {
    let rest = input.strip_prefix('\'')?;
    let mut chars = rest.chars();

    let body_length = match chars.next()? {
        '\\' => match chars.next()? {
            'u' => {
                let hex = rest.get(2..6)?;
                if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                6
            }
            escaped => 1 + escaped.len_utf8(),
        },
        '\'' | '\n' => return None,
        c => c.len_utf8(),
    };

    rest[body_length..]
        .starts_with('\'')
        .then_some(body_length + 2)
}

/// Turns source text into tokens. Never fails: unrecognized characters are
/// reported as lexical errors and skipped.
#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source str,
    position: usize,
    line: usize,
    column: usize,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenizes the whole input. The returned sequence always ends with
    /// exactly one [`TokenKind::Eof`] token.
    pub fn tokenize(source: &'source str, errors: &mut ErrorManager) -> Vec<Token> {
        let mut lexer = Self::new(source);
        let mut tokens = Vec::new();

        while let Some(token) = lexer.next_token(errors) {
            tokens.push(token);
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            line: lexer.line,
            column: lexer.column,
        });

        log::debug!("lexed {} tokens", tokens.len());

        tokens
    }

    fn remaining(&self) -> &'source str {
        &self.source[self.position..]
    }

    /// Moves past `text`, keeping line and column in sync with any newlines
    /// it contains
    fn advance_over(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }

        self.position += text.len();
    }

    fn ignore_whitespace_and_comments(&mut self) {
        loop {
            let remaining = self.remaining();

            if remaining.starts_with("//") {
                let comment_length = remaining.find('\n').unwrap_or(remaining.len());
                self.advance_over(&remaining[..comment_length]);
                continue;
            }

            let whitespace_length = remaining
                .find(|c: char| !c.is_whitespace())
                .unwrap_or(remaining.len());

            if whitespace_length == 0 {
                break;
            }

            self.advance_over(&remaining[..whitespace_length]);
        }
    }

    pub fn next_token(&mut self, errors: &mut ErrorManager) -> Option<Token> {
        loop {
            self.ignore_whitespace_and_comments();

            let remaining = self.remaining();
            let c = remaining.chars().next()?;

            let matched = PATTERNS.iter().find_map(|pattern| {
                pattern
                    .matcher
                    .match_length(remaining)
                    .map(|length| (pattern.kind, length))
            });

            let Some((kind, length)) = matched else {
                errors.add(CompilationError::lexical(
                    self.line,
                    self.column,
                    "Unrecognized character",
                    format!("Unrecognized character '{c}'"),
                ));
                self.advance_over(&remaining[..c.len_utf8()]);
                continue;
            };

            let lexeme = &remaining[..length];
            let token = Token {
                kind,
                lexeme: lexeme.to_owned(),
                line: self.line,
                column: self.column,
            };

            self.advance_over(lexeme);

            return Some(token);
        }
    }
}

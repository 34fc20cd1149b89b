//! The expression module: a tokenizer and a precedence evaluator for debugger expressions
//! such as `$a0 + 0x10 * (3 - -2)`.

use std::fmt;

use nom_locate::LocatedSpan;
use thiserror::Error;

use crate::plat::Word;

pub mod eval;
pub mod lexer;

pub use eval::{evaluate, NoRegisters, RegisterResolver};
pub use lexer::{tokenize, TokenBuffer};

pub type Span<'a> = LocatedSpan<&'a str>;

/// Longest text a literal or register token may carry.
pub const TOKEN_TEXT_MAX: usize = 31;

/// Deepest nesting of parentheses and unary minuses the evaluator accepts.
pub const MAX_DEPTH: usize = 512;

/// An error produced while splitting an expression into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("no match at position {position}")]
    NoMatch { position: usize },
    #[error("token at position {position} is {len} characters long (max {})", TOKEN_TEXT_MAX)]
    TokenTooLong { position: usize, len: usize },
}

/// An error produced while evaluating a token range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("missing operand")]
    EmptyOperand,
    #[error("invalid operand")]
    InvalidOperand,
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("division by zero")]
    DivisionByZero,
    #[error("unknown register: ${0}")]
    UnknownRegister(String),
    #[error("missing operator")]
    MissingOperator,
    #[error("operator `{0}` is not supported")]
    UnsupportedOperator(TokenKind),
    #[error("literal {0} does not fit in a machine word")]
    LiteralOutOfRange(String),
    #[error("operand before unary `-`")]
    StrayOperand,
    #[error("expression nests deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Either half of [expr] failing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("tokenize error: {0}")]
    Tokenize(#[from] TokenizeError),
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// The lexical class of a [Token].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A decimal literal, e.g. `42`
    Number,
    /// A hexadecimal literal, e.g. `0x2a`
    HexNumber,
    /// A register reference, e.g. `$a0`
    Register,
    /// `+`
    Plus,
    /// Binary `-`
    Minus,
    /// Unary `-`
    UnaryMinus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `==`
    Equal,
}

impl TokenKind {
    /// Whether tokens of this kind carry text.
    pub fn is_operand(self) -> bool {
        matches!(self, Self::Number | Self::HexNumber | Self::Register)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Number => "number",
            Self::HexNumber => "hex number",
            Self::Register => "register",
            Self::Plus => "+",
            Self::Minus | Self::UnaryMinus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Equal => "==",
        };
        write!(f, "{}", s)
    }
}

/// A lexical unit of an expression. Output for the tokenizer, input for the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text. Only populated for [Number][TokenKind::Number], [HexNumber][TokenKind::HexNumber]
    /// and [Register][TokenKind::Register].
    pub text: String,
    /// Byte offset into the source expression.
    pub position: usize,
}

impl Token {
    /// Builds an operator or parenthesis token.
    pub fn op(kind: TokenKind) -> Self {
        Self {
            kind,
            text: String::new(),
            position: 0,
        }
    }

    /// Builds a literal or register token.
    pub fn operand(kind: TokenKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            position: 0,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_operand() {
            write!(f, "{}", self.text)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// Tokenizes and evaluates `text` in one go.
pub fn expr<R>(text: &str, regs: &R) -> Result<Word, ExprError>
where
    R: RegisterResolver + ?Sized,
{
    let tokens = tokenize(text)?;
    log::trace!(
        "tokens: {}",
        tokens
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
    let value = eval::eval_tokens(&tokens, regs)?;
    Ok(value)
}

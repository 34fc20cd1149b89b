//! Recursive evaluation of token ranges.
//!
//! A range is reduced by, in order: resolving a single operand, stripping one pair of enclosing
//! parentheses, or splitting around its major operator (the loosest-binding top-level operator,
//! rightmost among equals) and evaluating both halves.

use std::ops::RangeInclusive;

use crate::plat::{SWord, Word};

use super::{EvalError, Token, TokenKind, MAX_DEPTH};

/// Supplies register values to the evaluator. Names are passed without the `$` sigil.
pub trait RegisterResolver {
    fn reg_value(&self, name: &str) -> Option<Word>;
}

impl<F> RegisterResolver for F
where
    F: Fn(&str) -> Option<Word>,
{
    fn reg_value(&self, name: &str) -> Option<Word> {
        self(name)
    }
}

/// A resolver that knows no registers. Useful for plain arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegisters;

impl RegisterResolver for NoRegisters {
    fn reg_value(&self, _name: &str) -> Option<Word> {
        None
    }
}

/// Evaluates the closed index range `range` of `tokens`.
pub fn evaluate<R>(
    tokens: &[Token],
    range: RangeInclusive<usize>,
    regs: &R,
) -> Result<Word, EvalError>
where
    R: RegisterResolver + ?Sized,
{
    let (p, q) = range.into_inner();
    if p > q {
        return Err(EvalError::EmptyOperand);
    }
    let toks = tokens.get(p..=q).ok_or(EvalError::EmptyOperand)?;
    Evaluator { regs }.eval(toks, 0)
}

/// Evaluates a whole token sequence.
pub(crate) fn eval_tokens<R>(tokens: &[Token], regs: &R) -> Result<Word, EvalError>
where
    R: RegisterResolver + ?Sized,
{
    Evaluator { regs }.eval(tokens, 0)
}

struct Evaluator<'r, R: ?Sized> {
    regs: &'r R,
}

impl<'r, R> Evaluator<'r, R>
where
    R: RegisterResolver + ?Sized,
{
    fn eval(&self, toks: &[Token], depth: usize) -> Result<Word, EvalError> {
        if depth > MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        match toks {
            [] => Err(EvalError::EmptyOperand),
            [tok] => self.operand(tok),
            _ if check_parentheses(toks) => self.eval(&toks[1..toks.len() - 1], depth + 1),
            _ => {
                let major = find_major(toks)?;
                let (left, rest) = toks.split_at(major);
                let (op, right) = (&rest[0], &rest[1..]);
                if op.kind == TokenKind::UnaryMinus {
                    if !left.is_empty() {
                        return Err(EvalError::StrayOperand);
                    }
                    return Ok(self.eval(right, depth + 1)?.wrapping_neg());
                }
                let lhs = self.eval(left, depth + 1)?;
                let rhs = self.eval(right, depth + 1)?;
                apply(op.kind, lhs, rhs)
            }
        }
    }

    fn operand(&self, tok: &Token) -> Result<Word, EvalError> {
        match tok.kind {
            TokenKind::Number => tok
                .text
                .parse::<Word>()
                .map_err(|_| EvalError::LiteralOutOfRange(tok.text.clone())),
            TokenKind::HexNumber => {
                let digits = tok.text.strip_prefix("0x").unwrap_or(&tok.text);
                Word::from_str_radix(digits, 16)
                    .map_err(|_| EvalError::LiteralOutOfRange(tok.text.clone()))
            }
            TokenKind::Register => {
                let name = tok.text.strip_prefix('$').unwrap_or(&tok.text);
                self.regs
                    .reg_value(name)
                    .ok_or_else(|| EvalError::UnknownRegister(name.to_string()))
            }
            _ => Err(EvalError::InvalidOperand),
        }
    }
}

/// True if the whole range is one balanced parenthesized group, e.g. `(1+2)` but not `(1)+(2)`.
fn check_parentheses(toks: &[Token]) -> bool {
    if toks.first().map(|t| t.kind) != Some(TokenKind::LParen)
        || toks.last().map(|t| t.kind) != Some(TokenKind::RParen)
    {
        return false;
    }
    let mut depth = 0isize;
    for (i, tok) in toks.iter().enumerate() {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            _ => {}
        }
        if depth == 0 && i < toks.len() - 1 {
            return false;
        }
    }
    depth == 0
}

/// Finds the index of the operator to split on.
fn find_major(toks: &[Token]) -> Result<usize, EvalError> {
    let mut depth = 0usize;
    // (index, precedence class); a higher class binds looser
    let mut major: Option<(usize, u8)> = None;

    for (i, tok) in toks.iter().enumerate() {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.checked_sub(1).ok_or(EvalError::UnbalancedParens)?;
            }
            _ if depth > 0 || tok.kind.is_operand() => {}
            kind => {
                let class = match kind {
                    TokenKind::UnaryMinus => 0,
                    TokenKind::Star | TokenKind::Slash => 1,
                    TokenKind::Plus | TokenKind::Minus => 2,
                    _ => return Err(EvalError::UnsupportedOperator(kind)),
                };
                // binary operators tie to the rightmost, unary minus to the leftmost
                let replace = match major {
                    None => true,
                    Some((_, best)) => class > best || (class == best && class > 0),
                };
                if replace {
                    major = Some((i, class));
                }
            }
        }
    }

    if depth != 0 {
        return Err(EvalError::UnbalancedParens);
    }
    major.map(|(i, _)| i).ok_or(EvalError::MissingOperator)
}

fn apply(op: TokenKind, lhs: Word, rhs: Word) -> Result<Word, EvalError> {
    let value = match op {
        TokenKind::Plus => lhs.wrapping_add(rhs),
        TokenKind::Minus => lhs.wrapping_sub(rhs),
        TokenKind::Star => lhs.wrapping_mul(rhs),
        TokenKind::Slash => {
            if rhs == 0 {
                return Err(EvalError::DivisionByZero);
            }
            (lhs as SWord).wrapping_div(rhs as SWord) as Word
        }
        _ => unreachable!("find_major selected non-arithmetic operator {}", op),
    };
    Ok(value)
}

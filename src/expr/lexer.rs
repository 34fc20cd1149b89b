use std::ops::Deref;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alphanumeric0, char, digit1, hex_digit1, multispace1, satisfy},
    combinator::{map, recognize, value},
    sequence::{preceded, tuple},
    IResult,
};

use super::{Span, Token, TokenKind, TokenizeError, TOKEN_TEXT_MAX};

/// Number of tokens a fresh [TokenBuffer] has room for.
pub const INITIAL_CAPACITY: usize = 32;

/// The growable output of [tokenize]. Capacity starts at [INITIAL_CAPACITY] and doubles whenever
/// a push would overflow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBuffer {
    tokens: Vec<Token>,
}

impl TokenBuffer {
    pub fn new() -> Self {
        Self {
            tokens: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn push(&mut self, token: Token) {
        if self.tokens.len() == self.tokens.capacity() {
            let additional = self.tokens.capacity().max(1);
            self.tokens.reserve_exact(additional);
        }
        self.tokens.push(token);
    }

    pub fn capacity(&self) -> usize {
        self.tokens.capacity()
    }
}

impl Default for TokenBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TokenBuffer {
    type Target = [Token];

    fn deref(&self) -> &[Token] {
        &self.tokens
    }
}

/// What a single lexical rule recognized.
#[derive(Debug, Clone, Copy)]
enum Lexeme<'a> {
    Blank,
    Op(TokenKind),
    Text(TokenKind, Span<'a>),
}

fn lex_blank(inp: Span) -> IResult<Span, Lexeme> {
    value(Lexeme::Blank, multispace1)(inp)
}

fn lex_hex(inp: Span) -> IResult<Span, Lexeme> {
    map(recognize(preceded(tag("0x"), hex_digit1)), |s| {
        Lexeme::Text(TokenKind::HexNumber, s)
    })(inp)
}

fn lex_decimal(inp: Span) -> IResult<Span, Lexeme> {
    map(digit1, |s| Lexeme::Text(TokenKind::Number, s))(inp)
}

fn lex_punctuation(inp: Span) -> IResult<Span, Lexeme> {
    alt((
        value(Lexeme::Op(TokenKind::Plus), char('+')),
        value(Lexeme::Op(TokenKind::Minus), char('-')),
        value(Lexeme::Op(TokenKind::Star), char('*')),
        value(Lexeme::Op(TokenKind::Slash), char('/')),
        value(Lexeme::Op(TokenKind::LParen), char('(')),
        value(Lexeme::Op(TokenKind::RParen), char(')')),
    ))(inp)
}

fn lex_equal(inp: Span) -> IResult<Span, Lexeme> {
    value(Lexeme::Op(TokenKind::Equal), tag("=="))(inp)
}

fn lex_register(inp: Span) -> IResult<Span, Lexeme> {
    map(
        recognize(tuple((
            char('$'),
            satisfy(|c| c.is_ascii_alphabetic()),
            alphanumeric0,
        ))),
        |s| Lexeme::Text(TokenKind::Register, s),
    )(inp)
}

/// Tries every rule in order and returns the first match anchored at the start of `inp`.
fn lex_lexeme(inp: Span) -> IResult<Span, Lexeme> {
    alt((
        lex_blank,
        lex_hex,
        lex_decimal,
        lex_punctuation,
        lex_equal,
        lex_register,
    ))(inp)
}

/// A `-` is a negation when nothing that could end an operand precedes it.
fn is_unary_context(prev: Option<TokenKind>) -> bool {
    matches!(
        prev,
        None | Some(
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::UnaryMinus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::LParen
        )
    )
}

/// Lexes expression text into a [TokenBuffer].
///
/// Fails on the first position no rule matches; no partial output is returned.
pub fn tokenize(expression: &str) -> Result<TokenBuffer, TokenizeError> {
    let mut rest = Span::new(expression);
    let mut tokens = TokenBuffer::new();
    let mut prev = None;

    while !rest.fragment().is_empty() {
        let position = rest.location_offset();
        let (next, lexeme) = lex_lexeme(rest).map_err(|_| {
            log::debug!(
                "no match at position {}\n{}\n{:>width$}",
                position,
                expression,
                "^",
                width = position + 1
            );
            TokenizeError::NoMatch { position }
        })?;
        rest = next;

        let token = match lexeme {
            Lexeme::Blank => continue,
            Lexeme::Op(TokenKind::Minus) if is_unary_context(prev) => Token {
                kind: TokenKind::UnaryMinus,
                text: String::new(),
                position,
            },
            Lexeme::Op(kind) => Token {
                kind,
                text: String::new(),
                position,
            },
            Lexeme::Text(kind, span) => {
                let text = *span.fragment();
                if text.len() > TOKEN_TEXT_MAX {
                    return Err(TokenizeError::TokenTooLong {
                        position,
                        len: text.len(),
                    });
                }
                Token {
                    kind,
                    text: text.to_string(),
                    position,
                }
            }
        };
        prev = Some(token.kind);
        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expression: &str) -> Vec<TokenKind> {
        tokenize(expression)
            .unwrap()
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        let toks = tokenize("1 + 0x1F*$a0").unwrap();
        assert_eq!(
            toks.iter().map(|t| t.kind).collect::<Vec<_>>(),
            [
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::HexNumber,
                TokenKind::Star,
                TokenKind::Register,
            ]
        );
        assert_eq!(toks[0].text, "1");
        assert_eq!(toks[2].text, "0x1F");
        assert_eq!(toks[4].text, "$a0");
        assert!(toks[1].text.is_empty());
        assert_eq!(
            toks.iter().map(|t| t.position).collect::<Vec<_>>(),
            [0, 2, 4, 8, 9]
        );
    }

    #[test]
    fn test_tokenize_minus() {
        use crate::expr::TokenKind::*;
        assert_eq!(kinds("-1"), [UnaryMinus, Number]);
        assert_eq!(kinds("3-1"), [Number, Minus, Number]);
        assert_eq!(kinds("3 - 1"), [Number, Minus, Number]);
        assert_eq!(kinds("( -1)"), [LParen, UnaryMinus, Number, RParen]);
        assert_eq!(kinds("(1)-1"), [LParen, Number, RParen, Minus, Number]);
        assert_eq!(kinds("2*-3"), [Number, Star, UnaryMinus, Number]);
        assert_eq!(kinds("$pc - -1"), [Register, Minus, UnaryMinus, Number]);
        assert_eq!(kinds("--1"), [UnaryMinus, UnaryMinus, Number]);
    }

    #[test]
    fn test_tokenize_rule_order() {
        use crate::expr::TokenKind::*;
        assert_eq!(kinds("0x10"), [HexNumber]);
        assert_eq!(kinds("010"), [Number]);
        assert_eq!(kinds("1==1"), [Number, Equal, Number]);
        assert_eq!(
            tokenize("0x"),
            Err(TokenizeError::NoMatch { position: 1 })
        );
        assert_eq!(
            tokenize("1 = 1"),
            Err(TokenizeError::NoMatch { position: 2 })
        );
    }

    #[test]
    fn test_tokenize_register() {
        assert_eq!(kinds("$s11"), [TokenKind::Register]);
        assert_eq!(
            tokenize("$0"),
            Err(TokenizeError::NoMatch { position: 0 })
        );
        assert_eq!(
            tokenize("a0"),
            Err(TokenizeError::NoMatch { position: 0 })
        );
    }

    #[test]
    fn test_tokenize_no_match() {
        assert_eq!(
            tokenize("5&3"),
            Err(TokenizeError::NoMatch { position: 1 })
        );
        assert_eq!(
            tokenize("  1 + ?"),
            Err(TokenizeError::NoMatch { position: 6 })
        );
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_too_long() {
        let long = "1".repeat(TOKEN_TEXT_MAX + 1);
        assert_eq!(
            tokenize(&format!("2+{}", long)),
            Err(TokenizeError::TokenTooLong {
                position: 2,
                len: TOKEN_TEXT_MAX + 1
            })
        );
        assert!(tokenize(&"1".repeat(TOKEN_TEXT_MAX)).is_ok());
    }

    #[test]
    fn test_buffer_growth() {
        let expression = vec!["1"; 40].join("+");
        let toks = tokenize(&expression).unwrap();
        assert_eq!(toks.len(), 79);
        assert!(toks.capacity() >= 2 * INITIAL_CAPACITY);
        for (i, tok) in toks.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(tok.kind, TokenKind::Number);
                assert_eq!(tok.text, "1");
                assert_eq!(tok.position, i);
            } else {
                assert_eq!(tok.kind, TokenKind::Plus);
            }
        }
    }

    #[test]
    fn test_buffer_doubles() {
        let mut buf = TokenBuffer::new();
        let initial = buf.capacity();
        assert!(initial >= INITIAL_CAPACITY);
        for _ in 0..=initial {
            buf.push(Token::op(TokenKind::Plus));
        }
        assert!(buf.capacity() >= 2 * initial);
        assert_eq!(buf.len(), initial + 1);
    }
}

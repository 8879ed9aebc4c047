//! Lexical analysis for PFX source text.

use std::fmt;

use logos::Logos;
use pfx_ir::Span;

use crate::ParseError;

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f32> {
    lex.slice().trim_end_matches('f').parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1]
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

/// A PFX token. Type names are not keywords; they are identifiers the
/// analyzer resolves against the scope's type tables.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Token {
    #[token("struct")]
    Struct,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("uniform")]
    Uniform,
    #[token("const")]
    Const,
    #[token("in")]
    In,
    #[token("out")]
    Out,
    #[token("inout")]
    Inout,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?f?", parse_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+f?", parse_float)]
    #[regex(r"[0-9]+f", parse_float)]
    Float(f32),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i32>().ok())]
    Int(i32),
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Not,

    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Struct => write!(f, "`struct`"),
            Self::Return => write!(f, "`return`"),
            Self::If => write!(f, "`if`"),
            Self::Else => write!(f, "`else`"),
            Self::While => write!(f, "`while`"),
            Self::For => write!(f, "`for`"),
            Self::Uniform => write!(f, "`uniform`"),
            Self::Const => write!(f, "`const`"),
            Self::In => write!(f, "`in`"),
            Self::Out => write!(f, "`out`"),
            Self::Inout => write!(f, "`inout`"),
            Self::True => write!(f, "`true`"),
            Self::False => write!(f, "`false`"),
            Self::Float(v) => write!(f, "float literal `{v}`"),
            Self::Int(v) => write!(f, "integer literal `{v}`"),
            Self::Str(s) => write!(f, "string literal {s:?}"),
            Self::Ident(name) => write!(f, "`{name}`"),
            Self::LBrace => write!(f, "`{{`"),
            Self::RBrace => write!(f, "`}}`"),
            Self::LParen => write!(f, "`(`"),
            Self::RParen => write!(f, "`)`"),
            Self::LBracket => write!(f, "`[`"),
            Self::RBracket => write!(f, "`]`"),
            Self::Semicolon => write!(f, "`;`"),
            Self::Comma => write!(f, "`,`"),
            Self::Dot => write!(f, "`.`"),
            Self::Plus => write!(f, "`+`"),
            Self::Minus => write!(f, "`-`"),
            Self::Star => write!(f, "`*`"),
            Self::Slash => write!(f, "`/`"),
            Self::Percent => write!(f, "`%`"),
            Self::Not => write!(f, "`!`"),
            Self::Eq => write!(f, "`=`"),
            Self::PlusEq => write!(f, "`+=`"),
            Self::MinusEq => write!(f, "`-=`"),
            Self::StarEq => write!(f, "`*=`"),
            Self::SlashEq => write!(f, "`/=`"),
            Self::PercentEq => write!(f, "`%=`"),
            Self::EqEq => write!(f, "`==`"),
            Self::NotEq => write!(f, "`!=`"),
            Self::Lt => write!(f, "`<`"),
            Self::Gt => write!(f, "`>`"),
            Self::Le => write!(f, "`<=`"),
            Self::Ge => write!(f, "`>=`"),
            Self::AndAnd => write!(f, "`&&`"),
            Self::OrOr => write!(f, "`||`"),
        }
    }
}

/// Tokenizes a source string, dropping whitespace and comments.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u32, range.end as u32);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(ParseError::Lexical { span }),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("struct uniform float4 intensity"),
            vec![
                Token::Struct,
                Token::Uniform,
                Token::Ident("float4".into()),
                Token::Ident("intensity".into()),
            ]
        );
        // Keyword prefixes stay identifiers.
        assert_eq!(kinds("input"), vec![Token::Ident("input".into())]);
        assert_eq!(kinds("int"), vec![Token::Ident("int".into())]);
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            kinds("42 3.5 1.0f 2e3"),
            vec![
                Token::Int(42),
                Token::Float(3.5),
                Token::Float(1.0),
                Token::Float(2000.0),
            ]
        );
    }

    #[test]
    fn string_literals_unescape() {
        assert_eq!(
            kinds(r#""dead \"pool\"""#),
            vec![Token::Str("dead \"pool\"".into())]
        );
    }

    #[test]
    fn compound_operators_win_over_singles() {
        assert_eq!(
            kinds("a += b == c <= d"),
            vec![
                Token::Ident("a".into()),
                Token::PlusEq,
                Token::Ident("b".into()),
                Token::EqEq,
                Token::Ident("c".into()),
                Token::Le,
                Token::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // one\n/* two\nthree */ b"),
            vec![Token::Ident("a".into()), Token::Ident("b".into())]
        );
    }

    #[test]
    fn spans_are_byte_ranges() {
        let tokens = lex("ab  cd").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 2));
        assert_eq!(tokens[1].1, Span::new(4, 6));
    }

    #[test]
    fn unknown_character_is_a_lex_error() {
        assert!(lex("a @ b").is_err());
    }
}

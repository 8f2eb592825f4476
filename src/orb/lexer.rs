//! Lexer for scenario files using logos

use logos::Logos;

pub use crate::error::Span;

#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t]+")]
pub enum Token {
    #[token("DEFINE")]
    Define,

    #[regex(r"\r?\n")]
    Newline,

    #[regex(r#""[^"\r\n]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    Quoted(String),

    #[regex(r#"[^\s"]+"#, |lex| lex.slice().to_string())]
    Word(String),

    /// Text the lexer could not make sense of, such as an unterminated quote
    Invalid(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Define => write!(f, "DEFINE"),
            Token::Newline => write!(f, "line break"),
            Token::Quoted(s) => write!(f, "\"{}\"", s),
            Token::Word(s) => write!(f, "{}", s),
            Token::Invalid(s) => write!(f, "{:?}", s),
        }
    }
}

/// Lex input into tokens with spans
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    let mut lexer = Token::lexer(input).spanned();
    std::iter::from_fn(move || {
        let (tok, span) = lexer.next()?;
        let tok = tok.unwrap_or_else(|_| Token::Invalid(input[span.clone()].to_string()));
        Some((tok, span))
    })
}

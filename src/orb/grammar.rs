//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use super::ast::*;
use super::lexer::Token;

/// Parse scenario file text into definitions
pub fn parse(input: &str) -> Result<OrbFile, Vec<crate::ParseError>> {
    let len = input.len();

    let token_iter = super::lexer::lex(input).map(|(tok, span)| (tok, span.into()));

    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    file_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn file_parser<'a, I>() -> impl Parser<'a, I, OrbFile, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let atom = select! {
        Token::Word(w) => Atom::Word(w),
        Token::Quoted(q) => Atom::Quoted(q),
    }
    .map_with(|a, e| Spanned::new(a, span_range(&e.span())));

    let line = atom
        .clone()
        .repeated()
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|atoms, e| Line {
            atoms,
            span: span_range(&e.span()),
        });

    // Blank lines are runs of breaks
    let newline = just(Token::Newline).repeated().at_least(1);

    let settings = line
        .clone()
        .then_ignore(newline.clone().or_not())
        .repeated()
        .collect::<Vec<_>>();

    // A definition runs until the next DEFINE
    let definition = just(Token::Define)
        .ignore_then(atom.repeated().collect::<Vec<_>>())
        .then(newline.clone().ignore_then(line).repeated().collect::<Vec<_>>())
        .map_with(|(header, lines), e| Definition {
            header,
            lines,
            span: span_range(&e.span()),
        })
        .then_ignore(newline.clone().or_not());

    newline
        .or_not()
        .ignore_then(settings)
        .then(definition.repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|(settings, definitions)| OrbFile {
            settings,
            definitions,
        })
}

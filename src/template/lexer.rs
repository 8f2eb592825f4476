//! Lexer for fragment text using logos

use logos::Logos;

/// Byte range in template text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Piece {
    // Escaped braces render as a single literal brace
    #[token("{{")]
    OpenBrace,
    #[token("}}")]
    CloseBrace,

    #[regex(r"\{[a-zA-Z_][a-zA-Z0-9_]*\}", |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    Placeholder(String),

    // Anchor points swallow one trailing line break so that an empty
    // section leaves no blank line behind
    #[regex(r"\{@[a-zA-Z_][a-zA-Z0-9_]*\}(\r?\n)?", anchor_name)]
    AnchorPoint(String),

    #[regex(r"[^{}]+", |lex| lex.slice().to_string())]
    Literal(String),
}

fn anchor_name(lex: &mut logos::Lexer<Piece>) -> String {
    let s = lex.slice().trim_end_matches(['\r', '\n']);
    s[2..s.len() - 1].to_string()
}

/// Lex template text into pieces with spans.
///
/// Stray single braces are reported by the byte offset where lexing failed.
pub fn lex(input: &str) -> Result<Vec<(Piece, Span)>, usize> {
    Piece::lexer(input)
        .spanned()
        .map(|(piece, span)| piece.map(|p| (p, span.clone())).map_err(|_| span.start))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(input: &str) -> Vec<Piece> {
        lex(input).expect("Should lex").into_iter().map(|(p, _)| p).collect()
    }

    #[test]
    fn test_placeholder_and_literal() {
        assert_eq!(
            pieces("STATE {latitude} {longitude}"),
            vec![
                Piece::Literal("STATE ".to_string()),
                Piece::Placeholder("latitude".to_string()),
                Piece::Literal(" ".to_string()),
                Piece::Placeholder("longitude".to_string()),
            ]
        );
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(
            pieces("{{name}}"),
            vec![
                Piece::OpenBrace,
                Piece::Literal("name".to_string()),
                Piece::CloseBrace,
            ]
        );
    }

    #[test]
    fn test_anchor_point_swallows_newline() {
        let lexed = lex("A\n{@platforms}\nB").expect("Should lex");
        assert_eq!(lexed[1].0, Piece::AnchorPoint("platforms".to_string()));
        assert_eq!(lexed[1].1, 2..15);
        assert_eq!(lexed[2].0, Piece::Literal("B".to_string()));
    }

    #[test]
    fn test_anchor_point_crlf() {
        assert_eq!(
            pieces("{@reports}\r\n"),
            vec![Piece::AnchorPoint("reports".to_string())]
        );
    }

    #[test]
    fn test_stray_brace_reports_offset() {
        assert_eq!(lex("STATE { broken"), Err(6));
    }
}

//! Syntax tree of a scenario file

use super::lexer::Span;

/// A node with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A bare word or a quoted string
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Word(String),
    Quoted(String),
}

impl Atom {
    pub fn text(&self) -> &str {
        match self {
            Atom::Word(s) | Atom::Quoted(s) => s,
        }
    }

    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Atom::Word(w) if w == word)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub atoms: Vec<Spanned<Atom>>,
    pub span: Span,
}

impl Line {
    /// Keyword the line starts with
    pub fn keyword(&self) -> Option<&str> {
        match self.atoms.first().map(|a| &a.node) {
            Some(Atom::Word(w)) => Some(w),
            _ => None,
        }
    }
}

/// `DEFINE <header...>` followed by its property lines
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub header: Vec<Spanned<Atom>>,
    pub lines: Vec<Line>,
    pub span: Span,
}

impl Definition {
    /// Object type, e.g. `PLATFORM`
    pub fn object_type(&self) -> Option<&str> {
        match self.header.first().map(|a| &a.node) {
            Some(Atom::Word(w)) => Some(w),
            _ => None,
        }
    }

    /// First quoted string of the header
    pub fn name(&self) -> Option<&Spanned<Atom>> {
        self.header.iter().find(|a| matches!(a.node, Atom::Quoted(_)))
    }

    /// First property line starting with `keyword`
    pub fn property(&self, keyword: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.keyword() == Some(keyword))
    }
}

/// A parsed scenario file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrbFile {
    /// Lines before the first definition (`BATCH_MODE`, `VERSION`, ...)
    pub settings: Vec<Line>,
    pub definitions: Vec<Definition>,
}

impl OrbFile {
    pub fn setting(&self, keyword: &str) -> Option<&Line> {
        self.settings.iter().find(|l| l.keyword() == Some(keyword))
    }

    /// Definitions of one object type, in file order
    pub fn definitions_of<'a>(
        &'a self,
        object_type: &'a str,
    ) -> impl Iterator<Item = &'a Definition> + 'a {
        self.definitions
            .iter()
            .filter(move |d| d.object_type() == Some(object_type))
    }
}

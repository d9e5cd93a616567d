//! The token definition for datasource field keys.

/// A token is a single unit of a field key, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Literals
    Number(&'a str), // A run of ASCII digits, kept as text

    // Separators
    Underscore, // _
    Or,         // "OR" between two field ids

    // Suffix keywords
    Input0,   // "input0"
    Input1,   // "input1"
    Operator, // "operator"

    // Special
    Illegal, // Anything the field-key grammar does not know
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

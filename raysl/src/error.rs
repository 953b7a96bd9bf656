use std::fmt;

use thiserror::Error;

/// A location in a source file, used to anchor diagnostics to the
/// offending character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub source_name: String,
    pub line: u32,
    pub col: u32,
}

impl SourceLocation {
    pub fn new(source_name: impl Into<String>, line: u32, col: u32) -> Self {
        SourceLocation { source_name: source_name.into(), line, col }
    }

    /// The synthetic location used for command-line overrides, which may
    /// be shadowed by a script-level `SET` of the same identifier.
    pub fn command_line() -> Self {
        SourceLocation::new("<command-line>", 0, 0)
    }

    pub fn is_command_line(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source_name, self.line, self.col)
    }
}

/// Every error the lexer/parser/interpreter can raise, each carrying the
/// location of the offending token and, where useful, a highlight length
/// for the caret underline.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{loc}: unexpected character {found:?}")]
    BadCharacter { loc: SourceLocation, found: char },

    #[error("{loc}: unfinished string or math expression")]
    UnfinishedExpression { loc: SourceLocation },

    #[error("{loc}: invalid number literal {text:?}")]
    InvalidNumber { loc: SourceLocation, text: String },

    #[error("{loc}: expected {expected}, found {found}")]
    WrongTokenType { loc: SourceLocation, expected: String, found: String },

    #[error("{loc}: invalid symbol {found:?}")]
    InvalidSymbol { loc: SourceLocation, found: char },

    #[error("{loc}: {name:?} is not a known literal type")]
    InvalidType { loc: SourceLocation, name: String },

    #[error("{loc}: {name:?} is not a known command")]
    InvalidCommand { loc: SourceLocation, name: String },

    #[error("{loc}: unknown keyword {keyword:?} for {context}")]
    InvalidKeyword { loc: SourceLocation, keyword: String, context: String },

    #[error("{loc}: undefined identifier {name:?}")]
    UndefinedIdentifier { loc: SourceLocation, name: String },

    #[error("{loc}: {name:?} has type {found}, expected {expected}")]
    WrongValueType { loc: SourceLocation, name: String, expected: String, found: String },

    #[error("{loc}: expected {expected} elements, found {found}")]
    InvalidSize { loc: SourceLocation, expected: usize, found: usize },

    #[error("{loc}: invalid expression: {reason}")]
    InvalidExpression { loc: SourceLocation, reason: String },

    #[error("{loc}: could not load file {path:?}: {reason}")]
    InvalidFilePath { loc: SourceLocation, path: String, reason: String },

    #[error("{loc}: identifier {name:?} is already defined at {previous}")]
    IdentifierRedefinition { loc: SourceLocation, name: String, previous: SourceLocation },

    #[error("{loc}: {field} was already set by USING at {previous}")]
    SettingRedefinition { loc: SourceLocation, field: String, previous: SourceLocation },

    #[error("{loc}: {source}")]
    ShapeAlgebra { loc: SourceLocation, source: ShapeAlgebraError },
}

impl SourceError {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            SourceError::BadCharacter { loc, .. }
            | SourceError::UnfinishedExpression { loc }
            | SourceError::InvalidNumber { loc, .. }
            | SourceError::WrongTokenType { loc, .. }
            | SourceError::InvalidSymbol { loc, .. }
            | SourceError::InvalidType { loc, .. }
            | SourceError::InvalidCommand { loc, .. }
            | SourceError::InvalidKeyword { loc, .. }
            | SourceError::UndefinedIdentifier { loc, .. }
            | SourceError::WrongValueType { loc, .. }
            | SourceError::InvalidSize { loc, .. }
            | SourceError::InvalidExpression { loc, .. }
            | SourceError::InvalidFilePath { loc, .. }
            | SourceError::IdentifierRedefinition { loc, .. }
            | SourceError::SettingRedefinition { loc, .. }
            | SourceError::ShapeAlgebra { loc, .. } => loc,
        }
    }

    /// Render this error with the offending source line underlined by a
    /// caret, the shape every lexer/parser error in this crate uses for
    /// user-facing diagnostics.
    pub fn pretty_print(&self, source: &str) -> String {
        let loc = self.loc();
        let line_text = source.lines().nth((loc.line.saturating_sub(1)) as usize).unwrap_or("");
        let caret_col = loc.col.saturating_sub(1) as usize;
        let caret = format!("{}^", " ".repeat(caret_col));

        format!("{self}\n{line_text}\n{caret}")
    }
}

/// Precondition violation inside the CSG interval algebra: an odd-length
/// hit list, or a non-closed shape (Plane) used as a CSG operand. These
/// are programmer errors, never user-facing unless the interpreter has a
/// bug.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeAlgebraError {
    #[error("shape produced an odd number of ray intersections: {0}")]
    OddHitCount(usize),

    #[error("Plane cannot be used as a CSG operand (not a closed shape)")]
    NonClosedOperand,
}

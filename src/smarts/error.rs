use std::fmt;

/// Broad classification of a SMARTS compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmartsErrorKind {
    /// The text does not follow the SMARTS grammar.
    Syntax,
    /// The text parses but describes something that cannot be matched.
    Semantics,
}

/// Error produced when compiling a SMARTS pattern.
///
/// `pos` and `len` locate the offending span in characters, so the error can
/// be shown under the pattern with [`SmartsError::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartsError {
    pub kind: SmartsErrorKind,
    pub message: String,
    pub pos: usize,
    pub len: usize,
}

impl SmartsError {
    pub fn syntax(message: impl Into<String>, pos: usize, len: usize) -> Self {
        Self {
            kind: SmartsErrorKind::Syntax,
            message: message.into(),
            pos,
            len,
        }
    }

    pub fn semantics(message: impl Into<String>, pos: usize, len: usize) -> Self {
        Self {
            kind: SmartsErrorKind::Semantics,
            message: message.into(),
            pos,
            len,
        }
    }

    /// Shifts the span by `offset`, used when a nested pattern fails.
    pub(crate) fn offset(mut self, offset: usize) -> Self {
        self.pos += offset;
        self
    }

    /// Renders `text` with a caret line under the offending span:
    ///
    /// ```text
    /// SyntaxError: unclosed bracket atom
    /// C[CH3
    ///  ^^^^
    /// ```
    pub fn render(&self, text: &str) -> String {
        let kind = match self.kind {
            SmartsErrorKind::Syntax => "SyntaxError",
            SmartsErrorKind::Semantics => "SemanticsError",
        };
        let carets = "^".repeat(self.len.max(1));
        format!("{kind}: {}\n{text}\n{}{carets}", self.message, " ".repeat(self.pos))
    }
}

impl fmt::Display for SmartsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.pos)
    }
}

impl std::error::Error for SmartsError {}

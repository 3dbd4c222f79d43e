use thiserror::Error;

/// Error produced when spec, version or range text falls outside the grammar.
///
/// `position` is a byte offset into the text handed to the outermost parser,
/// so errors raised while parsing a nested version range still point into the
/// original match spec string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid spec at position {position}: {reason}")]
pub struct ParseError {
    pub position: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(position: usize, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }

    /// Move the error position by `offset` bytes.
    pub(crate) fn shifted(mut self, offset: usize) -> Self {
        self.position += offset;
        self
    }
}

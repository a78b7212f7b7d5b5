use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DialectError {
    #[error("Unterminated string literal starting at byte {0}")]
    UnterminatedLiteral(usize),
    #[error("Unterminated quoted identifier starting at byte {0}")]
    UnterminatedIdentifier(usize),
}

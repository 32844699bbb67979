//! Error types for filament.
//!
//! The only fallible surface is expression parsing. `compile` never
//! propagates these errors (it degrades to a no-op accessor); `try_compile`
//! exposes them so callers can report why a binding evaluates to nothing.

use thiserror::Error;

/// Errors produced by the expression tokenizer and parser.
///
/// Offsets are byte offsets into the trimmed expression text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar {
        ch: char,
        offset: usize,
    },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString {
        offset: usize,
    },

    #[error("unterminated template interpolation starting at offset {offset}")]
    UnterminatedInterpolation {
        offset: usize,
    },

    #[error("expected {expected} at offset {offset}")]
    UnexpectedToken {
        expected: String,
        offset: usize,
    },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("trailing input at offset {offset}")]
    TrailingInput {
        offset: usize,
    },

    #[error("expression nesting exceeds limit of {limit}")]
    NestingTooDeep {
        limit: usize,
    },
}

/// Result type alias for expression parsing.
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_char_message() {
        let err = ParseError::UnexpectedChar { ch: '#', offset: 3 };
        let msg = format!("{err}");
        assert!(msg.contains('#'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_unterminated_string_message() {
        let err = ParseError::UnterminatedString { offset: 0 };
        assert!(format!("{err}").contains("unterminated string"));
    }

    #[test]
    fn test_nesting_message() {
        let err = ParseError::NestingTooDeep { limit: 64 };
        assert!(format!("{err}").contains("64"));
    }
}

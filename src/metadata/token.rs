//! Metadata tokens.
//!
//! A token is a 32-bit reference into the metadata tables: the high byte names the table,
//! the low 24 bits are the 1-based row index. Tokens show up in IL code, in signature
//! blobs (compressed) and in the CLR header entry point.

use std::fmt;

/// A metadata token (table id in the high byte, row id in the low 24 bits).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Create a new token from its raw value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Create a token from a table id and a row id.
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw token value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The table this token points into.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The 1-based row this token points at.
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// A token with row 0 refers to nothing.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts() {
        let token = Token::new(0x0600_0001);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 1);
        assert_eq!(Token::from_parts(0x06, 1), token);
        assert_eq!(Token::from_parts(0x02, 0x0100_0005).row(), 5);
    }

    #[test]
    fn null_tokens() {
        assert!(Token::new(0).is_null());
        assert!(Token::new(0x0200_0000).is_null());
        assert!(!Token::new(0x0200_0001).is_null());
    }

    #[test]
    fn formatting() {
        let token = Token(0x0600_0001);
        assert_eq!(format!("{token}"), "0x06000001");

        let debug_str = format!("{token:?}");
        assert!(debug_str.contains("table: 0x06"));
        assert!(debug_str.contains("row: 1"));
    }
}

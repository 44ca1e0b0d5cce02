//! Identifiers: book types, ISBNs, book copies and students.
//!
//! ISBNs look like `B-0042`: the leading letter is the book type and the
//! four digits identify the title. A copy of that title is `B-0042-03`,
//! where the suffix is the 1-based per-ISBN sequence number assigned when
//! the inventory is loaded.

use std::{fmt, str::FromStr};

use crate::errors::ProtocolError;

/// Book category. Fixed when a copy is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BookType {
    /// Reference books: reading room only.
    A,
    /// Ordinary loan books: at most one held per student.
    B,
    /// Multi-copy loan books: at most one copy per ISBN per student.
    C,
}

impl BookType {
    /// All book types, in protocol order.
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    /// Parse the single-letter type code.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            _ => None,
        }
    }

    /// The single-letter type code.
    pub fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }

    /// Whether copies of this type may leave the library with a user.
    pub fn is_lendable(self) -> bool {
        self != Self::A
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Title identifier, e.g. `C-0007`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Isbn {
    book_type: BookType,
    number: u16,
}

impl Isbn {
    /// Largest title number representable in the four-digit field.
    pub const MAX_NUMBER: u16 = 9999;

    /// Create an ISBN. Returns `None` if `number` does not fit four digits.
    pub fn new(book_type: BookType, number: u16) -> Option<Self> {
        (number <= Self::MAX_NUMBER).then_some(Self { book_type, number })
    }

    /// Book type encoded in the ISBN.
    pub fn book_type(&self) -> BookType {
        self.book_type
    }

    /// Numeric title part.
    pub fn number(&self) -> u16 {
        self.number
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}", self.book_type.letter(), self.number)
    }
}

impl FromStr for Isbn {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidIdentifier { kind: "ISBN", value: s.to_string() };

        let (type_part, number_part) = s.split_once('-').ok_or_else(invalid)?;
        let mut letters = type_part.chars();
        let book_type = match (letters.next(), letters.next()) {
            (Some(letter), None) => BookType::from_letter(letter).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };

        if number_part.len() != 4 || !number_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let number = number_part.parse().map_err(|_| invalid())?;

        Ok(Self { book_type, number })
    }
}

/// Physical copy identifier, e.g. `C-0007-02`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookCopyId {
    isbn: Isbn,
    seq: u32,
}

impl BookCopyId {
    /// Identifier of the `seq`-th copy (1-based) of `isbn`.
    pub fn new(isbn: Isbn, seq: u32) -> Self {
        Self { isbn, seq }
    }

    /// Title this copy belongs to.
    pub fn isbn(&self) -> Isbn {
        self.isbn
    }

    /// Book type of the copy.
    pub fn book_type(&self) -> BookType {
        self.isbn.book_type()
    }

    /// Per-ISBN sequence number.
    pub fn seq(&self) -> u32 {
        self.seq
    }
}

impl fmt::Display for BookCopyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.isbn, self.seq)
    }
}

impl FromStr for BookCopyId {
    type Err = ProtocolError;

    /// Parses the canonical form only: `B-0001-1` is rejected because the
    /// SUT must echo the identifier exactly as the library assigned it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ProtocolError::InvalidIdentifier { kind: "book copy id", value: s.to_string() };

        let (isbn_part, seq_part) = s.rsplit_once('-').ok_or_else(invalid)?;
        let isbn: Isbn = isbn_part.parse().map_err(|_| invalid())?;
        if seq_part.is_empty() || !seq_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let seq = seq_part.parse().map_err(|_| invalid())?;

        let id = Self { isbn, seq };
        if id.to_string() != s {
            return Err(invalid());
        }
        Ok(id)
    }
}

/// Student identifier. Any non-empty token without whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StudentId(String);

impl StudentId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StudentId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(ProtocolError::InvalidIdentifier { kind: "student id", value: s.to_string() });
        }
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isbn_parses_canonical_form() {
        let isbn: Isbn = "B-0042".parse().unwrap();
        assert_eq!(isbn.book_type(), BookType::B);
        assert_eq!(isbn.number(), 42);
        assert_eq!(isbn.to_string(), "B-0042");
    }

    #[test]
    fn isbn_rejects_bad_shapes() {
        for bad in ["B0042", "D-0001", "B-042", "B-00421", "AB-0001", "B-00x1", ""] {
            assert!(bad.parse::<Isbn>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn copy_id_requires_canonical_sequence() {
        let id: BookCopyId = "C-0007-02".parse().unwrap();
        assert_eq!(id.isbn().to_string(), "C-0007");
        assert_eq!(id.seq(), 2);

        assert!("C-0007-2".parse::<BookCopyId>().is_err());
        assert!("C-0007-".parse::<BookCopyId>().is_err());
        assert!("C-0007".parse::<BookCopyId>().is_err());
    }

    #[test]
    fn copy_id_allows_wide_sequences() {
        let id = BookCopyId::new("A-0001".parse().unwrap(), 123);
        assert_eq!(id.to_string(), "A-0001-123");
        assert_eq!("A-0001-123".parse::<BookCopyId>().unwrap(), id);
    }

    #[test]
    fn student_id_rejects_whitespace() {
        assert!("23370001".parse::<StudentId>().is_ok());
        assert!("".parse::<StudentId>().is_err());
        assert!("a b".parse::<StudentId>().is_err());
    }
}

//! Places a book copy can be.

use std::{fmt, str::FromStr};

use crate::errors::ProtocolError;

/// Location of a book copy.
///
/// Displayed (and parsed) using the protocol's short codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    /// Ordinary bookshelf (`bs`).
    Bookshelf,
    /// Hot bookshelf for in-demand titles (`hbs`).
    HotBookshelf,
    /// Borrow/return office (`bro`).
    BorrowReturnOffice,
    /// Appointment office, where ordered copies wait for pickup (`ao`).
    AppointmentOffice,
    /// Reading room (`rr`).
    ReadingRoom,
    /// With a student (`user`).
    User,
}

impl Location {
    /// Locations the library itself may move books between during a tidy.
    pub const TIDY: [Self; 5] = [
        Self::Bookshelf,
        Self::HotBookshelf,
        Self::BorrowReturnOffice,
        Self::AppointmentOffice,
        Self::ReadingRoom,
    ];

    /// Protocol short code.
    pub fn short_code(self) -> &'static str {
        match self {
            Self::Bookshelf => "bs",
            Self::HotBookshelf => "hbs",
            Self::BorrowReturnOffice => "bro",
            Self::AppointmentOffice => "ao",
            Self::ReadingRoom => "rr",
            Self::User => "user",
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bookshelf => "bookshelf",
            Self::HotBookshelf => "hot_bookshelf",
            Self::BorrowReturnOffice => "borrow_return_office",
            Self::AppointmentOffice => "appointment_office",
            Self::ReadingRoom => "reading_room",
            Self::User => "user",
        }
    }

    /// Either of the two open shelves, from which users take books.
    pub fn is_shelf(self) -> bool {
        matches!(self, Self::Bookshelf | Self::HotBookshelf)
    }

    /// Whether a tidy move may name this location.
    pub fn is_tidy(self) -> bool {
        self != Self::User
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_code())
    }
}

impl FromStr for Location {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bs" => Ok(Self::Bookshelf),
            "hbs" => Ok(Self::HotBookshelf),
            "bro" => Ok(Self::BorrowReturnOffice),
            "ao" => Ok(Self::AppointmentOffice),
            "rr" => Ok(Self::ReadingRoom),
            "user" => Ok(Self::User),
            other => Err(ProtocolError::UnknownLocation(other.to_string())),
        }
    }
}

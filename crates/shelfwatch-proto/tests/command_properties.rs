//! Property tests for command and response line handling.

use chrono::NaiveDate;
use proptest::prelude::*;
use shelfwatch_proto::{
    ActionResponse, BookCopyId, BookType, Command, Isbn, Location, MoveLine, StudentId,
};

fn arbitrary_isbn() -> impl Strategy<Value = Isbn> {
    (prop_oneof![Just(BookType::A), Just(BookType::B), Just(BookType::C)], 0u16..=9999)
        .prop_map(|(book_type, number)| Isbn::new(book_type, number).unwrap())
}

fn arbitrary_copy() -> impl Strategy<Value = BookCopyId> {
    (arbitrary_isbn(), 1u32..200).prop_map(|(isbn, seq)| BookCopyId::new(isbn, seq))
}

fn arbitrary_student() -> impl Strategy<Value = StudentId> {
    "[0-9a-zA-Z_]{1,10}".prop_map(|s| s.parse().unwrap())
}

fn arbitrary_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::TimeDelta::days(offset)
    })
}

fn arbitrary_command() -> impl Strategy<Value = Command> {
    (arbitrary_date(), arbitrary_student(), arbitrary_isbn(), arbitrary_copy(), 0u8..10).prop_map(
        |(date, student, isbn, copy, kind)| match kind {
            0 => Command::Open { date },
            1 => Command::Close { date },
            2 => Command::Borrow { date, student, isbn },
            3 => Command::Return { date, student, copy },
            4 => Command::Order { date, student, isbn },
            5 => Command::Pick { date, student, isbn },
            6 => Command::Read { date, student, isbn },
            7 => Command::Restore { date, student, copy },
            8 => Command::QueryTrace { date, student, copy },
            _ => Command::QueryCredit { date, student },
        },
    )
}

#[test]
fn prop_commands_reparse_to_themselves() {
    proptest!(|(cmd in arbitrary_command())| {
        let line = cmd.to_string();
        let reparsed: Command = line.parse().expect("formatted command should parse");
        prop_assert_eq!(&reparsed, &cmd);
        prop_assert_eq!(reparsed.response_shape(), cmd.response_shape());
    });
}

#[test]
fn prop_move_lines_with_reservation_target_ao_only() {
    proptest!(|(
        date in arbitrary_date(),
        copy in arbitrary_copy(),
        from_idx in 0usize..5,
        to_idx in 0usize..5,
        student in arbitrary_student(),
    )| {
        let from = Location::TIDY[from_idx];
        let to = Location::TIDY[to_idx];
        let reserved_for = (to == Location::AppointmentOffice).then_some(student);
        let mv = MoveLine { date, copy, from, to, reserved_for };

        let parsed: MoveLine = mv.to_string().parse().expect("formatted move should parse");
        prop_assert_eq!(parsed, mv);
    });
}

#[test]
fn prop_garbage_is_never_an_accept() {
    proptest!(|(noise in "[a-z \\[\\]0-9-]{0,40}")| {
        // Random text almost never forms a valid action line; when it does
        // not, it must be classified as malformed rather than accepted.
        if let ActionResponse::Accepted(line) = ActionResponse::parse(&noise) {
            prop_assert!(noise.contains("[accept]"), "accepted without [accept]: {line:?}");
        }
    });
}

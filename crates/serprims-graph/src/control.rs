//! Handle, type code, and control code constants.
//!
//! Every object reference on the wire is one `i32` word:
//! - `0` is null
//! - `1` (RESET) and `2` (CLEAR) are control codes
//! - `3..` are handles of previously written objects
//! - words with the top bit set carry a type code and open a new object

use serprims_transport::PrimitiveKind;

/// Null reference.
pub const NUL: i32 = 0;

/// Control code: drop all handles, keep type codes.
pub const RESET: i32 = 1;

/// Control code: drop all handles and type codes.
pub const CLEAR: i32 = 2;

/// First handle assigned after a stream start, RESET, or CLEAR.
pub const FIRST_HANDLE: i32 = 3;

/// Top bit marking a type word.
pub const TYPE_BIT: i32 = i32::MIN;

/// Reserved type code of reference arrays.
pub const REF_ARRAY_CODE: i32 = 0;

/// First type code assigned to named types; codes below are reserved.
pub const FIRST_DYNAMIC_CODE: i32 = 1 + PrimitiveKind::COUNT as i32;

/// Reserved type code of primitive arrays of `kind`.
pub const fn array_code(kind: PrimitiveKind) -> i32 {
    1 + kind.index() as i32
}

/// Element kind for a reserved primitive-array code.
pub fn array_kind(code: i32) -> Option<PrimitiveKind> {
    if code < 1 {
        return None;
    }
    PrimitiveKind::from_index((code - 1) as usize)
}

pub const fn type_word(code: i32) -> i32 {
    code | TYPE_BIT
}

/// One decoded reference word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    Null,
    Handle(i32),
    Type(i32),
}

impl Word {
    /// Classify a word that is not a control code.
    pub fn decode(word: i32) -> Option<Word> {
        match word {
            NUL => Some(Word::Null),
            w if w & TYPE_BIT != 0 => Some(Word::Type(w & !TYPE_BIT)),
            w if w >= FIRST_HANDLE => Some(Word::Handle(w)),
            _ => None,
        }
    }
}

/// A table invalidation waiting to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    #[default]
    Idle,
    ResetPending,
    ClearPending,
}

impl ControlState {
    /// Merge a newly requested RESET or CLEAR. CLEAR wins.
    pub fn request(self, clear: bool) -> Self {
        match (self, clear) {
            (_, true) | (ControlState::ClearPending, false) => ControlState::ClearPending,
            _ => ControlState::ResetPending,
        }
    }

    /// Code to emit before the next word, if any.
    pub fn code(self) -> Option<i32> {
        match self {
            ControlState::Idle => None,
            ControlState::ResetPending => Some(RESET),
            ControlState::ClearPending => Some(CLEAR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_codes() {
        assert_eq!(array_code(PrimitiveKind::Boolean), 1);
        assert_eq!(array_code(PrimitiveKind::Double), 8);
        assert_eq!(FIRST_DYNAMIC_CODE, 9);
        assert_eq!(array_kind(4), Some(PrimitiveKind::Short));
        assert_eq!(array_kind(REF_ARRAY_CODE), None);
        assert_eq!(array_kind(9), None);
    }

    #[test]
    fn word_classification() {
        assert_eq!(Word::decode(0), Some(Word::Null));
        assert_eq!(Word::decode(3), Some(Word::Handle(3)));
        assert_eq!(Word::decode(type_word(12)), Some(Word::Type(12)));
        assert_eq!(Word::decode(type_word(REF_ARRAY_CODE)), Some(Word::Type(0)));
        assert_eq!(type_word(0) as u32, 0x8000_0000);
        assert_eq!(Word::decode(RESET), None);
        assert_eq!(Word::decode(CLEAR), None);
    }

    #[test]
    fn clear_supersedes_reset() {
        let state = ControlState::Idle.request(false);
        assert_eq!(state.code(), Some(RESET));
        let state = state.request(true);
        assert_eq!(state.code(), Some(CLEAR));
        assert_eq!(state.request(false), ControlState::ClearPending);
        assert_eq!(ControlState::default().code(), None);
    }
}

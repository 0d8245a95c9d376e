//! Label reconciliation.
//!
//! The server caches object pools by structure and localization label. When
//! it answers a label request the client compares the answer against its own
//! pool to decide between reusing, replacing or uploading.

use serde::Serialize;

use crate::codec::{Label, LABEL_LENGTH};

/// Label the server sends when it holds no pool for this client
pub const LABEL_NOT_PRESENT: Label = [0xFF; LABEL_LENGTH];

/// Outcome of comparing a received label with the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    /// Server holds exactly our pool
    Match,
    /// Server holds no pool
    NotPresent,
    /// Server holds a different pool
    Mismatch,
}

/// Compare a received label with the stored one.
///
/// Equality wins over the not-present marker, so a stored label of all
/// `0xFF` matches itself.
pub fn compare(received: &Label, stored: &Label) -> LabelMatch {
    if received == stored {
        LabelMatch::Match
    } else if *received == LABEL_NOT_PRESENT {
        LabelMatch::NotPresent
    } else {
        LabelMatch::Mismatch
    }
}

/// Compare when there may be no stored label (no pool configured)
pub fn compare_optional(received: &Label, stored: Option<&Label>) -> LabelMatch {
    match stored {
        Some(stored) => compare(received, stored),
        None if *received == LABEL_NOT_PRESENT => LabelMatch::NotPresent,
        None => LabelMatch::Mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORED: Label = *b"I++1.0 ";

    #[test]
    fn test_match() {
        assert_eq!(compare(&STORED, &STORED), LabelMatch::Match);
    }

    #[test]
    fn test_not_present() {
        assert_eq!(compare(&LABEL_NOT_PRESENT, &STORED), LabelMatch::NotPresent);
    }

    #[test]
    fn test_mismatch() {
        let received = [0x04, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(compare(&received, &STORED), LabelMatch::Mismatch);
    }

    #[test]
    fn test_no_stored_label() {
        assert_eq!(
            compare_optional(&LABEL_NOT_PRESENT, None),
            LabelMatch::NotPresent
        );
        assert_eq!(compare_optional(&STORED, None), LabelMatch::Mismatch);
        assert_eq!(compare_optional(&STORED, Some(&STORED)), LabelMatch::Match);
    }
}

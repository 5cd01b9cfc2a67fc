//! Validation status and its roll-up ordering.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Outcome of a validator, or the roll-up of several.
///
/// Serialized as the integer code the REST backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Never run
    #[default]
    Uninitialized,
    Passing,
    Failing,
    /// The validator itself raised
    Exception,
    /// Reserved; no roll-up produces it
    Warning,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Uninitialized,
        Status::Passing,
        Status::Failing,
        Status::Exception,
        Status::Warning,
    ];

    /// Integer code on the wire.
    pub const fn code(self) -> u8 {
        match self {
            Status::Uninitialized => 0,
            Status::Passing => 1,
            Status::Failing => 2,
            Status::Exception => 3,
            Status::Warning => 4,
        }
    }

    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Status::Uninitialized),
            1 => Some(Status::Passing),
            2 => Some(Status::Failing),
            3 => Some(Status::Exception),
            4 => Some(Status::Warning),
            _ => None,
        }
    }

    /// Rank used when comparing statuses for roll-up.
    ///
    /// Exception > Failing > Warning > Passing > Uninitialized.
    pub const fn severity(self) -> u8 {
        match self {
            Status::Uninitialized => 0,
            Status::Passing => 1,
            Status::Warning => 2,
            Status::Failing => 3,
            Status::Exception => 4,
        }
    }

    /// Compare two statuses by severity.
    pub fn cmp_severity(self, other: Status) -> Ordering {
        self.severity().cmp(&other.severity())
    }

    /// The more severe of the two.
    pub fn dominant(self, other: Status) -> Status {
        if other.cmp_severity(self) == Ordering::Greater {
            other
        } else {
            self
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Uninitialized => "UNINITIALIZED",
            Status::Passing => "PASSING",
            Status::Failing => "FAILING",
            Status::Exception => "EXCEPTION",
            Status::Warning => "WARNING",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u64::deserialize(deserializer)?;
        Status::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown status code {code}")))
    }
}

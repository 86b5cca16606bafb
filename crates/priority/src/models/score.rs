use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use super::sanitize;
use crate::error::{Error, ErrorKind};

/// How well the material was recalled during a revision, worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Score {
    /// (1) Barely remembered anything.
    Hard = 1,
    /// (2) Remembered most of it.
    Okay = 2,
    /// (3) Remembered everything.
    Easy = 3,
}
impl Score {
    pub const ALL: [Score; 3] = [Score::Hard, Score::Okay, Score::Easy];

    /// Numeric value as stored by the record store (1 to 3).
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Returns the display label for the score.
    pub fn label(&self) -> &'static str {
        match self {
            Score::Hard => "Hard",
            Score::Okay => "Okay",
            Score::Easy => "Easy",
        }
    }
}
impl TryFrom<u8> for Score {
    type Error = Error;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Hard,
            2 => Self::Okay,
            3 => Self::Easy,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "score",
                value: format!("score out of range: {value}"),
            }),
        })
    }
}
impl TryFrom<i64> for Score {
    type Error = Error;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(v) => v.try_into(),
            Err(_) => exn::bail!(ErrorKind::ParseError {
                field: "score",
                value: format!("score out of range: {value}"),
            }),
        }
    }
}
impl FromStr for Score {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "1" | "hard" => Self::Hard,
            "2" | "okay" | "ok" => Self::Okay,
            "3" | "easy" => Self::Easy,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "score",
                value: format!("unknown score: {s}"),
            }),
        })
    }
}
impl Display for Score {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.label())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Score {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::{Error as _, Unexpected};
        let value = u8::deserialize(deserializer)?;
        Score::try_from(value)
            .map_err(|_| D::Error::invalid_value(Unexpected::Unsigned(u64::from(value)), &"a score of 1, 2 or 3"))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Score {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

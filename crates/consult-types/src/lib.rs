//! Validated value types shared across the consultation workflow crates.
//!
//! These types guarantee their invariants at construction time so the rest of
//! the system never has to re-check them: a patient display name is never
//! blank, a blood pressure reading always has a systolic and a diastolic
//! component.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated value types.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace.
    #[error("text cannot be empty")]
    Empty,
    /// The input was not a `systolic/diastolic` blood pressure reading.
    #[error("blood pressure must be written as systolic/diastolic, e.g. 120/80: {0}")]
    MalformedBloodPressure(String),
    /// A blood pressure component was outside the plausible range.
    #[error("blood pressure component {0} is out of range (1..=400)")]
    BloodPressureOutOfRange(u16),
}

/// A string type that guarantees non-empty content.
///
/// Input is trimmed during construction; a trimmed-empty input is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A blood pressure reading in the conventional `systolic/diastolic` form.
///
/// The reading is kept as two validated components; no unit conversion is
/// performed. Serializes as the conventional string form (`"120/80"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloodPressure {
    systolic: u16,
    diastolic: u16,
}

impl BloodPressure {
    /// Creates a reading from its two components.
    ///
    /// # Errors
    ///
    /// Returns `TextError::BloodPressureOutOfRange` if either component is
    /// zero or above 400 mmHg.
    pub fn new(systolic: u16, diastolic: u16) -> Result<Self, TextError> {
        for component in [systolic, diastolic] {
            if component == 0 || component > 400 {
                return Err(TextError::BloodPressureOutOfRange(component));
            }
        }
        Ok(Self {
            systolic,
            diastolic,
        })
    }

    pub fn systolic(&self) -> u16 {
        self.systolic
    }

    pub fn diastolic(&self) -> u16 {
        self.diastolic
    }
}

impl FromStr for BloodPressure {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TextError::MalformedBloodPressure(s.to_owned());
        let (sys, dia) = s.trim().split_once('/').ok_or_else(malformed)?;
        let systolic: u16 = sys.trim().parse().map_err(|_| malformed())?;
        let diastolic: u16 = dia.trim().parse().map_err(|_| malformed())?;
        Self::new(systolic, diastolic)
    }
}

impl fmt::Display for BloodPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.systolic, self.diastolic)
    }
}

impl serde::Serialize for BloodPressure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for BloodPressure {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//! Spreadsheet column indices and their A1 letter names.

use crate::prelude::*;

/// Number of columns addressable with up to three letters (`A` through `ZZZ`).
const CAPACITY: u32 = 26 + 26 * 26 + 26 * 26 * 26;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("empty column name")]
    Empty,
    #[error("invalid character {0:?} in column name")]
    InvalidChar(char),
    #[error("column {0:?} is beyond the sheet's column capacity")]
    OutOfRange(String),
}

/// A zero-based column index, displayed as its A1 letters (`A` = 0, `Z` = 25, `AA` = 26).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub(crate) struct Column(u16);

impl Column {
    pub(crate) fn index(self) -> u32 {
        self.0.into()
    }

    /// All columns from `self` through `end`, inclusive. Empty if `end` is left of `self`.
    pub(crate) fn through(self, end: Self) -> impl Iterator<Item = Self> {
        (self.0..=end.0).map(Self)
    }
}

impl FromStr for Column {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.is_empty() { return Err(Error::Empty) }
        let mut number = 0u32;
        for c in s.chars() {
            let c = c.to_ascii_uppercase();
            if !c.is_ascii_uppercase() { return Err(Error::InvalidChar(c)) }
            number = number.checked_mul(26)
                .and_then(|number| number.checked_add(u32::from(c as u8 - b'A') + 1))
                .filter(|&number| number <= CAPACITY)
                .ok_or_else(|| Error::OutOfRange(s.to_owned()))?;
        }
        Ok(Self((number - 1) as u16))
    }
}

impl TryFrom<String> for Column {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Error> {
        s.parse()
    }
}

impl From<Column> for String {
    fn from(column: Column) -> Self {
        column.to_string()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut number = self.index() + 1;
        let mut letters = Vec::with_capacity(3);
        while number > 0 {
            letters.push((b'A' + ((number - 1) % 26) as u8) as char);
            number = (number - 1) / 26;
        }
        for letter in letters.into_iter().rev() {
            write!(f, "{letter}")?;
        }
        Ok(())
    }
}

/// Errors from the library.
use core::{error, fmt};

/// Errors returned by this library.
///
/// Each variant carries the integer status code of the table, success being `0` and not represented here.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum TableError {
    /// The bucket the key hashes to cannot hold any more entries.
    Full = 1,
    /// The key is not in the table.
    NotFound = 2,
    /// The key is in the table, but associated to a different value.
    NotEqual = 3,
    /// The key is already associated to a value.
    AlreadySet = 4,
}

impl TableError {
    /// The status code of a successful operation.
    pub const SUCCESS: u8 = 0;

    /// Returns the status code of this error, never `SUCCESS`.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns the status code of a result, `SUCCESS` for any `Ok`.
    pub fn code_of<T>(result: &Result<T, TableError>) -> u8 {
        match result {
            Ok(_) => Self::SUCCESS,
            Err(error) => error.code(),
        }
    }
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let message = match self {
            Self::Full => "bucket cannot hold more entries",
            Self::NotFound => "key not found in table",
            Self::NotEqual => "value is not equal to the one in the table",
            Self::AlreadySet => "a value is already set for the key",
        };

        f.write_str(message)
    }
}

impl error::Error for TableError {}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::string::ToString;

    #[test]
    fn codes() {
        assert_eq!(0, TableError::SUCCESS);
        assert_eq!(1, TableError::Full.code());
        assert_eq!(2, TableError::NotFound.code());
        assert_eq!(3, TableError::NotEqual.code());
        assert_eq!(4, TableError::AlreadySet.code());
    }

    #[test]
    fn code_of() {
        assert_eq!(0, TableError::code_of(&Ok::<_, TableError>(())));
        assert_eq!(4, TableError::code_of(&Err::<(), _>(TableError::AlreadySet)));
    }

    #[test]
    fn display() {
        assert_eq!("key not found in table", TableError::NotFound.to_string());
    }
} // mod tests

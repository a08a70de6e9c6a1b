/*!
# Unified Error Type

This module provides a unified error enum that consolidates all bandtangle
error kinds for consistent handling at the crate boundary.

Only structural problems surface as errors: inconsistent input shapes, values
outside their documented ranges, bad parameters, and I/O failures. Numeric
edge cases inside the solver (singular fits, unresolvable degeneracies,
exhausted band slots) degrade to well-defined defaults and are reported
through logging instead.
*/

use std::error::Error;
use std::fmt;

/// Unified error type for all bandtangle operations.
#[derive(Debug)]
pub enum BandtangleError {
    /// Dimensions of the input arrays are mutually inconsistent.
    InputShape(String),

    /// An input value lies outside its documented range.
    InputRange(String),

    /// Invalid argument or parameter.
    InvalidArgument(String),

    /// I/O error while reading or writing a data file.
    Io(String),
}

impl BandtangleError {
    /// Creates an input shape error.
    pub fn input_shape(message: impl Into<String>) -> Self {
        BandtangleError::InputShape(message.into())
    }

    /// Creates an input range error.
    pub fn input_range(message: impl Into<String>) -> Self {
        BandtangleError::InputRange(message.into())
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        BandtangleError::InvalidArgument(message.into())
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        BandtangleError::Io(message.into())
    }
}

impl fmt::Display for BandtangleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BandtangleError::InputShape(msg) => write!(f, "Inconsistent input shape: {}", msg),
            BandtangleError::InputRange(msg) => write!(f, "Input value out of range: {}", msg),
            BandtangleError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            BandtangleError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl Error for BandtangleError {}

impl From<std::io::Error> for BandtangleError {
    fn from(err: std::io::Error) -> Self {
        BandtangleError::Io(err.to_string())
    }
}

impl From<ndarray_npy::ReadNpyError> for BandtangleError {
    fn from(err: ndarray_npy::ReadNpyError) -> Self {
        BandtangleError::Io(err.to_string())
    }
}

impl From<ndarray_npy::WriteNpyError> for BandtangleError {
    fn from(err: ndarray_npy::WriteNpyError) -> Self {
        BandtangleError::Io(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BandtangleError>;

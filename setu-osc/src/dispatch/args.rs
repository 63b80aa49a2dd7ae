//! Positional argument extraction for handlers

use super::HandlerError;
use crate::codec::OscType;

/// Fail with [`HandlerError::Arity`] unless at least `n` arguments are present
pub fn require(args: &[OscType], n: usize) -> Result<(), HandlerError> {
    if args.len() < n {
        return Err(HandlerError::Arity {
            expected: n,
            got: args.len(),
        });
    }
    Ok(())
}

pub fn arg(args: &[OscType], index: usize) -> Result<&OscType, HandlerError> {
    args.get(index).ok_or(HandlerError::Arity {
        expected: index + 1,
        got: args.len(),
    })
}

pub fn int(args: &[OscType], index: usize) -> Result<i64, HandlerError> {
    arg(args, index)?.as_int().ok_or(HandlerError::BadArgument {
        index,
        expected: "an integer",
    })
}

/// Non-negative integer usable as a collection index
pub fn index(args: &[OscType], index: usize) -> Result<usize, HandlerError> {
    usize::try_from(int(args, index)?).map_err(|_| HandlerError::BadArgument {
        index,
        expected: "a non-negative index",
    })
}

pub fn float(args: &[OscType], index: usize) -> Result<f64, HandlerError> {
    arg(args, index)?.as_float().ok_or(HandlerError::BadArgument {
        index,
        expected: "a number",
    })
}

pub fn string(args: &[OscType], index: usize) -> Result<&str, HandlerError> {
    arg(args, index)?.as_str().ok_or(HandlerError::BadArgument {
        index,
        expected: "a string",
    })
}

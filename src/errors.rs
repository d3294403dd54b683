//! Global error handling.
//!
//! Each sub-crate of the project defines its own error type. Their types
//! can be unified, for example in a driver's main function, when winding
//! results at the top-level.

use cn_dfa::errors::DfaError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`CairnError`].
pub type CairnResult<T> = Result<T, CairnError>;

/// The main error type for error winding at the top-level.
#[derive(Debug, Error)]
pub enum CairnError {
    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Error that can be returned from [`cn_dfa`] functions.
    #[error(transparent)]
    Dfa(#[from] DfaError),
}

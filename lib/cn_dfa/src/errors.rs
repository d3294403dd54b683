//! Analysis core errors definition.

use thiserror::Error;

pub type DfaResult<T> = Result<T, DfaError>;

/// Fatal conditions of an analysis session.
///
/// Absences are not errors: lookups that can miss return an [`Option`]
/// instead. Lattice contract violations by a plug-in domain are asserted,
/// not propagated.
#[derive(Debug, Error)]
pub enum DfaError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("unknown analysis: {0}")]
    UnknownAnalysis(String),

    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    #[error("dependency cycle among analyses: {0}")]
    DependencyCycle(String),

    #[error("analysis `{analysis}` requires `{dependency}` to be enabled first")]
    MissingDependency {
        analysis: String,
        dependency: String,
    },

    #[error("function `{0}` has no body")]
    NoCode(String),
}

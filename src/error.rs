//! The engine's single error type. Every fallible operation in this crate
//! returns `Result<_, EngineError>` rather than panicking or asserting.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A caller named a dispatch target that the engine has no theory for.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// A caller tried to insert or delete directly into a table that is a
    /// view -- fully determined by rules, not writable from outside.
    #[error("forbidden mutation of view table `{0}`")]
    ForbiddenMutation(String),

    /// A query or explanation request doesn't have the shape its operation
    /// requires (e.g. `explain` given a non-ground or non-atomic formula).
    #[error("ill-formed query: {0}")]
    IllFormedQuery(String),

    /// A negated literal was evaluated with one or more of its variables
    /// still unbound -- negation-as-failure is only sound once every
    /// variable in the literal has a value.
    #[error("unsafe negation: {0} has unbound variables at evaluation time")]
    UnsafeNegation(String),

    /// A delta-rule or rule transformation step failed structurally (e.g. a
    /// rule body referencing a delta table that was never produced).
    #[error("compiler error: {0}")]
    CompilerError(String),

    /// A named but unimplemented operation was invoked (abduction).
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

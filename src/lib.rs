//! An incremental, proof-carrying Datalog core.
//!
//! Two evaluation strategies share one term/atom/rule model
//! (`datalog_syntax`): a [`materialized_theory::MaterializedRuleTheory`]
//! maintains a table bottom-up, incrementally, via delta rules and
//! reference-counted proofs, while a
//! [`nonrecursive_theory::NonrecursiveRuleTheory`] answers a query top-down
//! by SLD-style resolution, optionally delegating literals it doesn't define
//! to other theories it includes. [`dispatcher::Engine`] wires three such
//! theories together (`classification`, `service`, `action`) behind a single
//! named-target surface.

pub mod database;
pub mod delta_rule_theory;
pub mod dispatcher;
pub mod error;
pub mod materialized_theory;
pub mod nonrecursive_theory;
pub mod proof;
pub mod tracer;
pub mod unify;

pub use database::{Database, Event};
pub use dispatcher::{Compiler, Engine, ACTION_THEORY, CLASSIFICATION_THEORY, SERVICE_THEORY};
pub use error::EngineError;
pub use materialized_theory::MaterializedRuleTheory;
pub use nonrecursive_theory::{Included, NonrecursiveRuleTheory};
pub use proof::{Derivation, Proof, ProofSet, ProofTree};

pub use datalog_syntax::{
    var, AnonymousGroundAtom, Atom, DeltaRule, Formula, Rule, Term, TypedValue, Variable,
};

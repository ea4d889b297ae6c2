//! The façade a caller actually talks to: a handful of named theories,
//! reached by string target. Unknown targets and malformed requests are
//! surfaced as distinct `EngineError` kinds rather than panicking.

use crate::error::EngineError;
use crate::materialized_theory::MaterializedRuleTheory;
use crate::nonrecursive_theory::{Included, NonrecursiveRuleTheory};
use crate::proof::ProofTree;
use datalog_syntax::{Atom, Formula};
use std::cell::RefCell;
use std::rc::Rc;

pub const CLASSIFICATION_THEORY: &str = "classification";
pub const SERVICE_THEORY: &str = "service";
pub const ACTION_THEORY: &str = "action";

enum Theory {
    Materialized(Rc<RefCell<MaterializedRuleTheory>>),
    Nonrecursive(Rc<RefCell<NonrecursiveRuleTheory>>),
}

/// Something a `Compiler` hands the engine to load in bulk.
pub trait Compiler {
    fn compiled(&self) -> Result<Vec<Formula>, EngineError>;
}

/// Three theories wired the way a policy engine needs them: one
/// materialized `classification` theory that everything else can read from,
/// and two non-recursive theories (`service`, `action`) that include it.
pub struct Engine {
    classification: Rc<RefCell<MaterializedRuleTheory>>,
    service: Rc<RefCell<NonrecursiveRuleTheory>>,
    action: Rc<RefCell<NonrecursiveRuleTheory>>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let classification = Rc::new(RefCell::new(MaterializedRuleTheory::new()));

        let mut service_theory = NonrecursiveRuleTheory::new();
        service_theory.include(Included::Materialized(Rc::downgrade(&classification)));
        let service = Rc::new(RefCell::new(service_theory));

        let mut action_theory = NonrecursiveRuleTheory::new();
        action_theory.include(Included::Materialized(Rc::downgrade(&classification)));
        let action = Rc::new(RefCell::new(action_theory));

        Engine {
            classification,
            service,
            action,
        }
    }

    fn target(&self, name: Option<&str>) -> Result<Theory, EngineError> {
        match name.unwrap_or(CLASSIFICATION_THEORY) {
            CLASSIFICATION_THEORY => Ok(Theory::Materialized(self.classification.clone())),
            SERVICE_THEORY => Ok(Theory::Nonrecursive(self.service.clone())),
            ACTION_THEORY => Ok(Theory::Nonrecursive(self.action.clone())),
            other => Err(EngineError::UnknownTarget(other.to_string())),
        }
    }

    pub fn insert(&self, formula: Formula, target: Option<&str>) -> Result<(), EngineError> {
        match self.target(target)? {
            Theory::Materialized(theory) => theory.borrow_mut().insert(formula),
            Theory::Nonrecursive(theory) => theory.borrow_mut().insert(formula),
        }
    }

    pub fn delete(&self, formula: Formula, target: Option<&str>) -> Result<(), EngineError> {
        match self.target(target)? {
            Theory::Materialized(theory) => theory.borrow_mut().delete(formula),
            Theory::Nonrecursive(theory) => theory.borrow_mut().delete(formula),
        }
    }

    pub fn select(
        &self,
        formula: &Formula,
        target: Option<&str>,
        max_answers: Option<usize>,
    ) -> Result<Vec<Atom>, EngineError> {
        match self.target(target)? {
            Theory::Materialized(theory) => theory.borrow().select(formula),
            Theory::Nonrecursive(theory) => theory.borrow().select(formula, max_answers),
        }
    }

    pub fn contains(&self, atom: &Atom, target: Option<&str>) -> Result<bool, EngineError> {
        match self.target(target)? {
            Theory::Materialized(theory) => Ok(theory.borrow().contains(atom)),
            Theory::Nonrecursive(theory) => Ok(!theory
                .borrow()
                .select(&Formula::Atom(atom.clone()), Some(1))?
                .is_empty()),
        }
    }

    /// Only a materialized theory carries proofs to explain; asking a
    /// non-recursive theory to explain a derivation is a `NotImplemented`
    /// error rather than a silent empty tree.
    pub fn explain(&self, tuple: &Atom, target: Option<&str>) -> Result<ProofTree, EngineError> {
        match self.target(target)? {
            Theory::Materialized(theory) => theory.borrow().explain(tuple),
            Theory::Nonrecursive(_) => Err(EngineError::NotImplemented(
                "explain is only available for materialized theories".into(),
            )),
        }
    }

    /// Loads every formula a `Compiler` produces into `target`, in order.
    /// Stops at the first error, leaving earlier formulas already applied --
    /// matches the engine's general stance that a failed operation doesn't
    /// roll back the ones that already succeeded.
    pub fn load(&self, compiler: &dyn Compiler, target: Option<&str>) -> Result<(), EngineError> {
        for formula in compiler.compiled()? {
            self.insert(formula, target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_syntax::{var, Rule, Term};

    #[test]
    fn unknown_target_is_rejected() {
        let engine = Engine::new();
        let atom = Atom::positive("p", vec![Term::from(1i64)]);
        let result = engine.insert(Formula::Atom(atom), Some("nope"));
        assert!(matches!(result, Err(EngineError::UnknownTarget(_))));
    }

    #[test]
    fn default_target_is_classification() {
        let engine = Engine::new();
        let atom = Atom::positive("p", vec![Term::from(1i64)]);
        engine.insert(Formula::Atom(atom.clone()), None).unwrap();
        assert!(engine.contains(&atom, Some(CLASSIFICATION_THEORY)).unwrap());
    }

    #[test]
    fn service_theory_reads_classification_through_includes() {
        let engine = Engine::new();
        engine
            .insert(
                Formula::Atom(Atom::positive("approved", vec![Term::from("alice")])),
                Some(CLASSIFICATION_THEORY),
            )
            .unwrap();
        engine
            .insert(
                Formula::Rule(Rule::new(
                    Atom::positive("may_act", vec![var("x")]),
                    vec![Atom::positive("approved", vec![var("x")])],
                )),
                Some(SERVICE_THEORY),
            )
            .unwrap();

        let query = Atom::positive("may_act", vec![Term::from("alice")]);
        assert!(engine.contains(&query, Some(SERVICE_THEORY)).unwrap());
    }

    #[test]
    fn explain_is_not_implemented_for_nonrecursive_theories() {
        let engine = Engine::new();
        let atom = Atom::positive("p", vec![Term::from(1i64)]);
        engine.insert(Formula::Atom(atom.clone()), Some(SERVICE_THEORY)).unwrap();
        let result = engine.explain(&atom, Some(SERVICE_THEORY));
        assert!(matches!(result, Err(EngineError::NotImplemented(_))));
    }
}

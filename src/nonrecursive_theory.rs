//! Top-down, SLD-resolution-style evaluation: rules are tried left to right,
//! a literal is resolved by unifying it against each matching rule's head in
//! a fresh variable scope, and the rule's body is prepended to whatever
//! literals remain to be proved.
//!
//! A literal whose table isn't defined locally isn't automatically a
//! failure: this theory may *include* other theories (by weak, non-owning
//! reference), and an undefined literal is resolved by asking each included
//! theory in turn for ground answers, folded back into the unifier as
//! ordinary bindings.

use crate::error::EngineError;
use crate::materialized_theory::MaterializedRuleTheory;
use crate::tracer::Tracer;
use crate::unify::{BiUnifier, Resolved, Scope, Undo, TOP_SCOPE};
use ahash::HashMap;
use datalog_syntax::{Atom, Formula, Rule, Term, TypedValue};
use std::cell::RefCell;
use std::rc::Weak;

/// A weak, by-identity reference to a theory this one may delegate literal
/// resolution to -- a lookup path, never shared ownership.
pub enum Included {
    Materialized(Weak<RefCell<MaterializedRuleTheory>>),
    Nonrecursive(Weak<RefCell<NonrecursiveRuleTheory>>),
}

fn parse_placeholder(name: &str) -> Option<(Scope, String)> {
    let (scope, var) = name.split_once('#')?;
    Some((Scope(scope.parse().ok()?), var.to_string()))
}

impl Included {
    /// Resolves `lit` against the included theory, returning one `Undo` per
    /// alternative ground answer, already folded into `unifier`.
    fn resolve(&self, lit: &Atom, unifier: &mut BiUnifier, scope: Scope) -> Result<Vec<Undo>, EngineError> {
        let probe = unifier.ground_partial(lit, scope);
        let bindings = match self {
            Included::Materialized(weak) => {
                let theory = weak.upgrade().ok_or_else(|| {
                    EngineError::IllFormedQuery("included theory no longer exists".into())
                })?;
                theory.borrow().select_plain(&probe)?
            }
            Included::Nonrecursive(weak) => {
                let theory = weak.upgrade().ok_or_else(|| {
                    EngineError::IllFormedQuery("included theory no longer exists".into())
                })?;
                theory.borrow().select_plain(&probe)?
            }
        };

        let mut undos = Vec::new();
        for binding in bindings {
            let mut undo = Vec::new();
            let mut ok = true;
            for arg in &probe.arguments {
                if let Term::Variable(placeholder) = arg {
                    let Some((target_scope, target_var)) = parse_placeholder(placeholder) else {
                        continue;
                    };
                    match binding.get(placeholder) {
                        Some(value) => unifier.bind_const(target_scope, &target_var, value.clone(), &mut undo),
                        None => {
                            ok = false;
                            break;
                        }
                    }
                }
            }
            if ok {
                undos.push(undo);
            } else {
                unifier.undo_all(undo);
            }
        }
        Ok(undos)
    }
}

struct TopDownCaller {
    query: Atom,
    query_scope: Scope,
    max_answers: Option<usize>,
    answers: Vec<Atom>,
}

impl TopDownCaller {
    fn new(query: Atom, query_scope: Scope, max_answers: Option<usize>) -> Self {
        TopDownCaller {
            query,
            query_scope,
            max_answers,
            answers: Vec::new(),
        }
    }

    /// Records one answer, returning whether `max_answers` has been reached.
    fn record(&mut self, unifier: &BiUnifier) -> bool {
        self.answers.push(unifier.ground_partial(&self.query, self.query_scope));
        match self.max_answers {
            Some(limit) => self.answers.len() >= limit,
            None => false,
        }
    }
}

#[derive(Default)]
pub struct NonrecursiveRuleTheory {
    contents: HashMap<String, Vec<Rule>>,
    includes: Vec<Included>,
    tracer: Tracer,
}

impl NonrecursiveRuleTheory {
    pub fn new() -> Self {
        NonrecursiveRuleTheory::default()
    }

    pub fn trace_table(&mut self, table: impl Into<String>) {
        self.tracer.trace_table(table);
    }

    /// Registers a weak reference to another theory for lookup delegation.
    pub fn include(&mut self, theory: Included) {
        self.includes.push(theory);
    }

    /// Inserts a rule, or a bare atom as the rule it's shorthand for: a fact
    /// is a rule with an empty body.
    pub fn insert(&mut self, formula: Formula) -> Result<(), EngineError> {
        let rule = match formula {
            Formula::Atom(atom) => Rule::fact(atom),
            Formula::Rule(rule) => rule,
        };
        self.contents
            .entry(rule.head.table.clone())
            .or_default()
            .push(rule);
        Ok(())
    }

    pub fn delete(&mut self, formula: Formula) -> Result<(), EngineError> {
        let rule = match formula {
            Formula::Atom(atom) => Rule::fact(atom),
            Formula::Rule(rule) => rule,
        };
        if let Some(rules) = self.contents.get_mut(&rule.head.table) {
            rules.retain(|existing| existing != &rule);
        }
        Ok(())
    }

    /// Ground answers to `formula`, stopping early once `max_answers` have
    /// been found, if given.
    pub fn select(&self, formula: &Formula, max_answers: Option<usize>) -> Result<Vec<Atom>, EngineError> {
        let (literals, answer) = match formula {
            Formula::Atom(atom) => (vec![atom.clone()], atom.clone()),
            Formula::Rule(rule) => (rule.body.clone(), rule.head.clone()),
        };
        let mut unifier = BiUnifier::new();
        let goals: Vec<(Atom, Scope)> = literals.into_iter().map(|atom| (atom, TOP_SCOPE)).collect();
        let mut caller = TopDownCaller::new(answer, TOP_SCOPE, max_answers);
        self.solve(&goals, &mut unifier, &mut caller, 0)?;
        Ok(caller.answers)
    }

    /// The binding-level primitive an *including* theory uses: every
    /// binding under which `atom` can be proved true by this theory.
    pub fn select_plain(&self, atom: &Atom) -> Result<Vec<HashMap<String, TypedValue>>, EngineError> {
        let grounded = self.select(&Formula::Atom(atom.clone()), None)?;
        let mut out = Vec::with_capacity(grounded.len());
        for ground in grounded {
            let mut binding = HashMap::default();
            for (arg, value) in atom.arguments.iter().zip(ground.arguments.iter()) {
                if let (Term::Variable(name), Term::Constant(c)) = (arg, value) {
                    binding.insert(name.clone(), c.clone());
                }
            }
            out.push(binding);
        }
        Ok(out)
    }

    fn exists(&self, atom: &Atom, unifier: &mut BiUnifier, scope: Scope, depth: usize) -> Result<bool, EngineError> {
        let mut caller = TopDownCaller::new(atom.clone(), scope, Some(1));
        self.solve(&[(atom.clone(), scope)], unifier, &mut caller, depth)?;
        Ok(!caller.answers.is_empty())
    }

    /// Proves `goals[0]` and, on success, continues with `goals[1..]`.
    /// Returns whether the caller is now satisfied; every binding this call
    /// contributes is undone before returning, on every path.
    fn solve(
        &self,
        goals: &[(Atom, Scope)],
        unifier: &mut BiUnifier,
        caller: &mut TopDownCaller,
        depth: usize,
    ) -> Result<bool, EngineError> {
        let Some(((lit, scope), rest)) = goals.split_first() else {
            return Ok(caller.record(unifier));
        };
        let scope = *scope;

        if lit.is_negated() {
            let unbound: Vec<&str> = lit
                .variables()
                .into_iter()
                .filter(|name| matches!(unifier.apply(scope, name), Resolved::Var(_, _)))
                .collect();
            if !unbound.is_empty() {
                return Err(EngineError::UnsafeNegation(format!("{:?}", lit)));
            }
            let positive = Atom {
                table: lit.table.clone(),
                arguments: lit.arguments.clone(),
                negated: false,
            };
            if self.exists(&positive, unifier, scope, depth + 1)? {
                return Ok(false);
            }
            return self.solve(rest, unifier, caller, depth + 1);
        }

        self.tracer
            .log(&lit.table, depth, format!("call {:?}", unifier.ground_partial(lit, scope)));

        if let Some(rules) = self.contents.get(&lit.table) {
            for rule in rules {
                let rule_scope = unifier.fresh_scope();
                let Some(undo) = unifier.bi_unify_atoms(&rule.head, rule_scope, lit, scope) else {
                    continue;
                };
                let mut combined: Vec<(Atom, Scope)> =
                    rule.body.iter().cloned().map(|atom| (atom, rule_scope)).collect();
                combined.extend_from_slice(rest);
                let finished = self.solve(&combined, unifier, caller, depth + 1)?;
                unifier.undo_all(undo);
                if finished {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        for included in &self.includes {
            for undo in included.resolve(lit, unifier, scope)? {
                let finished = self.solve(rest, unifier, caller, depth + 1)?;
                unifier.undo_all(undo);
                if finished {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

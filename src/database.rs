//! The ground fact store: every table is a set of tuples, each tuple
//! carrying the `ProofSet` that justifies it.

use crate::error::EngineError;
use crate::proof::{Derivation, Proof, ProofSet, ProofTree};
use ahash::HashMap;
use datalog_syntax::{AnonymousGroundAtom, Atom, Formula, Term, TypedValue};
use indexmap::IndexMap;
use indexmap::IndexSet;

/// One pending change to the database: insert or delete `values` from
/// `table`, justified by `proofs`. Queued by a `MaterializedRuleTheory` and
/// drained in FIFO order.
#[derive(Clone, Debug)]
pub struct Event {
    pub table: String,
    pub values: AnonymousGroundAtom,
    pub proofs: ProofSet,
    pub insert: bool,
}

impl Event {
    pub fn insert(table: impl Into<String>, values: AnonymousGroundAtom, proofs: ProofSet) -> Self {
        Event {
            table: table.into(),
            values,
            proofs,
            insert: true,
        }
    }

    pub fn delete(table: impl Into<String>, values: AnonymousGroundAtom, proofs: ProofSet) -> Self {
        Event {
            table: table.into(),
            values,
            proofs,
            insert: false,
        }
    }
}

fn is_subset(sub: &ProofSet, sup: &ProofSet) -> bool {
    sub.iter().all(|proof| sup.contains(proof))
}

/// Matches a single ground tuple against a (positive) atom with no inherited
/// binding.
pub fn match_tuple(atom: &Atom, tuple: &AnonymousGroundAtom) -> Option<HashMap<String, TypedValue>> {
    matches_single(atom, tuple, &HashMap::default())
}

fn matches_single(
    atom: &Atom,
    tuple: &AnonymousGroundAtom,
    binding: &HashMap<String, TypedValue>,
) -> Option<HashMap<String, TypedValue>> {
    if atom.arguments.len() != tuple.len() {
        return None;
    }
    let mut extended = binding.clone();
    for (arg, value) in atom.arguments.iter().zip(tuple.iter()) {
        match arg {
            Term::Constant(c) => {
                if c != value {
                    return None;
                }
            }
            Term::Variable(name) => match extended.get(name) {
                Some(existing) if existing != value => return None,
                Some(_) => {}
                None => {
                    extended.insert(name.clone(), value.clone());
                }
            },
        }
    }
    Some(extended)
}

fn atom_to_values(atom: &Atom) -> Result<AnonymousGroundAtom, EngineError> {
    atom.arguments
        .iter()
        .map(|term| match term {
            Term::Constant(c) => Ok(c.clone()),
            Term::Variable(_) => Err(EngineError::IllFormedQuery(format!(
                "{:?} is not ground",
                atom
            ))),
        })
        .collect()
}

#[derive(Default)]
pub struct Database {
    tables: HashMap<String, IndexMap<AnonymousGroundAtom, ProofSet, ahash::RandomState>>,
}

impl Database {
    pub fn new() -> Self {
        Database {
            tables: HashMap::default(),
        }
    }

    pub fn contains(&self, table: &str, values: &AnonymousGroundAtom) -> bool {
        self.tables
            .get(table)
            .map(|t| t.contains_key(values))
            .unwrap_or(false)
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    /// Whether applying `event` would change anything. A delete only
    /// applies when every proof it names is actually held -- partial-subset
    /// deletes are treated as a noop rather than removing the subset that
    /// does match.
    pub fn is_noop(&self, event: &Event) -> bool {
        let existing = self.tables.get(&event.table).and_then(|t| t.get(&event.values));
        match (event.insert, existing) {
            (true, None) => false,
            (true, Some(current)) => is_subset(&event.proofs, current),
            (false, None) => true,
            (false, Some(current)) => !is_subset(&event.proofs, current),
        }
    }

    /// Applies `event`, returning whether the database actually changed.
    pub fn apply(&mut self, event: &Event) -> bool {
        if event.insert {
            self.insert(&event.table, event.values.clone(), &event.proofs)
        } else {
            self.delete(&event.table, &event.values, &event.proofs)
        }
    }

    pub fn insert(&mut self, table: &str, values: AnonymousGroundAtom, proofs: &ProofSet) -> bool {
        let entry = self
            .tables
            .entry(table.to_string())
            .or_default()
            .entry(values)
            .or_insert_with(ProofSet::new);
        let mut changed = false;
        for proof in proofs.iter() {
            if entry.add(proof.clone()) {
                changed = true;
            }
        }
        changed
    }

    pub fn delete(&mut self, table: &str, values: &AnonymousGroundAtom, proofs: &ProofSet) -> bool {
        let Some(relation) = self.tables.get_mut(table) else {
            return false;
        };
        let Some(existing) = relation.get_mut(values) else {
            return false;
        };
        let removed = existing.remove_all(proofs);
        if existing.is_empty() {
            relation.shift_remove(values);
        }
        removed > 0
    }

    /// Every full binding extending `binding` under which (positive) `atom`
    /// matches some stored tuple.
    pub fn matches_atom(
        &self,
        atom: &Atom,
        binding: &HashMap<String, TypedValue>,
    ) -> Vec<HashMap<String, TypedValue>> {
        let Some(table) = self.tables.get(&atom.table) else {
            return Vec::new();
        };
        table
            .keys()
            .filter_map(|tuple| matches_single(atom, tuple, binding))
            .collect()
    }

    /// Every full binding extending `binding` that satisfies `literals[index..]`.
    pub fn top_down_eval(
        &self,
        literals: &[Atom],
        index: usize,
        binding: &HashMap<String, TypedValue>,
    ) -> Result<Vec<HashMap<String, TypedValue>>, EngineError> {
        if index >= literals.len() {
            return Ok(vec![binding.clone()]);
        }
        let literal = &literals[index];
        if literal.is_negated() {
            let unbound: Vec<&str> = literal
                .variables()
                .into_iter()
                .filter(|name| !binding.contains_key(*name))
                .collect();
            if !unbound.is_empty() {
                return Err(EngineError::UnsafeNegation(format!("{:?}", literal)));
            }
            let positive = Atom {
                table: literal.table.clone(),
                arguments: literal.arguments.clone(),
                negated: false,
            };
            if !self.matches_atom(&positive, binding).is_empty() {
                return Ok(Vec::new());
            }
            return self.top_down_eval(literals, index + 1, binding);
        }

        let mut results = Vec::new();
        for candidate in self.matches_atom(literal, binding) {
            results.extend(self.top_down_eval(literals, index + 1, &candidate)?);
        }
        Ok(results)
    }

    /// Ground atoms satisfying `formula`: for a bare atom, every matching
    /// stored tuple; for a rule, the head instantiated under every binding
    /// that proves the body against this database.
    pub fn select(&self, formula: &Formula) -> Result<Vec<Atom>, EngineError> {
        let (literals, answer) = match formula {
            Formula::Atom(atom) => (vec![atom.clone()], atom.clone()),
            Formula::Rule(rule) => (rule.body.clone(), rule.head.clone()),
        };
        let binding = HashMap::default();
        let bindings = self.top_down_eval(&literals, 0, &binding)?;
        let mut seen = IndexSet::<Atom, ahash::RandomState>::default();
        for binding in &bindings {
            seen.insert(answer.plug_partial(binding));
        }
        Ok(seen.into_iter().collect())
    }

    /// The proof tree justifying `tuple`: one `Derivation` per proof on
    /// file, each recursively justified down through its rule instance's
    /// body. `tuple` must already be ground.
    pub fn explain(&self, tuple: &Atom) -> Result<ProofTree, EngineError> {
        if !tuple.is_ground() {
            return Err(EngineError::IllFormedQuery(format!(
                "{:?} is not ground",
                tuple
            )));
        }
        self.explain_aux(tuple)
    }

    fn explain_aux(&self, tuple: &Atom) -> Result<ProofTree, EngineError> {
        let values = atom_to_values(tuple)?;
        let proofset = self.tables.get(&tuple.table).and_then(|t| t.get(&values));
        let mut derivations = Vec::new();
        if let Some(proofs) = proofset {
            for proof in proofs.iter() {
                derivations.push(self.derivation_for(proof)?);
            }
        }
        Ok(ProofTree {
            tuple: tuple.clone(),
            derivations,
        })
    }

    fn derivation_for(&self, proof: &Proof) -> Result<Derivation, EngineError> {
        let binding = proof.binding_map();
        let grounded_rule = proof.rule.plug_instance(&binding);
        let mut premises = Vec::with_capacity(grounded_rule.body.len());
        for body_atom in &grounded_rule.body {
            // A negated literal isn't a stored tuple to recurse into -- its
            // absence is the justification, so it's a leaf.
            if body_atom.is_negated() {
                premises.push(ProofTree {
                    tuple: body_atom.clone(),
                    derivations: Vec::new(),
                });
            } else {
                premises.push(self.explain_aux(body_atom)?);
            }
        }
        Ok(Derivation {
            rule: grounded_rule,
            premises,
        })
    }
}

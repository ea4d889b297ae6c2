//! Proof bookkeeping: why a tuple is in the database. A tuple exists iff its
//! `ProofSet` is non-empty, so multiply-derived facts survive the deletion
//! of any one justification.

use ahash::HashMap;
use datalog_syntax::{Rule, TypedValue};
use indexmap::IndexSet;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Proof {
    pub binding: Vec<(String, TypedValue)>,
    pub rule: Rule,
}

impl Proof {
    /// The trivial proof a base (non-derived) fact carries: the empty
    /// binding under a synthetic fact-rule whose head is the tuple itself.
    pub fn base(rule: Rule) -> Self {
        Proof {
            binding: Vec::new(),
            rule,
        }
    }

    pub fn new(mut binding: Vec<(String, TypedValue)>, rule: Rule) -> Self {
        binding.sort_by(|a, b| a.0.cmp(&b.0));
        Proof { binding, rule }
    }

    pub fn binding_map(&self) -> HashMap<String, TypedValue> {
        self.binding.iter().cloned().collect()
    }
}

/// A deduplicated multiset of justifications for one tuple. Order-preserving
/// (`IndexSet`) so `explain` reports proofs in the order they were derived.
#[derive(Clone, Debug, Default)]
pub struct ProofSet {
    inner: IndexSet<Proof, ahash::RandomState>,
}

impl ProofSet {
    pub fn new() -> Self {
        ProofSet {
            inner: IndexSet::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Adds `proof`, returning `true` if it was new (the tuple's existence
    /// didn't depend on it before).
    pub fn add(&mut self, proof: Proof) -> bool {
        self.inner.insert(proof)
    }

    /// Removes every proof in `proofs` that this set actually holds. Returns
    /// the number removed, so callers (`Database::delete`) can tell a
    /// complete removal from a partial one.
    pub fn remove_all(&mut self, proofs: &ProofSet) -> usize {
        let mut removed = 0;
        for proof in &proofs.inner {
            if self.inner.shift_remove(proof) {
                removed += 1;
            }
        }
        removed
    }

    pub fn contains(&self, proof: &Proof) -> bool {
        self.inner.contains(proof)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proof> {
        self.inner.iter()
    }
}

impl FromIterator<Proof> for ProofSet {
    fn from_iter<I: IntoIterator<Item = Proof>>(iter: I) -> Self {
        ProofSet {
            inner: iter.into_iter().collect(),
        }
    }
}

/// The explanation a caller gets back from `explain`: a tree whose root is
/// the requested tuple, justified by one or more alternative derivations,
/// each recursively justified down to base facts (leaves with no premises).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofTree {
    pub tuple: datalog_syntax::Atom,
    pub derivations: Vec<Derivation>,
}

/// One way `tuple` was derived: the ground rule instance that produced it,
/// and a sub-tree for each premise in that instance's body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Derivation {
    pub rule: Rule,
    pub premises: Vec<ProofTree>,
}

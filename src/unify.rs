//! Bidirectional unification with explicit, undoable bindings. `Scope` tags
//! each atom entering unification so that `?x` in one rule's head doesn't
//! collide with `?x` in another's; `BiUnifier` binds `(scope, variable)`
//! pairs rather than bare names. Every binding made is recorded in an `Undo`
//! list the caller passes to `undo_all` to backtrack exactly.

use ahash::HashMap;
use datalog_syntax::{Atom, Term, TypedValue};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Scope(pub u64);

pub const TOP_SCOPE: Scope = Scope(0);

#[derive(Clone, Debug)]
enum Binding {
    Const(TypedValue),
    Var(Scope, String),
}

/// What a variable currently resolves to: either a constant, or -- if still
/// free -- the canonical `(scope, name)` pair that represents it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    Const(TypedValue),
    Var(Scope, String),
}

pub type Undo = Vec<(Scope, String)>;

#[derive(Default)]
pub struct BiUnifier {
    bindings: HashMap<(Scope, String), Binding>,
    next_scope: u64,
}

impl BiUnifier {
    pub fn new() -> Self {
        BiUnifier {
            bindings: HashMap::default(),
            next_scope: 1,
        }
    }

    /// Allocates a fresh scope, e.g. for a candidate rule's own head/body
    /// variables before unifying its head against the triggering literal.
    pub fn fresh_scope(&mut self) -> Scope {
        let scope = Scope(self.next_scope);
        self.next_scope += 1;
        scope
    }

    /// Follows `(scope, var)` through the binding chain to either a constant
    /// or the free variable at the end of the chain.
    pub fn apply(&self, scope: Scope, var: &str) -> Resolved {
        let mut current = (scope, var.to_string());
        loop {
            match self.bindings.get(&current) {
                None => return Resolved::Var(current.0, current.1),
                Some(Binding::Const(value)) => return Resolved::Const(value.clone()),
                Some(Binding::Var(s, v)) => current = (*s, v.clone()),
            }
        }
    }

    fn bind(&mut self, scope: Scope, var: String, target: Binding, undo: &mut Undo) {
        self.bindings.insert((scope, var.clone()), target);
        undo.push((scope, var));
    }

    /// Binds `(scope, var)` directly to `value`, skipping unification --
    /// used when a ground answer from an included theory needs to be folded
    /// back into an otherwise-free variable.
    pub fn bind_const(&mut self, scope: Scope, var: &str, value: TypedValue, undo: &mut Undo) {
        self.bind(scope, var.to_string(), Binding::Const(value), undo);
    }

    pub fn undo_all(&mut self, undo: Undo) {
        for key in undo {
            self.bindings.remove(&key);
        }
    }

    fn unify_terms(
        &mut self,
        t1: &Term,
        s1: Scope,
        t2: &Term,
        s2: Scope,
        undo: &mut Undo,
    ) -> bool {
        let r1 = match t1 {
            Term::Variable(v) => self.apply(s1, v),
            Term::Constant(c) => Resolved::Const(c.clone()),
        };
        let r2 = match t2 {
            Term::Variable(v) => self.apply(s2, v),
            Term::Constant(c) => Resolved::Const(c.clone()),
        };
        match (r1, r2) {
            (Resolved::Const(c1), Resolved::Const(c2)) => c1 == c2,
            (Resolved::Var(vs, vn), Resolved::Const(c))
            | (Resolved::Const(c), Resolved::Var(vs, vn)) => {
                self.bind(vs, vn, Binding::Const(c), undo);
                true
            }
            (Resolved::Var(vs1, vn1), Resolved::Var(vs2, vn2)) => {
                if vs1 == vs2 && vn1 == vn2 {
                    true
                } else {
                    self.bind(vs1, vn1, Binding::Var(vs2, vn2), undo);
                    true
                }
            }
        }
    }

    /// Unifies two atoms living in (possibly different) scopes. Returns the
    /// `Undo` covering every binding made on success, `None` (with nothing
    /// left behind) if the atoms' tables/arities mismatch or a term pair
    /// can't be unified.
    pub fn bi_unify_atoms(&mut self, a1: &Atom, s1: Scope, a2: &Atom, s2: Scope) -> Option<Undo> {
        if a1.table != a2.table || a1.arguments.len() != a2.arguments.len() {
            return None;
        }
        let mut undo = Vec::new();
        for (t1, t2) in a1.arguments.iter().zip(a2.arguments.iter()) {
            if !self.unify_terms(t1, s1, t2, s2, &mut undo) {
                self.undo_all(undo);
                return None;
            }
        }
        Some(undo)
    }

    /// Applies the current bindings to `atom` (in `scope`), producing a
    /// ground atom where possible; unresolved variables are renamed to a
    /// scope-qualified name rather than left bare, keeping them distinct
    /// from identically-named variables in other scopes.
    pub fn ground_partial(&self, atom: &Atom, scope: Scope) -> Atom {
        let arguments = atom
            .arguments
            .iter()
            .map(|arg| match arg {
                Term::Variable(v) => match self.apply(scope, v) {
                    Resolved::Const(c) => Term::Constant(c),
                    Resolved::Var(s, name) => Term::Variable(format!("{}#{}", s.0, name)),
                },
                Term::Constant(c) => Term::Constant(c.clone()),
            })
            .collect();
        Atom {
            table: atom.table.clone(),
            arguments,
            negated: atom.negated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_syntax::var;

    #[test]
    fn unifying_a_variable_with_a_constant_binds_it() {
        let mut u = BiUnifier::new();
        let a1 = Atom::positive("p", vec![var("x")]);
        let a2 = Atom::positive("p", vec![Term::from(1i64)]);
        let undo = u.bi_unify_atoms(&a1, TOP_SCOPE, &a2, TOP_SCOPE).unwrap();
        assert_eq!(u.apply(TOP_SCOPE, "x"), Resolved::Const(TypedValue::Int(1)));
        u.undo_all(undo);
        assert_eq!(u.apply(TOP_SCOPE, "x"), Resolved::Var(TOP_SCOPE, "x".into()));
    }

    #[test]
    fn mismatched_constants_fail_without_side_effects() {
        let mut u = BiUnifier::new();
        let a1 = Atom::positive("p", vec![Term::from(1i64)]);
        let a2 = Atom::positive("p", vec![Term::from(2i64)]);
        assert!(u.bi_unify_atoms(&a1, TOP_SCOPE, &a2, TOP_SCOPE).is_none());
        assert!(u.bindings.is_empty());
    }

    #[test]
    fn repeated_variable_in_one_atom_forces_consistency() {
        let mut u = BiUnifier::new();
        let a1 = Atom::positive("p", vec![var("x"), var("x")]);
        let a2 = Atom::positive("p", vec![Term::from(1i64), Term::from(1i64)]);
        assert!(u.bi_unify_atoms(&a1, TOP_SCOPE, &a2, TOP_SCOPE).is_some());

        let mut u2 = BiUnifier::new();
        let a3 = Atom::positive("p", vec![Term::from(1i64), Term::from(2i64)]);
        assert!(u2.bi_unify_atoms(&a1, TOP_SCOPE, &a3, TOP_SCOPE).is_none());
    }

    #[test]
    fn cross_scope_variable_to_variable_binding_chains() {
        let mut u = BiUnifier::new();
        let rule_scope = u.fresh_scope();
        let a1 = Atom::positive("p", vec![var("x")]);
        let a2 = Atom::positive("p", vec![var("y")]);
        u.bi_unify_atoms(&a1, rule_scope, &a2, TOP_SCOPE).unwrap();
        let mut undo = Vec::new();
        u.bind_const(TOP_SCOPE, "y", TypedValue::Int(7), &mut undo);
        assert_eq!(u.apply(rule_scope, "x"), Resolved::Const(TypedValue::Int(7)));
    }
}

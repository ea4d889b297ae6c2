//! The term/atom/rule model consumed from a compiler (out of scope for this
//! crate): variables, constants, atoms, and rules. This crate carries no
//! evaluation logic of its own -- it is the structured formula shape the
//! engine crate is built against.

use std::fmt::{Debug, Formatter};

#[derive(Eq, Ord, PartialEq, PartialOrd, Clone, Hash)]
pub enum TypedValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Debug for TypedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypedValue::Str(x) => x.fmt(f),
            TypedValue::Int(x) => x.fmt(f),
            TypedValue::Bool(x) => x.fmt(f),
        }
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::Str(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::Str(value.to_string())
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Int(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Bool(value)
    }
}

pub type Variable = String;

/// A term is either a symbolic placeholder (`Variable`) or a ground value
/// (`Constant`).
#[derive(Eq, PartialEq, Clone, Hash)]
pub enum Term {
    Variable(Variable),
    Constant(TypedValue),
}

impl Term {
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name.as_str()),
            Term::Constant(_) => None,
        }
    }
}

impl Debug for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Variable(x) => write!(f, "?{}", x),
            Term::Constant(x) => x.fmt(f),
        }
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::Constant(TypedValue::from(value))
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Constant(TypedValue::from(value))
    }
}

impl From<bool> for Term {
    fn from(value: bool) -> Self {
        Term::Constant(TypedValue::from(value))
    }
}

pub fn var(name: &str) -> Term {
    Term::Variable(name.to_string())
}

/// A ground tuple of values -- what a `DBTuple` stores and what a fully bound
/// `Atom` plugs down to.
pub type AnonymousGroundAtom = Vec<TypedValue>;

/// A predicate application: a table name applied to an ordered list of terms,
/// with an explicit sign so a literal can appear negated in a rule body.
#[derive(Eq, PartialEq, Clone, Hash)]
pub struct Atom {
    pub table: String,
    pub arguments: Vec<Term>,
    pub negated: bool,
}

impl Atom {
    pub fn positive(table: impl Into<String>, arguments: Vec<Term>) -> Self {
        Atom {
            table: table.into(),
            arguments,
            negated: false,
        }
    }

    pub fn negative(table: impl Into<String>, arguments: Vec<Term>) -> Self {
        Atom {
            table: table.into(),
            arguments,
            negated: true,
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_ground(&self) -> bool {
        self.arguments.iter().all(|arg| !arg.is_variable())
    }

    /// All distinct variable names occurring in this atom's arguments, in
    /// first-occurrence order.
    pub fn variables(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for arg in &self.arguments {
            if let Some(name) = arg.variable_name() {
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
        }
        seen
    }

    /// Applies `binding` (variable name -> constant) to this atom's
    /// arguments, returning the ground tuple of values. Panics if a variable
    /// argument is absent from `binding` -- callers only call `plug` once
    /// every variable in the atom is known to be bound.
    pub fn plug(&self, binding: &ahash::HashMap<String, TypedValue>) -> AnonymousGroundAtom {
        self.arguments
            .iter()
            .map(|arg| match arg {
                Term::Variable(name) => binding
                    .get(name)
                    .cloned()
                    .expect("plug requires every variable to be bound"),
                Term::Constant(value) => value.clone(),
            })
            .collect()
    }

    /// Like `plug`, but tolerant of a partial binding: variables absent from
    /// `binding` are left as-is rather than panicking. Used wherever a proof
    /// or an answer is rendered from a binding that may not cover every
    /// variable in scope (e.g. an `explain` proof tree over a rule whose head
    /// has variables not appearing in the triggering literal).
    pub fn plug_partial(&self, binding: &ahash::HashMap<String, TypedValue>) -> Atom {
        Atom {
            table: self.table.clone(),
            arguments: self
                .arguments
                .iter()
                .map(|arg| match arg {
                    Term::Variable(name) => match binding.get(name) {
                        Some(value) => Term::Constant(value.clone()),
                        None => arg.clone(),
                    },
                    Term::Constant(_) => arg.clone(),
                })
                .collect(),
            negated: self.negated,
        }
    }
}

impl Debug for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "not ")?;
        }
        write!(f, "{}(", &self.table)?;
        for (index, term) in self.arguments.iter().enumerate() {
            write!(f, "{:?}", term)?;
            if index < self.arguments.len() - 1 {
                write!(f, ", ")?;
            }
        }
        write!(f, ")")
    }
}

/// An implication: a positive head atom entailed by an ordered conjunction of
/// (possibly negated) body literals. Equality (and hence hashing) is
/// structural and order-sensitive on the body -- two rules with the same
/// literals in a different order are not equal.
#[derive(Eq, PartialEq, Clone, Hash)]
pub struct Rule {
    pub head: Atom,
    pub body: Vec<Atom>,
}

impl Rule {
    pub fn new(head: Atom, body: Vec<Atom>) -> Self {
        Rule { head, body }
    }

    pub fn fact(head: Atom) -> Self {
        Rule {
            head,
            body: Vec::new(),
        }
    }

    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// Renders a fully ground instance of this rule (head and every body
    /// literal) under `binding` -- the shape a `Proof`'s tree rendering needs:
    /// the rule that justifies a derived tuple, with its variables resolved
    /// to the constants that made it fire.
    pub fn plug_instance(&self, binding: &ahash::HashMap<String, TypedValue>) -> Rule {
        Rule {
            head: self.head.plug_partial(binding),
            body: self.body.iter().map(|atom| atom.plug_partial(binding)).collect(),
        }
    }
}

impl Debug for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} <- [", &self.head)?;
        for (index, atom) in self.body.iter().enumerate() {
            write!(f, "{:?}", atom)?;
            if index < self.body.len() - 1 {
                write!(f, ", ")?;
            }
        }
        write!(f, "]")
    }
}

/// A formula handed across the external interface: either a bare atom (a
/// fact, when ground) or a full rule.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
pub enum Formula {
    Atom(Atom),
    Rule(Rule),
}

impl Formula {
    pub fn is_atom(&self) -> bool {
        matches!(self, Formula::Atom(_))
    }
}

impl From<Atom> for Formula {
    fn from(value: Atom) -> Self {
        Formula::Atom(value)
    }
}

impl From<Rule> for Formula {
    fn from(value: Rule) -> Self {
        Formula::Rule(value)
    }
}

/// An incremental rewrite of a `Rule`: fires whenever `trigger` arrives as an
/// event. Equality is componentwise atom equality over trigger/head/body;
/// `origin` is excluded since it only matters for proof bookkeeping, not
/// delta-rule identity.
#[derive(Clone, Debug)]
pub struct DeltaRule {
    pub trigger: Atom,
    pub head: Atom,
    pub body: Vec<Atom>,
    pub origin: Rule,
}

impl PartialEq for DeltaRule {
    fn eq(&self, other: &Self) -> bool {
        self.trigger == other.trigger && self.head == other.head && self.body == other.body
    }
}

impl Eq for DeltaRule {}

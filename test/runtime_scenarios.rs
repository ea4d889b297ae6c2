//! End-to-end scenarios exercised against the public `Engine` surface.

use deductive_engine::{
    var, Atom, Engine, EngineError, Formula, Rule, Term, TypedValue, ACTION_THEORY,
    CLASSIFICATION_THEORY,
};
use pretty_assertions::assert_eq;

fn atom(table: &str, args: Vec<Term>) -> Atom {
    Atom::positive(table, args)
}

#[test]
fn base_fact_selects_and_explains_with_no_children() {
    let engine = Engine::new();
    engine
        .insert(Formula::Atom(atom("p", vec![Term::from(1i64)])), None)
        .unwrap();

    let answers = engine
        .select(&Formula::Atom(atom("p", vec![var("x")])), None, None)
        .unwrap();
    assert_eq!(answers, vec![atom("p", vec![Term::from(1i64)])]);

    let tree = engine
        .explain(&atom("p", vec![Term::from(1i64)]), None)
        .unwrap();
    assert_eq!(tree.tuple, atom("p", vec![Term::from(1i64)]));
    assert_eq!(tree.derivations.len(), 1);
    assert!(tree.derivations[0].premises.is_empty());
}

#[test]
fn single_rule_derivation_follows_its_base_fact() {
    let engine = Engine::new();
    engine
        .insert(
            Formula::Rule(Rule::new(
                atom("q", vec![var("x")]),
                vec![atom("p", vec![var("x")])],
            )),
            None,
        )
        .unwrap();
    engine
        .insert(Formula::Atom(atom("p", vec![Term::from(1i64)])), None)
        .unwrap();

    assert_eq!(
        engine
            .select(&Formula::Atom(atom("q", vec![var("x")])), None, None)
            .unwrap(),
        vec![atom("q", vec![Term::from(1i64)])]
    );

    engine
        .delete(Formula::Atom(atom("p", vec![Term::from(1i64)])), None)
        .unwrap();
    assert!(engine
        .select(&Formula::Atom(atom("q", vec![var("x")])), None, None)
        .unwrap()
        .is_empty());
}

#[test]
fn a_fact_with_two_derivations_survives_losing_one() {
    let engine = Engine::new();
    engine
        .insert(Formula::Atom(atom("p", vec![Term::from(1i64)])), None)
        .unwrap();
    engine
        .insert(Formula::Atom(atom("r", vec![Term::from(1i64)])), None)
        .unwrap();
    engine
        .insert(
            Formula::Rule(Rule::new(
                atom("q", vec![var("x")]),
                vec![atom("p", vec![var("x")])],
            )),
            None,
        )
        .unwrap();
    engine
        .insert(
            Formula::Rule(Rule::new(
                atom("q", vec![var("x")]),
                vec![atom("r", vec![var("x")])],
            )),
            None,
        )
        .unwrap();

    assert_eq!(
        engine
            .select(&Formula::Atom(atom("q", vec![var("x")])), None, None)
            .unwrap(),
        vec![atom("q", vec![Term::from(1i64)])]
    );

    engine
        .delete(Formula::Atom(atom("p", vec![Term::from(1i64)])), None)
        .unwrap();
    assert!(engine.contains(&atom("q", vec![Term::from(1i64)]), None).unwrap());

    engine
        .delete(Formula::Atom(atom("r", vec![Term::from(1i64)])), None)
        .unwrap();
    assert!(engine
        .select(&Formula::Atom(atom("q", vec![var("x")])), None, None)
        .unwrap()
        .is_empty());
}

#[test]
fn transitive_closure_recursion_tracks_insertion_and_deletion() {
    let engine = Engine::new();
    engine
        .insert(
            Formula::Rule(Rule::new(
                atom("tc", vec![var("x"), var("y")]),
                vec![atom("e", vec![var("x"), var("y")])],
            )),
            None,
        )
        .unwrap();
    engine
        .insert(
            Formula::Rule(Rule::new(
                atom("tc", vec![var("x"), var("y")]),
                vec![
                    atom("e", vec![var("x"), var("z")]),
                    atom("tc", vec![var("z"), var("y")]),
                ],
            )),
            None,
        )
        .unwrap();

    engine
        .insert(Formula::Atom(atom("e", vec![Term::from(1i64), Term::from(2i64)])), None)
        .unwrap();
    engine
        .insert(Formula::Atom(atom("e", vec![Term::from(2i64), Term::from(3i64)])), None)
        .unwrap();

    let mut pairs: Vec<(i64, i64)> = engine
        .select(&Formula::Atom(atom("tc", vec![var("x"), var("y")])), None, None)
        .unwrap()
        .into_iter()
        .map(|a| match a.arguments.as_slice() {
            [Term::Constant(x), Term::Constant(y)] => (
                match x {
                    TypedValue::Int(n) => *n,
                    _ => unreachable!(),
                },
                match y {
                    TypedValue::Int(n) => *n,
                    _ => unreachable!(),
                },
            ),
            _ => unreachable!(),
        })
        .collect();
    pairs.sort();
    assert_eq!(pairs, vec![(1, 2), (1, 3), (2, 3)]);

    engine
        .delete(Formula::Atom(atom("e", vec![Term::from(2i64), Term::from(3i64)])), None)
        .unwrap();
    let mut pairs_after: Vec<(i64, i64)> = engine
        .select(&Formula::Atom(atom("tc", vec![var("x"), var("y")])), None, None)
        .unwrap()
        .into_iter()
        .map(|a| match a.arguments.as_slice() {
            [Term::Constant(TypedValue::Int(x)), Term::Constant(TypedValue::Int(y))] => {
                (*x, *y)
            }
            _ => unreachable!(),
        })
        .collect();
    pairs_after.sort();
    assert_eq!(pairs_after, vec![(1, 2)]);
}

#[test]
fn negation_as_failure_excludes_banned_users_in_a_nonrecursive_theory() {
    let engine = Engine::new();
    engine
        .insert(
            Formula::Rule(Rule::new(
                atom("allow", vec![var("x")]),
                vec![
                    atom("user", vec![var("x")]),
                    Atom::negative("banned", vec![var("x")]),
                ],
            )),
            Some(ACTION_THEORY),
        )
        .unwrap();
    engine
        .insert(Formula::Atom(atom("user", vec![Term::from("alice")])), Some(ACTION_THEORY))
        .unwrap();
    engine
        .insert(Formula::Atom(atom("user", vec![Term::from("bob")])), Some(ACTION_THEORY))
        .unwrap();
    engine
        .insert(Formula::Atom(atom("banned", vec![Term::from("bob")])), Some(ACTION_THEORY))
        .unwrap();

    let answers = engine
        .select(&Formula::Atom(atom("allow", vec![var("x")])), Some(ACTION_THEORY), None)
        .unwrap();
    assert_eq!(answers, vec![atom("allow", vec![Term::from("alice")])]);
}

#[test]
fn a_view_table_cannot_be_mutated_directly() {
    let engine = Engine::new();
    engine
        .insert(
            Formula::Rule(Rule::new(
                atom("q", vec![var("x")]),
                vec![atom("p", vec![var("x")])],
            )),
            None,
        )
        .unwrap();

    let result = engine.insert(
        Formula::Atom(atom("q", vec![Term::from(1i64)])),
        Some(CLASSIFICATION_THEORY),
    );
    assert!(matches!(result, Err(EngineError::ForbiddenMutation(_))));
}

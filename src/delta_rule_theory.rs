//! Rewrites ordinary rules into `DeltaRule`s and indexes them by trigger
//! table, so a `MaterializedRuleTheory` can look up "which rules react to a
//! change in this table" in constant time instead of re-scanning every rule
//! on every event.

use ahash::{HashMap, HashSet};
use datalog_syntax::{Atom, DeltaRule, Rule};

/// Rewrites `rule` into one `DeltaRule` per body literal: that literal
/// becomes the trigger, the rest of the body is carried over unchanged, and
/// the head is unchanged. A fact (empty body) produces no delta rules --
/// there is nothing to react to.
pub fn compute_delta_rules(rule: &Rule) -> Vec<DeltaRule> {
    rule.body
        .iter()
        .enumerate()
        .map(|(index, trigger)| {
            let mut body: Vec<Atom> = rule.body.clone();
            body.remove(index);
            DeltaRule {
                trigger: trigger.clone(),
                head: rule.head.clone(),
                body,
                origin: rule.clone(),
            }
        })
        .collect()
}

#[derive(Default)]
pub struct DeltaRuleTheory {
    contents: HashMap<String, Vec<DeltaRule>>,
    views: HashSet<String>,
}

impl DeltaRuleTheory {
    pub fn new() -> Self {
        DeltaRuleTheory {
            contents: HashMap::default(),
            views: HashSet::default(),
        }
    }

    pub fn insert(&mut self, rule: &Rule) {
        self.views.insert(rule.head.table.clone());
        for delta in compute_delta_rules(rule) {
            self.contents
                .entry(delta.trigger.table.clone())
                .or_default()
                .push(delta);
        }
    }

    pub fn delete(&mut self, rule: &Rule) {
        for delta in compute_delta_rules(rule) {
            if let Some(rules) = self.contents.get_mut(&delta.trigger.table) {
                rules.retain(|existing| existing != &delta);
            }
        }
        if !self.contents.values().any(|rules| {
            rules
                .iter()
                .any(|delta| delta.head.table == rule.head.table)
        }) {
            self.views.remove(&rule.head.table);
        }
    }

    pub fn rules_with_trigger(&self, table: &str) -> &[DeltaRule] {
        self.contents.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_view(&self, table: &str) -> bool {
        self.views.contains(table)
    }
}

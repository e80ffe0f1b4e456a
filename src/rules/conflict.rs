/// Static conflict analysis over prioritized rules
///
/// Every unordered pair of rules is compared field by field:
/// 1. Shadow: the lower-priority rule only constrains fields the higher-priority
///    rule also constrains, and each of its conditions is covered by one of the
///    higher rule's conditions. Reported once, and nothing else is reported for
///    the pair.
/// 2. Contradiction: a same-field condition pair that can never hold together.
/// 3. Overlap: only when no contradiction was found, every same-field pair that
///    can hold together.
///
/// Condition trees are flattened to leaves before comparison, so `or` groups are
/// analyzed as if all their branches applied together.

use crate::expression::{as_number, values_equal};
use crate::rules::condition::{list_values, Condition, Interval, Operator, Rule, RuleSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    Shadow,
    Contradiction,
    Overlap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub id: String,
    pub name: String,
}

impl From<&Rule> for RuleRef {
    fn from(rule: &Rule) -> Self {
        Self { id: rule.id.clone(), name: rule.name.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConflict {
    pub rule1: RuleRef,
    pub rule2: RuleRef,
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub description: String,
    pub severity: Severity,
}

/// Conditions of one rule grouped by field, in order of first appearance.
type FieldGroups<'a> = Vec<(&'a str, Vec<&'a Condition>)>;

fn group_by_field(rule: &Rule) -> FieldGroups<'_> {
    let mut groups: FieldGroups<'_> = Vec::new();
    for condition in rule.leaf_conditions() {
        match groups.iter_mut().find(|(field, _)| *field == condition.field) {
            Some((_, conditions)) => conditions.push(condition),
            None => groups.push((condition.field.as_str(), vec![condition])),
        }
    }
    groups
}

fn conditions_for<'g, 'a>(groups: &'g FieldGroups<'a>, field: &str) -> Option<&'g Vec<&'a Condition>> {
    groups.iter().find(|(f, _)| *f == field).map(|(_, conditions)| conditions)
}

/// Analyze the active rules of a rule set.
pub fn analyze_rule_set(rule_set: &RuleSet) -> Vec<RuleConflict> {
    analyze_conflicts(&rule_set.active_rules())
}

/// Analyze rules as supplied (expected enabled and priority-sorted).
///
/// Conflicts are returned in pair-iteration order: (0,1), (0,2), ..., (1,2), ...
pub fn analyze_conflicts(rules: &[Rule]) -> Vec<RuleConflict> {
    let grouped: Vec<FieldGroups<'_>> = rules.iter().map(group_by_field).collect();
    let mut conflicts = Vec::new();

    for i in 0..rules.len() {
        for j in (i + 1)..rules.len() {
            compare_pair(&rules[i], &grouped[i], &rules[j], &grouped[j], &mut conflicts);
        }
    }

    tracing::debug!("🔍 Analyzed {} rules: {} conflicts", rules.len(), conflicts.len());
    conflicts
}

fn compare_pair(
    a: &Rule,
    a_fields: &FieldGroups<'_>,
    b: &Rule,
    b_fields: &FieldGroups<'_>,
    out: &mut Vec<RuleConflict>,
) {
    if a_fields.is_empty() || b_fields.is_empty() {
        return;
    }

    let (high, high_fields, low, low_fields) = if b.priority > a.priority {
        (b, b_fields, a, a_fields)
    } else {
        (a, a_fields, b, b_fields)
    };

    if shadows(high_fields, low_fields) {
        out.push(RuleConflict {
            rule1: a.into(),
            rule2: b.into(),
            conflict_type: ConflictType::Shadow,
            description: format!(
                "Rule '{}' (priority {}) shadows rule '{}' (priority {}): every condition of '{}' is covered by '{}'",
                high.name, high.priority, low.name, low.priority, low.name, high.name
            ),
            severity: Severity::High,
        });
        return;
    }

    let before = out.len();
    for_each_shared_pair(a_fields, b_fields, |field, ca, cb| {
        if mutually_exclusive(ca, cb) {
            out.push(RuleConflict {
                rule1: a.into(),
                rule2: b.into(),
                conflict_type: ConflictType::Contradiction,
                description: format!(
                    "Conditions on '{}' can never both hold: '{}' requires {} but '{}' requires {}",
                    field, a.name, ca, b.name, cb
                ),
                severity: Severity::Medium,
            });
        }
    });
    if out.len() > before {
        return;
    }

    for_each_shared_pair(a_fields, b_fields, |field, ca, cb| {
        if could_overlap(ca, cb) {
            out.push(RuleConflict {
                rule1: a.into(),
                rule2: b.into(),
                conflict_type: ConflictType::Overlap,
                description: format!(
                    "Conditions on '{}' can both hold: '{}' requires {} and '{}' requires {}",
                    field, a.name, ca, b.name, cb
                ),
                severity: Severity::Low,
            });
        }
    });
}

fn for_each_shared_pair<'a>(
    a_fields: &FieldGroups<'a>,
    b_fields: &FieldGroups<'a>,
    mut visit: impl FnMut(&str, &Condition, &Condition),
) {
    for (field, a_conditions) in a_fields {
        let Some(b_conditions) = conditions_for(b_fields, field) else {
            continue;
        };
        for ca in a_conditions {
            for cb in b_conditions {
                visit(field, ca, cb);
            }
        }
    }
}

fn shadows(high: &FieldGroups<'_>, low: &FieldGroups<'_>) -> bool {
    low.iter().all(|(field, low_conditions)| match conditions_for(high, field) {
        Some(high_conditions) => low_conditions
            .iter()
            .all(|l| high_conditions.iter().any(|h| is_subset_condition(l, h))),
        None => false,
    })
}

fn same_condition(a: &Condition, b: &Condition) -> bool {
    a.operator == b.operator && values_equal(&a.value, &b.value)
}

fn equals_value_in(a: &Condition, b: &Condition) -> bool {
    if a.operator != Operator::Equals {
        return false;
    }
    if b.operator == Operator::In {
        return list_values(&b.value).iter().any(|v| values_equal(v, &a.value));
    }
    match (as_number(&a.value), Interval::of(b)) {
        (Some(n), Some(interval)) => interval.contains(n),
        _ => false,
    }
}

fn lists_intersect(a: &Condition, b: &Condition) -> bool {
    let b_values = list_values(&b.value);
    list_values(&a.value).iter().any(|x| b_values.iter().any(|y| values_equal(x, y)))
}

fn ranges(a: &Condition, b: &Condition) -> Option<(Interval, Interval)> {
    if a.operator.is_range() && b.operator.is_range() {
        Some((Interval::of(a)?, Interval::of(b)?))
    } else {
        None
    }
}

/// Whether `b` covers `a`: every value matching `a` also matches `b`.
pub fn is_subset_condition(a: &Condition, b: &Condition) -> bool {
    if same_condition(a, b) || equals_value_in(a, b) {
        return true;
    }
    match (a.operator, b.operator) {
        (Operator::Between, Operator::Between) => {
            ranges(a, b).is_some_and(|(inner, outer)| inner.within(&outer))
        }
        (Operator::In, Operator::In) => {
            let a_values = list_values(&a.value);
            let b_values = list_values(&b.value);
            !a_values.is_empty()
                && a_values.iter().all(|x| b_values.iter().any(|y| values_equal(x, y)))
        }
        _ => false,
    }
}

/// Whether no single value can satisfy both conditions.
pub fn mutually_exclusive(a: &Condition, b: &Condition) -> bool {
    excludes(a, b) || excludes(b, a)
}

fn excludes(a: &Condition, b: &Condition) -> bool {
    match (a.operator, b.operator) {
        (Operator::Equals, Operator::Equals) => !values_equal(&a.value, &b.value),
        (Operator::Equals, Operator::NotEquals) => values_equal(&a.value, &b.value),
        (Operator::IsNull, Operator::IsNotNull) => true,
        (Operator::In, Operator::In) => !lists_intersect(a, b),
        _ => ranges(a, b).is_some_and(|(x, y)| !x.intersects(&y)),
    }
}

/// Whether some value can satisfy both conditions.
pub fn could_overlap(a: &Condition, b: &Condition) -> bool {
    overlaps(a, b) || overlaps(b, a)
}

fn overlaps(a: &Condition, b: &Condition) -> bool {
    if same_condition(a, b) || equals_value_in(a, b) {
        return true;
    }
    if a.operator == Operator::In && b.operator == Operator::In {
        return lists_intersect(a, b);
    }
    if a.operator.is_string_predicate() && b.operator.is_string_predicate() {
        return true;
    }
    ranges(a, b).is_some_and(|(x, y)| x.intersects(&y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::condition::{ConditionGroup, LogicalGroup};
    use serde_json::{json, Value};
    use std::collections::BTreeSet;

    fn cond(field: &str, operator: Operator, value: Value) -> Condition {
        Condition { field: field.into(), operator, value }
    }

    fn rule(id: &str, priority: i64, conditions: Vec<Condition>) -> Rule {
        Rule {
            id: id.into(),
            name: format!("Rule {id}"),
            priority,
            enabled: true,
            conditions: Some(ConditionGroup::Group(LogicalGroup {
                combinator: Default::default(),
                conditions: conditions.into_iter().map(ConditionGroup::Leaf).collect(),
            })),
            actions: vec![],
        }
    }

    fn summary(conflicts: &[RuleConflict]) -> BTreeSet<(String, String, ConflictType, Severity)> {
        conflicts
            .iter()
            .map(|c| {
                let mut ids = [c.rule1.id.clone(), c.rule2.id.clone()];
                ids.sort();
                let [x, y] = ids;
                (x, y, c.conflict_type, c.severity)
            })
            .collect()
    }

    #[test]
    fn identical_condition_at_lower_priority_is_shadowed() {
        let high = rule("h", 10, vec![cond("status", Operator::Equals, json!("active"))]);
        let low = rule("l", 5, vec![cond("status", Operator::Equals, json!("active"))]);

        let conflicts = analyze_conflicts(&[high, low]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Shadow);
        assert_eq!(conflicts[0].severity, Severity::High);
        assert!(conflicts[0].description.contains("'Rule h' (priority 10) shadows rule 'Rule l'"));
    }

    #[test]
    fn disjoint_ranges_contradict() {
        let a = rule("a", 10, vec![cond("age", Operator::GreaterThan, json!(30))]);
        let b = rule("b", 5, vec![cond("age", Operator::LessThan, json!(20))]);

        let conflicts = analyze_conflicts(&[a, b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Contradiction);
        assert_eq!(conflicts[0].severity, Severity::Medium);
    }

    #[test]
    fn intersecting_ranges_overlap() {
        let a = rule("a", 10, vec![cond("age", Operator::GreaterThan, json!(30))]);
        let b = rule("b", 5, vec![cond("age", Operator::LessThan, json!(50))]);

        let conflicts = analyze_conflicts(&[a, b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Overlap);
        assert_eq!(conflicts[0].severity, Severity::Low);
    }

    #[test]
    fn boundary_inclusivity_decides_exclusivity() {
        let gte = cond("x", Operator::GreaterThanOrEqual, json!(10));
        let lt = cond("x", Operator::LessThan, json!(10));
        let gt = cond("x", Operator::GreaterThan, json!(10));
        let lte = cond("x", Operator::LessThanOrEqual, json!(10));

        assert!(mutually_exclusive(&gte, &lt));
        assert!(mutually_exclusive(&gt, &lte));
        assert!(!mutually_exclusive(&gte, &lte));
        assert!(could_overlap(&gte, &lte));
    }

    #[test]
    fn exclusivity_cases() {
        assert!(mutually_exclusive(
            &cond("s", Operator::Equals, json!("a")),
            &cond("s", Operator::Equals, json!("b"))
        ));
        assert!(mutually_exclusive(
            &cond("s", Operator::NotEquals, json!("a")),
            &cond("s", Operator::Equals, json!("a"))
        ));
        assert!(mutually_exclusive(
            &cond("s", Operator::Between, json!([1, 5])),
            &cond("s", Operator::Between, json!([6, 9]))
        ));
        assert!(mutually_exclusive(
            &cond("s", Operator::In, json!(["a", "b"])),
            &cond("s", Operator::In, json!(["c"]))
        ));
        assert!(mutually_exclusive(
            &cond("s", Operator::IsNotNull, Value::Null),
            &cond("s", Operator::IsNull, Value::Null)
        ));
        assert!(!mutually_exclusive(
            &cond("s", Operator::Contains, json!("a")),
            &cond("s", Operator::StartsWith, json!("b"))
        ));
    }

    #[test]
    fn subset_rules() {
        let eq = cond("n", Operator::Equals, json!(15));
        assert!(is_subset_condition(&eq, &cond("n", Operator::Between, json!([10, 20]))));
        assert!(is_subset_condition(&eq, &cond("n", Operator::GreaterThan, json!(10))));
        assert!(!is_subset_condition(&eq, &cond("n", Operator::LessThan, json!(10))));
        assert!(is_subset_condition(
            &cond("t", Operator::Equals, json!("gold")),
            &cond("t", Operator::In, json!(["gold", "silver"]))
        ));
        assert!(is_subset_condition(
            &cond("n", Operator::Between, json!([12, 18])),
            &cond("n", Operator::Between, json!([10, 20]))
        ));
        assert!(is_subset_condition(
            &cond("t", Operator::In, json!(["gold"])),
            &cond("t", Operator::In, json!(["gold", "silver"]))
        ));
        assert!(!is_subset_condition(
            &cond("t", Operator::In, json!(["gold", "bronze"])),
            &cond("t", Operator::In, json!(["gold", "silver"]))
        ));
    }

    #[test]
    fn narrower_rule_with_extra_field_is_not_shadowed() {
        let high = rule("h", 10, vec![cond("status", Operator::Equals, json!("active"))]);
        let low = rule(
            "l",
            5,
            vec![
                cond("status", Operator::Equals, json!("active")),
                cond("country", Operator::Equals, json!("NO")),
            ],
        );

        let conflicts = analyze_conflicts(&[high, low]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Overlap);
    }

    #[test]
    fn multiple_contradictions_per_pair() {
        let a = rule(
            "a",
            1,
            vec![cond("x", Operator::Equals, json!(1)), cond("y", Operator::IsNull, Value::Null)],
        );
        let b = rule(
            "b",
            2,
            vec![
                cond("x", Operator::Equals, json!(2)),
                cond("y", Operator::IsNotNull, Value::Null),
                cond("z", Operator::Equals, json!(0)),
            ],
        );

        let conflicts = analyze_conflicts(&[a, b]);
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts.iter().all(|c| c.conflict_type == ConflictType::Contradiction));
    }

    #[test]
    fn string_predicates_conservatively_overlap() {
        let a = rule("a", 1, vec![cond("email", Operator::EndsWith, json!(".io"))]);
        let b = rule("b", 2, vec![cond("email", Operator::Matches, json!("^admin"))]);
        let conflicts = analyze_conflicts(&[a, b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Overlap);
    }

    #[test]
    fn rules_without_conditions_contribute_nothing() {
        let mut empty = rule("e", 10, vec![]);
        empty.conditions = None;
        let other = rule("o", 1, vec![cond("x", Operator::Equals, json!(1))]);
        assert!(analyze_conflicts(&[empty, other]).is_empty());
    }

    #[test]
    fn analysis_is_symmetric_and_idempotent() {
        let rules = vec![
            rule("a", 10, vec![cond("age", Operator::GreaterThan, json!(30))]),
            rule("b", 5, vec![cond("age", Operator::LessThan, json!(20))]),
            rule("c", 3, vec![cond("age", Operator::Between, json!([40, 60]))]),
            rule("d", 1, vec![cond("tier", Operator::In, json!(["gold"]))]),
        ];
        let mut reversed = rules.clone();
        reversed.reverse();

        let forward = analyze_conflicts(&rules);
        let backward = analyze_conflicts(&reversed);
        assert_eq!(summary(&forward), summary(&backward));

        let again = analyze_conflicts(&rules);
        assert_eq!(
            serde_json::to_string(&forward).unwrap(),
            serde_json::to_string(&again).unwrap()
        );
    }

    #[test]
    fn equal_priority_shadow_follows_supplied_order() {
        let broad = rule("broad", 5, vec![cond("code", Operator::In, json!([1, 2]))]);
        let narrow = rule("narrow", 5, vec![cond("code", Operator::Equals, json!(1))]);

        // The first rule supplied plays the higher-priority role on a tie.
        let forward = analyze_conflicts(&[broad.clone(), narrow.clone()]);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].conflict_type, ConflictType::Shadow);
        assert_eq!((forward[0].rule1.id.as_str(), forward[0].rule2.id.as_str()), ("broad", "narrow"));

        let backward = analyze_conflicts(&[narrow, broad]);
        assert_eq!(backward.len(), 1);
        assert_eq!(backward[0].conflict_type, ConflictType::Overlap);
        assert_eq!(backward[0].severity, Severity::Low);
    }

    #[test]
    fn serializes_to_report_shape() {
        let a = rule("a", 10, vec![cond("age", Operator::GreaterThan, json!(30))]);
        let b = rule("b", 5, vec![cond("age", Operator::LessThan, json!(20))]);
        let report = serde_json::to_value(&analyze_conflicts(&[a, b])[0]).unwrap();
        assert_eq!(report["rule1"], json!({ "id": "a", "name": "Rule a" }));
        assert_eq!(report["type"], json!("contradiction"));
        assert_eq!(report["severity"], json!("medium"));
    }
}

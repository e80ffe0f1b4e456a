/// Condition and rule model
///
/// Rules carry a tree of field predicates combined by `and`/`or` groups plus an
/// ordered list of actions. The same model feeds the conflict analyzer (which
/// flattens the tree) and the rule engine (which evaluates it).

use crate::expression::{as_number, resolve_path, values_equal};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{OnceLock, RwLock},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Operators whose matches form a numeric interval.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterThanOrEqual
                | Operator::LessThan
                | Operator::LessThanOrEqual
                | Operator::Between
        )
    }

    pub fn is_string_predicate(&self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith | Operator::Matches
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::GreaterThan => "greaterThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            Operator::LessThan => "lessThan",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::Between => "between",
            Operator::In => "in",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Matches => "matches",
            Operator::IsNull => "isNull",
            Operator::IsNotNull => "isNotNull",
        }
    }
}

/// Leaf predicate: `field operator value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    #[serde(alias = "AND", alias = "all")]
    And,
    #[serde(alias = "OR", alias = "any")]
    Or,
}

/// Leaves own the `operator` key, so a group only accepts `combinator`/`logic`
/// and rejects anything else instead of swallowing a malformed leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogicalGroup {
    #[serde(default, alias = "logic")]
    pub combinator: Combinator,
    #[serde(default)]
    pub conditions: Vec<ConditionGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionGroup {
    Leaf(Condition),
    Group(LogicalGroup),
}

impl ConditionGroup {
    /// Flatten the tree to its leaves, discarding combinators.
    pub fn leaves(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            ConditionGroup::Leaf(condition) => out.push(condition),
            ConditionGroup::Group(group) => {
                for child in &group.conditions {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Evaluate the tree against `input`. An empty group matches.
    pub fn matches(&self, input: &Value) -> bool {
        match self {
            ConditionGroup::Leaf(condition) => condition.matches(input),
            ConditionGroup::Group(group) => match group.combinator {
                Combinator::And => group.conditions.iter().all(|c| c.matches(input)),
                Combinator::Or => {
                    group.conditions.is_empty() || group.conditions.iter().any(|c| c.matches(input))
                }
            },
        }
    }
}

impl Condition {
    pub fn matches(&self, input: &Value) -> bool {
        let actual = resolve_path(input, &self.field);
        let present = actual.filter(|v| !v.is_null());

        match self.operator {
            Operator::IsNull => present.is_none(),
            Operator::IsNotNull => present.is_some(),
            Operator::Equals => actual.is_some_and(|a| values_equal(a, &self.value)),
            Operator::NotEquals => !actual.is_some_and(|a| values_equal(a, &self.value)),
            Operator::GreaterThan
            | Operator::GreaterThanOrEqual
            | Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::Between => match (present.and_then(as_number), Interval::of(self)) {
                (Some(n), Some(interval)) => interval.contains(n),
                _ => false,
            },
            Operator::In => present.is_some_and(|a| list_values(&self.value).iter().any(|v| values_equal(a, v))),
            Operator::Contains => match present {
                Some(Value::String(s)) => s.contains(&text_of(&self.value)),
                Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, &self.value)),
                _ => false,
            },
            Operator::StartsWith => matches!(present, Some(Value::String(s)) if s.starts_with(&text_of(&self.value))),
            Operator::EndsWith => matches!(present, Some(Value::String(s)) if s.ends_with(&text_of(&self.value))),
            Operator::Matches => match (present, compiled_pattern(&text_of(&self.value))) {
                (Some(Value::String(s)), Some(re)) => re.is_match(s),
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operator {
            Operator::IsNull | Operator::IsNotNull => {
                write!(f, "{} {}", self.field, self.operator.as_str())
            }
            _ => write!(f, "{} {} {}", self.field, self.operator.as_str(), self.value),
        }
    }
}

/// Numeric interval with open or closed ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub min_inclusive: bool,
    pub max: f64,
    pub max_inclusive: bool,
}

impl Interval {
    /// Interval matched by a range condition; `None` for other operators or
    /// values that are not numeric.
    pub fn of(condition: &Condition) -> Option<Self> {
        let unbounded = Interval {
            min: f64::NEG_INFINITY,
            min_inclusive: false,
            max: f64::INFINITY,
            max_inclusive: false,
        };
        match condition.operator {
            Operator::GreaterThan => Some(Interval { min: as_number(&condition.value)?, ..unbounded }),
            Operator::GreaterThanOrEqual => Some(Interval {
                min: as_number(&condition.value)?,
                min_inclusive: true,
                ..unbounded
            }),
            Operator::LessThan => Some(Interval { max: as_number(&condition.value)?, ..unbounded }),
            Operator::LessThanOrEqual => Some(Interval {
                max: as_number(&condition.value)?,
                max_inclusive: true,
                ..unbounded
            }),
            Operator::Between => {
                let (min, max) = range_bounds(&condition.value)?;
                Some(Interval { min, min_inclusive: true, max, max_inclusive: true })
            }
            _ => None,
        }
    }

    pub fn contains(&self, n: f64) -> bool {
        let above = if self.min_inclusive { n >= self.min } else { n > self.min };
        let below = if self.max_inclusive { n <= self.max } else { n < self.max };
        above && below
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        let (lo, lo_inclusive) = if self.min > other.min {
            (self.min, self.min_inclusive)
        } else if other.min > self.min {
            (other.min, other.min_inclusive)
        } else {
            (self.min, self.min_inclusive && other.min_inclusive)
        };
        let (hi, hi_inclusive) = if self.max < other.max {
            (self.max, self.max_inclusive)
        } else if other.max < self.max {
            (other.max, other.max_inclusive)
        } else {
            (self.max, self.max_inclusive && other.max_inclusive)
        };

        lo < hi || (lo == hi && lo_inclusive && hi_inclusive)
    }

    /// `self` lies entirely within `other`.
    pub fn within(&self, other: &Interval) -> bool {
        let lower_ok = self.min > other.min
            || (self.min == other.min && (other.min_inclusive || !self.min_inclusive));
        let upper_ok = self.max < other.max
            || (self.max == other.max && (other.max_inclusive || !self.max_inclusive));
        lower_ok && upper_ok
    }
}

/// `[min, max]` or `{ "min": .., "max": .. }`, normalised so min <= max.
pub fn range_bounds(value: &Value) -> Option<(f64, f64)> {
    let (a, b) = match value {
        Value::Array(items) if items.len() == 2 => (as_number(&items[0])?, as_number(&items[1])?),
        Value::Object(obj) => (as_number(obj.get("min")?)?, as_number(obj.get("max")?)?),
        _ => return None,
    };
    Some((a.min(b), a.max(b)))
}

/// Members of an `in` list. A scalar is treated as a one-element list and a
/// comma-separated string is split.
pub fn list_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        Value::String(s) if s.contains(',') => {
            s.split(',').map(|part| Value::String(part.trim().to_string())).collect()
        }
        other => vec![other.clone()],
    }
}

/// Compile a `matches` pattern once per process. Invalid patterns are cached
/// as `None` and only logged the first time.
fn compiled_pattern(pattern: &str) -> Option<Regex> {
    static PATTERNS: OnceLock<RwLock<HashMap<String, Option<Regex>>>> = OnceLock::new();
    let cache = PATTERNS.get_or_init(Default::default);

    if let Some(hit) = cache.read().ok().and_then(|patterns| patterns.get(pattern).cloned()) {
        return hit;
    }

    let compiled = match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("⚠️ Invalid regex pattern '{}' never matches: {}", pattern, e);
            None
        }
    };
    if let Ok(mut patterns) = cache.write() {
        patterns.insert(pattern.to_string(), compiled.clone());
    }
    compiled
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Set,
    Increment,
    Decrement,
    Append,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Option<ConditionGroup>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

impl Rule {
    /// Leaf conditions; empty when the rule has no condition tree.
    pub fn leaf_conditions(&self) -> Vec<&Condition> {
        self.conditions.as_ref().map(ConditionGroup::leaves).unwrap_or_default()
    }

    /// A rule without conditions matches every input.
    pub fn matches(&self, input: &Value) -> bool {
        self.conditions.as_ref().map_or(true, |tree| tree.matches(input))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HitPolicy {
    /// Every matching rule fires.
    #[default]
    All,
    /// Only the highest-priority matching rule fires.
    First,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hit_policy: HitPolicy,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Enabled rules, highest priority first. Ties keep definition order.
    pub fn active_rules(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self.rules.iter().filter(|r| r.enabled).cloned().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    }
}

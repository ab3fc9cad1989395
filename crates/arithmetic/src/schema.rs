//! Schema model.
//!
//! A schema describes one parametrized word problem: how to sample its
//! variables, which constraints they must satisfy, the vocabulary to draw,
//! the solution trace, and the answer formula.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use virtual_expert_core::{ComputeOp, Difficulty, Error, Result};

use crate::expression;

pub const DEFAULT_EXPERT: &str = "arithmetic";

// =============================================================================
// Ordered Map
// =============================================================================

/// A string-keyed map that keeps declaration order.
///
/// Derived variables see earlier entries and vocab sampling consumes the
/// RNG in declaration order, so the order from the JSON file matters.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T>(Vec<(String, T)>);

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> FromIterator<(String, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

struct OrderedMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
    type Value = OrderedMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<String, T>()? {
            map.insert(key, value);
        }
        Ok(map)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(OrderedMapVisitor(PhantomData))
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<OneOrMany<T>>::deserialize(deserializer)?.map(|v| match v {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    }))
}

// =============================================================================
// Specs
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    #[default]
    Int,
    Float,
    Bool,
    Choice,
}

/// How to sample one variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    #[serde(rename = "type", default)]
    pub kind: VariableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Decimal places for floats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<serde_json::Value>>,
    /// Alias of `options`.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<i64>,
    #[serde(default)]
    pub requires_carrying: bool,
    #[serde(default)]
    pub requires_borrowing: bool,
    #[serde(default)]
    pub avoid_round: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl VariableSpec {
    /// Choice options, from `options` or `values`.
    pub fn choices(&self) -> &[serde_json::Value] {
        self.options
            .as_deref()
            .filter(|o| !o.is_empty())
            .or(self.values.as_deref())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabKind {
    PersonWithPronouns,
    Choice,
    DomainContext,
}

/// How to sample one vocabulary item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VocabSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<VocabKind>,
    /// Dotted vocab path such as `items.countable_singular`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<serde_json::Value>>,
    /// Draw this many distinct items instead of one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<usize>,
    /// Earlier vocab keys whose values must not be repeated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distinct_from: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Inclusive bounds for a constraint expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ConstraintBounds {
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOpKind {
    Init,
    Compute,
    Formula,
    Query,
    Transfer,
    Consume,
    AddEntity,
    PercentOff,
    PercentIncrease,
    PercentOf,
    Compare,
}

/// A trace operation as written in a schema file.
///
/// Values are still unresolved: `value` and `amount` may name schema
/// variables, which the generator substitutes when it builds the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceOpSpec {
    pub op: TraceOpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_op: Option<ComputeOp>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<serde_json::Value>,
}

impl TraceOpSpec {
    pub fn is_compute(&self) -> bool {
        self.op == TraceOpKind::Compute
    }
}

fn default_expert() -> String {
    DEFAULT_EXPERT.to_string()
}

/// A complete schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Vocab pattern key under `patterns.`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Inline templates, used when no pattern is given.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
    #[serde(default = "default_expert")]
    pub expert: String,
    #[serde(default)]
    pub variables: OrderedMap<VariableSpec>,
    #[serde(default)]
    pub derived: OrderedMap<String>,
    #[serde(default)]
    pub constraints: OrderedMap<ConstraintBounds>,
    #[serde(default)]
    pub vocab: OrderedMap<VocabSpec>,
    #[serde(default)]
    pub template_vars: OrderedMap<String>,
    #[serde(default)]
    pub trace: Vec<TraceOpSpec>,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
}

impl SchemaSpec {
    /// Deserialize and validate a composed schema document.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let spec: SchemaSpec = serde_json::from_value(value)
            .map_err(|e| Error::schema_load(format!("Malformed schema: {}", e)))?;
        if !spec.is_abstract {
            spec.validate()?;
        }
        Ok(spec)
    }

    /// Names usable in expressions: variables then derived values.
    pub fn variable_names(&self) -> BTreeSet<String> {
        self.variables
            .keys()
            .chain(self.derived.keys())
            .map(str::to_string)
            .collect()
    }

    /// Number of compute steps, at least 1.
    pub fn trace_depth(&self) -> usize {
        self.trace.iter().filter(|op| op.is_compute()).count().max(1)
    }

    /// Template variables provided directly by the schema.
    pub fn provided_template_vars(&self) -> BTreeSet<String> {
        self.template_vars
            .keys()
            .chain(self.variables.keys())
            .chain(self.derived.keys())
            .map(str::to_string)
            .collect()
    }

    pub fn query_var(&self) -> Option<&str> {
        self.trace
            .iter()
            .rev()
            .find(|op| op.op == TraceOpKind::Query)
            .and_then(|op| op.var.as_deref())
    }

    /// Check the schema for configuration errors.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if self.pattern.is_none() && self.templates.is_empty() {
            errors.push("either 'pattern' or 'templates' is required".to_string());
        }

        self.validate_variables(&mut errors);
        self.validate_expressions(&mut errors);
        self.validate_trace(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::schema_validation(format!(
                "{}: {}",
                self.name,
                errors.join("; ")
            )))
        }
    }

    fn validate_variables(&self, errors: &mut Vec<String>) {
        for (name, spec) in self.variables.iter() {
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if min > max {
                    errors.push(format!("variable '{}' has min {} > max {}", name, min, max));
                }
            }
            if spec.kind == VariableKind::Choice && spec.choices().is_empty() {
                errors.push(format!("choice variable '{}' has no options", name));
            }
            if matches!(spec.multiple_of, Some(m) if m <= 0) {
                errors.push(format!("variable '{}' has non-positive multiple_of", name));
            }
        }
        for (name, spec) in self.vocab.iter() {
            if spec.kind.is_none() && spec.path.is_none() {
                errors.push(format!("vocab '{}' needs a 'type' or a 'path'", name));
            }
        }
    }

    fn validate_expressions(&self, errors: &mut Vec<String>) {
        let mut available: BTreeSet<String> = self.variables.keys().map(str::to_string).collect();
        for (name, expr) in self.derived.iter() {
            errors.extend(expression::validate(expr, &available));
            available.insert(name.to_string());
        }
        for (expr, _) in self.constraints.iter() {
            errors.extend(expression::validate(expr, &available));
        }
        errors.extend(expression::validate(&self.answer, &available));
    }

    fn validate_trace(&self, errors: &mut Vec<String>) {
        let variables = self.variable_names();
        let mut defined: BTreeSet<String> = BTreeSet::new();
        let mut has_query = false;

        // A string operand must name a trace variable defined earlier.
        let check_ref = |field: &str, value: &serde_json::Value, i: usize, defined: &BTreeSet<String>, errors: &mut Vec<String>| {
            if let serde_json::Value::String(name) = value {
                if !defined.contains(name) && name.trim().parse::<f64>().is_err() {
                    errors.push(format!("trace step {}: {} references undefined '{}'", i, field, name));
                }
            }
        };
        // A string amount/value must name a schema variable.
        let check_var = |field: &str, value: &serde_json::Value, i: usize, errors: &mut Vec<String>| {
            if let serde_json::Value::String(name) = value {
                if !variables.contains(name) {
                    errors.push(format!("trace step {}: {} references unknown variable '{}'", i, field, name));
                }
            }
        };

        for (i, op) in self.trace.iter().enumerate() {
            let mut missing = |field: &str, present: bool| {
                if !present {
                    errors.push(format!("trace step {} ({:?}) is missing '{}'", i, op.op, field));
                }
            };

            match op.op {
                TraceOpKind::Init => {
                    missing("var", op.var.is_some());
                    missing("value", op.value.is_some());
                }
                TraceOpKind::Compute | TraceOpKind::Compare => {
                    missing("compute_op", op.compute_op.is_some());
                    missing("args", op.args.as_ref().map_or(false, |a| !a.is_empty()));
                    missing("var", op.var.is_some());
                }
                TraceOpKind::Formula => missing("expression", op.expression.is_some()),
                TraceOpKind::Query => missing("var", op.var.is_some()),
                TraceOpKind::Transfer => {
                    missing("from_entity", op.from_entity.is_some());
                    missing("to_entity", op.to_entity.is_some());
                    missing("amount", op.amount.is_some());
                }
                TraceOpKind::Consume | TraceOpKind::AddEntity => {
                    missing("entity", op.entity.is_some());
                    missing("amount", op.amount.is_some());
                }
                TraceOpKind::PercentOff | TraceOpKind::PercentIncrease | TraceOpKind::PercentOf => {
                    missing("base", op.base.is_some());
                    missing("rate", op.rate.is_some());
                    missing("var", op.var.is_some());
                }
            }

            match op.op {
                TraceOpKind::Init => {
                    if let Some(value) = &op.value {
                        check_var("value", value, i, errors);
                    }
                }
                TraceOpKind::Compute | TraceOpKind::Compare => {
                    for arg in op.args.iter().flatten() {
                        check_ref("argument", arg, i, &defined, errors);
                    }
                }
                TraceOpKind::Transfer => {
                    if let Some(from) = &op.from_entity {
                        if !defined.contains(from) {
                            errors.push(format!("trace step {}: transfer from undefined '{}'", i, from));
                        }
                    }
                    if let Some(amount) = &op.amount {
                        check_var("amount", amount, i, errors);
                    }
                    if let Some(to) = &op.to_entity {
                        defined.insert(to.clone());
                    }
                }
                TraceOpKind::Consume | TraceOpKind::AddEntity => {
                    if let Some(amount) = &op.amount {
                        check_var("amount", amount, i, errors);
                    }
                    if let Some(entity) = &op.entity {
                        if op.op == TraceOpKind::Consume && !defined.contains(entity) {
                            errors.push(format!("trace step {}: consume from undefined '{}'", i, entity));
                        }
                        defined.insert(entity.clone());
                    }
                }
                TraceOpKind::PercentOff | TraceOpKind::PercentIncrease | TraceOpKind::PercentOf => {
                    for (field, value) in [("base", &op.base), ("rate", &op.rate)] {
                        if let Some(value) = value {
                            check_ref(field, value, i, &defined, errors);
                        }
                    }
                }
                TraceOpKind::Query => {
                    has_query = true;
                    if let Some(var) = &op.var {
                        if !defined.contains(var) {
                            errors.push(format!("trace step {}: query of undefined '{}'", i, var));
                        }
                    }
                }
                TraceOpKind::Formula => {
                    if let Some(expr) = &op.expression {
                        if let Err(e) = expression::Expression::parse(expr) {
                            errors.push(format!("trace step {}: {}", i, e));
                        }
                    }
                }
            }

            if op.op != TraceOpKind::Query {
                if let Some(var) = &op.var {
                    defined.insert(var.clone());
                }
            }
        }

        if !has_query {
            errors.push("trace has no query step".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "name": "add_two",
            "pattern": "add_two",
            "variables": {
                "b": {"type": "int", "min": 1, "max": 10},
                "a": {"type": "int", "min": 1, "max": 10}
            },
            "derived": {"total": "a + b"},
            "trace": [
                {"op": "init", "var": "a", "value": "a"},
                {"op": "init", "var": "b", "value": "b"},
                {"op": "compute", "compute_op": "add", "args": ["a", "b"], "var": "result"},
                {"op": "query", "var": "result"}
            ],
            "answer": "a + b"
        })
    }

    #[test]
    fn test_declaration_order_preserved() {
        let spec = SchemaSpec::from_value(minimal()).unwrap();
        let keys: Vec<_> = spec.variables.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(spec.expert, DEFAULT_EXPERT);
        assert_eq!(spec.trace_depth(), 1);
        assert_eq!(spec.query_var(), Some("result"));
    }

    #[test]
    fn test_missing_answer_is_load_error() {
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove("answer");
        assert!(matches!(SchemaSpec::from_value(doc), Err(Error::SchemaLoad(_))));
    }

    #[test]
    fn test_unknown_variable_in_answer() {
        let mut doc = minimal();
        doc["answer"] = json!("a + c");
        let err = SchemaSpec::from_value(doc).unwrap_err();
        assert!(err.to_string().contains("'c'"), "{}", err);
    }

    #[test]
    fn test_unparsable_constraint() {
        let mut doc = minimal();
        doc["constraints"] = json!({"a - ": {"min": 0}});
        assert!(matches!(
            SchemaSpec::from_value(doc),
            Err(Error::SchemaValidation(_))
        ));
    }

    #[test]
    fn test_trace_requires_query() {
        let mut doc = minimal();
        doc["trace"].as_array_mut().unwrap().pop();
        let err = SchemaSpec::from_value(doc).unwrap_err();
        assert!(err.to_string().contains("no query"));
    }

    #[test]
    fn test_compute_missing_fields() {
        let mut doc = minimal();
        doc["trace"][2] = json!({"op": "compute", "args": ["a", "b"]});
        let err = SchemaSpec::from_value(doc).unwrap_err().to_string();
        assert!(err.contains("compute_op"));
        assert!(err.contains("'var'"));
    }

    #[test]
    fn test_unknown_trace_op_rejected() {
        let mut doc = minimal();
        doc["trace"][0] = json!({"op": "teleport", "var": "a"});
        assert!(SchemaSpec::from_value(doc).is_err());
    }

    #[test]
    fn test_variable_spec_checks() {
        let mut doc = minimal();
        doc["variables"]["a"] = json!({"min": 10, "max": 1});
        doc["variables"]["c"] = json!({"type": "choice"});
        let err = SchemaSpec::from_value(doc).unwrap_err().to_string();
        assert!(err.contains("min 10 > max 1"));
        assert!(err.contains("no options"));
    }

    #[test]
    fn test_single_option_becomes_list() {
        let spec: VariableSpec = serde_json::from_value(json!({"type": "choice", "options": 5})).unwrap();
        assert_eq!(spec.choices(), &[json!(5)]);
    }

    #[test]
    fn test_unknown_variable_field_denied() {
        let result: std::result::Result<VariableSpec, _> =
            serde_json::from_value(json!({"type": "int", "maximum": 5}));
        assert!(result.is_err());
    }

    #[test]
    fn test_constraint_bounds() {
        let bounds = ConstraintBounds {
            min: Some(10.0),
            max: None,
        };
        assert!(bounds.contains(10.0));
        assert!(!bounds.contains(9.5));
        assert!(ConstraintBounds::default().is_unbounded());
    }
}

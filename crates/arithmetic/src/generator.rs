//! Schema-driven problem generation.
//!
//! One generator owns one RNG. Every sampling step draws from it in a fixed
//! order, so a seeded generator reproduces its output exactly.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use virtual_expert_core::config::{AppConfig, BatchConfig, GenerationConfig};
use virtual_expert_core::{
    answers_agree, snap_answer, Error, Operand, Result, TraceExample, TraceSolver, TraceStep, Value,
};

use crate::constraints::{ConstraintValidator, DEFAULT_MAX_ATTEMPTS};
use crate::experts::default_solvers;
use crate::expression;
use crate::loader::SchemaLoader;
use crate::perturbation::TemplatePerturbator;
use crate::resolver::TemplateResolver;
use crate::sampler::VocabSampler;
use crate::schema::{SchemaSpec, TraceOpKind, TraceOpSpec};
use crate::template::{self, WordNumbers};
use crate::variables::{VariableGenerator, VariableMap};
use crate::vocab::Vocab;

const GSM8K_VARIANT: &str = "gsm8k_style";

/// Nearby depths tried when no schema has the exact target depth.
const MAX_DEPTH_OFFSET: usize = 5;

pub struct SchemaGenerator {
    schemas: BTreeMap<String, SchemaSpec>,
    vocab: Vocab,
    config: GenerationConfig,
    depth_weights: BTreeMap<usize, f64>,
    variables: VariableGenerator,
    constraints: ConstraintValidator,
    resolver: TemplateResolver,
    perturbator: TemplatePerturbator,
    solvers: HashMap<String, Arc<dyn TraceSolver>>,
    rng: StdRng,
}

impl SchemaGenerator {
    pub fn new(schemas: BTreeMap<String, SchemaSpec>, vocab: Vocab, config: GenerationConfig) -> Self {
        let config = config.normalized();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        tracing::info!(
            schemas = schemas.len(),
            seed = ?config.seed,
            difficulty = ?config.difficulty,
            "Schema generator ready"
        );

        Self {
            schemas,
            vocab,
            variables: VariableGenerator::with_difficulty(config.difficulty),
            depth_weights: BatchConfig::default().depth_weights,
            constraints: ConstraintValidator::new(DEFAULT_MAX_ATTEMPTS),
            resolver: TemplateResolver::new(),
            perturbator: TemplatePerturbator::new(),
            solvers: default_solvers()
                .into_iter()
                .map(|solver| (solver.name().to_string(), solver))
                .collect(),
            config,
            rng,
        }
    }

    /// Load schemas and vocab from the configured directories.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let schemas = SchemaLoader::new(&config.paths.schema_dir).load_all()?;
        let vocab = Vocab::load(&config.paths.vocab_dir)?;

        Ok(Self::new(schemas, vocab, config.generation.clone())
            .with_max_attempts(config.constraints.max_attempts)
            .with_depth_weights(config.batch.depth_weights.clone()))
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.constraints = ConstraintValidator::new(max_attempts);
        self
    }

    /// Replaces the trace-depth distribution; an empty map keeps the default.
    pub fn with_depth_weights(mut self, weights: BTreeMap<usize, f64>) -> Self {
        if !weights.is_empty() {
            self.depth_weights = weights;
        }
        self
    }

    pub fn with_resolver(mut self, resolver: TemplateResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Register a solver, replacing any solver with the same name.
    pub fn register_solver(&mut self, solver: Arc<dyn TraceSolver>) {
        self.solvers.insert(solver.name().to_string(), solver);
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn schema(&self, name: &str) -> Option<&SchemaSpec> {
        self.schemas.get(name)
    }

    /// Names of the concrete (non-abstract) schemas, sorted.
    pub fn schema_names(&self) -> Vec<String> {
        self.schemas
            .values()
            .filter(|schema| !schema.is_abstract)
            .map(|schema| schema.name.clone())
            .collect()
    }

    pub fn set_perturbation_level(&mut self, level: f64) {
        self.config.perturbation_level = level.clamp(0.0, 1.0);
    }

    pub fn set_gsm8k_style_prob(&mut self, prob: f64) {
        self.config.gsm8k_style_prob = prob.clamp(0.0, 1.0);
    }

    /// Restart the random stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.config.seed = Some(seed);
        self.rng = StdRng::seed_from_u64(seed);
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Generate one problem from a schema.
    pub fn generate(&mut self, name: &str) -> Result<TraceExample> {
        let schema = self
            .schemas
            .get(name)
            .ok_or_else(|| Error::UnknownSchema(name.to_string()))?;
        if schema.is_abstract {
            return Err(Error::invalid_request(format!(
                "Schema '{}' is abstract and cannot be generated",
                name
            )));
        }
        let rng = &mut self.rng;

        // Variables, derived values, constraints
        let generator = &self.variables;
        let mut sample = || {
            let mut vars = generator.generate(&schema.variables, rng);
            VariableGenerator::derive(&schema.derived, &mut vars);
            vars
        };
        let first = sample();
        let outcome = self.constraints.apply(&schema.constraints, first, sample);
        let variables = outcome.variables;

        // Text
        let items = VocabSampler::new(&self.vocab)
            .with_messy_prob(self.config.messy_vocab_prob)
            .sample(&schema.vocab, rng);
        let template_vars = self
            .resolver
            .build_template_vars(&schema.template_vars, &variables, &items);

        let raw = match &schema.pattern {
            Some(pattern) => {
                let variant = choose_variant(
                    &self.vocab,
                    pattern,
                    schema.variant.as_deref(),
                    self.config.gsm8k_style_prob,
                    rng,
                );
                self.vocab
                    .pattern(pattern, variant.as_deref(), rng)
                    .ok_or_else(|| {
                        Error::template(format!(
                            "No templates for pattern '{}' (variant {:?})",
                            pattern, variant
                        ))
                    })?
            }
            None => schema
                .templates
                .choose(rng)
                .cloned()
                .ok_or_else(|| Error::template(format!("Schema '{}' has no templates", name)))?,
        };

        let query = template::fill(&raw, &template_vars);
        let unresolved = template::unresolved_placeholders(&query);
        if !unresolved.is_empty() {
            return Err(Error::template(format!(
                "Schema '{}' left placeholders unresolved: {:?}",
                name, unresolved
            )));
        }
        let query = WordNumbers::apply(&query, self.config.word_number_prob, rng);
        let query = if self.config.perturbation_level > 0.0 {
            self.perturbator.perturb(&query, self.config.perturbation_level, rng)
        } else {
            query
        };

        // Trace and answer
        let trace = build_trace(&schema.trace, &variables)?;
        let answer = expression::evaluate(&schema.answer, &variables)?
            .as_f64()
            .ok_or_else(|| Error::expression(format!("Answer '{}' is not numeric", schema.answer)))?;

        let solver = self
            .solvers
            .get(&schema.expert)
            .ok_or_else(|| Error::SolverNotFound(schema.expert.clone()))?;
        let result = solver.execute_trace(&trace);
        if !result.success {
            return Err(Error::trace(format!(
                "Schema '{}': {}",
                name,
                result.error.unwrap_or_default()
            )));
        }
        let traced = result
            .answer
            .ok_or_else(|| Error::trace(format!("Schema '{}': trace produced no answer", name)))?;

        // The interpreter snaps near-integers; compare like with like.
        let expected = snap_answer(answer, solver.tolerance());
        if !answers_agree(expected, traced, self.config.answer_tolerance) {
            return Err(Error::AnswerMismatch {
                formula: answer,
                trace: traced,
            });
        }

        tracing::debug!(
            schema = %name,
            expert = %schema.expert,
            depth = schema.trace_depth(),
            attempts = outcome.attempts,
            "Generated example"
        );

        Ok(TraceExample {
            expert: schema.expert.clone(),
            query,
            trace,
            answer,
            expected_operation: "execute_trace".to_string(),
            schema: Some(schema.name.clone()),
            seed: self.config.seed,
            constraints_satisfied: outcome.violated.is_empty(),
            violated_constraints: outcome.violated,
        })
    }

    /// `n` problems, each from a random schema in `names` (all when empty).
    pub fn generate_batch(&mut self, names: &[String], n: usize) -> Result<Vec<TraceExample>> {
        let pool = if names.is_empty() { self.schema_names() } else { names.to_vec() };
        if pool.is_empty() {
            return Err(Error::invalid_request("No schemas available"));
        }

        let mut examples = Vec::with_capacity(n);
        for _ in 0..n {
            let name = &pool[self.rng.gen_range(0..pool.len())];
            examples.push(self.generate(name)?);
        }
        Ok(examples)
    }

    /// Generate from a schema whose trace depth is `target`, or the nearest
    /// available depth. Without a target the depth is drawn from the
    /// configured distribution.
    pub fn generate_with_target_depth(&mut self, target: Option<usize>) -> Result<TraceExample> {
        let target = target.or_else(|| self.sample_depth());

        if let Some(target) = target {
            let by_depth = self.schemas_by_depth();
            for offset in 0..=MAX_DEPTH_OFFSET {
                let candidates = [Some(target), target.checked_sub(offset), Some(target + offset)];
                for depth in candidates.into_iter().flatten() {
                    if let Some(name) = by_depth.get(&depth).and_then(|names| names.choose(&mut self.rng)) {
                        let name = name.clone();
                        return self.generate(&name);
                    }
                }
            }
        }

        let names = self.schema_names();
        let name = names
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| Error::invalid_request("No schemas available"))?;
        self.generate(&name)
    }

    /// `n` problems whose depths follow the configured distribution.
    pub fn generate_depth_distribution(&mut self, n: usize) -> Result<Vec<TraceExample>> {
        (0..n).map(|_| self.generate_with_target_depth(None)).collect()
    }

    /// Roughly `n` problems split evenly across experts, at least one each.
    pub fn generate_balanced(&mut self, n: usize) -> Result<Vec<TraceExample>> {
        let mut by_expert: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for schema in self.schemas.values().filter(|s| !s.is_abstract) {
            by_expert
                .entry(schema.expert.clone())
                .or_default()
                .push(schema.name.clone());
        }
        if by_expert.is_empty() {
            return Ok(Vec::new());
        }

        let per_expert = (n / by_expert.len()).max(1);
        let mut examples = Vec::with_capacity(per_expert * by_expert.len());
        for names in by_expert.values() {
            for _ in 0..per_expert {
                let name = &names[self.rng.gen_range(0..names.len())];
                examples.push(self.generate(name)?);
            }
        }
        Ok(examples)
    }

    /// Concrete schema names grouped by trace depth.
    pub fn schemas_by_depth(&self) -> BTreeMap<usize, Vec<String>> {
        let mut by_depth: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for schema in self.schemas.values().filter(|s| !s.is_abstract) {
            by_depth
                .entry(schema.trace_depth())
                .or_default()
                .push(schema.name.clone());
        }
        by_depth
    }

    fn sample_depth(&mut self) -> Option<usize> {
        let (depths, weights): (Vec<usize>, Vec<f64>) =
            self.depth_weights.iter().map(|(d, w)| (*d, *w)).unzip();
        let index = WeightedIndex::new(&weights).ok()?;
        Some(depths[index.sample(&mut self.rng)])
    }
}

/// With probability `prob`, swap in the gsm8k-style variant: `{variant}_gsm8k`
/// when the schema names a variant, else `gsm8k_style`.
fn choose_variant<R: Rng + ?Sized>(
    vocab: &Vocab,
    pattern: &str,
    variant: Option<&str>,
    prob: f64,
    rng: &mut R,
) -> Option<String> {
    if prob > 0.0 && rng.gen_bool(prob) {
        let candidate = match variant {
            Some(v) => format!("{}_gsm8k", v),
            None => GSM8K_VARIANT.to_string(),
        };
        if vocab.has_pattern_key(pattern, &candidate) {
            return Some(candidate);
        }
    }
    variant.map(str::to_string)
}

// =============================================================================
// Trace Building
// =============================================================================

/// Turn schema trace ops into typed steps.
///
/// `init` values and entity amounts are bound to the sampled variables;
/// compute arguments and percentage operands stay symbolic so the solver
/// resolves them against its own state.
pub fn build_trace(ops: &[TraceOpSpec], variables: &VariableMap) -> Result<Vec<TraceStep>> {
    ops.iter()
        .enumerate()
        .map(|(i, op)| build_step(i, op, variables))
        .collect()
}

fn build_step(i: usize, op: &TraceOpSpec, variables: &VariableMap) -> Result<TraceStep> {
    let step = match op.op {
        TraceOpKind::Init => {
            let (value, source) = match required(i, "value", op.value.as_ref())? {
                JsonValue::String(name) => (
                    variables.get(name).cloned().unwrap_or(Value::Int(0)),
                    Some(name.clone()),
                ),
                literal => (
                    Value::from_json(literal)
                        .ok_or_else(|| Error::internal(format!("trace step {}: invalid init value", i)))?,
                    None,
                ),
            };
            TraceStep::Init {
                var: required(i, "var", op.var.as_ref())?.clone(),
                value,
                source,
            }
        }
        TraceOpKind::Compute | TraceOpKind::Compare => {
            let compute_op = *required(i, "compute_op", op.compute_op.as_ref())?;
            let args = required(i, "args", op.args.as_ref())?
                .iter()
                .map(|arg| operand(i, arg))
                .collect::<Result<Vec<_>>>()?;
            let var = op.var.clone();
            if op.op == TraceOpKind::Compute {
                TraceStep::Compute { compute_op, args, var }
            } else {
                TraceStep::Compare { compute_op, args, var }
            }
        }
        TraceOpKind::Formula => TraceStep::Formula {
            expression: required(i, "expression", op.expression.as_ref())?.clone(),
        },
        TraceOpKind::Query => TraceStep::Query {
            var: required(i, "var", op.var.as_ref())?.clone(),
        },
        TraceOpKind::Transfer => TraceStep::Transfer {
            from_entity: required(i, "from_entity", op.from_entity.as_ref())?.clone(),
            to_entity: required(i, "to_entity", op.to_entity.as_ref())?.clone(),
            amount: amount(i, op, variables)?,
        },
        TraceOpKind::Consume => TraceStep::Consume {
            entity: required(i, "entity", op.entity.as_ref())?.clone(),
            amount: amount(i, op, variables)?,
        },
        TraceOpKind::AddEntity => TraceStep::AddEntity {
            entity: required(i, "entity", op.entity.as_ref())?.clone(),
            amount: amount(i, op, variables)?,
        },
        TraceOpKind::PercentOff | TraceOpKind::PercentIncrease | TraceOpKind::PercentOf => {
            let base = operand(i, required(i, "base", op.base.as_ref())?)?;
            let rate = operand(i, required(i, "rate", op.rate.as_ref())?)?;
            let var = op.var.clone();
            match op.op {
                TraceOpKind::PercentOff => TraceStep::PercentOff { base, rate, var },
                TraceOpKind::PercentIncrease => TraceStep::PercentIncrease { base, rate, var },
                _ => TraceStep::PercentOf { base, rate, var },
            }
        }
    };
    Ok(step)
}

fn required<'a, T>(i: usize, field: &str, value: Option<&'a T>) -> Result<&'a T> {
    value.ok_or_else(|| Error::internal(format!("trace step {} is missing '{}'", i, field)))
}

fn operand(i: usize, value: &JsonValue) -> Result<Operand> {
    match value {
        JsonValue::String(name) => Ok(Operand::Name(name.clone())),
        JsonValue::Number(n) => n
            .as_f64()
            .map(Operand::Number)
            .ok_or_else(|| Error::internal(format!("trace step {}: number out of range", i))),
        other => Err(Error::internal(format!("trace step {}: invalid operand {}", i, other))),
    }
}

/// Entity amounts naming a variable are bound to its sampled value.
fn amount(i: usize, op: &TraceOpSpec, variables: &VariableMap) -> Result<Operand> {
    match required(i, "amount", op.amount.as_ref())? {
        JsonValue::String(name) => Ok(match variables.get(name).and_then(Value::as_f64) {
            Some(value) => Operand::Number(value),
            None => Operand::Name(name.clone()),
        }),
        other => operand(i, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vocab() -> Vocab {
        Vocab::from_value(json!({
            "names": {
                "male": ["Tom", "Raj"],
                "female": ["Mia", "Ana"],
                "neutral": ["Sam"],
                "pronouns": {
                    "male": {"subject": "he", "object": "him", "possessive": "his", "reflexive": "himself"},
                    "female": {"subject": "she", "object": "her", "possessive": "her", "reflexive": "herself"},
                    "neutral": {"subject": "they", "object": "them", "possessive": "their", "reflexive": "themselves"}
                }
            },
            "items": {"countable_singular": ["apple", "pencil", "marble"]},
            "patterns": {
                "buy_more": {
                    "templates": ["${name} has ${start} ${item_plural} and buys ${extra} more. How many ${item_plural} ${does_do} ${subject} have now?"],
                    "gsm8k_style": ["${name} starts the day with ${start} ${item_plural}. Later ${subject} ${verb_s_buys} ${extra} more. How many now?"]
                }
            }
        }))
    }

    fn schema(value: serde_json::Value) -> SchemaSpec {
        SchemaSpec::from_value(value).unwrap()
    }

    fn buy_more() -> SchemaSpec {
        schema(json!({
            "name": "buy_more",
            "pattern": "buy_more",
            "variables": {
                "start": {"type": "int", "min": 3, "max": 40},
                "extra": {"type": "int", "min": 2, "max": 12}
            },
            "vocab": {
                "person": {"type": "person_with_pronouns"},
                "item": {"path": "items.countable_singular"}
            },
            "template_vars": {"verb_s_buys": "buys"},
            "trace": [
                {"op": "init", "var": "start", "value": "start"},
                {"op": "init", "var": "extra", "value": "extra"},
                {"op": "compute", "compute_op": "add", "args": ["start", "extra"], "var": "total"},
                {"op": "query", "var": "total"}
            ],
            "answer": "start + extra"
        }))
    }

    fn sharing() -> SchemaSpec {
        schema(json!({
            "name": "sharing",
            "expert": "entity_track",
            "templates": ["${name} has ${have} stickers and gives ${give} to a friend. How many are left?"],
            "variables": {
                "have": {"type": "int", "min": 20, "max": 30},
                "give": {"type": "int", "min": 1, "max": 9}
            },
            "vocab": {"person": {"type": "person_with_pronouns"}},
            "trace": [
                {"op": "init", "var": "mine", "value": "have"},
                {"op": "transfer", "from_entity": "mine", "to_entity": "friend", "amount": "give"},
                {"op": "query", "var": "mine"}
            ],
            "answer": "have - give"
        }))
    }

    fn generator(seed: u64, schemas: Vec<SchemaSpec>) -> SchemaGenerator {
        let schemas = schemas.into_iter().map(|s| (s.name.clone(), s)).collect();
        SchemaGenerator::new(schemas, vocab(), GenerationConfig::for_debugging(seed))
    }

    #[test]
    fn test_generate_answer_matches_trace() {
        let mut gen = generator(7, vec![buy_more()]);
        let example = gen.generate("buy_more").unwrap();

        let start = example.trace.iter().find_map(|s| match s {
            TraceStep::Init { var, value, .. } if var == "start" => value.as_f64(),
            _ => None,
        });
        let extra = example.trace.iter().find_map(|s| match s {
            TraceStep::Init { var, value, .. } if var == "extra" => value.as_f64(),
            _ => None,
        });
        assert_eq!(example.answer, start.unwrap() + extra.unwrap());
        assert_eq!(example.expert, "arithmetic");
        assert_eq!(example.schema.as_deref(), Some("buy_more"));
        assert_eq!(example.depth(), 1);
        assert!(example.constraints_satisfied);
        assert!(!example.query.contains("${"), "{}", example.query);
    }

    #[test]
    fn test_same_seed_same_output() {
        let mut a = generator(42, vec![buy_more(), sharing()]);
        let mut b = generator(42, vec![buy_more(), sharing()]);

        let first = a.generate_batch(&[], 8).unwrap();
        let second = b.generate_batch(&[], 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reseed_restarts_stream() {
        let mut gen = generator(3, vec![buy_more()]);
        let first = gen.generate("buy_more").unwrap();
        gen.reseed(3);
        assert_eq!(gen.generate("buy_more").unwrap(), first);
    }

    #[test]
    fn test_entity_schema_uses_entity_solver() {
        let mut gen = generator(11, vec![sharing()]);
        let example = gen.generate("sharing").unwrap();

        assert_eq!(example.expert, "entity_track");
        assert!(matches!(
            &example.trace[1],
            TraceStep::Transfer { amount: Operand::Number(_), .. }
        ));
        assert!(example.answer >= 11.0);
    }

    #[test]
    fn test_unknown_schema() {
        let mut gen = generator(1, vec![buy_more()]);
        assert!(matches!(gen.generate("nope"), Err(Error::UnknownSchema(name)) if name == "nope"));
    }

    #[test]
    fn test_answer_mismatch_detected() {
        let mut broken = buy_more();
        broken.answer = "start * extra + 1000".to_string();
        let mut gen = generator(5, vec![broken]);

        assert!(matches!(gen.generate("buy_more"), Err(Error::AnswerMismatch { .. })));
    }

    #[test]
    fn test_unsatisfiable_constraint_reported() {
        let mut spec = buy_more();
        spec.constraints = serde_json::from_value(json!({"start - extra": {"min": 1000}})).unwrap();
        let mut gen = generator(9, vec![spec]).with_max_attempts(3);

        let example = gen.generate("buy_more").unwrap();
        assert!(!example.constraints_satisfied);
        assert_eq!(example.violated_constraints, vec!["start - extra".to_string()]);
    }

    #[test]
    fn test_unresolved_placeholder_is_error() {
        let mut spec = buy_more();
        spec.template_vars = Default::default();
        let mut gen = generator(2, vec![spec]);
        gen.set_gsm8k_style_prob(1.0);

        let err = gen.generate("buy_more").unwrap_err();
        assert!(err.to_string().contains("verb_s_buys"), "{}", err);
    }

    #[test]
    fn test_gsm8k_variant_selected() {
        let mut gen = generator(4, vec![buy_more()]);
        gen.set_gsm8k_style_prob(1.0);
        let example = gen.generate("buy_more").unwrap();
        assert!(example.query.contains("starts the day"), "{}", example.query);
    }

    #[test]
    fn test_balanced_covers_every_expert() {
        let mut gen = generator(8, vec![buy_more(), sharing()]);
        let examples = gen.generate_balanced(6).unwrap();

        assert_eq!(examples.len(), 6);
        let experts: Vec<&str> = examples.iter().map(|e| e.expert.as_str()).collect();
        assert_eq!(experts.iter().filter(|e| **e == "arithmetic").count(), 3);
        assert_eq!(experts.iter().filter(|e| **e == "entity_track").count(), 3);
    }

    #[test]
    fn test_target_depth_falls_back_to_nearest() {
        let mut gen = generator(6, vec![buy_more()]);
        let example = gen.generate_with_target_depth(Some(4)).unwrap();
        assert_eq!(example.schema.as_deref(), Some("buy_more"));

        let sampled = gen.generate_depth_distribution(3).unwrap();
        assert_eq!(sampled.len(), 3);
    }

    #[test]
    fn test_abstract_schemas_hidden() {
        let mut base = buy_more();
        base.name = "base".into();
        base.is_abstract = true;
        let mut gen = generator(1, vec![buy_more(), base]);

        assert_eq!(gen.schema_names(), vec!["buy_more".to_string()]);
        assert!(matches!(gen.generate("base"), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_build_trace_binds_values() {
        let spec = sharing();
        let mut vars = VariableMap::new();
        vars.insert("have".into(), Value::Int(25));
        vars.insert("give".into(), Value::Int(4));

        let trace = build_trace(&spec.trace, &vars).unwrap();
        assert_eq!(
            trace[0],
            TraceStep::Init {
                var: "mine".into(),
                value: Value::Int(25),
                source: Some("have".into()),
            }
        );
        assert_eq!(
            trace[1],
            TraceStep::Transfer {
                from_entity: "mine".into(),
                to_entity: "friend".into(),
                amount: Operand::Number(4.0),
            }
        );
    }
}

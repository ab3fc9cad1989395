use std::collections::BTreeSet;

use virtual_expert_arithmetic::{
    data, ContractValidator, SchemaGenerator, SchemaLoader, TemplateAnalyzer, TraceVerifier, Vocab,
};
use virtual_expert_core::config::GenerationConfig;
use virtual_expert_core::{TraceStep, VerificationResult};

// =============================================================================
// Helpers
// =============================================================================

fn generator(config: GenerationConfig) -> SchemaGenerator {
    let schemas = SchemaLoader::new(data::schema_dir()).load_all().unwrap();
    let vocab = Vocab::load(data::vocab_dir()).unwrap();
    SchemaGenerator::new(schemas, vocab, config)
}

fn seeded(seed: u64) -> GenerationConfig {
    GenerationConfig {
        seed: Some(seed),
        ..GenerationConfig::default()
    }
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_bundled_schemas_load() {
    let schemas = SchemaLoader::new(data::schema_dir()).load_all().unwrap();

    for name in ["shopping_total", "give_away", "discount", "times_more", "work_rate"] {
        assert!(schemas.contains_key(name), "missing schema {}", name);
    }
    // Bases and mixins are never schemas on their own.
    assert!(!schemas.contains_key("person_item"));
    assert!(!schemas.contains_key("clothing"));

    let equal_groups = &schemas["equal_groups"];
    assert_eq!(equal_groups.expert, "arithmetic");
    assert!(equal_groups.vocab.contains_key("person"));
    assert!(equal_groups.vocab.contains_key("container"));
    assert!(!equal_groups.is_abstract);
}

#[test]
fn test_bundled_contracts_hold() {
    let schemas = SchemaLoader::new(data::schema_dir()).load_all().unwrap();
    let vocab = Vocab::load(data::vocab_dir()).unwrap();

    let errors = ContractValidator::new(&vocab).validate_all(schemas.values());
    assert!(errors.is_empty(), "{:#?}", errors);
}

#[test]
fn test_bundled_vocab_sections() {
    let vocab = Vocab::load(data::vocab_dir()).unwrap();

    assert!(vocab.get_list("names.female").is_some());
    assert!(vocab.get_list("items.countable_singular").is_some());
    assert!(vocab.get("patterns.percent_change.discount").is_some());
    let mut domains = vocab.domain_names();
    domains.sort();
    assert_eq!(domains, vec!["factory", "farm", "kitchen"]);
}

// =============================================================================
// Generation
// =============================================================================

#[tokio::test]
async fn test_every_schema_generates_verified_examples() {
    let verifier = TraceVerifier::new();

    for seed in 0..6 {
        let mut gen = generator(seeded(seed));
        for name in gen.schema_names() {
            let example = gen
                .generate(&name)
                .unwrap_or_else(|e| panic!("{} (seed {}): {}", name, seed, e));

            assert!(!example.query.contains("${"), "{}: {}", name, example.query);
            assert!(example.constraints_satisfied, "{}: {:?}", name, example.violated_constraints);
            assert_eq!(example.schema.as_deref(), Some(name.as_str()));

            let result = verifier.verify_example(&example).await;
            assert_eq!(
                result.reward,
                VerificationResult::REWARD_CORRECT,
                "{} (seed {}): {:?}",
                name,
                seed,
                result.error
            );
        }
    }
}

#[tokio::test]
async fn test_float_schema_prices_in_cents() {
    let verifier = TraceVerifier::new();

    for seed in 0..10 {
        let mut gen = generator(seeded(seed));
        let example = gen.generate("unit_price").unwrap();

        let init = |name: &str| {
            example.trace.iter().find_map(|step| match step {
                TraceStep::Init { var, value, .. } if var == name => value.as_f64(),
                _ => None,
            })
        };
        let price = init("price").unwrap();
        let quantity = init("quantity").unwrap();

        assert!((1.25..=4.75).contains(&price), "price {}", price);
        assert_eq!((price * 100.0).round() / 100.0, price);
        assert!((example.answer - price * quantity).abs() < 1e-9);

        let shown = if price.fract() == 0.0 {
            format!("${}", price as i64)
        } else {
            format!("${:.2}", price)
        };
        assert!(example.query.contains(&shown), "{} not in {}", shown, example.query);

        let result = verifier.verify_example(&example).await;
        assert_eq!(result.reward, VerificationResult::REWARD_CORRECT, "{:?}", result.error);
    }
}

#[test]
fn test_debugging_preset_generates_everything() {
    let mut gen = generator(GenerationConfig::for_debugging(11));
    let examples = gen.generate_batch(&[], 30).unwrap();

    assert_eq!(examples.len(), 30);
    for example in &examples {
        assert!(!example.query.contains("${"), "{}", example.query);
    }
}

#[test]
fn test_same_seed_same_batch() {
    let first = generator(seeded(42)).generate_batch(&[], 25).unwrap();
    let second = generator(seeded(42)).generate_batch(&[], 25).unwrap();
    assert_eq!(first, second);

    let other = generator(seeded(43)).generate_batch(&[], 25).unwrap();
    assert_ne!(first, other);
}

#[test]
fn test_balanced_covers_every_expert() {
    let mut gen = generator(seeded(3));
    let examples = gen.generate_balanced(10).unwrap();

    let experts: BTreeSet<&str> = examples.iter().map(|e| e.expert.as_str()).collect();
    assert_eq!(
        experts.into_iter().collect::<Vec<_>>(),
        vec!["arithmetic", "comparison", "entity_track", "percentage", "rate_equation"]
    );
}

#[test]
fn test_depth_buckets() {
    let gen = generator(seeded(5));
    let by_depth = gen.schemas_by_depth();

    assert!(by_depth[&1].contains(&"shopping_total".to_string()));
    assert!(by_depth[&2].contains(&"equal_groups".to_string()));
    assert!(by_depth[&3].contains(&"savings_plan".to_string()));
}

#[test]
fn test_target_depth_and_distribution() {
    let mut gen = generator(seeded(8));

    let example = gen.generate_with_target_depth(Some(3)).unwrap();
    assert_eq!(example.schema.as_deref(), Some("savings_plan"));

    let examples = gen.generate_depth_distribution(40).unwrap();
    assert_eq!(examples.len(), 40);
    assert!(examples.iter().all(|e| e.depth() <= 3));
}

// =============================================================================
// Analysis
// =============================================================================

fn queries_at_level(level: f64) -> Vec<String> {
    let mut gen = generator(GenerationConfig {
        perturbation_level: level,
        ..GenerationConfig::for_debugging(21)
    });
    let names = vec!["give_away".to_string(), "shopping_total".to_string()];
    gen.generate_batch(&names, 60)
        .unwrap()
        .into_iter()
        .map(|e| e.query)
        .collect()
}

#[test]
fn test_perturbation_lowers_fingerprint() {
    let analyzer = TemplateAnalyzer::new();
    let plain = analyzer.analyze(&queries_at_level(0.0)).unwrap();
    let perturbed = analyzer.analyze(&queries_at_level(1.0)).unwrap();

    assert!(
        perturbed.fingerprint_score < plain.fingerprint_score,
        "perturbed {} vs plain {}",
        perturbed.fingerprint_score,
        plain.fingerprint_score
    );
    assert!(perturbed.uniformity.question_starter < plain.uniformity.question_starter);
}

use virtual_expert_arithmetic::{SchemaGenerator, TraceVerifier};
use virtual_expert_core::config::AppConfig;
use virtual_expert_core::{TraceExample, VerificationResult};

// =============================================================================
// Helpers
// =============================================================================

fn config(seed: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.generation.seed = Some(seed);
    config
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn test_generated_batch_verifies() {
    let mut generator = SchemaGenerator::from_config(&config(17)).unwrap();
    let examples = generator.generate_batch(&[], 40).unwrap();
    let verifier = TraceVerifier::new();

    for example in &examples {
        let result = verifier.verify_example(example).await;
        assert_eq!(result.reward, VerificationResult::REWARD_CORRECT, "{:?}", result.error);
    }
}

#[tokio::test]
async fn test_json_line_replays_through_verifier() {
    let mut generator = SchemaGenerator::from_config(&config(4)).unwrap();
    let example = generator.generate("give_away").unwrap();

    let line = serde_json::to_string(&example).unwrap();
    let parsed: TraceExample = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed, example);

    let yaml = format!(
        "expert: {}\ntrace:\n{}",
        parsed.expert,
        serde_yaml::to_string(&parsed.trace).unwrap()
    );
    let result = TraceVerifier::new()
        .verify(&yaml, Some(parsed.answer), Some("entity_track"), 0.01)
        .await;
    assert!(result.answer_correct, "{:?}", result.error);
}

#[tokio::test]
async fn test_model_answer_with_wrong_expert() {
    let mut generator = SchemaGenerator::from_config(&config(9)).unwrap();
    let example = generator.generate("discount").unwrap();

    let yaml = format!(
        "expert: arithmetic\ntrace:\n{}",
        serde_yaml::to_string(&example.trace).unwrap()
    );
    let result = TraceVerifier::new()
        .verify(&yaml, Some(example.answer), Some(&example.expert), 0.01)
        .await;
    assert_eq!(result.reward, VerificationResult::REWARD_WRONG_EXPERT);
}

#[test]
fn test_depth_distribution_batch() {
    let mut config = config(21);
    config.batch.use_depth_distribution = true;

    let mut generator = SchemaGenerator::from_config(&config).unwrap();
    let examples = generator.generate_depth_distribution(config.batch.batch_size).unwrap();
    assert_eq!(examples.len(), config.batch.batch_size);
}

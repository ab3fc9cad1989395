//! expert_forge - schema-driven word-problem generator.
//!
//! Usage: `expert_forge [count] [schema...]`
//!
//! Prints one generated example per line as JSON. Every example is replayed
//! through the trace verifier before it is printed.

use virtual_expert_arithmetic::{ContractValidator, SchemaGenerator, TraceVerifier};
use virtual_expert_core::config::AppConfig;
use virtual_expert_core::VerificationResult;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    virtual_expert_core::telemetry::configure_tracing(&config.logging)?;

    tracing::info!("Starting expert_forge v{}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let count = match args.next() {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("count must be a positive integer, got '{}'", raw))?,
        None => config.batch.batch_size,
    };
    let names: Vec<String> = args.collect();

    // =========================================================================
    // Load schemas and vocabulary
    // =========================================================================
    let mut generator = SchemaGenerator::from_config(&config)?;
    let schemas = generator.schema_names();
    tracing::info!(
        schemas = schemas.len(),
        schema_dir = %config.paths.schema_dir.display(),
        "Generator ready"
    );

    let contract_errors = {
        let validator = ContractValidator::new(generator.vocab());
        let specs = schemas.iter().filter_map(|name| generator.schema(name));
        validator.validate_all(specs)
    };
    for (schema, errors) in &contract_errors {
        for error in errors {
            tracing::warn!(schema = %schema, error = %error, "Template contract violated");
        }
    }

    // =========================================================================
    // Generate
    // =========================================================================
    let examples = if names.is_empty() && config.batch.use_depth_distribution {
        generator.generate_depth_distribution(count)?
    } else {
        generator.generate_batch(&names, count)?
    };

    let verifier =
        TraceVerifier::new().with_answer_tolerance(generator.config().answer_tolerance);
    let mut rejected = 0usize;
    for example in &examples {
        let result = verifier.verify_example(example).await;
        if result.reward < VerificationResult::REWARD_CORRECT {
            rejected += 1;
            tracing::warn!(
                schema = ?example.schema,
                reward = result.reward,
                error = ?result.error,
                "Example failed verification"
            );
            continue;
        }
        println!("{}", serde_json::to_string(example)?);
    }

    tracing::info!(
        generated = examples.len(),
        rejected,
        "Generation complete"
    );
    Ok(())
}

//! End-to-end tests for the generation engine against a real on-disk ledger.

use mintgen::engine::{GenerateError, Generator};
use mintgen::filter::is_compatible;
use mintgen::ledger::TokenLedger;
use mintgen::publish::{PublishError, Publisher};
use mintgen::schema::Schema;
use mintgen::token::Token;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tempfile::tempdir;

/// Two layers of sizes 2 and 3 (capacity 6) with one excluded pairing.
const SCENARIO_SCHEMA: &str = r#"{
    "layers": [
        {"name": "background", "values": ["red", "blue"], "weights": [1, 1]},
        {"name": "body", "values": ["gold", "silver", "bronze"], "weights": [1, 1, 1]}
    ],
    "incompatibilities": [
        {"layer": "background", "value": "red", "incompatible_with": ["gold"]}
    ]
}"#;

fn scenario_generator(dir: &Path) -> Generator {
    let schema = Schema::from_str(SCENARIO_SCHEMA).unwrap();
    let ledger = TokenLedger::open(dir).unwrap();
    Generator::new(schema, ledger).unwrap()
}

#[test]
fn test_scenario_five_valid_combinations_then_capacity() {
    let dir = tempdir().unwrap();
    let generator = scenario_generator(dir.path());
    let mut rng = StdRng::seed_from_u64(101);

    assert_eq!(generator.capacity(), 6);

    // Five commits always succeed: the excluded pairing leaves five valid
    // combinations and the nonce lets valid combinations repeat.
    for expected_index in 0..5 {
        let index = generator.generate_with_rng(&mut rng).unwrap();
        assert_eq!(index, expected_index);
        assert_eq!(generator.generated_tokens_count(), expected_index + 1);
    }

    // Raw capacity counts all combinations, not just compatible ones, so a
    // sixth commit is still available.
    assert_eq!(generator.generate_with_rng(&mut rng).unwrap(), 5);

    // Past capacity the engine reports exhaustion and the ledger holds.
    let log_before = fs::read_to_string(dir.path().join("tokens.log")).unwrap();
    let err = generator.generate_with_rng(&mut rng).unwrap_err();
    assert!(matches!(err, GenerateError::Exhausted { capacity: 6 }));
    assert_eq!(generator.generated_tokens_count(), 6);
    let log_after = fs::read_to_string(dir.path().join("tokens.log")).unwrap();
    assert_eq!(log_before, log_after);
}

#[test]
fn test_committed_hashes_are_pairwise_distinct() {
    let dir = tempdir().unwrap();
    let generator = scenario_generator(dir.path());
    let mut rng = StdRng::seed_from_u64(202);

    for _ in 0..6 {
        generator.generate_with_rng(&mut rng).unwrap();
    }

    let ledger = TokenLedger::open(dir.path()).unwrap();
    let distinct: HashSet<&String> = ledger.entries().iter().collect();
    assert_eq!(distinct.len(), 6);
}

#[test]
fn test_committed_tokens_always_satisfy_the_filter() {
    let dir = tempdir().unwrap();
    let generator = scenario_generator(dir.path());
    let schema = Schema::from_str(SCENARIO_SCHEMA).unwrap();
    let mut rng = StdRng::seed_from_u64(303);

    for _ in 0..6 {
        generator.generate_with_rng(&mut rng).unwrap();
    }

    let ledger = TokenLedger::open(dir.path()).unwrap();
    for index in 0..ledger.count() {
        let token: Token = serde_json::from_str(&ledger.read_payload(index).unwrap()).unwrap();
        assert!(
            is_compatible(&schema, &token),
            "committed token {} violates a rule",
            index
        );
        if token.get("background") == Some("red") {
            assert_ne!(token.get("body"), Some("gold"));
        }
    }
}

#[test]
fn test_count_is_stable_across_restart() {
    let dir = tempdir().unwrap();

    {
        let generator = scenario_generator(dir.path());
        let mut rng = StdRng::seed_from_u64(404);
        for _ in 0..3 {
            generator.generate_with_rng(&mut rng).unwrap();
        }
        assert_eq!(generator.generated_tokens_count(), 3);
    }

    // Simulated restart: everything is rebuilt from the log file alone.
    let generator = scenario_generator(dir.path());
    assert_eq!(generator.generated_tokens_count(), 3);

    let mut rng = StdRng::seed_from_u64(505);
    assert_eq!(generator.generate_with_rng(&mut rng).unwrap(), 3);
    assert_eq!(generator.generated_tokens_count(), 4);
}

struct RecordingPublisher;

impl Publisher for RecordingPublisher {
    fn publish(&self, _token: &Token, index: u64) -> Result<String, PublishError> {
        Ok(format!("pin://{}", index))
    }
}

struct FailingPublisher;

impl Publisher for FailingPublisher {
    fn publish(&self, _token: &Token, _index: u64) -> Result<String, PublishError> {
        Err(PublishError::Unavailable {
            reason: "pinning service down".to_string(),
        })
    }
}

#[test]
fn test_publisher_reference_is_recorded_after_commit() {
    let dir = tempdir().unwrap();
    let generator = scenario_generator(dir.path()).with_publisher(Box::new(RecordingPublisher));
    let mut rng = StdRng::seed_from_u64(606);

    let index = generator.generate_with_rng(&mut rng).unwrap();

    let ledger = TokenLedger::open(dir.path()).unwrap();
    assert_eq!(
        ledger.external_ref(index).unwrap().as_deref(),
        Some(format!("pin://{}", index).as_str())
    );
}

#[test]
fn test_publish_failure_never_rolls_back_a_commit() {
    let dir = tempdir().unwrap();
    let generator = scenario_generator(dir.path()).with_publisher(Box::new(FailingPublisher));
    let mut rng = StdRng::seed_from_u64(707);

    let index = generator.generate_with_rng(&mut rng).unwrap();
    assert_eq!(generator.generated_tokens_count(), 1);

    let ledger = TokenLedger::open(dir.path()).unwrap();
    assert_eq!(ledger.count(), 1);
    assert_eq!(ledger.external_ref(index).unwrap(), None);
    // The payload committed even though publishing was deferred.
    assert!(ledger.read_payload(index).is_ok());
}

#[test]
fn test_payloads_reload_as_the_committed_tokens() {
    let dir = tempdir().unwrap();
    let generator = scenario_generator(dir.path());
    let mut rng = StdRng::seed_from_u64(808);

    for _ in 0..4 {
        generator.generate_with_rng(&mut rng).unwrap();
    }

    let ledger = TokenLedger::open(dir.path()).unwrap();
    for (index, expected_hash) in ledger.entries().iter().enumerate() {
        let token: Token = serde_json::from_str(&ledger.read_payload(index as u64).unwrap()).unwrap();
        assert_eq!(token.content_hash(), *expected_hash);
        assert_eq!(token.attributes.len(), 2);
    }
}

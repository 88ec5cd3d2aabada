//! Configuration files driving a run.

use deallens::prelude::*;
use deallens::testing::{sample_providers, SAMPLE_RFP};
use std::collections::BTreeMap;
use std::io::Write;

#[tokio::test]
async fn test_file_config_caps_matches_and_competitors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deallens.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
top_k = 1
max_competitors = 1
default_competitors = ["Acme Analytics", "Globex Consulting"]

[timeouts]
scoring_ms = 5000
"#
    )
    .unwrap();

    let config = AnalysisConfig::from_file(&path).unwrap();
    let ctx = Orchestrator::new(sample_providers(), config)
        .run(SAMPLE_RFP, &[], BTreeMap::new())
        .await
        .unwrap();

    assert_eq!(ctx.internal_matches().map(<[MatchResult]>::len), Some(1));
    assert_eq!(ctx.competitor_names(), ["Acme Analytics".to_string()]);
    assert!(ctx
        .warnings()
        .iter()
        .any(|w| w.contains("truncated to 1; dropped: Globex Consulting")));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AnalysisConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, DealLensError::Io(_) | DealLensError::Config(_)));
}

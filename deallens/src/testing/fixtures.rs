//! Sample documents and provider setups.

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

use super::mocks::{InMemoryCompetitorDirectory, InMemoryRetrieval, StaticCompletion};
use crate::providers::{CompetitorRecord, Providers, RetrievalCandidate};

/// A realistic tender document.
pub const SAMPLE_RFP: &str = "\
Regional Health Authority: Request for Proposal RHA-2026-014
Regional health data platform

The Authority seeks a supplier to design, build and operate a cloud data platform
for patient records. The platform must run on Kubernetes and all patient data
must be encrypted at rest and in transit to meet security and compliance rules.
Bidders shall name a delivery manager and report progress weekly. Operations
support after go-live is desirable. Pricing for the implementation phase must be
fixed. Data residency requirements for backups are to be determined.

Evaluation: technical merit 50%, delivery approach 30%, price 20%.
Submission: a single PDF through the procurement portal within 30 days.";

/// Line-format completion output matching [`SAMPLE_RFP`].
pub const SAMPLE_COMPLETION_TEXT: &str = "\
Title: Regional health data platform
Timeline: Go-live within 9 months of award
Budget: EUR 2-3M
Submission: Single PDF through the procurement portal
Requirement [Technical] (mandatory): Deliver a cloud data platform on Kubernetes
Requirement [Technical] (mandatory): Encrypt patient data at rest and in transit
Requirement [Delivery] (mandatory): Provide a named delivery manager and weekly reporting
Requirement [Delivery] (optional): Offer 24/7 operations support after go-live
Requirement [Price] (mandatory): Fixed price for the implementation phase
Criterion: Technical (50%)
Criterion: Delivery (30%)
Criterion: Price (20%)
Risk: Data residency rules are unclear for backups";

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Past projects relevant to [`SAMPLE_RFP`].
#[must_use]
pub fn sample_retrieval() -> InMemoryRetrieval {
    let mut store = InMemoryRetrieval::new();
    let projects = [
        (
            "P-201",
            "Cloud data platform on Kubernetes for a hospital group",
            date(2024, 6, 30),
        ),
        (
            "P-202",
            "Named delivery manager with weekly reporting for a public sector programme",
            date(2023, 3, 31),
        ),
        (
            "P-203",
            "Encrypt claims data at rest and in transit for an insurer",
            date(2022, 11, 30),
        ),
    ];
    for (id, description, completed_on) in projects {
        store = match completed_on {
            Some(day) => store.with_dated_project(id, description, day),
            None => store.with_project(id, description),
        };
    }
    store
}

/// Competitor directory for [`SAMPLE_RFP`].
///
/// Knows "Acme Analytics" and "Globex Consulting"; lookups for "Initech" fail.
#[must_use]
pub fn sample_directory() -> InMemoryCompetitorDirectory {
    InMemoryCompetitorDirectory::new()
        .with_record(CompetitorRecord {
            name: "Acme Analytics".to_string(),
            capabilities: vec!["kubernetes".to_string(), "encrypt patient data".to_string()],
            price_positioning: "premium".to_string(),
            track_record_score: 0.8,
            strengths: vec!["Large healthcare reference base".to_string()],
            weaknesses: vec!["Slow to mobilise".to_string()],
        })
        .with_record(CompetitorRecord {
            name: "Globex Consulting".to_string(),
            capabilities: vec!["fixed price".to_string()],
            price_positioning: "low".to_string(),
            track_record_score: 0.4,
            strengths: Vec::new(),
            weaknesses: vec!["Thin technical bench".to_string()],
        })
        .failing_for("Initech")
}

/// Providers answering [`SAMPLE_RFP`] with line-format output.
#[must_use]
pub fn sample_providers() -> Providers {
    Providers::new(
        Arc::new(StaticCompletion::text(SAMPLE_COMPLETION_TEXT)),
        Arc::new(sample_retrieval()),
        Arc::new(sample_directory()),
    )
}

/// Structured extraction with criteria `{Technical: 0.6, Price: 0.4}`.
#[must_use]
pub fn worked_example_extraction() -> serde_json::Value {
    json!({
        "title": "Container platform modernisation",
        "requirements": [
            {
                "id": "REQ-001",
                "text": "Migrate customer workloads to a managed Kubernetes platform",
                "category": "Technical",
                "is_mandatory": true,
                "criterion": "Technical"
            },
            {
                "id": "REQ-002",
                "text": "Quote a fixed price for the full delivery",
                "category": "Price",
                "is_mandatory": true,
                "criterion": "Price"
            }
        ],
        "evaluation_criteria": [
            {"name": "Technical", "weight": 0.6},
            {"name": "Price", "weight": 0.4}
        ],
        "risk_flags": []
    })
}

/// Providers for the worked example: one match at 0.9 covering the
/// Technical requirement and an empty competitor directory.
#[must_use]
pub fn worked_example_providers() -> Providers {
    Providers::new(
        Arc::new(StaticCompletion::json(worked_example_extraction())),
        Arc::new(
            InMemoryRetrieval::new().with_pinned("kubernetes", RetrievalCandidate::new("P-100", 0.9)),
        ),
        Arc::new(InMemoryCompetitorDirectory::new()),
    )
}

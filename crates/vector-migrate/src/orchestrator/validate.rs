//! Sample-based validation of migrated data.
//!
//! Pulls a sample from the source, locates the same ids in the target, and
//! compares vectors by cosine similarity. Metadata equality is not checked
//! here; the transformer may have legitimately reshaped it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Record, VectorStore};
use crate::error::Result;
use crate::state::{StateTracker, ValidationStats};

/// How many target batches to scan while looking for sampled ids before
/// giving up on the remainder.
const MAX_TARGET_SCAN_BATCHES: usize = 100;

/// Result of a validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Records sampled from the source.
    pub total_sampled: i64,

    /// Sampled records found in the target with a comparable vector.
    pub valid_records: i64,

    /// Sampled records missing from the target or dimensionally mismatched.
    pub invalid_records: i64,

    pub avg_cosine_similarity: f64,
    pub min_cosine_similarity: f64,
    pub max_cosine_similarity: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationIssue>,
}

/// A single validation discrepancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub record_id: String,
    pub message: String,
}

impl ValidationReport {
    /// Condensed form stored in the checkpoint.
    pub fn to_stats(&self) -> ValidationStats {
        ValidationStats {
            sampled_count: self.total_sampled,
            avg_cosine_similarity: self.avg_cosine_similarity,
            min_cosine_similarity: self.min_cosine_similarity,
            max_cosine_similarity: self.max_cosine_similarity,
        }
    }
}

/// Sample `sample_size` records from the source and compare their vectors
/// against the target.
pub async fn validate_migration(
    source: &dyn VectorStore,
    target: &dyn VectorStore,
    sample_size: usize,
) -> Result<ValidationReport> {
    let sample = source.get_batch(None, sample_size).await?;

    let mut wanted: HashMap<&str, &Record> =
        sample.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut similarities = Vec::with_capacity(sample.len());
    let mut errors = Vec::new();

    // Scan the target in batches until every sampled id is accounted for or
    // the stream ends.
    let mut cursor: Option<String> = None;
    let mut scanned_batches = 0;
    while !wanted.is_empty() && scanned_batches < MAX_TARGET_SCAN_BATCHES {
        let batch = target.get_batch(cursor.as_deref(), sample_size.max(100)).await?;
        if batch.is_empty() {
            break;
        }
        cursor = batch.last().map(|r| r.id.clone());
        scanned_batches += 1;

        for found in &batch {
            if let Some(expected) = wanted.remove(found.id.as_str()) {
                if expected.vector.len() != found.vector.len() {
                    errors.push(ValidationIssue {
                        record_id: found.id.clone(),
                        message: format!(
                            "vector dimension mismatch: source {} target {}",
                            expected.vector.len(),
                            found.vector.len()
                        ),
                    });
                } else {
                    similarities.push(cosine_similarity(&expected.vector, &found.vector));
                }
            }
        }
    }

    for (id, _) in wanted {
        errors.push(ValidationIssue {
            record_id: id.to_string(),
            message: "record missing from target".to_string(),
        });
    }

    let (avg, min, max) = if similarities.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let sum: f64 = similarities.iter().sum();
        let min = similarities.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = similarities
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        (sum / similarities.len() as f64, min, max)
    };

    Ok(ValidationReport {
        total_sampled: sample.len() as i64,
        valid_records: similarities.len() as i64,
        invalid_records: errors.len() as i64,
        avg_cosine_similarity: avg,
        min_cosine_similarity: min,
        max_cosine_similarity: max,
        errors,
    })
}

/// Run validation and fold the statistics into the migration's checkpoint.
pub async fn validate_and_record(
    tracker: Arc<dyn StateTracker>,
    migration_id: &str,
    source: &dyn VectorStore,
    target: &dyn VectorStore,
    sample_size: usize,
) -> Result<ValidationReport> {
    let report = validate_migration(source, target, sample_size).await?;

    if let Some(mut checkpoint) = tracker.get_checkpoint(migration_id).await? {
        checkpoint.validation_stats = Some(report.to_stats());
        tracker.save_checkpoint(&checkpoint).await?;
    }

    Ok(report)
}

/// Cosine similarity of two equal-length vectors; 0.0 when either has zero
/// magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

//! Per-sample outcome accumulation and rendering for batch runs.
//!
//! A batch run always finishes and reports what happened to every sample;
//! one bad input never aborts the rest.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SampleOutcome {
    /// At least one raster was produced for the sample.
    Encoded { channels: usize },
    /// Nothing usable was found; the listed categories had no artifact.
    Skipped { missing: Vec<String> },
    /// Processing the sample hit an error.
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub identity: String,
    #[serde(flatten)]
    pub outcome: SampleOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub samples: Vec<SampleReport>,
}

impl BatchReport {
    /// Reports sorted by identity so output is stable across parallel runs.
    pub fn new(mut samples: Vec<SampleReport>) -> Self {
        samples.sort_by(|a, b| a.identity.cmp(&b.identity));
        Self { samples }
    }

    pub fn encoded_count(&self) -> usize {
        self.count(|o| matches!(o, SampleOutcome::Encoded { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, SampleOutcome::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, SampleOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&SampleOutcome) -> bool) -> usize {
        self.samples.iter().filter(|s| pred(&s.outcome)).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

pub fn print_report(report: &BatchReport, format: OutputFormat) {
    match format {
        OutputFormat::Text => print_text(report),
        OutputFormat::Json => print_json(report),
    }
}

fn print_text(report: &BatchReport) {
    println!("\n{}", "=".repeat(70));
    println!("BATCH RESULTS");
    println!("{}", "=".repeat(70));

    let skipped: Vec<_> = report
        .samples
        .iter()
        .filter(|s| matches!(s.outcome, SampleOutcome::Skipped { .. }))
        .collect();
    if !skipped.is_empty() {
        println!("\nSKIPPED, INCOMPLETE ({}):", skipped.len());
        for s in &skipped {
            if let SampleOutcome::Skipped { missing } = &s.outcome {
                println!("  [SKIP] {}  missing: {}", s.identity, missing.join(", "));
            }
        }
    }

    let failed: Vec<_> = report
        .samples
        .iter()
        .filter(|s| matches!(s.outcome, SampleOutcome::Failed { .. }))
        .collect();
    if !failed.is_empty() {
        println!("\nFAILED ({}):", failed.len());
        for s in &failed {
            if let SampleOutcome::Failed { error } = &s.outcome {
                println!("  [FAIL] {}  {}", s.identity, error);
            }
        }
    }

    println!("\nSUMMARY:");
    println!("  Samples:  {}", report.samples.len());
    println!("  Encoded:  {}", report.encoded_count());
    println!("  Skipped:  {}", report.skipped_count());
    println!("  Failed:   {}", report.failed_count());
    println!("{}", "=".repeat(70));
}

fn print_json(report: &BatchReport) {
    let output = serde_json::json!({
        "samples": report.samples,
        "summary": {
            "total": report.samples.len(),
            "encoded": report.encoded_count(),
            "skipped": report.skipped_count(),
            "failed": report.failed_count(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> BatchReport {
        BatchReport::new(vec![
            SampleReport {
                identity: "b".to_string(),
                outcome: SampleOutcome::Skipped {
                    missing: vec!["static".to_string()],
                },
            },
            SampleReport {
                identity: "a".to_string(),
                outcome: SampleOutcome::Encoded { channels: 4 },
            },
            SampleReport {
                identity: "c".to_string(),
                outcome: SampleOutcome::Failed {
                    error: "boom".to_string(),
                },
            },
        ])
    }

    #[test]
    fn samples_are_sorted_by_identity() {
        let report = report();
        let ids: Vec<_> = report.samples.iter().map(|s| s.identity.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn counts_partition_the_samples() {
        let report = report();
        assert_eq!(report.encoded_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let report = report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["samples"][0]["identity"], "a");
        assert_eq!(json["samples"][0]["outcome"], "encoded");
        assert_eq!(json["samples"][0]["channels"], 4);
        assert_eq!(json["samples"][1]["outcome"], "skipped");
        assert_eq!(json["samples"][1]["missing"][0], "static");
    }

    #[test]
    fn output_format_parses_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}

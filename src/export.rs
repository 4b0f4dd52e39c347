//! Export sinks
//!
//! A sink receives the final deduplicated cases plus the gap report. The
//! format belongs to the sink; the pipeline never serializes on its own.
//!
//! Run output is a pure function of its inputs. A write time, when wanted,
//! is stamped by the sink via `stamped`.

use crate::error::Result;
use crate::pipeline::RunOutput;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

/// Destination for a finished run
pub trait ExportSink {
    fn accept(&mut self, output: &RunOutput) -> Result<()>;
}

/// Writes the whole run as one JSON document
pub struct JsonSink<W: Write> {
    writer: W,
    pretty: bool,
    generated_at: Option<DateTime<Utc>>,
}

/// Run output with the write time as an extra top-level field
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stamped<'a> {
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    output: &'a RunOutput,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: true,
            generated_at: None,
        }
    }

    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Add a top-level `generatedAt` field
    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ExportSink for JsonSink<W> {
    fn accept(&mut self, output: &RunOutput) -> Result<()> {
        match self.generated_at {
            Some(generated_at) => {
                let stamped = Stamped {
                    generated_at,
                    output,
                };
                write_json(&mut self.writer, &stamped, self.pretty)?;
            }
            None => write_json(&mut self.writer, output, self.pretty)?,
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(writer, value)?;
    } else {
        serde_json::to_writer(writer, value)?;
    }
    Ok(())
}

/// Writes a human-readable case list followed by the gap report
pub struct TextSink<W: Write> {
    writer: W,
    generated_at: Option<DateTime<Utc>>,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            generated_at: None,
        }
    }

    /// Start the text with a `Generated:` line
    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ExportSink for TextSink<W> {
    fn accept(&mut self, output: &RunOutput) -> Result<()> {
        let w = &mut self.writer;
        if let Some(at) = self.generated_at {
            writeln!(w, "Generated: {}", at.to_rfc3339_opts(SecondsFormat::Secs, true))?;
        }
        writeln!(w, "Test cases: {}", output.cases.len())?;
        for case in &output.cases {
            writeln!(
                w,
                "\n{} [{}/{}] {} ({})",
                case.id, case.test_type, case.priority, case.title, case.scope
            )?;
            for (i, step) in case.steps.iter().enumerate() {
                writeln!(w, "  {}. {}", i + 1, step)?;
            }
            for expected in &case.expected {
                writeln!(w, "  ⇒ {}", expected)?;
            }
        }
        writeln!(w)?;
        write!(w, "{}", output.gaps.to_report())?;
        if !output.diagnostics.is_empty() {
            writeln!(w, "\nDiagnostics:")?;
            for diagnostic in &output.diagnostics {
                writeln!(w, "  {}", diagnostic)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::generate::RunContext;
    use crate::normalize::SourceInput;
    use crate::pipeline::run_pipeline;
    use crate::suggest::RuleBasedSource;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    async fn output() -> RunOutput {
        let inputs = vec![SourceInput::RequirementText {
            id: "reqs".into(),
            text: "REQ-1: Users must be able to log in".into(),
        }];
        run_pipeline(
            &GeneratorConfig::default(),
            &inputs,
            &RunContext::default(),
            Arc::new(RuleBasedSource),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_json_sink_writes_valid_json() {
        let output = output().await;
        let mut sink = JsonSink::new(Vec::new()).compact();
        sink.accept(&output).unwrap();
        let bytes = sink.into_inner();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["cases"][0]["id"], "TC-0001");
        assert_eq!(value["cases"][0]["type"], "FUNC");
        assert!(value["gaps"]["summary"]["meetsThreshold"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn test_stamp_comes_from_the_sink() {
        let output = output().await;
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();

        let mut json = JsonSink::new(Vec::new()).compact().stamped(at);
        json.accept(&output).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json.into_inner()).unwrap();
        assert_eq!(value["generatedAt"], "2026-10-18T09:30:00Z");
        assert_eq!(value["cases"][0]["id"], "TC-0001");

        let mut plain = JsonSink::new(Vec::new()).compact();
        plain.accept(&output).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&plain.into_inner()).unwrap();
        assert!(value.get("generatedAt").is_none());

        let mut text = TextSink::new(Vec::new()).stamped(at);
        text.accept(&output).unwrap();
        let text = String::from_utf8(text.into_inner()).unwrap();
        assert!(text.starts_with("Generated: 2026-10-18T09:30:00Z\n"));
    }

    #[tokio::test]
    async fn test_text_sink_lists_cases_and_report() {
        let output = output().await;
        let mut sink = TextSink::new(Vec::new());
        sink.accept(&output).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.contains("Test cases: 1"));
        assert!(text.contains("TC-0001 [FUNC/P0] Verify REQ-1"));
        assert!(text.contains("Coverage: ✓ MEETS THRESHOLD"));
    }
}

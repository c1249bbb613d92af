//! Binary entrypoint: read one AnalysisRequest from stdin, write one Report to stdout.
//!
//! An invalid request produces an ErrorOutput on stdout and exit code 1.
//! Logs go to stderr, filtered by RUST_LOG (default: warn).

use insight_engine::normalize;
use insight_engine::types::ErrorOutput;
use insight_engine::{AnalysisRequest, AnalyticsError, Dataset, Engine};
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .with_target(false)
    .init();

  match run_binary() {
    Ok(json) => {
      let _ = io::stdout().write_all(&json);
    }
    Err(e) => {
      tracing::error!(error = %e, "analysis failed");
      let mut err = ErrorOutput::new(e.to_string());
      if let Some(field) = e.field() {
        err = err.with_field(field);
      }
      let mut out = io::stdout().lock();
      let _ = serde_json::to_writer(&mut out, &err);
      let _ = writeln!(out);
      std::process::exit(1);
    }
  }
}

fn run_binary() -> Result<Vec<u8>, AnalyticsError> {
  let mut raw = String::new();
  io::stdin().lock().read_to_string(&mut raw)?;
  let request: AnalysisRequest = serde_json::from_str(&raw)?;

  let filter = normalize::normalize_filter(&request.filter)?;
  let dataset = Dataset::from_inbound(&request.records)?;
  let engine = Engine::new(request.config.unwrap_or_default());

  let report = engine.analyze(&dataset, &filter)?;
  Ok(serde_json::to_vec(&report)?)
}

use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::pipeline::oracle::LlmUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub duration_ms: u64,
    pub outcome: StepOutcome,
    pub finished_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCallRecord {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// USD.
    pub cost: f64,
    pub called_at: NaiveDateTime,
}

/// Timing and model-usage record of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    pub document_id: String,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub steps: Vec<StepRecord>,
    pub llm_calls: Vec<LlmCallRecord>,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_duration_ms: Option<u64>,
}

impl RunTrace {
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step == name)
    }

    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.outcome == StepOutcome::Failed)
    }
}

/// Collects step timings for a single run; `finish` seals the trace.
pub struct PipelineMonitor {
    clock: Instant,
    trace: RunTrace,
}

impl PipelineMonitor {
    pub fn start(document_id: &str) -> Self {
        tracing::debug!(document_id = %document_id, "Trace started");
        Self {
            clock: Instant::now(),
            trace: RunTrace {
                document_id: document_id.to_string(),
                started_at: now(),
                ended_at: None,
                steps: Vec::new(),
                llm_calls: Vec::new(),
                total_tokens: 0,
                total_cost: 0.0,
                total_duration_ms: None,
            },
        }
    }

    pub fn record(&mut self, step: &str, elapsed: Duration, outcome: StepOutcome) {
        let duration_ms = elapsed.as_millis() as u64;
        tracing::info!(
            step = %step,
            duration_ms,
            outcome = ?outcome,
            "Pipeline step finished"
        );
        self.trace.steps.push(StepRecord {
            step: step.to_string(),
            duration_ms,
            outcome,
            finished_at: now(),
        });
    }

    pub fn record_llm_call(&mut self, usage: &LlmUsage) {
        let cost = call_cost(&usage.model, usage.input_tokens, usage.output_tokens);
        tracing::info!(
            model = %usage.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cost,
            "Model call recorded"
        );
        self.trace.llm_calls.push(LlmCallRecord {
            model: usage.model.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost,
            called_at: now(),
        });
        self.trace.total_tokens += usage.input_tokens + usage.output_tokens;
        self.trace.total_cost += cost;
    }

    pub fn finish(mut self) -> RunTrace {
        let total = self.clock.elapsed().as_millis() as u64;
        self.trace.ended_at = Some(now());
        self.trace.total_duration_ms = Some(total);
        tracing::info!(
            document_id = %self.trace.document_id,
            steps = self.trace.steps.len(),
            total_duration_ms = total,
            total_tokens = self.trace.total_tokens,
            total_cost = self.trace.total_cost,
            "Pipeline trace complete"
        );
        self.trace
    }
}

/// USD per 1k (input, output) tokens, matched on model-name prefix.
/// Unlisted models (local and mock backends) cost nothing.
const MODEL_PRICES: &[(&str, f64, f64)] = &[("gpt-4", 0.03, 0.06), ("claude", 0.015, 0.075)];

pub fn call_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let (input, output) = MODEL_PRICES
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))
        .map(|&(_, i, o)| (i, o))
        .unwrap_or((0.0, 0.0));
    input_tokens as f64 / 1000.0 * input + output_tokens as f64 / 1000.0 * output
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

//! Request handling for the JSON-lines prediction surface.
//!
//! One JSON object per line in, one JSON object per line out.
//! Transport lives in the binary; this module only maps a parsed
//! command onto the scoring context and shapes the response.
//!
//! Requests:
//!   {"type": "health"}
//!   {"type": "predict_churn", "features": {...}}
//!   {"type": "predict_clv", "features": {...}, "raw_clv": 500.0}
//!   {"type": "quit"}

use crate::{error::ScoreError, scoring::ScoringContext, segment::ValueSegment};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Health,
    PredictChurn {
        #[serde(default)]
        features: Value,
    },
    PredictClv {
        #[serde(default)]
        features: Value,
        #[serde(default)]
        raw_clv:  Value,
    },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Health {
        status:    &'static str,
        message:   &'static str,
        threshold: f64,
        features:  Vec<String>,
    },
    Churn {
        churn_probability: f64,
        churn_prediction:  u8,
        threshold:         f64,
    },
    Clv {
        raw_clv:           f64,
        churn_probability: f64,
        final_clv:         f64,
        clv_segment:       ValueSegment,
    },
    Error {
        error: String,
        kind:  &'static str,
    },
}

impl Response {
    pub fn error(e: &ScoreError) -> Self {
        let kind = if e.is_validation() { "validation" } else { "internal" };
        Self::Error { error: e.to_string(), kind }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Error { error: reason.into(), kind: "malformed" }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Outcome of one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Respond(Response),
    Stop,
}

/// Parse and handle one line. Never fails: every problem becomes an
/// error response so the loop keeps serving.
pub fn handle_line(context: &ScoringContext, line: &str) -> Reply {
    match serde_json::from_str::<Command>(line) {
        Ok(Command::Quit) => Reply::Stop,
        Ok(cmd) => Reply::Respond(handle(context, cmd)),
        Err(e) => Reply::Respond(Response::malformed(e.to_string())),
    }
}

/// Serve commands from `reader` until EOF or `quit`, writing one JSON line
/// per request. Only I/O failures end the loop early.
pub fn serve<R: BufRead, W: Write>(context: &ScoringContext, mut reader: R, mut writer: W) -> io::Result<()> {
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break; // EOF
        }

        let reply = match std::str::from_utf8(&buffer) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(context, line),
            Err(e) => Reply::Respond(Response::malformed(format!("request is not valid UTF-8: {e}"))),
        };

        match reply {
            Reply::Stop => break,
            Reply::Respond(response) => {
                if response.is_error() {
                    log::debug!("serve: rejected request: {}", String::from_utf8_lossy(&buffer).trim());
                }
                let line = serde_json::to_string(&response).map_err(io::Error::from)?;
                writeln!(writer, "{line}")?;
            }
        }
        writer.flush()?;
    }
    Ok(())
}

pub fn handle(context: &ScoringContext, cmd: Command) -> Response {
    match cmd {
        Command::Health => Response::Health {
            status:    "ok",
            message:   "Churn + CLV scoring running",
            threshold: context.threshold().value(),
            features:  context.artifacts().schema().names(),
        },
        Command::PredictChurn { features } => match context.predict_churn(&features) {
            Ok(score) => Response::Churn {
                churn_probability: score.probability,
                churn_prediction:  score.prediction,
                threshold:         score.threshold,
            },
            Err(e) => Response::error(&e),
        },
        Command::PredictClv { features, raw_clv } => {
            let raw_clv = match parse_raw_clv(&raw_clv) {
                Ok(v) => v,
                Err(e) => return Response::error(&e),
            };
            match context.predict_clv(&features, raw_clv) {
                Ok(clv) => Response::Clv {
                    raw_clv:           clv.raw_clv,
                    churn_probability: clv.churn_probability,
                    final_clv:         clv.final_clv,
                    clv_segment:       clv.segment(),
                },
                Err(e) => Response::error(&e),
            }
        }
        Command::Quit => Response::malformed("quit is handled by the caller"),
    }
}

fn parse_raw_clv(raw: &Value) -> Result<f64, ScoreError> {
    match raw {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ScoreError::validation("raw_clv", format!("{n} is not representable"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ScoreError::validation("raw_clv", format!("'{s}' is not numeric"))),
        Value::Null => Err(ScoreError::validation("raw_clv", "required field is missing")),
        other => Err(ScoreError::validation("raw_clv", format!("{other} is not numeric"))),
    }
}

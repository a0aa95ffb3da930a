mod backup;
mod calc;
mod ipc;
mod model;
mod scholarship;
mod store;

use std::io::{self, BufRead, Write};

use chrono::NaiveDate;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    // stdout carries the wire protocol; diagnostics stay on stderr.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let today_override = std::env::var("ACADEMY_TODAY")
        .ok()
        .and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok());

    let mut state = ipc::AppState {
        workspace: None,
        store: None,
        evaluator: Box::new(scholarship::GeminiEvaluator::from_env()),
        last_evaluation: None,
        today_override,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}

//! Runs one stage once and prints the run result as JSON.
//!
//! Usage: `run-stage fetch|cron`

use newsdesk::{AppState, Settings, Stages, TriggerAuth};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let stage = std::env::args().nth(1).unwrap_or_default();
    if !matches!(stage.as_str(), "fetch" | "cron") {
        eprintln!("usage: run-stage fetch|cron");
        return ExitCode::from(2);
    }

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };
    newsdesk::init_tracing(settings.log_json);

    let state = AppState::new(
        Stages::from_settings(&settings),
        TriggerAuth::from_settings(&settings),
        None,
    );
    let result = if stage == "fetch" {
        state.run_fetch().await
    } else {
        state.run_cron().await
    };

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("could not encode result: {e}"),
    }
    if result.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

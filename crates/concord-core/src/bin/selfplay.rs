//! Runs one AI-only diplomacy session and prints its metrics as JSON.
//!
//! Usage: `concord-selfplay [seed] [turns] [rules-dir]`

use concord_core::{load_rules, run_selfplay, RulesSource, SelfPlayConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("concord_core=info")
        .init();

    let mut args = std::env::args().skip(1);
    let mut config = SelfPlayConfig::default();
    if let Some(seed) = args.next().and_then(|s| s.parse().ok()) {
        config.seed = seed;
    }
    if let Some(turns) = args.next().and_then(|s| s.parse().ok()) {
        config.turns = turns;
    }
    let source = match args.next() {
        Some(dir) => RulesSource::Path(dir),
        None => RulesSource::Embedded,
    };

    let rules = match load_rules(source) {
        Ok(rules) => rules,
        Err(err) => {
            tracing::error!(%err, "failed to load rules");
            std::process::exit(1);
        }
    };

    match run_selfplay(&rules, &config) {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                tracing::error!(%err, "failed to encode result");
                std::process::exit(1);
            }
        },
        Err(err) => {
            tracing::error!(%err, "self-play aborted");
            std::process::exit(1);
        }
    }
}

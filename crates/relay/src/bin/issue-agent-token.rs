//! Agent token utility
//!
//! Mints a signed credential that lets a support agent join assist rooms of
//! one project. Reads `ASSIST_JWT_SECRET` and `ASSIST_JWT_EXPIRY_HOURS` from
//! the environment (or `.env`).
//!
//! Usage:
//!   cargo run --bin issue-agent-token -- <project-key> [agent-name]

use std::env;

use anyhow::{bail, Context};
use assist_relay::{auth::JwtManager, Config};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);
    let Some(project_key) = args.next() else {
        bail!("usage: issue-agent-token <project-key> [agent-name]");
    };
    let subject = args.next().unwrap_or_else(|| "agent".to_string());

    let config = Config::from_env().context("Failed to load configuration")?;
    let secret = config
        .jwt_secret
        .as_deref()
        .context("ASSIST_JWT_SECRET must be set to issue agent tokens")?;

    let jwt = JwtManager::new(secret, config.jwt_expiry_hours);
    let token = jwt.generate_agent_token(&subject, &project_key)?;

    eprintln!(
        "Token for '{}' in project '{}', valid for {} hours:",
        subject, project_key, config.jwt_expiry_hours
    );
    println!("{}", token);

    Ok(())
}

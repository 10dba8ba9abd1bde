use std::time::Duration;

use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health via the /health endpoint")]
    Ping {
        #[arg(long, env = "SSS_API_URL", default_value = "http://localhost:3000", help = "Server base URL")]
        url: String,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Ping { url } => ping(&url, output_format).await,
    }
}

async fn ping(base: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let endpoint = url::Url::parse(base)?.join("health")?;
    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;

    let response = match client.get(endpoint.clone()).send().await {
        Ok(r) => r,
        Err(e) => {
            output_error(&output_format, &format!("{} unreachable: {}", endpoint, e), Some("UNREACHABLE"))?;
            anyhow::bail!("server unreachable");
        }
    };

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if status.is_success() {
        output_success(
            &output_format,
            &format!("{} is healthy", endpoint),
            Some(json!({ "status": status.as_u16(), "health": body["data"] })),
        )
    } else {
        let reason = body["error"].as_str().unwrap_or("unhealthy").to_string();
        output_error(&output_format, &format!("{} returned {}: {}", endpoint, status, reason), Some("UNHEALTHY"))?;
        anyhow::bail!("server unhealthy")
    }
}

use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_details;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Mint a session token for a provisioned user")]
    Mint {
        #[arg(help = "User id (users.id)")]
        user_id: Uuid,
        #[arg(long, help = "Email claim")]
        email: Option<String>,
        #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Mint { user_id, email, hours } => {
            let security = &config::config().security;
            let hours = hours.unwrap_or(security.jwt_expiry_hours);
            let claims = Claims::new(user_id, email, hours);
            let token = generate_jwt(&claims, &security.jwt_secret)?;

            match output_format {
                OutputFormat::Text => println!("{}", token),
                OutputFormat::Json => output_details(
                    &output_format,
                    "Token",
                    json!({ "token": token, "user_id": user_id, "expires_at": claims.exp }),
                )?,
            }
            Ok(())
        }
    }
}

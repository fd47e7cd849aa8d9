use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims, Role};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{config, Environment};

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Issue a signed access token for local testing")]
    Issue {
        #[arg(long, help = "Tenant id")]
        tenant: Uuid,

        #[arg(long, help = "User id (random when omitted)")]
        user: Option<Uuid>,

        #[arg(long, default_value = "owner", help = "owner, admin, manager, accountant or staff")]
        role: Role,

        #[arg(long, default_value_t = 24, help = "Lifetime in hours")]
        hours: i64,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { tenant, user, role, hours } => {
            let settings = config();
            if settings.environment == Environment::Production {
                anyhow::bail!("Refusing to issue tokens in production; tokens come from the hosted backend");
            }

            let user_id = user.unwrap_or_else(Uuid::new_v4);
            let claims = Claims::new(user_id, tenant, role, hours);
            let token = generate_jwt(&claims, &settings.security.jwt_secret)?;

            if output_format == OutputFormat::Text {
                println!("{}", token);
            }
            output_success(
                output_format,
                &format!("Issued {} token for user {}", role.as_str(), user_id),
                Some(json!({ "token": token, "user_id": user_id, "tenant_id": tenant, "expires_at": claims.exp })),
            )
        }
    }
}

use crate::api;
use crate::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            secret_key,
            domain,
        } => {
            let auth_config = AuthConfig::new(secret_key, domain);
            api::new(port, dsn, auth_config).await?;
        }
    }

    Ok(())
}

use anyhow::Result;

use openwhisk_provider::auth::redact;
use openwhisk_provider::config::{self, Command, ProviderConfig};
use openwhisk_provider::{Provider, ProviderError};

#[tokio::main]
async fn main() -> Result<()> {
    let args = config::load_args();

    // Initialize logging with a configured level
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let provider_config = ProviderConfig::from_args(&args)?;
    let provider = Provider::new(provider_config);
    tracing::debug!("Provider: {}", provider.provider_name());

    if let Err(e) = run(&provider, &args.command).await {
        // Validation errors name the variable the user has to set; log them once and exit
        if let Some(err) = validation_error(&e) {
            tracing::error!("❌ {}", err);
            std::process::exit(1);
        }
        return Err(e);
    }

    Ok(())
}

fn validation_error(e: &anyhow::Error) -> Option<&ProviderError> {
    e.downcast_ref::<ProviderError>()
        .filter(|err| err.is_validation())
}

async fn run(provider: &Provider, command: &Command) -> Result<()> {
    match command {
        Command::Check => {
            let props = provider.props().await?;
            provider.has_valid_creds(&props)?;
            let client = provider.client().await?;
            let options = client.options();

            println!("  Provider:   {}", provider.provider_name());
            println!("  API:        {}", options.api);
            println!("  Namespace:  {}", options.namespace_or_default());
            println!(
                "  Auth:       {}",
                options
                    .auth_handler
                    .as_ref()
                    .map_or("key", |handler| handler.kind())
            );
            if let Some(ref key) = options.api_key {
                println!("  Key:        {}", redact(key));
            }
            println!("  Ignore certs: {}", options.ignore_certs);
            println!("✅ Credentials are valid");
        }

        Command::Token => {
            let client = provider.client().await?;
            let authorization = client.options().authorization().await?;
            let (scheme, value) = authorization
                .split_once(' ')
                .unwrap_or(("", authorization.as_str()));
            println!("✅ Authorization: {} {}", scheme, redact(value));
        }

        Command::Actions => {
            let client = provider.client().await?;
            let actions = client.actions.list().await?;
            tracing::info!("Found {} actions", actions.len());
            for action in &actions {
                let name = action.get("name").and_then(|v| v.as_str()).unwrap_or("?");
                let namespace = action
                    .get("namespace")
                    .and_then(|v| v.as_str())
                    .unwrap_or("?");
                println!("{}/{}", namespace, name);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_is_picked_out() {
        let missing = anyhow::Error::from(ProviderError::MissingHost { key: "OW_APIHOST" });
        assert!(validation_error(&missing).is_some());

        let exchange = anyhow::Error::from(ProviderError::AuthExchange("denied".to_string()));
        assert!(validation_error(&exchange).is_none());

        assert!(validation_error(&anyhow::anyhow!("other")).is_none());
    }
}

pub mod config;
pub mod discord;
pub mod presence;

use songbird::Songbird;
use poise::serenity_prelude as serenity;
use serenity::GatewayIntents;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use std::{future::Future, sync::Arc};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>>{
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env(){
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return Err(err.into());
        }
    };

    let client_task: tokio::task::JoinHandle<::serenity::Result<()>> = tokio::spawn(async move {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_VOICE_STATES
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES;

        let manager = Songbird::serenity();
        let clone_manager = Arc::clone(&manager);

        let framework = discord::get_framework(&config, clone_manager);

        let mut client = serenity::Client::builder(&config.token, intents)
            .framework(framework)
            .voice_manager_arc(manager)
            .await?;

        client.start().await
    });

    supervise(client_task, tokio::signal::ctrl_c()).await
}

/// Runs until the client stops or `shutdown` resolves. A client that stops
/// with an error fails the process instead of idling until shutdown.
async fn supervise<S>(
    client_task: tokio::task::JoinHandle<::serenity::Result<()>>,
    shutdown: S,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = client_task => {
            match result{
                Ok(Ok(())) => info!("Client stopped"),
                Ok(Err(why)) => {
                    error!("Client error: {why:?}");
                    return Err(why.into());
                },
                Err(why) => {
                    error!("Client task failed: {why}");
                    return Err(why.into());
                },
            }
        },
        signal = shutdown => {
            signal?;
            info!("Program exited gracefully");
        },
    }
    Ok(())
}

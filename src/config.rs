use std::{fmt, time::Duration};

use ::serenity::all::ChannelId;
use thiserror::Error;

use crate::presence::PresenceSettings;

pub const TOKEN_VAR: &str = "DISCORD_TOKEN";
pub const CHANNEL_VAR: &str = "VOICE_CHANNEL_ID";
pub const RECONNECT_DELAY_VAR: &str = "RECONNECT_DELAY_SECS";
pub const LOG_MESSAGES_VAR: &str = "LOG_MESSAGES";

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError{
  #[error("Expected {0} in the environment variables")]
  Missing(&'static str),
  #[error("{var} must be a positive integer, got '{value}'")]
  InvalidNumber{
    var: &'static str,
    value: String,
  },
  #[error("{var} must be true or false, got '{value}'")]
  InvalidFlag{
    var: &'static str,
    value: String,
  },
}

/// Startup configuration. Built once in `main` and only read afterwards.
#[derive(Clone)]
pub struct Config{
  pub token: String,
  pub presence: PresenceSettings,
  pub log_messages: bool,
}

impl fmt::Debug for Config{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result{
    f.debug_struct("Config")
      .field("token", &"<redacted>")
      .field("presence", &self.presence)
      .field("log_messages", &self.log_messages)
      .finish()
  }
}

impl Config{
  pub fn from_env() -> Result<Self, ConfigError>{
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let read = |name: &str| lookup(name)
      .map(|value| value.trim().to_string())
      .filter(|value| !value.is_empty());

    let token = read(TOKEN_VAR).ok_or(ConfigError::Missing(TOKEN_VAR))?;

    let channel = read(CHANNEL_VAR).ok_or(ConfigError::Missing(CHANNEL_VAR))?;
    let channel_id = match channel.parse::<u64>(){
      Ok(id) if id != 0 => ChannelId::new(id),
      _ => return Err(ConfigError::InvalidNumber{ var: CHANNEL_VAR, value: channel }),
    };

    let reconnect_delay = match read(RECONNECT_DELAY_VAR){
      Some(value) => match value.parse::<u64>(){
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => return Err(ConfigError::InvalidNumber{ var: RECONNECT_DELAY_VAR, value }),
      },
      None => DEFAULT_RECONNECT_DELAY,
    };

    let log_messages = match read(LOG_MESSAGES_VAR){
      Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidFlag{ var: LOG_MESSAGES_VAR, value })?,
      None => true,
    };

    Ok(Self {
      token,
      presence: PresenceSettings{
        channel_id,
        reconnect_delay,
      },
      log_messages,
    })
  }
}

fn parse_flag(value: &str) -> Option<bool>{
  match value.to_lowercase().as_str(){
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

use poise::serenity_prelude as serenity;
use ::serenity::{
  all::{
    ChannelId, ChannelType, Http
  },
  async_trait
};
use songbird::{Call, Songbird};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};
use std::sync::Arc;

use crate::{
  config::Config,
  presence::{
    PlatformError, PresenceController, VoiceChannel, VoicePlatform
  },
};

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Resolves channels over HTTP and joins them through songbird.
pub struct SongbirdPlatform{
  http: Arc<Http>,
  songbird: Arc<Songbird>,
}

impl SongbirdPlatform{
  pub fn new(http: Arc<Http>, songbird: Arc<Songbird>) -> Self{
    Self { http, songbird }
  }
}

#[async_trait]
impl VoicePlatform for SongbirdPlatform{
  type Session = Arc<TokioMutex<Call>>;

  async fn get_channel(&self, id: ChannelId) -> Option<VoiceChannel>{
    let channel = match self.http.get_channel(id).await{
      Ok(r) => r,
      Err(err) => {
        debug!("Unable to fetch channel {}: {}", id, err);
        return None;
      }
    };
    let channel = channel.guild()?;
    match channel.kind{
      ChannelType::Voice | ChannelType::Stage => Some(VoiceChannel{
        id: channel.id,
        guild_id: channel.guild_id,
        name: channel.name,
      }),
      other => {
        warn!("Channel {} is a {:?} channel, not a voice channel", id, other);
        None
      }
    }
  }

  async fn connect(&self, channel: &VoiceChannel) -> Result<Self::Session, PlatformError>{
    self.songbird.join(channel.guild_id, channel.id).await
      .map_err(|err| PlatformError::from(err.to_string()))
  }
}

pub struct Data {
  presence: Arc<PresenceController<SongbirdPlatform>>,
  log_messages: bool,
}

async fn poise_event_handler(
  _ctx: &serenity::Context,
  event: &serenity::FullEvent,
  _framework: poise::FrameworkContext<'_, Data, Error>,
  data: &Data,
) -> Result<(), Error>{
  match event {
    serenity::FullEvent::Message{new_message} =>{
      if data.log_messages{
        info!("Message from {}: {}", new_message.author.name, new_message.content);
      }
    },
    serenity::FullEvent::VoiceStateUpdate{old, new} => {
      let previous = old.as_ref().and_then(|state| state.channel_id);
      if let Some(presence_event) = data.presence.classify(new.user_id, previous, new.channel_id){
        debug!("Voice state update for {}: {:?}", new.user_id, presence_event);
        // A scheduled rejoin runs detached.
        let _ = data.presence.on_presence_event(presence_event).await;
        debug!("Voice presence is now {:?}", data.presence.connection_state().await);
      }
    },
    _ => {}
  }
  Ok(())
}

fn get_framework_options() -> poise::FrameworkOptions<Data, Error>{
  poise::FrameworkOptions{
    event_handler: |ctx, event, framework, data|{
      Box::pin(poise_event_handler(ctx, event, framework, data))
    },
    ..Default::default()
  }
}

pub fn get_framework(config: &Config, songbird: Arc<Songbird>) -> poise::Framework<Data, Error>{
  let settings = config.presence;
  let log_messages = config.log_messages;
  poise::Framework::builder()
    .options(get_framework_options())
    .setup(move |ctx, ready, _framework|{
        Box::pin(async move{
            info!("Logged on as {}", ready.user.name);
            let platform = SongbirdPlatform::new(ctx.http.clone(), songbird);
            let presence = Arc::new(PresenceController::new(platform, settings, ready.user.id));
            presence.on_ready().await;
            Ok(Data {
              presence,
              log_messages,
            })
        })
    })
    .build()
}

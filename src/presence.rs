use std::{sync::Arc, time::Duration};

use ::serenity::{
  all::{ChannelId, GuildId, UserId},
  async_trait,
};
use thiserror::Error;
use tokio::{sync::Mutex as TokioMutex, task::JoinHandle};
use tracing::{debug, info, warn};

pub type PlatformError = Box<dyn std::error::Error + Send + Sync>;

/// A voice-state change that matters to the presence controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent{
  /// The bot's own voice session left the target channel.
  SelfDisconnected(UserId),
  /// A member (possibly the bot itself) arrived in the target channel.
  MemberJoinedTargetChannel(UserId),
}

impl PresenceEvent{
  /// Maps a voice-state update onto a presence event.
  ///
  /// `previous` is `None` both when the user was not in voice and when the
  /// previous state is not cached.
  pub fn from_voice_update(
    bot_id: UserId,
    target: ChannelId,
    user: UserId,
    previous: Option<ChannelId>,
    current: Option<ChannelId>,
  ) -> Option<Self>{
    if user == bot_id
      && current != Some(target)
      && previous.map_or(true, |channel| channel == target){
      return Some(Self::SelfDisconnected(user));
    }
    if current == Some(target) && previous != Some(target){
      return Some(Self::MemberJoinedTargetChannel(user));
    }
    None
  }
}

#[derive(Debug, Error)]
pub enum PresenceError{
  #[error("voice channel {0} could not be resolved")]
  ChannelNotFound(ChannelId),
  #[error("joining voice channel {channel} was rejected: {source}")]
  Connection{
    channel: ChannelId,
    #[source]
    source: PlatformError,
  },
}

#[derive(Debug, Clone)]
pub struct VoiceChannel{
  pub id: ChannelId,
  pub guild_id: GuildId,
  pub name: String,
}

/// The part of the chat platform the controller drives.
#[async_trait]
pub trait VoicePlatform: Send + Sync + 'static{
  /// Live voice session. Dropping it releases the controller's hold on the call.
  type Session: Send + Sync + 'static;

  async fn get_channel(&self, id: ChannelId) -> Option<VoiceChannel>;

  async fn connect(&self, channel: &VoiceChannel) -> Result<Self::Session, PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSettings{
  pub channel_id: ChannelId,
  pub reconnect_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState{
  Disconnected,
  Connected,
}

struct PresenceState<S>{
  session: Option<S>,
  rejoin_pending: bool,
}

/// Keeps the bot in its configured voice channel.
///
/// Every handler takes the state lock for its whole run, join attempt included,
/// so handlers never interleave. The reconnect delay is spent outside the lock.
pub struct PresenceController<P: VoicePlatform>{
  platform: P,
  settings: PresenceSettings,
  bot_id: UserId,
  state: TokioMutex<PresenceState<P::Session>>,
}

/// A reconnect that has been scheduled but may not have fired yet.
///
/// Dropping it leaves the reconnect running.
#[derive(Debug)]
#[cfg_attr(not(test), allow(dead_code))]
pub struct RejoinHandle(JoinHandle<()>);

impl RejoinHandle{
  #[cfg(test)]
  pub async fn wait(self){
    if let Err(err) = self.0.await{
      warn!("Rejoin task did not complete: {}", err);
    }
  }
}

impl<P: VoicePlatform> PresenceController<P>{
  pub fn new(platform: P, settings: PresenceSettings, bot_id: UserId) -> Self{
    Self {
      platform,
      settings,
      bot_id,
      state: TokioMutex::new(PresenceState{
        session: None,
        rejoin_pending: false,
      }),
    }
  }

  pub fn classify(&self, user: UserId, previous: Option<ChannelId>, current: Option<ChannelId>) -> Option<PresenceEvent>{
    PresenceEvent::from_voice_update(self.bot_id, self.settings.channel_id, user, previous, current)
  }

  pub async fn connection_state(&self) -> ConnectionState{
    if self.state.lock().await.session.is_some(){
      ConnectionState::Connected
    }else{
      ConnectionState::Disconnected
    }
  }

  pub async fn on_ready(&self){
    if let Err(err) = self.join_channel(self.settings.channel_id).await{
      warn!("{}", err);
    }
  }

  pub async fn join_channel(&self, channel_id: ChannelId) -> Result<(), PresenceError>{
    let mut state = self.state.lock().await;
    self.join_locked(&mut state, channel_id).await
  }

  /// Applies one presence event. Returns the handle of the reconnect it
  /// scheduled, if any.
  pub async fn on_presence_event(self: &Arc<Self>, event: PresenceEvent) -> Option<RejoinHandle>{
    let mut state = self.state.lock().await;
    match event{
      PresenceEvent::SelfDisconnected(user) if user == self.bot_id => {
        if state.session.take().is_none(){
          debug!("Ignoring disconnect, no voice session was live");
          return None;
        }
        info!(
          "Disconnected from voice channel {}, retrying in {:?}",
          self.settings.channel_id, self.settings.reconnect_delay
        );
        state.rejoin_pending = true;
        Some(self.schedule_rejoin())
      },
      PresenceEvent::MemberJoinedTargetChannel(member) if member != self.bot_id => {
        if state.session.is_some() || state.rejoin_pending{
          return None;
        }
        info!("Member {} joined voice channel {}, following", member, self.settings.channel_id);
        self.attempt_join(&mut state).await;
        None
      },
      _ => None,
    }
  }

  fn schedule_rejoin(self: &Arc<Self>) -> RejoinHandle{
    let controller = Arc::clone(self);
    RejoinHandle(tokio::spawn(async move{
      tokio::time::sleep(controller.settings.reconnect_delay).await;
      let mut state = controller.state.lock().await;
      state.rejoin_pending = false;
      if state.session.is_some(){
        debug!("Voice session already restored, skipping rejoin");
        return;
      }
      controller.attempt_join(&mut state).await;
    }))
  }

  async fn attempt_join(&self, state: &mut PresenceState<P::Session>){
    let channel_id = self.settings.channel_id;
    if let Err(err) = self.join_locked(state, channel_id).await{
      warn!("{}", err);
    }
  }

  async fn join_locked(&self, state: &mut PresenceState<P::Session>, channel_id: ChannelId) -> Result<(), PresenceError>{
    let channel = self.platform.get_channel(channel_id).await
      .ok_or(PresenceError::ChannelNotFound(channel_id))?;
    let session = self.platform.connect(&channel).await
      .map_err(|source| PresenceError::Connection{ channel: channel_id, source })?;
    info!("Connected to voice channel {} ({})", channel.name, channel.id);
    state.session = Some(session);
    Ok(())
  }
}

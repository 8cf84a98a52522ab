//! State sync between independent reactors.
//!
//! Reactors never share state directly. Each one owns a [`Transport`]
//! endpoint; the [`SyncPlugin`] middleware broadcasts every committed state
//! and a [`SyncReceiver`] applies incoming states with the
//! [`SYNC_ACTION`](crate::types::SYNC_ACTION) tag. Updates carrying that tag
//! are not broadcast again, so peers do not echo each other.
//!
//! [`SyncHub`] is an in-process transport built on crossbeam channels:
//!
//! ```ignore
//! let hub = SyncHub::new();
//! let plugin = SyncPlugin::new("todos", Arc::new(hub.endpoint()));
//! let receiver = plugin.receiver();
//! let reactor = Reactor::with_options(json!({}), ReactorOptions::default().with_plugin(plugin))?;
//!
//! // later, from the owning event loop
//! receiver.pump(&reactor)?;
//! ```

use crate::error::{ReactorError, Result};
use crate::middleware::{HookError, HookResult, Middleware};
use crate::reactor::Reactor;
use crate::state::State;
use crate::types::{Timestamp, SYNC_ACTION};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{Plugin, PluginContext};

/// A state broadcast from one endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncMessage {
    /// Endpoint that sent the message.
    pub source: u64,
    pub channel: String,
    pub state: serde_json::Value,
    pub timestamp: Timestamp,
}

/// Message passing between reactors.
pub trait Transport {
    /// Identifier of this endpoint, stamped on outgoing messages.
    fn id(&self) -> u64;

    /// Deliver to every other endpoint.
    fn send(&self, message: SyncMessage) -> Result<()>;

    /// Next incoming message, if any. Never blocks.
    fn try_recv(&self) -> Option<SyncMessage>;
}

struct HubInner {
    peers: RwLock<Vec<(u64, Sender<SyncMessage>)>>,
    next_id: AtomicU64,
}

/// In-process broadcast hub.
#[derive(Clone)]
pub struct SyncHub {
    inner: Arc<HubInner>,
}

impl SyncHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                peers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Connect a new endpoint.
    pub fn endpoint(&self) -> ChannelTransport {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = unbounded();
        self.inner.peers.write().push((id, sender));
        debug!(endpoint = id, "sync endpoint connected");
        ChannelTransport {
            id,
            hub: Arc::clone(&self.inner),
            receiver,
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.inner.peers.read().len()
    }
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Endpoint of a [`SyncHub`]. Disconnects when dropped.
pub struct ChannelTransport {
    id: u64,
    hub: Arc<HubInner>,
    receiver: Receiver<SyncMessage>,
}

impl Transport for ChannelTransport {
    fn id(&self) -> u64 {
        self.id
    }

    fn send(&self, message: SyncMessage) -> Result<()> {
        let mut dead = Vec::new();
        {
            let peers = self.hub.peers.read();
            for (id, sender) in peers.iter() {
                if *id == self.id {
                    continue;
                }
                if sender.send(message.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            self.hub.peers.write().retain(|(id, _)| !dead.contains(id));
            debug!(dropped = dead.len(), "removed disconnected sync endpoints");
        }
        Ok(())
    }

    fn try_recv(&self) -> Option<SyncMessage> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        let id = self.id;
        self.hub.peers.write().retain(|(peer, _)| *peer != id);
    }
}

/// Broadcasts committed states on a channel.
pub struct SyncPlugin<S> {
    channel: String,
    transport: Arc<dyn Transport>,
    _state: PhantomData<fn() -> S>,
}

impl<S> SyncPlugin<S> {
    pub fn new(channel: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            channel: channel.into(),
            transport,
            _state: PhantomData,
        }
    }

    /// Handle for applying incoming states to the reactor.
    pub fn receiver(&self) -> SyncReceiver {
        SyncReceiver {
            channel: self.channel.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<S: State + Serialize> Plugin<S> for SyncPlugin<S> {
    fn name(&self) -> &str {
        "sync"
    }

    fn init(&mut self, ctx: &mut PluginContext<'_, S>) -> Result<()> {
        if self.channel.is_empty() {
            return Err(ReactorError::InvalidOption {
                option: "sync.channel",
                value: "\"\"".to_string(),
                hint: "name the channel shared by the reactors to keep in sync",
            });
        }
        ctx.middlewares.push(Arc::new(SyncBroadcaster {
            channel: self.channel.clone(),
            transport: Arc::clone(&self.transport),
        }));
        Ok(())
    }

    fn destroy(&mut self) {
        debug!(channel = %self.channel, endpoint = self.transport.id(), "sync plugin destroyed");
    }
}

struct SyncBroadcaster {
    channel: String,
    transport: Arc<dyn Transport>,
}

impl<S: Serialize> Middleware<S> for SyncBroadcaster {
    fn name(&self) -> &str {
        "sync"
    }

    fn on_after_update(&self, _prev: &S, next: &S, action: Option<&str>) -> HookResult {
        if action == Some(SYNC_ACTION) {
            return Ok(());
        }
        let state = serde_json::to_value(next).map_err(|e| HookError::msg(e.to_string()))?;
        self.transport
            .send(SyncMessage {
                source: self.transport.id(),
                channel: self.channel.clone(),
                state,
                timestamp: Timestamp::now(),
            })
            .map_err(|e| HookError::msg(e.to_string()))?;
        trace!(channel = %self.channel, "broadcast state");
        Ok(())
    }
}

/// Applies states received on a channel.
#[derive(Clone)]
pub struct SyncReceiver {
    channel: String,
    transport: Arc<dyn Transport>,
}

impl SyncReceiver {
    /// Drain pending messages into `reactor`. Returns how many were applied.
    ///
    /// Messages for other channels are discarded. Each applied state goes
    /// through the normal update pipeline tagged with the sync action.
    pub fn pump<S>(&self, reactor: &Reactor<S>) -> Result<usize>
    where
        S: State + DeserializeOwned,
    {
        let mut applied = 0;
        while let Some(message) = self.transport.try_recv() {
            if message.channel != self.channel {
                trace!(channel = %message.channel, "ignoring message for other channel");
                continue;
            }
            let incoming: S = serde_json::from_value(message.state)?;
            reactor.update_as(SYNC_ACTION, move |state| *state = incoming)?;
            applied += 1;
        }
        Ok(applied)
    }
}

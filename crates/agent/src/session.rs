//! A conversation session over one channel.
//!
//! The session owns the rolling window and the turn counter; it is the only
//! thing that appends to either. Per inbound message it filters, answers
//! admin commands, resolves attachments, runs one generation plus tool
//! dispatch under a timeout, delivers the reply, and every
//! `update_frequency` handled turns asks the supervisor for a synthesis
//! cycle over a snapshot of the window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mnemo_config::SessionConfig;
use mnemo_core::attachment::AttachmentStore;
use mnemo_core::channel::{Channel, ChannelMessage};
use mnemo_core::error::{ChannelError, ProviderError};
use mnemo_core::event::{DomainEvent, EventBus};
use mnemo_core::memory::MemoryBank;
use mnemo_core::message::{Attachment, RollingMessage};
use mnemo_core::tool::{ToolContext, ToolRegistry};
use mnemo_core::window::RollingWindow;
use mnemo_memory::MemoryStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::admin::{AdminCommand, AdminPolicy};
use crate::context::ContextAssembler;
use crate::dispatcher::{Dispatch, ToolDispatcher};
use crate::generation::Generator;
use crate::supervisor::SynthesisSupervisor;

const PREVIEW_CHARS: usize = 80;

/// What handling one inbound message amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Filtered out before touching any state.
    Ignored,
    /// An admin command was answered; the window is untouched.
    Admin(String),
    /// This text was delivered.
    Replied(String),
    /// The model chose to stay quiet.
    Silent,
    /// Generation did not finish within the reply timeout.
    TimedOut,
    /// Generation or delivery failed.
    Failed(String),
}

pub struct Session {
    assembler: ContextAssembler,
    generator: Generator,
    tools: Option<Arc<ToolRegistry>>,
    store: MemoryStore,
    channel: Arc<dyn Channel>,
    events: Arc<EventBus>,
    supervisor: SynthesisSupervisor,
    admin: AdminPolicy,
    attachments: Option<Arc<dyn AttachmentStore>>,
    channel_ids: Vec<String>,
    config: SessionConfig,
    window: RollingWindow,
    counter: u32,
    pending_synthesis: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(
        assembler: ContextAssembler,
        generator: Generator,
        store: MemoryStore,
        channel: Arc<dyn Channel>,
        supervisor: SynthesisSupervisor,
        events: Arc<EventBus>,
        config: SessionConfig,
    ) -> Self {
        Self {
            assembler,
            generator,
            tools: None,
            store,
            channel,
            events,
            supervisor,
            admin: AdminPolicy::new(Vec::new(), ".env"),
            attachments: None,
            channel_ids: Vec::new(),
            window: RollingWindow::new(config.short_term_window),
            config,
            counter: 0,
            pending_synthesis: None,
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_admin(mut self, admin: AdminPolicy) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_attachment_store(mut self, store: Arc<dyn AttachmentStore>) -> Self {
        self.attachments = Some(store);
        self
    }

    /// Serve only these chat IDs. Empty means every chat.
    pub fn with_channel_filter(mut self, chat_ids: Vec<String>) -> Self {
        self.channel_ids = chat_ids;
        self
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    /// Handled turns since the last synthesis trigger.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Handle of the most recently launched synthesis observer.
    pub fn take_pending_synthesis(&mut self) -> Option<JoinHandle<()>> {
        self.pending_synthesis.take()
    }

    fn accepts(&self, msg: &ChannelMessage) -> bool {
        if msg.is_bot || msg.sender_id == self.assembler.identity().id {
            return false;
        }
        if !self.channel.is_allowed(&msg.sender_id) {
            debug!(sender = %msg.sender_id, "Sender not allowed by channel");
            return false;
        }
        self.channel_ids.is_empty() || self.channel_ids.iter().any(|id| *id == msg.chat_id)
    }

    /// Handle one inbound message end to end.
    pub async fn handle(&mut self, msg: ChannelMessage) -> TurnOutcome {
        if !self.accepts(&msg) {
            return TurnOutcome::Ignored;
        }

        debug!(
            channel = %self.channel.name(),
            sender = %msg.sender_id,
            chat = %msg.chat_id,
            "Message received"
        );
        self.events.publish(DomainEvent::MessageReceived {
            channel: self.channel.name().to_string(),
            sender_id: msg.sender_id.clone(),
            content_preview: msg.content.chars().take(PREVIEW_CHARS).collect(),
            timestamp: Utc::now(),
        });

        if let Some(parsed) = AdminCommand::parse(&msg.content) {
            let reply = match parsed {
                Ok(command) => {
                    self.admin
                        .execute(command, &msg.sender_id, self.channel.as_ref())
                        .await
                }
                Err(usage) => usage,
            };
            if let Err(e) = self.channel.send(&msg.chat_id, &reply).await {
                warn!(error = %e, "Failed to deliver admin reply");
            }
            return TurnOutcome::Admin(reply);
        }

        let attachments = self.resolve_attachments(&msg.attachments).await;
        let mut entry = RollingMessage::new(msg.display_name(), &msg.sender_id, &msg.content)
            .with_attachments(attachments);
        if let Some(id) = &msg.message_id {
            entry = entry.with_id(id);
        }
        self.window.push(entry);

        let bank = self.store.load().await.unwrap_or_else(|e| {
            warn!(error = %e, "Memory read failed, replying without memory");
            MemoryBank::default()
        });

        if let Err(e) = self.channel.send_typing(&msg.chat_id).await {
            debug!(error = %e, "Typing indicator failed");
        }

        let ctx = ToolContext {
            channel: self.channel.clone(),
            chat_id: msg.chat_id.clone(),
            message_id: msg.message_id.clone(),
        };
        let limit = Duration::from_secs(self.config.reply_timeout_secs);
        let dispatch = match tokio::time::timeout(limit, self.generate(&bank, &ctx)).await {
            Ok(Ok(dispatch)) => dispatch,
            Ok(Err(e)) => {
                error!(error = %e, "Reply generation failed");
                self.report_error("generation", &e.to_string());
                return TurnOutcome::Failed(e.to_string());
            }
            Err(_) => {
                warn!(timeout_secs = self.config.reply_timeout_secs, "Reply timed out");
                self.report_error("generation", "reply timed out");
                return TurnOutcome::TimedOut;
            }
        };

        let outcome = match dispatch.text().map(str::trim) {
            Some(text) if !text.is_empty() => match self.deliver(&msg.chat_id, text).await {
                Ok(()) => TurnOutcome::Replied(text.to_string()),
                Err(e) => {
                    error!(error = %e, "Failed to deliver reply");
                    self.report_error("delivery", &e.to_string());
                    return TurnOutcome::Failed(e.to_string());
                }
            },
            _ => TurnOutcome::Silent,
        };

        self.count_turn();
        outcome
    }

    /// One completion followed by tool dispatch.
    async fn generate(
        &mut self,
        bank: &MemoryBank,
        ctx: &ToolContext,
    ) -> Result<Dispatch, ProviderError> {
        let prompt = self
            .assembler
            .build(bank, &self.window, self.tools.as_deref());
        let reply = self.generator.complete(prompt).await?;

        let Some(tools) = self.tools.as_deref() else {
            return Ok(Dispatch::Final(reply));
        };
        let dispatcher = ToolDispatcher {
            assembler: &self.assembler,
            generator: &self.generator,
            tools,
            events: &self.events,
        };
        dispatcher
            .dispatch(reply, bank, &mut self.window, ctx, self.config.max_tool_depth)
            .await
    }

    async fn deliver(&mut self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let sent_id = self.channel.send(chat_id, text).await?;

        let identity = self.assembler.identity();
        let mut entry = RollingMessage::new(&identity.name, &identity.id, text);
        if let Some(id) = sent_id {
            entry = entry.with_id(id);
        }
        self.window.push(entry);

        self.events.publish(DomainEvent::ReplySent {
            channel: self.channel.name().to_string(),
            chat_id: chat_id.to_string(),
            length: text.len(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn count_turn(&mut self) {
        self.counter += 1;
        if self.counter < self.config.update_frequency {
            return;
        }
        self.counter = 0;

        let agent_id = self.assembler.identity().id.clone();
        if let Some(handle) = self.supervisor.try_launch(self.window.snapshot(), agent_id) {
            self.pending_synthesis = Some(handle);
        }
    }

    /// Re-host attachments so the model backend can fetch them.
    ///
    /// Without a store the platform URLs are kept. An attachment that cannot
    /// be fetched or uploaded is dropped from the prompt.
    async fn resolve_attachments(&self, attachments: &[Attachment]) -> Vec<Attachment> {
        let Some(store) = &self.attachments else {
            return attachments.to_vec();
        };

        let mut resolved = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let bytes = match self.channel.download_attachment(attachment).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(url = %attachment.url, error = %e, "Attachment download failed, dropping it");
                    continue;
                }
            };
            let filename = attachment.filename.as_deref().unwrap_or("attachment");
            match store.upload(bytes, filename).await {
                Some(url) => resolved.push(Attachment {
                    url,
                    ..attachment.clone()
                }),
                None => warn!(file = %filename, store = %store.name(), "Attachment upload failed, dropping it"),
            }
        }
        resolved
    }

    fn report_error(&self, context: &str, message: &str) {
        self.events.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Serve `inbound` until it closes or `/shutdown` is accepted.
    ///
    /// An in-flight synthesis is awaited before the channel is stopped.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<Result<ChannelMessage, ChannelError>>,
    ) -> Result<(), ChannelError> {
        let mut shutdown = self.admin.shutdown_signal();
        info!(channel = %self.channel.name(), "Session started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = inbound.recv() => match next {
                    Some(Ok(msg)) => {
                        let outcome = self.handle(msg).await;
                        debug!(outcome = ?outcome, "Turn finished");
                    }
                    Some(Err(e)) => warn!(error = %e, "Channel delivered an error"),
                    None => break,
                },
            }
        }

        if let Some(handle) = self.pending_synthesis.take() {
            if !handle.is_finished() {
                info!("Waiting for memory synthesis to finish");
            }
            if let Err(e) = handle.await {
                warn!(error = %e, "Synthesis observer did not finish cleanly");
            }
        }

        info!(channel = %self.channel.name(), "Session stopped");
        self.channel.stop().await
    }
}

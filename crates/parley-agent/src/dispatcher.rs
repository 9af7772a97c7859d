// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message state machine from receipt to delivery.
//!
//! `Received -> AuthChecked -> ContextResolved -> ContentResolved ->
//! ModelInvoked -> ResponseReady -> Delivered`, with `Aborted` reachable from
//! every state. Pipeline failures end in silence or a fixed reply; error
//! details are logged and never relayed to the chat. Registry failures are
//! the exception: they propagate so that an unreadable registry never
//! grants access.

use std::fmt;
use std::sync::Arc;

use parley_config::ParleyConfig;
use parley_context::{ContextStore, RenderInputs};
use parley_core::{
    AuthRegistry, ChannelAdapter, ChatKind, ConversationTurn, InboundMessage, MessageId,
    OutboundMessage, ParleyError, ProviderAdapter, ProviderRequest,
};
use tracing::{debug, error, info, warn};

use crate::commands::{self, Command};
use crate::content::ContentResolver;

/// States a message passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    AuthChecked,
    ContextResolved,
    ContentResolved,
    ModelInvoked,
    ResponseReady,
    Delivered,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Received => write!(f, "received"),
            DispatchState::AuthChecked => write!(f, "auth_checked"),
            DispatchState::ContextResolved => write!(f, "context_resolved"),
            DispatchState::ContentResolved => write!(f, "content_resolved"),
            DispatchState::ModelInvoked => write!(f, "model_invoked"),
            DispatchState::ResponseReady => write!(f, "response_ready"),
            DispatchState::Delivered => write!(f, "delivered"),
        }
    }
}

/// Why a message was not answered by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Group reply to someone else's message without the trigger.
    ForeignReply,
    /// Group message that neither carries the trigger nor replies to the bot.
    NotAddressed,
    /// Channel posts are never served.
    UnsupportedChat,
    Unauthorized,
    /// `/register` with a wrong or missing secret.
    RegistrationDenied,
    EmptyContent,
    RateLimited,
    EmptyCompletion,
    ModelUnavailable,
}

/// A command that completed and was acknowledged in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Registered,
    Unregistered,
    Cleared,
}

/// The terminal result of dispatching one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { message_id: MessageId },
    Command(CommandOutcome),
    Aborted {
        at: DispatchState,
        reason: AbortReason,
    },
}

impl DispatchOutcome {
    fn aborted(at: DispatchState, reason: AbortReason) -> Self {
        DispatchOutcome::Aborted { at, reason }
    }
}

/// Fixed texts the bot sends instead of model output.
#[derive(Debug, Clone)]
pub struct Replies {
    pub rate_limited: String,
    pub error: String,
    pub registered: String,
    pub unregistered: String,
    pub cleared: String,
}

/// Dispatcher configuration drawn from [`ParleyConfig`].
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub model: String,
    pub replies: Replies,
    pub registration_secret: Option<String>,
    /// The bot's own username; commands naming any other bot are ignored.
    pub bot_username: Option<String>,
}

impl DispatcherSettings {
    pub fn from_config(config: &ParleyConfig) -> Self {
        let agent = &config.agent;
        Self {
            model: config.provider.model.clone(),
            replies: Replies {
                rate_limited: agent.rate_limit_reply.clone(),
                error: agent.error_reply.clone(),
                registered: agent.registered_reply.clone(),
                unregistered: agent.unregistered_reply.clone(),
                cleared: agent.cleared_reply.clone(),
            },
            registration_secret: config.telegram.registration_secret.clone(),
            bot_username: None,
        }
    }

    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }
}

/// Orchestrates one inbound message through auth, context, content, model and delivery.
///
/// Callers must serialize messages of the same chat; the agent loop's
/// per-chat workers do this.
pub struct Dispatcher {
    channel: Arc<dyn ChannelAdapter>,
    provider: Arc<dyn ProviderAdapter>,
    registry: Arc<dyn AuthRegistry>,
    contexts: Arc<ContextStore>,
    resolver: ContentResolver,
    model: String,
    replies: Replies,
    registration_digest: Option<[u8; 32]>,
    bot_username: Option<String>,
}

impl Dispatcher {
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        provider: Arc<dyn ProviderAdapter>,
        registry: Arc<dyn AuthRegistry>,
        contexts: Arc<ContextStore>,
        resolver: ContentResolver,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            channel,
            provider,
            registry,
            contexts,
            resolver,
            model: settings.model,
            replies: settings.replies,
            registration_digest: settings
                .registration_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(commands::secret_digest),
            bot_username: settings.bot_username,
        }
    }

    pub fn contexts(&self) -> &Arc<ContextStore> {
        &self.contexts
    }

    /// Runs `msg` through the pipeline.
    ///
    /// Returns `Err` only for registry storage failures and for delivery
    /// failures the channel could not recover from.
    pub async fn dispatch(&self, msg: InboundMessage) -> Result<DispatchOutcome, ParleyError> {
        let chat_id = msg.chat_id;

        if msg.chat_kind == ChatKind::Channel {
            debug!(chat_id = %chat_id, "ignoring channel post");
            return Ok(DispatchOutcome::aborted(
                DispatchState::Received,
                AbortReason::UnsupportedChat,
            ));
        }

        if let Some(invocation) = msg.text.as_deref().and_then(commands::parse) {
            if !invocation.is_for(self.bot_username.as_deref()) {
                debug!(chat_id = %chat_id, target = ?invocation.target, "command for another bot");
                return Ok(DispatchOutcome::aborted(
                    DispatchState::Received,
                    AbortReason::NotAddressed,
                ));
            }
            let command = invocation.command;
            return self.handle_command(&msg, command).await;
        }

        if let Some(reason) = self.addressing_guard(&msg) {
            debug!(chat_id = %chat_id, ?reason, "message not addressed to the bot");
            return Ok(DispatchOutcome::aborted(DispatchState::Received, reason));
        }

        // Fail closed: a registry error propagates instead of being read as "authorized".
        if !self.registry.is_authorized(chat_id).await? {
            debug!(chat_id = %chat_id, "unauthorized chat, ignoring");
            return Ok(DispatchOutcome::aborted(
                DispatchState::AuthChecked,
                AbortReason::Unauthorized,
            ));
        }

        let shared = self.contexts.get_or_create(chat_id).await;
        let mut context = shared.lock().await;

        let blocks = self.resolver.resolve(&msg).await;
        if blocks.is_empty() {
            debug!(chat_id = %chat_id, "nothing to send to the model");
            return Ok(DispatchOutcome::aborted(
                DispatchState::ContentResolved,
                AbortReason::EmptyContent,
            ));
        }
        self.contexts
            .append(&mut context, ConversationTurn::user(blocks));

        if let Err(e) = self.channel.send_typing(chat_id).await {
            debug!(chat_id = %chat_id, error = %e, "failed to send typing indicator");
        }

        let turns = self.contexts.render(
            &mut context,
            RenderInputs {
                chat_kind: msg.chat_kind,
                speaker: &msg.sender,
                chat_title: msg.chat_title.as_deref(),
            },
        );
        let request = ProviderRequest {
            model: self.model.clone(),
            turns,
        };

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(ParleyError::RateLimited { retry_after }) => {
                warn!(chat_id = %chat_id, ?retry_after, "provider rate limited the request");
                drop(context);
                self.send_fixed(&msg, &self.replies.rate_limited).await;
                return Ok(DispatchOutcome::aborted(
                    DispatchState::ModelInvoked,
                    AbortReason::RateLimited,
                ));
            }
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "model call failed");
                drop(context);
                self.send_fixed(&msg, &self.replies.error).await;
                return Ok(DispatchOutcome::aborted(
                    DispatchState::ModelInvoked,
                    AbortReason::ModelUnavailable,
                ));
            }
        };

        let Some(content) = response.first_content() else {
            warn!(chat_id = %chat_id, response_id = response.id.as_str(), "empty completion");
            drop(context);
            self.send_fixed(&msg, &self.replies.error).await;
            return Ok(DispatchOutcome::aborted(
                DispatchState::ModelInvoked,
                AbortReason::EmptyCompletion,
            ));
        };

        let reply = sanitize(content);
        self.contexts
            .append(&mut context, ConversationTurn::assistant(reply.clone()));
        drop(context);

        let message_id = self.channel.send(OutboundMessage::reply(&msg, reply)).await?;
        debug!(chat_id = %chat_id, model = response.model.as_str(), "reply delivered");
        Ok(DispatchOutcome::Delivered { message_id })
    }

    /// Group-chat routing: only triggered messages and replies to the bot pass.
    fn addressing_guard(&self, msg: &InboundMessage) -> Option<AbortReason> {
        if !msg.chat_kind.is_group() {
            return None;
        }
        let triggered = msg
            .text_or_caption()
            .is_some_and(|t| self.resolver.trigger().matches(t));
        if triggered {
            return None;
        }
        match &msg.reply_to {
            Some(reply) if reply.to_self => None,
            Some(_) => Some(AbortReason::ForeignReply),
            None => Some(AbortReason::NotAddressed),
        }
    }

    async fn handle_command(
        &self,
        msg: &InboundMessage,
        command: Command,
    ) -> Result<DispatchOutcome, ParleyError> {
        let chat_id = msg.chat_id;
        match command {
            Command::Register { secret } => {
                let accepted = match (&self.registration_digest, secret.as_deref()) {
                    (Some(expected), Some(given)) => commands::secret_digest(given) == *expected,
                    _ => false,
                };
                if !accepted {
                    debug!(chat_id = %chat_id, "registration denied");
                    return Ok(DispatchOutcome::aborted(
                        DispatchState::Received,
                        AbortReason::RegistrationDenied,
                    ));
                }
                self.registry.authorize(chat_id).await?;
                info!(chat_id = %chat_id, "chat registered");
                self.send_fixed(msg, &self.replies.registered).await;
                Ok(DispatchOutcome::Command(CommandOutcome::Registered))
            }
            Command::Unregister | Command::Clear => {
                if !self.registry.is_authorized(chat_id).await? {
                    debug!(chat_id = %chat_id, ?command, "command from unauthorized chat");
                    return Ok(DispatchOutcome::aborted(
                        DispatchState::AuthChecked,
                        AbortReason::Unauthorized,
                    ));
                }
                self.contexts.clear(chat_id);
                if command == Command::Unregister {
                    self.registry.deauthorize(chat_id).await?;
                    info!(chat_id = %chat_id, "chat unregistered");
                    self.send_fixed(msg, &self.replies.unregistered).await;
                    Ok(DispatchOutcome::Command(CommandOutcome::Unregistered))
                } else {
                    debug!(chat_id = %chat_id, "context cleared");
                    self.send_fixed(msg, &self.replies.cleared).await;
                    Ok(DispatchOutcome::Command(CommandOutcome::Cleared))
                }
            }
        }
    }

    /// Sends a fixed reply; delivery failures are logged only.
    async fn send_fixed(&self, msg: &InboundMessage, text: &str) {
        if let Err(e) = self.channel.send(OutboundMessage::plain_reply(msg, text)).await {
            warn!(chat_id = %msg.chat_id, error = %e, "failed to deliver fixed reply");
        }
    }
}

/// Rewrites `*` list bullets, which break Telegram's legacy Markdown, as `-`.
pub fn sanitize(text: &str) -> String {
    text.replace("*  ", "-  ")
}

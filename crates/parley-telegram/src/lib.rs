// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for the Parley relay agent.
//!
//! Implements [`ChannelAdapter`] for the Telegram Bot API via teloxide,
//! receiving updates by long polling or by webhook and delivering replies
//! with legacy Markdown and a plain-text fallback.

pub mod format;
pub mod handler;
pub mod media;

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use parley_config::model::{TelegramConfig, TelegramMode};
use parley_core::{
    AdapterType, ChannelAdapter, ChatId, HealthStatus, InboundMessage, MediaRef, MessageId,
    OutboundFormat, OutboundMessage, ParleyError, PluginAdapter,
};
use teloxide::dispatching::ShutdownToken;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ParseMode, ReplyParameters, UserId};
use teloxide::update_listeners::webhooks;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::format::{MAX_MESSAGE_CHARS, split_message};

/// Capacity of the queue between the update dispatcher and `receive()`.
const INBOUND_QUEUE: usize = 100;

/// Telegram channel adapter implementing [`ChannelAdapter`].
pub struct TelegramChannel {
    bot: Bot,
    config: TelegramConfig,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    shutdown_token: Option<ShutdownToken>,
    username: Option<String>,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: TelegramConfig) -> Result<Self, ParleyError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            ParleyError::Config("telegram.bot_token is required for Telegram adapter".into())
        })?;

        if token.is_empty() {
            return Err(ParleyError::Config("telegram.bot_token cannot be empty".into()));
        }

        let bot = Bot::new(token);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);

        Ok(Self {
            bot,
            config,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            shutdown_token: None,
            username: None,
        })
    }

    /// The bot's username as reported by Telegram, known once connected.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn webhook_options(&self) -> Result<webhooks::Options, ParleyError> {
        let url = self
            .config
            .webhook_url()
            .ok_or_else(|| ParleyError::Config("telegram.webhook_domain is required in webhook mode".into()))?;
        let url = reqwest::Url::parse(&url)
            .map_err(|e| ParleyError::Config(format!("invalid webhook url `{url}`: {e}")))?;
        let ip: IpAddr = self.config.webhook_listen.parse().map_err(|e| {
            ParleyError::Config(format!(
                "invalid telegram.webhook_listen `{}`: {e}",
                self.config.webhook_listen
            ))
        })?;
        let secret = self.config.webhook_secret_token.clone().ok_or_else(|| {
            ParleyError::Config("telegram.webhook_secret_token is required in webhook mode".into())
        })?;

        Ok(webhooks::Options::new(SocketAddr::new(ip, self.config.webhook_port), url)
            .secret_token(secret))
    }

    async fn send_chunk(
        &self,
        chat_id: teloxide::types::ChatId,
        text: &str,
        reply_to: Option<teloxide::types::MessageId>,
        format: OutboundFormat,
    ) -> Result<Message, ParleyError> {
        let request = |parse_mode: Option<ParseMode>| {
            let mut req = self.bot.send_message(chat_id, text);
            if let Some(id) = reply_to {
                req = req.reply_parameters(ReplyParameters::new(id));
            }
            if let Some(mode) = parse_mode {
                req = req.parse_mode(mode);
            }
            req
        };

        if format == OutboundFormat::Markdown {
            // Replies are written for the legacy Markdown dialect.
            #[allow(deprecated)]
            let legacy = ParseMode::Markdown;
            match request(Some(legacy)).await {
                Ok(sent) => return Ok(sent),
                Err(e) => warn!(chat_id = chat_id.0, error = %e, "Markdown send failed, sending as plain text"),
            }
        }

        request(None).await.map_err(|e| ParleyError::Channel {
            message: format!("failed to send message: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("Telegram bot unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!("Telegram channel shutting down");
        if let Some(token) = &self.shutdown_token {
            match token.shutdown() {
                Ok(done) => done.await,
                Err(_) => debug!("update dispatcher was not running"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    async fn connect(&mut self) -> Result<(), ParleyError> {
        if self.shutdown_token.is_some() {
            return Ok(()); // Already connected
        }

        let me = self.bot.get_me().await.map_err(|e| ParleyError::Channel {
            message: format!("failed to identify bot: {e}"),
            source: Some(Box::new(e)),
        })?;
        let bot_id: Option<UserId> = Some(me.id);
        info!(bot_id = me.id.0, username = ?me.username, "connected to Telegram");
        self.username = me.username.clone();

        let tx = self.inbound_tx.clone();
        let handler = Update::filter_message().endpoint(move |msg: Message| {
            let tx = tx.clone();
            async move {
                if !handler::has_content(&msg) {
                    debug!(msg_id = msg.id.0, "ignoring unsupported message type");
                    return respond(());
                }
                let inbound = handler::to_inbound_message(&msg, bot_id);
                if tx.send(inbound).await.is_err() {
                    warn!("inbound channel closed, dropping message");
                }
                respond(())
            }
        });

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {}) // Silently ignore non-message updates
            .build();
        self.shutdown_token = Some(dispatcher.shutdown_token());

        match self.config.mode {
            TelegramMode::Polling => {
                info!("starting Telegram long polling");
                tokio::spawn(async move {
                    dispatcher.dispatch().await;
                });
            }
            TelegramMode::Webhook => {
                let options = self.webhook_options()?;
                info!(
                    url = %options.url,
                    address = %options.address,
                    "starting Telegram webhook listener"
                );
                let listener = webhooks::axum(self.bot.clone(), options)
                    .await
                    .map_err(|e| ParleyError::Channel {
                        message: format!("failed to set up webhook: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                tokio::spawn(async move {
                    dispatcher
                        .dispatch_with_listener(
                            listener,
                            LoggingErrorHandler::with_custom_text("webhook update listener error"),
                        )
                        .await;
                });
            }
        }

        Ok(())
    }

    async fn receive(&self) -> Result<InboundMessage, ParleyError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| ParleyError::Channel {
            message: "Telegram inbound channel closed".into(),
            source: None,
        })
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let chat_id = teloxide::types::ChatId(msg.chat_id.0);
        let reply_to = msg
            .reply_to_message_id
            .as_deref()
            .and_then(|id| id.parse::<i32>().ok())
            .map(teloxide::types::MessageId);

        let chunks = split_message(&msg.text, MAX_MESSAGE_CHARS);
        if chunks.len() > 1 {
            debug!(chat_id = msg.chat_id.0, parts = chunks.len(), "splitting long reply");
        }

        let mut first_id = None;
        for (i, chunk) in chunks.into_iter().enumerate() {
            // Only the first part quotes the original message.
            let reply = if i == 0 { reply_to } else { None };
            let sent = self.send_chunk(chat_id, chunk, reply, msg.format).await?;
            first_id.get_or_insert(sent.id);
        }

        match first_id {
            Some(id) => Ok(MessageId(id.0.to_string())),
            None => {
                error!(chat_id = msg.chat_id.0, "refusing to send an empty message");
                Err(ParleyError::Channel {
                    message: "cannot send an empty message".into(),
                    source: None,
                })
            }
        }
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<(), ParleyError> {
        self.bot
            .send_chat_action(teloxide::types::ChatId(chat_id.0), ChatAction::Typing)
            .await
            .map_err(|e| ParleyError::Channel {
                message: format!("failed to send typing indicator: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(())
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<Vec<u8>, ParleyError> {
        media::download_file(&self.bot, &media.file_id).await
    }
}

#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use async_trait::async_trait;
use corkboard_domain::{AdId, AuthorProfile, MediaGroupId, MessageRef, ParseIdError, PhotoRef, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Outbound delivery destination: a private chat or a named channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatTarget {
	Chat(i64),
	Handle(String),
}

impl ChatTarget {
	/// Destination for a user's private chat.
	pub fn user(user: UserId) -> Self {
		ChatTarget::Chat(user.0)
	}

	/// Parse a numeric chat id or an `@handle`.
	pub fn parse(s: &str) -> Result<Self, ParseIdError> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}

		if let Some(handle) = s.strip_prefix('@') {
			if handle.is_empty() {
				return Err(ParseIdError::Empty);
			}
			return Ok(ChatTarget::Handle(handle.to_string()));
		}

		s.parse::<i64>()
			.map(ChatTarget::Chat)
			.map_err(|_| ParseIdError::InvalidNumber(s.to_string()))
	}
}

impl fmt::Display for ChatTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChatTarget::Chat(id) => write!(f, "{id}"),
			ChatTarget::Handle(handle) => write!(f, "@{handle}"),
		}
	}
}

impl FromStr for ChatTarget {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ChatTarget::parse(s)
	}
}

/// Wrapper that redacts in logs.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
	pub fn new(s: impl Into<String>) -> Self {
		Self(s.into())
	}

	/// Access the inner secret string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretString(<redacted>)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<redacted>")
	}
}

impl serde::Serialize for SecretString {
	fn serialize<S>(&self, serializer: S) -> Result<<S as serde::Serializer>::Ok, <S as serde::Serializer>::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str("")
	}
}

/// Transport failures. The coordinator treats these as non-fatal and logs
/// them, except for publish-on-approve.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
	/// The recipient cannot be reached (e.g. never opened a dialog).
	#[error("recipient unavailable: {0}")]
	RecipientUnavailable(String),
	#[error("transport error: {0}")]
	Transport(String),
	#[error("delivery timed out after {seconds}s")]
	Timeout { seconds: u64 },
}

/// Outbound messaging collaborator.
///
/// Implementations own their transport, timeouts included; each call either
/// returns the platform reference of the delivered message or fails with a
/// transport error.
#[async_trait]
pub trait MessengerGateway: Send + Sync + 'static {
	async fn send_text(&self, to: &ChatTarget, text: &str) -> Result<MessageRef, DeliveryError>;

	async fn send_photo(
		&self,
		to: &ChatTarget,
		photo: &PhotoRef,
		caption: Option<&str>,
	) -> Result<MessageRef, DeliveryError>;

	/// Deliver a photo group as one logical post; the caption rides on the
	/// lead item and the returned reference identifies it.
	async fn send_album(
		&self,
		to: &ChatTarget,
		photos: &[PhotoRef],
		lead_caption: Option<&str>,
	) -> Result<MessageRef, DeliveryError>;
}

/// Moderation commands issued by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
	Approve { ad: AdId },
	Reject { ad: AdId, reason: String },
	Ban { user: UserId, reason: String },
	Unban { user: UserId },
	ShowQueue,
	ShowBans,
	Stats,
}

/// Platform events after transport-level decoding, as the dispatcher sees
/// them. Event delivery mechanics (polling vs. webhooks) live behind
/// `EventSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
	/// One photo message; part of an album when `media_group` is set.
	PhotoMessage {
		author: AuthorProfile,
		photo: PhotoRef,
		caption: Option<String>,
		media_group: Option<MediaGroupId>,
	},
	/// A user asking for their own submissions.
	ListOwn { author: AuthorProfile },
	/// A user deleting one of their own submissions.
	Retract { author: UserId, ad: AdId },
	/// An administrator action.
	Moderation { admin: UserId, action: ModerationAction },
}

/// Inbound event producer (the platform delivery collaborator).
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
	/// Short name for logs.
	fn name(&self) -> &'static str;

	/// Run until the event stream ends or a fatal error occurs.
	async fn run(self: Box<Self>, events_tx: mpsc::Sender<InboundEvent>) -> anyhow::Result<()>;
}

/// Build a standard bounded inbound-event channel pair.
pub fn bounded_event_channel(capacity: usize) -> (mpsc::Sender<InboundEvent>, mpsc::Receiver<InboundEvent>) {
	mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chat_target_parses_ids_and_handles() {
		assert_eq!(ChatTarget::parse("12345").unwrap(), ChatTarget::Chat(12345));
		assert_eq!(ChatTarget::parse("-100200300").unwrap(), ChatTarget::Chat(-100200300));
		assert_eq!(
			ChatTarget::parse("@classifieds").unwrap(),
			ChatTarget::Handle("classifieds".to_string())
		);
		assert!(ChatTarget::parse("").is_err());
		assert!(ChatTarget::parse("@").is_err());
		assert!(ChatTarget::parse("not-a-chat").is_err());
	}

	#[test]
	fn chat_target_display_round_trips() {
		for s in ["777", "@board"] {
			let target = ChatTarget::parse(s).unwrap();
			assert_eq!(target.to_string(), s);
			assert_eq!(s.parse::<ChatTarget>().unwrap(), target);
		}
	}

	#[test]
	fn secret_string_redacts() {
		let secret = SecretString::new("bot-token-123");
		assert_eq!(format!("{secret:?}"), "SecretString(<redacted>)");
		assert_eq!(secret.to_string(), "<redacted>");
		assert_eq!(secret.expose(), "bot-token-123");
	}
}

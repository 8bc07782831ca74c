#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use corkboard_domain::{MessageRef, PhotoRef};
use corkboard_gateway::{ChatTarget, DeliveryError, MessengerGateway};
use tracing::info;

/// Transport stand-in that logs every outbound message and hands back
/// synthetic message references. Used in dev runs where no real chat
/// transport is wired up.
pub struct LogGateway {
	next_ref: AtomicI64,
}

impl LogGateway {
	pub fn new() -> Self {
		Self { next_ref: AtomicI64::new(1) }
	}

	fn next(&self) -> MessageRef {
		MessageRef(self.next_ref.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for LogGateway {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl MessengerGateway for LogGateway {
	async fn send_text(&self, to: &ChatTarget, text: &str) -> Result<MessageRef, DeliveryError> {
		let delivered = self.next();
		info!(to = %to, message = %delivered, text, "outbound text");
		Ok(delivered)
	}

	async fn send_photo(
		&self,
		to: &ChatTarget,
		photo: &PhotoRef,
		caption: Option<&str>,
	) -> Result<MessageRef, DeliveryError> {
		let delivered = self.next();
		info!(to = %to, message = %delivered, photo = %photo, caption = caption.unwrap_or(""), "outbound photo");
		Ok(delivered)
	}

	async fn send_album(
		&self,
		to: &ChatTarget,
		photos: &[PhotoRef],
		lead_caption: Option<&str>,
	) -> Result<MessageRef, DeliveryError> {
		let delivered = self.next();
		info!(
			to = %to,
			message = %delivered,
			photos = photos.len(),
			caption = lead_caption.unwrap_or(""),
			"outbound album"
		);
		Ok(delivered)
	}
}

#![forbid(unsafe_code)]

use std::time::Duration;

use async_trait::async_trait;
use corkboard_domain::{AuthorProfile, MediaGroupId, PhotoRef, UserId};
use corkboard_gateway::{EventSource, InboundEvent, ModerationAction};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Dev-only scripted event source: emits a single-photo submission, an
/// album burst, and (when an admin id is configured) a couple of admin
/// queries. Useful for exercising the pipeline without a transport.
pub struct DemoSource {
	pace: Duration,
	admin: Option<UserId>,
}

impl DemoSource {
	pub fn new(admin: Option<UserId>) -> Self {
		Self {
			pace: Duration::from_millis(250),
			admin,
		}
	}

	/// Customize the gap between scripted events (useful for tests).
	#[allow(dead_code)]
	pub fn with_pace(mut self, pace: Duration) -> Self {
		self.pace = pace;
		self
	}

	fn demo_author() -> AuthorProfile {
		AuthorProfile::new(UserId(90001), "Demo Seller").with_handle("demo_seller")
	}

	fn photo(name: &str) -> Option<PhotoRef> {
		match PhotoRef::new(name) {
			Ok(photo) => Some(photo),
			Err(e) => {
				warn!(error = %e, name, "demo source produced an invalid photo ref");
				None
			}
		}
	}
}

#[async_trait]
impl EventSource for DemoSource {
	fn name(&self) -> &'static str {
		"demo"
	}

	async fn run(self: Box<Self>, events_tx: mpsc::Sender<InboundEvent>) -> anyhow::Result<()> {
		let author = Self::demo_author();
		info!(user = %author.id, "demo source started");

		// One single-photo submission.
		if let Some(photo) = Self::photo("demo-photo-single") {
			let _ = events_tx
				.send(InboundEvent::PhotoMessage {
					author: author.clone(),
					photo,
					caption: Some("Vintage desk lamp, works fine, pickup downtown".to_string()),
					media_group: None,
				})
				.await;
		}
		tokio::time::sleep(self.pace).await;

		// An album burst: three fragments, caption on the second.
		let group = MediaGroupId::new(uuid::Uuid::new_v4().to_string()).ok();
		if let Some(group) = group {
			for (i, caption) in [None, Some("Mountain bike, barely used, price negotiable"), None]
				.into_iter()
				.enumerate()
			{
				if let Some(photo) = Self::photo(&format!("demo-photo-album-{i}")) {
					let _ = events_tx
						.send(InboundEvent::PhotoMessage {
							author: author.clone(),
							photo,
							caption: caption.map(str::to_string),
							media_group: Some(group.clone()),
						})
						.await;
				}
			}
		}
		tokio::time::sleep(self.pace).await;

		let _ = events_tx.send(InboundEvent::ListOwn { author: author.clone() }).await;

		if let Some(admin) = self.admin {
			tokio::time::sleep(self.pace).await;
			let _ = events_tx
				.send(InboundEvent::Moderation {
					admin,
					action: ModerationAction::Stats,
				})
				.await;
			let _ = events_tx
				.send(InboundEvent::Moderation {
					admin,
					action: ModerationAction::ShowQueue,
				})
				.await;
		}

		info!("demo source finished its script");
		Ok(())
	}
}

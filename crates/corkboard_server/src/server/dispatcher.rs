#![forbid(unsafe_code)]

use std::sync::Arc;

use corkboard_domain::UserId;
use corkboard_gateway::{ChatTarget, InboundEvent, MessengerGateway, ModerationAction};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::server::assembler::{AlbumAssembler, AssembledAlbum};
use crate::server::coordinator::ModerationCoordinator;
use crate::server::format;
use crate::server::lifecycle::SubmissionService;
use crate::server::store::RecordStore;

/// How many queue cards one `ShowQueue` request sends.
const QUEUE_PAGE: usize = 5;

/// Routes inbound platform events and assembled albums to the services.
/// Each event runs on its own task; sessions are concurrent and the store's
/// atomic transitions are the only mutual exclusion.
pub struct Dispatcher {
	assembler: AlbumAssembler,
	coordinator: Arc<ModerationCoordinator>,
	lifecycle: Arc<SubmissionService>,
	store: Arc<dyn RecordStore>,
	gateway: Arc<dyn MessengerGateway>,
}

impl Dispatcher {
	pub fn new(
		assembler: AlbumAssembler,
		coordinator: Arc<ModerationCoordinator>,
		lifecycle: Arc<SubmissionService>,
		store: Arc<dyn RecordStore>,
		gateway: Arc<dyn MessengerGateway>,
	) -> Self {
		Self {
			assembler,
			coordinator,
			lifecycle,
			store,
			gateway,
		}
	}

	/// Run until both input channels close.
	pub async fn run(
		self: Arc<Self>,
		mut events_rx: mpsc::Receiver<InboundEvent>,
		mut albums_rx: mpsc::Receiver<AssembledAlbum>,
	) {
		loop {
			tokio::select! {
				event = events_rx.recv() => {
					let Some(event) = event else { break };
					metrics::counter!("corkboard_server_events_total").increment(1);
					let this = Arc::clone(&self);
					tokio::spawn(async move {
						this.handle_event(event).await;
					});
				}

				album = albums_rx.recv() => {
					let Some(album) = album else { break };
					let this = Arc::clone(&self);
					tokio::spawn(async move {
						this.coordinator.handle_submission(album.author, album.photos, album.caption).await;
					});
				}
			}
		}

		info!("dispatcher input channels closed; stopping");
	}

	async fn handle_event(&self, event: InboundEvent) {
		match event {
			InboundEvent::PhotoMessage {
				author,
				photo,
				caption,
				media_group,
			} => match media_group {
				// Album fragments buffer until the group quiesces; single
				// photos take the same admission path immediately.
				Some(group) => self.assembler.push_fragment(author, group, photo, caption),
				None => self.coordinator.handle_submission(author, vec![photo], caption).await,
			},

			InboundEvent::ListOwn { author } => match self.store.submissions_by_author(author.id).await {
				Ok(ads) => self.reply(author.id, &format::own_ads(&ads)).await,
				Err(e) => {
					warn!(user = %author.id, error = %e, "listing own submissions failed");
					self.reply(author.id, "Could not load your submissions; try again later.").await;
				}
			},

			InboundEvent::Retract { author, ad } => {
				let reply = match self.lifecycle.retract(author, ad).await {
					Ok(()) => format::retract_confirmed(ad),
					Err(e) => e.to_string(),
				};
				self.reply(author, &reply).await;
			}

			InboundEvent::Moderation { admin, action } => {
				let reply = self.handle_moderation(admin, action).await;
				self.reply(admin, &reply).await;
			}
		}
	}

	async fn handle_moderation(&self, admin: UserId, action: ModerationAction) -> String {
		match action {
			ModerationAction::Approve { ad } => match self.coordinator.approve(admin, ad).await {
				Ok(ad) => format::approve_confirmed(&ad),
				Err(e) => e.to_string(),
			},
			ModerationAction::Reject { ad, reason } => match self.coordinator.reject(admin, ad, &reason).await {
				Ok(ad) => format::reject_confirmed(&ad),
				Err(e) => e.to_string(),
			},
			ModerationAction::Ban { user, reason } => match self.coordinator.ban(admin, user, &reason).await {
				Ok(record) => format::ban_confirmed(&record),
				Err(e) => e.to_string(),
			},
			ModerationAction::Unban { user } => match self.coordinator.unban(admin, user).await {
				Ok(removed) => format::unban_confirmed(removed, user),
				Err(e) => e.to_string(),
			},
			ModerationAction::ShowQueue => match self.coordinator.show_queue(admin, QUEUE_PAGE).await {
				Ok((sent, total)) => format::queue_summary(sent, total),
				Err(e) => e.to_string(),
			},
			ModerationAction::ShowBans => match self.lifecycle.bans(admin).await {
				Ok(bans) => format::ban_list(&bans),
				Err(e) => e.to_string(),
			},
			ModerationAction::Stats => match self.lifecycle.stats(admin).await {
				Ok((pending, banned)) => format::stats(pending, banned),
				Err(e) => e.to_string(),
			},
		}
	}

	/// Best-effort direct reply.
	async fn reply(&self, user: UserId, text: &str) {
		let target = ChatTarget::user(user);
		if let Err(e) = self.gateway.send_text(&target, text).await {
			warn!(user = %user, error = %e, "reply delivery failed");
		}
	}
}

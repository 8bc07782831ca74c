#![forbid(unsafe_code)]

use corkboard_domain::{AdId, Advertisement, BanRecord, ModerationState, UserId};
use corkboard_gateway::ChatTarget;

use crate::server::lifecycle::SubmitError;

const PREVIEW_CHARS: usize = 50;
const LIST_LIMIT: usize = 10;

/// First `PREVIEW_CHARS` characters of a description, ellipsized.
fn preview(description: &str) -> String {
	let mut chars = description.chars();
	let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
	if chars.next().is_some() { format!("{head}…") } else { head }
}

/// Confirmation sent to the author once a submission enters the queue.
pub fn submission_received(ad: AdId, submitted_today: u64, limit: u32) -> String {
	let remaining = u64::from(limit).saturating_sub(submitted_today);
	format!(
		"Submission #{ad} is in the moderation queue.\n\
		You will be notified once it has been reviewed.\n\
		Submissions left today: {remaining}."
	)
}

/// Denial sent to the author when a submission is not created.
pub fn submission_denied(err: &SubmitError) -> String {
	match err {
		SubmitError::UserBanned { reason } => {
			format!("You are banned from submitting.\nReason: {reason}\nContact an administrator to appeal.")
		}
		SubmitError::QuotaExceeded { limit } => {
			format!("You reached the daily limit of {limit} submissions. Try again tomorrow.")
		}
		SubmitError::Invalid(e) => format!("Submission not accepted: {e}. Please fix it and resubmit."),
		SubmitError::Store(_) => "Something went wrong saving your submission. Please try again later.".to_string(),
	}
}

/// The review card shown to administrators for one pending submission.
pub fn moderation_card(ad: &Advertisement, submitted_today: u64, limit: u32) -> String {
	let handle = match &ad.author.handle {
		Some(h) => format!("@{h}"),
		None => "no handle".to_string(),
	};
	format!(
		"Submission #{id} awaiting review\n\
		From: {name} ({handle}), user id {user}\n\
		Submitted today: {submitted_today}/{limit}\n\
		Photos: {photos}\n\n\
		{description}",
		id = ad.id,
		name = ad.author.display_name,
		user = ad.author.id,
		photos = ad.photos.len(),
		description = ad.description,
	)
}

/// The public channel post for an approved submission.
pub fn channel_post(ad: &Advertisement) -> String {
	format!("{}\n\nPosted by {}", ad.description, ad.author.mention())
}

pub fn approved_user_text(ad: AdId, channel: &ChatTarget) -> String {
	format!("Your submission #{ad} was approved and published to {channel}.")
}

pub fn rejected_user_text(ad: AdId, reason: &str) -> String {
	format!(
		"Your submission #{ad} was rejected.\n\
		Reason: {reason}\n\
		You can submit a new one that addresses the feedback."
	)
}

pub fn banned_user_text(reason: &str) -> String {
	format!("You have been banned from submitting.\nReason: {reason}\nContact an administrator to appeal.")
}

pub fn unbanned_user_text() -> String {
	"Your ban was lifted. You can submit again.".to_string()
}

/// A user's own submissions, most recent first, truncated to ten.
pub fn own_ads(ads: &[Advertisement]) -> String {
	if ads.is_empty() {
		return "You have no submissions yet.".to_string();
	}

	let mut text = String::from("Your submissions:\n");
	for ad in ads.iter().take(LIST_LIMIT) {
		let status = match &ad.state {
			ModerationState::Pending => "pending review".to_string(),
			ModerationState::Approved { .. } => "published".to_string(),
			ModerationState::Rejected { reason } => format!("rejected: {reason}"),
		};
		text.push_str(&format!("#{id} — {status}\n  {}\n", preview(&ad.description), id = ad.id));
	}
	if ads.len() > LIST_LIMIT {
		text.push_str(&format!("…and {} more.\n", ads.len() - LIST_LIMIT));
	}
	text
}

/// The ban list for administrators, most recent first, truncated to ten.
pub fn ban_list(bans: &[BanRecord]) -> String {
	if bans.is_empty() {
		return "No users are banned.".to_string();
	}

	let mut text = String::from("Banned users:\n");
	for ban in bans.iter().take(LIST_LIMIT) {
		let handle = ban.handle.as_deref().map(|h| format!("@{h}")).unwrap_or_else(|| "-".to_string());
		text.push_str(&format!(
			"{user} ({handle}) — {reason} — {date}\n",
			user = ban.user,
			reason = ban.reason,
			date = ban.banned_at.format("%Y-%m-%d"),
		));
	}
	if bans.len() > LIST_LIMIT {
		text.push_str(&format!("…and {} more.\n", bans.len() - LIST_LIMIT));
	}
	text
}

pub fn stats(pending: u64, banned: u64) -> String {
	format!("Moderation overview\nPending submissions: {pending}\nBanned users: {banned}")
}

pub fn approve_confirmed(ad: &Advertisement) -> String {
	match ad.state.published() {
		Some(published) => format!("Submission #{} published (message {published}).", ad.id),
		None => format!("Submission #{} approved.", ad.id),
	}
}

pub fn reject_confirmed(ad: &Advertisement) -> String {
	format!("Submission #{} rejected; the author has been notified.", ad.id)
}

pub fn ban_confirmed(ban: &BanRecord) -> String {
	format!("User {} banned: {}", ban.user, ban.reason)
}

pub fn unban_confirmed(removed: bool, user: UserId) -> String {
	if removed {
		format!("User {user} unbanned.")
	} else {
		format!("User {user} is not banned.")
	}
}

pub fn retract_confirmed(ad: AdId) -> String {
	format!("Submission #{ad} deleted.")
}

pub fn queue_summary(sent: usize, total: u64) -> String {
	if total == 0 {
		"The moderation queue is empty.".to_string()
	} else {
		format!("Showing {sent} of {total} pending submission(s).")
	}
}

#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("invalid numeric id: {0}")]
	InvalidNumber(String),
}

/// Platform-assigned user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for UserId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}
		s.parse::<i64>().map(UserId).map_err(|_| ParseIdError::InvalidNumber(s.to_string()))
	}
}

/// Store-assigned advertisement identifier, monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdId(pub i64);

impl fmt::Display for AdId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for AdId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}
		s.parse::<i64>().map(AdId).map_err(|_| ParseIdError::InvalidNumber(s.to_string()))
	}
}

/// Platform message identifier returned by a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

impl fmt::Display for MessageRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Platform-opaque image file identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoRef(String);

impl PhotoRef {
	/// Create a non-empty `PhotoRef`.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for PhotoRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for PhotoRef {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		PhotoRef::new(s.to_string())
	}
}

/// Platform correlation id grouping fragments of one multi-photo submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaGroupId(String);

impl MediaGroupId {
	/// Create a non-empty `MediaGroupId`.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for MediaGroupId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for MediaGroupId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		MediaGroupId::new(s.to_string())
	}
}

/// Author identity captured at submission time, immutable afterwards.
///
/// `handle` is best-effort: some entry points never learn it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
	pub id: UserId,
	pub handle: Option<String>,
	pub display_name: String,
}

impl AuthorProfile {
	pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
		Self {
			id,
			handle: None,
			display_name: display_name.into(),
		}
	}

	pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
		self.handle = Some(handle.into());
		self
	}

	/// `@handle` when known, display name otherwise.
	pub fn mention(&self) -> String {
		match &self.handle {
			Some(h) => format!("@{h}"),
			None => self.display_name.clone(),
		}
	}
}

/// Payload-free moderation status discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
	Pending,
	Approved,
	Rejected,
}

impl StatusKind {
	/// Stable string identifier, also used as the storage column value.
	pub const fn as_str(self) -> &'static str {
		match self {
			StatusKind::Pending => "pending",
			StatusKind::Approved => "approved",
			StatusKind::Rejected => "rejected",
		}
	}
}

impl fmt::Display for StatusKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for StatusKind {
	type Err = StateError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"pending" => Ok(StatusKind::Pending),
			"approved" => Ok(StatusKind::Approved),
			"rejected" => Ok(StatusKind::Rejected),
			other => Err(StateError::UnknownStatus(other.to_string())),
		}
	}
}

/// Moderation status carrying its payload.
///
/// An approved record cannot exist without its published reference, nor a
/// rejected one without its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModerationState {
	Pending,
	Approved { published: MessageRef },
	Rejected { reason: String },
}

impl ModerationState {
	pub fn kind(&self) -> StatusKind {
		match self {
			ModerationState::Pending => StatusKind::Pending,
			ModerationState::Approved { .. } => StatusKind::Approved,
			ModerationState::Rejected { .. } => StatusKind::Rejected,
		}
	}

	pub fn is_pending(&self) -> bool {
		matches!(self, ModerationState::Pending)
	}

	pub fn published(&self) -> Option<MessageRef> {
		match self {
			ModerationState::Approved { published } => Some(*published),
			_ => None,
		}
	}

	pub fn reject_reason(&self) -> Option<&str> {
		match self {
			ModerationState::Rejected { reason } => Some(reason),
			_ => None,
		}
	}

	/// Reassemble the state from the flat columns a row store keeps.
	pub fn from_parts(
		kind: StatusKind,
		reject_reason: Option<String>,
		published: Option<MessageRef>,
	) -> Result<Self, StateError> {
		match (kind, reject_reason, published) {
			(StatusKind::Pending, None, None) => Ok(ModerationState::Pending),
			(StatusKind::Pending, _, _) => Err(StateError::PendingWithPayload),
			(StatusKind::Approved, None, Some(published)) => Ok(ModerationState::Approved { published }),
			(StatusKind::Approved, Some(_), _) => Err(StateError::ApprovedWithReason),
			(StatusKind::Approved, None, None) => Err(StateError::MissingPublishedRef),
			(StatusKind::Rejected, Some(reason), None) => Ok(ModerationState::Rejected { reason }),
			(StatusKind::Rejected, None, _) => Err(StateError::MissingRejectReason),
			(StatusKind::Rejected, Some(_), Some(_)) => Err(StateError::RejectedWithPublishedRef),
		}
	}
}

/// Errors for reassembling a moderation state from stored columns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
	#[error("unknown status: {0}")]
	UnknownStatus(String),
	#[error("pending record carries a moderation payload")]
	PendingWithPayload,
	#[error("approved record missing its published reference")]
	MissingPublishedRef,
	#[error("approved record carries a reject reason")]
	ApprovedWithReason,
	#[error("rejected record missing its reason")]
	MissingRejectReason,
	#[error("rejected record carries a published reference")]
	RejectedWithPublishedRef,
}

/// A user-authored ad awaiting or having completed moderation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
	pub id: AdId,
	pub author: AuthorProfile,
	pub description: String,
	pub photos: Vec<PhotoRef>,
	pub state: ModerationState,
	pub created_at: DateTime<Utc>,
	/// Set at the first (and only) transition out of `Pending`.
	pub moderated_at: Option<DateTime<Utc>>,
}

impl Advertisement {
	pub fn is_pending(&self) -> bool {
		self.state.is_pending()
	}
}

/// An active submission ban. Presence of the record is the ban predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
	pub user: UserId,
	pub handle: Option<String>,
	pub reason: String,
	pub banned_at: DateTime<Utc>,
	pub banned_by: UserId,
}

/// Submission content limits and the per-day quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPolicy {
	pub min_photos: usize,
	pub max_photos: usize,
	pub min_description_chars: usize,
	pub max_description_chars: usize,
	pub max_ads_per_day: u32,
	pub min_reject_reason_chars: usize,
	pub min_ban_reason_chars: usize,
}

impl Default for ContentPolicy {
	fn default() -> Self {
		Self {
			min_photos: 1,
			max_photos: 5,
			min_description_chars: 10,
			max_description_chars: 1000,
			max_ads_per_day: 3,
			min_reject_reason_chars: 5,
			min_ban_reason_chars: 3,
		}
	}
}

impl ContentPolicy {
	/// Validate submission content. Lengths count characters after trimming.
	pub fn validate(&self, photos: &[PhotoRef], description: &str) -> Result<(), ValidationError> {
		if photos.len() < self.min_photos {
			return Err(ValidationError::TooFewPhotos {
				got: photos.len(),
				min: self.min_photos,
			});
		}
		if photos.len() > self.max_photos {
			return Err(ValidationError::TooManyPhotos {
				got: photos.len(),
				max: self.max_photos,
			});
		}

		let description = description.trim();
		if description.is_empty() {
			return Err(ValidationError::DescriptionMissing);
		}

		let chars = description.chars().count();
		if chars < self.min_description_chars {
			return Err(ValidationError::DescriptionTooShort {
				got: chars,
				min: self.min_description_chars,
			});
		}
		if chars > self.max_description_chars {
			return Err(ValidationError::DescriptionTooLong {
				got: chars,
				max: self.max_description_chars,
			});
		}

		Ok(())
	}
}

/// Content violations reported back to the submitting user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
	#[error("a submission needs at least {min} photo(s), got {got}")]
	TooFewPhotos { got: usize, min: usize },
	#[error("a submission allows at most {max} photos, got {got}")]
	TooManyPhotos { got: usize, max: usize },
	#[error("the submission has no description")]
	DescriptionMissing,
	#[error("description too short: {got} characters, minimum is {min}")]
	DescriptionTooShort { got: usize, min: usize },
	#[error("description too long: {got} characters, maximum is {max}")]
	DescriptionTooLong { got: usize, max: usize },
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn photos(n: usize) -> Vec<PhotoRef> {
		(0..n).map(|i| PhotoRef::new(format!("photo-{i}")).unwrap()).collect()
	}

	#[test]
	fn id_parse_and_display() {
		assert_eq!("42".parse::<UserId>().unwrap(), UserId(42));
		assert_eq!(" -7 ".parse::<AdId>().unwrap(), AdId(-7));
		assert_eq!(UserId(42).to_string(), "42");
		assert!("".parse::<UserId>().is_err());
		assert!("abc".parse::<AdId>().is_err());
	}

	#[test]
	fn rejects_empty_refs() {
		assert!(PhotoRef::new("").is_err());
		assert!(PhotoRef::new("   ").is_err());
		assert!(MediaGroupId::new("").is_err());
		assert_eq!(PhotoRef::new("f1").unwrap().as_str(), "f1");
	}

	#[test]
	fn mention_prefers_handle() {
		let author = AuthorProfile::new(UserId(1), "Alice").with_handle("alice");
		assert_eq!(author.mention(), "@alice");

		let anonymous = AuthorProfile::new(UserId(2), "Bob");
		assert_eq!(anonymous.mention(), "Bob");
	}

	#[test]
	fn status_kind_round_trips() {
		for kind in [StatusKind::Pending, StatusKind::Approved, StatusKind::Rejected] {
			assert_eq!(kind.as_str().parse::<StatusKind>().unwrap(), kind);
		}
		assert!(matches!("weird".parse::<StatusKind>(), Err(StateError::UnknownStatus(_))));
	}

	#[test]
	fn from_parts_accepts_only_coherent_rows() {
		assert_eq!(
			ModerationState::from_parts(StatusKind::Pending, None, None).unwrap(),
			ModerationState::Pending
		);
		assert_eq!(
			ModerationState::from_parts(StatusKind::Approved, None, Some(MessageRef(9))).unwrap(),
			ModerationState::Approved { published: MessageRef(9) }
		);
		assert_eq!(
			ModerationState::from_parts(StatusKind::Rejected, Some("too blurry".into()), None).unwrap(),
			ModerationState::Rejected {
				reason: "too blurry".into()
			}
		);

		assert_eq!(
			ModerationState::from_parts(StatusKind::Approved, None, None),
			Err(StateError::MissingPublishedRef)
		);
		assert_eq!(
			ModerationState::from_parts(StatusKind::Rejected, None, None),
			Err(StateError::MissingRejectReason)
		);
		assert_eq!(
			ModerationState::from_parts(StatusKind::Pending, Some("x".into()), None),
			Err(StateError::PendingWithPayload)
		);
		assert_eq!(
			ModerationState::from_parts(StatusKind::Rejected, Some("x".into()), Some(MessageRef(1))),
			Err(StateError::RejectedWithPublishedRef)
		);
	}

	#[test]
	fn policy_bounds_are_inclusive() {
		let policy = ContentPolicy::default();

		assert!(policy.validate(&photos(1), &"d".repeat(10)).is_ok());
		assert!(policy.validate(&photos(5), &"d".repeat(1000)).is_ok());

		assert_eq!(
			policy.validate(&photos(0), "a fine description"),
			Err(ValidationError::TooFewPhotos { got: 0, min: 1 })
		);
		assert_eq!(
			policy.validate(&photos(6), "a fine description"),
			Err(ValidationError::TooManyPhotos { got: 6, max: 5 })
		);
		assert_eq!(
			policy.validate(&photos(1), "short"),
			Err(ValidationError::DescriptionTooShort { got: 5, min: 10 })
		);
		assert_eq!(
			policy.validate(&photos(1), &"d".repeat(1001)),
			Err(ValidationError::DescriptionTooLong { got: 1001, max: 1000 })
		);
		assert_eq!(policy.validate(&photos(1), "   "), Err(ValidationError::DescriptionMissing));
	}

	#[test]
	fn description_length_counts_characters_after_trim() {
		let policy = ContentPolicy::default();

		// Multibyte currency sign counts as one character.
		assert!(policy.validate(&photos(3), "Bike for sale, €50, city centre  ").is_ok());
		// Trimmed down to 9 chars.
		assert_eq!(
			policy.validate(&photos(1), "  ninechars  "),
			Err(ValidationError::DescriptionTooShort { got: 9, min: 10 })
		);
	}

	proptest! {
		#[test]
		fn from_parts_never_builds_incoherent_state(
			kind in prop_oneof![
				Just(StatusKind::Pending),
				Just(StatusKind::Approved),
				Just(StatusKind::Rejected),
			],
			reason in proptest::option::of(".{0,24}"),
			published in proptest::option::of(any::<i64>().prop_map(MessageRef)),
		) {
			match ModerationState::from_parts(kind, reason.clone(), published) {
				Ok(state) => {
					prop_assert_eq!(state.kind(), kind);
					// Exactly one of {reason, published} on a moderated state,
					// neither on a pending one.
					prop_assert_eq!(state.reject_reason().map(str::to_string), match state.kind() {
						StatusKind::Rejected => reason,
						_ => None,
					});
					prop_assert_eq!(state.published(), match state.kind() {
						StatusKind::Approved => published,
						_ => None,
					});
					prop_assert!(!(state.reject_reason().is_some() && state.published().is_some()));
				}
				Err(_) => {
					let coherent = match kind {
						StatusKind::Pending => reason.is_none() && published.is_none(),
						StatusKind::Approved => reason.is_none() && published.is_some(),
						StatusKind::Rejected => reason.is_some() && published.is_none(),
					};
					prop_assert!(!coherent);
				}
			}
		}
	}
}

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, anyhow};
use chrono::Utc;
use corkboard_domain::{
	AdId, Advertisement, AuthorProfile, BanRecord, MessageRef, ModerationState, PhotoRef, StatusKind, UserId,
};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::util::time::{from_unix_seconds, local_day_bounds, unix_seconds};

/// Record-store failures.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("record not found")]
	NotFound,
	#[error("submission already moderated")]
	AlreadyModerated,
	#[error("requester does not own this submission")]
	NotOwner,
	#[error(transparent)]
	Backend(#[from] anyhow::Error),
}

/// Durable storage for submissions and bans. Pure data access, no business
/// rules; the moderation transitions are the one place that must be atomic
/// per submission id.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync + 'static {
	/// Persist a new pending submission and assign its id.
	async fn create_submission(
		&self,
		author: &AuthorProfile,
		description: &str,
		photos: &[PhotoRef],
	) -> Result<Advertisement, StoreError>;

	async fn submission(&self, id: AdId) -> Result<Option<Advertisement>, StoreError>;

	/// The FIFO moderation queue: pending submissions, oldest first.
	async fn pending_submissions(&self) -> Result<Vec<Advertisement>, StoreError>;

	/// All submissions by one author, most recent first.
	async fn submissions_by_author(&self, user: UserId) -> Result<Vec<Advertisement>, StoreError>;

	/// Pending → Approved. Fails `AlreadyModerated` unless currently pending.
	async fn approve_submission(&self, id: AdId, published: MessageRef) -> Result<Advertisement, StoreError>;

	/// Pending → Rejected. Fails `AlreadyModerated` unless currently pending.
	async fn reject_submission(&self, id: AdId, reason: &str) -> Result<Advertisement, StoreError>;

	async fn pending_count(&self) -> Result<u64, StoreError>;

	/// Submissions the author created during the current local calendar day.
	async fn submissions_today(&self, user: UserId) -> Result<u64, StoreError>;

	/// Create or replace the ban record for `record.user` (last write wins).
	async fn upsert_ban(&self, record: &BanRecord) -> Result<(), StoreError>;

	/// Remove a ban; `false` when none existed.
	async fn remove_ban(&self, user: UserId) -> Result<bool, StoreError>;

	async fn is_banned(&self, user: UserId) -> Result<bool, StoreError>;

	async fn ban(&self, user: UserId) -> Result<Option<BanRecord>, StoreError>;

	/// All ban records, most recent first.
	async fn bans(&self) -> Result<Vec<BanRecord>, StoreError>;

	/// Delete a submission; only its author may do so.
	async fn delete_submission(&self, id: AdId, requester: UserId) -> Result<(), StoreError>;
}

/// In-memory store used when no database is configured and by tests.
#[derive(Default)]
pub struct MemoryStore {
	inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
	next_id: i64,
	ads: BTreeMap<i64, Advertisement>,
	bans: HashMap<i64, BanRecord>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Test helper: insert a pending submission with an explicit creation
	/// time (the quota window is a function of `created_at`).
	#[cfg(test)]
	pub async fn insert_backdated(
		&self,
		author: &AuthorProfile,
		description: &str,
		photos: &[PhotoRef],
		created_at: chrono::DateTime<Utc>,
	) -> Advertisement {
		let mut inner = self.inner.lock().await;
		inner.next_id += 1;
		let ad = Advertisement {
			id: AdId(inner.next_id),
			author: author.clone(),
			description: description.to_string(),
			photos: photos.to_vec(),
			state: ModerationState::Pending,
			created_at,
			moderated_at: None,
		};
		inner.ads.insert(ad.id.0, ad.clone());
		ad
	}
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
	async fn create_submission(
		&self,
		author: &AuthorProfile,
		description: &str,
		photos: &[PhotoRef],
	) -> Result<Advertisement, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.next_id += 1;
		let ad = Advertisement {
			id: AdId(inner.next_id),
			author: author.clone(),
			description: description.to_string(),
			photos: photos.to_vec(),
			state: ModerationState::Pending,
			created_at: Utc::now(),
			moderated_at: None,
		};
		inner.ads.insert(ad.id.0, ad.clone());
		Ok(ad)
	}

	async fn submission(&self, id: AdId) -> Result<Option<Advertisement>, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner.ads.get(&id.0).cloned())
	}

	async fn pending_submissions(&self) -> Result<Vec<Advertisement>, StoreError> {
		let inner = self.inner.lock().await;
		let mut pending: Vec<Advertisement> = inner.ads.values().filter(|ad| ad.is_pending()).cloned().collect();
		pending.sort_by_key(|ad| (ad.created_at, ad.id));
		Ok(pending)
	}

	async fn submissions_by_author(&self, user: UserId) -> Result<Vec<Advertisement>, StoreError> {
		let inner = self.inner.lock().await;
		let mut ads: Vec<Advertisement> = inner.ads.values().filter(|ad| ad.author.id == user).cloned().collect();
		ads.sort_by_key(|ad| (ad.created_at, ad.id));
		ads.reverse();
		Ok(ads)
	}

	async fn approve_submission(&self, id: AdId, published: MessageRef) -> Result<Advertisement, StoreError> {
		// The single lock serializes racing transitions on one id.
		let mut inner = self.inner.lock().await;
		let ad = inner.ads.get_mut(&id.0).ok_or(StoreError::NotFound)?;
		if !ad.is_pending() {
			return Err(StoreError::AlreadyModerated);
		}
		ad.state = ModerationState::Approved { published };
		ad.moderated_at = Some(Utc::now());
		Ok(ad.clone())
	}

	async fn reject_submission(&self, id: AdId, reason: &str) -> Result<Advertisement, StoreError> {
		let mut inner = self.inner.lock().await;
		let ad = inner.ads.get_mut(&id.0).ok_or(StoreError::NotFound)?;
		if !ad.is_pending() {
			return Err(StoreError::AlreadyModerated);
		}
		ad.state = ModerationState::Rejected {
			reason: reason.to_string(),
		};
		ad.moderated_at = Some(Utc::now());
		Ok(ad.clone())
	}

	async fn pending_count(&self) -> Result<u64, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner.ads.values().filter(|ad| ad.is_pending()).count() as u64)
	}

	async fn submissions_today(&self, user: UserId) -> Result<u64, StoreError> {
		let (start, end) = local_day_bounds(Utc::now());
		let inner = self.inner.lock().await;
		Ok(inner
			.ads
			.values()
			.filter(|ad| ad.author.id == user && ad.created_at >= start && ad.created_at < end)
			.count() as u64)
	}

	async fn upsert_ban(&self, record: &BanRecord) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().await;
		inner.bans.insert(record.user.0, record.clone());
		Ok(())
	}

	async fn remove_ban(&self, user: UserId) -> Result<bool, StoreError> {
		let mut inner = self.inner.lock().await;
		Ok(inner.bans.remove(&user.0).is_some())
	}

	async fn is_banned(&self, user: UserId) -> Result<bool, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner.bans.contains_key(&user.0))
	}

	async fn ban(&self, user: UserId) -> Result<Option<BanRecord>, StoreError> {
		let inner = self.inner.lock().await;
		Ok(inner.bans.get(&user.0).cloned())
	}

	async fn bans(&self) -> Result<Vec<BanRecord>, StoreError> {
		let inner = self.inner.lock().await;
		let mut bans: Vec<BanRecord> = inner.bans.values().cloned().collect();
		bans.sort_by_key(|ban| std::cmp::Reverse((ban.banned_at, ban.user)));
		Ok(bans)
	}

	async fn delete_submission(&self, id: AdId, requester: UserId) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().await;
		let ad = inner.ads.get(&id.0).ok_or(StoreError::NotFound)?;
		if ad.author.id != requester {
			return Err(StoreError::NotOwner);
		}
		inner.ads.remove(&id.0);
		Ok(())
	}
}

const AD_COLUMNS: &str = "id, user_id, username, first_name, description, photo_ids, status, reject_reason, \
	created_at, moderated_at, published_message_id";

type AdRow = (
	i64,
	i64,
	Option<String>,
	String,
	String,
	String,
	String,
	Option<String>,
	i64,
	Option<i64>,
	Option<i64>,
);

type BanRow = (i64, Option<String>, String, i64, i64);

fn decode_ad(row: AdRow) -> Result<Advertisement, StoreError> {
	let (id, user_id, username, first_name, description, photo_ids, status, reject_reason, created_at, moderated_at, published) =
		row;

	let kind: StatusKind = status.as_str().parse().map_err(anyhow::Error::from)?;
	let state = ModerationState::from_parts(kind, reject_reason, published.map(MessageRef)).map_err(anyhow::Error::from)?;
	let photos: Vec<PhotoRef> = serde_json::from_str(&photo_ids).context("decode stored photo list")?;

	let created_at = from_unix_seconds(created_at).context("stored created_at out of range")?;
	let moderated_at = match moderated_at {
		Some(secs) => Some(from_unix_seconds(secs).context("stored moderated_at out of range")?),
		None => None,
	};

	let mut author = AuthorProfile::new(UserId(user_id), first_name);
	author.handle = username;

	Ok(Advertisement {
		id: AdId(id),
		author,
		description,
		photos,
		state,
		created_at,
		moderated_at,
	})
}

fn decode_ban(row: BanRow) -> Result<BanRecord, StoreError> {
	let (user_id, username, reason, banned_at, banned_by) = row;
	Ok(BanRecord {
		user: UserId(user_id),
		handle: username,
		reason,
		banned_at: from_unix_seconds(banned_at).context("stored banned_at out of range")?,
		banned_by: UserId(banned_by),
	})
}

/// Durable store over sqlx; the backend is selected by the URL prefix.
#[derive(Clone)]
pub struct PersistentStore {
	backend: StoreBackend,
}

#[derive(Clone)]
enum StoreBackend {
	Sqlite(sqlx::SqlitePool),
	Postgres(sqlx::PgPool),
}

impl PersistentStore {
	pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
		if database_url.starts_with("sqlite:") {
			let pool = sqlx::SqlitePool::connect(database_url).await.context("connect sqlite")?;
			sqlx::migrate!("migrations/sqlite")
				.run(&pool)
				.await
				.context("run sqlite migrations")?;

			Ok(Self {
				backend: StoreBackend::Sqlite(pool),
			})
		} else if database_url.starts_with("postgres:") || database_url.starts_with("postgresql:") {
			let pool = sqlx::PgPool::connect(database_url).await.context("connect postgres")?;
			sqlx::migrate!("migrations/postgres")
				.run(&pool)
				.await
				.context("run postgres migrations")?;

			Ok(Self {
				backend: StoreBackend::Postgres(pool),
			})
		} else {
			Err(anyhow!("unsupported database_url (use sqlite: or postgres:)"))
		}
	}

	async fn fetch_ad(&self, id: AdId) -> Result<Option<Advertisement>, StoreError> {
		let row: Option<AdRow> = match &self.backend {
			StoreBackend::Sqlite(pool) => {
				sqlx::query_as(&format!("SELECT {AD_COLUMNS} FROM advertisements WHERE id = ?"))
					.bind(id.0)
					.fetch_optional(pool)
					.await
					.context("select advertisement (sqlite)")?
			}
			StoreBackend::Postgres(pool) => {
				sqlx::query_as(&format!("SELECT {AD_COLUMNS} FROM advertisements WHERE id = $1"))
					.bind(id.0)
					.fetch_optional(pool)
					.await
					.context("select advertisement (postgres)")?
			}
		};

		row.map(decode_ad).transpose()
	}
}

#[async_trait::async_trait]
impl RecordStore for PersistentStore {
	async fn create_submission(
		&self,
		author: &AuthorProfile,
		description: &str,
		photos: &[PhotoRef],
	) -> Result<Advertisement, StoreError> {
		let photo_ids = serde_json::to_string(photos).context("encode photo list")?;
		let created_at = unix_seconds(Utc::now());

		let id = match &self.backend {
			StoreBackend::Sqlite(pool) => {
				let result = sqlx::query(
					"INSERT INTO advertisements (user_id, username, first_name, description, photo_ids, status, created_at) \
					VALUES (?, ?, ?, ?, ?, 'pending', ?)",
				)
				.bind(author.id.0)
				.bind(author.handle.as_deref())
				.bind(author.display_name.as_str())
				.bind(description)
				.bind(photo_ids.as_str())
				.bind(created_at)
				.execute(pool)
				.await
				.context("insert advertisement (sqlite)")?;

				result.last_insert_rowid()
			}
			StoreBackend::Postgres(pool) => {
				let (id,): (i64,) = sqlx::query_as(
					"INSERT INTO advertisements (user_id, username, first_name, description, photo_ids, status, created_at) \
					VALUES ($1, $2, $3, $4, $5, 'pending', $6) RETURNING id",
				)
				.bind(author.id.0)
				.bind(author.handle.as_deref())
				.bind(author.display_name.as_str())
				.bind(description)
				.bind(photo_ids.as_str())
				.bind(created_at)
				.fetch_one(pool)
				.await
				.context("insert advertisement (postgres)")?;

				id
			}
		};

		self.fetch_ad(AdId(id)).await?.ok_or(StoreError::NotFound)
	}

	async fn submission(&self, id: AdId) -> Result<Option<Advertisement>, StoreError> {
		self.fetch_ad(id).await
	}

	async fn pending_submissions(&self) -> Result<Vec<Advertisement>, StoreError> {
		let rows: Vec<AdRow> = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query_as(&format!(
				"SELECT {AD_COLUMNS} FROM advertisements WHERE status = 'pending' ORDER BY created_at ASC, id ASC"
			))
			.fetch_all(pool)
			.await
			.context("select pending advertisements (sqlite)")?,
			StoreBackend::Postgres(pool) => sqlx::query_as(&format!(
				"SELECT {AD_COLUMNS} FROM advertisements WHERE status = 'pending' ORDER BY created_at ASC, id ASC"
			))
			.fetch_all(pool)
			.await
			.context("select pending advertisements (postgres)")?,
		};

		rows.into_iter().map(decode_ad).collect()
	}

	async fn submissions_by_author(&self, user: UserId) -> Result<Vec<Advertisement>, StoreError> {
		let rows: Vec<AdRow> = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query_as(&format!(
				"SELECT {AD_COLUMNS} FROM advertisements WHERE user_id = ? ORDER BY created_at DESC, id DESC"
			))
			.bind(user.0)
			.fetch_all(pool)
			.await
			.context("select author advertisements (sqlite)")?,
			StoreBackend::Postgres(pool) => sqlx::query_as(&format!(
				"SELECT {AD_COLUMNS} FROM advertisements WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
			))
			.bind(user.0)
			.fetch_all(pool)
			.await
			.context("select author advertisements (postgres)")?,
		};

		rows.into_iter().map(decode_ad).collect()
	}

	async fn approve_submission(&self, id: AdId, published: MessageRef) -> Result<Advertisement, StoreError> {
		let moderated_at = unix_seconds(Utc::now());

		// Single conditional UPDATE: the status predicate is the
		// serialization point for racing transitions.
		let rows_affected = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query(
				"UPDATE advertisements SET status = 'approved', moderated_at = ?, published_message_id = ? \
				WHERE id = ? AND status = 'pending'",
			)
			.bind(moderated_at)
			.bind(published.0)
			.bind(id.0)
			.execute(pool)
			.await
			.context("approve advertisement (sqlite)")?
			.rows_affected(),
			StoreBackend::Postgres(pool) => sqlx::query(
				"UPDATE advertisements SET status = 'approved', moderated_at = $1, published_message_id = $2 \
				WHERE id = $3 AND status = 'pending'",
			)
			.bind(moderated_at)
			.bind(published.0)
			.bind(id.0)
			.execute(pool)
			.await
			.context("approve advertisement (postgres)")?
			.rows_affected(),
		};

		if rows_affected == 0 {
			return match self.fetch_ad(id).await? {
				Some(_) => Err(StoreError::AlreadyModerated),
				None => Err(StoreError::NotFound),
			};
		}

		self.fetch_ad(id).await?.ok_or(StoreError::NotFound)
	}

	async fn reject_submission(&self, id: AdId, reason: &str) -> Result<Advertisement, StoreError> {
		let moderated_at = unix_seconds(Utc::now());

		let rows_affected = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query(
				"UPDATE advertisements SET status = 'rejected', moderated_at = ?, reject_reason = ? \
				WHERE id = ? AND status = 'pending'",
			)
			.bind(moderated_at)
			.bind(reason)
			.bind(id.0)
			.execute(pool)
			.await
			.context("reject advertisement (sqlite)")?
			.rows_affected(),
			StoreBackend::Postgres(pool) => sqlx::query(
				"UPDATE advertisements SET status = 'rejected', moderated_at = $1, reject_reason = $2 \
				WHERE id = $3 AND status = 'pending'",
			)
			.bind(moderated_at)
			.bind(reason)
			.bind(id.0)
			.execute(pool)
			.await
			.context("reject advertisement (postgres)")?
			.rows_affected(),
		};

		if rows_affected == 0 {
			return match self.fetch_ad(id).await? {
				Some(_) => Err(StoreError::AlreadyModerated),
				None => Err(StoreError::NotFound),
			};
		}

		self.fetch_ad(id).await?.ok_or(StoreError::NotFound)
	}

	async fn pending_count(&self) -> Result<u64, StoreError> {
		let (count,): (i64,) = match &self.backend {
			StoreBackend::Sqlite(pool) => {
				sqlx::query_as("SELECT COUNT(*) FROM advertisements WHERE status = 'pending'")
					.fetch_one(pool)
					.await
					.context("count pending (sqlite)")?
			}
			StoreBackend::Postgres(pool) => {
				sqlx::query_as("SELECT COUNT(*) FROM advertisements WHERE status = 'pending'")
					.fetch_one(pool)
					.await
					.context("count pending (postgres)")?
			}
		};

		Ok(count.max(0) as u64)
	}

	async fn submissions_today(&self, user: UserId) -> Result<u64, StoreError> {
		let (start, end) = local_day_bounds(Utc::now());
		let (start, end) = (unix_seconds(start), unix_seconds(end));

		let (count,): (i64,) = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query_as(
				"SELECT COUNT(*) FROM advertisements WHERE user_id = ? AND created_at >= ? AND created_at < ?",
			)
			.bind(user.0)
			.bind(start)
			.bind(end)
			.fetch_one(pool)
			.await
			.context("count today's advertisements (sqlite)")?,
			StoreBackend::Postgres(pool) => sqlx::query_as(
				"SELECT COUNT(*) FROM advertisements WHERE user_id = $1 AND created_at >= $2 AND created_at < $3",
			)
			.bind(user.0)
			.bind(start)
			.bind(end)
			.fetch_one(pool)
			.await
			.context("count today's advertisements (postgres)")?,
		};

		Ok(count.max(0) as u64)
	}

	async fn upsert_ban(&self, record: &BanRecord) -> Result<(), StoreError> {
		let banned_at = unix_seconds(record.banned_at);

		match &self.backend {
			StoreBackend::Sqlite(pool) => {
				sqlx::query(
					"INSERT INTO banned_users (user_id, username, reason, banned_at, banned_by) VALUES (?, ?, ?, ?, ?) \
					ON CONFLICT(user_id) DO UPDATE SET username = excluded.username, reason = excluded.reason, \
					banned_at = excluded.banned_at, banned_by = excluded.banned_by",
				)
				.bind(record.user.0)
				.bind(record.handle.as_deref())
				.bind(record.reason.as_str())
				.bind(banned_at)
				.bind(record.banned_by.0)
				.execute(pool)
				.await
				.context("upsert ban (sqlite)")?;
			}
			StoreBackend::Postgres(pool) => {
				sqlx::query(
					"INSERT INTO banned_users (user_id, username, reason, banned_at, banned_by) VALUES ($1, $2, $3, $4, $5) \
					ON CONFLICT (user_id) DO UPDATE SET username = EXCLUDED.username, reason = EXCLUDED.reason, \
					banned_at = EXCLUDED.banned_at, banned_by = EXCLUDED.banned_by",
				)
				.bind(record.user.0)
				.bind(record.handle.as_deref())
				.bind(record.reason.as_str())
				.bind(banned_at)
				.bind(record.banned_by.0)
				.execute(pool)
				.await
				.context("upsert ban (postgres)")?;
			}
		}

		Ok(())
	}

	async fn remove_ban(&self, user: UserId) -> Result<bool, StoreError> {
		let rows_affected = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query("DELETE FROM banned_users WHERE user_id = ?")
				.bind(user.0)
				.execute(pool)
				.await
				.context("delete ban (sqlite)")?
				.rows_affected(),
			StoreBackend::Postgres(pool) => sqlx::query("DELETE FROM banned_users WHERE user_id = $1")
				.bind(user.0)
				.execute(pool)
				.await
				.context("delete ban (postgres)")?
				.rows_affected(),
		};

		Ok(rows_affected > 0)
	}

	async fn is_banned(&self, user: UserId) -> Result<bool, StoreError> {
		let row: Option<(i64,)> = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query_as("SELECT user_id FROM banned_users WHERE user_id = ?")
				.bind(user.0)
				.fetch_optional(pool)
				.await
				.context("check ban (sqlite)")?,
			StoreBackend::Postgres(pool) => sqlx::query_as("SELECT user_id FROM banned_users WHERE user_id = $1")
				.bind(user.0)
				.fetch_optional(pool)
				.await
				.context("check ban (postgres)")?,
		};

		Ok(row.is_some())
	}

	async fn ban(&self, user: UserId) -> Result<Option<BanRecord>, StoreError> {
		let row: Option<BanRow> = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query_as(
				"SELECT user_id, username, reason, banned_at, banned_by FROM banned_users WHERE user_id = ?",
			)
			.bind(user.0)
			.fetch_optional(pool)
			.await
			.context("select ban (sqlite)")?,
			StoreBackend::Postgres(pool) => sqlx::query_as(
				"SELECT user_id, username, reason, banned_at, banned_by FROM banned_users WHERE user_id = $1",
			)
			.bind(user.0)
			.fetch_optional(pool)
			.await
			.context("select ban (postgres)")?,
		};

		row.map(decode_ban).transpose()
	}

	async fn bans(&self) -> Result<Vec<BanRecord>, StoreError> {
		let rows: Vec<BanRow> = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query_as(
				"SELECT user_id, username, reason, banned_at, banned_by FROM banned_users ORDER BY banned_at DESC, user_id DESC",
			)
			.fetch_all(pool)
			.await
			.context("select bans (sqlite)")?,
			StoreBackend::Postgres(pool) => sqlx::query_as(
				"SELECT user_id, username, reason, banned_at, banned_by FROM banned_users ORDER BY banned_at DESC, user_id DESC",
			)
			.fetch_all(pool)
			.await
			.context("select bans (postgres)")?,
		};

		rows.into_iter().map(decode_ban).collect()
	}

	async fn delete_submission(&self, id: AdId, requester: UserId) -> Result<(), StoreError> {
		let rows_affected = match &self.backend {
			StoreBackend::Sqlite(pool) => sqlx::query("DELETE FROM advertisements WHERE id = ? AND user_id = ?")
				.bind(id.0)
				.bind(requester.0)
				.execute(pool)
				.await
				.context("delete advertisement (sqlite)")?
				.rows_affected(),
			StoreBackend::Postgres(pool) => sqlx::query("DELETE FROM advertisements WHERE id = $1 AND user_id = $2")
				.bind(id.0)
				.bind(requester.0)
				.execute(pool)
				.await
				.context("delete advertisement (postgres)")?
				.rows_affected(),
		};

		if rows_affected == 0 {
			return match self.fetch_ad(id).await? {
				Some(_) => Err(StoreError::NotOwner),
				None => Err(StoreError::NotFound),
			};
		}

		Ok(())
	}
}

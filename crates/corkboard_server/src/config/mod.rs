#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use corkboard_domain::{ContentPolicy, UserId};
use corkboard_gateway::{ChatTarget, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

/// Default config path: `~/.corkboard/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".corkboard").join("config.toml"))
}

/// Load the app config from TOML and env overrides.
#[allow(dead_code)]
pub fn load_config() -> anyhow::Result<AppConfig> {
	let path = default_config_path()?;
	load_config_from_path(&path)
}

/// Same as `load_config` but with an explicit config path.
pub fn load_config_from_path(path: &Path) -> anyhow::Result<AppConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = AppConfig::from_file(file_cfg);

	apply_env_overrides(&mut cfg);

	Ok(cfg)
}

/// App config (v1).
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
	pub bot: BotSettings,
	pub limits: LimitSettings,
	pub server: ServerSettings,
	pub persistence: PersistenceSettings,
}

/// Bot identity and moderation destinations.
#[derive(Debug, Clone, Default)]
pub struct BotSettings {
	/// Transport credential, held redacted.
	pub token: Option<SecretString>,
	/// Administrator user ids.
	pub admin_ids: Vec<UserId>,
	/// Public channel approved submissions are published to.
	pub channel: Option<ChatTarget>,
	/// Optional shared moderation chat.
	pub moderation_chat: Option<ChatTarget>,
}

/// Submission limits and timing.
#[derive(Debug, Clone)]
pub struct LimitSettings {
	pub min_photos: usize,
	pub max_photos: usize,
	pub min_description_chars: usize,
	pub max_description_chars: usize,
	pub max_ads_per_day: u32,
	/// Quiescence delay after the first album fragment.
	pub album_quiescence: Duration,
	pub min_reject_reason_chars: usize,
	pub min_ban_reason_chars: usize,
}

impl Default for LimitSettings {
	fn default() -> Self {
		let policy = ContentPolicy::default();
		Self {
			min_photos: policy.min_photos,
			max_photos: policy.max_photos,
			min_description_chars: policy.min_description_chars,
			max_description_chars: policy.max_description_chars,
			max_ads_per_day: policy.max_ads_per_day,
			album_quiescence: Duration::from_millis(500),
			min_reject_reason_chars: policy.min_reject_reason_chars,
			min_ban_reason_chars: policy.min_ban_reason_chars,
		}
	}
}

impl LimitSettings {
	pub fn content_policy(&self) -> ContentPolicy {
		ContentPolicy {
			min_photos: self.min_photos,
			max_photos: self.max_photos,
			min_description_chars: self.min_description_chars,
			max_description_chars: self.max_description_chars,
			max_ads_per_day: self.max_ads_per_day,
			min_reject_reason_chars: self.min_reject_reason_chars,
			min_ban_reason_chars: self.min_ban_reason_chars,
		}
	}
}

/// Observability endpoints.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
	/// Optional metrics exporter bind address (host:port).
	pub metrics_bind: Option<String>,
	/// Optional health/readiness HTTP bind address (host:port).
	pub health_bind: Option<String>,
}

/// Persistence settings.
#[derive(Debug, Clone, Default)]
pub struct PersistenceSettings {
	/// Database URL (sqlite: or postgres:). In-memory store when absent.
	pub database_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	bot: FileBotSettings,

	#[serde(default)]
	limits: FileLimitSettings,

	#[serde(default)]
	server: FileServerSettings,

	#[serde(default)]
	persistence: FilePersistenceSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileBotSettings {
	token: Option<String>,
	admin_ids: Option<Vec<i64>>,
	channel: Option<String>,
	moderation_chat: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileLimitSettings {
	min_photos: Option<usize>,
	max_photos: Option<usize>,
	min_description_chars: Option<usize>,
	max_description_chars: Option<usize>,
	max_ads_per_day: Option<u32>,
	album_quiescence_ms: Option<u64>,
	min_reject_reason_chars: Option<usize>,
	min_ban_reason_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileServerSettings {
	metrics_bind: Option<String>,
	health_bind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FilePersistenceSettings {
	database_url: Option<String>,
}

fn parse_chat_target(raw: &str, what: &str) -> Option<ChatTarget> {
	match ChatTarget::parse(raw) {
		Ok(target) => Some(target),
		Err(e) => {
			warn!(error = %e, value = raw, "config: invalid {what} (expected a chat id or @handle)");
			None
		}
	}
}

impl AppConfig {
	fn from_file(file: FileConfig) -> Self {
		let defaults = LimitSettings::default();

		let bot = BotSettings {
			token: file.bot.token.filter(|s| !s.trim().is_empty()).map(SecretString::new),
			admin_ids: file
				.bot
				.admin_ids
				.unwrap_or_default()
				.into_iter()
				.map(UserId)
				.collect(),
			channel: file
				.bot
				.channel
				.filter(|s| !s.trim().is_empty())
				.and_then(|s| parse_chat_target(&s, "channel")),
			moderation_chat: file
				.bot
				.moderation_chat
				.filter(|s| !s.trim().is_empty())
				.and_then(|s| parse_chat_target(&s, "moderation_chat")),
		};

		let limits = LimitSettings {
			min_photos: file.limits.min_photos.unwrap_or(defaults.min_photos),
			max_photos: file.limits.max_photos.unwrap_or(defaults.max_photos),
			min_description_chars: file.limits.min_description_chars.unwrap_or(defaults.min_description_chars),
			max_description_chars: file.limits.max_description_chars.unwrap_or(defaults.max_description_chars),
			max_ads_per_day: file.limits.max_ads_per_day.unwrap_or(defaults.max_ads_per_day),
			album_quiescence: file
				.limits
				.album_quiescence_ms
				.map(Duration::from_millis)
				.unwrap_or(defaults.album_quiescence),
			min_reject_reason_chars: file
				.limits
				.min_reject_reason_chars
				.unwrap_or(defaults.min_reject_reason_chars),
			min_ban_reason_chars: file.limits.min_ban_reason_chars.unwrap_or(defaults.min_ban_reason_chars),
		};

		Self {
			bot,
			limits,
			server: ServerSettings {
				metrics_bind: file.server.metrics_bind.filter(|s| !s.trim().is_empty()),
				health_bind: file.server.health_bind.filter(|s| !s.trim().is_empty()),
			},
			persistence: PersistenceSettings {
				database_url: file.persistence.database_url.filter(|s| !s.trim().is_empty()),
			},
		}
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn parse_admin_ids(raw: &str) -> Vec<UserId> {
	raw.split(',')
		.filter_map(|part| {
			let part = part.trim();
			if part.is_empty() {
				return None;
			}
			match part.parse::<i64>() {
				Ok(id) => Some(UserId(id)),
				Err(_) => {
					warn!(value = part, "config: skipping invalid admin id from env");
					None
				}
			}
		})
		.collect()
}

fn apply_env_overrides(cfg: &mut AppConfig) {
	if let Ok(v) = std::env::var("CORKBOARD_BOT_TOKEN") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.bot.token = Some(SecretString::new(v));
			info!("bot config: token overridden by env");
		}
	}

	if let Ok(v) = std::env::var("CORKBOARD_ADMIN_IDS") {
		let ids = parse_admin_ids(&v);
		if !ids.is_empty() {
			cfg.bot.admin_ids = ids;
			info!(count = cfg.bot.admin_ids.len(), "bot config: admin_ids overridden by env");
		}
	}

	if let Ok(v) = std::env::var("CORKBOARD_CHANNEL") {
		let v = v.trim().to_string();
		if !v.is_empty()
			&& let Some(target) = parse_chat_target(&v, "channel")
		{
			cfg.bot.channel = Some(target);
			info!("bot config: channel overridden by env");
		}
	}

	if let Ok(v) = std::env::var("CORKBOARD_MODERATION_CHAT") {
		let v = v.trim().to_string();
		if !v.is_empty()
			&& let Some(target) = parse_chat_target(&v, "moderation_chat")
		{
			cfg.bot.moderation_chat = Some(target);
			info!("bot config: moderation_chat overridden by env");
		}
	}

	if let Ok(v) = std::env::var("CORKBOARD_MAX_ADS_PER_DAY")
		&& let Ok(limit) = v.trim().parse::<u32>()
	{
		cfg.limits.max_ads_per_day = limit;
		info!(limit, "limits config: max_ads_per_day overridden by env");
	}

	if let Ok(v) = std::env::var("CORKBOARD_ALBUM_QUIESCENCE_MS")
		&& let Ok(ms) = v.trim().parse::<u64>()
	{
		cfg.limits.album_quiescence = Duration::from_millis(ms);
		info!(ms, "limits config: album_quiescence overridden by env");
	}

	if let Ok(v) = std::env::var("CORKBOARD_MIN_PHOTOS")
		&& let Ok(n) = v.trim().parse::<usize>()
	{
		cfg.limits.min_photos = n;
		info!(n, "limits config: min_photos overridden by env");
	}

	if let Ok(v) = std::env::var("CORKBOARD_MAX_PHOTOS")
		&& let Ok(n) = v.trim().parse::<usize>()
	{
		cfg.limits.max_photos = n;
		info!(n, "limits config: max_photos overridden by env");
	}

	if let Ok(v) = std::env::var("CORKBOARD_MIN_DESCRIPTION_CHARS")
		&& let Ok(n) = v.trim().parse::<usize>()
	{
		cfg.limits.min_description_chars = n;
		info!(n, "limits config: min_description_chars overridden by env");
	}

	if let Ok(v) = std::env::var("CORKBOARD_MAX_DESCRIPTION_CHARS")
		&& let Ok(n) = v.trim().parse::<usize>()
	{
		cfg.limits.max_description_chars = n;
		info!(n, "limits config: max_description_chars overridden by env");
	}

	if let Ok(v) = std::env::var("CORKBOARD_MIN_REJECT_REASON_CHARS")
		&& let Ok(n) = v.trim().parse::<usize>()
	{
		cfg.limits.min_reject_reason_chars = n;
		info!(n, "limits config: min_reject_reason_chars overridden by env");
	}

	if let Ok(v) = std::env::var("CORKBOARD_MIN_BAN_REASON_CHARS")
		&& let Ok(n) = v.trim().parse::<usize>()
	{
		cfg.limits.min_ban_reason_chars = n;
		info!(n, "limits config: min_ban_reason_chars overridden by env");
	}

	if let Ok(v) = std::env::var("CORKBOARD_DATABASE_URL") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.persistence.database_url = Some(v);
			info!("persistence: database_url overridden by env");
		}
	}

	if let Ok(v) = std::env::var("CORKBOARD_METRICS_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.metrics_bind = Some(v);
			info!("server config: metrics_bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("CORKBOARD_HEALTH_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.health_bind = Some(v);
			info!("server config: health_bind overridden by env");
		}
	}

	if cfg.limits.min_photos > cfg.limits.max_photos {
		warn!(
			min = cfg.limits.min_photos,
			max = cfg.limits.max_photos,
			"limits config: min_photos > max_photos; swapping"
		);
		std::mem::swap(&mut cfg.limits.min_photos, &mut cfg.limits.max_photos);
	}

	if cfg.limits.min_description_chars > cfg.limits.max_description_chars {
		warn!(
			min = cfg.limits.min_description_chars,
			max = cfg.limits.max_description_chars,
			"limits config: min_description_chars > max_description_chars; swapping"
		);
		std::mem::swap(&mut cfg.limits.min_description_chars, &mut cfg.limits.max_description_chars);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_admin_id_lists() {
		assert_eq!(parse_admin_ids("1, 2,3"), vec![UserId(1), UserId(2), UserId(3)]);
		assert_eq!(parse_admin_ids("4,,nope, 5"), vec![UserId(4), UserId(5)]);
		assert!(parse_admin_ids("").is_empty());
	}

	#[test]
	fn file_config_folds_into_defaults() {
		let file: FileConfig = toml::from_str(
			r#"
			[bot]
			token = "secret-token"
			admin_ids = [10, 20]
			channel = "@board"

			[limits]
			max_ads_per_day = 5

			[persistence]
			database_url = "sqlite:ads.db"
			"#,
		)
		.unwrap();

		let cfg = AppConfig::from_file(file);
		assert_eq!(cfg.bot.admin_ids, vec![UserId(10), UserId(20)]);
		assert_eq!(cfg.bot.channel, Some(ChatTarget::Handle("board".to_string())));
		assert!(cfg.bot.moderation_chat.is_none());
		assert_eq!(cfg.limits.max_ads_per_day, 5);
		// Untouched limits keep their defaults.
		assert_eq!(cfg.limits.max_photos, 5);
		assert_eq!(cfg.limits.album_quiescence, Duration::from_millis(500));
		assert_eq!(cfg.persistence.database_url.as_deref(), Some("sqlite:ads.db"));
	}

	#[test]
	fn empty_strings_are_treated_as_unset() {
		let file: FileConfig = toml::from_str(
			r#"
			[bot]
			token = "  "
			channel = ""
			"#,
		)
		.unwrap();

		let cfg = AppConfig::from_file(file);
		assert!(cfg.bot.token.is_none());
		assert!(cfg.bot.channel.is_none());
	}
}

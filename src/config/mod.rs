use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::content::approval::EditPolicy;

/// Uploads are never allowed to time out faster than this
pub const MIN_UPLOAD_TIMEOUT_SECS: u64 = 60;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub upload: UploadConfig,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched taxonomy tree is served without refetching
    pub tree_staleness_secs: u64,
    pub listing_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_file_bytes: u64,
    pub max_banner_bytes: u64,
    pub payload_mime_types: Vec<String>,
    pub banner_mime_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    pub edit_policy: EditPolicy,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs.max(MIN_UPLOAD_TIMEOUT_SECS))
    }
}

impl CacheConfig {
    pub fn tree_staleness(&self) -> Duration {
        Duration::from_secs(self.tree_staleness_secs)
    }

    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * MB,
            max_banner_bytes: 10 * MB,
            payload_mime_types: [
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.ms-powerpoint",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/zip",
                "text/plain",
                "image/jpeg",
                "image/png",
                "image/gif",
                "image/webp",
                "audio/mpeg",
                "video/mp4",
                "video/webm",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            banner_mime_types: ["image/jpeg", "image/png", "image/gif", "image/webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("COURSEWARE_API_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("API_UPLOAD_TIMEOUT_SECS") {
            self.api.upload_timeout_secs = v.parse().unwrap_or(self.api.upload_timeout_secs);
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_TREE_STALENESS_SECS") {
            self.cache.tree_staleness_secs = v.parse().unwrap_or(self.cache.tree_staleness_secs);
        }
        if let Ok(v) = env::var("CACHE_LISTING_TTL_SECS") {
            self.cache.listing_ttl_secs = v.parse().unwrap_or(self.cache.listing_ttl_secs);
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOAD_MAX_FILE_BYTES") {
            self.upload.max_file_bytes = v.parse().unwrap_or(self.upload.max_file_bytes);
        }
        if let Ok(v) = env::var("UPLOAD_MAX_BANNER_BYTES") {
            self.upload.max_banner_bytes = v.parse().unwrap_or(self.upload.max_banner_bytes);
        }
        if let Ok(v) = env::var("UPLOAD_PAYLOAD_MIME_TYPES") {
            self.upload.payload_mime_types = split_list(&v);
        }
        if let Ok(v) = env::var("UPLOAD_BANNER_MIME_TYPES") {
            self.upload.banner_mime_types = split_list(&v);
        }

        // Moderation overrides
        if let Ok(v) = env::var("MODERATION_EDIT_POLICY") {
            self.moderation.edit_policy = v.parse().unwrap_or(self.moderation.edit_policy);
        }

        self.api.upload_timeout_secs = self.api.upload_timeout_secs.max(MIN_UPLOAD_TIMEOUT_SECS);
        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:8000".to_string(),
                request_timeout_secs: 30,
                upload_timeout_secs: 300,
            },
            cache: CacheConfig {
                tree_staleness_secs: 5 * 60,
                listing_ttl_secs: 30,
            },
            upload: UploadConfig::default(),
            moderation: ModerationConfig {
                edit_policy: EditPolicy::KeepApproval,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://staging-api.example.com".to_string(),
                request_timeout_secs: 20,
                upload_timeout_secs: 180,
            },
            cache: CacheConfig {
                tree_staleness_secs: 5 * 60,
                listing_ttl_secs: 30,
            },
            upload: UploadConfig::default(),
            moderation: ModerationConfig {
                edit_policy: EditPolicy::KeepApproval,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://api.example.com".to_string(),
                request_timeout_secs: 15,
                upload_timeout_secs: 120,
            },
            cache: CacheConfig {
                tree_staleness_secs: 5 * 60,
                listing_ttl_secs: 60,
            },
            upload: UploadConfig::default(),
            moderation: ModerationConfig {
                edit_policy: EditPolicy::KeepApproval,
            },
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global config for the binary - library types take their config by argument
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

use crate::models::AdminToken;
use crate::services::elasticsearch_service::ElasticsearchStore;
use crate::utils::split_list;
use crate::AppState;
use anyhow::{anyhow, bail, Result};
use elasticsearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    Elasticsearch,
};
use env_logger::{Builder, Env};
use lazy_static::lazy_static;
use log::{info, LevelFilter};
use rocket::http::{Method, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::time::Duration;

pub const NAMESPACE: &str = "sailing-channels";
pub const DEV_NAMESPACE: &str = "sailing-channels-dev";
pub const DEFAULT_SEED_CHANNEL: &str = "UC5xDht2blPNWdVtl9PkDmgA";

lazy_static! {
    pub static ref YOUTUBE_API_KEYS: Option<String> = env_value("YOUTUBE_API_KEYS");
    pub static ref YOUTUBE_VIDEO_API_KEYS: Option<String> = env_value("YOUTUBE_VIDEO_API_KEYS");
    pub static ref DETECT_LANGUAGE_API_KEYS: Option<String> =
        env_value("DETECT_LANGUAGE_API_KEYS");
    pub static ref ADMIN_TOKEN: Option<String> = env_value("ADMIN_TOKEN");
    pub static ref ELASTICSEARCH_URL: String =
        env_value("ELASTICSEARCH_URL").unwrap_or_else(|| "http://localhost:9200".to_string());
    pub static ref ENVIRONMENT: Option<String> = env_value("ENVIRONMENT");
    pub static ref SEED_CHANNEL_ID: String =
        env_value("SEED_CHANNEL_ID").unwrap_or_else(|| DEFAULT_SEED_CHANNEL.to_string());
    pub static ref MAX_DEPTH: Option<String> = env_value("MAX_DEPTH");
    pub static ref CYCLE_INTERVAL_SECS: Option<String> = env_value("CYCLE_INTERVAL_SECS");
    pub static ref REQUEST_TIMEOUT_SECS: Option<String> = env_value("REQUEST_TIMEOUT_SECS");
    pub static ref ANNOUNCE_WEBHOOK_URL: Option<String> = env_value("ANNOUNCE_WEBHOOK_URL");
    pub static ref SITE_URL: String =
        env_value("SITE_URL").unwrap_or_else(|| "https://sailing-channels.com".to_string());
    pub static ref CORS_ALLOWED_ORIGIN: String =
        env_value("CORS_ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:8080".to_string());
}

/// Blank variables count as unset.
fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Raw environment values before validation.
#[derive(Debug, Clone)]
pub struct EnvValues {
    pub youtube_api_keys: Option<String>,
    pub youtube_video_api_keys: Option<String>,
    pub detect_language_api_keys: Option<String>,
    pub admin_token: Option<String>,
    pub elasticsearch_url: String,
    pub environment: Option<String>,
    pub seed_channel_id: String,
    pub max_depth: Option<String>,
    pub cycle_interval_secs: Option<String>,
    pub request_timeout_secs: Option<String>,
    pub announce_webhook_url: Option<String>,
    pub site_url: String,
    pub cors_allowed_origin: String,
}

impl EnvValues {
    /// Reads the process environment; call after `load_environment`.
    pub fn from_env() -> Self {
        EnvValues {
            youtube_api_keys: YOUTUBE_API_KEYS.clone(),
            youtube_video_api_keys: YOUTUBE_VIDEO_API_KEYS.clone(),
            detect_language_api_keys: DETECT_LANGUAGE_API_KEYS.clone(),
            admin_token: ADMIN_TOKEN.clone(),
            elasticsearch_url: ELASTICSEARCH_URL.clone(),
            environment: ENVIRONMENT.clone(),
            seed_channel_id: SEED_CHANNEL_ID.clone(),
            max_depth: MAX_DEPTH.clone(),
            cycle_interval_secs: CYCLE_INTERVAL_SECS.clone(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS.clone(),
            announce_webhook_url: ANNOUNCE_WEBHOOK_URL.clone(),
            site_url: SITE_URL.clone(),
            cors_allowed_origin: CORS_ALLOWED_ORIGIN.clone(),
        }
    }
}

/// Everything the crawler needs from the environment, validated once at startup.
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    pub youtube_api_keys: Vec<String>,
    pub youtube_video_api_keys: Vec<String>,
    pub detect_language_api_keys: Vec<String>,
    pub admin_token: String,
    pub elasticsearch_url: String,
    pub development: bool,
    pub seed_channel_id: String,
    pub max_depth: usize,
    pub cycle_interval: Duration,
    pub request_timeout: Duration,
    pub announce_webhook_url: Option<String>,
    pub site_url: String,
    pub cors_allowed_origin: String,
}

fn number(name: &str, raw: Option<&str>, default: u64) -> Result<u64> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| anyhow!("{name} must be a positive number: {e}")),
        None => Ok(default),
    }
}

impl CrawlerSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_values(EnvValues::from_env())
    }

    pub fn from_values(values: EnvValues) -> Result<Self> {
        let youtube_api_keys = split_list(values.youtube_api_keys.as_deref().unwrap_or_default());
        if youtube_api_keys.is_empty() {
            bail!("YOUTUBE_API_KEYS environment variable must be set");
        }

        let youtube_video_api_keys = match values.youtube_video_api_keys.as_deref() {
            Some(keys) => split_list(keys),
            None => youtube_api_keys.clone(),
        };

        let admin_token = values
            .admin_token
            .ok_or_else(|| anyhow!("ADMIN_TOKEN environment variable must be set"))?;

        let max_depth = number("MAX_DEPTH", values.max_depth.as_deref(), 3)? as usize;
        if max_depth == 0 {
            bail!("MAX_DEPTH must be at least 1");
        }

        Ok(CrawlerSettings {
            youtube_api_keys,
            youtube_video_api_keys,
            detect_language_api_keys: split_list(
                values.detect_language_api_keys.as_deref().unwrap_or_default(),
            ),
            admin_token,
            elasticsearch_url: values.elasticsearch_url,
            development: values.environment.as_deref() == Some("development"),
            seed_channel_id: values.seed_channel_id,
            max_depth,
            cycle_interval: Duration::from_secs(number(
                "CYCLE_INTERVAL_SECS",
                values.cycle_interval_secs.as_deref(),
                900,
            )?),
            request_timeout: Duration::from_secs(number(
                "REQUEST_TIMEOUT_SECS",
                values.request_timeout_secs.as_deref(),
                30,
            )?),
            announce_webhook_url: values.announce_webhook_url,
            site_url: values.site_url,
            cors_allowed_origin: values.cors_allowed_origin,
        })
    }

    pub fn namespace(&self) -> &'static str {
        if self.development {
            DEV_NAMESPACE
        } else {
            NAMESPACE
        }
    }

    /// Language detection runs in production only and needs at least one key.
    pub fn detect_language(&self) -> bool {
        !self.development && !self.detect_language_api_keys.is_empty()
    }
}

pub fn init_logger() {
    Builder::from_env(Env::default().default_filter_or(LevelFilter::Info.as_str())).init();
    info!("Starting channel crawler...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn create_elasticsearch_client(settings: &CrawlerSettings) -> Result<Elasticsearch> {
    let es_url = &settings.elasticsearch_url;
    info!("Connecting to Elasticsearch at: {es_url}");

    let transport = TransportBuilder::new(SingleNodeConnectionPool::new(es_url.parse()?))
        .timeout(settings.request_timeout)
        .build()?;

    Ok(Elasticsearch::new(transport))
}

pub async fn create_store(settings: &CrawlerSettings) -> Result<ElasticsearchStore> {
    let client = create_elasticsearch_client(settings)?;
    let store = ElasticsearchStore::new(client, settings.namespace());

    store.create_indices().await;
    info!("Using index namespace '{}'", settings.namespace());

    Ok(store)
}

pub fn create_cors(settings: &CrawlerSettings) -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[settings
            .cors_allowed_origin
            .as_str()]))
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&[
            "Authorization",
            "Accept",
            "Content-Type",
        ]))
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let expected = match request.rocket().state::<AppState>() {
            Some(state) => state.admin_token.as_str(),
            None => return Outcome::Error((Status::InternalServerError, "Missing state")),
        };

        let token = request
            .headers()
            .get_one("Authorization")
            .and_then(|auth| auth.strip_prefix("Bearer "));

        match token {
            Some(t) => {
                if t == expected {
                    Outcome::Success(AdminToken(t.to_string()))
                } else {
                    Outcome::Error((Status::Unauthorized, "Invalid token"))
                }
            }
            None => Outcome::Error((Status::Unauthorized, "Missing token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> EnvValues {
        EnvValues {
            youtube_api_keys: Some("a, b".to_string()),
            youtube_video_api_keys: None,
            detect_language_api_keys: None,
            admin_token: Some("secret".to_string()),
            elasticsearch_url: "http://localhost:9200".to_string(),
            environment: None,
            seed_channel_id: DEFAULT_SEED_CHANNEL.to_string(),
            max_depth: None,
            cycle_interval_secs: None,
            request_timeout_secs: None,
            announce_webhook_url: None,
            site_url: "https://sailing-channels.com".to_string(),
            cors_allowed_origin: "http://localhost:8080".to_string(),
        }
    }

    #[test]
    fn defaults_apply() {
        let s = CrawlerSettings::from_values(values()).unwrap();

        assert_eq!(s.youtube_api_keys, vec!["a", "b"]);
        assert_eq!(s.youtube_video_api_keys, s.youtube_api_keys);
        assert_eq!(s.max_depth, 3);
        assert_eq!(s.cycle_interval, Duration::from_secs(900));
        assert_eq!(s.request_timeout, Duration::from_secs(30));
        assert_eq!(s.seed_channel_id, DEFAULT_SEED_CHANNEL);
        assert_eq!(s.namespace(), NAMESPACE);
        assert!(!s.detect_language());
    }

    #[test]
    fn development_uses_dev_namespace() {
        let s = CrawlerSettings::from_values(EnvValues {
            environment: Some("development".to_string()),
            detect_language_api_keys: Some("k".to_string()),
            ..values()
        })
        .unwrap();

        assert_eq!(s.namespace(), DEV_NAMESPACE);
        assert!(!s.detect_language());
    }

    #[test]
    fn production_with_keys_detects_language() {
        let s = CrawlerSettings::from_values(EnvValues {
            detect_language_api_keys: Some("k1,k2".to_string()),
            youtube_video_api_keys: Some("v".to_string()),
            ..values()
        })
        .unwrap();

        assert!(s.detect_language());
        assert_eq!(s.youtube_video_api_keys, vec!["v"]);
    }

    #[test]
    fn missing_keys_fail() {
        let no_keys = EnvValues {
            youtube_api_keys: None,
            ..values()
        };
        let no_token = EnvValues {
            admin_token: None,
            ..values()
        };

        assert!(CrawlerSettings::from_values(no_keys).is_err());
        assert!(CrawlerSettings::from_values(no_token).is_err());
    }

    #[test]
    fn bad_numbers_fail() {
        let deep = EnvValues {
            max_depth: Some("deep".to_string()),
            ..values()
        };
        let zero = EnvValues {
            max_depth: Some("0".to_string()),
            ..values()
        };

        assert!(CrawlerSettings::from_values(deep).is_err());
        assert!(CrawlerSettings::from_values(zero).is_err());
    }

    #[test]
    fn blank_variables_count_as_unset() {
        env::set_var("CHANNEL_CRAWLER_BLANK_TEST", "  ");

        assert_eq!(env_value("CHANNEL_CRAWLER_BLANK_TEST"), None);
    }
}

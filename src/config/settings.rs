use serde::Deserialize;

use crate::session::cookie::DEFAULT_COOKIE_NAME;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub store: StoreSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to, and whether clients
/// may publish documents themselves.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub allow_client_publish: bool,
}

/// How connections are tied to sessions.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    /// Cookie carrying the session id on the upgrade request.
    pub cookie_name: String,
    /// Session ids the built-in session store starts out authenticating.
    pub seed: Vec<String>,
    /// Lifetime of seeded sessions; `None` keeps them until revoked.
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sled,
}

/// Where the subscription indices live.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Database directory for the sled backend.
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub session: Option<PartialSessionSettings>,
    pub store: Option<PartialStoreSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub allow_client_publish: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialSessionSettings {
    pub cookie_name: Option<String>,
    pub seed: Option<Vec<String>>,
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialStoreSettings {
    pub backend: Option<StoreBackend>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                allow_client_publish: true,
            },
            session: SessionSettings {
                cookie_name: DEFAULT_COOKIE_NAME.to_string(),
                seed: Vec::new(),
                ttl_secs: None,
            },
            store: StoreSettings {
                backend: StoreBackend::Memory,
                path: "sockmap_db".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Fill every field missing from `partial` with its default.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server;
        let session = partial.session;
        let store = partial.store;
        let log = partial.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                allow_client_publish: server
                    .as_ref()
                    .and_then(|s| s.allow_client_publish)
                    .unwrap_or(default.server.allow_client_publish),
            },
            session: SessionSettings {
                cookie_name: session
                    .as_ref()
                    .and_then(|s| s.cookie_name.clone())
                    .unwrap_or(default.session.cookie_name),
                seed: session
                    .as_ref()
                    .and_then(|s| s.seed.clone())
                    .unwrap_or(default.session.seed),
                ttl_secs: session
                    .as_ref()
                    .and_then(|s| s.ttl_secs)
                    .or(default.session.ttl_secs),
            },
            store: StoreSettings {
                backend: store
                    .as_ref()
                    .and_then(|s| s.backend)
                    .unwrap_or(default.store.backend),
                path: store
                    .as_ref()
                    .and_then(|s| s.path.clone())
                    .unwrap_or(default.store.path),
            },
            log: LogSettings {
                level: log
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.log.level),
            },
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

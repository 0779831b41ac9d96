/// Configuration management for larkm
///
/// Settings come from an optional JSON file (`LARKM_CONFIG`, default
/// `larkm.json`) with environment overrides on top. Everything is normalized
/// once at startup into an immutable `LarkmConfig`: defaults are merged into
/// the allow-lists and IP addresses are parsed, so request handling never
/// touches raw configuration.
use crate::error::{LarkmError, LarkmResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Key in `commitment_statements` holding the global statement
pub const DEFAULT_STATEMENT_KEY: &str = "default";

const FALLBACK_STATEMENT: &str = "Default commitment statement.";

/// Configuration as written in the JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub hostname: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub search_index_path: Option<PathBuf>,
    pub default_naan: String,
    pub default_shoulder: String,
    pub allowed_naans: Vec<String>,
    pub allowed_shoulders: Vec<String>,
    pub shoulder_length: usize,
    pub commitment_statements: BTreeMap<String, String>,
    pub erc_metadata_defaults: ErcDefaults,
    pub resolver_hosts: ResolverHosts,
    pub trusted_ips: Vec<String>,
    pub api_keys: Vec<String>,
    pub private_shoulders: BTreeMap<String, Vec<String>>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 8000,
            db_path: PathBuf::from("./data/larkm.sqlite"),
            search_index_path: None,
            default_naan: "99999".to_string(),
            default_shoulder: "s1".to_string(),
            allowed_naans: Vec::new(),
            allowed_shoulders: Vec::new(),
            shoulder_length: 2,
            commitment_statements: BTreeMap::new(),
            erc_metadata_defaults: ErcDefaults::default(),
            resolver_hosts: ResolverHosts::default(),
            trusted_ips: Vec::new(),
            api_keys: Vec::new(),
            private_shoulders: BTreeMap::new(),
        }
    }
}

/// ERC values used when a mint request leaves them out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErcDefaults {
    pub who: String,
    pub what: String,
    pub when: String,
}

impl Default for ErcDefaults {
    fn default() -> Self {
        Self {
            who: ":at".to_string(),
            what: ":at".to_string(),
            when: ":at".to_string(),
        }
    }
}

/// Resolver hosts advertised alongside a newly minted ARK
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverHosts {
    pub local: String,
    pub global: String,
}

/// Main larkm configuration
#[derive(Debug, Clone)]
pub struct LarkmConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub naming: NamingConfig,
    pub metadata: MetadataConfig,
    pub resolver_hosts: ResolverHosts,
    pub access: AccessConfig,
}

/// Listen address
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Storage locations
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub search_index_path: Option<PathBuf>,
}

/// NAAN and shoulder policy
#[derive(Debug, Clone)]
pub struct NamingConfig {
    pub default_naan: String,
    pub default_shoulder: String,
    /// Always contains `default_naan`
    pub allowed_naans: BTreeSet<String>,
    /// Always contains `default_shoulder`
    pub allowed_shoulders: BTreeSet<String>,
    pub shoulder_length: usize,
}

/// Descriptive metadata defaults
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub erc_defaults: ErcDefaults,
    /// Shoulder-specific commitment statements
    pub commitment_statements: BTreeMap<String, String>,
    pub default_statement: String,
}

impl MetadataConfig {
    /// Commitment statement for a shoulder, falling back to the global one
    pub fn statement_for(&self, shoulder: &str) -> &str {
        self.commitment_statements
            .get(shoulder)
            .map(String::as_str)
            .unwrap_or(&self.default_statement)
    }
}

/// Caller gating; an empty list turns the corresponding check off
#[derive(Debug, Clone, Default)]
pub struct AccessConfig {
    pub trusted_ips: Vec<IpAddr>,
    pub api_keys: Vec<String>,
    pub private_shoulders: BTreeMap<String, Vec<IpAddr>>,
}

impl LarkmConfig {
    /// Load configuration from the optional JSON file and environment variables
    pub fn from_env() -> LarkmResult<Self> {
        dotenv::dotenv().ok();

        let config_path = env::var("LARKM_CONFIG").unwrap_or_else(|_| "larkm.json".to_string());
        let mut raw = if Path::new(&config_path).exists() {
            RawConfig::from_file(Path::new(&config_path))?
        } else {
            tracing::warn!("No configuration file at {}, using built-in defaults", config_path);
            RawConfig::default()
        };

        if let Ok(hostname) = env::var("LARKM_HOSTNAME") {
            raw.hostname = hostname;
        }
        if let Ok(port) = env::var("LARKM_PORT") {
            raw.port = port
                .parse()
                .map_err(|_| LarkmError::Config("Invalid port number".to_string()))?;
        }
        if let Ok(db_path) = env::var("LARKM_DB_PATH") {
            raw.db_path = PathBuf::from(db_path);
        }
        if let Ok(index_path) = env::var("LARKM_SEARCH_INDEX_PATH") {
            raw.search_index_path = Some(PathBuf::from(index_path));
        }
        if let Ok(naan) = env::var("LARKM_DEFAULT_NAAN") {
            raw.default_naan = naan;
        }
        if let Ok(shoulder) = env::var("LARKM_DEFAULT_SHOULDER") {
            raw.default_shoulder = shoulder;
        }
        if let Ok(keys) = env::var("LARKM_API_KEYS") {
            raw.api_keys = split_list(&keys);
        }
        if let Ok(ips) = env::var("LARKM_TRUSTED_IPS") {
            raw.trusted_ips = split_list(&ips);
        }

        Self::from_raw(raw)
    }

    /// Normalize raw settings into the immutable runtime configuration
    pub fn from_raw(raw: RawConfig) -> LarkmResult<Self> {
        let mut allowed_naans: BTreeSet<String> = raw.allowed_naans.into_iter().collect();
        allowed_naans.insert(raw.default_naan.clone());

        let mut allowed_shoulders: BTreeSet<String> = raw.allowed_shoulders.into_iter().collect();
        allowed_shoulders.insert(raw.default_shoulder.clone());

        let mut commitment_statements = raw.commitment_statements;
        let default_statement = commitment_statements
            .remove(DEFAULT_STATEMENT_KEY)
            .unwrap_or_else(|| FALLBACK_STATEMENT.to_string());

        let trusted_ips = parse_ips(&raw.trusted_ips)?;
        let private_shoulders = raw
            .private_shoulders
            .iter()
            .map(|(shoulder, ips)| Ok((shoulder.clone(), parse_ips(ips)?)))
            .collect::<LarkmResult<BTreeMap<_, _>>>()?;

        let config = LarkmConfig {
            service: ServiceConfig {
                hostname: raw.hostname,
                port: raw.port,
            },
            storage: StorageConfig {
                db_path: raw.db_path,
                search_index_path: raw.search_index_path,
            },
            naming: NamingConfig {
                default_naan: raw.default_naan,
                default_shoulder: raw.default_shoulder,
                allowed_naans,
                allowed_shoulders,
                shoulder_length: raw.shoulder_length,
            },
            metadata: MetadataConfig {
                erc_defaults: raw.erc_metadata_defaults,
                commitment_statements,
                default_statement,
            },
            resolver_hosts: ResolverHosts {
                local: raw.resolver_hosts.local.trim_end_matches('/').to_string(),
                global: raw.resolver_hosts.global.trim_end_matches('/').to_string(),
            },
            access: AccessConfig {
                trusted_ips,
                api_keys: raw.api_keys.into_iter().filter(|k| !k.is_empty()).collect(),
                private_shoulders,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> LarkmResult<()> {
        if self.service.hostname.is_empty() {
            return Err(LarkmError::Config("Hostname cannot be empty".to_string()));
        }

        if self.naming.shoulder_length == 0 {
            return Err(LarkmError::Config("shoulder_length must be at least 1".to_string()));
        }

        if self.naming.default_naan.is_empty()
            || !self.naming.default_naan.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(LarkmError::Config(format!(
                "Default NAAN {:?} must be non-empty and alphanumeric",
                self.naming.default_naan
            )));
        }

        // A NAAN is one path segment of every ARK minted under it
        for naan in &self.naming.allowed_naans {
            if naan.is_empty() || !naan.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(LarkmError::Config(format!(
                    "NAAN {:?} must be non-empty and alphanumeric",
                    naan
                )));
            }
        }

        // Resolution splits the shoulder off by width, so every shoulder must match it
        let shoulders = self
            .naming
            .allowed_shoulders
            .iter()
            .chain(self.access.private_shoulders.keys());
        for shoulder in shoulders {
            if shoulder.chars().count() != self.naming.shoulder_length
                || !shoulder.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err(LarkmError::Config(format!(
                    "Shoulder {:?} must be {} alphanumeric characters",
                    shoulder, self.naming.shoulder_length
                )));
            }
        }

        Ok(())
    }

    /// Configuration subset that is safe to show to clients
    ///
    /// Keys, addresses and filesystem paths are left out.
    pub fn public_view(&self) -> serde_json::Value {
        let mut statements = self.metadata.commitment_statements.clone();
        statements.insert(
            DEFAULT_STATEMENT_KEY.to_string(),
            self.metadata.default_statement.clone(),
        );

        json!({
            "default_naan": self.naming.default_naan,
            "default_shoulder": self.naming.default_shoulder,
            "allowed_naans": self.naming.allowed_naans,
            "allowed_shoulders": self.naming.allowed_shoulders,
            "shoulder_length": self.naming.shoulder_length,
            "commitment_statements": statements,
            "erc_metadata_defaults": self.metadata.erc_defaults,
            "resolver_hosts": self.resolver_hosts,
            "private_shoulders": self.access.private_shoulders.keys().collect::<Vec<_>>(),
        })
    }
}

impl RawConfig {
    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> LarkmResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            LarkmError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_ips(values: &[String]) -> LarkmResult<Vec<IpAddr>> {
    values
        .iter()
        .map(|value| {
            value
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| LarkmError::Config(format!("Invalid IP address {:?}", value)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with(shoulders: &[&str]) -> RawConfig {
        RawConfig {
            allowed_shoulders: shoulders.iter().map(|s| s.to_string()).collect(),
            ..RawConfig::default()
        }
    }

    #[test]
    fn test_defaults_merged_into_allow_lists() {
        let config = LarkmConfig::from_raw(RawConfig {
            default_naan: "12345".to_string(),
            allowed_naans: vec!["99999".to_string()],
            ..raw_with(&["x9"])
        })
        .unwrap();

        assert!(config.naming.allowed_naans.contains("12345"));
        assert!(config.naming.allowed_naans.contains("99999"));
        assert!(config.naming.allowed_shoulders.contains("s1"));
        assert!(config.naming.allowed_shoulders.contains("x9"));
    }

    #[test]
    fn test_statement_lookup() {
        let mut raw = raw_with(&["s2"]);
        raw.commitment_statements
            .insert("default".to_string(), "Global statement.".to_string());
        raw.commitment_statements
            .insert("s2".to_string(), "Shoulder statement.".to_string());
        let config = LarkmConfig::from_raw(raw).unwrap();

        assert_eq!(config.metadata.statement_for("s2"), "Shoulder statement.");
        assert_eq!(config.metadata.statement_for("s1"), "Global statement.");
    }

    #[test]
    fn test_missing_default_statement_falls_back() {
        let config = LarkmConfig::from_raw(RawConfig::default()).unwrap();
        assert_eq!(config.metadata.default_statement, FALLBACK_STATEMENT);
    }

    #[test]
    fn test_invalid_ip_rejected() {
        let raw = RawConfig {
            trusted_ips: vec!["not-an-ip".to_string()],
            ..RawConfig::default()
        };
        assert!(matches!(LarkmConfig::from_raw(raw), Err(LarkmError::Config(_))));
    }

    #[test]
    fn test_shoulder_width_enforced() {
        assert!(LarkmConfig::from_raw(raw_with(&["abc"])).is_err());

        let mut raw = RawConfig::default();
        raw.private_shoulders
            .insert("p".to_string(), vec!["10.0.0.1".to_string()]);
        assert!(LarkmConfig::from_raw(raw).is_err());
    }

    #[test]
    fn test_allowed_naans_must_be_alphanumeric() {
        for naan in ["12/34", "", "123 45"] {
            let raw = RawConfig {
                allowed_naans: vec![naan.to_string()],
                ..RawConfig::default()
            };
            assert!(
                matches!(LarkmConfig::from_raw(raw), Err(LarkmError::Config(_))),
                "{:?} accepted",
                naan
            );
        }
    }

    #[test]
    fn test_parse_json_file_format() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "default_naan": "12345",
                "default_shoulder": "x1",
                "allowed_shoulders": ["p1"],
                "private_shoulders": {"p1": ["10.0.0.5"]},
                "resolver_hosts": {"local": "https://resolver.example.com/", "global": ""},
                "api_keys": ["myapikey"]
            }"#,
        )
        .unwrap();
        let config = LarkmConfig::from_raw(raw).unwrap();

        assert_eq!(config.naming.default_shoulder, "x1");
        assert_eq!(config.resolver_hosts.local, "https://resolver.example.com");
        assert_eq!(
            config.access.private_shoulders["p1"],
            vec!["10.0.0.5".parse::<IpAddr>().unwrap()]
        );
        assert_eq!(config.access.api_keys, vec!["myapikey".to_string()]);
        // untouched keys keep their defaults
        assert_eq!(config.service.port, 8000);
    }

    #[test]
    fn test_public_view_hides_secrets() {
        let raw = RawConfig {
            api_keys: vec!["secret-key".to_string()],
            trusted_ips: vec!["10.1.1.1".to_string()],
            search_index_path: Some(PathBuf::from("/srv/index.sqlite")),
            ..RawConfig::default()
        };
        let config = LarkmConfig::from_raw(raw).unwrap();
        let view = config.public_view().to_string();

        assert!(!view.contains("secret-key"));
        assert!(!view.contains("10.1.1.1"));
        assert!(!view.contains("/srv/index.sqlite"));
        assert!(!view.contains("larkm.sqlite"));
        assert!(view.contains("\"default_naan\":\"99999\""));
    }
}

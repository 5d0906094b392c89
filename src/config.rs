use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scribe", about = "A small blog with local and Google sign-in")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub google: GoogleConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
    /// Adds the `Secure` attribute to auth cookies. Enable behind HTTPS.
    pub secure_cookies: bool,
}

/// OAuth client settings for Google sign-in. Sign-in via Google is disabled
/// until `client_id`, `client_secret` and `redirect_url` are all present.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "scribe_session".to_string(),
            session_hours: 168,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            secure_cookies: false,
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_url: None,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        }
    }
}

impl GoogleConfig {
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.redirect_url.is_some()
    }
}

impl Config {
    /// Layers, lowest priority first: defaults, TOML file, environment, CLI.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("scribe.db"));
        }

        Ok(config)
    }

    /// Apply deployment overrides. Client secrets are expected to arrive this
    /// way rather than through the config file.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
            self.server.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT is not a valid port number: {port}"))?;
        }
        if let Some(id) = lookup("SCRIBE_GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(id);
        }
        if let Some(secret) = lookup("SCRIBE_GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(secret);
        }
        if let Some(url) = lookup("SCRIBE_GOOGLE_REDIRECT_URL") {
            self.google.redirect_url = Some(url);
        }
        Ok(())
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".scribe"))
                .unwrap_or_else(|| PathBuf::from(".scribe"))
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("scribe.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cli_for(dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.cookie_name, "scribe_session");
        assert_eq!(config.auth.session_hours, 168);
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(!config.auth.secure_cookies);
        assert!(config.database.path.is_none());
        assert!(!config.google.is_configured());
    }

    #[test]
    fn data_dir_defaults_to_home_dot_scribe() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".scribe"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.db_path(), tmp.path().join("scribe.db"));
    }

    #[test]
    fn load_reads_toml_file_and_cli_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[auth]
cookie_name = "blog"
session_hours = 24

[google]
client_id = "abc.apps.googleusercontent.com"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: None,
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.auth.cookie_name, "blog");
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(
            config.google.client_id.as_deref(),
            Some("abc.apps.googleusercontent.com")
        );
        assert!(!config.google.is_configured());
    }

    #[test]
    fn env_overrides_port_and_google_credentials() {
        let env: HashMap<&str, &str> = [
            ("PORT", "8080"),
            ("SCRIBE_GOOGLE_CLIENT_ID", "id"),
            ("SCRIBE_GOOGLE_CLIENT_SECRET", "secret"),
            ("SCRIBE_GOOGLE_REDIRECT_URL", "http://localhost:8080/auth/external/callback"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.google.is_configured());
    }

    #[test]
    fn empty_port_is_ignored_and_garbage_is_rejected() {
        let mut config = Config::default();
        config
            .apply_env(|key| (key == "PORT").then(String::new))
            .unwrap();
        assert_eq!(config.server.port, 3000);

        let result = config.apply_env(|key| (key == "PORT").then(|| "http".to_string()));
        assert!(result.is_err());
    }
}

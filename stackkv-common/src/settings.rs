//! # Connection Settings
//!
//! Purpose: Resolve the host, port and credential used to reach the Redis
//! Stack server.
//!
//! ## Design Principles
//! 1. **Layered Resolution**: explicit override > environment variable > default.
//! 2. **Immutable Value**: settings are fixed once built; fields are private.
//! 3. **No Global Mutation**: settings-file variables are layered into an
//!    explicit lookup chain instead of being written into the process
//!    environment.
//! 4. **Injectable Lookup**: resolution accepts a variable lookup so tests do
//!    not depend on process-wide state.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Variable holding the server host name.
pub const HOST_VAR: &str = "REDIS_HOST";
/// Variable holding the server port.
pub const PORT_VAR: &str = "REDIS_PORT";
/// Variable holding the server password.
pub const PASSWORD_VAR: &str = "REDIS_PASSWORD";

/// Host used when neither an override nor a variable is present.
pub const DEFAULT_HOST: &str = "localhost";
/// Port used when neither an override nor a variable is present.
pub const DEFAULT_PORT: u16 = 6379;

/// Settings file name, looked up at the workspace root by default.
pub const ENV_FILE_NAME: &str = ".env";

/// Explicit values that win over every other source.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
}

/// Resolved connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    host: String,
    port: u16,
    password: Option<String>,
}

impl ConnectionSettings {
    /// Resolves settings against the process environment.
    pub fn new(overrides: SettingsOverrides) -> ConfigResult<Self> {
        Self::resolve(overrides, process_var)
    }

    /// Resolves settings with a caller-supplied variable lookup.
    ///
    /// Empty strings, whether passed as overrides or found through `lookup`,
    /// are treated as unset.
    pub fn resolve<F>(overrides: SettingsOverrides, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let host = non_empty(overrides.host)
            .or_else(|| lookup(HOST_VAR))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match overrides.port {
            Some(port) => port,
            None => match lookup(PORT_VAR) {
                Some(raw) => parse_port(PORT_VAR, &raw)?,
                None => DEFAULT_PORT,
            },
        };

        let password = non_empty(overrides.password).or_else(|| lookup(PASSWORD_VAR));

        Ok(ConnectionSettings {
            host,
            port,
            password,
        })
    }

    /// Loads a dotenv-style settings file and resolves against it.
    ///
    /// `None` selects [`default_env_path`]. Variables already present in the
    /// process environment take precedence over the file's values.
    pub fn from_env_file(path: Option<&Path>) -> ConfigResult<Self> {
        Self::from_env_file_with(path, process_var)
    }

    /// Same as [`Self::from_env_file`], with `lookup` standing in for the
    /// process environment.
    pub fn from_env_file_with<F>(path: Option<&Path>, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_env_path);
        let file_vars = read_env_file(&path)?;
        Self::resolve(SettingsOverrides::default(), |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Masked credential for log lines.
    ///
    /// Returns `"None"` without a credential, otherwise the first character
    /// followed by one `*` per remaining character.
    pub fn password_preview(&self) -> String {
        let Some(password) = self.password.as_deref() else {
            return "None".to_string();
        };
        let mut chars = password.chars();
        match chars.next() {
            Some(first) => {
                let mut preview = String::with_capacity(password.len());
                preview.push(first);
                preview.extend(chars.map(|_| '*'));
                preview
            }
            None => "None".to_string(),
        }
    }
}

// Keep the raw credential out of debug output.
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password_preview())
            .finish()
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Default settings file location: `.env` at the workspace root.
pub fn default_env_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(ENV_FILE_NAME)
}

fn read_env_file(path: &Path) -> ConfigResult<HashMap<String, String>> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let unreadable = |source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(path).map_err(unreadable)? {
        let (key, value) = item.map_err(unreadable)?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn process_var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn parse_port(key: &'static str, raw: &str) -> ConfigResult<u16> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidPort {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn no_vars(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_without_overrides_or_vars() {
        let settings = ConnectionSettings::resolve(SettingsOverrides::default(), no_vars).unwrap();
        assert_eq!(settings.host(), "localhost");
        assert_eq!(settings.port(), 6379);
        assert_eq!(settings.password(), None);
    }

    #[test]
    fn vars_replace_defaults() {
        let lookup = vars(&[
            ("REDIS_HOST", "test-host"),
            ("REDIS_PORT", "6380"),
            ("REDIS_PASSWORD", "test-password"),
        ]);
        let settings = ConnectionSettings::resolve(SettingsOverrides::default(), lookup).unwrap();
        assert_eq!(settings.host(), "test-host");
        assert_eq!(settings.port(), 6380);
        assert_eq!(settings.password(), Some("test-password"));
    }

    #[test]
    fn overrides_win_over_vars() {
        let lookup = vars(&[
            ("REDIS_HOST", "env-host"),
            ("REDIS_PORT", "6380"),
            ("REDIS_PASSWORD", "env-password"),
        ]);
        let overrides = SettingsOverrides {
            host: Some("param-host".into()),
            port: Some(6381),
            password: Some("param-password".into()),
        };
        let settings = ConnectionSettings::resolve(overrides, lookup).unwrap();
        assert_eq!(settings.host(), "param-host");
        assert_eq!(settings.port(), 6381);
        assert_eq!(settings.password(), Some("param-password"));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let lookup = vars(&[("REDIS_HOST", ""), ("REDIS_PASSWORD", "")]);
        let overrides = SettingsOverrides {
            host: Some(String::new()),
            ..Default::default()
        };
        let settings = ConnectionSettings::resolve(overrides, lookup).unwrap();
        assert_eq!(settings.host(), "localhost");
        assert_eq!(settings.password(), None);
        assert_eq!(settings.password_preview(), "None");
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ConnectionSettings::resolve(SettingsOverrides::default(), vars(&[("REDIS_PORT", "sixty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { key: "REDIS_PORT", .. }));

        let err = ConnectionSettings::resolve(SettingsOverrides::default(), vars(&[("REDIS_PORT", "70000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }

    #[test]
    fn preview_masks_all_but_first_char() {
        let preview = |password: &str| {
            let overrides = SettingsOverrides {
                password: Some(password.into()),
                ..Default::default()
            };
            ConnectionSettings::resolve(overrides, no_vars)
                .unwrap()
                .password_preview()
        };
        assert_eq!(preview("secret123"), "s********");
        assert_eq!(preview("x"), "x");
        assert_eq!(preview("pässwörd"), "p*******");
    }

    #[test]
    fn debug_output_hides_password() {
        let overrides = SettingsOverrides {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let settings = ConnectionSettings::resolve(overrides, no_vars).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("h******"));
        assert_eq!(settings.to_string(), "localhost:6379");
    }

    #[test]
    fn missing_env_file_reports_remediation() {
        let err = ConnectionSettings::from_env_file_with(Some(Path::new("/nonexistent/path/.env")), no_vars)
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        let message = err.to_string();
        assert!(message.starts_with(".env file not found at /nonexistent/path/.env"));
        assert!(message.contains("copy .env.example to .env"));
    }

    #[test]
    fn env_file_values_sit_below_process_vars() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# local stack").unwrap();
        writeln!(file, "REDIS_HOST=file-host").unwrap();
        writeln!(file, "REDIS_PORT=6390").unwrap();
        writeln!(file, "REDIS_PASSWORD=file-secret").unwrap();

        let lookup = vars(&[("REDIS_HOST", "already-set")]);
        let settings = ConnectionSettings::from_env_file_with(Some(file.path()), lookup).unwrap();
        assert_eq!(settings.host(), "already-set");
        assert_eq!(settings.port(), 6390);
        assert_eq!(settings.password(), Some("file-secret"));
    }

    #[test]
    fn env_file_does_not_touch_process_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "STACKKV_SETTINGS_PROBE_ONLY=1").unwrap();

        ConnectionSettings::from_env_file_with(Some(file.path()), no_vars).unwrap();
        assert!(env::var("STACKKV_SETTINGS_PROBE_ONLY").is_err());
    }

    #[test]
    fn default_path_points_at_workspace_root() {
        let path = default_env_path();
        assert!(path.ends_with(".env"));
        assert!(path.parent().unwrap().join("Cargo.toml").exists());
    }
}

use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Environment variable that overrides `server_page_size` from the config file.
pub const SERVER_PAGE_SIZE_ENV: &str = "EMPDIR_SERVER_PAGE_SIZE";

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(alias = "url")]
    pub api_url: Option<String>,
    pub server_page_size: Option<usize>,
    pub page_size: Option<usize>,
    pub cache_ttl_ms: Option<u64>,
    pub timeout: Option<usize>,
    pub rate: Option<u32>,
    pub proxy: Option<String>,
    pub prefetch: Option<bool>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".empdir").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn parse_config(contents: &str) -> Result<ConfigFile, String> {
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents).map_err(|e| e.to_string())
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

pub fn parse_server_page_size(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("server page size must be positive".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid server page size '{}': {e}", raw.trim())),
    }
}

/// `EMPDIR_SERVER_PAGE_SIZE`, if set and non-empty.
pub fn server_page_size_from_env() -> Result<Option<usize>, String> {
    match env::var(SERVER_PAGE_SIZE_ENV) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => parse_server_page_size(&raw)
            .map(Some)
            .map_err(|e| format!("{SERVER_PAGE_SIZE_ENV}: {e}")),
        Err(_) => Ok(None),
    }
}

pub fn default_config_yaml() -> String {
    r#"# empdir config
#
# Location (default):
#   ~/.empdir/config.yml

# Directory backend
api_url: http://localhost:8080/

# Page size the backend paginates by. Must match the server.
# EMPDIR_SERVER_PAGE_SIZE overrides this value.
server_page_size: 25

# Rows per page shown by `list` and `browse`
page_size: 10

# Cache
cache_ttl_ms: 5000
prefetch: true

# HTTP
timeout: 10
# requests per second, 0 disables the limit
rate: 0
# proxy: http://127.0.0.1:8080

# Output
output_format: text
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    std::fs::write(path, default_config_yaml())
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}

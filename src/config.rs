use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::warn;
use std::fs;
use std::time::Duration;

use crate::binder::BindPolicy;
use crate::exception::Exception;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_mount_prefix")]
    mount_prefix: String,
    #[serde(default = "default_framework_prefixes")]
    framework_prefixes: Vec<String>,
    #[serde(default = "default_view_root")]
    view_root: String,
    #[serde(default = "default_view_suffix")]
    view_suffix: String,
    #[serde(default)]
    bind_policy: BindPolicy,
    #[serde(default = "default_handler_timeout_ms")]
    handler_timeout_ms: u64,
    #[serde(default = "default_max_request_bytes")]
    max_request_bytes: usize,
}

fn default_port() -> u16 {
    7878
}

fn default_local() -> bool {
    true
}

fn default_mount_prefix() -> String {
    "/front".to_string()
}

fn default_framework_prefixes() -> Vec<String> {
    vec!["/front".to_string(), "/admin".to_string(), "/api".to_string()]
}

fn default_view_root() -> String {
    "views".to_string()
}

fn default_view_suffix() -> String {
    ".html".to_string()
}

fn default_handler_timeout_ms() -> u64 {
    30000
}

fn default_max_request_bytes() -> usize {
    65536 // 64KB
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: default_port(),
            local: default_local(),
            worker_threads: num_cpus::get(),
            mount_prefix: default_mount_prefix(),
            framework_prefixes: default_framework_prefixes(),
            view_root: default_view_root(),
            view_suffix: default_view_suffix(),
            bind_policy: BindPolicy::default(),
            handler_timeout_ms: default_handler_timeout_ms(),
            max_request_bytes: default_max_request_bytes(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let str_val = fs::read_to_string(filename)
            .map_err(|e| Exception::Config(format!("无法读取配置文件{}: {}", filename, e)))?;
        Self::from_toml_str(&str_val)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, Exception> {
        let mut raw_config: Config =
            toml::from_str(source).map_err(|e| Exception::Config(e.to_string()))?;
        raw_config.normalize();
        Ok(raw_config)
    }

    fn normalize(&mut self) {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if !self.mount_prefix.is_empty() && !self.mount_prefix.starts_with('/') {
            warn!("mount_prefix 缺少前导 '/'，已自动补全：{}", self.mount_prefix);
            self.mount_prefix = format!("/{}", self.mount_prefix);
        }
        if self.mount_prefix.len() > 1 && self.mount_prefix.ends_with('/') {
            self.mount_prefix.pop();
        }
        if !self.view_suffix.is_empty() && !self.view_suffix.starts_with('.') {
            self.view_suffix = format!(".{}", self.view_suffix);
        }
        if self.max_request_bytes < 1024 {
            warn!(
                "max_request_bytes被设置为{}，过小，该值将被改为1024。",
                self.max_request_bytes
            );
            self.max_request_bytes = 1024;
        }
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    pub fn framework_prefixes(&self) -> &[String] {
        &self.framework_prefixes
    }

    pub fn view_root(&self) -> &str {
        &self.view_root
    }

    pub fn view_suffix(&self) -> &str {
        &self.view_suffix
    }

    pub fn bind_policy(&self) -> BindPolicy {
        self.bind_policy
    }

    /// INVOKE 阶段的超时时间，`None` 表示不限制。
    pub fn handler_timeout(&self) -> Option<Duration> {
        match self.handler_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    /// 判断请求路径是否属于框架托管的前缀（由分发器处理）。
    pub fn is_framework_path(&self, path: &str) -> bool {
        self.framework_prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .map_or(false, |rest| rest.starts_with('/'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.port(), 7878);
        assert_eq!(config.mount_prefix(), "/front");
        assert_eq!(config.view_suffix(), ".html");
        assert_eq!(config.bind_policy(), BindPolicy::Lenient);
        assert!(config.worker_threads() > 0);
        assert_eq!(config.handler_timeout(), Some(Duration::from_millis(30000)));
    }

    #[test]
    fn test_normalization() {
        let config = Config::from_toml_str(
            r#"
            mount_prefix = "app/"
            view_suffix = "tpl"
            bind_policy = "strict"
            handler_timeout_ms = 0
            max_request_bytes = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.mount_prefix(), "/app");
        assert_eq!(config.view_suffix(), ".tpl");
        assert_eq!(config.bind_policy(), BindPolicy::Strict);
        assert_eq!(config.handler_timeout(), None);
        assert_eq!(config.max_request_bytes(), 1024);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let result = Config::from_toml_str("port = \"not a number\"");
        assert!(matches!(result, Err(Exception::Config(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9090\nlocal = false").unwrap();

        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port(), 9090);
        assert!(!config.local());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Config::from_toml("/nonexistent/webfront.toml");
        assert!(matches!(result, Err(Exception::Config(_))));
    }

    #[test]
    fn test_framework_paths() {
        let config = Config::new();
        assert!(config.is_framework_path("/front/dept/1"));
        assert!(config.is_framework_path("/api"));
        assert!(config.is_framework_path("/admin/users"));
        assert!(!config.is_framework_path("/frontpage"));
        assert!(!config.is_framework_path("/static/app.css"));
    }
}

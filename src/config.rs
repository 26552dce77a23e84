use anyhow::Result;
use std::fs;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// TUN device to attach to
    pub interface: Option<String>,
    /// Already-established TUN file descriptor
    pub tun_fd: Option<i32>,
    /// Analysis worker threads
    pub workers: usize,
    /// Analysis queue capacity
    pub queue_depth: usize,
    /// Bytes to read per frame
    pub mtu: usize,
    /// Records kept by the in-memory store
    pub store_capacity: usize,
    /// Statistics logging interval in milliseconds
    pub refresh_interval: u64,
    /// Custom configuration file path
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            tun_fd: None,
            workers: 4,
            queue_depth: 256,
            mtu: 1500,
            store_capacity: 4096,
            refresh_interval: 1000,
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = if let Some(path) = path {
            PathBuf::from(path)
        } else {
            Self::find_config_file()
        };

        let mut config = Config::default();

        if config_path.exists() {
            config.config_path = Some(config_path.clone());

            let content = fs::read_to_string(&config_path)?;

            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some(pos) = line.find(':') {
                    let key = line[..pos].trim();
                    let value = line[pos + 1..].trim();

                    match key {
                        "interface" => {
                            config.interface = Some(value.to_string());
                        }
                        "workers" => {
                            if let Ok(workers) = value.parse::<usize>() {
                                config.workers = workers;
                            }
                        }
                        "queue_depth" => {
                            if let Ok(depth) = value.parse::<usize>() {
                                config.queue_depth = depth;
                            }
                        }
                        "mtu" => {
                            if let Ok(mtu) = value.parse::<usize>() {
                                config.mtu = mtu;
                            }
                        }
                        "store_capacity" => {
                            if let Ok(capacity) = value.parse::<usize>() {
                                config.store_capacity = capacity;
                            }
                        }
                        "refresh_interval" => {
                            if let Ok(interval) = value.parse::<u64>() {
                                config.refresh_interval = interval;
                            }
                        }
                        _ => {
                            // Ignore unknown keys
                        }
                    }
                }
            }
        }

        Ok(config)
    }

    /// Find configuration file
    fn find_config_file() -> PathBuf {
        // Try XDG config directory first
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let xdg_path = PathBuf::from(xdg_config).join("tunsniff/config.yml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }

        // Try ~/.config/tunsniff
        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home).join(".config/tunsniff/config.yml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Fall back to the current directory
        PathBuf::from("config.yml")
    }
}

/// Display settings, loaded from environment variables.
pub struct Config {
    /// Title of the preview window (default: LI-USB30-M021).
    pub window_title: String,
    /// Integer scale applied to the initial window size.
    pub scale: u32,
}

impl Config {
    /// Load configuration from `M021_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            window_title: std::env::var("M021_WINDOW_TITLE")
                .ok()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "LI-USB30-M021".to_string()),
            scale: env_u32("M021_SCALE", 1).clamp(1, 8),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

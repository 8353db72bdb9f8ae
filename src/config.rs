use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_base_url = env::var("API_BASE_URL")?;
        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Self {
            api_base_url,
            http_timeout_secs,
        })
    }
}

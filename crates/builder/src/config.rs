/// Build service connection settings.
///
/// | Env var                | Default                 |
/// |------------------------|-------------------------|
/// | `BUILDER_API_URL`      | `http://localhost:8000` |
/// | `BUILDER_API_TOKEN`    | unset: no auth header   |
/// | `BUILDER_TIMEOUT_SECS` | `30`                    |
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    /// Whole-request limit for every call to the service.
    pub timeout_secs: u64,
}

impl BuilderConfig {
    /// # Panics
    ///
    /// Panics if `BUILDER_TIMEOUT_SECS` is set to a non-integer.
    pub fn from_env() -> Self {
        let api_url = std::env::var("BUILDER_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into())
            .trim_end_matches('/')
            .to_string();
        let api_token = std::env::var("BUILDER_API_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let timeout_secs: u64 = std::env::var("BUILDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("BUILDER_TIMEOUT_SECS must be a valid u64");

        Self {
            api_url,
            api_token,
            timeout_secs,
        }
    }
}

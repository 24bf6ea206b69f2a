/// Connection settings for the hosted model.
///
/// | Env var                  | Default                    |
/// |--------------------------|----------------------------|
/// | `MISTRAL_API_KEY`        | (empty)                    |
/// | `MISTRAL_AGENT_ID`       | unset: use the chat route  |
/// | `MISTRAL_MODEL`          | `mistral-large-latest`     |
/// | `MISTRAL_API_URL`        | `https://api.mistral.ai`   |
/// | `ASSISTANT_TIMEOUT_SECS` | `60`                       |
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    /// When set, requests go to the agents route with this id.
    pub agent_id: Option<String>,
    pub model: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

impl AssistantConfig {
    /// # Panics
    ///
    /// Panics if `ASSISTANT_TIMEOUT_SECS` is set to a non-integer.
    pub fn from_env() -> Self {
        let api_key = std::env::var("MISTRAL_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("MISTRAL_API_KEY is not set; assistant requests will be rejected upstream");
        }

        let agent_id = std::env::var("MISTRAL_AGENT_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());

        let model =
            std::env::var("MISTRAL_MODEL").unwrap_or_else(|_| "mistral-large-latest".into());

        let api_url = std::env::var("MISTRAL_API_URL")
            .unwrap_or_else(|_| "https://api.mistral.ai".into())
            .trim_end_matches('/')
            .to_string();

        let timeout_secs: u64 = std::env::var("ASSISTANT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("ASSISTANT_TIMEOUT_SECS must be a valid u64");

        Self {
            api_key,
            agent_id,
            model,
            api_url,
            timeout_secs,
        }
    }
}

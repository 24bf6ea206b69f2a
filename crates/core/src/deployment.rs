//! Deployment image and build-state types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// The only image tag the service cares about.
pub const LATEST_TAG: &str = "latest";

/// Interval between two image listings while a build is in flight.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// A build with no `latest` image after this long is reported as timed out.
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(180);

pub const DEFAULT_APP_PORT: u16 = 5000;
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_USER: &str = "ubuntu";

/// An image published by the build service for one survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub name: String,
    pub tag: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ImageInfo {
    pub fn is_latest(&self) -> bool {
        self.tag == LATEST_TAG
    }
}

pub fn find_latest(images: &[ImageInfo]) -> Option<&ImageInfo> {
    images.iter().find(|image| image.is_latest())
}

/// Build lifecycle of one survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildState {
    Idle,
    Building { started_at: Timestamp },
    Succeeded { image: ImageInfo },
    TimedOut { message: String },
    Failed { detail: String },
}

impl BuildState {
    pub fn is_building(&self) -> bool {
        matches!(self, Self::Building { .. })
    }

    pub fn timed_out() -> Self {
        Self::TimedOut {
            message: format!(
                "The build did not finish within {} minutes. Please try again later.",
                BUILD_TIMEOUT.as_secs() / 60
            ),
        }
    }
}

/// Target operating system of a generated local deploy script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployOs {
    Linux,
    Mac,
    Windows,
}

impl DeployOs {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Mac => "mac",
            Self::Windows => "windows",
        }
    }

    pub fn script_extension(self) -> &'static str {
        match self {
            Self::Linux | Self::Mac => "sh",
            Self::Windows => "ps1",
        }
    }
}

/// Download name of a generated deploy script: `deploy_{name}_{os}.{ext}`.
pub fn deploy_script_filename(image_name: &str, os: DeployOs) -> String {
    let safe: String = image_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("deploy_{safe}_{}.{}", os.as_str(), os.script_extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn latest_image_is_found_by_tag() {
        let images = vec![
            ImageInfo { name: "user_1_q_2".into(), tag: "v1".into(), updated_at: None },
            ImageInfo { name: "user_1_q_2".into(), tag: "latest".into(), updated_at: Some("2024-01-01".into()) },
        ];
        assert_eq!(find_latest(&images).unwrap().tag, "latest");
        assert!(find_latest(&images[..1]).is_none());
    }

    #[test]
    fn build_state_serializes_with_status_tag() {
        assert_eq!(serde_json::to_value(BuildState::Idle).unwrap(), json!({"status": "idle"}));
        assert_eq!(
            serde_json::to_value(BuildState::Failed { detail: "quota".into() }).unwrap(),
            json!({"status": "failed", "detail": "quota"})
        );
    }

    #[test]
    fn script_names_per_os() {
        assert_eq!(deploy_script_filename("user_1_q_2", DeployOs::Linux), "deploy_user_1_q_2_linux.sh");
        assert_eq!(deploy_script_filename("user_1_q_2", DeployOs::Mac), "deploy_user_1_q_2_mac.sh");
        assert_eq!(deploy_script_filename("a/b:c", DeployOs::Windows), "deploy_a_b_c_windows.ps1");
    }
}

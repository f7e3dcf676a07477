//! Host facts used by tier scoring: memory, device class and network.

use std::fmt;
use std::fs;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::error::GovernorError;

const MOBILE_TOKENS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Effective connection class as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl NetworkType {
    pub fn is_slow(self) -> bool {
        matches!(self, NetworkType::Slow2g | NetworkType::TwoG)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NetworkType::Slow2g => "slow-2g",
            NetworkType::TwoG => "2g",
            NetworkType::ThreeG => "3g",
            NetworkType::FourG => "4g",
        })
    }
}

impl FromStr for NetworkType {
    type Err = GovernorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "slow-2g" => Ok(NetworkType::Slow2g),
            "2g" => Ok(NetworkType::TwoG),
            "3g" => Ok(NetworkType::ThreeG),
            "4g" => Ok(NetworkType::FourG),
            other => Err(GovernorError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Source of host facts. `None` means the host does not report the value.
pub trait HostEnvironment {
    fn device_memory_gb(&self) -> Option<f32>;
    fn user_agent(&self) -> Option<String>;
    fn network_type(&self) -> Option<NetworkType>;
}

/// Case-insensitive match against well known mobile user-agent tokens.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let lowered = user_agent.to_ascii_lowercase();
    MOBILE_TOKENS.iter().any(|token| lowered.contains(token))
}

/// Facts read from the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHost;

impl NativeHost {
    pub fn new() -> Self {
        Self
    }
}

impl HostEnvironment for NativeHost {
    fn device_memory_gb(&self) -> Option<f32> {
        let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
        let memory = parse_meminfo_total(&meminfo);
        debug!(memory_gb = ?memory, "read device memory");
        memory
    }

    fn user_agent(&self) -> Option<String> {
        Some(format!(
            "hyperfield/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        ))
    }

    fn network_type(&self) -> Option<NetworkType> {
        None
    }
}

/// `MemTotal` from `/proc/meminfo`, in GiB.
fn parse_meminfo_total(meminfo: &str) -> Option<f32> {
    let line = meminfo.lines().find(|line| line.starts_with("MemTotal:"))?;
    let kib: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some((kib / (1024.0 * 1024.0)) as f32)
}

/// Wraps another host and replaces the facts that were configured
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct HostOverrides<H> {
    inner: H,
    pub device_memory_gb: Option<f32>,
    pub user_agent: Option<String>,
    pub network: Option<NetworkType>,
}

impl<H: HostEnvironment> HostOverrides<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            device_memory_gb: None,
            user_agent: None,
            network: None,
        }
    }

    /// Takes the overrides from the `[governor]` configuration section.
    pub fn from_config(
        inner: H,
        section: &fieldconfig::GovernorSection,
    ) -> Result<Self, GovernorError> {
        Ok(Self {
            inner,
            device_memory_gb: section.device_memory_gb,
            user_agent: section.user_agent.clone(),
            network: section
                .network
                .as_deref()
                .map(NetworkType::from_str)
                .transpose()?,
        })
    }
}

impl<H: HostEnvironment> HostEnvironment for HostOverrides<H> {
    fn device_memory_gb(&self) -> Option<f32> {
        self.device_memory_gb
            .or_else(|| self.inner.device_memory_gb())
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone().or_else(|| self.inner.user_agent())
    }

    fn network_type(&self) -> Option<NetworkType> {
        self.network.or_else(|| self.inner.network_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_tokens_match_any_case() {
        assert!(is_mobile_user_agent(
            "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36"
        ));
        assert!(is_mobile_user_agent("Mozilla/5.0 (IPHONE; CPU iPhone OS 17_0)"));
        assert!(!is_mobile_user_agent("Mozilla/5.0 (X11; Linux x86_64)"));
    }

    #[test]
    fn meminfo_total_is_converted_to_gib() {
        let meminfo = "MemTotal:       16777216 kB\nMemFree:         1024 kB\n";
        assert_eq!(parse_meminfo_total(meminfo), Some(16.0));
        assert_eq!(parse_meminfo_total("MemFree: 12 kB\n"), None);
    }

    #[test]
    fn overrides_win_over_inner_host() {
        let section = fieldconfig::GovernorSection {
            network: Some("2g".into()),
            device_memory_gb: Some(2.0),
            ..fieldconfig::GovernorSection::default()
        };
        let host = HostOverrides::from_config(NativeHost, &section).expect("overrides");
        assert_eq!(host.device_memory_gb(), Some(2.0));
        assert_eq!(host.network_type(), Some(NetworkType::TwoG));
        assert!(host.user_agent().is_some());
    }

    #[test]
    fn unknown_network_names_are_rejected() {
        assert!("5g".parse::<NetworkType>().is_err());
        assert!(NetworkType::Slow2g.is_slow());
        assert!(!NetworkType::ThreeG.is_slow());
    }
}

//! Own-container detection.

use std::fs;
use std::sync::OnceLock;

use regex::Regex;

use super::types::{DiscoveryError, DiscoveryResult};

fn container_id_regex() -> &'static Regex {
    static ID: OnceLock<Regex> = OnceLock::new();
    ID.get_or_init(|| Regex::new(r"[0-9a-f]{64}").expect("static regex"))
}

/// Find a 64-hex container id in cgroup or mountinfo text.
pub fn find_container_id(text: &str) -> Option<&str> {
    text.lines()
        .filter(|line| line.contains("docker") || line.contains("containers") || line.contains("/kubepods"))
        .find_map(|line| container_id_regex().find(line))
        .map(|m| m.as_str())
}

/// Id of the container this process runs in.
///
/// Checks `/proc/self/cgroup` (cgroup v1), then `/proc/self/mountinfo`
/// (cgroup v2), then falls back to `HOSTNAME`, which the engine sets to the
/// short container id by default.
pub fn current_container_id() -> DiscoveryResult<String> {
    for path in ["/proc/self/cgroup", "/proc/self/mountinfo"] {
        if let Ok(text) = fs::read_to_string(path) {
            if let Some(id) = find_container_id(&text) {
                return Ok(id.to_string());
            }
        }
    }

    match std::env::var("HOSTNAME") {
        Ok(hostname) if !hostname.is_empty() => Ok(hostname),
        _ => Err(DiscoveryError::Identity(
            "no container id in /proc/self and HOSTNAME is unset".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "3f4e1a9c0b2d4e6f8a0c1e3b5d7f9a1c3e5b7d9f1a3c5e7b9d1f3a5c7e9b1d3f";

    #[test]
    fn test_cgroup_v1() {
        let text = format!("12:pids:/docker/{}\n11:cpu:/docker/{}\n", ID, ID);
        assert_eq!(find_container_id(&text), Some(ID));
    }

    #[test]
    fn test_mountinfo_v2() {
        let text = format!(
            "612 590 0:51 / / rw\n634 612 254:1 /var/lib/docker/containers/{}/hostname /etc/hostname rw\n",
            ID
        );
        assert_eq!(find_container_id(&text), Some(ID));
    }

    #[test]
    fn test_no_id() {
        assert_eq!(find_container_id("0::/init.scope\n"), None);
    }
}

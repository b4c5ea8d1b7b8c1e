// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::Duration;

use crate::Status;

/// Call metadata sent with the opening frame
pub type Metadata = HashMap<String, String>;

/// Metadata key carrying the caller's time budget in milliseconds
pub const DEADLINE_KEY: &str = "callwire-timeout-ms";
pub const MAX_TIMEOUT: u64 = 36000; // 10h in seconds

pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Build the dispatch key of a method
pub fn method_path(service_name: &str, method_name: &str) -> String {
    format!("{}/{}", service_name, method_name)
}

/// Split a `Service/Method` path. A leading slash is tolerated.
pub fn split_method_path(path: &str) -> Result<(&str, &str), Status> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.split_once('/') {
        Some((service, method))
            if !service.is_empty() && !method.is_empty() && !method.contains('/') =>
        {
            Ok((service, method))
        }
        _ => Err(Status::invalid_argument(format!(
            "method path must be in format Service/Method, got: {}",
            path
        ))),
    }
}

/// Effective time budget of a call
pub fn calculate_timeout_duration(timeout: Option<Duration>) -> Duration {
    timeout
        .map(clamp_timeout)
        .unwrap_or(Duration::from_secs(MAX_TIMEOUT))
}

/// Bound a caller-supplied budget by [`MAX_TIMEOUT`]
pub fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.min(Duration::from_secs(MAX_TIMEOUT))
}

/// Read the caller's budget from call metadata
pub fn parse_timeout(metadata: &Metadata) -> Option<Duration> {
    metadata
        .get(DEADLINE_KEY)
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_path_round_trip() {
        let path = method_path("GreetService", "Greet");
        assert_eq!(path, "GreetService/Greet");
        assert_eq!(split_method_path(&path).unwrap(), ("GreetService", "Greet"));
        assert_eq!(
            split_method_path("/BlogService/ListBlog").unwrap(),
            ("BlogService", "ListBlog")
        );
    }

    #[test]
    fn test_split_method_path_rejects_malformed() {
        for path in ["", "Greet", "/Greet", "Service/", "a/b/c"] {
            assert!(split_method_path(path).is_err(), "{path} should be rejected");
        }
    }

    #[test]
    fn test_parse_timeout() {
        let mut metadata = Metadata::new();
        assert_eq!(parse_timeout(&metadata), None);

        metadata.insert(DEADLINE_KEY.to_string(), "1500".to_string());
        assert_eq!(parse_timeout(&metadata), Some(Duration::from_millis(1500)));

        metadata.insert(DEADLINE_KEY.to_string(), "soon".to_string());
        assert_eq!(parse_timeout(&metadata), None);
    }

    #[test]
    fn test_calculate_timeout_duration() {
        assert_eq!(
            calculate_timeout_duration(None),
            Duration::from_secs(MAX_TIMEOUT)
        );
        assert_eq!(
            calculate_timeout_duration(Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            calculate_timeout_duration(Some(Duration::MAX)),
            Duration::from_secs(MAX_TIMEOUT)
        );
    }

    #[test]
    fn test_parse_huge_timeout_is_clamped() {
        let mut metadata = Metadata::new();
        metadata.insert(DEADLINE_KEY.to_string(), u64::MAX.to_string());
        assert_eq!(
            calculate_timeout_duration(parse_timeout(&metadata)),
            Duration::from_secs(MAX_TIMEOUT)
        );
    }
}

//! URL validation and SSRF protection for webhook delivery endpoints.
//!
//! Validates outbound destinations against:
//! - Protocol requirements (HTTPS in production)
//! - SSRF protections (private/internal IP ranges, cloud metadata endpoints)

use std::net::IpAddr;

use crate::error::DeliveryError;

/// Validate a webhook delivery URL.
///
/// Checks:
/// 1. URL is parseable and has a host
/// 2. Scheme is HTTPS
/// 3. Host is not a private/internal address (SSRF protection)
///
/// `allow_insecure` relaxes checks 2 and 3 for dev/test destinations
/// (plain HTTP, loopback servers).
pub fn validate_webhook_url(url: &str, allow_insecure: bool) -> Result<(), DeliveryError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| DeliveryError::InvalidUrl(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_insecure => {}
        "http" => {
            return Err(DeliveryError::InvalidUrl(
                "Webhook URLs must use HTTPS".to_string(),
            ));
        }
        scheme => {
            return Err(DeliveryError::InvalidUrl(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| DeliveryError::InvalidUrl("URL must have a host".to_string()))?;

    if !allow_insecure {
        validate_host_not_internal(host)?;
    }

    Ok(())
}

/// Validate that a host is not a private/internal address.
///
/// Blocks loopback, RFC1918 private ranges, link-local (cloud metadata
/// endpoints), CGNAT, IPv6 loopback/unspecified, and internal hostnames
/// (localhost, *.internal, *.local).
pub fn validate_host_not_internal(host: &str) -> Result<(), DeliveryError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_internal_ip(&ip) {
            return Err(DeliveryError::SsrfDetected(format!(
                "Destination host {host} is a private/internal address"
            )));
        }
    }

    let lower = host.to_ascii_lowercase();
    if lower == "localhost"
        || lower == "metadata.google.internal"
        || lower.ends_with(".internal")
        || lower.ends_with(".local")
    {
        return Err(DeliveryError::SsrfDetected(format!(
            "Destination host {host} is a restricted internal hostname"
        )));
    }

    Ok(())
}

/// Check if an IP address belongs to a private/internal range.
fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()                // 127.0.0.0/8
                || v4.is_private()          // 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
                || v4.is_link_local()       // 169.254.0.0/16
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64) // 100.64.0.0/10 (CGNAT)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_https_url() {
        assert!(validate_webhook_url("https://example.com/hooks/lead", false).is_ok());
    }

    #[test]
    fn test_valid_https_url_with_port() {
        assert!(validate_webhook_url("https://hooks.example.com:8443/callback", false).is_ok());
    }

    #[test]
    fn test_http_url_rejected_in_production() {
        let result = validate_webhook_url("http://example.com/hooks", false);
        assert!(matches!(result, Err(DeliveryError::InvalidUrl(_))));
    }

    #[test]
    fn test_http_url_allowed_in_dev() {
        assert!(validate_webhook_url("http://example.com/hooks", true).is_ok());
    }

    #[test]
    fn test_insecure_mode_permits_local_destinations() {
        assert!(validate_webhook_url("http://127.0.0.1:8080/hook", true).is_ok());
        assert!(validate_webhook_url("http://localhost/hook", true).is_ok());
    }

    #[test]
    fn test_invalid_url_format() {
        assert!(validate_webhook_url("not-a-url", false).is_err());
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(validate_webhook_url("ftp://example.com/hooks", false).is_err());
    }

    #[test]
    fn test_ssrf_blocks_loopback() {
        assert!(validate_host_not_internal("127.0.0.1").is_err());
        assert!(validate_host_not_internal("::1").is_err());
    }

    #[test]
    fn test_ssrf_blocks_private_ranges() {
        assert!(validate_host_not_internal("10.0.0.1").is_err());
        assert!(validate_host_not_internal("172.16.0.1").is_err());
        assert!(validate_host_not_internal("192.168.0.1").is_err());
    }

    #[test]
    fn test_ssrf_blocks_metadata_endpoint() {
        assert!(validate_host_not_internal("169.254.169.254").is_err());
        assert!(validate_host_not_internal("metadata.google.internal").is_err());
    }

    #[test]
    fn test_ssrf_blocks_cgnat() {
        assert!(validate_host_not_internal("100.64.0.1").is_err());
        assert!(validate_host_not_internal("100.127.255.255").is_err());
    }

    #[test]
    fn test_ssrf_blocks_internal_hostnames() {
        assert!(validate_host_not_internal("localhost").is_err());
        assert!(validate_host_not_internal("LOCALHOST").is_err());
        assert!(validate_host_not_internal("service.internal").is_err());
        assert!(validate_host_not_internal("myhost.local").is_err());
    }

    #[test]
    fn test_ssrf_allows_public_hosts() {
        assert!(validate_host_not_internal("8.8.8.8").is_ok());
        assert!(validate_host_not_internal("example.com").is_ok());
        assert!(validate_host_not_internal("hooks.myapp.io").is_ok());
    }

    #[test]
    fn test_ssrf_url_integration() {
        assert!(matches!(
            validate_webhook_url("https://10.0.0.1/hook", false),
            Err(DeliveryError::SsrfDetected(_))
        ));
        assert!(matches!(
            validate_webhook_url("https://localhost/hook", false),
            Err(DeliveryError::SsrfDetected(_))
        ));
    }
}

//! Maps an inbound Host header to a candidate subdomain.
//!
//! This is the whole of tenant routing, kept as a pure function so the
//! branching can be tested without a database. Lookup of the resulting
//! subdomain happens in the db layer; a `None` here means "no tenant" and
//! the caller picks the response (empty list, 404 or the login page).

/// Derives the candidate subdomain from a Host header value.
///
/// The port suffix is ignored. Loopback hosts (`test.localhost:3000`,
/// `127.0.0.1`) take their first label when there is one, otherwise the
/// configured fallback tenant is used so a bare `localhost` stays usable in
/// development. Production hosts need at least `sub.example.tld`; a bare
/// `example.tld` resolves to no tenant.
///
/// Labels are matched as-is: no case folding, no IDNA.
pub fn resolve_subdomain(host: &str, fallback: &str) -> Option<String> {
    let domain = host.split(':').next().unwrap_or("");
    if domain.is_empty() {
        return None;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let loopback = domain.contains("localhost") || domain.contains("127.0.0.1");

    let candidate = if loopback {
        if labels.len() > 1 {
            labels[0]
        } else {
            fallback
        }
    } else if labels.len() > 2 {
        labels[0]
    } else {
        ""
    };

    if candidate.is_empty() {
        None
    } else {
        Some(candidate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(host: &str) -> Option<String> {
        resolve_subdomain(host, "demo")
    }

    #[test]
    fn production_host_needs_three_labels() {
        assert_eq!(resolve("sub.example.com"), Some("sub".to_string()));
        assert_eq!(resolve("sub.example.com:8080"), Some("sub".to_string()));
        assert_eq!(resolve("example.com"), None);
        assert_eq!(resolve("example.com:443"), None);
    }

    #[test]
    fn loopback_host_takes_first_label() {
        assert_eq!(resolve("test.localhost:3000"), Some("test".to_string()));
        assert_eq!(resolve("test.localhost"), Some("test".to_string()));
    }

    #[test]
    fn bare_loopback_falls_back_to_default_tenant() {
        assert_eq!(resolve("localhost:3000"), Some("demo".to_string()));
        assert_eq!(resolve("localhost"), Some("demo".to_string()));
    }

    #[test]
    fn dotted_loopback_ip_yields_its_first_octet() {
        // Matches the original behavior: 127.0.0.1 is "loopback with
        // labels", so the first octet becomes the candidate and the lookup
        // simply finds no such tenant.
        assert_eq!(resolve("127.0.0.1:3000"), Some("127".to_string()));
    }

    #[test]
    fn labels_are_not_case_normalized() {
        assert_eq!(resolve("Sub.example.com"), Some("Sub".to_string()));
    }

    #[test]
    fn empty_host_is_no_tenant() {
        assert_eq!(resolve(""), None);
        assert_eq!(resolve(":3000"), None);
    }
}

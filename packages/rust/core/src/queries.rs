//! Search query construction for a company row.
//!
//! Each company gets a small fan-out of name-based queries plus, when the
//! row carries a website, a few `site:` queries against its domain.

use url::Url;

/// Maximum queries issued per company.
const MAX_QUERIES: usize = 6;

/// Extract the bare domain from a website URL, dropping the scheme and a
/// leading `www.`. Returns `None` for blank or unparseable values.
pub fn website_domain(website: &str) -> Option<String> {
    let website = website.trim();
    if website.is_empty() {
        return None;
    }

    let url = Url::parse(website).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Build the deduplicated query list for a company.
pub fn build_queries(name: &str, website: &str) -> Vec<String> {
    let name = name.trim().trim_matches('"').trim_matches('\'');

    let mut queries: Vec<String> = Vec::new();
    if !name.is_empty() {
        queries.extend([
            format!("\"{name}\" managed services"),
            format!("\"{name}\" IT services"),
            format!("\"{name}\" cloud services"),
            format!("\"{name}\" company profile"),
        ]);
    }
    if let Some(domain) = website_domain(website) {
        queries.extend([
            format!("site:{domain} about"),
            format!("site:{domain} services"),
            format!("site:{domain} solutions"),
        ]);
    }

    let mut seen = std::collections::HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
    queries.truncate(MAX_QUERIES);
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_strips_scheme_and_www() {
        assert_eq!(
            website_domain("https://www.acme.example.com/about"),
            Some("acme.example.com".into())
        );
        assert_eq!(
            website_domain("http://Acme.Example.COM"),
            Some("acme.example.com".into())
        );
    }

    #[test]
    fn domain_rejects_blank_and_non_http() {
        assert_eq!(website_domain(""), None);
        assert_eq!(website_domain("   "), None);
        assert_eq!(website_domain("ftp://files.example.com"), None);
        assert_eq!(website_domain("not a url"), None);
    }

    #[test]
    fn queries_for_name_only() {
        let queries = build_queries("Acme IT Services", "");
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[0], "\"Acme IT Services\" managed services");
        assert!(queries.iter().all(|q| !q.starts_with("site:")));
    }

    #[test]
    fn queries_with_website_cap_at_six() {
        let queries = build_queries("Acme", "https://www.acme.example.com");
        assert_eq!(queries.len(), MAX_QUERIES);
        assert!(queries.contains(&"site:acme.example.com about".to_string()));
        // The third site: query falls past the cap.
        assert!(!queries.contains(&"site:acme.example.com solutions".to_string()));
    }

    #[test]
    fn queries_strip_surrounding_quotes_from_name() {
        let queries = build_queries("\"Acme\"", "");
        assert_eq!(queries[0], "\"Acme\" managed services");
    }

    #[test]
    fn empty_name_and_website_yield_nothing() {
        assert!(build_queries("", "").is_empty());
    }
}

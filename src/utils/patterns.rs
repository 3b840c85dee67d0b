//! Synthesizes likely mailbox addresses for a domain.

use regex::Regex;

/// Removes most non-alphanumeric characters, whitespace, and converts to lowercase.
fn sanitize_part(part: &str) -> String {
    part.trim()
        .replace(
            |c: char| !(c.is_alphanumeric() || c == '\'' || c == '-' || c == '.' || c == '_'),
            "",
        )
        .trim_matches(|c| c == '.' || c == '-' || c == '_')
        .to_lowercase()
}

fn is_usable_domain(domain: &str) -> bool {
    !domain.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn push_unique(out: &mut Vec<String>, email_regex: &Regex, local_part: &str, domain: &str) {
    if local_part.is_empty() {
        return;
    }
    let address = format!("{}@{}", local_part, domain);
    if !email_regex.is_match(&address) {
        tracing::trace!("Generated pattern failed regex validation: {}", address);
        return;
    }
    if !out.contains(&address) {
        out.push(address);
    }
}

/// Combines the default mailbox prefixes, then any caller-supplied custom prefixes,
/// with the domain. Order is preserved and duplicates are dropped.
pub(crate) fn generate_prefix_patterns(
    email_regex: &Regex,
    default_prefixes: &[String],
    custom_prefixes: &[String],
    domain: &str,
) -> Vec<String> {
    if !is_usable_domain(domain) {
        tracing::warn!("Cannot generate patterns: Invalid domain provided '{}'", domain);
        return Vec::new();
    }

    let mut patterns = Vec::with_capacity(default_prefixes.len() + custom_prefixes.len());
    for prefix in default_prefixes.iter().chain(custom_prefixes) {
        push_unique(&mut patterns, email_regex, &sanitize_part(prefix), domain);
    }

    tracing::debug!("Generated {} prefix patterns for '{}'", patterns.len(), domain);
    patterns
}

/// Common personal mailbox layouts for a named person, most likely first.
pub(crate) fn generate_name_patterns(
    email_regex: &Regex,
    first_name: &str,
    last_name: &str,
    domain: &str,
) -> Vec<String> {
    let first = sanitize_part(first_name).replace('.', "");
    let last = sanitize_part(last_name).replace('.', "");

    if first.is_empty() || last.is_empty() || !is_usable_domain(domain) {
        tracing::debug!(
            "Cannot generate name patterns for '{} {}' @ '{}'",
            first_name,
            last_name,
            domain
        );
        return Vec::new();
    }

    let f = first.chars().next().map(String::from).unwrap_or_default();
    let l = last.chars().next().map(String::from).unwrap_or_default();

    let layouts = [
        format!("{first}.{last}"),
        first.clone(),
        format!("{f}{last}"),
        format!("{first}{last}"),
        format!("{f}.{last}"),
        format!("{first}_{last}"),
        format!("{first}{l}"),
        last.clone(),
    ];

    let mut patterns = Vec::with_capacity(layouts.len());
    for local_part in &layouts {
        push_unique(&mut patterns, email_regex, local_part, domain);
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;

    fn regex() -> Regex {
        Config::default().email_regex
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefixes_follow_configured_then_custom_order() {
        let patterns = generate_prefix_patterns(
            &regex(),
            &strings(&["info", "contact", "hello", "sales", "admin"]),
            &strings(&["Bookings", "info", "  office "]),
            "acme.co",
        );
        assert_eq!(
            patterns,
            vec![
                "info@acme.co",
                "contact@acme.co",
                "hello@acme.co",
                "sales@acme.co",
                "admin@acme.co",
                "bookings@acme.co",
                "office@acme.co",
            ]
        );
    }

    #[test]
    fn prefix_sanitization_drops_unusable_entries() {
        let patterns =
            generate_prefix_patterns(&regex(), &strings(&["in fo", "%$", "", ".sales."]), &[], "acme.co");
        assert_eq!(patterns, vec!["info@acme.co", "sales@acme.co"]);
    }

    #[test]
    fn invalid_domain_yields_nothing() {
        for domain in ["", "acme", ".co", "acme."] {
            assert!(generate_prefix_patterns(&regex(), &strings(&["info"]), &[], domain).is_empty());
            assert!(generate_name_patterns(&regex(), "Jane", "Smith", domain).is_empty());
        }
    }

    #[test]
    fn name_patterns_put_first_dot_last_first() {
        let patterns = generate_name_patterns(&regex(), "Jane", "Smith", "acme.co");
        assert_eq!(patterns[0], "jane.smith@acme.co");
        assert!(patterns.contains(&"jsmith@acme.co".to_string()));
        assert!(patterns.contains(&"jane@acme.co".to_string()));
        assert!(patterns.contains(&"janes@acme.co".to_string()));
    }

    #[test]
    fn name_patterns_handle_hyphens_and_apostrophes() {
        let patterns = generate_name_patterns(&regex(), "Jean-Luc", "O'Malley", "starfleet.org");
        assert_eq!(patterns[0], "jean-luc.o'malley@starfleet.org");
        assert!(patterns.contains(&"jo'malley@starfleet.org".to_string()));
    }

    #[test]
    fn name_patterns_are_unique_when_names_repeat() {
        let patterns = generate_name_patterns(&regex(), "Test", "Test", "test.com");
        let unique: std::collections::HashSet<_> = patterns.iter().collect();
        assert_eq!(patterns.len(), unique.len());
        assert_eq!(patterns.iter().filter(|p| *p == "test@test.com").count(), 1);
    }
}

use crate::table::Cell;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    // Syntactic dotted quad only, octets are not range checked
    static ref IPV4_PATTERN: Regex = Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap();
}

/// Keep only dotted-quad tokens from a comma joined list, deduplicated and sorted as strings.
/// Hostnames, IPv6 literals and other leftovers are dropped.
pub fn sanitize_ip_list(value: &str) -> String {
    let ips: BTreeSet<&str> = IPV4_PATTERN
        .find_iter(value)
        .map(|m| m.as_str())
        .collect();
    ips.into_iter().collect::<Vec<_>>().join(",")
}

/// Non-text cells sanitize to an empty string
pub fn sanitize_cell(cell: &Cell) -> String {
    cell.as_str().map(sanitize_ip_list).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_junk_and_duplicates() {
        assert_eq!(
            sanitize_ip_list("203.0.113.5,not-an-ip,2001:db8::1,203.0.113.5"),
            "203.0.113.5"
        );
    }

    #[test]
    fn test_lexical_sort() {
        assert_eq!(
            sanitize_ip_list("2.0.0.1,10.0.0.1,192.0.2.1"),
            "10.0.0.1,192.0.2.1,2.0.0.1"
        );
    }

    #[test]
    fn test_no_range_validation() {
        assert_eq!(sanitize_ip_list("999.999.999.999"), "999.999.999.999");
    }

    #[test]
    fn test_embedded_and_malformed_tokens() {
        assert_eq!(sanitize_ip_list("host-10.0.0.1.example.com"), "10.0.0.1");
        assert_eq!(sanitize_ip_list("1234.1.1.1,1.2.3"), "");
        assert_eq!(sanitize_ip_list("::ffff:192.0.2.1"), "192.0.2.1");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(sanitize_ip_list(""), "");
        assert_eq!(sanitize_cell(&Cell::Empty), "");
        assert_eq!(sanitize_cell(&Cell::Number(4.0)), "");
        assert_eq!(sanitize_cell(&Cell::text("10.0.0.1")), "10.0.0.1");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "203.0.113.5,not-an-ip,2001:db8::1,203.0.113.5",
            "b.example.com,10.0.0.2,10.0.0.1",
            "",
            "1.1.1.1,1.1.1.1,999.1.1.1",
        ];
        for input in inputs {
            let once = sanitize_ip_list(input);
            assert_eq!(sanitize_ip_list(&once), once);
        }
    }

    #[test]
    fn test_output_tokens_match_pattern() {
        let output = sanitize_ip_list("a,10.0.0.1,fe80::1,b.c.d.e,300.2.1.0");
        for token in output.split(',') {
            assert!(IPV4_PATTERN.is_match(token));
            assert_eq!(IPV4_PATTERN.find(token).unwrap().as_str(), token);
        }
    }
}

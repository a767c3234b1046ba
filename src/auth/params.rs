//! Decoder for the opaque `OtherParams` blob embedded in site metadata.

use std::collections::HashMap;

use url::form_urlencoded;

/// Reserved parameter signaling an admin-impersonation handoff.
pub const ADMIN_USER_ID: &str = "adminUserId";

/// Decode a serialized parameter blob into a name → value mapping.
///
/// Pairs are `&`-separated, `=`-delimited, and percent-decoded. Malformed
/// pairs (missing key or value) are skipped, never fatal: the upstream
/// contract is loose and a partial mapping beats an aborted login.
pub fn parse_site_params(raw: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut skipped = 0usize;

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        if key.is_empty() || value.is_empty() {
            skipped += 1;
            continue;
        }
        params.insert(key.into_owned(), value.into_owned());
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Skipped malformed site parameter pairs");
    }

    params
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_well_formed_blob() {
        let params = parse_site_params("adminUserId=7&theme=dark");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get(ADMIN_USER_ID).map(String::as_str), Some("7"));
        assert_eq!(params.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_malformed_pairs_are_skipped() {
        let params = parse_site_params("a&b=c&=d");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("b").map(String::as_str), Some("c"));
    }

    #[test]
    fn test_percent_decoding() {
        let params = parse_site_params("greeting=hello%20world&symbol=%26");
        assert_eq!(params.get("greeting").map(String::as_str), Some("hello world"));
        assert_eq!(params.get("symbol").map(String::as_str), Some("&"));
    }

    #[rstest]
    #[case("")]
    #[case("&&&")]
    #[case("=")]
    #[case("=&=")]
    #[case("novalue=")]
    fn test_degenerate_input_yields_empty_mapping(#[case] raw: &str) {
        assert!(parse_site_params(raw).is_empty());
    }

    #[test]
    fn test_later_duplicate_wins() {
        let params = parse_site_params("k=first&k=second");
        assert_eq!(params.get("k").map(String::as_str), Some("second"));
    }
}

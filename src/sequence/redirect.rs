//! Redirect URL construction

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Search engine URL template parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Bare host, e.g. `cn.bing.com`.
    pub host: String,
    /// Theme query parameter name.
    pub theme_param: String,
    /// Theme query parameter value.
    pub theme_value: String,
}

impl Default for RedirectTarget {
    fn default() -> Self {
        Self {
            host: "cn.bing.com".to_string(),
            theme_param: "settheme".to_string(),
            theme_value: "dark".to_string(),
        }
    }
}

/// Percent-encodes a URL component with the same unreserved set as
/// ECMAScript `encodeURIComponent`. Spaces become `%20`, never `+`.
#[must_use]
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Builds `https://{host}/search?q={query}&{theme_param}={theme_value}`.
///
/// The query is used verbatim (no trimming) and percent-encoded.
#[must_use]
pub fn build_redirect_url(target: &RedirectTarget, query: &str) -> String {
    format!(
        "https://{}/search?q={}&{}={}",
        target.host,
        encode_component(query),
        encode_component(&target.theme_param),
        encode_component(&target.theme_value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::percent_decode_str;
    use proptest::prelude::*;

    fn query_of(url: &str) -> &str {
        let start = url.find("?q=").map(|i| i + 3).unwrap_or_default();
        let end = url[start..].find('&').map_or(url.len(), |i| start + i);
        &url[start..end]
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_component("a b"), "a%20b");
        assert_eq!(encode_component("-_.!~*'()"), "-_.!~*'()");
        assert_eq!(encode_component("a&b=c?d/e#f+g"), "a%26b%3Dc%3Fd%2Fe%23f%2Bg");
        assert_eq!(encode_component("熊"), "%E7%86%8A");
    }

    #[test]
    fn default_target_url() {
        let url = build_redirect_url(&RedirectTarget::default(), "熊雨贤");
        assert_eq!(
            url,
            "https://cn.bing.com/search?q=%E7%86%8A%E9%9B%A8%E8%B4%A4&settheme=dark"
        );
        let decoded = percent_decode_str(query_of(&url)).decode_utf8().unwrap();
        assert_eq!(decoded, "熊雨贤");
        assert!(url.ends_with("&settheme=dark"));
    }

    #[test]
    fn query_is_not_trimmed() {
        let url = build_redirect_url(&RedirectTarget::default(), " truth ");
        assert_eq!(query_of(&url), "%20truth%20");
    }

    #[test]
    fn custom_target() {
        let target = RedirectTarget {
            host: "duckduckgo.com".into(),
            theme_param: "kae".into(),
            theme_value: "d".into(),
        };
        assert_eq!(
            build_redirect_url(&target, "x"),
            "https://duckduckgo.com/search?q=x&kae=d"
        );
    }

    proptest! {
        #[test]
        fn query_decodes_back(query in "\\PC{0,40}") {
            let url = build_redirect_url(&RedirectTarget::default(), &query);
            let encoded = query_of(&url);
            prop_assert!(!encoded.contains(['&', '#', ' ', '+']));
            let decoded = percent_decode_str(encoded).decode_utf8().unwrap();
            prop_assert_eq!(decoded, query);
        }
    }
}

//! Shared utility functions

/// Get the value of a field in a URL query string.
///
/// Accepts either a full URL or just the query-string part. Looking for
/// `"id"` in `"viewtopic.php?id=37&p=2"` returns `Some("37")`. Malformed
/// parameters are skipped rather than treated as errors.
pub fn query_value<'a>(url: &'a str, field: &str) -> Option<&'a str> {
    let query = match url.find('?') {
        Some(pos) => &url[pos + 1..],
        None => url,
    };
    // Fragments can trail the query string in post permalinks
    let query = match query.find('#') {
        Some(pos) => &query[..pos],
        None => query,
    };

    for parameter in query.split('&') {
        let mut parts = parameter.splitn(2, '=');
        if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
            if name == field {
                return Some(value);
            }
        }
    }
    None
}

/// Get a numeric query-string field.
pub fn query_id(url: &str, field: &str) -> Option<u32> {
    query_value(url, field).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_field_in_full_url() {
        assert_eq!(query_value("viewtopic.php?id=37&p=1", "id"), Some("37"));
        assert_eq!(query_value("viewtopic.php?id=37&p=1", "p"), Some("1"));
    }

    #[test]
    fn finds_field_in_bare_query() {
        assert_eq!(query_value("id=37&p=1", "id"), Some("37"));
    }

    #[test]
    fn ignores_fragment() {
        assert_eq!(query_id("viewtopic.php?pid=99#p99", "pid"), Some(99));
    }

    #[test]
    fn missing_or_malformed_fields() {
        assert_eq!(query_value("viewtopic.php?id=37", "pid"), None);
        assert_eq!(query_value("viewtopic.php?broken", "broken"), None);
        assert_eq!(query_id("viewtopic.php?id=abc", "id"), None);
    }
}

use reqwest::header::HeaderMap;

/// Parse the `Link` header's `rel="next"` URL as proposed in RFC 5988.
/// Shared between the registry and packages API clients, both of which
/// paginate catalog-style listings this way.
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    for entry in link.split(',') {
        let mut parts = entry.split(';');
        let url_part = parts.next()?.trim();
        let is_next = parts.any(|p| p.trim() == "rel=\"next\"");
        if !is_next {
            continue;
        }
        if let Some(path) = url_part.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            return Some(path.to_string());
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use reqwest::header::{HeaderValue, LINK};

    #[test]
    fn test_next_page_url() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=2>; rel=\"next\""),
        );
        assert_eq!(
            next_page_url(&headers),
            Some(String::from("https://api.github.com/x?page=2"))
        );
    }

    #[test]
    fn test_next_page_url_missing() {
        let headers = HeaderMap::new();
        assert_eq!(next_page_url(&headers), None);
    }
}

/// Feed-side utility functions shared by the parser and the orchestrator

/// HTML cleanup for entry bodies
pub mod html {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static NOISE_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
        ["script", "style", "nav", "header", "footer", "aside"]
            .iter()
            .filter_map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).ok())
            .collect()
    });

    static AD_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
        ["div", "section", "span"]
            .iter()
            .filter_map(|tag| {
                Regex::new(&format!(
                    r#"(?is)<{tag}\b[^>]*class\s*=\s*["'][^"']*\b(ad|ads|advert|advertisement|sponsor)\b[^"']*["'][^>]*>.*?</{tag}\s*>"#
                ))
                .ok()
            })
            .collect()
    });

    static TAGS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").ok());
    static SPACES: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s+").ok());

    /// Strip markup and boilerplate from an entry body, leaving plain text.
    pub fn clean_content(input: &str) -> String {
        let mut text = input.to_string();

        for re in NOISE_BLOCKS.iter().chain(AD_BLOCKS.iter()) {
            text = re.replace_all(&text, " ").into_owned();
        }
        if let Some(re) = TAGS.as_ref() {
            text = re.replace_all(&text, " ").into_owned();
        }

        let text = decode_entities(&text);

        match SPACES.as_ref() {
            Some(re) => re.replace_all(&text, " ").trim().to_string(),
            None => text.trim().to_string(),
        }
    }

    fn decode_entities(text: &str) -> String {
        text.replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    }
}

/// URL utilities for feed endpoints
pub mod url {
    use url::Url;

    pub fn extract_host(url_str: &str) -> Option<String> {
        Url::parse(url_str)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.to_string()))
    }

    pub fn is_valid_feed_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => url.scheme() == "http" || url.scheme() == "https",
            Err(_) => false,
        }
    }
}

/// Time utilities for run windows
pub mod time {
    use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

    /// Strictly newer than `now - window`.
    pub fn is_within_window(published_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
        published_at > now - window
    }

    /// The local calendar day a digest written at `now` belongs to.
    pub fn local_day(now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&Local).date_naive()
    }
}

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use url::Url;

/// Parse ISO8601 date string to Unix timestamp
pub fn parse_iso8601_to_timestamp(date_str: &str) -> i64 {
    if date_str.is_empty() {
        return 0;
    }

    if let Ok(dt) = date_str.parse::<DateTime<Utc>>() {
        return dt.timestamp();
    }

    0
}

/// Calendar key of a snapshot: (yyyymmdd, year, month, day)
pub fn date_key(now: DateTime<Utc>) -> (i32, i32, u32, u32) {
    let date = now.year() * 10_000 + now.month() as i32 * 100 + now.day() as i32;
    (date, now.year(), now.month(), now.day())
}

/// Splits branding keywords on whitespace, keeping quoted phrases together.
pub fn parse_keywords(keyword_str: &str) -> Vec<String> {
    let regex = match Regex::new(r#"(?m)"[^"]+"|[^\s"]+"#) {
        Ok(regex) => regex,
        Err(_) => return Vec::new(),
    };

    regex
        .find_iter(keyword_str)
        .map(|m| m.as_str().trim_matches('"').to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

/// Comma separated list from an environment value, blanks dropped
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn extract_youtube_video_id(url: &str) -> Option<String> {
    let parsed_url = Url::parse(url).ok()?;
    let host = parsed_url.host_str()?;

    match host {
        "www.youtube.com" | "youtube.com" | "m.youtube.com" => {
            if parsed_url.path() == "/watch" {
                parsed_url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string())
            } else {
                None
            }
        }
        "youtu.be" => parsed_url
            .path_segments()?
            .next()
            .filter(|segment| !segment.is_empty())
            .map(String::from),
        _ => None,
    }
}

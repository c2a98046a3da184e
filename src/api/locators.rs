//! URL construction for the Subsonic REST routes.
//!
//! The stream and cover art locators are handed to the playback engine as-is,
//! so their shape must not drift: `id` first, then `u`, `t`, `s`, `v`, `c`.

use crate::api::models::ServerConfig;

pub const CLIENT_NAME: &str = "OfflineCatalog";
pub const API_VERSION: &str = "1.16.1";

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn binary_route(server: &ServerConfig, route: &str, id: &str) -> String {
    format!(
        "{}/rest/{}?id={}&u={}&t={}&s={}&v={}&c={}",
        server.base_url(),
        route,
        encode(id),
        encode(&server.username),
        encode(&server.token),
        encode(&server.salt),
        API_VERSION,
        CLIENT_NAME
    )
}

pub fn stream_url(server: &ServerConfig, song_id: &str) -> String {
    binary_route(server, "stream", song_id)
}

/// Returns `None` when the item has no artwork; callers show a placeholder.
pub fn cover_art_url(server: &ServerConfig, cover_art_id: Option<&str>) -> Option<String> {
    let id = cover_art_id.map(str::trim).filter(|id| !id.is_empty())?;
    Some(binary_route(server, "getCoverArt", id))
}

/// JSON API endpoint with auth parameters followed by `extra_params`.
pub(crate) fn api_url(
    server: &ServerConfig,
    endpoint: &str,
    extra_params: &[(&str, &str)],
) -> String {
    let mut url = format!(
        "{}/rest/{}?u={}&t={}&s={}&v={}&c={}&f=json",
        server.base_url(),
        endpoint,
        encode(&server.username),
        encode(&server.token),
        encode(&server.salt),
        API_VERSION,
        CLIENT_NAME
    );

    for (key, value) in extra_params {
        url.push_str(&format!("&{}={}", key, encode(value)));
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn server(url: &str) -> ServerConfig {
        ServerConfig {
            id: "srv".to_string(),
            name: "Home".to_string(),
            url: url.to_string(),
            username: "alice".to_string(),
            token: "26719a1196d2a940705a59634eb18eab".to_string(),
            salt: "c19b2d".to_string(),
            active: true,
        }
    }

    #[test_log::test]
    fn stream_url_matches_reference_format() {
        assert_eq!(
            stream_url(&server("https://music.example.com/"), "42"),
            "https://music.example.com/rest/stream?id=42&u=alice&t=26719a1196d2a940705a59634eb18eab&s=c19b2d&v=1.16.1&c=OfflineCatalog"
        );
    }

    #[test_log::test]
    fn cover_art_url_matches_reference_format() {
        assert_eq!(
            cover_art_url(&server("http://10.0.0.2:4533"), Some("al-9")).as_deref(),
            Some("http://10.0.0.2:4533/rest/getCoverArt?id=al-9&u=alice&t=26719a1196d2a940705a59634eb18eab&s=c19b2d&v=1.16.1&c=OfflineCatalog")
        );
    }

    #[test_log::test]
    fn cover_art_url_is_omitted_without_id() {
        let server = server("http://host");
        assert_eq!(cover_art_url(&server, None), None);
        assert_eq!(cover_art_url(&server, Some("   ")), None);
    }

    #[test_log::test]
    fn api_url_encodes_extra_params() {
        let url = api_url(&server("http://host"), "search3", &[("query", "AC/DC & co")]);
        assert!(url.starts_with("http://host/rest/search3?u=alice&"));
        assert!(url.contains("&f=json"));
        assert!(url.ends_with("&query=AC%2FDC%20%26%20co"));
    }
}

/// Package fragments of well-known streaming apps, checked in order
const KNOWN_APPS: &[(&str, &str)] = &[
    ("netflix", "Netflix"),
    ("youtube", "YouTube"),
    ("disney", "Disney+"),
    ("amazon", "Prime Video"),
    ("apple.atve", "Apple TV"),
    ("hbo", "HBO Max"),
    ("spotify", "Spotify"),
    ("plex", "Plex"),
    ("twitch", "Twitch"),
    ("crunchyroll", "Crunchyroll"),
    ("dazn", "DAZN"),
    ("atbat", "MLB"),
    ("nba", "NBA"),
];

/// Human-readable name of a physical input uri, e.g.
/// `extInput:hdmi?port=2` -> `HDMI 2`
pub fn friendly_input_name(uri: &str) -> Option<String> {
    if uri.is_empty() {
        return None;
    }

    if uri.contains("hdmi") {
        let port = uri
            .split_once("port=")
            .map(|(_, rest)| rest.split('&').next().unwrap_or_default());
        return Some(match port {
            Some(port) if !port.is_empty() => format!("HDMI {}", port),
            _ => "HDMI".to_string(),
        });
    }

    if uri.starts_with("tv:") {
        return Some("TV".to_string());
    }
    if uri.contains("composite") {
        return Some("AV".to_string());
    }
    if uri.contains("component") {
        return Some("Component".to_string());
    }

    None
}

/// Display name for an app package or app uri
pub fn resolve_app_name(app_uri: &str) -> String {
    if app_uri.is_empty() {
        return "App".to_string();
    }

    let lower = app_uri.to_lowercase();
    if let Some((_, name)) = KNOWN_APPS.iter().find(|(key, _)| lower.contains(key)) {
        return name.to_string();
    }

    match app_uri.rsplit('.').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => "App".to_string(),
    }
}

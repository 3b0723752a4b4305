//! Stable small-integer codes for "what is on screen", used wherever a
//! machine-readable value is needed (the `tv_now_playing` gauge).

/// Known titles and their codes. Substring matching walks this in order, so
/// earlier entries win.
pub const CONTENT_IDS: &[(&str, i64)] = &[
    ("Unknown", 0),
    ("Home Screen", 1),
    ("Web Browser", 2),
    ("PS5", 10),
    ("Switch", 11),
    ("HDMI 3", 12),
    ("HDMI 4", 13),
    ("TV", 20),
    ("AV", 21),
    ("Component", 22),
    ("Netflix", 100),
    ("YouTube", 101),
    ("Disney+", 102),
    ("Prime Video", 103),
    ("Apple TV", 104),
    ("HBO Max", 105),
    ("Spotify", 106),
    ("Plex", 107),
    ("Twitch", 108),
    ("Crunchyroll", 109),
    ("DAZN", 110),
    ("MLB", 111),
    ("NBA", 112),
];

/// Exact match, then first key contained in `title`, then 0
pub fn resolve_id(title: &str) -> i64 {
    if let Some((_, id)) = CONTENT_IDS.iter().find(|(key, _)| *key == title) {
        return *id;
    }

    CONTENT_IDS
        .iter()
        .find(|(key, _)| title.contains(key))
        .map(|(_, id)| *id)
        .unwrap_or(0)
}

//! Static header presets, analogous to the teacher's per-engine
//! `EngineConfig` defaults (`engine.rs`), but keyed by name instead of
//! attached to a concrete engine.

use crate::types::HeaderPreset;

pub const CHROME: HeaderPreset = HeaderPreset {
    name: "chrome",
    headers: &[
        ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Sec-Fetch-Mode", "navigate"),
    ],
};

pub const FIREFOX: HeaderPreset = HeaderPreset {
    name: "firefox",
    headers: &[
        ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.5"),
    ],
};

pub const MOBILE_SAFARI: HeaderPreset = HeaderPreset {
    name: "mobile_safari",
    headers: &[
        ("User-Agent", "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1"),
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
    ],
};

const PRESETS: &[HeaderPreset] = &[CHROME, FIREFOX, MOBILE_SAFARI];

/// Looks up a preset by name. Returns `None` for an unknown name so
/// callers can fall back to the default (no extra headers).
pub fn lookup(name: &str) -> Option<&'static HeaderPreset> {
    PRESETS.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_preset() {
        assert!(lookup("chrome").is_some());
    }

    #[test]
    fn test_lookup_unknown_preset() {
        assert!(lookup("netscape").is_none());
    }

    #[test]
    fn test_each_preset_has_user_agent() {
        for preset in PRESETS {
            assert!(preset.headers.iter().any(|(k, _)| *k == "User-Agent"));
        }
    }
}

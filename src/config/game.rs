//! Supported games and their add-on feeds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::addons::AddonKind;

/// Game whose add-ons are managed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    /// The Lord of the Rings Online.
    #[default]
    Lotro,
    /// Dungeons & Dragons Online. Skins only.
    Ddo,
}

impl GameType {
    /// Parses a game from user input.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lotro" => Some(Self::Lotro),
            "ddo" => Some(Self::Ddo),
            _ => None,
        }
    }

    /// Short lowercase name used in file names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lotro => "lotro",
            Self::Ddo => "ddo",
        }
    }

    /// Checks if the game loads add-ons of `kind`.
    #[must_use]
    pub fn supports(&self, kind: AddonKind) -> bool {
        match self {
            Self::Lotro => true,
            Self::Ddo => kind == AddonKind::Skin,
        }
    }

    /// Add-on kinds the game loads.
    #[must_use]
    pub fn kinds(&self) -> Vec<AddonKind> {
        AddonKind::ALL
            .into_iter()
            .filter(|kind| self.supports(*kind))
            .collect()
    }

    /// Name of the game's folder inside the user's documents folder.
    #[must_use]
    pub fn documents_folder_name(&self) -> &'static str {
        match self {
            Self::Lotro => "The Lord of the Rings Online",
            Self::Ddo => "Dungeons and Dragons Online",
        }
    }

    /// Public LotroInterface favourites feed for `kind`.
    #[must_use]
    pub fn default_feed_url(&self, kind: AddonKind) -> Option<&'static str> {
        match (self, kind) {
            (Self::Lotro, AddonKind::Plugin) => {
                Some("https://api.lotrointerface.com/fav/OneLauncher-Plugins.xml")
            }
            (Self::Lotro, AddonKind::Skin) => {
                Some("https://api.lotrointerface.com/fav/OneLauncher-Themes.xml")
            }
            (Self::Lotro, AddonKind::Music) => {
                Some("https://api.lotrointerface.com/fav/OneLauncher-Music.xml")
            }
            (Self::Ddo, AddonKind::Skin) => {
                Some("https://api.lotrointerface.com/fav/OneLauncher-Themes-DDO.xml")
            }
            (Self::Ddo, _) => None,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lotro => f.write_str("LOTRO"),
            Self::Ddo => f.write_str("DDO"),
        }
    }
}

/// Feed URL overrides. Unset kinds use the game's public feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedUrls {
    /// Plugins feed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<String>,
    /// Skins feed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skins: Option<String>,
    /// Music feed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
}

impl FeedUrls {
    /// Resolves the feed for `kind`, or `None` if the game has no such feed.
    #[must_use]
    pub fn url(&self, game: GameType, kind: AddonKind) -> Option<String> {
        if !game.supports(kind) {
            return None;
        }
        let configured = match kind {
            AddonKind::Plugin => self.plugins.as_ref(),
            AddonKind::Skin => self.skins.as_ref(),
            AddonKind::Music => self.music.as_ref(),
        };
        configured
            .cloned()
            .or_else(|| game.default_feed_url(kind).map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddo_supports_skins_only() {
        assert!(GameType::Ddo.supports(AddonKind::Skin));
        assert!(!GameType::Ddo.supports(AddonKind::Plugin));
        assert!(!GameType::Ddo.supports(AddonKind::Music));
        assert_eq!(GameType::Ddo.kinds(), vec![AddonKind::Skin]);
        assert_eq!(GameType::Lotro.kinds().len(), 3);
    }

    #[test]
    fn test_feed_url_resolution() {
        let feeds = FeedUrls {
            music: Some("https://example.com/music.xml".to_string()),
            ..FeedUrls::default()
        };
        assert_eq!(
            feeds.url(GameType::Lotro, AddonKind::Music).as_deref(),
            Some("https://example.com/music.xml")
        );
        assert!(
            feeds
                .url(GameType::Lotro, AddonKind::Plugin)
                .is_some_and(|u| u.ends_with("OneLauncher-Plugins.xml"))
        );
        assert!(
            feeds
                .url(GameType::Ddo, AddonKind::Skin)
                .is_some_and(|u| u.ends_with("Themes-DDO.xml"))
        );
        assert_eq!(feeds.url(GameType::Ddo, AddonKind::Music), None);
    }

    #[test]
    fn test_game_parse() {
        assert_eq!(GameType::parse("LOTRO"), Some(GameType::Lotro));
        assert_eq!(GameType::parse("ddo"), Some(GameType::Ddo));
        assert_eq!(GameType::parse("eso"), None);
    }
}

use serde::{Deserialize, Serialize};

/// Proficiency level a study session counts toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum Level {
    #[serde(rename = "B1_PLUS", alias = "LEVEL_A")]
    #[strum(to_string = "B1+")]
    B1Plus,
    #[serde(rename = "B2", alias = "LEVEL_B")]
    #[strum(to_string = "B2")]
    B2,
}

impl Level {
    pub const ALL: [Level; 2] = [Level::B1Plus, Level::B2];

    /// Key used to pick this level in the tracker
    pub fn hotkey(&self) -> char {
        match self {
            Level::B1Plus => '1',
            Level::B2 => '2',
        }
    }

    pub fn from_hotkey(c: char) -> Option<Level> {
        Level::ALL.into_iter().find(|level| level.hotkey() == c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_backend() {
        assert_eq!(
            serde_json::to_string(&Level::B1Plus).unwrap(),
            "\"B1_PLUS\""
        );
        assert_eq!(serde_json::to_string(&Level::B2).unwrap(), "\"B2\"");
    }

    #[test]
    fn accepts_generic_level_aliases() {
        let a: Level = serde_json::from_str("\"LEVEL_A\"").unwrap();
        let b: Level = serde_json::from_str("\"LEVEL_B\"").unwrap();
        assert_eq!(a, Level::B1Plus);
        assert_eq!(b, Level::B2);
    }

    #[test]
    fn display_labels() {
        assert_eq!(Level::B1Plus.to_string(), "B1+");
        assert_eq!(Level::B2.to_string(), "B2");
    }

    #[test]
    fn hotkeys_roundtrip() {
        for level in Level::ALL {
            assert_eq!(Level::from_hotkey(level.hotkey()), Some(level));
        }
        assert_eq!(Level::from_hotkey('3'), None);
    }
}

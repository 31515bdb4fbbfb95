//! MBTI personality tag.
//!
//! Parsed case-insensitively from client input; an unknown tag is an invalid
//! request and must be rejected before any state is touched.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::MatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mbti {
    Infp,
    Infj,
    Intp,
    Intj,
    Isfp,
    Isfj,
    Istp,
    Istj,
    Enfp,
    Enfj,
    Entp,
    Entj,
    Esfp,
    Esfj,
    Estp,
    Estj,
}

impl Mbti {
    pub const ALL: [Mbti; 16] = [
        Mbti::Infp,
        Mbti::Infj,
        Mbti::Intp,
        Mbti::Intj,
        Mbti::Isfp,
        Mbti::Isfj,
        Mbti::Istp,
        Mbti::Istj,
        Mbti::Enfp,
        Mbti::Enfj,
        Mbti::Entp,
        Mbti::Entj,
        Mbti::Esfp,
        Mbti::Esfj,
        Mbti::Estp,
        Mbti::Estj,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mbti::Infp => "INFP",
            Mbti::Infj => "INFJ",
            Mbti::Intp => "INTP",
            Mbti::Intj => "INTJ",
            Mbti::Isfp => "ISFP",
            Mbti::Isfj => "ISFJ",
            Mbti::Istp => "ISTP",
            Mbti::Istj => "ISTJ",
            Mbti::Enfp => "ENFP",
            Mbti::Enfj => "ENFJ",
            Mbti::Entp => "ENTP",
            Mbti::Entj => "ENTJ",
            Mbti::Esfp => "ESFP",
            Mbti::Esfj => "ESFJ",
            Mbti::Estp => "ESTP",
            Mbti::Estj => "ESTJ",
        }
    }
}

impl fmt::Display for Mbti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mbti {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Mbti::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| MatchError::InvalidRequest(format!("invalid MBTI value: {s}")))
    }
}

// Deserialization goes through `FromStr` so request bodies may carry the tag
// in any case.
impl<'de> Deserialize<'de> for Mbti {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("infp".parse::<Mbti>().unwrap(), Mbti::Infp);
        assert_eq!("ENTJ".parse::<Mbti>().unwrap(), Mbti::Entj);
        assert_eq!("eStP".parse::<Mbti>().unwrap(), Mbti::Estp);
    }

    #[test]
    fn rejects_unknown_tags() {
        assert!("ABCD".parse::<Mbti>().is_err());
        assert!("".parse::<Mbti>().is_err());
        assert!("INF".parse::<Mbti>().is_err());
    }

    #[test]
    fn serde_roundtrip_as_uppercase_string() {
        let json = serde_json::to_string(&Mbti::Infj).unwrap();
        assert_eq!(json, "\"INFJ\"");
        let back: Mbti = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Mbti::Infj);
    }

    #[test]
    fn deserializes_any_case() {
        assert_eq!(serde_json::from_str::<Mbti>("\"infp\"").unwrap(), Mbti::Infp);
        assert_eq!(serde_json::from_str::<Mbti>("\"EnTj\"").unwrap(), Mbti::Entj);
        assert!(serde_json::from_str::<Mbti>("\"wxyz\"").is_err());
    }
}

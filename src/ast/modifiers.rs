//! JVM-style access modifier bitmask.
//!
//! Documents spell modifiers as keyword lists (`["public", "static"]`); the
//! arena stores the packed bits.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::BitOr;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u32);

const KEYWORDS: &[(&str, u32)] = &[
    ("public", Modifiers::PUBLIC.0),
    ("private", Modifiers::PRIVATE.0),
    ("protected", Modifiers::PROTECTED.0),
    ("static", Modifiers::STATIC.0),
    ("final", Modifiers::FINAL.0),
    ("synchronized", Modifiers::SYNCHRONIZED.0),
    ("volatile", Modifiers::VOLATILE.0),
    ("transient", Modifiers::TRANSIENT.0),
    ("interface", Modifiers::INTERFACE.0),
    ("abstract", Modifiers::ABSTRACT.0),
    ("synthetic", Modifiers::SYNTHETIC.0),
    ("annotation", Modifiers::ANNOTATION.0),
    ("enum", Modifiers::ENUM.0),
];

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const PUBLIC: Modifiers = Modifiers(0x0001);
    pub const PRIVATE: Modifiers = Modifiers(0x0002);
    pub const PROTECTED: Modifiers = Modifiers(0x0004);
    pub const STATIC: Modifiers = Modifiers(0x0008);
    pub const FINAL: Modifiers = Modifiers(0x0010);
    pub const SYNCHRONIZED: Modifiers = Modifiers(0x0020);
    pub const VOLATILE: Modifiers = Modifiers(0x0040);
    pub const TRANSIENT: Modifiers = Modifiers(0x0080);
    pub const INTERFACE: Modifiers = Modifiers(0x0200);
    pub const ABSTRACT: Modifiers = Modifiers(0x0400);
    pub const SYNTHETIC: Modifiers = Modifiers(0x1000);
    pub const ANNOTATION: Modifiers = Modifiers(0x2000);
    pub const ENUM: Modifiers = Modifiers(0x4000);

    const VISIBILITY: u32 = 0x0001 | 0x0002 | 0x0004;

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Modifiers) {
        self.0 &= !other.0;
    }

    pub const fn with(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    pub const fn intersection(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 & other.0)
    }

    pub const fn without(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 & !other.0)
    }

    /// Replaces the visibility bits.
    pub const fn with_visibility(self, visibility: Modifiers) -> Modifiers {
        Modifiers((self.0 & !Self::VISIBILITY) | (visibility.0 & Self::VISIBILITY))
    }

    pub const fn has_visibility(self) -> bool {
        self.0 & Self::VISIBILITY != 0
    }

    pub const fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    pub const fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    pub const fn is_package_private(self) -> bool {
        !self.has_visibility()
    }

    pub const fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    pub const fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    pub const fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    pub const fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    pub const fn is_synthetic(self) -> bool {
        self.contains(Self::SYNTHETIC)
    }

    pub fn from_keyword(keyword: &str) -> Option<Modifiers> {
        KEYWORDS
            .iter()
            .find(|(name, _)| *name == keyword)
            .map(|(_, bits)| Modifiers(*bits))
    }

    pub fn keywords(self) -> Vec<&'static str> {
        KEYWORDS
            .iter()
            .filter(|(_, bits)| self.0 & bits != 0)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

impl fmt::Debug for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modifiers({})", self.keywords().join(" "))
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keywords().join(" "))
    }
}

impl Serialize for Modifiers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.keywords().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Modifiers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let words = Vec::<String>::deserialize(deserializer)?;
        let mut modifiers = Modifiers::NONE;
        for word in &words {
            // "package" marks explicit package-private visibility; it sets no bit
            if word == "package" {
                continue;
            }
            let bits = Modifiers::from_keyword(word)
                .ok_or_else(|| D::Error::custom(format!("unknown modifier '{}'", word)))?;
            modifiers.insert(bits);
        }
        Ok(modifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_replacement_keeps_other_bits() {
        let m = (Modifiers::PUBLIC | Modifiers::STATIC).with_visibility(Modifiers::PRIVATE);
        assert!(m.is_private());
        assert!(m.is_static());
        assert!(!m.is_public());
    }

    #[test]
    fn keywords_round_trip_through_serde() {
        let m = Modifiers::PRIVATE | Modifiers::FINAL;
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"["private","final"]"#);
        let back: Modifiers = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        assert!(serde_json::from_str::<Modifiers>(r#"["sealed"]"#).is_err());
    }
}

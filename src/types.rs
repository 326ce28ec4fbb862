use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// The practice alphabet, in teaching order.
pub const ALPHABET: [&str; 35] = [
    "ක", "ඛ", "ග", "ඝ", "ඞ", "ච", "ඡ", "ජ", "ඣ", "ඤ", //
    "ට", "ඨ", "ඩ", "ඪ", "ණ", "ත", "ථ", "ද", "ධ", "න", //
    "ප", "ඵ", "බ", "භ", "ම", "ය", "ර", "ල", "ව", "ශ", //
    "ෂ", "ස", "හ", "ළ", "ෆ",
];

/// One letter of the practice alphabet.
///
/// A `Label` can only be obtained by parsing a member of [`ALPHABET`] or from
/// a valid index, so every prediction the crate produces is a real letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u8);

impl Label {
    /// Number of letters in the alphabet.
    pub const COUNT: usize = ALPHABET.len();

    /// Label at a fixed alphabet index. Panics when `index` is out of range;
    /// only used for built-in tables.
    pub(crate) const fn at(index: usize) -> Self {
        assert!(index < Self::COUNT);
        Self(index as u8)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn as_str(self) -> &'static str {
        ALPHABET[self.index()]
    }

    /// The following letter in alphabet order, wrapping at the end.
    pub fn next(self) -> Self {
        Self(((self.index() + 1) % Self::COUNT) as u8)
    }

    /// All letters, in alphabet order.
    pub fn all() -> impl Iterator<Item = Label> {
        (0..Self::COUNT).map(|i| Self(i as u8))
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ALPHABET
            .iter()
            .position(|&letter| letter == s)
            .map(|i| Self(i as u8))
            .ok_or_else(|| Error::UnknownLabel(s.to_string()))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Smallest axis-aligned rectangle enclosing the ink of a drawing.
///
/// Corners are inclusive pixel coordinates. An empty drawing has the
/// degenerate box `(0, 0, 0, 0)`. Serialized as `[min_x, min_y, max_x, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub const fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Horizontal extent, `max_x - min_x`.
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    /// Vertical extent, `max_y - min_y`.
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    /// Height over width; 1.0 when the box has no width.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width() == 0 {
            1.0
        } else {
            self.height() as f64 / self.width() as f64
        }
    }

    /// Mirror an x coordinate about the box's vertical bisector.
    pub fn mirror_x(&self, x: u32) -> u32 {
        self.min_x + self.max_x - x
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from(v: [u32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.min_x, b.min_y, b.max_x, b.max_y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_has_35_distinct_letters() {
        let mut seen = std::collections::HashSet::new();
        for letter in ALPHABET {
            assert!(seen.insert(letter), "duplicate letter {letter}");
        }
        assert_eq!(Label::COUNT, 35);
        assert_eq!(Label::all().count(), 35);
    }

    #[test]
    fn label_parsing() {
        let ka: Label = "ක".parse().unwrap();
        assert_eq!(ka.index(), 0);
        assert_eq!(ka.as_str(), "ක");

        // Surrounding whitespace is tolerated
        let pa: Label = " ප ".parse().unwrap();
        assert_eq!(pa.as_str(), "ප");

        assert!(matches!("A".parse::<Label>(), Err(Error::UnknownLabel(_))));
        assert!(matches!("".parse::<Label>(), Err(Error::UnknownLabel(_))));
    }

    #[test]
    fn label_next_wraps() {
        let last = Label::from_index(Label::COUNT - 1).unwrap();
        assert_eq!(last.as_str(), "ෆ");
        assert_eq!(last.next().as_str(), "ක");
        assert!(Label::from_index(Label::COUNT).is_none());
    }

    #[test]
    fn label_serde_as_string() {
        let ma: Label = "ම".parse().unwrap();
        let json = serde_json::to_string(&ma).unwrap();
        assert_eq!(json, "\"ම\"");
        let back: Label = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ma);
        assert!(serde_json::from_str::<Label>("\"Z\"").is_err());
    }

    #[test]
    fn bounding_box_geometry() {
        let bbox = BoundingBox::new(10, 20, 30, 60);
        assert_eq!(bbox.width(), 20);
        assert_eq!(bbox.height(), 40);
        assert!((bbox.aspect_ratio() - 2.0).abs() < 1e-9);
        assert_eq!(bbox.mirror_x(10), 30);
        assert_eq!(bbox.mirror_x(12), 28);

        // Zero width
        assert!((BoundingBox::default().aspect_ratio() - 1.0).abs() < 1e-9);

        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[10,20,30,60]");
    }
}

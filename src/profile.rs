//! Static letter tables: expected feature profiles and confusable groups.
//!
//! Both tables are plain data, built once when the analyzer is configured and
//! only read afterwards.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{Feature, FeatureSet};
use crate::types::Label;

/// Expected feature values of a well-formed letter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelProfile {
    expected: BTreeMap<Feature, f64>,
}

impl LabelProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(mut self, feature: Feature, value: f64) -> Self {
        self.expected.insert(feature, value);
        self
    }

    pub fn expected(&self, feature: Feature) -> Option<f64> {
        self.expected.get(&feature).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.expected.iter().map(|(k, v)| (*k, *v))
    }

    /// Multiplicative similarity of `features` to this profile.
    ///
    /// Each profiled feature present in `features` contributes the factor
    /// `max(0, 1 - |actual - expected|)`. Returns `None` when the two share no
    /// numeric feature, so a method cannot look confident about a profile it
    /// never measured.
    pub fn similarity(&self, features: &FeatureSet) -> Option<f64> {
        let mut similarity = 1.0_f64;
        let mut compared = 0usize;
        for (feature, expected) in self.iter() {
            if let Some(actual) = features.scalar(feature) {
                similarity *= (1.0 - (actual - expected).abs()).max(0.0);
                compared += 1;
            }
        }
        (compared > 0).then(|| similarity.clamp(0.0, 1.0))
    }
}

/// Expected-feature profiles keyed by letter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileTable {
    profiles: BTreeMap<Label, LabelProfile>,
}

impl ProfileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, label: Label, profile: LabelProfile) -> Self {
        self.profiles.insert(label, profile);
        self
    }

    pub fn get(&self, label: Label) -> Option<&LabelProfile> {
        self.profiles.get(&label)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, &LabelProfile)> {
        self.profiles.iter().map(|(k, v)| (*k, v))
    }

    /// Overlay `other` on this table; profiles in `other` win.
    pub fn merge(&mut self, other: ProfileTable) {
        self.profiles.extend(other.profiles);
    }

    /// Every expected value must be a finite number for a numeric feature.
    pub fn validate(&self) -> Result<()> {
        for (label, profile) in self.iter() {
            for (feature, value) in profile.iter() {
                if feature == Feature::BoundingBox {
                    return Err(Error::Config(format!(
                        "profile for '{label}' cannot expect a bounding box"
                    )));
                }
                if !value.is_finite() {
                    return Err(Error::Config(format!(
                        "profile for '{label}' has non-finite {feature}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Built-in profiles.
pub fn default_profiles() -> ProfileTable {
    let profile = |complexity, aspect_ratio, circularity| {
        LabelProfile::new()
            .expect(Feature::Complexity, complexity)
            .expect(Feature::AspectRatio, aspect_ratio)
            .expect(Feature::Circularity, circularity)
    };

    ProfileTable::new()
        .with_profile(letter(0), profile(0.7, 0.8, 0.3)) // ක
        .with_profile(letter(10), profile(0.5, 0.9, 0.2)) // ට
        .with_profile(letter(20), profile(0.6, 0.7, 0.4)) // ප
}

/// Where a letter sits in the confusable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confusion<'a> {
    /// The letter heads a group; these are the look-alikes, in table order.
    Head(&'a [Label]),
    /// The letter is a look-alike of this group head.
    Member(Label),
}

/// Groups of visually similar letters, keyed by group head.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfusableTable {
    groups: BTreeMap<Label, Vec<Label>>,
}

impl ConfusableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, head: Label, members: Vec<Label>) -> Self {
        self.groups.insert(head, members);
        self
    }

    pub fn lookup(&self, label: Label) -> Option<Confusion<'_>> {
        if let Some(members) = self.groups.get(&label) {
            return Some(Confusion::Head(members));
        }
        self.groups
            .iter()
            .find(|(_, members)| members.contains(&label))
            .map(|(head, _)| Confusion::Member(*head))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Replace groups headed by the same letters with those in `other`.
    pub fn merge(&mut self, other: ConfusableTable) {
        self.groups.extend(other.groups);
    }

    /// Every letter may appear at most once across all groups, and no group
    /// may be empty.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashMap<Label, Label> = HashMap::new();
        for (head, members) in &self.groups {
            if members.is_empty() {
                return Err(Error::Config(format!(
                    "confusable group '{head}' has no members"
                )));
            }
            for letter in std::iter::once(head).chain(members.iter()) {
                if let Some(other) = seen.insert(*letter, *head) {
                    return Err(Error::Config(format!(
                        "letter '{letter}' appears in confusable groups '{other}' and '{head}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Built-in confusable groups: letters that differ by a small stroke.
pub fn default_confusables() -> ConfusableTable {
    let group = |head: usize, members: &[usize]| -> (Label, Vec<Label>) {
        (letter(head), members.iter().map(|&i| letter(i)).collect())
    };

    [
        group(0, &[1, 2]),         // ක: ඛ ග
        group(5, &[6]),            // ච: ඡ
        group(7, &[8]),            // ජ: ඣ
        group(10, &[11]),          // ට: ඨ
        group(12, &[13]),          // ඩ: ඪ
        group(15, &[16, 17, 18]),  // ත: ථ ද ධ
        group(19, &[14]),          // න: ණ
        group(20, &[21, 22, 23]),  // ප: ඵ බ භ
        group(27, &[33]),          // ල: ළ
        group(29, &[30, 31]),      // ශ: ෂ ස
    ]
    .into_iter()
    .fold(ConfusableTable::new(), |table, (head, members)| {
        table.with_group(head, members)
    })
}

fn letter(index: usize) -> Label {
    Label::at(index)
}

/// Profiles and confusable groups consulted by the scorers.
#[derive(Debug, Clone, PartialEq)]
pub struct LetterTables {
    pub profiles: ProfileTable,
    pub confusables: ConfusableTable,
}

impl Default for LetterTables {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            confusables: default_confusables(),
        }
    }
}

impl LetterTables {
    pub fn new(profiles: ProfileTable, confusables: ConfusableTable) -> Self {
        Self {
            profiles,
            confusables,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.profiles.validate()?;
        self.confusables.validate()
    }

    /// The letter a drawing of `target` is most plausibly mistaken for.
    ///
    /// - `target` heads a confusable group: the member whose profile best
    ///   matches `features` (first member when none is profiled).
    /// - `target` is a group member: the group head.
    /// - Otherwise: the best-matching profiled letter other than `target`,
    ///   falling back to the next letter of the alphabet.
    pub fn nearest_alternative(&self, target: Label, features: &FeatureSet) -> Label {
        match self.confusables.lookup(target) {
            Some(Confusion::Head(members)) => self
                .best_match(members.iter().copied(), features)
                .or_else(|| members.first().copied())
                .unwrap_or_else(|| target.next()),
            Some(Confusion::Member(head)) => head,
            None => {
                let candidates = self
                    .profiles
                    .iter()
                    .map(|(label, _)| label)
                    .filter(|&label| label != target);
                self.best_match(candidates, features)
                    .unwrap_or_else(|| target.next())
            }
        }
    }

    /// Highest-similarity profiled label among `candidates`; earlier
    /// candidates win ties.
    fn best_match<It>(&self, candidates: It, features: &FeatureSet) -> Option<Label>
    where
        It: Iterator<Item = Label>,
    {
        let mut best: Option<(Label, f64)> = None;
        for label in candidates {
            let Some(score) = self
                .profiles
                .get(label)
                .and_then(|profile| profile.similarity(features))
            else {
                continue;
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((label, score));
            }
        }
        best.map(|(label, _)| label)
    }
}

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use serde::{Deserialize, Serialize};
use shared::domain::ChemicalName;

use crate::error::{LabError, Result};

/// The reagents on the bench with their liquid colour.
pub const KNOWN_CHEMICALS: [(&str, &str); 11] = [
    ("Sodium Thiosulfate", "#ffffff"),
    ("Hydrochloric Acid", "#ffffff"),
    ("Copper Sulfate", "#4682B4"),
    ("Ammonia", "#f0f8ff"),
    ("Silver Nitrate", "#ffffff"),
    ("Sodium Chloride", "#ffffff"),
    ("Iron(III) Chloride", "#a0522d"),
    ("Potassium Thiocyanate", "#ffffff"),
    ("Lead(II) Nitrate", "#ffffff"),
    ("Potassium Iodide", "#ffffff"),
    ("Hydrogen Peroxide", "#ffffff"),
];

pub fn known_chemicals() -> impl Iterator<Item = ChemicalName> {
    KNOWN_CHEMICALS.iter().map(|(name, _)| ChemicalName::from(*name))
}

pub fn is_known_chemical(name: &ChemicalName) -> bool {
    chemical_color(name).is_some()
}

pub fn chemical_color(name: &ChemicalName) -> Option<&'static str> {
    KNOWN_CHEMICALS
        .iter()
        .find(|(known, _)| *known == name.as_str())
        .map(|(_, color)| *color)
}

/// Two distinct reagents in canonical (sorted) order, so `{a, b}` and `{b, a}`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "[ChemicalName; 2]", try_from = "[ChemicalName; 2]")]
pub struct ReagentPair {
    low: ChemicalName,
    high: ChemicalName,
}

impl ReagentPair {
    /// Returns `None` when both names are the same reagent.
    pub fn new(a: ChemicalName, b: ChemicalName) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &ChemicalName {
        &self.low
    }

    pub fn second(&self) -> &ChemicalName {
        &self.high
    }

    pub fn contains(&self, name: &ChemicalName) -> bool {
        &self.low == name || &self.high == name
    }
}

impl From<ReagentPair> for [ChemicalName; 2] {
    fn from(pair: ReagentPair) -> Self {
        [pair.low, pair.high]
    }
}

impl TryFrom<[ChemicalName; 2]> for ReagentPair {
    type Error = String;

    fn try_from([a, b]: [ChemicalName; 2]) -> std::result::Result<Self, Self::Error> {
        let name = a.clone();
        ReagentPair::new(a, b).ok_or_else(|| format!("reagent pair repeats {name}"))
    }
}

/// What a renderer should show in the flask once the reaction settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductAppearance {
    ClearSolution,
    Precipitate,
    Foam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionDefinition {
    pub reaction_id: String,
    pub reagents: ReagentPair,
    pub equation: String,
    pub observation: String,
    pub product_color: String,
    pub appearance: ProductAppearance,
}

impl ReactionDefinition {
    fn builtin(
        first: &str,
        second: &str,
        equation: &str,
        observation: &str,
        product_color: &str,
        appearance: ProductAppearance,
    ) -> Option<Self> {
        Some(Self {
            reaction_id: format!("{first}+{second}"),
            reagents: ReagentPair::new(first.into(), second.into())?,
            equation: equation.to_string(),
            observation: observation.to_string(),
            product_color: product_color.to_string(),
            appearance,
        })
    }
}

/// Immutable lookup from reagent pairs to reactions.
///
/// Pairs are validated once at construction: a catalog never holds two
/// definitions for the same unordered pair, so lookup has no tie-break.
#[derive(Debug, Clone)]
pub struct ReactionCatalog {
    entries: Vec<ReactionDefinition>,
    index: HashMap<ReagentPair, usize>,
}

impl ReactionCatalog {
    pub fn new(entries: Vec<ReactionDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if index.insert(entry.reagents.clone(), position).is_some() {
                return Err(LabError::DuplicateReagentPair {
                    first: entry.reagents.first().clone(),
                    second: entry.reagents.second().clone(),
                });
            }
        }
        Ok(Self { entries, index })
    }

    /// The six bench reactions, shared by every session in the process.
    pub fn standard() -> Arc<ReactionCatalog> {
        static STANDARD: OnceLock<Arc<ReactionCatalog>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Arc::new(ReactionCatalog::built_in()))
            .clone()
    }

    /// Indexes [`standard_entries`] without the duplicate check of [`Self::new`].
    ///
    /// The built-in table must declare each pair once; the catalog tests run it
    /// through `new` to hold that. Should a duplicate slip in, the first
    /// declaration wins and the later one is unreachable.
    fn built_in() -> Self {
        let entries = standard_entries();
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            index.entry(entry.reagents.clone()).or_insert(position);
        }
        Self { entries, index }
    }

    pub fn resolve(
        &self,
        first: &ChemicalName,
        second: &ChemicalName,
    ) -> Option<&ReactionDefinition> {
        let pair = ReagentPair::new(first.clone(), second.clone())?;
        self.resolve_pair(&pair)
    }

    pub fn resolve_pair(&self, pair: &ReagentPair) -> Option<&ReactionDefinition> {
        self.index.get(pair).map(|&position| &self.entries[position])
    }

    /// Resolves a full selection; anything other than two distinct names is no match.
    pub fn resolve_selection(&self, selected: &[ChemicalName]) -> Option<&ReactionDefinition> {
        match selected {
            [first, second] => self.resolve(first, second),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[ReactionDefinition] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn standard_entries() -> Vec<ReactionDefinition> {
    use ProductAppearance::*;

    [
        ReactionDefinition::builtin(
            "Sodium Thiosulfate",
            "Hydrochloric Acid",
            "Na2S2O3(aq) + 2 HCl(aq) → 2 NaCl(aq) + SO2(g) + S(s) + H2O(l)",
            "A cloudy white precipitate of sulfur forms, and sulfur dioxide gas is produced (pungent smell).",
            "#ff4500",
            ClearSolution,
        ),
        ReactionDefinition::builtin(
            "Copper Sulfate",
            "Ammonia",
            "CuSO4(aq) + 2 NH3(aq) + 2 H2O(l) → Cu(OH)2(s) + (NH4)2SO4(aq)  followed by  Cu(OH)2(s) + 4 NH3(aq) → [Cu(NH3)4(H2O)2]SO4(aq)",
            "A pale blue precipitate forms, which then dissolves in excess ammonia to form a deep blue solution.",
            "#00008b",
            ClearSolution,
        ),
        ReactionDefinition::builtin(
            "Silver Nitrate",
            "Sodium Chloride",
            "AgNO3(aq) + NaCl(aq) → AgCl(s) + NaNO3(aq)",
            "A white, curdy precipitate of silver chloride forms.",
            "#ffffff",
            Precipitate,
        ),
        ReactionDefinition::builtin(
            "Iron(III) Chloride",
            "Potassium Thiocyanate",
            "FeCl3(aq) + 3 KSCN(aq) → Fe(SCN)3(aq) + 3 KCl(aq)",
            "The solution turns blood-red due to the formation of iron(III) thiocyanate.",
            "#8b0000",
            ClearSolution,
        ),
        ReactionDefinition::builtin(
            "Lead(II) Nitrate",
            "Potassium Iodide",
            "Pb(NO3)2(aq) + 2 KI(aq) → PbI2(s) + 2 KNO3(aq)",
            "A bright yellow precipitate of lead(II) iodide forms.",
            "#ffff00",
            Precipitate,
        ),
        ReactionDefinition::builtin(
            "Hydrogen Peroxide",
            "Potassium Iodide",
            "2 H2O2(aq) + 2 KI(aq) → I2(aq) + 2 KOH(aq) + O2(g)",
            "Rapid effervescence (bubbling) due to oxygen gas production, and the solution may turn slightly brown from iodine.",
            "#f0f8ff",
            Foam,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;

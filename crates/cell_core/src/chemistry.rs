//! Chemistry keys and the voltage table shared by the estimator, scorer and
//! tick updater.
//!
//! The table is configuration data: adding a chemistry means adding a variant
//! and a table row, never touching the update logic.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Chemistry {
    #[serde(rename = "LFP")]
    Lfp,
    #[serde(rename = "NMC")]
    Nmc,
    #[serde(rename = "NiMH")]
    NiMh,
    #[serde(rename = "Lead-Acid")]
    LeadAcid,
}

impl Chemistry {
    pub const ALL: [Self; 4] = [Self::Lfp, Self::Nmc, Self::NiMh, Self::LeadAcid];

    /// Used whenever a key or a table row is missing.
    pub const FALLBACK: Self = Self::Nmc;

    pub fn label(self) -> &'static str {
        match self {
            Self::Lfp => "LFP",
            Self::Nmc => "NMC",
            Self::NiMh => "NiMH",
            Self::LeadAcid => "Lead-Acid",
        }
    }

    /// Case-insensitive key lookup. Accepts `lead-acid`, `lead_acid` and `leadacid`.
    pub fn parse_key(key: &str) -> Option<Self> {
        let normalised: String = key
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalised.as_str() {
            "lfp" => Some(Self::Lfp),
            "nmc" => Some(Self::Nmc),
            "nimh" => Some(Self::NiMh),
            "leadacid" => Some(Self::LeadAcid),
            _ => None,
        }
    }

    /// Resolve a user-supplied key under the given policy.
    ///
    /// `Fallback` maps unknown keys to [`Chemistry::FALLBACK`] and logs the
    /// substitution; `Strict` returns [`CoreError::InvalidChemistry`].
    pub fn resolve(key: &str, policy: ChemistryPolicy) -> Result<Self, CoreError> {
        if let Some(chemistry) = Self::parse_key(key) {
            return Ok(chemistry);
        }
        match policy {
            ChemistryPolicy::Fallback => {
                tracing::warn!(
                    key,
                    fallback = Self::FALLBACK.label(),
                    "unknown chemistry, using fallback bounds"
                );
                Ok(Self::FALLBACK)
            }
            ChemistryPolicy::Strict => Err(CoreError::InvalidChemistry(key.to_string())),
        }
    }
}

impl fmt::Display for Chemistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Chemistry {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s, ChemistryPolicy::Strict)
    }
}

/// How unknown chemistry keys are treated at the input boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChemistryPolicy {
    #[default]
    Fallback,
    Strict,
}

/// Voltage envelope and reference points for one chemistry, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChemistryProfile {
    /// 0 % state of charge; task-driven discharge floor.
    pub min_voltage: f64,
    /// 100 % state of charge; task-driven charge ceiling.
    pub max_voltage: f64,
    /// Least-stress resting voltage used by the health scorer.
    pub optimal_voltage: f64,
    /// Initial voltage of a freshly created task-driven cell.
    pub nominal_voltage: f64,
}

impl ChemistryProfile {
    pub fn clamp_voltage(&self, voltage: f64) -> f64 {
        voltage.clamp(self.min_voltage, self.max_voltage)
    }
}

static FALLBACK_PROFILE: ChemistryProfile = ChemistryProfile {
    min_voltage: 3.0,
    max_voltage: 4.2,
    optimal_voltage: 3.7,
    nominal_voltage: 3.6,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChemistryTable {
    profiles: BTreeMap<Chemistry, ChemistryProfile>,
}

impl Default for ChemistryTable {
    fn default() -> Self {
        Self {
            profiles: BTreeMap::from([
                (
                    Chemistry::Lfp,
                    ChemistryProfile {
                        min_voltage: 2.5,
                        max_voltage: 3.65,
                        optimal_voltage: 3.3,
                        nominal_voltage: 3.2,
                    },
                ),
                (Chemistry::Nmc, FALLBACK_PROFILE),
                (
                    Chemistry::NiMh,
                    ChemistryProfile {
                        min_voltage: 1.0,
                        max_voltage: 1.4,
                        optimal_voltage: 1.25,
                        nominal_voltage: 1.2,
                    },
                ),
                (
                    Chemistry::LeadAcid,
                    ChemistryProfile {
                        min_voltage: 1.8,
                        max_voltage: 2.1,
                        optimal_voltage: 2.0,
                        nominal_voltage: 2.0,
                    },
                ),
            ]),
        }
    }
}

impl ChemistryTable {
    pub fn empty() -> Self {
        Self {
            profiles: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, chemistry: Chemistry, profile: ChemistryProfile) {
        self.profiles.insert(chemistry, profile);
    }

    pub fn contains(&self, chemistry: Chemistry) -> bool {
        self.profiles.contains_key(&chemistry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Chemistry, &ChemistryProfile)> {
        self.profiles.iter().map(|(chemistry, profile)| (*chemistry, profile))
    }

    /// Profile for `chemistry`, falling back to the NMC row (then the built-in
    /// NMC values) when the table has no entry.
    pub fn profile(&self, chemistry: Chemistry) -> &ChemistryProfile {
        if let Some(profile) = self.profiles.get(&chemistry) {
            return profile;
        }
        tracing::warn!(
            chemistry = chemistry.label(),
            "chemistry missing from table, using fallback bounds"
        );
        self.profiles
            .get(&Chemistry::FALLBACK)
            .unwrap_or(&FALLBACK_PROFILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_is_case_insensitive() {
        assert_eq!(Chemistry::parse_key("lfp"), Some(Chemistry::Lfp));
        assert_eq!(Chemistry::parse_key("NMC"), Some(Chemistry::Nmc));
        assert_eq!(Chemistry::parse_key("NiMH"), Some(Chemistry::NiMh));
        assert_eq!(Chemistry::parse_key("Lead-Acid"), Some(Chemistry::LeadAcid));
        assert_eq!(Chemistry::parse_key("lead_acid"), Some(Chemistry::LeadAcid));
        assert_eq!(Chemistry::parse_key("li-ion"), None);
    }

    #[test]
    fn fallback_policy_maps_unknown_to_nmc() {
        let chemistry = Chemistry::resolve("sodium", ChemistryPolicy::Fallback).unwrap();
        assert_eq!(chemistry, Chemistry::Nmc);
    }

    #[test]
    fn strict_policy_rejects_unknown() {
        let err = Chemistry::resolve("sodium", ChemistryPolicy::Strict).unwrap_err();
        assert!(matches!(err, CoreError::InvalidChemistry(ref key) if key == "sodium"));
        assert!("sodium".parse::<Chemistry>().is_err());
    }

    #[test]
    fn labels_round_trip_through_parse() {
        for chemistry in Chemistry::ALL {
            assert_eq!(chemistry.label().parse::<Chemistry>().unwrap(), chemistry);
        }
    }

    #[test]
    fn default_table_covers_every_chemistry() {
        let table = ChemistryTable::default();
        for chemistry in Chemistry::ALL {
            assert!(table.contains(chemistry), "{chemistry} missing");
            let profile = table.profile(chemistry);
            assert!(profile.min_voltage < profile.max_voltage);
            assert!(profile.optimal_voltage > profile.min_voltage);
            assert!(profile.optimal_voltage < profile.max_voltage);
        }
    }

    #[test]
    fn missing_row_uses_nmc_profile() {
        let mut table = ChemistryTable::empty();
        table.insert(
            Chemistry::Nmc,
            ChemistryProfile {
                min_voltage: 3.1,
                max_voltage: 4.1,
                optimal_voltage: 3.6,
                nominal_voltage: 3.5,
            },
        );
        assert!((table.profile(Chemistry::NiMh).min_voltage - 3.1).abs() < 1e-12);
    }

    #[test]
    fn empty_table_uses_builtin_fallback() {
        let table = ChemistryTable::empty();
        let profile = table.profile(Chemistry::Lfp);
        assert!((profile.max_voltage - 4.2).abs() < 1e-12);
    }

    #[test]
    fn table_serializes_with_chemistry_labels() {
        let json = serde_json::to_string(&ChemistryTable::default()).unwrap();
        assert!(json.contains("\"Lead-Acid\""));
        let back: ChemistryTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ChemistryTable::default());
    }
}

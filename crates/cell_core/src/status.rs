//! Health status classification and advisory suggestions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Chemistry, ChemistryTable};

/// |voltage − optimal| above this triggers a regulation advisory.
const VOLTAGE_REGULATION_TOLERANCE_V: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Normal,
    Warning,
    Critical,
    Danger,
}

impl HealthStatus {
    /// First matching threshold, descending.
    pub fn from_health(health: f64) -> Self {
        if health >= 95.0 {
            Self::Excellent
        } else if health >= 85.0 {
            Self::Good
        } else if health >= 70.0 {
            Self::Normal
        } else if health >= 50.0 {
            Self::Warning
        } else if health >= 30.0 {
            Self::Critical
        } else {
            Self::Danger
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Normal => "Normal",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
            Self::Danger => "Danger",
        }
    }

    /// The advisory that accompanies this band, if any.
    pub fn advisory(self) -> Option<Suggestion> {
        match self {
            Self::Excellent | Self::Good => None,
            Self::Normal => Some(Suggestion::MonitorRegularly),
            Self::Warning => Some(Suggestion::CheckCellParameters),
            Self::Critical => Some(Suggestion::ImmediateAttention),
            Self::Danger => Some(Suggestion::ReplaceCell),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suggestion {
    MonitorRegularly,
    CheckCellParameters,
    ImmediateAttention,
    ReplaceCell,
    CoolDown,
    WarmUp,
    ChargeSoon,
    AvoidOvercharging,
    CheckVoltageRegulation,
}

impl Suggestion {
    pub fn message(self) -> &'static str {
        match self {
            Self::MonitorRegularly => "Monitor regularly",
            Self::CheckCellParameters => "Check cell parameters",
            Self::ImmediateAttention => "Immediate attention required",
            Self::ReplaceCell => "Replace cell immediately",
            Self::CoolDown => "Cool down the battery",
            Self::WarmUp => "Warm up the battery",
            Self::ChargeSoon => "Charge battery soon",
            Self::AvoidOvercharging => "Avoid overcharging",
            Self::CheckVoltageRegulation => "Check voltage regulation",
        }
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: HealthStatus,
    /// Band advisory first, then temperature, SOC and voltage advisories.
    pub suggestions: Vec<Suggestion>,
}

impl StatusReport {
    pub fn messages(&self) -> Vec<&'static str> {
        self.suggestions.iter().map(|s| s.message()).collect()
    }
}

pub fn classify(
    health: f64,
    temperature: f64,
    voltage: f64,
    soc: f64,
    chemistry: Chemistry,
    table: &ChemistryTable,
) -> StatusReport {
    let status = HealthStatus::from_health(health);
    let mut suggestions: Vec<Suggestion> = status.advisory().into_iter().collect();

    if temperature > 45.0 {
        suggestions.push(Suggestion::CoolDown);
    }
    if temperature < 5.0 {
        suggestions.push(Suggestion::WarmUp);
    }
    if soc < 15.0 {
        suggestions.push(Suggestion::ChargeSoon);
    }
    if soc > 95.0 {
        suggestions.push(Suggestion::AvoidOvercharging);
    }
    let optimal = table.profile(chemistry).optimal_voltage;
    if (voltage - optimal).abs() > VOLTAGE_REGULATION_TOLERANCE_V {
        suggestions.push(Suggestion::CheckVoltageRegulation);
    }

    StatusReport {
        status,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_descend() {
        assert_eq!(HealthStatus::from_health(100.0), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_health(95.0), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_health(94.9), HealthStatus::Good);
        assert_eq!(HealthStatus::from_health(85.0), HealthStatus::Good);
        assert_eq!(HealthStatus::from_health(70.0), HealthStatus::Normal);
        assert_eq!(HealthStatus::from_health(50.0), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_health(30.0), HealthStatus::Critical);
        assert_eq!(HealthStatus::from_health(29.9), HealthStatus::Danger);
        assert_eq!(HealthStatus::from_health(0.0), HealthStatus::Danger);
    }

    #[test]
    fn excellent_nominal_cell_has_no_suggestions() {
        let table = ChemistryTable::default();
        let report = classify(98.0, 25.0, 3.3, 60.0, Chemistry::Lfp, &table);
        assert_eq!(report.status, HealthStatus::Excellent);
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn suggestions_follow_enumeration_order() {
        let table = ChemistryTable::default();
        let report = classify(60.0, 55.0, 4.2, 98.0, Chemistry::Nmc, &table);
        assert_eq!(report.status, HealthStatus::Warning);
        assert_eq!(
            report.messages(),
            vec![
                "Check cell parameters",
                "Cool down the battery",
                "Avoid overcharging",
                "Check voltage regulation",
            ]
        );
    }

    #[test]
    fn cold_empty_cell_gets_warm_and_charge_advice() {
        let table = ChemistryTable::default();
        let report = classify(20.0, 0.0, 2.6, 5.0, Chemistry::Lfp, &table);
        assert_eq!(report.status, HealthStatus::Danger);
        assert_eq!(
            report.suggestions,
            vec![
                Suggestion::ReplaceCell,
                Suggestion::WarmUp,
                Suggestion::ChargeSoon,
                Suggestion::CheckVoltageRegulation,
            ]
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let table = ChemistryTable::default();
        let first = classify(72.5, 47.0, 1.0, 12.0, Chemistry::NiMh, &table);
        let second = classify(72.5, 47.0, 1.0, 12.0, Chemistry::NiMh, &table);
        assert_eq!(first, second);
    }

    #[test]
    fn voltage_tolerance_is_exclusive() {
        let table = ChemistryTable::default();
        let inside = classify(90.0, 25.0, 2.25, 50.0, Chemistry::LeadAcid, &table);
        assert!(!inside.suggestions.contains(&Suggestion::CheckVoltageRegulation));
        let outside = classify(90.0, 25.0, 2.31, 50.0, Chemistry::LeadAcid, &table);
        assert!(outside.suggestions.contains(&Suggestion::CheckVoltageRegulation));
    }
}

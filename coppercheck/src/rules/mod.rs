//! Rule model and rule-deck loading.
//!
//! A rule deck is a JSON mapping from rule-kind name to a list of parameter
//! objects (see the crate docs for a worked example). Parameters are
//! normalized on load: every distance becomes meters, so the check routines
//! never see unit strings. Deck key order is preserved; violations are
//! reported in deck order, then discovery order.

pub mod checks;

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::engine::DrcError;
use crate::units::parse_distance;

/// The rule kinds the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    MinLineWidth,
    MaxLineWidth,
    MinClearance,
    MinAnnularRing,
    MinCopperToBoardEdge,
    CopperBalance,
    DiffPairLengthMatch,
    ImpedanceSingleEnd,
    ImpedanceDiffPair,
    BackDrillStubLength,
}

impl RuleKind {
    pub const ALL: [RuleKind; 10] = [
        RuleKind::MinLineWidth,
        RuleKind::MaxLineWidth,
        RuleKind::MinClearance,
        RuleKind::MinAnnularRing,
        RuleKind::MinCopperToBoardEdge,
        RuleKind::CopperBalance,
        RuleKind::DiffPairLengthMatch,
        RuleKind::ImpedanceSingleEnd,
        RuleKind::ImpedanceDiffPair,
        RuleKind::BackDrillStubLength,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::MinLineWidth => "min_line_width",
            RuleKind::MaxLineWidth => "max_line_width",
            RuleKind::MinClearance => "min_clearance",
            RuleKind::MinAnnularRing => "min_annular_ring",
            RuleKind::MinCopperToBoardEdge => "min_copper_to_board_edge",
            RuleKind::CopperBalance => "copper_balance",
            RuleKind::DiffPairLengthMatch => "diff_pair_length_match",
            RuleKind::ImpedanceSingleEnd => "impedance_single_end",
            RuleKind::ImpedanceDiffPair => "impedance_diff_pair",
            RuleKind::BackDrillStubLength => "back_drill_stub_length",
        }
    }

    pub fn from_name(name: &str) -> Option<RuleKind> {
        RuleKind::ALL.iter().copied().find(|k| k.as_str() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            RuleKind::MinLineWidth => "Paths narrower than the minimum width",
            RuleKind::MaxLineWidth => "Paths wider than the maximum width",
            RuleKind::MinClearance => "Copper-to-copper spacing between nets",
            RuleKind::MinAnnularRing => "Via pad ring around the drilled hole",
            RuleKind::MinCopperToBoardEdge => "Copper distance to the board outline",
            RuleKind::CopperBalance => "Copper coverage balance per layer",
            RuleKind::DiffPairLengthMatch => "Routed length match of a differential pair",
            RuleKind::ImpedanceSingleEnd => "Single-ended characteristic impedance",
            RuleKind::ImpedanceDiffPair => "Differential pair impedance",
            RuleKind::BackDrillStubLength => "Remaining via stub after back-drilling",
        }
    }
}

/// Net selector in a clearance rule: a literal net name, or `"*"` for all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetSelector {
    Any,
    Named(String),
}

impl NetSelector {
    pub fn parse(s: &str) -> NetSelector {
        if s == "*" {
            NetSelector::Any
        } else {
            NetSelector::Named(s.to_string())
        }
    }

    pub fn matches(&self, net: &str) -> bool {
        match self {
            NetSelector::Any => true,
            NetSelector::Named(n) => n == net,
        }
    }
}

/// A declared differential pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiffPair {
    #[serde(rename = "p")]
    pub positive: String,
    #[serde(rename = "n")]
    pub negative: String,
}

/// One loaded rule instance. Distances are meters, angles degrees,
/// impedances ohms, tolerances percent unless named otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    MinLineWidth {
        name: String,
        min_width: f64,
        layers: Option<Vec<String>>,
    },
    MaxLineWidth {
        name: String,
        max_width: f64,
        layers: Option<Vec<String>>,
    },
    MinClearance {
        name: String,
        min_clearance: f64,
        net1: NetSelector,
        net2: NetSelector,
    },
    MinAnnularRing {
        name: String,
        min_ring: f64,
    },
    MinCopperToBoardEdge {
        name: String,
        min_distance: f64,
    },
    CopperBalance {
        name: String,
        max_percent: f64,
        layers: Option<Vec<String>>,
    },
    DiffPairLengthMatch {
        name: String,
        tolerance: f64,
        pairs: Vec<DiffPair>,
    },
    ImpedanceSingleEnd {
        name: String,
        target_ohms: f64,
        tolerance_percent: f64,
        layers: Option<Vec<String>>,
    },
    ImpedanceDiffPair {
        name: String,
        target_ohms: f64,
        tolerance_percent: f64,
        pairs: Vec<DiffPair>,
    },
    BackDrillStubLength {
        name: String,
        max_stub: f64,
    },
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::MinLineWidth { .. } => RuleKind::MinLineWidth,
            Rule::MaxLineWidth { .. } => RuleKind::MaxLineWidth,
            Rule::MinClearance { .. } => RuleKind::MinClearance,
            Rule::MinAnnularRing { .. } => RuleKind::MinAnnularRing,
            Rule::MinCopperToBoardEdge { .. } => RuleKind::MinCopperToBoardEdge,
            Rule::CopperBalance { .. } => RuleKind::CopperBalance,
            Rule::DiffPairLengthMatch { .. } => RuleKind::DiffPairLengthMatch,
            Rule::ImpedanceSingleEnd { .. } => RuleKind::ImpedanceSingleEnd,
            Rule::ImpedanceDiffPair { .. } => RuleKind::ImpedanceDiffPair,
            Rule::BackDrillStubLength { .. } => RuleKind::BackDrillStubLength,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Rule::MinLineWidth { name, .. }
            | Rule::MaxLineWidth { name, .. }
            | Rule::MinClearance { name, .. }
            | Rule::MinAnnularRing { name, .. }
            | Rule::MinCopperToBoardEdge { name, .. }
            | Rule::CopperBalance { name, .. }
            | Rule::DiffPairLengthMatch { name, .. }
            | Rule::ImpedanceSingleEnd { name, .. }
            | Rule::ImpedanceDiffPair { name, .. }
            | Rule::BackDrillStubLength { name, .. } => name,
        }
    }
}

/// A distance or plain number in a rule parameter object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ValueSpec {
    Number(f64),
    Text(String),
}

impl ValueSpec {
    /// Resolve to meters. Bare numbers are meters already.
    fn as_distance(&self, field: &str) -> Result<f64, DrcError> {
        match self {
            ValueSpec::Number(n) => Ok(*n),
            ValueSpec::Text(s) => parse_distance(s)
                .map_err(|e| DrcError::RuleDeck(format!("{field}: {e}"))),
        }
    }

    /// Resolve to a plain number (ohms, percent).
    fn as_number(&self, field: &str) -> Result<f64, DrcError> {
        match self {
            ValueSpec::Number(n) => Ok(*n),
            ValueSpec::Text(s) => s.trim().parse().map_err(|_| {
                DrcError::RuleDeck(format!("{field}: expected a number, got {s:?}"))
            }),
        }
    }
}

/// Raw parameter object as written in the deck. Fields a rule kind does
/// not use are ignored, so decks can carry annotations.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawRule {
    name: Option<String>,
    value: Option<ValueSpec>,
    net1: Option<String>,
    net2: Option<String>,
    layers: Option<Vec<String>>,
    tolerance: Option<ValueSpec>,
    max_percent: Option<f64>,
    pairs: Option<Vec<DiffPair>>,
}

impl RawRule {
    fn value(&self, kind: RuleKind) -> Result<&ValueSpec, DrcError> {
        self.value.as_ref().ok_or_else(|| {
            DrcError::RuleDeck(format!("{}: missing \"value\"", kind.as_str()))
        })
    }

    fn pairs(&self, kind: RuleKind) -> Result<Vec<DiffPair>, DrcError> {
        self.pairs.clone().ok_or_else(|| {
            DrcError::RuleDeck(format!("{}: missing \"pairs\"", kind.as_str()))
        })
    }

    fn name(&self, kind: RuleKind) -> String {
        self.name.clone().unwrap_or_else(|| kind.as_str().to_string())
    }
}

fn parse_rule(kind: RuleKind, raw: &RawRule) -> Result<Rule, DrcError> {
    let name = raw.name(kind);
    let rule = match kind {
        RuleKind::MinLineWidth => Rule::MinLineWidth {
            name,
            min_width: raw.value(kind)?.as_distance("value")?,
            layers: raw.layers.clone(),
        },
        RuleKind::MaxLineWidth => Rule::MaxLineWidth {
            name,
            max_width: raw.value(kind)?.as_distance("value")?,
            layers: raw.layers.clone(),
        },
        RuleKind::MinClearance => Rule::MinClearance {
            name,
            min_clearance: raw.value(kind)?.as_distance("value")?,
            net1: NetSelector::parse(raw.net1.as_deref().unwrap_or("*")),
            net2: NetSelector::parse(raw.net2.as_deref().unwrap_or("*")),
        },
        RuleKind::MinAnnularRing => Rule::MinAnnularRing {
            name,
            min_ring: raw.value(kind)?.as_distance("value")?,
        },
        RuleKind::MinCopperToBoardEdge => Rule::MinCopperToBoardEdge {
            name,
            min_distance: raw.value(kind)?.as_distance("value")?,
        },
        RuleKind::CopperBalance => {
            let max_percent = match (raw.max_percent, raw.value.as_ref()) {
                (Some(p), _) => p,
                (None, Some(v)) => v.as_number("value")?,
                (None, None) => {
                    return Err(DrcError::RuleDeck(
                        "copper_balance: missing \"max_percent\"".into(),
                    ))
                }
            };
            Rule::CopperBalance {
                name,
                max_percent,
                layers: raw.layers.clone(),
            }
        }
        RuleKind::DiffPairLengthMatch => {
            let tolerance = raw
                .tolerance
                .as_ref()
                .or(raw.value.as_ref())
                .ok_or_else(|| {
                    DrcError::RuleDeck("diff_pair_length_match: missing \"tolerance\"".into())
                })?
                .as_distance("tolerance")?;
            Rule::DiffPairLengthMatch {
                name,
                tolerance,
                pairs: raw.pairs(kind)?,
            }
        }
        RuleKind::ImpedanceSingleEnd => Rule::ImpedanceSingleEnd {
            name,
            target_ohms: raw.value(kind)?.as_number("value")?,
            tolerance_percent: raw
                .tolerance
                .as_ref()
                .map(|t| t.as_number("tolerance"))
                .transpose()?
                .unwrap_or(10.0),
            layers: raw.layers.clone(),
        },
        RuleKind::ImpedanceDiffPair => Rule::ImpedanceDiffPair {
            name,
            target_ohms: raw.value(kind)?.as_number("value")?,
            tolerance_percent: raw
                .tolerance
                .as_ref()
                .map(|t| t.as_number("tolerance"))
                .transpose()?
                .unwrap_or(10.0),
            pairs: raw.pairs(kind)?,
        },
        RuleKind::BackDrillStubLength => Rule::BackDrillStubLength {
            name,
            max_stub: raw.value(kind)?.as_distance("value")?,
        },
    };
    Ok(rule)
}

/// An ordered rule deck. Kinds the dispatcher does not know are kept by
/// name and skipped at check time with a diagnostic, never an error.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    entries: IndexMap<String, Vec<Rule>>,
    unknown: Vec<String>,
}

impl RuleSet {
    pub fn from_json_str(json: &str) -> Result<Self, DrcError> {
        let raw: IndexMap<String, Vec<RawRule>> = serde_json::from_str(json)?;
        let mut entries = IndexMap::new();
        let mut unknown = Vec::new();
        for (kind_name, raw_rules) in raw {
            match RuleKind::from_name(&kind_name) {
                Some(kind) => {
                    let rules = raw_rules
                        .iter()
                        .map(|r| parse_rule(kind, r))
                        .collect::<Result<Vec<_>, _>>()?;
                    entries.insert(kind_name, rules);
                }
                None => unknown.push(kind_name),
            }
        }
        Ok(Self { entries, unknown })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DrcError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Build a deck programmatically, preserving insertion order.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut entries: IndexMap<String, Vec<Rule>> = IndexMap::new();
        for rule in rules {
            entries
                .entry(rule.kind().as_str().to_string())
                .or_default()
                .push(rule);
        }
        Self {
            entries,
            unknown: Vec::new(),
        }
    }

    /// (kind name, rules) in deck order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Rule kinds present in the deck that no handler exists for.
    pub fn unknown_kinds(&self) -> &[String] {
        &self.unknown
    }

    pub fn rule_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.unknown.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::METERS_PER_MIL;

    const DECK: &str = r#"{
        "min_line_width":   [{ "name": "MW", "value": "3.5mil" }],
        "min_clearance":    [{ "name": "CLR", "value": "4mil", "net1": "*", "net2": "*" }],
        "impedance_single_end": [{ "name": "Z0_50", "value": 50, "layers": ["TOP","BOTTOM"], "tolerance": 3 }],
        "impedance_diff_pair":  [{ "name": "Zdiff_90", "value": 90, "pairs": [{"p":"D_P","n":"D_N"}], "tolerance": 3 }],
        "copper_balance":   [{ "name": "CB", "max_percent": 15, "layers": ["L3","L4"] }],
        "frobnicate":       [{ "name": "X", "value": 1 }]
    }"#;

    #[test]
    fn test_deck_order_and_normalization() {
        let deck = RuleSet::from_json_str(DECK).unwrap();
        let kinds: Vec<&str> = deck.iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                "min_line_width",
                "min_clearance",
                "impedance_single_end",
                "impedance_diff_pair",
                "copper_balance"
            ]
        );
        assert_eq!(deck.unknown_kinds(), &["frobnicate".to_string()]);

        let (_, rules) = deck.iter().next().unwrap();
        match &rules[0] {
            Rule::MinLineWidth { min_width, .. } => {
                assert!((min_width - 3.5 * METERS_PER_MIL).abs() < 1e-12);
            }
            other => panic!("unexpected rule {other:?}"),
        }
    }

    #[test]
    fn test_wildcard_selector() {
        let deck = RuleSet::from_json_str(DECK).unwrap();
        let clearance = deck
            .iter()
            .find(|(k, _)| *k == "min_clearance")
            .map(|(_, r)| r[0].clone())
            .unwrap();
        match clearance {
            Rule::MinClearance { net1, net2, .. } => {
                assert_eq!(net1, NetSelector::Any);
                assert!(net2.matches("ANY_NET_AT_ALL"));
            }
            other => panic!("unexpected rule {other:?}"),
        }
    }

    #[test]
    fn test_diff_pair_fields() {
        let deck = RuleSet::from_json_str(DECK).unwrap();
        let rule = deck
            .iter()
            .find(|(k, _)| *k == "impedance_diff_pair")
            .map(|(_, r)| r[0].clone())
            .unwrap();
        match rule {
            Rule::ImpedanceDiffPair {
                target_ohms,
                tolerance_percent,
                pairs,
                ..
            } => {
                assert_eq!(target_ohms, 90.0);
                assert_eq!(tolerance_percent, 3.0);
                assert_eq!(pairs[0].positive, "D_P");
                assert_eq!(pairs[0].negative, "D_N");
            }
            other => panic!("unexpected rule {other:?}"),
        }
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let bad = r#"{ "min_line_width": [{ "name": "MW" }] }"#;
        assert!(RuleSet::from_json_str(bad).is_err());
    }

    #[test]
    fn test_default_rule_name_is_kind() {
        let deck =
            RuleSet::from_json_str(r#"{ "min_annular_ring": [{ "value": "2mil" }] }"#).unwrap();
        let (_, rules) = deck.iter().next().unwrap();
        assert_eq!(rules[0].name(), "min_annular_ring");
    }
}

//! Reduction of the three axis contracts to compliance levels.
//!
//! Each axis is FULL when its success predicate holds, PARTIAL when it was
//! at least exercised, MINIMAL otherwise. The global level is the weakest
//! axis; no axis compensates for another.

use crate::cli_surface::CliContract;
use crate::error::ExtractionFailureKind;
use crate::formula::FormulaContract;
use crate::zones::ZoneContract;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declaration order is the total order: `Minimal < Partial < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceLevel {
    Minimal,
    Partial,
    Full,
}

impl ComplianceLevel {
    pub fn rank(self) -> u8 {
        match self {
            Self::Minimal => 1,
            Self::Partial => 2,
            Self::Full => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "MINIMAL",
            Self::Partial => "PARTIAL",
            Self::Full => "FULL",
        }
    }

    fn assess(full: bool, partial: bool) -> Self {
        if full {
            Self::Full
        } else if partial {
            Self::Partial
        } else {
            Self::Minimal
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisLevels {
    pub cli: ComplianceLevel,
    pub zones: ComplianceLevel,
    pub formula: ComplianceLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub axes: AxisLevels,
    pub global: ComplianceLevel,
    /// `CLI:<level>/ZONES:<level>/FORMULA:<level>`.
    pub summary: String,
}

impl ComplianceSummary {
    pub fn from_axes(axes: AxisLevels) -> Self {
        let global = axes.cli.min(axes.zones).min(axes.formula);
        let summary = format!(
            "CLI:{}/ZONES:{}/FORMULA:{}",
            axes.cli, axes.zones, axes.formula
        );
        Self {
            axes,
            global,
            summary,
        }
    }

    pub fn meets(&self, required: ComplianceLevel) -> bool {
        self.global >= required
    }
}

pub fn cli_level(cli: &CliContract) -> ComplianceLevel {
    let full = cli.help_valid
        && cli.detected_subcommands.len() >= 2
        && cli.missing_flags().is_empty();
    ComplianceLevel::assess(full, cli.help_valid)
}

/// An unrecognized extractor shape degrades the axis to MINIMAL even
/// though extraction was attempted.
pub fn zones_level(zones: &ZoneContract) -> ComplianceLevel {
    let exercised = zones.attempted
        && zones.failure_kind != Some(ExtractionFailureKind::UnrecognizedShape);
    ComplianceLevel::assess(!zones.zones.is_empty(), exercised)
}

pub fn formula_level(formula: &FormulaContract) -> ComplianceLevel {
    ComplianceLevel::assess(formula.passed, formula.attempted)
}

pub fn assess(
    cli: &CliContract,
    zones: &ZoneContract,
    formula: &FormulaContract,
) -> ComplianceSummary {
    ComplianceSummary::from_axes(AxisLevels {
        cli: cli_level(cli),
        zones: zones_level(zones),
        formula: formula_level(formula),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli_surface::CliContractExtractor;
    use crate::config::TauAlias;
    use crate::error::InvocationFailure;
    use crate::zones::{ExtractionMethod, ZoneExtractor, ZoneLiteral};
    use std::path::Path;

    const ALL: [ComplianceLevel; 3] = [
        ComplianceLevel::Minimal,
        ComplianceLevel::Partial,
        ComplianceLevel::Full,
    ];

    fn cli_from(help: &'static str) -> CliContract {
        let source = move |_: &Path| -> Result<String, InvocationFailure> { Ok(help.to_string()) };
        CliContractExtractor::new(TauAlias::Unicode).extract(Path::new("inst.py"), &source)
    }

    fn zones_with(count: usize) -> ZoneContract {
        let mut zones = ZoneExtractor::default().extract(Path::new("/nonexistent/phio/inst.py"));
        zones.attempted = true;
        zones.failure_kind = None;
        zones.extraction_method = ExtractionMethod::Static;
        for idx in 0..count {
            zones
                .zones
                .insert(format!("ZONE_THRESHOLD_{idx}"), ZoneLiteral::Float(idx as f64));
        }
        zones
    }

    #[test]
    fn global_is_minimum_of_axes() {
        for cli in ALL {
            for zones in ALL {
                for formula in ALL {
                    let summary = ComplianceSummary::from_axes(AxisLevels { cli, zones, formula });
                    let expected = ALL
                        .into_iter()
                        .filter(|level| [cli, zones, formula].contains(level))
                        .min()
                        .expect("at least one level");
                    assert_eq!(summary.global, expected);
                    assert_eq!(summary.global.rank(), cli.rank().min(zones.rank()).min(formula.rank()));
                }
            }
        }
    }

    #[test]
    fn weakest_axis_wins_and_serializes_upper_case() {
        let summary = ComplianceSummary::from_axes(AxisLevels {
            cli: ComplianceLevel::Full,
            zones: ComplianceLevel::Full,
            formula: ComplianceLevel::Minimal,
        });
        insta::assert_json_snapshot!(summary, @r#"
        {
          "axes": {
            "cli": "FULL",
            "zones": "FULL",
            "formula": "MINIMAL"
          },
          "global": "MINIMAL",
          "summary": "CLI:FULL/ZONES:FULL/FORMULA:MINIMAL"
        }
        "#);
        assert!(summary.meets(ComplianceLevel::Minimal));
        assert!(!summary.meets(ComplianceLevel::Partial));
    }

    #[test]
    fn cli_levels_follow_help_and_flags() {
        let full = cli_from("new-template score --input --outdir --agg_tau --agg_τ");
        assert_eq!(cli_level(&full), ComplianceLevel::Full);

        let missing_flag = cli_from("new-template score --input --agg_tau --agg_τ");
        assert_eq!(cli_level(&missing_flag), ComplianceLevel::Partial);

        let one_subcommand = cli_from("score --input --outdir --agg_tau --agg_τ");
        assert_eq!(cli_level(&one_subcommand), ComplianceLevel::Partial);

        let empty = cli_from("");
        assert_eq!(cli_level(&empty), ComplianceLevel::Minimal);
    }

    #[test]
    fn zone_levels() {
        assert_eq!(zones_level(&zones_with(3)), ComplianceLevel::Full);
        assert_eq!(zones_level(&zones_with(0)), ComplianceLevel::Partial);

        let mut unrecognized = zones_with(0);
        unrecognized.failure_kind = Some(ExtractionFailureKind::UnrecognizedShape);
        assert_eq!(zones_level(&unrecognized), ComplianceLevel::Minimal);

        let mut unread = zones_with(0);
        unread.attempted = false;
        assert_eq!(zones_level(&unread), ComplianceLevel::Minimal);
    }

    #[test]
    fn formula_levels() {
        assert_eq!(formula_level(&FormulaContract::not_attempted()), ComplianceLevel::Minimal);
        let attempted = FormulaContract {
            attempted: true,
            passed: false,
            error: Some("results.json missing T and/or K_eff".to_string()),
            failure_kind: None,
        };
        assert_eq!(formula_level(&attempted), ComplianceLevel::Partial);
        let passed = FormulaContract {
            passed: true,
            error: None,
            ..attempted
        };
        assert_eq!(formula_level(&passed), ComplianceLevel::Full);
    }
}

//! End-to-end validation run against one target instrument.

use crate::cli_surface::{CliContract, CliContractExtractor, ProcessHelp};
use crate::compliance;
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::formula::{FormulaContract, FormulaVerifier};
use crate::process::{ProcessRunner, TargetLauncher};
use crate::report::{ContractReport, ReportBuilder};
use crate::zones::{
    CommandStrategy, SyntaxTreeStrategy, ZoneContract, ZoneExtractionStrategy, ZoneExtractor,
};
use std::path::Path;

pub struct ContractProbe {
    config: ProbeConfig,
    runner: ProcessRunner,
    launcher: TargetLauncher,
    zone_extractor: ZoneExtractor,
    report_builder: ReportBuilder,
}

impl ContractProbe {
    pub fn new(config: ProbeConfig) -> Self {
        let runner = ProcessRunner::from_secs(config.effective_timeout_secs());
        let launcher = TargetLauncher::new(config.interpreter.clone(), config.tau_alias.target_env());
        let zone_extractor = ZoneExtractor::new(zone_strategy(&config, &runner));
        Self {
            config,
            runner,
            launcher,
            zone_extractor,
            report_builder: ReportBuilder::new(),
        }
    }

    /// Replaces the configured zone strategy.
    pub fn with_zone_strategy(mut self, strategy: Option<Box<dyn ZoneExtractionStrategy>>) -> Self {
        self.zone_extractor = ZoneExtractor::new(strategy);
        self
    }

    pub fn with_report_builder(mut self, builder: ReportBuilder) -> Self {
        self.report_builder = builder;
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn cli_contract(&self, target: &Path) -> CliContract {
        let help = ProcessHelp::new(&self.runner, &self.launcher);
        CliContractExtractor::new(self.config.tau_alias).extract(target, &help)
    }

    pub fn zone_contract(&self, target: &Path) -> ZoneContract {
        self.zone_extractor.extract(target)
    }

    pub fn formula_contract(&self, target: &Path) -> FormulaContract {
        if !self.config.check_formula {
            return FormulaContract::not_attempted();
        }
        FormulaVerifier::new(&self.runner, &self.launcher).verify(target)
    }

    /// Fails only when the target is missing or unreadable; every axis
    /// problem is recorded in the report.
    pub fn generate_report(&self, target: &Path) -> Result<ContractReport, ProbeError> {
        ensure_target(target)?;

        let cli = self.cli_contract(target);
        tracing::info!(
            instrument = %target.display(),
            level = %compliance::cli_level(&cli),
            help_valid = cli.help_valid,
            "cli axis assessed"
        );

        let zones = self.zone_contract(target);
        tracing::info!(
            instrument = %target.display(),
            level = %compliance::zones_level(&zones),
            method = ?zones.extraction_method,
            pattern = %zones.source_pattern,
            "zones axis assessed"
        );

        let formula = self.formula_contract(target);
        tracing::info!(
            instrument = %target.display(),
            level = %compliance::formula_level(&formula),
            attempted = formula.attempted,
            "formula axis assessed"
        );

        self.report_builder.build(target, cli, zones, formula)
    }
}

pub fn ensure_target(target: &Path) -> Result<(), ProbeError> {
    if target.is_file() {
        Ok(())
    } else {
        Err(ProbeError::TargetNotFound {
            path: target.display().to_string(),
        })
    }
}

/// External command first, then the built-in syntax tree, else none.
fn zone_strategy(
    config: &ProbeConfig,
    runner: &ProcessRunner,
) -> Option<Box<dyn ZoneExtractionStrategy>> {
    if let Some(command) = config.zone_extractor.as_deref()
        && let Some(strategy) = CommandStrategy::from_command(command, runner.clone())
    {
        return Some(Box::new(strategy));
    }
    if config.static_analysis {
        return Some(Box::new(SyntaxTreeStrategy::default()));
    }
    None
}

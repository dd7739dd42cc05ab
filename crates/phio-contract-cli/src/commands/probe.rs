use crate::cli::{RequireLevelArg, TargetArgs, ZoneArgs};
use crate::support;
use phio_contract::{ComplianceLevel, ContractProbe, ContractReport};
use std::path::{Path, PathBuf};

pub struct Args {
    pub instrument: String,
    pub out: String,
    pub check_formula: bool,
    pub target: TargetArgs,
    pub zones: ZoneArgs,
    pub require: Option<RequireLevelArg>,
    pub json: bool,
}

pub fn run(args: Args) {
    let config = support::resolve_probe_config_or_exit(&args.target, &args.zones, args.check_formula);
    let instrument = support::resolve_instrument_or_exit(&args.instrument);

    let report = ContractProbe::new(config)
        .generate_report(&instrument)
        .unwrap_or_else(|err| {
            eprintln!("error: {err}");
            std::process::exit(2);
        });

    let out = PathBuf::from(&args.out);
    report.write(&out).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    if args.json {
        println!("{}", support::render_json_or_exit(&report, "contract report"));
    } else {
        print_human_summary(&report, &out);
    }

    if let Some(required) = args.require {
        let required = ComplianceLevel::from(required);
        if !report.compliance.meets(required) {
            eprintln!(
                "error: global compliance {} is below required {required}",
                report.compliance.global
            );
            std::process::exit(1);
        }
    }
}

fn print_human_summary(report: &ContractReport, out: &Path) {
    println!("phio-contract probe");
    println!("  Instrument: {}", report.instrument_path);
    println!("  Hash: {}", report.instrument_hash);
    println!("  Contract Version: {}", report.contract_version);
    println!(
        "  CLI: {} (help_valid={}, subcommands={}, missing_flags=[{}])",
        report.compliance.axes.cli,
        report.cli.help_valid,
        report.cli.detected_subcommands.len(),
        report.cli.missing_flags().join(", ")
    );
    println!(
        "  Zones: {} (method={}, pattern={}, zones={})",
        report.compliance.axes.zones,
        report.zones.extraction_method.as_str(),
        report.zones.source_pattern,
        report.zones.zones.len()
    );
    println!(
        "  Formula: {} (attempted={}, passed={})",
        report.compliance.axes.formula, report.formula.attempted, report.formula.passed
    );
    for (axis, error) in [
        ("cli", report.cli.error.as_deref()),
        ("zones", report.zones.error.as_deref()),
        ("formula", report.formula.error.as_deref()),
    ] {
        if let Some(error) = error {
            println!("  Error ({axis}): {error}");
        }
    }
    println!("  Global: {}", report.compliance.global);
    println!("  Summary: {}", report.compliance.summary);
    println!("Wrote contract report to: {}", out.display());
}

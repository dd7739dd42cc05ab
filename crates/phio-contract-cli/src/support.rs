use crate::cli::{TargetArgs, ZoneArgs};
use phio_contract::{ProbeConfig, TauAlias};
use std::path::{Path, PathBuf};

/// Legacy toggle, read once here and never below this layer.
pub const ASCII_TAU_ENV: &str = "PHIO_FORCE_ASCII_TAU";

pub fn load_config_or_exit(path: Option<&str>) -> ProbeConfig {
    let Some(path) = path else {
        return ProbeConfig::default();
    };
    ProbeConfig::load_toml(path).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    })
}

/// Config file, then flags, then the legacy environment toggle.
pub fn resolve_probe_config_or_exit(
    target: &TargetArgs,
    zones: &ZoneArgs,
    check_formula: bool,
) -> ProbeConfig {
    let mut config = load_config_or_exit(target.config.as_deref());
    apply_target_args(&mut config, target, legacy_ascii_tau());
    apply_zone_args(&mut config, zones);
    if check_formula {
        config.check_formula = true;
    }
    tracing::debug!(config = ?config, "resolved probe config");
    config
}

pub fn apply_target_args(config: &mut ProbeConfig, args: &TargetArgs, legacy_ascii_tau: bool) {
    if args.direct {
        config.interpreter = None;
    } else if let Some(interpreter) = &args.interpreter {
        config.interpreter = Some(interpreter.clone());
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    if args.ascii_tau || legacy_ascii_tau {
        config.tau_alias = TauAlias::Ascii;
    }
}

pub fn apply_zone_args(config: &mut ProbeConfig, args: &ZoneArgs) {
    if let Some(program) = &args.zone_extractor {
        let mut command = vec![program.clone()];
        command.extend(args.zone_extractor_args.iter().cloned());
        config.zone_extractor = Some(command);
    }
    if args.no_static {
        config.static_analysis = false;
    }
}

fn legacy_ascii_tau() -> bool {
    std::env::var(ASCII_TAU_ENV).is_ok_and(|value| value == "1")
}

pub fn resolve_instrument_or_exit(instrument: &str) -> PathBuf {
    let path = Path::new(instrument);
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !resolved.is_file() {
        eprintln!("error: instrument not found: {}", resolved.display());
        std::process::exit(2);
    }
    resolved
}

pub fn render_json_or_exit<T: serde::Serialize>(value: &T, what: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| {
        eprintln!("error: failed to render {what} JSON: {err}");
        std::process::exit(2);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let mut config = ProbeConfig::default();
        let args = TargetArgs {
            interpreter: Some("sh".to_string()),
            timeout_secs: Some(5),
            ..TargetArgs::default()
        };
        apply_target_args(&mut config, &args, false);
        assert_eq!(config.interpreter.as_deref(), Some("sh"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.tau_alias, TauAlias::Unicode);

        let direct = TargetArgs {
            direct: true,
            ..TargetArgs::default()
        };
        apply_target_args(&mut config, &direct, true);
        assert!(config.interpreter.is_none());
        assert_eq!(config.tau_alias, TauAlias::Ascii);
    }

    #[test]
    fn zone_args_build_extractor_command() {
        let mut config = ProbeConfig::default();
        let args = ZoneArgs {
            zone_extractor: Some("python3".to_string()),
            zone_extractor_args: vec!["tests/contracts.py".to_string()],
            no_static: true,
        };
        apply_zone_args(&mut config, &args);
        assert_eq!(
            config.zone_extractor,
            Some(vec!["python3".to_string(), "tests/contracts.py".to_string()])
        );
        assert!(!config.static_analysis);
    }
}

use crate::cli::ZoneArgs;
use crate::support;
use phio_contract::{ContractProbe, ZoneContract, compliance};

pub fn run(instrument: String, config: Option<String>, zones: ZoneArgs, json_output: bool) {
    let mut probe_config = support::load_config_or_exit(config.as_deref());
    support::apply_zone_args(&mut probe_config, &zones);
    let instrument = support::resolve_instrument_or_exit(&instrument);

    let contract = ContractProbe::new(probe_config).zone_contract(&instrument);

    if json_output {
        println!("{}", support::render_json_or_exit(&contract, "zone contract"));
    } else {
        print_human_summary(&instrument.display().to_string(), &contract);
    }
}

fn print_human_summary(instrument: &str, contract: &ZoneContract) {
    println!("phio-contract zones");
    println!("  Instrument: {instrument}");
    println!("  Level: {}", compliance::zones_level(contract));
    println!("  Method: {}", contract.extraction_method.as_str());
    println!("  Pattern: {}", contract.source_pattern);
    if let Some(strategy) = &contract.strategy {
        println!("  Strategy: {strategy}");
    }
    if let Some(name) = &contract.name {
        println!("  Name: {name}");
    }
    println!("  Zones: {}", contract.zones.len());
    for (key, value) in contract.zones.iter() {
        let rendered = serde_json::to_string(value).unwrap_or_default();
        println!("    - {key}: {rendered}");
    }
    if !contract.if_chain.is_empty() {
        println!("  If Chain:");
        for link in &contract.if_chain {
            println!(
                "    - {:?} {} -> {}",
                link.comparator, link.threshold, link.label
            );
        }
    }
    if let Some(reason) = &contract.fallback_reason {
        println!("  Fallback Reason: {reason}");
    }
    if let Some(error) = &contract.error {
        println!("  Error: {error}");
    }
}

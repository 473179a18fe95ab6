//! Stages command - list the registry contents.

use anyhow::Result;
use grainflow::stage::StageRegistry;

/// One line per factory, in registration order.
pub fn listing(registry: &StageRegistry) -> Vec<String> {
    registry
        .factories()
        .map(|f| {
            let info = f.info();
            format!(
                "{:<12} {:<18} {:<22} {} {}",
                info.group, info.subgroup, info.class_name, info.uuid, info.human_label
            )
        })
        .collect()
}

/// Run the stages command.
pub fn run() -> Result<()> {
    let registry = grainflow::default_registry()?;
    println!(
        "{:<12} {:<18} {:<22} {:<36} LABEL",
        "GROUP", "SUBGROUP", "CLASS", "UUID"
    );
    for line in listing(&registry) {
        println!("{line}");
    }
    Ok(())
}

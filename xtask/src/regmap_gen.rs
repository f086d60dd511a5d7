// Licensed under the Apache-2.0 license

//! Command that turns per-core register maps into one annotated map.

use anyhow::{bail, Context, Result};
use mcu_registers_regmap::{normalize, Config, CorePrefixes, Device};
use std::path::{Path, PathBuf};

pub struct Options {
    pub core1: PathBuf,
    pub core2: Option<PathBuf>,
    pub config: Option<PathBuf>,
    /// Primary and secondary prefixes given on the command line.
    pub cores: Option<(String, String)>,
    pub strip_register_prefixes: bool,
    pub output: Option<PathBuf>,
}

/// Load, merge, normalize and cluster, then write the result as JSON.
///
/// Nothing is written unless every input loads and validates.
pub fn generate(options: &Options) -> Result<()> {
    let mut config = match &options.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some((primary, secondary)) = &options.cores {
        config.cores = Some(CorePrefixes::new(primary, secondary)?);
    }
    if options.strip_register_prefixes {
        config.strip_register_prefixes = true;
    }
    if options.core2.is_some() && config.cores.is_none() {
        bail!("a second core needs core prefixes (--primary/--secondary or [cores] in the config)");
    }

    println!("Loading core 1 from: {}", options.core1.display());
    let core1 = load_device(&options.core1)?;
    let core2 = match &options.core2 {
        Some(path) => {
            println!("Loading core 2 from: {}", path.display());
            Some(load_device(path)?)
        }
        None => None,
    };

    let output = normalize(Some(core1), core2, &config)?;
    println!(
        "{} peripherals ({} entities), {} families, {} rolled back",
        output.device.peripherals.len(),
        output.device.entity_count(),
        output.dimensions.len(),
        output.dimensions.rollbacks().len()
    );
    for family in &output.dimensions {
        println!("  {} [{}]", family.key, family.extent);
    }

    let json = serde_json::to_string_pretty(&output)?;
    if let Some(path) = &options.output {
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Output written to: {}", path.display());
    } else {
        println!("{json}");
    }
    Ok(())
}

fn load_device(path: &Path) -> Result<Device> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let device: Device = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    device
        .validate()
        .with_context(|| format!("invalid register map {}", path.display()))?;
    Ok(device)
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcu_registers_regmap::Output;
    use std::fs;

    const CORE: &str = r#"{
        "name": "STM32H745",
        "peripherals": [
            { "name": "USART1", "base_address": 1073811456,
              "registers": [{ "name": "CR1", "address_offset": 0, "size": 32 }] },
            { "name": "USART2", "base_address": 1073759232,
              "registers": [{ "name": "CR1", "address_offset": 0, "size": 32 }] }
        ]
    }"#;

    fn options(dir: &Path) -> Options {
        Options {
            core1: dir.join("cm7.json"),
            core2: None,
            config: None,
            cores: None,
            strip_register_prefixes: false,
            output: Some(dir.join("out.json")),
        }
    }

    #[test]
    fn test_single_core_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cm7.json"), CORE).unwrap();

        generate(&options(dir.path())).unwrap();
        let text = fs::read_to_string(dir.path().join("out.json")).unwrap();
        let out: Output = serde_json::from_str(&text).unwrap();
        assert_eq!(out.dimensions.len(), 1);
        assert_eq!(out.device.peripherals[1].dim.as_ref().unwrap().template, "USARTx");
    }

    #[test]
    fn test_dual_core_with_toml_policy() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cm7.json"), CORE).unwrap();
        fs::write(dir.path().join("cm4.json"), CORE).unwrap();
        fs::write(
            dir.path().join("policy.toml"),
            r#"
strip_register_prefixes = false

[cores]
primary = "CM7"
secondary = "CM4"

[cluster.peripherals]
min_members = 3
"#,
        )
        .unwrap();

        let mut options = options(dir.path());
        options.core2 = Some(dir.path().join("cm4.json"));
        options.config = Some(dir.path().join("policy.toml"));
        generate(&options).unwrap();

        let text = fs::read_to_string(dir.path().join("out.json")).unwrap();
        let out: Output = serde_json::from_str(&text).unwrap();
        assert_eq!(out.device.peripherals.len(), 2);
        assert!(out.dimensions.is_empty());
        assert_eq!(out.dimensions.rollbacks().len(), 1);
    }

    #[test]
    fn test_second_core_needs_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cm7.json"), CORE).unwrap();
        let mut options = options(dir.path());
        options.core2 = Some(dir.path().join("cm7.json"));
        assert!(generate(&options).is_err());
        assert!(!dir.path().join("out.json").exists());
    }

    #[test]
    fn test_malformed_map_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cm7.json"),
            r#"{ "name": "dev", "peripherals": [
                { "name": "A", "base_address": 0,
                  "registers": [{ "name": "R", "address_offset": 0, "size": 12 }] }
            ] }"#,
        )
        .unwrap();
        assert!(generate(&options(dir.path())).is_err());
        assert!(!dir.path().join("out.json").exists());
    }
}

// Licensed under the Apache-2.0 license

use crate::cluster::cluster;
use crate::config::Config;
use crate::dims::Dimensions;
use crate::error::{Error, Result};
use crate::model::Device;
use crate::normalize::{strip_register_prefixes, tidy_descriptions};
use crate::reconcile::merge;
use log::info;
use serde::{Deserialize, Serialize};

/// What the renderer receives: the annotated device and its dimension tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub device: Device,
    pub dimensions: Dimensions,
}

/// Run the whole pipeline: merge (dual-core only), normalize, cluster.
///
/// `core2` is only consulted when `config.cores` is set; a missing map for a
/// core that is needed fails before anything is touched.
pub fn normalize(core1: Option<Device>, core2: Option<Device>, config: &Config) -> Result<Output> {
    config.cluster.check()?;
    let core1 = core1.ok_or(Error::MissingCore { core: 1 })?;

    let mut device = match &config.cores {
        Some(prefixes) => {
            let core2 = core2.ok_or(Error::MissingCore { core: 2 })?;
            merge(core1, core2, prefixes)
        }
        None => core1,
    };

    if config.tidy_descriptions {
        tidy_descriptions(&mut device);
    }
    if config.strip_register_prefixes {
        let renamed = strip_register_prefixes(&mut device);
        info!("stripped peripheral prefixes from {renamed} register names");
    }

    let dimensions = cluster(&mut device, &config.cluster);
    Ok(Output { device, dimensions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorePrefixes;
    use crate::model::{Peripheral, Register};

    fn device() -> Device {
        Device {
            name: "dev".into(),
            peripherals: vec![Peripheral {
                name: "TIM2".into(),
                registers: vec![Register {
                    name: "TIM_CR1".into(),
                    size: 32,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_cores() {
        assert_eq!(
            normalize(None, None, &Config::single_core()),
            Err(Error::MissingCore { core: 1 })
        );
        let dual = Config::dual_core(CorePrefixes::new("CM7", "CM4").unwrap());
        assert_eq!(
            normalize(Some(device()), None, &dual),
            Err(Error::MissingCore { core: 2 })
        );
    }

    #[test]
    fn test_single_core_ignores_second_map() {
        let out = normalize(Some(device()), None, &Config::single_core()).unwrap();
        assert_eq!(out.device, device());
        assert!(out.dimensions.is_empty());
    }

    #[test]
    fn test_strip_register_prefixes_toggle() {
        let config = Config::single_core().strip_register_prefixes(true);
        let out = normalize(Some(device()), None, &config).unwrap();
        assert_eq!(out.device.peripherals[0].registers[0].name, "CR1");
    }

    #[test]
    fn test_bad_config_rejected() {
        let config = Config::single_core()
            .cluster(crate::config::ClusterConfig::with_defaults().placeholder('1'));
        assert!(matches!(
            normalize(Some(device()), None, &config),
            Err(Error::Config(_))
        ));
    }
}

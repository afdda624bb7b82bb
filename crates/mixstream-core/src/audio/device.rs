//! Output device resolution and listing
//!
//! Devices are addressed by host API name plus device name. Giving both picks
//! that exact device; giving neither picks the system default output device.
//! Giving only one of the two is an error, since the same device name can
//! appear under several host APIs (e.g. a card listed by both ALSA and JACK).

use super::backend::{AudioHost, DeviceInfo};
use super::config::DeviceSelector;
use super::error::{DeviceResolutionError, MixerResult};

/// Resolve a selector to a concrete output device
pub fn resolve_output_device<H>(host: &H, selector: &DeviceSelector) -> MixerResult<DeviceInfo>
where
    H: AudioHost + ?Sized,
{
    match (selector.host_api(), selector.device_name()) {
        (None, None) => {
            let device = host.default_output_device()?;
            log::debug!("Resolved system default output device: {}", device.id);
            Ok(device)
        }
        (Some(host_api), None) => Err(DeviceResolutionError::DeviceRequired {
            host_api: host_api.to_string(),
        }
        .into()),
        (None, Some(device)) => Err(DeviceResolutionError::HostApiRequired {
            device: device.to_string(),
        }
        .into()),
        (Some(host_api), Some(name)) => {
            let devices = host.output_devices(host_api)?;
            let device = devices
                .into_iter()
                .find(|d| d.max_output_channels > 0 && d.id.name == name)
                .ok_or_else(|| DeviceResolutionError::DeviceNotFound {
                    device: name.to_string(),
                    host_api: host_api.to_string(),
                })?;
            log::debug!("Resolved output device: {}", device.id);
            Ok(device)
        }
    }
}

/// Names of every host API available on this system
pub fn list_host_apis<H>(host: &H) -> MixerResult<Vec<String>>
where
    H: AudioHost + ?Sized,
{
    host.host_api_names()
}

/// Names of the output-capable devices under a host API
pub fn list_output_device_names<H>(host: &H, host_api: &str) -> MixerResult<Vec<String>>
where
    H: AudioHost + ?Sized,
{
    Ok(host
        .output_devices(host_api)?
        .into_iter()
        .filter(|d| d.max_output_channels > 0)
        .map(|d| d.id.name)
        .collect())
}

/// Every output device across every host API, default devices first
///
/// Host APIs that fail to enumerate are skipped with a debug log, so one
/// broken backend does not hide the others.
pub fn list_all_output_devices<H>(host: &H) -> MixerResult<Vec<DeviceInfo>>
where
    H: AudioHost + ?Sized,
{
    let mut all_devices = Vec::new();
    for host_api in host.host_api_names()? {
        match host.output_devices(&host_api) {
            Ok(devices) => all_devices.extend(devices),
            Err(e) => log::debug!("Could not enumerate devices for {}: {}", host_api, e),
        }
    }

    all_devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.id.host_api.cmp(&b.id.host_api))
            .then_with(|| a.id.name.cmp(&b.id.name))
    });

    Ok(all_devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::error::MixerError;
    use crate::audio::offline::{OfflineDevice, OfflineHost};

    fn host() -> OfflineHost {
        OfflineHost::new()
            .with_device(OfflineDevice::new("ALSA", "hw:0,0").channels(2).default_device())
            .with_device(OfflineDevice::new("ALSA", "hw:1,0").channels(8))
            .with_device(OfflineDevice::new("ALSA", "Line In").channels(0))
            .with_device(OfflineDevice::new("JACK", "system").channels(2))
    }

    #[test]
    fn test_neither_selects_default() {
        let device = resolve_output_device(&host(), &DeviceSelector::system_default()).unwrap();
        assert_eq!(device.id.name, "hw:0,0");
        assert!(device.is_default);
    }

    #[test]
    fn test_both_selects_named_device() {
        let device = resolve_output_device(&host(), &DeviceSelector::new("ALSA", "hw:1,0")).unwrap();
        assert_eq!(device.id.host_api, "ALSA");
        assert_eq!(device.max_output_channels, 8);
    }

    #[test]
    fn test_device_without_host_api_is_rejected() {
        let selector = DeviceSelector {
            host_api: None,
            device_name: Some("hw:0,0".to_string()),
        };
        let err = resolve_output_device(&host(), &selector).unwrap_err();
        assert_eq!(
            err,
            MixerError::DeviceResolution(DeviceResolutionError::HostApiRequired {
                device: "hw:0,0".to_string()
            })
        );
    }

    #[test]
    fn test_host_api_without_device_is_rejected() {
        let selector = DeviceSelector {
            host_api: Some("ALSA".to_string()),
            device_name: None,
        };
        let err = resolve_output_device(&host(), &selector).unwrap_err();
        assert!(matches!(
            err,
            MixerError::DeviceResolution(DeviceResolutionError::DeviceRequired { .. })
        ));
    }

    #[test]
    fn test_unknown_device_and_input_only_device_not_found() {
        for name in ["missing", "Line In"] {
            let err = resolve_output_device(&host(), &DeviceSelector::new("ALSA", name)).unwrap_err();
            assert!(matches!(
                err,
                MixerError::DeviceResolution(DeviceResolutionError::DeviceNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_device_is_scoped_to_its_host_api() {
        let err = resolve_output_device(&host(), &DeviceSelector::new("JACK", "hw:0,0")).unwrap_err();
        assert!(matches!(
            err,
            MixerError::DeviceResolution(DeviceResolutionError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn test_listing() {
        let host = host();
        assert_eq!(list_host_apis(&host).unwrap(), vec!["ALSA", "JACK"]);
        assert_eq!(
            list_output_device_names(&host, "ALSA").unwrap(),
            vec!["hw:0,0", "hw:1,0"]
        );

        let all = list_all_output_devices(&host).unwrap();
        assert_eq!(all[0].id.name, "hw:0,0");
        assert_eq!(all.len(), 4);
    }
}

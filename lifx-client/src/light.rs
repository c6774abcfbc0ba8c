//! Operations on a single light.
//!
//! Every operation that changes something validates its arguments first (kelvin range,
//! transition time, zone range) and asks the device for an acknowledgement.  Queries ask for a
//! response and decode it into a typed value.

use chrono::Duration;
use lifx_core::{
    spread_colors, spread_runs, ApplicationRequest, FirmwareVersion, LifxString, Message,
    ZonePages, ZoneRange, EXTENDED_ZONE_COLORS, HSBK,
};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::manager::Device;
use crate::snapshot::LightSnapshot;

/// Converts a transition time into the milliseconds used on the wire.
///
/// Negative durations and durations longer than `u32::MAX` milliseconds are rejected.
pub fn transition_millis(transition: Duration) -> std::result::Result<u32, lifx_core::Error> {
    let millis = transition.num_milliseconds();
    if transition < Duration::zero() {
        return Err(lifx_core::Error::DurationOutOfRange(millis.min(-1)));
    }
    u32::try_from(millis).map_err(|_| lifx_core::Error::DurationOutOfRange(millis))
}

/// Reply to [Client::get_light_state].
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    pub color: HSBK,
    pub on: bool,
    pub label: String,
}

/// Reply to [Client::get_version].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
}

/// Reply to [Client::get_host_firmware].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostFirmware {
    /// Firmware build time (absolute time in nanoseconds since epoch)
    pub build: u64,
    pub version: u32,
}

impl HostFirmware {
    pub fn firmware(&self) -> FirmwareVersion {
        FirmwareVersion::from(self.version)
    }
}

/// Reply to [Client::get_color_zones].
///
/// `colors` only holds the zones that exist on the device, starting at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneWindow {
    pub count: u8,
    pub index: u8,
    pub colors: Vec<HSBK>,
}

/// Reply to [Client::get_extended_color_zones].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedZones {
    pub zones_count: u16,
    pub zone_index: u16,
    pub colors: Vec<HSBK>,
}

fn validate_colors(colors: &[HSBK]) -> std::result::Result<(), lifx_core::Error> {
    if colors.is_empty() {
        return Err(lifx_core::Error::NoColors);
    }
    colors.iter().try_for_each(HSBK::validate)
}

impl Client {
    /// Turns a light on or off.
    pub async fn set_power(&self, device: &Device, on: bool, transition: Duration) -> Result<()> {
        let duration = transition_millis(transition)?;
        let level = if on { u16::MAX } else { 0 };
        self.acked(device, Message::LightSetPower { level, duration })
            .await
    }

    pub async fn get_power(&self, device: &Device) -> Result<bool> {
        match self.query(device, Message::LightGetPower).await? {
            Message::LightStatePower { level } => Ok(level > 0),
            other => Err(Error::unexpected("LightStatePower", &other)),
        }
    }

    pub async fn set_color(&self, device: &Device, color: HSBK, transition: Duration) -> Result<()> {
        color.validate()?;
        let duration = transition_millis(transition)?;
        self.acked(
            device,
            Message::LightSetColor {
                reserved: 0,
                color,
                duration,
            },
        )
        .await
    }

    /// Sets the color from RGB components.  See [HSBK::from_rgb].
    pub async fn set_color_rgb(
        &self,
        device: &Device,
        (red, green, blue): (u8, u8, u8),
        kelvin: u16,
        transition: Duration,
    ) -> Result<()> {
        self.set_color(device, HSBK::from_rgb(red, green, blue, kelvin), transition)
            .await
    }

    pub async fn get_light_state(&self, device: &Device) -> Result<LightState> {
        match self.query(device, Message::LightGet).await? {
            Message::LightState {
                color,
                power,
                label,
                ..
            } => Ok(LightState {
                color,
                on: power > 0,
                label: label.0,
            }),
            other => Err(Error::unexpected("LightState", &other)),
        }
    }

    pub async fn set_zone(
        &self,
        device: &Device,
        index: u8,
        color: HSBK,
        transition: Duration,
        apply: ApplicationRequest,
    ) -> Result<()> {
        self.set_zone_range(device, index, index, color, transition, apply)
            .await
    }

    /// Sets zones `start..=end` to one color.
    pub async fn set_zone_range(
        &self,
        device: &Device,
        start: u8,
        end: u8,
        color: HSBK,
        transition: Duration,
        apply: ApplicationRequest,
    ) -> Result<()> {
        ZoneRange::new(start as u16, end as u16)?;
        color.validate()?;
        let duration = transition_millis(transition)?;
        self.acked(
            device,
            Message::SetColorZones {
                start_index: start,
                end_index: end,
                color,
                duration,
                apply,
            },
        )
        .await
    }

    /// Reads one window of zones, as returned by a single reply.
    pub async fn get_color_zones(&self, device: &Device, start: u8, end: u8) -> Result<ZoneWindow> {
        ZoneRange::new(start as u16, end as u16)?;
        let (count, index, colors) = match self
            .query(
                device,
                Message::GetColorZones {
                    start_index: start,
                    end_index: end,
                },
            )
            .await?
        {
            Message::StateMultiZone {
                count,
                index,
                colors,
            } => (count, index, colors.to_vec()),
            Message::StateZone {
                count,
                index,
                color,
            } => (count, index, vec![color]),
            other => return Err(Error::unexpected("StateMultiZone", &other)),
        };
        let valid = (count as usize)
            .saturating_sub(index as usize)
            .min(colors.len());
        Ok(ZoneWindow {
            count,
            index,
            colors: colors[..valid].to_vec(),
        })
    }

    /// Reads every zone of a legacy multizone device, eight at a time.
    pub async fn get_all_color_zones(&self, device: &Device) -> Result<Vec<HSBK>> {
        let mut pages = ZonePages::new();
        while let Some((start, end)) = pages.next_window() {
            let reply = self
                .query(
                    device,
                    Message::GetColorZones {
                        start_index: start,
                        end_index: end,
                    },
                )
                .await?;
            pages.accept(&reply)?;
        }
        Ok(pages.into_colors())
    }

    /// Sets consecutive zones starting at `zone_index`, one color per zone.
    ///
    /// Palettes longer than fits in one message are sent as several messages.
    pub async fn set_extended_color_zones(
        &self,
        device: &Device,
        zone_index: u16,
        colors: &[HSBK],
        transition: Duration,
    ) -> Result<()> {
        validate_colors(colors)?;
        let duration = transition_millis(transition)?;
        if zone_index as usize + colors.len() > u16::MAX as usize + 1 {
            return Err(lifx_core::Error::TooManyColors(colors.len()).into());
        }

        for (chunk_idx, chunk) in colors.chunks(EXTENDED_ZONE_COLORS).enumerate() {
            let start = zone_index as usize + chunk_idx * EXTENDED_ZONE_COLORS;
            self.acked(
                device,
                Message::SetExtendedColorZones {
                    duration,
                    apply: ApplicationRequest::Apply,
                    zone_index: start as u16,
                    colors: chunk.to_vec(),
                },
            )
            .await?;
        }
        Ok(())
    }

    pub async fn get_extended_color_zones(&self, device: &Device) -> Result<ExtendedZones> {
        match self.query(device, Message::GetExtendedColorZones).await? {
            Message::StateExtendedColorZones {
                zones_count,
                zone_index,
                colors,
            } => Ok(ExtendedZones {
                zones_count,
                zone_index,
                colors,
            }),
            other => Err(Error::unexpected("StateExtendedColorZones", &other)),
        }
    }

    /// The zones of an extended multizone device, trimmed to the zones it actually has.
    pub(crate) async fn get_all_extended_color_zones(&self, device: &Device) -> Result<Vec<HSBK>> {
        let reply = self.get_extended_color_zones(device).await?;
        let mut colors = reply.colors;
        colors.truncate((reply.zones_count as usize).saturating_sub(reply.zone_index as usize));
        Ok(colors)
    }

    pub async fn get_version(&self, device: &Device) -> Result<Version> {
        match self.query(device, Message::GetVersion).await? {
            Message::StateVersion {
                vendor,
                product,
                version,
            } => Ok(Version {
                vendor,
                product,
                version,
            }),
            other => Err(Error::unexpected("StateVersion", &other)),
        }
    }

    pub async fn get_host_firmware(&self, device: &Device) -> Result<HostFirmware> {
        match self.query(device, Message::GetHostFirmware).await? {
            Message::StateHostFirmware { build, version, .. } => Ok(HostFirmware { build, version }),
            other => Err(Error::unexpected("StateHostFirmware", &other)),
        }
    }

    pub async fn get_label(&self, device: &Device) -> Result<String> {
        match self.query(device, Message::GetLabel).await? {
            Message::StateLabel { label } => Ok(label.0),
            other => Err(Error::unexpected("StateLabel", &other)),
        }
    }

    /// Renames a device.  Labels longer than 32 bytes are truncated.
    pub async fn set_label(&self, device: &Device, label: &str) -> Result<()> {
        self.acked(
            device,
            Message::SetLabel {
                label: LifxString::new(label),
            },
        )
        .await
    }

    /// Paints a palette across a light.
    ///
    /// Extended multizone lights get the palette spread over all their zones in one go, legacy
    /// multizone lights get one [Message::SetColorZones] per color, and anything else is set to
    /// the first color.
    pub async fn set_colors(
        &self,
        light: &LightSnapshot,
        colors: &[HSBK],
        transition: Duration,
    ) -> Result<()> {
        validate_colors(colors)?;
        transition_millis(transition)?;

        let device = light.device();
        let zones = light.zone_count();
        if light.supports_extended_multizone() && zones > 0 {
            let palette = spread_colors(colors, zones);
            self.set_extended_color_zones(device, 0, &palette, transition)
                .await
        } else if light.supports_multizone() && zones > 0 {
            let runs = spread_runs(colors.len(), zones);
            // check every run before changing anything
            let bounds = runs
                .iter()
                .map(ZoneRange::legacy_bounds)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for ((start, end), color) in bounds.into_iter().zip(colors) {
                self.set_zone_range(
                    device,
                    start,
                    end,
                    *color,
                    transition,
                    ApplicationRequest::Apply,
                )
                .await?;
            }
            Ok(())
        } else {
            self.set_color(device, colors[0], transition).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_bounds() {
        assert_eq!(transition_millis(Duration::zero()).unwrap(), 0);
        assert_eq!(transition_millis(Duration::milliseconds(1500)).unwrap(), 1500);
        assert_eq!(
            transition_millis(Duration::milliseconds(u32::MAX as i64)).unwrap(),
            u32::MAX
        );
        assert!(matches!(
            transition_millis(Duration::milliseconds(u32::MAX as i64 + 1)),
            Err(lifx_core::Error::DurationOutOfRange(_))
        ));
        assert!(matches!(
            transition_millis(Duration::milliseconds(-1)),
            Err(lifx_core::Error::DurationOutOfRange(-1))
        ));
    }

    #[test]
    fn color_validation() {
        assert!(matches!(validate_colors(&[]), Err(lifx_core::Error::NoColors)));
        assert!(validate_colors(&[HSBK::new(0, 0, 0, 3500)]).is_ok());
        assert!(matches!(
            validate_colors(&[HSBK::new(0, 0, 0, 3500), HSBK::new(0, 0, 0, 9001)]),
            Err(lifx_core::Error::KelvinOutOfRange(9001))
        ));
    }
}

use lifx_core::{FirmwareVersion, Product, HSBK};

use crate::manager::Device;

/// Everything [crate::Client::resolve] learned about a light, at the time it asked.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSnapshot {
    pub(crate) device: Device,
    pub(crate) label: String,
    pub(crate) power: bool,
    pub(crate) color: HSBK,
    pub(crate) vendor: u32,
    pub(crate) product_id: u32,
    pub(crate) firmware: FirmwareVersion,
    pub(crate) product: Option<Product>,
    pub(crate) zones: Option<Vec<HSBK>>,
    pub(crate) extended_multizone: bool,
}

impl LightSnapshot {
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// A stable identifier for the light, its MAC address.
    pub fn id(&self) -> String {
        self.device.mac()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_on(&self) -> bool {
        self.power
    }

    pub fn color(&self) -> HSBK {
        self.color
    }

    pub fn vendor(&self) -> u32 {
        self.vendor
    }

    pub fn product_id(&self) -> u32 {
        self.product_id
    }

    pub fn firmware(&self) -> FirmwareVersion {
        self.firmware
    }

    /// Catalog entry for this light.  `None` if the catalog doesn't know the product.
    pub fn product(&self) -> Option<&Product> {
        self.product.as_ref()
    }

    /// Per-zone colors, for multizone lights.
    pub fn zones(&self) -> Option<&[HSBK]> {
        self.zones.as_deref()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.as_ref().map_or(0, Vec::len)
    }

    pub fn supports_multizone(&self) -> bool {
        self.product.as_ref().map_or(false, |p| p.features.multizone)
    }

    pub fn supports_extended_multizone(&self) -> bool {
        self.extended_multizone
    }
}

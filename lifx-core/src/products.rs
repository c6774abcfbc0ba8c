use serde::Deserialize;
use std::fmt;
use std::io::Read;
use std::sync::OnceLock;

use crate::Error;

/// Catalog bundled with this crate.
///
/// Data is taken from https://github.com/LIFX/products/blob/master/products.json
const BUNDLED_PRODUCTS: &str = include_str!("../products.json");

/// Firmware version of a device, as reported by [crate::Message::StateHostFirmware].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
}

impl FirmwareVersion {
    pub fn new(major: u16, minor: u16) -> FirmwareVersion {
        FirmwareVersion { major, minor }
    }
}

impl From<u32> for FirmwareVersion {
    fn from(version: u32) -> FirmwareVersion {
        FirmwareVersion {
            major: (version >> 16) as u16,
            minor: (version & 0xffff) as u16,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// How a device's firmware is compared against the minimum version listed in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirmwareGate {
    /// The firmware must be the listed version or newer.
    #[default]
    AtLeast,
    /// The firmware must be exactly the listed version.
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureRange {
    /// The device supports a range of temperatures
    Variable { min: u16, max: u16 },
    /// The device only supports 1 temperature
    Fixed(u16),
    /// For devices that aren't lighting products (the LIFX switch)
    None,
}

impl From<Option<&[u16]>> for TemperatureRange {
    fn from(v: Option<&[u16]>) -> Self {
        match v {
            Some(&[min, max]) => TemperatureRange::Variable { min, max },
            Some(&[a]) => TemperatureRange::Fixed(a),
            _ => TemperatureRange::None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFeatures {
    #[serde(default)]
    pub color: bool,
    #[serde(default)]
    pub chain: bool,
    #[serde(default)]
    pub matrix: bool,
    #[serde(default)]
    pub infrared: bool,
    #[serde(default)]
    pub multizone: bool,
    #[serde(default)]
    pub temperature_range: Option<Vec<u16>>,
    #[serde(default)]
    pub min_ext_mz_firmware_components: Option<Vec<u16>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub pid: u32,
    pub name: String,
    #[serde(default)]
    pub features: ProductFeatures,
}

impl Product {
    pub fn temperature_range(&self) -> TemperatureRange {
        TemperatureRange::from(self.features.temperature_range.as_deref())
    }

    /// The first firmware version with extended multizone support, if this product has any.
    pub fn min_extended_multizone_firmware(&self) -> Option<FirmwareVersion> {
        match self.features.min_ext_mz_firmware_components.as_deref() {
            Some(&[major, minor]) => Some(FirmwareVersion { major, minor }),
            _ => None,
        }
    }

    /// Whether a device of this product running `firmware` understands the extended multizone
    /// messages.
    pub fn supports_extended_multizone(&self, firmware: FirmwareVersion, gate: FirmwareGate) -> bool {
        if !self.features.multizone {
            return false;
        }
        match (self.min_extended_multizone_firmware(), gate) {
            (Some(min), FirmwareGate::AtLeast) => firmware >= min,
            (Some(min), FirmwareGate::Exact) => firmware == min,
            (None, _) => false,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    pub vid: u32,
    pub name: String,
    pub products: Vec<Product>,
}

/// A list of vendors and their products, in the format of the LIFX `products.json` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub vendors: Vec<Vendor>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Catalog, Error> {
        let vendors = serde_json::from_str(json)?;
        Ok(Catalog { vendors })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Catalog, Error> {
        let vendors = serde_json::from_reader(reader)?;
        Ok(Catalog { vendors })
    }

    /// The catalog that ships with this crate.
    ///
    /// It is parsed on first use.  A parse failure is remembered and returned on every call.
    pub fn bundled() -> Result<&'static Catalog, Error> {
        static BUNDLED: OnceLock<Result<Catalog, String>> = OnceLock::new();
        match BUNDLED.get_or_init(|| load_bundled(BUNDLED_PRODUCTS)) {
            Ok(catalog) => Ok(catalog),
            Err(e) => Err(Error::BundledCatalog(e.clone())),
        }
    }

    pub fn lookup(&self, vendor: u32, product: u32) -> Option<&Product> {
        self.vendors
            .iter()
            .find(|v| v.vid == vendor)?
            .products
            .iter()
            .find(|p| p.pid == product)
    }
}

fn load_bundled(json: &str) -> Result<Catalog, String> {
    Catalog::from_json(json).map_err(|e| e.to_string())
}

/// Look up info about what a LIFX product supports.
///
/// You can get the vendor and product IDs from a bulb by receiving a [crate::Message::StateVersion] message
pub fn get_product_info(vendor: u32, product: u32) -> Option<&'static Product> {
    Catalog::bundled().ok()?.lookup(vendor, product)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_parses() {
        let catalog = Catalog::from_json(BUNDLED_PRODUCTS).unwrap();
        assert_eq!(catalog.vendors.len(), 1);
        assert!(catalog.vendors[0].products.len() > 30);
    }

    #[test]
    fn test_bundled_catalog_loads() {
        let catalog = Catalog::bundled().unwrap();
        assert!(catalog.lookup(1, 27).is_some());
    }

    #[test]
    fn test_broken_catalog_is_reported() {
        let err = load_bundled("[{").unwrap_err();
        assert!(!err.is_empty());
        let err = Error::BundledCatalog(err);
        assert!(err.to_string().starts_with("bundled product catalog is invalid"));
        assert!(!err.is_decode());
    }

    #[test]
    fn test_lookup() {
        let z = get_product_info(1, 31).unwrap();
        assert_eq!(z.name, "LIFX Z");
        assert!(z.features.multizone);
        assert_eq!(z.min_extended_multizone_firmware(), None);

        let z2 = get_product_info(1, 32).unwrap();
        assert_eq!(
            z2.min_extended_multizone_firmware(),
            Some(FirmwareVersion::new(2, 77))
        );
        assert_eq!(
            z2.temperature_range(),
            TemperatureRange::Variable {
                min: 2500,
                max: 9000
            }
        );

        assert!(get_product_info(1, 9999).is_none());
        assert!(get_product_info(2, 31).is_none());
    }

    #[test]
    fn test_firmware_split() {
        let fw = FirmwareVersion::from((2 << 16) | 77);
        assert_eq!(fw, FirmwareVersion::new(2, 77));
        assert_eq!(fw.to_string(), "2.77");
        assert!(FirmwareVersion::new(3, 0) > FirmwareVersion::new(2, 77));
        assert!(FirmwareVersion::new(2, 80) > FirmwareVersion::new(2, 77));
    }

    #[test]
    fn test_extended_gate() {
        let z2 = get_product_info(1, 32).unwrap();
        let exact = FirmwareVersion::new(2, 77);
        let newer = FirmwareVersion::new(3, 70);
        let older = FirmwareVersion::new(2, 76);

        assert!(z2.supports_extended_multizone(exact, FirmwareGate::AtLeast));
        assert!(z2.supports_extended_multizone(newer, FirmwareGate::AtLeast));
        assert!(!z2.supports_extended_multizone(older, FirmwareGate::AtLeast));

        assert!(z2.supports_extended_multizone(exact, FirmwareGate::Exact));
        assert!(!z2.supports_extended_multizone(newer, FirmwareGate::Exact));

        let bulb = get_product_info(1, 27).unwrap();
        assert!(!bulb.supports_extended_multizone(newer, FirmwareGate::AtLeast));
    }

    #[test]
    fn test_custom_catalog() {
        let json = r#"[{"vid": 7, "name": "Acme", "products": [
            {"pid": 1, "name": "Strip", "features": {"multizone": true, "min_ext_mz_firmware_components": [1, 2]}}
        ]}]"#;
        let catalog = Catalog::from_json(json).unwrap();
        let strip = catalog.lookup(7, 1).unwrap();
        assert!(strip.features.multizone);
        assert!(!strip.features.color);
        assert_eq!(strip.temperature_range(), TemperatureRange::None);

        assert!(matches!(Catalog::from_json("{"), Err(Error::Catalog(_))));
    }
}

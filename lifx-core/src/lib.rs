//! This crate provides low-level message types and structures for dealing with the LIFX LAN protocol.
//!
//! This lets you control lights on your local area network.  More info can be found here:
//! https://lan.developer.lifx.com/
//!
//! Since this is a low-level library, it does not deal with issues like talking to the network,
//! caching light state, or waiting for replies.  This is done by the `lifx-client` crate.
//!
//! # Discovery
//!
//! To discover lights on your LAN, send a [Message::GetService] message as a UDP broadcast to port 56700
//! When a device is discovered, the [Service] types and IP port are provided.  To get additional
//! info about each device, send additional Get messages directly to each device (by setting the
//! [FrameAddress::target] field to the bulbs target ID, and then send a UDP packet to the IP address
//! associated with the device).
//!
//! # Reserved fields
//! When *constructing* packets, you must always set every reserved field to zero.  However, it's
//! possible to receive packets with these fields set to non-zero values.  Be conservative in what
//! you send, and liberal in what you accept.
//!
//! # Unknown values
//! It's common to see packets for LIFX bulbs that don't match the documented protocol.  These are
//! suspected to be internal messages that are used by offical LIFX apps, but that aren't documented.
//! They decode to [Message::Unknown] rather than to an error.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use std::io::Cursor;

mod products;
pub mod zones;

pub use products::{
    get_product_info, Catalog, FirmwareGate, FirmwareVersion, Product, ProductFeatures,
    TemperatureRange, Vendor,
};
pub use zones::{spread_colors, spread_runs, ZonePages, ZoneRange};

/// The UDP port LIFX devices listen on.
pub const LIFX_PORT: u16 = 56700;

/// Size in bytes of the frame, frame address and protocol headers together.
pub const HEADER_SIZE: usize = 36;

/// Number of colors carried by every [Message::StateMultiZone] message.
pub const MULTIZONE_COLORS: usize = 8;

/// Maximum number of colors carried by one extended multizone message.
pub const EXTENDED_ZONE_COLORS: usize = 82;

/// Lowest kelvin value accepted when setting a color.
pub const KELVIN_MIN: u16 = 2500;

/// Highest kelvin value accepted when setting a color.
pub const KELVIN_MAX: u16 = 9000;

/// Various message encoding/decoding errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A color temperature outside of `KELVIN_MIN..=KELVIN_MAX` was supplied.
    #[error("kelvin value {0} is outside of {min}..={max}", min = KELVIN_MIN, max = KELVIN_MAX)]
    KelvinOutOfRange(u16),

    /// A transition duration that is negative, or that doesn't fit into a u32 of milliseconds.
    #[error("transition of {0}ms is out of range")]
    DurationOutOfRange(i64),

    /// A zone range whose start is past its end, or which can't be expressed on the wire.
    #[error("invalid zone range {start}..={end}")]
    InvalidZoneRange { start: u16, end: u16 },

    /// An operation that needs at least one color was given none.
    #[error("at least one color is required")]
    NoColors,

    /// More colors than fit in a single message were supplied.
    #[error("{0} colors don't fit in a single message")]
    TooManyColors(usize),

    /// The datagram is shorter than its header, or than the size its header declares.
    #[error("frame declares {declared} bytes but only {got} were received")]
    FrameTruncated { declared: usize, got: usize },

    /// The payload is too short for its message type.
    #[error("payload of message type {typ} needs {needed} bytes, got {got}")]
    PayloadTruncated { typ: u16, needed: usize, got: usize },

    /// This error means one of the message fields contains an invalid or unsupported value.
    ///
    /// The inner string is a description of the error.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The product catalog could not be parsed.
    #[error("unable to parse product catalog: {0}")]
    Catalog(#[from] serde_json::Error),

    /// The catalog built into this crate failed to parse.  Holds the parse error's message.
    #[error("bundled product catalog is invalid: {0}")]
    BundledCatalog(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True for errors raised while checking arguments, before anything is encoded or sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::KelvinOutOfRange(_)
                | Error::DurationOutOfRange(_)
                | Error::InvalidZoneRange { .. }
                | Error::NoColors
                | Error::TooManyColors(_)
        )
    }

    /// True for errors raised while decoding bytes received from the network.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Error::FrameTruncated { .. }
                | Error::PayloadTruncated { .. }
                | Error::ProtocolError(_)
                | Error::Io(_)
        )
    }
}

trait LifxFrom<T>: Sized {
    fn from(val: T) -> Result<Self, Error>;
}

macro_rules! derive_lifx_from {
{ $( $t:ty ),*} => {
    $(
        impl LifxFrom<$t> for $t {
            fn from(val: $t) -> Result<Self, Error> { Ok(val)}
        }
    )*

}
}

derive_lifx_from! {
    u8, u16, i16, u32, u64, LifxString, HSBK
}

impl LifxFrom<u8> for ApplicationRequest {
    fn from(val: u8) -> Result<ApplicationRequest, Error> {
        match val {
            0 => Ok(ApplicationRequest::NoApply),
            1 => Ok(ApplicationRequest::Apply),
            2 => Ok(ApplicationRequest::ApplyOnly),
            x => Err(Error::ProtocolError(format!(
                "Unknown application request {}",
                x
            ))),
        }
    }
}

impl LifxFrom<u8> for Service {
    fn from(val: u8) -> Result<Service, Error> {
        Ok(<Service as From<u8>>::from(val))
    }
}

/// Lifx strings are fixed-length (32-bytes maximum)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LifxString(pub String);

impl LifxString {
    /// Constructs a new LifxString, truncating to 32 bytes without splitting a character.
    pub fn new(s: &str) -> LifxString {
        let mut end = s.len().min(32);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        LifxString(s[..end].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LifxString {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

impl std::cmp::PartialEq<str> for LifxString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

trait LittleEndianWriter<T>: WriteBytesExt {
    fn write_val(&mut self, v: T) -> Result<(), io::Error>;
}

macro_rules! derive_writer {
{ $( $m:ident: $t:ty ),*} => {
    $(
        impl<T: WriteBytesExt> LittleEndianWriter<$t> for T {
            fn write_val(&mut self, v: $t) -> Result<(), io::Error> {
                self . $m ::<LittleEndian>(v)
            }
        }
    )*

}
}

derive_writer! { write_u32: u32, write_u16: u16, write_i16: i16, write_u64: u64 }

impl<T: WriteBytesExt> LittleEndianWriter<u8> for T {
    fn write_val(&mut self, v: u8) -> Result<(), io::Error> {
        self.write_u8(v)
    }
}

impl<T> LittleEndianWriter<LifxString> for T
where
    T: WriteBytesExt,
{
    fn write_val(&mut self, v: LifxString) -> Result<(), io::Error> {
        let bytes = LifxString::new(&v.0).0.into_bytes();
        for idx in 0..32 {
            self.write_u8(bytes.get(idx).copied().unwrap_or(0))?;
        }
        Ok(())
    }
}

impl<T> LittleEndianWriter<HSBK> for T
where
    T: WriteBytesExt,
{
    fn write_val(&mut self, v: HSBK) -> Result<(), io::Error> {
        self.write_val(v.hue)?;
        self.write_val(v.saturation)?;
        self.write_val(v.brightness)?;
        self.write_val(v.kelvin)?;
        Ok(())
    }
}

impl<T> LittleEndianWriter<ApplicationRequest> for T
where
    T: WriteBytesExt,
{
    fn write_val(&mut self, v: ApplicationRequest) -> Result<(), io::Error> {
        self.write_u8(v as u8)
    }
}

impl<T> LittleEndianWriter<Service> for T
where
    T: WriteBytesExt,
{
    fn write_val(&mut self, v: Service) -> Result<(), io::Error> {
        self.write_u8(v.into())
    }
}

trait LittleEndianReader<T> {
    fn read_val(&mut self) -> Result<T, io::Error>;
}

macro_rules! derive_reader {
{ $( $m:ident: $t:ty ),*} => {
    $(
        impl<T: ReadBytesExt> LittleEndianReader<$t> for T {
            fn read_val(&mut self) -> Result<$t, io::Error> {
                self . $m ::<LittleEndian>()
            }
        }
    )*

}
}

derive_reader! { read_u32: u32, read_u16: u16, read_i16: i16, read_u64: u64 }

impl<R: ReadBytesExt> LittleEndianReader<u8> for R {
    fn read_val(&mut self) -> Result<u8, io::Error> {
        self.read_u8()
    }
}

impl<R: ReadBytesExt> LittleEndianReader<HSBK> for R {
    fn read_val(&mut self) -> Result<HSBK, io::Error> {
        let hue = self.read_val()?;
        let sat = self.read_val()?;
        let bri = self.read_val()?;
        let kel = self.read_val()?;
        Ok(HSBK {
            hue,
            saturation: sat,
            brightness: bri,
            kelvin: kel,
        })
    }
}

impl<R: ReadBytesExt> LittleEndianReader<LifxString> for R {
    fn read_val(&mut self) -> Result<LifxString, io::Error> {
        let mut raw = [0; 32];
        self.read_exact(&mut raw)?;
        let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        Ok(LifxString(String::from_utf8_lossy(&raw[..end]).into_owned()))
    }
}

macro_rules! unpack {
    ($msg:ident, $typ:ident, $( $n:ident: $t:ident ),*) => {
        {
        let mut c = Cursor::new(&$msg.payload);
        $(
            let $n: $t = c.read_val()?;
        )*

        Message::$typ{
            $(
                $n: LifxFrom::from($n)?,
            )*
        }
        }

    };
}

/// What services are exposed by the device.
///
/// LIFX only documents the UDP service, though bulbs may support other undocumented services.
/// Those are kept as [Service::Reserved] so that they can be logged and skipped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Service {
    Udp,
    Reserved(u8),
}

impl From<u8> for Service {
    fn from(val: u8) -> Service {
        match val {
            1 => Service::Udp,
            x => Service::Reserved(x),
        }
    }
}

impl From<Service> for u8 {
    fn from(service: Service) -> u8 {
        match service {
            Service::Udp => 1,
            Service::Reserved(x) => x,
        }
    }
}

/// Controls how/when multizone devices apply color changes
///
/// See also [Message::SetColorZones].
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplicationRequest {
    /// Don't apply the requested changes until a message with Apply or ApplyOnly is sent
    NoApply = 0,
    /// Apply the changes immediately and apply any pending changes
    Apply = 1,
    /// Ignore the requested changes in this message and only apply pending changes
    ApplyOnly = 2,
}

/// Decoded LIFX Messages
///
/// This enum lists all of the LIFX message types known to this library.
///
/// Message types that this library doesn't know about are kept as [Message::Unknown], with their
/// payload untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// GetService - 2
    ///
    /// Sent by a client to acquire responses from all devices on the local network. No payload is
    /// required. Causes the devices to transmit a StateService message.
    GetService,

    /// StateService - 3
    ///
    /// Response to [Message::GetService] message.
    StateService {
        /// Port number of the light.  If the service is temporarily unavailable, then the port value
        /// will be 0.
        port: u32,
        /// unsigned 8-bit integer, maps to `Service`
        service: Service,
    },

    /// GetHostFirmware - 14
    ///
    /// Gets Host MCU firmware information. No payload is required. Causes the device to transmit a
    /// [Message::StateHostFirmware] message.
    GetHostFirmware,

    /// StateHostFirmware - 15
    ///
    /// Response to [Message::GetHostFirmware] message.
    ///
    /// Provides host firmware information.
    StateHostFirmware {
        /// Firmware build time (absolute time in nanoseconds since epoch)
        build: u64,
        reserved: u64,
        /// Firmware version.  The major version is in the upper 16 bits, the minor version in
        /// the lower 16 bits.  See [FirmwareVersion].
        version: u32,
    },

    /// GetLabel - 23
    ///
    /// Get device label. No payload is required. Causes the device to transmit a
    /// [Message::StateLabel] message.
    GetLabel,

    /// SetLabel - 24
    ///
    /// Set the device label text.
    SetLabel { label: LifxString },

    /// StateLabel - 25
    ///
    /// Response to [Message::GetLabel] message.
    StateLabel { label: LifxString },

    /// GetVersion - 32
    ///
    /// Get the hardware version. No payload is required. Causes the device to transmit a
    /// [Message::StateVersion] message.
    GetVersion,

    /// StateVersion - 33
    ///
    /// Response to [Message::GetVersion] message.
    ///
    /// Provides the hardware version of the device. To get more information about this product,
    /// use the [get_product_info] function.
    StateVersion {
        /// vendor ID
        vendor: u32,
        /// product ID
        product: u32,
        /// hardware version
        version: u32,
    },

    /// Acknowledgement - 45
    ///
    /// Response to any message sent with ack_required set to 1.
    Acknowledgement {
        /// sequence number of the message being acknowledged
        seq: u8,
    },

    /// Get - 101
    ///
    /// Sent by a client to obtain the light state. No payload required. Causes the device to
    /// transmit a [Message::LightState] message.
    LightGet,

    /// SetColor - 102
    ///
    /// Sent by a client to change the light state.
    ///
    /// If the Frame Address res_required field is set to one (1) then the device will transmit a
    /// State message.
    LightSetColor {
        reserved: u8,
        /// Color in HSBK
        color: HSBK,
        /// Color transition time in milliseconds
        duration: u32,
    },

    /// State - 107
    ///
    /// Sent by a device to provide the current light state.
    LightState {
        color: HSBK,
        reserved: i16,
        /// Zero means the light is off; any other value means it is on.
        power: u16,
        label: LifxString,
        reserved2: u64,
    },

    /// GetPower - 116
    ///
    /// Sent by a client to obtain the power level. No payload required. Causes the device to
    /// transmit a [Message::LightStatePower] message.
    LightGetPower,

    /// SetPower - 117
    ///
    /// Sent by a client to change the light power level.
    ///
    /// The power level must be either 0 or 65535.
    ///
    /// The duration is the power level transition time in milliseconds.
    ///
    /// If the Frame Address res_required field is set to one (1) then the device will transmit a
    /// StatePower message.
    LightSetPower { level: u16, duration: u32 },

    /// StatePower - 118
    ///
    /// Sent by a device to provide the current power level.
    LightStatePower { level: u16 },

    /// SetColorZones - 501
    ///
    /// This message is used for changing the color of either a single or multiple zones.
    /// The changes are stored in a buffer and are only applied once a message with either
    /// [ApplicationRequest::Apply] or [ApplicationRequest::ApplyOnly] set.
    SetColorZones {
        start_index: u8,
        end_index: u8,
        color: HSBK,
        /// Color transition time in milliseconds
        duration: u32,
        apply: ApplicationRequest,
    },

    /// GetColorZones - 502
    ///
    /// GetColorZones is used to request the zone colors for a range of zones. The bulb will respond
    /// with either [Message::StateZone] or [Message::StateMultiZone] messages as required to cover
    /// the requested range. The bulb may send state messages that cover more than the requested
    /// zones. Any zones outside the requested indexes will still contain valid values at the time
    /// the message was sent.
    GetColorZones { start_index: u8, end_index: u8 },

    /// StateZone - 503
    ///
    /// The StateZone message represents the state of a single zone with the `index` field indicating
    /// which zone is represented. The `count` field contains the count of the total number of zones
    /// available on the device.
    StateZone { count: u8, index: u8, color: HSBK },

    /// StateMultiZone - 506
    ///
    /// The StateMultiZone message represents the state of eight consecutive zones in a single message.
    /// As in the StateZone message the `count` field represents the count of the total number of
    /// zones available on the device. In this message the `index` field represents the index of
    /// the first zone of the eight.  Entries past the last zone of the device carry no meaning.
    StateMultiZone {
        count: u8,
        index: u8,
        colors: [HSBK; MULTIZONE_COLORS],
    },

    /// SetExtendedColorZones - 510
    ///
    /// Sets up to 82 consecutive zones in one message, starting at `zone_index`.  Only supported
    /// by devices whose firmware advertises extended multizone support.
    SetExtendedColorZones {
        /// Color transition time in milliseconds
        duration: u32,
        apply: ApplicationRequest,
        zone_index: u16,
        colors: Vec<HSBK>,
    },

    /// GetExtendedColorZones - 511
    ///
    /// No payload is required.  Causes the device to transmit a
    /// [Message::StateExtendedColorZones] message.
    GetExtendedColorZones,

    /// StateExtendedColorZones - 512
    ///
    /// `zones_count` is the total number of zones on the device, and `colors` holds the colors
    /// of the zones starting at `zone_index`.
    StateExtendedColorZones {
        zones_count: u16,
        zone_index: u16,
        colors: Vec<HSBK>,
    },

    /// Any message type not listed above.
    Unknown { typ: u16, payload: Vec<u8> },
}

impl Message {
    pub fn get_num(&self) -> u16 {
        match *self {
            Message::GetService => 2,
            Message::StateService { .. } => 3,
            Message::GetHostFirmware => 14,
            Message::StateHostFirmware { .. } => 15,
            Message::GetLabel => 23,
            Message::SetLabel { .. } => 24,
            Message::StateLabel { .. } => 25,
            Message::GetVersion => 32,
            Message::StateVersion { .. } => 33,
            Message::Acknowledgement { .. } => 45,
            Message::LightGet => 101,
            Message::LightSetColor { .. } => 102,
            Message::LightState { .. } => 107,
            Message::LightGetPower => 116,
            Message::LightSetPower { .. } => 117,
            Message::LightStatePower { .. } => 118,
            Message::SetColorZones { .. } => 501,
            Message::GetColorZones { .. } => 502,
            Message::StateZone { .. } => 503,
            Message::StateMultiZone { .. } => 506,
            Message::SetExtendedColorZones { .. } => 510,
            Message::GetExtendedColorZones => 511,
            Message::StateExtendedColorZones { .. } => 512,
            Message::Unknown { typ, .. } => typ,
        }
    }

    /// The smallest payload, in bytes, that a message of the given type can be decoded from.
    ///
    /// Returns `None` for types without a payload, and for unknown types.
    pub fn min_payload_size(typ: u16) -> Option<usize> {
        match typ {
            3 => Some(5),
            15 => Some(20),
            24 | 25 => Some(32),
            33 => Some(12),
            102 => Some(13),
            107 => Some(52),
            117 => Some(6),
            118 => Some(2),
            501 => Some(15),
            502 => Some(2),
            503 => Some(10),
            506 => Some(2 + 8 * MULTIZONE_COLORS),
            510 => Some(8 + 8 * EXTENDED_ZONE_COLORS),
            512 => Some(5),
            _ => None,
        }
    }

    /// Tries to parse the payload in a [RawMessage], based on its message type.
    ///
    /// Message types this library doesn't know are returned as [Message::Unknown].
    pub fn from_raw(msg: &RawMessage) -> Result<Message, Error> {
        let typ = msg.protocol_header.typ;
        if let Some(needed) = Message::min_payload_size(typ) {
            if msg.payload.len() < needed {
                return Err(Error::PayloadTruncated {
                    typ,
                    needed,
                    got: msg.payload.len(),
                });
            }
        }

        match typ {
            2 => Ok(Message::GetService),
            3 => Ok(unpack!(msg, StateService, service: u8, port: u32)),
            14 => Ok(Message::GetHostFirmware),
            15 => Ok(unpack!(
                msg,
                StateHostFirmware,
                build: u64,
                reserved: u64,
                version: u32
            )),
            23 => Ok(Message::GetLabel),
            24 => Ok(unpack!(msg, SetLabel, label: LifxString)),
            25 => Ok(unpack!(msg, StateLabel, label: LifxString)),
            32 => Ok(Message::GetVersion),
            33 => Ok(unpack!(
                msg,
                StateVersion,
                vendor: u32,
                product: u32,
                version: u32
            )),
            45 => Ok(Message::Acknowledgement {
                seq: msg.frame_addr.sequence,
            }),
            101 => Ok(Message::LightGet),
            102 => Ok(unpack!(
                msg,
                LightSetColor,
                reserved: u8,
                color: HSBK,
                duration: u32
            )),
            107 => Ok(unpack!(
                msg,
                LightState,
                color: HSBK,
                reserved: i16,
                power: u16,
                label: LifxString,
                reserved2: u64
            )),
            116 => Ok(Message::LightGetPower),
            117 => Ok(unpack!(msg, LightSetPower, level: u16, duration: u32)),
            118 => Ok(unpack!(msg, LightStatePower, level: u16)),
            501 => Ok(unpack!(
                msg,
                SetColorZones,
                start_index: u8,
                end_index: u8,
                color: HSBK,
                duration: u32,
                apply: u8
            )),
            502 => Ok(unpack!(msg, GetColorZones, start_index: u8, end_index: u8)),
            503 => Ok(unpack!(msg, StateZone, count: u8, index: u8, color: HSBK)),
            506 => {
                let mut c = Cursor::new(&msg.payload);
                let count: u8 = c.read_val()?;
                let index: u8 = c.read_val()?;
                let mut colors = [HSBK::default(); MULTIZONE_COLORS];
                for color in colors.iter_mut() {
                    *color = c.read_val()?;
                }
                Ok(Message::StateMultiZone {
                    count,
                    index,
                    colors,
                })
            }
            510 => {
                let mut c = Cursor::new(&msg.payload);
                let duration: u32 = c.read_val()?;
                let apply: u8 = c.read_val()?;
                let zone_index: u16 = c.read_val()?;
                let count: u8 = c.read_val()?;
                if count as usize > EXTENDED_ZONE_COLORS {
                    return Err(Error::ProtocolError(format!(
                        "SetExtendedColorZones claims {} colors",
                        count
                    )));
                }
                let mut colors = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let color: HSBK = c.read_val()?;
                    colors.push(color);
                }
                Ok(Message::SetExtendedColorZones {
                    duration,
                    apply: LifxFrom::from(apply)?,
                    zone_index,
                    colors,
                })
            }
            511 => Ok(Message::GetExtendedColorZones),
            512 => {
                let mut c = Cursor::new(&msg.payload);
                let zones_count: u16 = c.read_val()?;
                let zone_index: u16 = c.read_val()?;
                let count: u8 = c.read_val()?;
                let needed = 5 + 8 * count as usize;
                if msg.payload.len() < needed {
                    return Err(Error::PayloadTruncated {
                        typ,
                        needed,
                        got: msg.payload.len(),
                    });
                }
                let mut colors = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let color: HSBK = c.read_val()?;
                    colors.push(color);
                }
                Ok(Message::StateExtendedColorZones {
                    zones_count,
                    zone_index,
                    colors,
                })
            }
            _ => Ok(Message::Unknown {
                typ,
                payload: msg.payload.clone(),
            }),
        }
    }
}

/// Bulb color (Hue-Saturation-Brightness-Kelvin)
///
/// # Notes:
///
/// Colors are represented as Hue-Saturation-Brightness-Kelvin, or HSBK
///
/// When a light is displaying whites, saturation will be zero, hue will be ignored, and only
/// brightness and kelvin will matter.
///
/// Valid values for "kelvin" are from 2500 (warm/yellow) to 9000 (cool/blue).  Values outside of
/// that range are accepted when decoding, but rejected by [HSBK::validate].
///
/// When a light is displaying colors, kelvin is ignored.
///
/// To display "pure" colors, set saturation to full (65535).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct HSBK {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

impl HSBK {
    pub fn new(hue: u16, saturation: u16, brightness: u16, kelvin: u16) -> HSBK {
        HSBK {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }

    /// Converts an RGB color, using HSL lightness as the brightness.
    pub fn from_rgb(red: u8, green: u8, blue: u8, kelvin: u16) -> HSBK {
        let hsl = hsl::HSL::from_rgb(&[red, green, blue]);
        HSBK {
            hue: (hsl.h / 360.0 * 65535.0).round() as u16,
            saturation: (hsl.s * 65535.0).round() as u16,
            brightness: (hsl.l * 65535.0).round() as u16,
            kelvin,
        }
    }

    /// Checks that the kelvin value can be sent to a device.
    pub fn validate(&self) -> Result<(), Error> {
        if (KELVIN_MIN..=KELVIN_MAX).contains(&self.kelvin) {
            Ok(())
        } else {
            Err(Error::KelvinOutOfRange(self.kelvin))
        }
    }

    pub fn describe(&self, short: bool) -> String {
        match short {
            true if self.saturation == 0 => format!("{}K", self.kelvin),
            true => format!(
                "{:.0}/{:.0}",
                (self.hue as f32 / 65535.0) * 360.0,
                self.saturation as f32 / 655.35
            ),
            false if self.saturation == 0 => format!(
                "{:.0}% White ({})",
                self.brightness as f32 / 655.35,
                describe_kelvin(self.kelvin)
            ),
            false => format!(
                "{:.0}% hue: {} sat: {}",
                self.brightness as f32 / 655.35,
                self.hue,
                self.saturation
            ),
        }
    }
}

/// Describe (in english words) the color temperature as given in kelvin.
///
/// These descriptions match the values shown in the LIFX mobile app.
pub fn describe_kelvin(k: u16) -> &'static str {
    match k {
        0..=2500 => "Ultra Warm",
        2501..=2700 => "Incandescent",
        2701..=3000 => "Warm",
        3001..=3200 => "Neutral Warm",
        3201..=3500 => "Neutral",
        3501..=4000 => "Cool",
        4001..=4500 => "Cool Daylight",
        4501..=5000 => "Soft Daylight",
        5001..=5500 => "Daylight",
        5501..=6000 => "Noon Daylight",
        6001..=6500 => "Bright Daylight",
        6501..=7000 => "Cloudy Daylight",
        7001..=7500 => "Blue Daylight",
        7501..=8000 => "Blue Overcast",
        8001..=8500 => "Blue Water",
        _ => "Blue Ice",
    }
}

/// The raw message structure
///
/// Contains a low-level protocol info.  This is what is sent and received via UDP packets.
///
/// To parse the payload, use [Message::from_raw].
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub frame: Frame,
    pub frame_addr: FrameAddress,
    pub protocol_header: ProtocolHeader,
    pub payload: Vec<u8>,
}

/// The Frame section contains information about the following:
///
/// * Size of the entire message
/// * LIFX Protocol number: must be 1024 (decimal)
/// * Use of the Frame Address target field
/// * Source identifier
///
/// The `tagged` field is a boolean that indicates whether the Frame Address target field is
/// being used to address an individual device or all devices.  If `tagged` is true, then the
/// `target` field should be all zeros.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// 16 bits: Size of entire message in bytes including this field
    pub size: u16,

    /// 2 bits: Message origin indicator: must be zero (0)
    pub origin: u8,

    /// 1 bit: Determines usage of the Frame Address target field
    pub tagged: bool,

    /// 1 bit: Message includes a target address: must be one (1)
    pub addressable: bool,

    /// 12 bits: Protocol number: must be 1024 (decimal)
    pub protocol: u16,

    /// 32 bits: Source identifier: unique value set by the client, used by responses.
    ///
    /// If the source identifier is zero, then the LIFX device may send a broadcast message that can
    /// be received by all clients on the same subnet.
    ///
    /// If this packet is a reply, then this source field will be set to the same value as the client-
    /// sent request packet.
    pub source: u32,
}

/// The Frame Address section contains the following routing information:
///
/// * Target device address
/// * Acknowledgement message is required flag
/// * State response message is required flag
/// * Message sequence number
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAddress {
    /// 64 bits: 6 byte device address (MAC address) or zero (0) means all devices
    pub target: u64,

    /// 48 bits: Must all be zero (0)
    pub reserved: [u8; 6],

    /// 6 bits: Reserved
    pub reserved2: u8,

    /// 1 bit: Acknowledgement message required
    pub ack_required: bool,

    /// 1 bit: Response message required
    pub res_required: bool,

    /// 8 bits: Wrap around message sequence number
    pub sequence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolHeader {
    /// 64 bits: Reserved
    pub reserved: u64,

    /// 16 bits: Message type determines the payload being used
    pub typ: u16,

    /// 16 bits: Reserved
    pub reserved2: u16,
}

impl Frame {
    /// packed sized, in bytes
    fn packed_size() -> usize {
        8
    }

    fn validate(&self) -> Result<(), Error> {
        if self.origin > 3 {
            return Err(Error::ProtocolError(format!(
                "origin {} doesn't fit in 2 bits",
                self.origin
            )));
        }
        if !self.addressable {
            return Err(Error::ProtocolError(
                "frame is not addressable".to_owned(),
            ));
        }
        if self.protocol != 1024 {
            return Err(Error::ProtocolError(format!(
                "protocol version {}",
                self.protocol
            )));
        }
        Ok(())
    }

    fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut v = Vec::with_capacity(Self::packed_size());

        v.write_u16::<LittleEndian>(self.size)?;

        // pack origin + tagged + addressable +  protocol as a u16
        let mut d: u16 = (<u16 as From<u8>>::from(self.origin) & 0b11) << 14;
        d += if self.tagged { 1 } else { 0 } << 13;
        d += if self.addressable { 1 } else { 0 } << 12;
        d += self.protocol & 0b1111_1111_1111;

        v.write_u16::<LittleEndian>(d)?;

        v.write_u32::<LittleEndian>(self.source)?;

        Ok(v)
    }

    fn unpack(v: &[u8]) -> Result<Frame, Error> {
        let mut c = Cursor::new(v);

        let size = c.read_val()?;

        // origin + tagged + addressable + protocol
        let d: u16 = c.read_val()?;

        let origin: u8 = ((d & 0b1100_0000_0000_0000) >> 14) as u8;
        let tagged: bool = (d & 0b0010_0000_0000_0000) > 0;
        let addressable = (d & 0b0001_0000_0000_0000) > 0;
        let protocol: u16 = d & 0b0000_1111_1111_1111;

        if protocol != 1024 {
            return Err(Error::ProtocolError(format!(
                "Unpacked frame had protocol version {}",
                protocol
            )));
        }

        let source = c.read_val()?;

        let frame = Frame {
            size,
            origin,
            tagged,
            addressable,
            protocol,
            source,
        };
        Ok(frame)
    }
}

impl FrameAddress {
    fn packed_size() -> usize {
        16
    }

    fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut v = Vec::with_capacity(Self::packed_size());
        v.write_u64::<LittleEndian>(self.target)?;
        v.extend_from_slice(&self.reserved);

        let b: u8 = ((self.reserved2 & 0b11_1111) << 2)
            + if self.ack_required { 2 } else { 0 }
            + if self.res_required { 1 } else { 0 };
        v.write_u8(b)?;
        v.write_u8(self.sequence)?;
        Ok(v)
    }

    fn unpack(v: &[u8]) -> Result<FrameAddress, Error> {
        let mut c = Cursor::new(v);

        let target = c.read_val()?;

        let mut reserved: [u8; 6] = [0; 6];
        for slot in &mut reserved {
            *slot = c.read_val()?;
        }

        let b: u8 = c.read_val()?;
        let reserved2: u8 = (b & 0b1111_1100) >> 2;
        let ack_required = (b & 0b10) > 0;
        let res_required = (b & 0b01) > 0;

        let sequence = c.read_val()?;

        Ok(FrameAddress {
            target,
            reserved,
            reserved2,
            ack_required,
            res_required,
            sequence,
        })
    }
}

impl ProtocolHeader {
    fn packed_size() -> usize {
        12
    }

    /// Packs this part of the packet into some bytes
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut v = Vec::with_capacity(Self::packed_size());
        v.write_u64::<LittleEndian>(self.reserved)?;
        v.write_u16::<LittleEndian>(self.typ)?;
        v.write_u16::<LittleEndian>(self.reserved2)?;
        Ok(v)
    }

    fn unpack(v: &[u8]) -> Result<ProtocolHeader, Error> {
        let mut c = Cursor::new(v);

        let reserved = c.read_val()?;
        let typ = c.read_val()?;
        let reserved2 = c.read_val()?;

        Ok(ProtocolHeader {
            reserved,
            typ,
            reserved2,
        })
    }
}

/// Options used to contruct a [RawMessage].
///
/// See also [RawMessage::build].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// If not `None`, this is the ID of the device you want to address.
    ///
    /// To look up the ID of a device, extract it from the [FrameAddress::target] field when a
    /// device sends a [Message::StateService] message.
    pub target: Option<u64>,
    /// Acknowledgement message required.
    ///
    /// Causes the light to send an [Message::Acknowledgement] message.
    pub ack_required: bool,
    /// Response message required.
    ///
    /// Some message types are sent by clients to get data from a light.  These should always have
    /// `res_required` set to true.
    pub res_required: bool,
    /// A wrap around sequence number.  Optional (can be zero).
    ///
    /// By providing a unique sequence value, the response message will also contain the same
    /// sequence number, allowing a client to distinguish between different messages sent with the
    /// same `source` identifier.
    pub sequence: u8,
    /// A unique client identifier. Optional (can be zero).
    ///
    /// If the source is non-zero, then the LIFX device with send a unicast message to the IP
    /// address/port of the client that sent the originating message.  If zero, then the LIFX
    /// device may send a broadcast message that can be received by all clients on the same sub-net.
    pub source: u32,
}

fn write_extended_colors(v: &mut Vec<u8>, colors: &[HSBK]) -> Result<(), Error> {
    if colors.len() > EXTENDED_ZONE_COLORS {
        return Err(Error::TooManyColors(colors.len()));
    }
    v.write_val(colors.len() as u8)?;
    for color in colors {
        v.write_val(*color)?;
    }
    for _ in colors.len()..EXTENDED_ZONE_COLORS {
        v.write_val(HSBK::default())?;
    }
    Ok(())
}

impl RawMessage {
    /// Build a RawMessage (which is suitable for sending on the network) from a given Message
    /// type.
    ///
    /// If [BuildOptions::target] is None, then the message is addressed to all devices.  Else it should be a
    /// bulb UID (MAC address)
    pub fn build(options: &BuildOptions, typ: Message) -> Result<RawMessage, Error> {
        let frame = Frame {
            size: 0,
            origin: 0,
            tagged: options.target.is_none(),
            addressable: true,
            protocol: 1024,
            source: options.source,
        };
        let addr = FrameAddress {
            target: options.target.unwrap_or(0),
            reserved: [0; 6],
            reserved2: 0,
            ack_required: options.ack_required,
            res_required: options.res_required,
            sequence: options.sequence,
        };
        let phead = ProtocolHeader {
            reserved: 0,
            reserved2: 0,
            typ: typ.get_num(),
        };

        let mut v = Vec::new();
        match typ {
            Message::GetService
            | Message::GetHostFirmware
            | Message::GetLabel
            | Message::GetVersion
            | Message::Acknowledgement { .. }
            | Message::LightGet
            | Message::LightGetPower
            | Message::GetExtendedColorZones => {
                // these types have no payload
            }
            Message::StateService { port, service } => {
                v.write_val(service)?;
                v.write_val(port)?;
            }
            Message::StateHostFirmware {
                build,
                reserved,
                version,
            } => {
                v.write_val(build)?;
                v.write_val(reserved)?;
                v.write_val(version)?;
            }
            Message::SetLabel { label } | Message::StateLabel { label } => {
                v.write_val(label)?;
            }
            Message::StateVersion {
                vendor,
                product,
                version,
            } => {
                v.write_val(vendor)?;
                v.write_val(product)?;
                v.write_val(version)?;
            }
            Message::LightSetColor {
                reserved,
                color,
                duration,
            } => {
                v.write_val(reserved)?;
                v.write_val(color)?;
                v.write_val(duration)?;
            }
            Message::LightState {
                color,
                reserved,
                power,
                label,
                reserved2,
            } => {
                v.write_val(color)?;
                v.write_val(reserved)?;
                v.write_val(power)?;
                v.write_val(label)?;
                v.write_val(reserved2)?;
            }
            Message::LightSetPower { level, duration } => {
                v.write_val(level)?;
                v.write_val(duration)?;
            }
            Message::LightStatePower { level } => {
                v.write_val(level)?;
            }
            Message::SetColorZones {
                start_index,
                end_index,
                color,
                duration,
                apply,
            } => {
                v.write_val(start_index)?;
                v.write_val(end_index)?;
                v.write_val(color)?;
                v.write_val(duration)?;
                v.write_val(apply)?;
            }
            Message::GetColorZones {
                start_index,
                end_index,
            } => {
                v.write_val(start_index)?;
                v.write_val(end_index)?;
            }
            Message::StateZone {
                count,
                index,
                color,
            } => {
                v.write_val(count)?;
                v.write_val(index)?;
                v.write_val(color)?;
            }
            Message::StateMultiZone {
                count,
                index,
                colors,
            } => {
                v.write_val(count)?;
                v.write_val(index)?;
                for color in colors.iter() {
                    v.write_val(*color)?;
                }
            }
            Message::SetExtendedColorZones {
                duration,
                apply,
                zone_index,
                colors,
            } => {
                v.write_val(duration)?;
                v.write_val(apply)?;
                v.write_val(zone_index)?;
                write_extended_colors(&mut v, &colors)?;
            }
            Message::StateExtendedColorZones {
                zones_count,
                zone_index,
                colors,
            } => {
                v.write_val(zones_count)?;
                v.write_val(zone_index)?;
                write_extended_colors(&mut v, &colors)?;
            }
            Message::Unknown { payload, .. } => {
                v = payload;
            }
        }

        let mut msg = RawMessage {
            frame,
            frame_addr: addr,
            protocol_header: phead,
            payload: v,
        };

        let size = msg.packed_size();
        msg.frame.size = u16::try_from(size)
            .map_err(|_| Error::ProtocolError(format!("message of {} bytes is too large", size)))?;

        Ok(msg)
    }

    /// The total size (in bytes) of the packed version of this message.
    pub fn packed_size(&self) -> usize {
        Frame::packed_size()
            + FrameAddress::packed_size()
            + ProtocolHeader::packed_size()
            + self.payload.len()
    }

    /// Validates that this object was constructed correctly.
    pub fn validate(&self) -> Result<(), Error> {
        self.frame.validate()
    }

    /// Packs this RawMessage into some bytes that can be send over the network.
    ///
    /// The length of the returned data will be [RawMessage::packed_size] in size.
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut v = Vec::with_capacity(self.packed_size());
        v.extend(self.frame.pack()?);
        v.extend(self.frame_addr.pack()?);
        v.extend(self.protocol_header.pack()?);
        v.extend(&self.payload);
        Ok(v)
    }

    /// Given some bytes (generally read from a network socket), unpack the data into a
    /// `RawMessage` structure.
    ///
    /// Bytes past the size declared in the frame header are ignored.
    pub fn unpack(v: &[u8]) -> Result<RawMessage, Error> {
        if v.len() < HEADER_SIZE {
            return Err(Error::FrameTruncated {
                declared: HEADER_SIZE,
                got: v.len(),
            });
        }
        let mut start = 0;
        let frame = Frame::unpack(v)?;
        let size = frame.size as usize;
        if size < HEADER_SIZE {
            return Err(Error::ProtocolError(format!(
                "frame declares {} bytes, less than its own header",
                size
            )));
        }
        if size > v.len() {
            return Err(Error::FrameTruncated {
                declared: size,
                got: v.len(),
            });
        }
        start += Frame::packed_size();
        let addr = FrameAddress::unpack(&v[start..])?;
        start += FrameAddress::packed_size();
        let proto = ProtocolHeader::unpack(&v[start..])?;
        start += ProtocolHeader::packed_size();

        let body = Vec::from(&v[start..size]);

        Ok(RawMessage {
            frame,
            frame_addr: addr,
            protocol_header: proto,
            payload: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<Message, Error> {
        Message::from_raw(&RawMessage::unpack(bytes)?)
    }

    fn encode(options: &BuildOptions, msg: Message) -> Vec<u8> {
        RawMessage::build(options, msg).unwrap().pack().unwrap()
    }

    #[test]
    fn test_frame() {
        let frame = Frame {
            size: 0x1122,
            origin: 0,
            tagged: true,
            addressable: true,
            protocol: 1024,
            source: 1234567,
        };
        frame.validate().unwrap();

        let v = frame.pack().unwrap();
        println!("{:?}", v);
        assert_eq!(v[0], 0x22);
        assert_eq!(v[1], 0x11);

        assert_eq!(v.len(), Frame::packed_size());

        let unpacked = Frame::unpack(&v).unwrap();
        assert_eq!(frame, unpacked);
    }

    #[test]
    fn test_decode_frame() {
        //             00    01    02    03    04    05    06    07
        let v = vec![0x28, 0x00, 0x00, 0x54, 0x42, 0x52, 0x4b, 0x52];
        let frame = Frame::unpack(&v).unwrap();
        println!("{:?}", frame);

        // manual decoding:
        // size: 0x0028 ==> 40
        // 0x00, 0x54 (origin, tagged, addressable, protocol)

        //  /-Origin ==> 0
        // || /- addressable=1
        // || |
        // 01010100 00000000
        //   |
        //   \- Tagged=0

        assert_eq!(frame.size, 0x0028);
        assert_eq!(frame.origin, 1);
        assert!(frame.addressable);
        assert!(!frame.tagged);
        assert_eq!(frame.protocol, 1024);
        assert_eq!(frame.source, 0x524b5242);
    }

    #[test]
    fn test_decode_frame1() {
        //             00    01    02    03    04    05    06    07
        let v = vec![0x24, 0x00, 0x00, 0x14, 0xca, 0x41, 0x37, 0x05];
        let frame = Frame::unpack(&v).unwrap();
        println!("{:?}", frame);

        // 00010100 00000000

        assert_eq!(frame.size, 0x0024);
        assert_eq!(frame.origin, 0);
        assert!(!frame.tagged);
        assert!(frame.addressable);
        assert_eq!(frame.protocol, 1024);
        assert_eq!(frame.source, 0x053741ca);
    }

    #[test]
    fn test_frame_rejects_other_protocols() {
        let v = vec![0x24, 0x00, 0x01, 0x14, 0xca, 0x41, 0x37, 0x05];
        assert!(matches!(Frame::unpack(&v), Err(Error::ProtocolError(_))));
    }

    #[test]
    fn test_frame_address() {
        let frame = FrameAddress {
            target: 0x11224488,
            reserved: [0; 6],
            reserved2: 0,
            ack_required: true,
            res_required: false,
            sequence: 248,
        };

        let v = frame.pack().unwrap();
        assert_eq!(v.len(), FrameAddress::packed_size());
        assert_eq!(v[14], 0b10);
        println!("Packed FrameAddress: {:?}", v);

        let unpacked = FrameAddress::unpack(&v).unwrap();
        assert_eq!(frame, unpacked);
    }

    #[test]
    fn test_decode_frame_address() {
        //   1  2  3  4  5  6  7  8  9  10 11 12 13 14 15 16
        let v = vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x9c,
        ];
        assert_eq!(v.len(), FrameAddress::packed_size());

        let frame = FrameAddress::unpack(&v).unwrap();
        println!("FrameAddress: {:?}", frame);
        assert!(frame.res_required);
        assert!(!frame.ack_required);
        assert_eq!(frame.sequence, 0x9c);
    }

    #[test]
    fn test_protocol_header() {
        let frame = ProtocolHeader {
            reserved: 0,
            reserved2: 0,
            typ: 0x4455,
        };

        let v = frame.pack().unwrap();
        assert_eq!(v.len(), ProtocolHeader::packed_size());
        println!("Packed ProtocolHeader: {:?}", v);

        let unpacked = ProtocolHeader::unpack(&v).unwrap();
        assert_eq!(frame, unpacked);
    }

    #[test]
    fn test_decode_protocol_header() {
        //   1  2  3  4  5  6  7  8  9  10 11 12 13 14 15 16
        let v = vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x00,
        ];
        assert_eq!(v.len(), ProtocolHeader::packed_size());

        let frame = ProtocolHeader::unpack(&v).unwrap();
        println!("ProtocolHeader: {:?}", frame);
        assert_eq!(frame.typ, 14);
    }

    #[test]
    fn test_decode_full() {
        let v = vec![
            0x24, 0x00, 0x00, 0x14, 0xca, 0x41, 0x37, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x98, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x33, 0x00, 0x00, 0x00,
        ];

        let msg = RawMessage::unpack(&v).unwrap();
        msg.validate().unwrap();
        println!("{:#?}", msg);

        // 0x33 is GetGroup, which this library doesn't model
        assert_eq!(
            Message::from_raw(&msg).unwrap(),
            Message::Unknown {
                typ: 0x33,
                payload: vec![]
            }
        );
    }

    #[test]
    fn test_decode_full_1() {
        let v = vec![
            0x58, 0x00, 0x00, 0x54, 0xca, 0x41, 0x37, 0x05, 0xd0, 0x73, 0xd5, 0x02, 0x97, 0xde,
            0x00, 0x00, 0x4c, 0x49, 0x46, 0x58, 0x56, 0x32, 0x00, 0xc0, 0x44, 0x30, 0xeb, 0x47,
            0xc4, 0x48, 0x18, 0x14, 0x6b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff,
            0xb8, 0x0b, 0x00, 0x00, 0xff, 0xff, 0x4b, 0x69, 0x74, 0x63, 0x68, 0x65, 0x6e, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let msg = RawMessage::unpack(&v).unwrap();
        msg.validate().unwrap();
        println!("{:#?}", msg);

        match Message::from_raw(&msg).unwrap() {
            Message::LightState {
                color, power, label, ..
            } => {
                assert_eq!(color, HSBK::new(0, 0, 0xffff, 3000));
                assert_eq!(power, 0xffff);
                assert_eq!(label.as_str(), "Kitchen");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_build_a_packet() {
        // packet taken from https://lan.developer.lifx.com/docs/building-a-lifx-packet

        let msg = Message::LightSetColor {
            reserved: 0,
            color: HSBK {
                hue: 21845,
                saturation: 0xffff,
                brightness: 0xffff,
                kelvin: 3500,
            },
            duration: 1024,
        };

        let raw = RawMessage::build(
            &BuildOptions {
                target: None,
                ack_required: false,
                res_required: false,
                sequence: 0,
                source: 0,
            },
            msg,
        )
        .unwrap();

        let bytes = raw.pack().unwrap();
        println!("{:?}", bytes);
        assert_eq!(bytes.len(), 49);
        assert_eq!(
            bytes,
            vec![
                0x31, 0x00, 0x00, 0x34, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x66, 0x00, 0x00, 0x00, 0x00, 0x55, 0x55, 0xFF, 0xFF, 0xFF,
                0xFF, 0xAC, 0x0D, 0x00, 0x04, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_targeted_packet_header() {
        let bytes = encode(
            &BuildOptions {
                target: Some(0x0000_d073_d502_97de),
                ack_required: true,
                res_required: false,
                sequence: 7,
                source: 0xdead_beef,
            },
            Message::LightGetPower,
        );
        assert_eq!(bytes.len(), HEADER_SIZE);

        let raw = RawMessage::unpack(&bytes).unwrap();
        assert!(!raw.frame.tagged);
        assert!(raw.frame.addressable);
        assert_eq!(raw.frame.source, 0xdead_beef);
        assert_eq!(raw.frame_addr.target, 0x0000_d073_d502_97de);
        assert!(raw.frame_addr.ack_required);
        assert!(!raw.frame_addr.res_required);
        assert_eq!(raw.frame_addr.sequence, 7);
        assert_eq!(raw.protocol_header.typ, 116);
    }

    #[test]
    fn test_unpack_short_datagram() {
        let bytes = encode(&BuildOptions::default(), Message::GetService);
        match RawMessage::unpack(&bytes[..20]) {
            Err(Error::FrameTruncated { declared, got }) => {
                assert_eq!(declared, HEADER_SIZE);
                assert_eq!(got, 20);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_unpack_size_past_datagram() {
        let mut bytes = encode(&BuildOptions::default(), Message::LightStatePower { level: 1 });
        bytes[0] = 60;
        let err = RawMessage::unpack(&bytes).unwrap_err();
        assert!(err.is_decode());
        assert!(matches!(
            err,
            Error::FrameTruncated {
                declared: 60,
                got: 38
            }
        ));
    }

    #[test]
    fn test_unpack_ignores_trailing_bytes() {
        let mut bytes = encode(&BuildOptions::default(), Message::LightStatePower { level: 1 });
        bytes.extend_from_slice(&[0xaa, 0xbb, 0xcc]);
        let raw = RawMessage::unpack(&bytes).unwrap();
        assert_eq!(raw.payload, vec![1, 0]);
    }

    #[test]
    fn test_unpack_size_below_header() {
        let mut bytes = encode(&BuildOptions::default(), Message::GetService);
        bytes[0] = 10;
        assert!(matches!(
            RawMessage::unpack(&bytes),
            Err(Error::ProtocolError(_))
        ));
    }

    #[test]
    fn test_truncated_light_state() {
        let state = Message::LightState {
            color: HSBK::new(1, 2, 3, 3500),
            reserved: 0,
            power: 0,
            label: LifxString::new("porch"),
            reserved2: 0,
        };
        let mut raw = RawMessage::build(&BuildOptions::default(), state).unwrap();
        assert_eq!(raw.payload.len(), 52);
        raw.payload.pop();
        match Message::from_raw(&raw) {
            Err(Error::PayloadTruncated { typ, needed, got }) => {
                assert_eq!(typ, 107);
                assert_eq!(needed, 52);
                assert_eq!(got, 51);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_service_and_port_layout() {
        let raw = RawMessage::build(
            &BuildOptions::default(),
            Message::StateService {
                port: 56700,
                service: Service::Udp,
            },
        )
        .unwrap();
        assert_eq!(raw.payload, vec![1, 0x7c, 0xdd, 0, 0]);

        let msg = Message::from_raw(&raw).unwrap();
        assert_eq!(
            msg,
            Message::StateService {
                port: 56700,
                service: Service::Udp
            }
        );
    }

    #[test]
    fn test_wire_payloads_build_back_identically() {
        // payloads laid out by hand, field by field, in wire order
        let cases: Vec<(u16, Vec<u8>)> = vec![
            // StateService: service, port
            (3, vec![1, 0x7c, 0xdd, 0, 0]),
            // StateHostFirmware: build, reserved, version
            (
                15,
                vec![
                    1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0x4d, 0, 2, 0,
                ],
            ),
            // StateVersion: vendor, product, version
            (33, vec![1, 0, 0, 0, 32, 0, 0, 0, 0, 0, 0, 0]),
            // LightSetColor: reserved, hsbk, duration
            (102, vec![0, 0x55, 0x55, 0xff, 0xff, 0xff, 0xff, 0xac, 0x0d, 0, 4, 0, 0]),
            // SetPower: level, duration
            (117, vec![0xff, 0xff, 0xe8, 0x03, 0, 0]),
            // SetColorZones: start, end, hsbk, duration, apply
            (501, vec![2, 5, 1, 0, 2, 0, 3, 0, 0xc4, 0x09, 0x10, 0, 0, 0, 1]),
            // GetColorZones: start, end
            (502, vec![8, 15]),
            // StateZone: count, index, hsbk
            (503, vec![16, 4, 1, 0, 2, 0, 3, 0, 0xc4, 0x09]),
        ];

        for (typ, payload) in cases {
            let mut raw = RawMessage::build(&BuildOptions::default(), Message::GetService).unwrap();
            raw.protocol_header.typ = typ;
            raw.payload = payload.clone();

            let msg = Message::from_raw(&raw).unwrap();
            assert_eq!(msg.get_num(), typ);
            let rebuilt = RawMessage::build(&BuildOptions::default(), msg.clone()).unwrap();
            assert_eq!(rebuilt.payload, payload, "payload of {:?}", msg);
        }
    }

    #[test]
    fn test_unknown_service_is_kept() {
        let raw = RawMessage::build(
            &BuildOptions::default(),
            Message::StateService {
                port: 0,
                service: Service::Reserved(5),
            },
        )
        .unwrap();
        assert!(matches!(
            Message::from_raw(&raw).unwrap(),
            Message::StateService {
                service: Service::Reserved(5),
                ..
            }
        ));
    }

    #[test]
    fn test_label_padding() {
        let raw = RawMessage::build(
            &BuildOptions::default(),
            Message::SetLabel {
                label: LifxString::new("Desk"),
            },
        )
        .unwrap();
        assert_eq!(raw.payload.len(), 32);
        assert_eq!(&raw.payload[..4], b"Desk");
        assert!(raw.payload[4..].iter().all(|&b| b == 0));

        match Message::from_raw(&raw).unwrap() {
            Message::SetLabel { label } => assert_eq!(label.as_str(), "Desk"),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_label_truncates_on_char_boundary() {
        // 31 ascii bytes followed by a two byte character
        let long = format!("{}é", "a".repeat(31));
        let label = LifxString::new(&long);
        assert_eq!(label.as_str().len(), 31);

        let label = LifxString::new(&"b".repeat(40));
        assert_eq!(label.as_str().len(), 32);
    }

    #[test]
    fn test_invalid_utf8_label_is_lossy() {
        let mut raw = RawMessage::build(
            &BuildOptions::default(),
            Message::StateLabel {
                label: LifxString::new("ab"),
            },
        )
        .unwrap();
        raw.payload[1] = 0xff;
        match Message::from_raw(&raw).unwrap() {
            Message::StateLabel { label } => assert_eq!(label.as_str(), "a\u{fffd}"),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_acknowledgement_carries_sequence() {
        let bytes = encode(
            &BuildOptions {
                sequence: 200,
                ..Default::default()
            },
            Message::Acknowledgement { seq: 200 },
        );
        assert_eq!(decode(&bytes).unwrap(), Message::Acknowledgement { seq: 200 });
    }

    #[test]
    fn test_set_color_extremes() {
        for (kelvin, duration) in [(KELVIN_MIN, 0), (KELVIN_MAX, u32::MAX)] {
            let msg = Message::LightSetColor {
                reserved: 0,
                color: HSBK::new(u16::MAX, 0, u16::MAX, kelvin),
                duration,
            };
            let bytes = encode(&BuildOptions::default(), msg.clone());
            assert_eq!(decode(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn test_state_multizone() {
        let mut colors = [HSBK::default(); MULTIZONE_COLORS];
        for (idx, color) in colors.iter_mut().enumerate() {
            *color = HSBK::new(idx as u16 * 1000, 65535, 65535, 3500);
        }
        let msg = Message::StateMultiZone {
            count: 16,
            index: 8,
            colors,
        };
        let raw = RawMessage::build(&BuildOptions::default(), msg.clone()).unwrap();
        assert_eq!(raw.payload.len(), 66);
        assert_eq!(Message::from_raw(&raw).unwrap(), msg);
    }

    #[test]
    fn test_set_extended_color_zones_is_padded() {
        let colors = vec![HSBK::new(100, 200, 300, 4000); 3];
        let raw = RawMessage::build(
            &BuildOptions::default(),
            Message::SetExtendedColorZones {
                duration: 250,
                apply: ApplicationRequest::Apply,
                zone_index: 4,
                colors: colors.clone(),
            },
        )
        .unwrap();
        assert_eq!(raw.payload.len(), 664);
        assert_eq!(raw.packed_size(), 700);
        // duration, apply, zone_index, count
        assert_eq!(&raw.payload[..8], &[250, 0, 0, 0, 1, 4, 0, 3]);
        assert!(raw.payload[8 + 3 * 8..].iter().all(|&b| b == 0));

        assert_eq!(
            Message::from_raw(&raw).unwrap(),
            Message::SetExtendedColorZones {
                duration: 250,
                apply: ApplicationRequest::Apply,
                zone_index: 4,
                colors,
            }
        );
    }

    #[test]
    fn test_too_many_extended_colors() {
        let err = RawMessage::build(
            &BuildOptions::default(),
            Message::SetExtendedColorZones {
                duration: 0,
                apply: ApplicationRequest::Apply,
                zone_index: 0,
                colors: vec![HSBK::default(); 83],
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::TooManyColors(83)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_state_extended_color_zones_unpadded() {
        // devices pad to 82 entries, but only `colors_count` of them have to be present
        let mut raw = RawMessage::build(
            &BuildOptions::default(),
            Message::StateExtendedColorZones {
                zones_count: 10,
                zone_index: 0,
                colors: vec![HSBK::new(1, 1, 1, 2700); 2],
            },
        )
        .unwrap();
        raw.payload.truncate(5 + 2 * 8);
        match Message::from_raw(&raw).unwrap() {
            Message::StateExtendedColorZones {
                zones_count,
                zone_index,
                colors,
            } => {
                assert_eq!(zones_count, 10);
                assert_eq!(zone_index, 0);
                assert_eq!(colors, vec![HSBK::new(1, 1, 1, 2700); 2]);
            }
            other => panic!("unexpected message {:?}", other),
        }

        raw.payload.truncate(5 + 8);
        assert!(matches!(
            Message::from_raw(&raw),
            Err(Error::PayloadTruncated {
                typ: 512,
                needed: 21,
                got: 13
            })
        ));
    }

    #[test]
    fn test_unknown_message_keeps_payload() {
        let bytes = encode(
            &BuildOptions::default(),
            Message::Unknown {
                typ: 58,
                payload: vec![1, 2, 3],
            },
        );
        assert_eq!(
            decode(&bytes).unwrap(),
            Message::Unknown {
                typ: 58,
                payload: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn test_kelvin_validation() {
        assert!(HSBK::new(0, 0, 0, 2500).validate().is_ok());
        assert!(HSBK::new(0, 0, 0, 9000).validate().is_ok());
        assert!(matches!(
            HSBK::new(0, 0, 0, 2499).validate(),
            Err(Error::KelvinOutOfRange(2499))
        ));
        assert!(matches!(
            HSBK::new(0, 0, 0, 9001).validate(),
            Err(Error::KelvinOutOfRange(9001))
        ));
    }

    #[test]
    fn test_from_rgb() {
        let red = HSBK::from_rgb(255, 0, 0, 3500);
        assert_eq!(red.hue, 0);
        assert_eq!(red.saturation, 65535);
        assert_eq!(red.kelvin, 3500);

        let blue = HSBK::from_rgb(0, 0, 255, 3500);
        assert_eq!(blue.hue, 43690);

        let white = HSBK::from_rgb(255, 255, 255, 6500);
        assert_eq!(white.saturation, 0);
        assert_eq!(white.brightness, 65535);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe_kelvin(3100), "Neutral Warm");
        assert_eq!(describe_kelvin(4200), "Cool Daylight");
        assert_eq!(HSBK::new(0, 0, 65535, 2700).describe(true), "2700K");
        assert_eq!(
            HSBK::new(0, 0, 65535, 2700).describe(false),
            "100% White (Incandescent)"
        );
    }
}

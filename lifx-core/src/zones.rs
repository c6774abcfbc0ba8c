//! Helpers for multizone devices (strips and beams).
//!
//! Legacy multizone devices are read eight zones at a time with [Message::GetColorZones]; the
//! [ZonePages] state machine tracks which zones have been seen.  Writing a short palette across a
//! longer strip is done with [spread_runs] and [spread_colors].

use crate::{Error, Message, HSBK, MULTIZONE_COLORS};

/// An inclusive range of zone indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRange {
    pub start: u16,
    pub end: u16,
}

impl ZoneRange {
    pub fn new(start: u16, end: u16) -> Result<ZoneRange, Error> {
        if start > end {
            return Err(Error::InvalidZoneRange { start, end });
        }
        Ok(ZoneRange { start, end })
    }

    pub fn single(index: u16) -> ZoneRange {
        ZoneRange {
            start: index,
            end: index,
        }
    }

    /// Number of zones covered by this range.
    pub fn zone_count(&self) -> usize {
        self.end.saturating_sub(self.start) as usize + 1
    }

    /// The range as used by [Message::SetColorZones], which only has room for 8-bit indexes.
    pub fn legacy_bounds(&self) -> Result<(u8, u8), Error> {
        match (u8::try_from(self.start), u8::try_from(self.end)) {
            (Ok(start), Ok(end)) => Ok((start, end)),
            _ => Err(Error::InvalidZoneRange {
                start: self.start,
                end: self.end,
            }),
        }
    }
}

/// Splits `zones` zones into one run per color.
///
/// Every run is `zones / colors` long, except the last one which also takes the remainder.
/// When there are more colors than zones, only the first `zones` colors get a (single zone) run.
pub fn spread_runs(colors: usize, zones: usize) -> Vec<ZoneRange> {
    let zones = zones.min(u16::MAX as usize + 1);
    if colors == 0 || zones == 0 {
        return Vec::new();
    }
    let runs = colors.min(zones);
    let len = zones / runs;
    (0..runs)
        .map(|idx| {
            let start = idx * len;
            let end = if idx + 1 == runs {
                zones - 1
            } else {
                start + len - 1
            };
            ZoneRange {
                start: start as u16,
                end: end as u16,
            }
        })
        .collect()
}

/// Expands a palette into one color per zone, following [spread_runs].
pub fn spread_colors(colors: &[HSBK], zones: usize) -> Vec<HSBK> {
    let mut palette = Vec::with_capacity(zones);
    for (run, color) in spread_runs(colors.len(), zones).iter().zip(colors) {
        palette.extend(std::iter::repeat(*color).take(run.zone_count()));
    }
    palette
}

/// Collects the replies to a series of [Message::GetColorZones] requests.
///
/// The total zone count is taken from the first reply.  Each reply places its colors at the
/// index it reports, and the next window starts right after the last zone it carried.
///
/// ```
/// use lifx_core::{Message, ZonePages, HSBK};
///
/// let mut pages = ZonePages::new();
/// assert_eq!(pages.next_window(), Some((0, 7)));
/// pages
///     .accept(&Message::StateMultiZone { count: 10, index: 0, colors: [HSBK::default(); 8] })
///     .unwrap();
/// assert_eq!(pages.next_window(), Some((8, 15)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZonePages {
    zones: Vec<Option<HSBK>>,
    total: Option<usize>,
    next: usize,
    read: usize,
}

impl ZonePages {
    pub fn new() -> ZonePages {
        ZonePages::default()
    }

    /// The total number of zones, once a reply has been seen.
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total, Some(total) if self.read >= total)
    }

    /// The `(start, end)` indexes to ask for next, or `None` once every zone has been read.
    pub fn next_window(&self) -> Option<(u8, u8)> {
        if self.is_complete() {
            return None;
        }
        let start = u8::try_from(self.next).ok()?;
        let end = (self.next + MULTIZONE_COLORS - 1).min(u8::MAX as usize) as u8;
        Some((start, end))
    }

    /// Records one [Message::StateMultiZone] or [Message::StateZone] reply.
    ///
    /// Returns the number of zones the reply contributed.
    pub fn accept(&mut self, msg: &Message) -> Result<usize, Error> {
        match msg {
            Message::StateMultiZone {
                count,
                index,
                colors,
            } => self.place(*count, *index, colors),
            Message::StateZone {
                count,
                index,
                color,
            } => self.place(*count, *index, std::slice::from_ref(color)),
            other => Err(Error::ProtocolError(format!(
                "message type {} is not a zone state",
                other.get_num()
            ))),
        }
    }

    fn place(&mut self, count: u8, index: u8, colors: &[HSBK]) -> Result<usize, Error> {
        let total = *self.total.get_or_insert(count as usize);
        if total == 0 {
            return Ok(0);
        }
        let index = index as usize;
        if index >= total {
            return Err(Error::ProtocolError(format!(
                "zone index {} is past the {} zones of this device",
                index, total
            )));
        }
        if self.zones.len() < total {
            self.zones.resize(total, None);
        }

        let valid = colors.len().min(total - index);
        let (next, read) = (self.next, self.read);
        for (offset, color) in colors[..valid].iter().enumerate() {
            let slot = &mut self.zones[index + offset];
            if slot.is_none() {
                self.read += 1;
            }
            *slot = Some(*color);
        }
        self.next = self.next.max(index + valid);

        if self.next == next && self.read == read && !self.is_complete() {
            return Err(Error::ProtocolError(format!(
                "zone reply at index {} made no progress",
                index
            )));
        }
        Ok(valid)
    }

    /// The colors read so far, in zone order.  Complete once [ZonePages::is_complete] is true.
    pub fn into_colors(self) -> Vec<HSBK> {
        self.zones.into_iter().flatten().collect()
    }
}

/// Root source of the time distributed by a grandmaster.
///
/// Only informational, the master selection ignores it. See *IEEE1588-2019
/// section 7.6.2.8*.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeSource {
    /// Directly connected atomic clock
    AtomicClock,
    /// Any satellite navigation system
    Gnss,
    /// Radio broadcast such as DCF77
    TerrestrialRadio,
    /// Time code over a serial line, such as IRIG-B
    SerialTimeCode,
    /// Another PTP domain
    Ptp,
    /// An NTP server
    Ntp,
    /// Set by hand, e.g. by an operator
    HandSet,
    /// Any other named source
    Other,
    /// A free running oscillator, what most small devices have
    #[default]
    InternalOscillator,
    /// `0xf0` to `0xfe`, holding the offset from `0xf0`
    ProfileSpecific(u8),
    /// Any value the table does not name, kept so it can be sent on
    /// unchanged
    Unknown(u8),
}

const TABLE: [(u8, TimeSource); 9] = [
    (0x10, TimeSource::AtomicClock),
    (0x20, TimeSource::Gnss),
    (0x30, TimeSource::TerrestrialRadio),
    (0x39, TimeSource::SerialTimeCode),
    (0x40, TimeSource::Ptp),
    (0x50, TimeSource::Ntp),
    (0x60, TimeSource::HandSet),
    (0x90, TimeSource::Other),
    (0xa0, TimeSource::InternalOscillator),
];

impl From<u8> for TimeSource {
    fn from(value: u8) -> Self {
        if let Some((_, source)) = TABLE.iter().find(|(raw, _)| *raw == value) {
            return *source;
        }

        match value {
            0xf0..=0xfe => Self::ProfileSpecific(value - 0xf0),
            other => Self::Unknown(other),
        }
    }
}

impl From<TimeSource> for u8 {
    fn from(source: TimeSource) -> Self {
        match source {
            TimeSource::ProfileSpecific(offset) => 0xf0 | (offset & 0x0f),
            TimeSource::Unknown(raw) => raw,
            named => TABLE
                .iter()
                .find(|(_, source)| *source == named)
                .map_or(0xff, |(raw, _)| *raw),
        }
    }
}

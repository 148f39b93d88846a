use bilge::prelude::*;

/// Address byte the sensor puts at the head of every reply
pub const ADDRESS: u8 = 0x81;
/// A BINS reply is never shorter than this
pub const MIN_FRAME_LEN: usize = 23;
/// MSB offsets of the five bin counters.
/// Bytes 11-12 are reserved by the sensor firmware, so the last bin sits at 13
/// and not at 11.
pub const BINS_OFFSETS: [usize; 5] = [3, 5, 7, 9, 13];
/// Key names the bridge firmware uses for bins 0 to 4, in bin order
pub const FIRMWARE_BIN_KEYS: [&str; 5] = ["ch_0_3_0_5", "ch_0_5_1", "ch_1_2_5", "ch_2_5_5", "ch_5_10"];
/// First sensor firmware that answers the BINS command
pub const MIN_BINS_FIRMWARE: u16 = 1047;

/// Averaging window, taken from the command byte of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    TenSeconds = 0x25,
    OneMinute = 0x26,
    FifteenMinutes = 0x27,
}

impl TryFrom<u8> for Average {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == Average::TenSeconds as u8 => Ok(Average::TenSeconds),
            x if x == Average::OneMinute as u8 => Ok(Average::OneMinute),
            x if x == Average::FifteenMinutes as u8 => Ok(Average::FifteenMinutes),
            x => Err(x),
        }
    }
}

/// Sensor status byte. All bits clear means the sensor is measuring normally.
#[bitsize(8)]
#[derive(DebugBits, Clone, Copy, FromBits)]
pub struct SensorState {
    pub sleep: bool,
    pub degraded: bool,
    pub not_ready: bool,
    pub heat_error: bool,
    pub trh_error: bool,
    pub fan_error: bool,
    pub memory_error: bool,
    pub laser_error: bool,
}

impl SensorState {
    pub fn is_nominal(&self) -> bool {
        self.value == 0
    }

    /// Any of the hardware fault bits, as opposed to the sleep/degraded/warm-up modes
    pub fn has_fault(&self) -> bool {
        self.heat_error() || self.trh_error() || self.fan_error() || self.memory_error() || self.laser_error()
    }
}

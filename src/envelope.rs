use alloc::string::String;
use serde::Deserialize;

use crate::{
    bins::{BinOffsetTable, BinSet, DecodeError, MAX_BINS},
    hex::decode_hex,
    nextpm::{FIRMWARE_BIN_KEYS, MIN_BINS_FIRMWARE, SensorState},
};

/// One JSON line sent back by the ESP32 bridge
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub info: String,
    pub ok: bool,
    pub nextpm: Option<NextPmStatus>,
    pub bins: Option<FirmwareBins>,
    pub raw: Option<String>,
    pub avg: Option<String>,
    pub fw_esp32: Option<String>,
    pub ts_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextPmStatus {
    pub state: Option<u8>,
    pub chk_ok: Option<bool>,
    pub fw: Option<FirmwareVersion>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FirmwareVersion {
    pub u16_swap: u16,
}

/// Bins already decoded by the bridge, under its own key names.
/// The bridge sends the dotted spelling (`ch_0.3_0.5`), older builds the
/// underscore one. Values are kept wide so an out of range count can be
/// reported instead of failing the whole line.
#[derive(Debug, Clone, Deserialize)]
pub struct FirmwareBins {
    #[serde(alias = "ch_0.3_0.5")]
    pub ch_0_3_0_5: Option<u64>,
    #[serde(alias = "ch_0.5_1")]
    pub ch_0_5_1: Option<u64>,
    #[serde(alias = "ch_1_2.5")]
    pub ch_1_2_5: Option<u64>,
    #[serde(alias = "ch_2.5_5")]
    pub ch_2_5_5: Option<u64>,
    pub ch_5_10: Option<u64>,
}

impl FirmwareBins {
    /// Values in bin order, `None` where the bridge left a key out
    pub fn values(&self) -> [Option<u64>; 5] {
        [self.ch_0_3_0_5, self.ch_0_5_1, self.ch_1_2_5, self.ch_2_5_5, self.ch_5_10]
    }

    pub fn to_bin_set(&self) -> Result<BinSet, EnvelopeError> {
        let mut values = heapless::Vec::<u16, MAX_BINS>::new();
        for (bin, value) in self.values().into_iter().enumerate() {
            let value = value.ok_or(EnvelopeError::MissingBinKey(FIRMWARE_BIN_KEYS[bin]))?;
            let value = u16::try_from(value).map_err(|_| EnvelopeError::BinOutOfRange { bin, value })?;
            let _ = values.push(value);
        }
        Ok(BinSet::from_values(values))
    }
}

#[derive(Debug)]
pub enum EnvelopeError {
    Json(serde_json::Error),
    /// Neither `bins` nor `raw` present
    MissingBins,
    MissingBinKey(&'static str),
    BinOutOfRange {
        bin: usize,
        value: u64,
    },
    Decode(DecodeError),
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(value: serde_json::Error) -> Self {
        EnvelopeError::Json(value)
    }
}

impl From<DecodeError> for EnvelopeError {
    fn from(value: DecodeError) -> Self {
        EnvelopeError::Decode(value)
    }
}

impl Response {
    pub fn parse_line(line: &str) -> Result<Response, EnvelopeError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Bins of a BINS reply. `raw` is decoded against `table` when present;
    /// the bridge's own `bins` object is only read without it, since the
    /// bridge can mis-encode those counts as 32 bit values.
    pub fn bin_set(&self, table: &BinOffsetTable) -> Result<BinSet, EnvelopeError> {
        if let Some(raw) = &self.raw {
            return Ok(decode_hex(raw, table)?);
        }
        match &self.bins {
            Some(bins) => bins.to_bin_set(),
            None => Err(EnvelopeError::MissingBins),
        }
    }

    /// `nextpm.chk_ok`, `None` when the bridge did not report it
    pub fn checksum_ok(&self) -> Option<bool> {
        self.nextpm.as_ref().and_then(|n| n.chk_ok)
    }

    pub fn firmware(&self) -> Option<u16> {
        self.nextpm.as_ref().and_then(|n| n.fw).map(|fw| fw.u16_swap)
    }

    /// Whether the sensor firmware answers BINS. Unknown without a FW reply.
    pub fn bins_supported(&self) -> Option<bool> {
        self.firmware().map(|fw| fw >= MIN_BINS_FIRMWARE)
    }

    pub fn sensor_state(&self) -> Option<SensorState> {
        self.nextpm.as_ref().and_then(|n| n.state).map(SensorState::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_REPLY: &str = r#"{"info":"BINS","ok":true,"avg":"10s","nextpm":{"state":0,"chk_ok":false},"raw":"81 25 00 00 02 C5 B0 00 00 07 57 00 00 01 BC 00 00 00 00 00 00 00 00"}"#;

    #[test]
    fn raw_reply_is_decoded() {
        let r = Response::parse_line(RAW_REPLY).unwrap();
        assert_eq!(r.info, "BINS");
        assert!(r.ok);
        assert_eq!(r.avg.as_deref(), Some("10s"));
        assert_eq!(r.checksum_ok(), Some(false));
        assert!(r.sensor_state().unwrap().is_nominal());
        let bins = r.bin_set(&BinOffsetTable::NEXTPM).unwrap();
        assert_eq!(bins.as_slice(), &[2, 50608, 0, 1879, 444]);
    }

    #[test]
    fn raw_wins_over_structured_bins() {
        // ch_0_5_1 carries the bridge's 32 bit encoding of 51120
        let line = concat!(
            r#"{"info":"bins","ok":true,"bins":{"ch_0_3_0_5":2,"ch_0_5_1":4294953136,"ch_1_2_5":0,"ch_2_5_5":1315,"ch_5_10":444},"#,
            r#""raw":"81 25 00 00 02 C7 B0 00 00 05 23 00 00 01 BC 00 00 00 00 00 00 00 00"}"#
        );
        let r = Response::parse_line(line).unwrap();
        let bins = r.bin_set(&BinOffsetTable::NEXTPM).unwrap();
        assert_eq!(bins.as_slice(), &[2, 51120, 0, 1315, 444]);

        // a bad raw frame is reported, not papered over with bins
        let line = r#"{"info":"bins","ok":true,"bins":{"ch_0_3_0_5":1,"ch_0_5_1":2,"ch_1_2_5":3,"ch_2_5_5":4,"ch_5_10":5},"raw":"81 25"}"#;
        let r = Response::parse_line(line).unwrap();
        assert!(matches!(
            r.bin_set(&BinOffsetTable::NEXTPM),
            Err(EnvelopeError::Decode(DecodeError::FrameTooShort { found: 2, .. }))
        ));
    }

    #[test]
    fn structured_bins_without_raw() {
        let line = r#"{"info":"bins","ok":true,"bins":{"ch_0_3_0_5":1,"ch_0_5_1":2,"ch_1_2_5":3,"ch_2_5_5":4,"ch_5_10":5}}"#;
        let r = Response::parse_line(line).unwrap();
        assert_eq!(r.bin_set(&BinOffsetTable::NEXTPM).unwrap().as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn dotted_bin_keys() {
        let line = r#"{"info":"bins","ok":true,"bins":{"ch_0.3_0.5":10,"ch_0.5_1":20,"ch_1_2.5":30,"ch_2.5_5":40,"ch_5_10":50}}"#;
        let r = Response::parse_line(line).unwrap();
        assert_eq!(r.bin_set(&BinOffsetTable::NEXTPM).unwrap().as_slice(), &[10, 20, 30, 40, 50]);
    }

    #[test]
    fn structured_bin_errors() {
        let line = r#"{"info":"BINS","ok":true,"bins":{"ch_0_3_0_5":1,"ch_0_5_1":70000,"ch_1_2_5":3,"ch_2_5_5":4,"ch_5_10":5}}"#;
        let r = Response::parse_line(line).unwrap();
        assert!(matches!(
            r.bin_set(&BinOffsetTable::NEXTPM),
            Err(EnvelopeError::BinOutOfRange { bin: 1, value: 70000 })
        ));

        let line = r#"{"info":"BINS","ok":true,"bins":{"ch_0_3_0_5":1,"ch_0_5_1":2,"ch_1_2_5":3,"ch_2_5_5":4}}"#;
        let r = Response::parse_line(line).unwrap();
        assert!(matches!(
            r.bin_set(&BinOffsetTable::NEXTPM),
            Err(EnvelopeError::MissingBinKey("ch_5_10"))
        ));
    }

    #[test]
    fn raw_errors_surface() {
        let r = Response::parse_line(r#"{"info":"BINS","ok":true,"raw":"81 25 00"}"#).unwrap();
        assert!(matches!(
            r.bin_set(&BinOffsetTable::NEXTPM),
            Err(EnvelopeError::Decode(DecodeError::FrameTooShort { found: 3, .. }))
        ));

        let r = Response::parse_line(r#"{"info":"BINS","ok":true,"raw":"81 ZZ"}"#).unwrap();
        assert!(matches!(
            r.bin_set(&BinOffsetTable::NEXTPM),
            Err(EnvelopeError::Decode(DecodeError::MalformedToken { index: 1, .. }))
        ));

        let r = Response::parse_line(r#"{"info":"PING","ok":true}"#).unwrap();
        assert!(matches!(r.bin_set(&BinOffsetTable::NEXTPM), Err(EnvelopeError::MissingBins)));
    }

    #[test]
    fn firmware_reply() {
        let line = r#"{"info":"FW","ok":true,"fw_esp32":"1.0.3","nextpm":{"state":0,"chk_ok":true,"fw":{"u16_swap":1047}},"ts_ms":12345}"#;
        let r = Response::parse_line(line).unwrap();
        assert_eq!(r.firmware(), Some(1047));
        assert_eq!(r.bins_supported(), Some(true));
        assert_eq!(r.fw_esp32.as_deref(), Some("1.0.3"));
        assert_eq!(r.ts_ms, Some(12345));

        let line = r#"{"info":"FW","ok":true,"nextpm":{"fw":{"u16_swap":1046}}}"#;
        assert_eq!(Response::parse_line(line).unwrap().bins_supported(), Some(false));

        let line = r#"{"info":"PING","ok":true}"#;
        assert_eq!(Response::parse_line(line).unwrap().bins_supported(), None);
    }

    #[test]
    fn not_json() {
        assert!(matches!(Response::parse_line("NextPM bridge booting"), Err(EnvelopeError::Json(_))));
        // info is required
        assert!(matches!(Response::parse_line(r#"{"ok":true}"#), Err(EnvelopeError::Json(_))));
    }
}

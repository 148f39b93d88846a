use alloc::string::String;
use core::ops::Index;

use crate::{
    Decode,
    nextpm::{ADDRESS, Average, BINS_OFFSETS, MIN_FRAME_LEN, SensorState},
};

/// Largest offset table (and so the largest BinSet) we carry without allocating
pub const MAX_BINS: usize = 16;

/// Error type for turning bytes or text into a BinSet.
///
/// `FrameTooShort`, `OffsetOutOfRange` and `MalformedToken` describe a frame
/// that does not fit its layout. `EmptyOffsetTable` and `TooManyOffsets` come
/// only from `BinOffsetTable::new`: a table must hold between 1 and `MAX_BINS`
/// offsets, since a BinSet is stored inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    FrameTooShort {
        expected_at_least: usize,
        found: usize,
    },
    /// `offset` or `offset + 1` falls past the end of the frame
    OffsetOutOfRange {
        bin: usize,
        offset: usize,
        frame_len: usize,
    },
    /// Raw text token that is not exactly two hex digits
    MalformedToken {
        index: usize,
        token: String,
    },
    EmptyOffsetTable,
    /// More than `MAX_BINS` offsets
    TooManyOffsets {
        max: usize,
        found: usize,
    },
}

/// Byte offsets of the MSB of each big-endian u16 bin, in bin order.
///
/// The table is protocol configuration. It must not be derived from
/// `bin count * 2` since the sensor leaves reserved bytes between bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinOffsetTable<'a> {
    offsets: &'a [usize],
}

impl<'a> BinOffsetTable<'a> {
    /// Layout of the NextPM BINS reply
    pub const NEXTPM: BinOffsetTable<'static> = BinOffsetTable { offsets: &BINS_OFFSETS };

    pub fn new(offsets: &'a [usize]) -> Result<BinOffsetTable<'a>, DecodeError> {
        if offsets.is_empty() {
            return Err(DecodeError::EmptyOffsetTable);
        }
        if offsets.len() > MAX_BINS {
            return Err(DecodeError::TooManyOffsets {
                max: MAX_BINS,
                found: offsets.len(),
            });
        }
        Ok(BinOffsetTable { offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &'a [usize] {
        self.offsets
    }

    /// Check every offset against a frame of `frame_len` bytes
    pub fn check_fits(&self, frame_len: usize) -> Result<(), DecodeError> {
        for (bin, &offset) in self.offsets.iter().enumerate() {
            // offset + 1 must index into the frame, and must not overflow
            match offset.checked_add(1) {
                Some(lsb) if lsb < frame_len => {}
                _ => {
                    return Err(DecodeError::OffsetOutOfRange {
                        bin,
                        offset,
                        frame_len,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for BinOffsetTable<'static> {
    fn default() -> Self {
        BinOffsetTable::NEXTPM
    }
}

/// Decoded bin counters, index `i` taken from offset table entry `i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinSet {
    values: heapless::Vec<u16, MAX_BINS>,
}

impl BinSet {
    pub(crate) fn from_values(values: heapless::Vec<u16, MAX_BINS>) -> BinSet {
        BinSet { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, bin: usize) -> Option<u16> {
        self.values.get(bin).copied()
    }

    pub fn as_slice(&self) -> &[u16] {
        self.values.as_slice()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, u16)> + '_ {
        self.values.iter().copied().enumerate()
    }

    pub fn total(&self) -> u32 {
        self.values.iter().map(|v| *v as u32).sum()
    }
}

impl Index<usize> for BinSet {
    type Output = u16;

    fn index(&self, bin: usize) -> &Self::Output {
        &self.values[bin]
    }
}

/// Decode the bins of `frame` at the offsets of `table`.
///
/// A frame shorter than `MIN_FRAME_LEN` is rejected before the table is looked
/// at. Each field is rebuilt MSB first: `(frame[o] << 8) | frame[o + 1]`.
pub fn decode(frame: &[u8], table: &BinOffsetTable) -> Result<BinSet, DecodeError> {
    if frame.len() < MIN_FRAME_LEN {
        log::warn!("rejecting BINS frame of {} bytes", frame.len());
        return Err(DecodeError::FrameTooShort {
            expected_at_least: MIN_FRAME_LEN,
            found: frame.len(),
        });
    }
    table.check_fits(frame.len())?;

    let mut values = heapless::Vec::<u16, MAX_BINS>::new();
    for &offset in table.offsets() {
        let value = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
        // table length is capped at MAX_BINS on construction
        let _ = values.push(value);
    }
    log::trace!("decoded bins {:?}", values);
    Ok(BinSet::from_values(values))
}

/// Read-only view over a BINS reply frame
#[derive(Debug, Clone, Copy)]
pub struct BinsFrame<'a> {
    data: &'a [u8],
}

impl<'a> BinsFrame<'a> {
    pub fn address(&self) -> u8 {
        self.data[0]
    }

    pub fn command(&self) -> u8 {
        self.data[1]
    }

    /// `None` for a command byte that is not one of the BINS averages
    pub fn average(&self) -> Option<Average> {
        Average::try_from(self.command()).ok()
    }

    pub fn state(&self) -> SensorState {
        SensorState::from(self.data[2])
    }

    /// All bytes of a reply, checksum included, sum to 0 mod 256.
    ///
    /// Informational only. Some sensor firmware (1047) sends bad checksums on
    /// otherwise valid data, so nothing here is rejected on it.
    pub fn checksum_ok(&self) -> bool {
        self.data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) == 0
    }

    pub fn bins(&self, table: &BinOffsetTable) -> Result<BinSet, DecodeError> {
        decode(self.data, table)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

impl<'a> Decode<'a> for BinsFrame<'a> {
    type Error = DecodeError;

    fn decode(data: &'a [u8]) -> Result<Self, Self::Error> {
        if data.len() < MIN_FRAME_LEN {
            return Err(DecodeError::FrameTooShort {
                expected_at_least: MIN_FRAME_LEN,
                found: data.len(),
            });
        }
        if data[0] != ADDRESS {
            log::debug!("unexpected address byte {:#04x} in BINS frame", data[0]);
        }
        let frame = BinsFrame { data };
        if !frame.checksum_ok() {
            log::warn!("BINS frame checksum mismatch");
        }
        Ok(frame)
    }
}

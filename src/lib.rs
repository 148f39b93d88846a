#![no_std]

extern crate alloc;

pub mod bins;
pub mod envelope;
pub mod hex;
pub mod nextpm;
pub mod serial;

pub trait Decode<'a> where Self: Sized {
    type Error;

    fn decode(data: &'a [u8]) -> Result<Self, Self::Error>;
}

pub use bins::{BinOffsetTable, BinSet, BinsFrame, DecodeError, decode};
pub use envelope::{EnvelopeError, Response};
pub use hex::{decode_hex, parse_hex_frame};
pub use nextpm::{Average, SensorState};
pub use serial::{LineError, LineRx, ResponseRx, RxStats};

use alloc::string::String;
use embedded_hal_nb::serial::Read;

use crate::envelope::Response;

/// Longest reply line we hold before giving up on it
pub const MAX_LINE_LEN: usize = 512;

#[derive(Debug)]
pub enum LineError<ReadError> {
    Read(ReadError),
    /// Line grew past MAX_LINE_LEN; the rest of it is dropped up to the next `\n`
    Overflow,
    InvalidUtf8,
}

/// Splits a byte stream from a serial Read into `\n` terminated lines
#[derive(Debug)]
pub struct LineRx<Rx: Read> {
    pub rx: Rx,
    buf: heapless::Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl<Rx: Read> LineRx<Rx> {
    pub fn new(rx: Rx) -> LineRx<Rx> {
        LineRx {
            rx,
            buf: heapless::Vec::new(),
            discarding: false,
        }
    }

    /// Bytes of the line received so far
    pub fn pending(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// Read until a complete, non blank line is available.
    /// Surrounding whitespace (including the `\r` of `\r\n`) is trimmed.
    pub fn recv_line(&mut self) -> nb::Result<String, LineError<Rx::Error>> {
        loop {
            let c = self.rx.read().map_err(|e| e.map(LineError::Read))?;
            if c == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                let line = core::str::from_utf8(&self.buf).map(|s| String::from(s.trim()));
                self.buf.clear();
                match line {
                    Ok(line) if line.is_empty() => continue,
                    Ok(line) => return Ok(line),
                    Err(_) => return Err(nb::Error::Other(LineError::InvalidUtf8)),
                }
            }
            if self.discarding {
                continue;
            }
            if self.buf.push(c).is_err() {
                log::warn!("dropping serial line longer than {} bytes", MAX_LINE_LEN);
                self.buf.clear();
                self.discarding = true;
                return Err(nb::Error::Other(LineError::Overflow));
            }
        }
    }
}

/// Counters kept while receiving replies
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RxStats {
    pub responses_received: u32,
    pub checksum_failures: u32,
    /// Non blank lines that were not a bridge reply (boot banners, partial JSON)
    pub skipped_lines: u32,
}

/// Yields bridge replies out of the serial line stream
#[derive(Debug)]
pub struct ResponseRx<Rx: Read> {
    pub lines: LineRx<Rx>,
    stats: RxStats,
}

impl<Rx: Read> ResponseRx<Rx> {
    pub fn new(rx: Rx) -> ResponseRx<Rx> {
        ResponseRx {
            lines: LineRx::new(rx),
            stats: RxStats::default(),
        }
    }

    pub fn stats(&self) -> RxStats {
        self.stats
    }

    /// Next line that parses as a reply. Other lines are counted and skipped.
    pub fn recv(&mut self) -> nb::Result<Response, LineError<Rx::Error>> {
        loop {
            let line = match self.lines.recv_line() {
                Ok(line) => line,
                Err(nb::Error::Other(LineError::InvalidUtf8)) => {
                    self.stats.skipped_lines = self.stats.skipped_lines.saturating_add(1);
                    continue;
                }
                Err(e) => return Err(e),
            };
            log::debug!("RX {}", line);
            match Response::parse_line(&line) {
                Ok(response) => {
                    self.stats.responses_received = self.stats.responses_received.saturating_add(1);
                    if response.checksum_ok() == Some(false) {
                        self.stats.checksum_failures = self.stats.checksum_failures.saturating_add(1);
                        log::warn!("sensor checksum failure in {} reply", response.info);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    log::debug!("skipping non reply line: {:?}", e);
                    self.stats.skipped_lines = self.stats.skipped_lines.saturating_add(1);
                }
            }
        }
    }
}

//! 90 kHz clock values: `PTS`/`DTS` timestamps and the pack `SCR`.
//!
//! Useful reference: [System Time Clock](http://www.bretl.com/mpeghtml/STC.HTM)

use nom::{bits::complete::take, IResult, Parser as _};
use std::fmt;

/// Bit-granular nom input, as used inside `nom::bits::bits` closures.
pub(crate) type BitInput<'a> = (&'a [u8], usize);

/// A 33-bit timestamp counting 90 kHz ticks (`PTS`, `DTS`, `TREF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    ticks: u64,
}

impl Timestamp {
    /// Wrap a raw 33-bit tick count.
    #[must_use]
    pub const fn new(ticks: u64) -> Self {
        Self { ticks }
    }

    /// The raw 90 kHz tick count.
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.ticks
    }

    /// Convert to seconds.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn as_seconds(self) -> f64 {
        self.ticks as f64 / 90_000.0
    }
}

impl fmt::Display for Timestamp {
    /// Formats as `HH:MM:SS.mmmmmm`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let micros = self.ticks * 100 / 9;
        let hours = (micros / 3_600_000_000) % 24;
        let minutes = (micros / 60_000_000) % 60;
        let seconds = (micros / 1_000_000) % 60;
        let micros = micros % 1_000_000;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
    }
}

/// The System Clock Reference of a pack: a 33-bit 90 kHz base plus a
/// 9-bit extension counting 1/300th ticks of the 27 MHz system clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scr {
    base: u64,
    extension: u16,
}

impl Scr {
    /// Assemble from the raw base and extension fields.
    #[must_use]
    pub const fn new(base: u64, extension: u16) -> Self {
        Self { base, extension }
    }

    /// The 33-bit 90 kHz base.
    #[must_use]
    pub const fn base(self) -> u64 {
        self.base
    }

    /// The 9-bit extension.
    #[must_use]
    pub const fn extension(self) -> u16 {
        self.extension
    }

    /// The full 42-bit reference, `300 * base + extension`, in 27 MHz
    /// ticks.
    #[must_use]
    pub const fn value(self) -> u64 {
        300 * self.base + self.extension as u64
    }

    /// Convert to seconds.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn as_seconds(self) -> f64 {
        self.value() as f64 / 27_000_000.0
    }
}

impl fmt::Display for Scr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}+{}", Timestamp::new(self.base), self.extension)
    }
}

/// Parse a 33-bit timestamp interleaved with 3 marker bits, consuming 36
/// bits. The marker values are returned for the caller to check.
pub(crate) fn timestamp(input: BitInput) -> IResult<BitInput, (Timestamp, [u8; 3])> {
    let (input, (hi, m0, mid, m1, lo, m2)): (_, (u64, u8, u64, u8, u64, u8)) = (
        take(3usize),
        take(1usize),
        take(15usize),
        take(1usize),
        take(15usize),
        take(1usize),
    )
        .parse(input)?;
    let ticks = (hi << 30) | (mid << 15) | lo;
    Ok((input, (Timestamp::new(ticks), [m0, m1, m2])))
}

/// Parse an `SCR` base and extension interleaved with 4 marker bits,
/// consuming 46 bits. The marker values are returned for the caller to
/// check.
pub(crate) fn scr_and_ext(input: BitInput) -> IResult<BitInput, (Scr, [u8; 4])> {
    let (input, ((base, [m0, m1, m2]), extension, m3)): (_, (_, u16, u8)) =
        (timestamp, take(9usize), take(1usize)).parse(input)?;
    Ok((
        input,
        (Scr::new(base.ticks(), extension), [m0, m1, m2, m3]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clock_bits() {
        // 36 bits: 001 1 011110000111110 1 000011111000011 1
        let data = [0b0011_0111, 0b1000_0111, 0b1101_0000, 0b1111_1000, 0b0111_0000];
        let (rest, (ts, markers)) = timestamp((&data[..], 0)).unwrap();
        assert_eq!(rest.1, 4);
        assert_eq!(markers, [1, 1, 1]);
        assert_eq!(
            ts.ticks(),
            (0b001 << 30) | (0b011_110_000_111_110 << 15) | 0b000_011_111_000_011
        );
    }

    #[test]
    fn display_is_wall_clock() {
        // 1 hour, 2 minutes, 3.5 seconds.
        let ticks = (3600 + 120 + 3) * 90_000 + 45_000;
        assert_eq!(Timestamp::new(ticks).to_string(), "01:02:03.500000");
        assert_eq!(Timestamp::new(0).to_string(), "00:00:00.000000");
    }

    #[test]
    fn scr_combines_base_and_extension() {
        let scr = Scr::new(100, 7);
        assert_eq!(scr.value(), 30_007);
        assert_eq!(Scr::new(0, 0).value(), 0);
    }
}

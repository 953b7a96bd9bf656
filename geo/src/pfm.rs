use std::io::{self, BufRead, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::color::Color;
use crate::hdrimage::HdrImage;

/// Errors reading a PFM stream: a malformed header, or a payload shorter
/// than the header promised.
#[derive(Debug)]
pub enum PfmError {
    InvalidMagic,
    InvalidDimensions,
    InvalidEndianness,
    Io(io::Error),
}

impl From<io::Error> for PfmError {
    fn from(e: io::Error) -> Self {
        PfmError::Io(e)
    }
}

impl std::fmt::Display for PfmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PfmError::InvalidMagic => write!(f, "invalid PFM magic, expected \"PF\""),
            PfmError::InvalidDimensions => write!(f, "invalid PFM dimensions line"),
            PfmError::InvalidEndianness => write!(f, "invalid PFM endianness line"),
            PfmError::Io(e) => write!(f, "I/O error reading PFM: {e}"),
        }
    }
}

impl std::error::Error for PfmError {}

fn read_line(r: &mut impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    r.read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}

/// Read a color-PFM stream into an `HdrImage`. The PFM row order is
/// bottom-to-top; rows are flipped into the top-to-bottom order
/// `HdrImage` stores internally.
pub fn read_pfm(r: &mut impl BufRead) -> Result<HdrImage, PfmError> {
    let magic = read_line(r)?;
    if magic != "PF" {
        return Err(PfmError::InvalidMagic);
    }

    let dims = read_line(r)?;
    let mut parts = dims.split_whitespace();
    let width: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or(PfmError::InvalidDimensions)?;
    let height: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or(PfmError::InvalidDimensions)?;
    if parts.next().is_some() {
        return Err(PfmError::InvalidDimensions);
    }

    let scale: f32 = read_line(r)?.parse().map_err(|_| PfmError::InvalidEndianness)?;
    let little_endian = scale < 0.0;

    let mut img = HdrImage::new(width, height);

    // PFM stores rows bottom-to-top.
    for y in (0..height).rev() {
        for x in 0..width {
            let (r_, g_, b_) = if little_endian {
                (r.read_f32::<LittleEndian>()?, r.read_f32::<LittleEndian>()?, r.read_f32::<LittleEndian>()?)
            } else {
                (r.read_f32::<BigEndian>()?, r.read_f32::<BigEndian>()?, r.read_f32::<BigEndian>()?)
            };
            img.set(x, y, Color::new(r_, g_, b_));
        }
    }

    Ok(img)
}

/// Write an `HdrImage` as a color PFM stream, big-endian, bottom-to-top
/// row order.
pub fn write_pfm(w: &mut impl Write, img: &HdrImage) -> io::Result<()> {
    writeln!(w, "PF")?;
    writeln!(w, "{} {}", img.width(), img.height())?;
    writeln!(w, "1.0")?;

    for y in (0..img.height()).rev() {
        for x in 0..img.width() {
            let c = img.get(x, y);
            w.write_f32::<BigEndian>(c.r)?;
            w.write_f32::<BigEndian>(c.g)?;
            w.write_f32::<BigEndian>(c.b)?;
        }
    }

    Ok(())
}

/// Helper for callers that hold an owned byte buffer rather than a
/// `BufRead`.
pub fn read_pfm_bytes(bytes: &[u8]) -> Result<HdrImage, PfmError> {
    let mut cursor = io::BufReader::new(bytes);
    read_pfm(&mut cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut img = HdrImage::new(2, 2);
        img.set(0, 0, Color::new(1.0e1, 2.0e1, 3.0e1));
        img.set(1, 0, Color::new(4.0e1, 5.0e1, 6.0e1));
        img.set(0, 1, Color::new(7.0e1, 8.0e1, 9.0e1));
        img.set(1, 1, Color::new(1.0e2, 1.1e2, 1.2e2));

        let mut buf = Vec::new();
        write_pfm(&mut buf, &img).unwrap();

        let read_back = read_pfm_bytes(&buf).unwrap();
        assert_eq!(read_back, img);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let bytes = b"XY\n2 2\n1.0\n";
        assert!(matches!(read_pfm_bytes(bytes), Err(PfmError::InvalidMagic)));
    }
}

use std::io::{self, Read};

use crate::BoxVec;

#[rustfmt::skip]
pub const MAGICINTS: [i32; 73] = [
    0,        0,        0,       0,       0,       0,       0,       0,       0,       8,
    10,       12,       16,      20,      25,      32,      40,      50,      64,      80,
    101,      128,      161,     203,     256,     322,     406,     512,     645,     812,
    1024,     1290,     1625,    2048,    2580,    3250,    4096,    5060,    6501,    8192,
    10321,    13003,    16384,   20642,   26007,   32768,   41285,   52015,   65536,   82570,
    104031,   131072,   165140,  208063,  262144,  330280,  416127,  524287,  660561,  832255,
    1048576,  1321122,  1664510, 2097152, 2642245, 3329021, 4194304, 5284491, 6658042, 8388607,
    10568983, 13316085, 16777216
];
pub const FIRSTIDX: usize = 9; // Note that MAGICINTS[FIRSTIDX-1] == 0.
pub const LASTIDX: usize = MAGICINTS.len() - 1;

/// The header that precedes the positions of every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub natoms: usize,
    pub step: u32,
    /// Time in picoseconds.
    pub time: f32,
    pub boxvec: BoxVec,
}

impl Header {
    pub const MAGIC: i32 = 1995;
    /// Size of the header in bytes, including the repeated atom count.
    pub const SIZE: usize = 4 * 4 + 9 * 4 + 4;

    /// Reads a [`Header`], returning [`None`] if the reader is exhausted before the first byte.
    ///
    /// A header that is cut off halfway is an [`io::ErrorKind::UnexpectedEof`] error.
    pub fn read<R: Read>(file: &mut R) -> io::Result<Option<Self>> {
        let magic = match read_magic(file)? {
            Some(magic) => magic,
            None => return Ok(None),
        };
        if magic != Self::MAGIC {
            return Err(invalid_data(format!(
                "found invalid magic number '{magic}' ({magic:#0x})"
            )));
        }
        let natoms: usize = read_i32(file)?
            .try_into()
            .map_err(|_| invalid_data("natoms must be a positive integer"))?;
        let step: u32 = read_i32(file)?
            .try_into()
            .map_err(|_| invalid_data("step must be a positive integer"))?;
        let time = read_f32(file)?;
        let boxvec = read_boxvec(file)?;

        // The number of atoms is repeated at the start of the coordinate section.
        let natoms_repeated = read_i32(file)?;
        if natoms_repeated as i64 != natoms as i64 {
            return Err(invalid_data(format!(
                "header declares {natoms} atoms, but the coordinates declare {natoms_repeated}"
            )));
        }

        Ok(Some(Self {
            natoms,
            step,
            time,
            boxvec,
        }))
    }
}

pub(crate) fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Reads positions stored as plain floats, which is how frames with at most 9 atoms are stored.
pub fn read_uncompressed_positions<R: Read>(file: &mut R, positions: &mut [f32]) -> io::Result<()> {
    read_f32s(file, positions)
}

/// Reads and decompresses the positions of a frame into `positions`.
///
/// The number of atoms is taken from the length of `positions`, which must be divisible by 3.
/// The compressed bytes are read into `scratch`, so its contents should not be depended upon.
pub fn read_compressed_positions<R: Read>(
    file: &mut R,
    positions: &mut [f32],
    precision: f32,
    scratch: &mut Vec<u8>,
) -> io::Result<()> {
    let n = positions.len();
    assert_eq!(n % 3, 0, "the length of `positions` must be divisible by 3");
    let natoms = n / 3;

    let invprecision = precision.recip();

    let minint = [read_i32(file)?, read_i32(file)?, read_i32(file)?];
    let maxint = [read_i32(file)?, read_i32(file)?, read_i32(file)?];
    let mut smallidx = read_u32(file)? as usize;
    if !(FIRSTIDX..=LASTIDX).contains(&smallidx) {
        return Err(invalid_data(format!("invalid small index {smallidx}")));
    }

    let (sizeint, bitsizeint, bitsize) = calc_sizeint(minint, maxint)?;

    let mut smaller = MAGICINTS[usize::max(FIRSTIDX, smallidx - 1)] / 2;
    let mut smallnum = MAGICINTS[smallidx] / 2;
    let mut sizesmall = [MAGICINTS[smallidx] as u32; 3];

    read_opaque(file, scratch)?;
    let mut bits = BitReader::new(scratch);

    let mut run: i32 = 0;
    let mut i = 0;
    while i < natoms {
        let mut coord = if bitsize == 0 {
            [
                bits.decodebits(bitsizeint[0]) as i32,
                bits.decodebits(bitsizeint[1]) as i32,
                bits.decodebits(bitsizeint[2]) as i32,
            ]
        } else {
            bits.decodeints(bitsize, sizeint)
        };
        for k in 0..3 {
            coord[k] = coord[k].wrapping_add(minint[k]);
        }
        let mut prevcoord = coord;

        let mut is_smaller = 0;
        if bits.decodebits(1) > 0 {
            run = bits.decodebits(5) as i32;
            is_smaller = run % 3;
            run -= is_smaller;
            is_smaller -= 1;
        }

        if run > 0 {
            if 3 * i + 3 + run as usize > n {
                return Err(invalid_data("run of small differences overflows the frame"));
            }

            for k in (0..run).step_by(3) {
                let mut coord = bits.decodeints(smallidx as u32, sizesmall);
                i += 1;
                for d in 0..3 {
                    coord[d] = coord[d].wrapping_add(prevcoord[d] - smallnum);
                }
                if k == 0 {
                    // The first two atoms of a run are stored swapped, which compresses water
                    // (OHH) better. Swap them back.
                    std::mem::swap(&mut coord, &mut prevcoord);
                    write_position(positions, i - 1, prevcoord, invprecision);
                } else {
                    prevcoord = coord;
                }
                write_position(positions, i, coord, invprecision);
            }
        } else {
            write_position(positions, i, coord, invprecision);
        }

        match is_smaller.cmp(&0) {
            std::cmp::Ordering::Less => {
                smallidx -= 1;
                smallnum = smaller;
                if smallidx > FIRSTIDX {
                    smaller = MAGICINTS[smallidx - 1] / 2;
                } else {
                    smaller = 0;
                }
            }
            std::cmp::Ordering::Greater => {
                smallidx += 1;
                if smallidx > LASTIDX {
                    return Err(invalid_data("small index ran past the end of the table"));
                }
                smaller = smallnum;
                smallnum = MAGICINTS[smallidx] / 2;
            }
            std::cmp::Ordering::Equal => {}
        }

        if MAGICINTS[smallidx] == 0 {
            return Err(invalid_data("found an invalid size"));
        }
        sizesmall.fill(MAGICINTS[smallidx] as u32);
        i += 1;
    }

    if bits.overrun {
        return Err(invalid_data("compressed positions ended early"));
    }

    Ok(())
}

#[inline]
fn write_position(positions: &mut [f32], idx: usize, coord: [i32; 3], invprecision: f32) {
    let position = &mut positions[idx * 3..idx * 3 + 3];
    for (p, c) in position.iter_mut().zip(coord) {
        *p = c as f32 * invprecision;
    }
}

/// Reads bits from the compressed byte stream.
///
/// Reading past the end of the stream yields zeroes and sets `overrun`.
struct BitReader<'b> {
    buf: &'b [u8],
    count: usize,
    lastbits: u32,
    lastbyte: u32,
    overrun: bool,
}

impl<'b> BitReader<'b> {
    fn new(buf: &'b [u8]) -> Self {
        Self {
            buf,
            count: 0,
            lastbits: 0,
            lastbyte: 0,
            overrun: false,
        }
    }

    #[inline]
    fn next_byte(&mut self) -> u32 {
        let byte = match self.buf.get(self.count) {
            Some(&b) => b,
            None => {
                self.overrun = true;
                0
            }
        };
        self.count += 1;
        byte as u32
    }

    fn decodebits(&mut self, mut nbits: u32) -> u32 {
        let mask = ((1u64 << nbits) - 1) as u32; // A string of ones that is nbits long.

        let mut num: u32 = 0;
        while nbits >= 8 {
            self.lastbyte = (self.lastbyte << 8) | self.next_byte();
            num |= (self.lastbyte >> self.lastbits) << (nbits - 8);
            nbits -= 8;
        }

        if nbits > 0 {
            if self.lastbits < nbits {
                self.lastbits += 8;
                self.lastbyte = (self.lastbyte << 8) | self.next_byte();
            }
            self.lastbits -= nbits;
            num |= (self.lastbyte >> self.lastbits) & ((1 << nbits) - 1);
        }

        num & mask
    }

    /// Decodes three integers packed into `nbits` bits as a mixed-radix number over `sizes`.
    fn decodeints(&mut self, mut nbits: u32, sizes: [u32; 3]) -> [i32; 3] {
        let mut bytes = [0u8; 32];
        let mut nbytes = 0;
        while nbits > 8 {
            bytes[nbytes] = self.decodebits(8) as u8;
            nbytes += 1;
            nbits -= 8;
        }
        if nbits > 0 {
            bytes[nbytes] = self.decodebits(nbits) as u8;
            nbytes += 1;
        }

        let mut nums = [0i32; 3];
        for i in (1..3).rev() {
            let mut num: u32 = 0;
            for k in (0..nbytes).rev() {
                num = (num << 8) | bytes[k] as u32;
                let p = num / sizes[i];
                bytes[k] = p as u8;
                num -= p * sizes[i];
            }
            nums[i] = num as i32;
        }
        nums[0] = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        nums
    }
}

#[inline]
pub(crate) fn read_boxvec<R: Read>(file: &mut R) -> io::Result<BoxVec> {
    let mut boxvec = [0.0; 9];
    read_f32s(file, &mut boxvec)?;
    Ok(BoxVec::from_cols_array(&boxvec))
}

/// Number of padding bytes that bring `n` up to a multiple of the 4-byte xdr block size.
pub const fn padding(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

pub(crate) fn read_opaque<R: Read>(file: &mut R, data: &mut Vec<u8>) -> io::Result<()> {
    let count = read_u32(file)? as usize;
    data.resize(count + padding(count), 0);
    file.read_exact(data)?;
    data.truncate(count);
    Ok(())
}

/// Reads the magic number, or returns [`None`] if there are no bytes left at all.
fn read_magic<R: Read>(file: &mut R) -> io::Result<Option<i32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(Some(i32::from_be_bytes(buf)))
}

pub(crate) fn read_f32s<R: Read>(file: &mut R, buf: &mut [f32]) -> io::Result<()> {
    for value in buf {
        *value = read_f32(file)?
    }
    Ok(())
}

pub(crate) fn read_f32<R: Read>(file: &mut R) -> io::Result<f32> {
    let mut buf = [0; 4];
    file.read_exact(&mut buf)?;
    Ok(f32::from_be_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(file: &mut R) -> io::Result<i32> {
    let mut buf = [0; 4];
    file.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(file: &mut R) -> io::Result<u32> {
    let mut buf = [0; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Determines the range of each dimension and the number of bits needed to store a coordinate.
///
/// A returned `bitsize` of 0 flags that the ranges are too large to be packed together, and
/// that each dimension is stored separately with the bit sizes in `bitsizeint`.
pub(crate) fn calc_sizeint(
    minint: [i32; 3],
    maxint: [i32; 3],
) -> io::Result<([u32; 3], [u32; 3], u32)> {
    let mut sizeint = [0u32; 3];
    for k in 0..3 {
        let size = maxint[k] as i64 - minint[k] as i64 + 1;
        sizeint[k] = u32::try_from(size)
            .ok()
            .filter(|&s| s > 0)
            .ok_or_else(|| invalid_data(format!("invalid coordinate range {size}")))?;
    }

    let mut bitsizeint = [0u32; 3];
    // Check if one of the sizes is too big to be multiplied.
    if (sizeint[0] | sizeint[1] | sizeint[2]) > 0xffffff {
        bitsizeint = sizeint.map(sizeofint);
        return Ok((sizeint, bitsizeint, 0));
    }

    Ok((sizeint, bitsizeint, sizeofints(sizeint)))
}

#[inline]
pub(crate) const fn sizeofint(size: u32) -> u32 {
    let mut n: u64 = 1;
    let mut nbits = 0;

    while size as u64 >= n && nbits < 32 {
        nbits += 1;
        n <<= 1;
    }

    nbits
}

pub(crate) fn sizeofints(sizes: [u32; 3]) -> u32 {
    let mut nbytes = 1;
    let mut bytes = [0u8; 32];
    bytes[0] = 1;

    for size in sizes {
        let mut tmp: u64 = 0;
        let mut bytecount = 0;
        while bytecount < nbytes {
            tmp += bytes[bytecount] as u64 * size as u64;
            bytes[bytecount] = (tmp & 0xff) as u8;
            tmp >>= 8;
            bytecount += 1;
        }
        while tmp != 0 {
            bytes[bytecount] = (tmp & 0xff) as u8;
            bytecount += 1;
            tmp >>= 8;
        }
        nbytes = bytecount;
    }

    nbytes -= 1;
    let mut nbits = 0;
    let mut num = 1;
    while bytes[nbytes] as u32 >= num {
        nbits += 1;
        num *= 2;
    }

    nbytes as u32 * 8 + nbits
}

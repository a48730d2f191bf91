//! Growable little-endian byte buffer used to assemble BIFF records and
//! OLE2 structures.
//!
//! All multi-byte integers in BIFF8 are little-endian; two big-endian
//! writers exist only for the OLE2 document signature's split halves.

use crate::error::{XlsError, XlsResult};

/// Bytes of `1.2345` as written by a genuine little-endian IEEE-754 host.
/// Used to probe the host's float representation once at buffer-construction
/// time rather than trusting `cfg!(target_endian)` for the float path too.
const ENDIAN_PROBE_LE: [u8; 8] = [0x8D, 0x97, 0x6E, 0x12, 0x83, 0xC0, 0xF3, 0x3F];

/// Rounds a capacity up to the next multiple of 16.
fn round_capacity(n: usize) -> usize {
    (n + 15) & !15
}

/// A growable byte vector with typed little-endian / big-endian writers.
///
/// `len` always equals the number of bytes written through this buffer;
/// callers never need to track it separately.
#[derive(Debug, Clone, Default)]
pub struct OctetBuffer {
    data: Vec<u8>,
    /// `true` once the host's float layout has been confirmed to be a
    /// byte-reversal of little-endian (i.e. a big-endian host). Computed
    /// lazily on first double write, cached here.
    reverse_doubles: Option<bool>,
}

impl OctetBuffer {
    pub fn new() -> Self {
        OctetBuffer {
            data: Vec::with_capacity(round_capacity(16)),
            reverse_doubles: None,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        OctetBuffer {
            data: Vec::with_capacity(round_capacity(cap)),
            reverse_doubles: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Appends raw bytes verbatim.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends `count` zero bytes.
    pub fn append_zeros(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Inserts raw bytes at the front of the buffer, shifting existing
    /// content right. O(n); used sparingly for header-style records known
    /// only after the body has been written.
    pub fn prepend(&mut self, bytes: &[u8]) {
        let mut next = Vec::with_capacity(round_capacity(self.data.len() + bytes.len()));
        next.extend_from_slice(bytes);
        next.extend_from_slice(&self.data);
        self.data = next;
    }

    pub fn put_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn put_u16_le(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u16_be(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32_le(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32_be(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i16_le(&mut self, v: i16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32_le(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes an `f64` so that the buffer always contains its IEEE-754
    /// little-endian byte pattern, regardless of host endianness.
    pub fn put_f64_host_le(&mut self, v: f64) -> XlsResult<()> {
        let reverse = match self.reverse_doubles {
            Some(r) => r,
            None => {
                let r = probe_reverse_doubles()?;
                self.reverse_doubles = Some(r);
                r
            }
        };
        // Native bytes, reversed iff the host is big-endian, always yields
        // the little-endian byte pattern (`to_le_bytes()` is already LE on
        // every host, so reversing *that* would undo the swap the probe
        // just detected we need).
        let mut bytes = v.to_ne_bytes();
        if reverse {
            bytes.reverse();
        }
        self.data.extend_from_slice(&bytes);
        Ok(())
    }
}

/// Returns `true` if doubles must be byte-reversed to end up little-endian
/// in the output (i.e. the host is big-endian), `false` if the host is
/// already little-endian. Errors if the host's float layout doesn't match
/// either IEEE-754 byte order at all.
fn probe_reverse_doubles() -> XlsResult<bool> {
    let probe: f64 = 1.2345;
    let native = probe.to_ne_bytes();
    if native == ENDIAN_PROBE_LE {
        Ok(false)
    } else {
        let mut reversed = native;
        reversed.reverse();
        if reversed == ENDIAN_PROBE_LE {
            Ok(true)
        } else {
            Err(XlsError::EndiannessUnsupported)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_len_track_together() {
        let mut b = OctetBuffer::new();
        b.append(&[1, 2, 3]);
        assert_eq!(b.len(), 3);
        b.put_u16_le(0x1234);
        assert_eq!(b.len(), 5);
    }

    #[test]
    fn put_u16_le_matches_byte_order() {
        let mut b = OctetBuffer::new();
        b.put_u16_le(0x1234);
        assert_eq!(b.as_bytes(), &[0x34, 0x12]);
    }

    #[test]
    fn put_u16_be_matches_byte_order() {
        let mut b = OctetBuffer::new();
        b.put_u16_be(0x1234);
        assert_eq!(b.as_bytes(), &[0x12, 0x34]);
    }

    #[test]
    fn prepend_shifts_existing_content_right() {
        let mut b = OctetBuffer::new();
        b.append(&[3, 4]);
        b.prepend(&[1, 2]);
        assert_eq!(b.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn double_round_trips_as_ieee754_little_endian() {
        let mut b = OctetBuffer::new();
        b.put_f64_host_le(42.0).unwrap();
        assert_eq!(b.as_bytes(), &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x45, 0x40]);
        assert_eq!(f64::from_le_bytes(b.as_bytes().try_into().unwrap()), 42.0);
    }

    #[test]
    fn probe_matches_known_bit_pattern() {
        // This host is little-endian in every environment this crate ships
        // to; the probe should report no reversal needed.
        assert!(!probe_reverse_doubles().unwrap());
    }

    #[test]
    fn append_zeros_extends_with_zero_bytes() {
        let mut b = OctetBuffer::new();
        b.append_zeros(4);
        assert_eq!(b.as_bytes(), &[0, 0, 0, 0]);
    }
}

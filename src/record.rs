//! Frames a BIFF record (`id:u16_le, length:u16_le, payload`) and appends
//! or prepends it to a Stream Accumulator.

use crate::buffer::OctetBuffer;
use crate::stream::StreamAccumulator;

/// Upper bound on a single record's payload. Every record this crate emits
/// is well under this (LABEL with a 255-byte string is the worst case at
/// 8 + 255 bytes), so callers building a variable-size payload can
/// pre-allocate this much without ever reallocating mid-record.
pub const VARIABLE_RECORD_CAP: usize = 16 * 1024;

/// Starts a payload buffer for a record of exactly `capacity` bytes.
pub fn fixed_payload(capacity: usize) -> OctetBuffer {
    OctetBuffer::with_capacity(capacity)
}

/// Starts a payload buffer for a record whose final size isn't known up
/// front (e.g. a string whose length varies).
pub fn variable_payload() -> OctetBuffer {
    OctetBuffer::with_capacity(VARIABLE_RECORD_CAP)
}

/// Appends a fully-built record (header + payload) to the end of `acc`.
pub fn append_record(acc: &mut StreamAccumulator, id: u16, payload: &OctetBuffer) -> std::io::Result<()> {
    debug_assert!(payload.len() <= 0xFFFF, "record payload exceeds u16 length field");
    let mut header = OctetBuffer::with_capacity(4);
    header.put_u16_le(id);
    header.put_u16_le(payload.len() as u16);
    acc.append(header.as_bytes())?;
    acc.append(payload.as_bytes())
}

/// Prepends a fully-built record (header + payload) to the front of `acc`.
///
/// Callers that need to emplace several header records before the body
/// must call this once per record, in the *reverse* of the order they
/// should appear — the last call here ends up first in the stream.
pub fn prepend_record(acc: &mut StreamAccumulator, id: u16, payload: &OctetBuffer) {
    debug_assert!(payload.len() <= 0xFFFF, "record payload exceeds u16 length field");
    acc.prepend(payload.as_bytes());
    let mut header = OctetBuffer::with_capacity(4);
    header.put_u16_le(id);
    header.put_u16_le(payload.len() as u16);
    acc.prepend(header.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_record_frames_id_and_length() {
        let mut acc = StreamAccumulator::new_in_memory();
        let mut payload = fixed_payload(2);
        payload.put_u16_le(0xBEEF);
        append_record(&mut acc, 0x0203, &payload).unwrap();
        let mut out = Vec::new();
        acc.drain_into(|b| {
            out.extend_from_slice(b);
            Ok(())
        })
        .unwrap();
        assert_eq!(out, vec![0x03, 0x02, 0x02, 0x00, 0xEF, 0xBE]);
    }

    #[test]
    fn prepend_record_calls_build_reverse_final_order() {
        let mut acc = StreamAccumulator::new_in_memory();
        acc.append(&[0xAA]).unwrap(); // body already written

        // Per the worksheet-close protocol: DIMENSIONS first, then BOF,
        // so BOF ends up before DIMENSIONS in the final stream.
        prepend_record(&mut acc, 0x0200, &fixed_payload(0));
        prepend_record(&mut acc, 0x0809, &fixed_payload(0));

        let mut out = Vec::new();
        acc.drain_into(|b| {
            out.extend_from_slice(b);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            out,
            vec![0x09, 0x08, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0xAA]
        );
    }
}

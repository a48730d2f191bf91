//! OLE2 compound-document container: header, Big Block Depot, and root
//! property storage wrapped around the finished BIFF stream.
//!
//! Layout assumes exactly one user stream ("Book") plus the root directory
//! entry, which is all a BIFF5/8 workbook ever needs.

use crate::buffer::OctetBuffer;
use crate::error::{XlsError, XlsResult};
use crate::sink::Sink;

/// Largest BIFF stream this container can address: 109 Big Block Depot
/// sector slots in the header, each covering 127 data sectors of 512 bytes.
pub const MAX_BIFF_SIZE: usize = 7_087_104;

const SECTOR_SIZE: usize = 512;
const HEADER_SIZE: usize = 512;
const PPS_ENTRY_SIZE: usize = 128;
/// Number of BBD sector-pointer slots in the header's fixed-size table.
const BBD_TABLE_SLOTS: usize = 109;

/// Sector-layout sizes derived from the finished BIFF stream length.
#[derive(Debug, Clone, Copy)]
pub struct OleSizes {
    pub biffsize: usize,
    pub booksize: usize,
    pub big_blocks: u32,
    pub list_blocks: u32,
    pub root_start: u32,
}

/// Computes sector sizes for a finished BIFF stream of `biffsize` bytes,
/// rejecting streams too large for the 109-slot BBD header table.
pub fn compute_sizes(biffsize: usize) -> XlsResult<OleSizes> {
    if biffsize > MAX_BIFF_SIZE {
        return Err(XlsError::WorkbookTooLarge { actual: biffsize, limit: MAX_BIFF_SIZE });
    }
    // Minimum file size is 4k to avoid needing small blocks.
    let booksize = biffsize.max(4096);
    let big_blocks = booksize.div_ceil(SECTOR_SIZE) as u32;
    let list_blocks = (big_blocks / 127) + 1;
    let root_start = big_blocks;
    Ok(OleSizes { biffsize, booksize, big_blocks, list_blocks, root_start })
}

/// Writes the 512-byte compound-document header (sector 0).
fn write_header(sink: &mut dyn Sink, sizes: &OleSizes) -> std::io::Result<()> {
    let mut p = OctetBuffer::with_capacity(HEADER_SIZE);

    p.put_u32_be(0xD0CF11E0); // OLE document signature, part 1
    p.put_u32_be(0xA1B11AE1); // OLE document signature, part 2
    p.append_zeros(16); // CLSID of this file; unused

    p.put_u16_le(0x003E); // revision number
    p.put_u16_le(0x0003); // version number
    p.put_u16_be(0xFEFF); // byte-order mark: little-endian
    p.put_u16_le(0x0009); // sector size as a power of two: 2^9 = 512

    p.put_u32_le(0x06);
    p.put_u32_le(0x00);
    p.put_u32_le(0x00);
    p.put_u32_le(sizes.list_blocks); // num_bbd_blocks
    p.put_u32_le(sizes.root_start); // root directory's starting sector
    p.put_u32_le(0x00);
    p.put_u32_le(0x1000);
    p.put_i32_le(-2); // sbd_startblock: no short-stream container here
    p.put_u32_le(0x00);
    p.put_i32_le(-2);
    p.put_u32_le(0x00);

    let mut next_sector = sizes.root_start;
    for _ in 1..=sizes.list_blocks {
        next_sector += 1;
        p.put_u32_le(next_sector);
    }
    for _ in sizes.list_blocks..BBD_TABLE_SLOTS as u32 {
        p.put_i32_le(-1);
    }

    debug_assert_eq!(p.len(), HEADER_SIZE, "OLE2 header must be exactly one sector");
    sink.write_all(p.as_bytes())
}

/// Pads the just-written BIFF body with zeros up to the next block boundary:
/// 4096 when the stream is under 4 KiB, 512 otherwise.
fn write_padding(sink: &mut dyn Sink, biffsize: usize) -> std::io::Result<()> {
    let min_size = if biffsize < 4096 { 4096 } else { 512 };
    let remainder = biffsize % min_size;
    if remainder != 0 {
        let padding = min_size - remainder;
        let zeros = vec![0u8; padding];
        sink.write_all(&zeros)?;
    }
    Ok(())
}

/// Writes one 128-byte Property Storage (PPS) entry.
fn write_pps(sink: &mut dyn Sink, name: Option<&str>, pps_type: u16, child: i32, start: i32, size: u32) -> std::io::Result<()> {
    let mut header = [0u8; 64];
    let mut namelen = 0u16;
    if let Some(name) = name {
        // Low-byte-only "Unicode": every other byte stays zero. Real readers
        // that only check the low bytes of a PPS name accept this.
        for (i, b) in name.bytes().enumerate() {
            if i * 2 >= header.len() {
                break;
            }
            header[i * 2] = b;
        }
        namelen = (name.len() as u16) * 2 + 2;
    }

    let mut p = OctetBuffer::with_capacity(PPS_ENTRY_SIZE);
    p.append(&header);
    p.put_u16_le(namelen);
    p.put_u16_le(pps_type);
    p.put_i32_le(-1); // pps_prev
    p.put_i32_le(-1); // pps_next
    p.put_i32_le(child); // pps_dir: first child PPS index, or -1
    p.append_zeros(20); // five reserved u32 fields
    p.append_zeros(16); // four timestamp u32 fields
    p.put_i32_le(start);
    p.put_u32_le(size);
    p.put_u32_le(0); // reserved

    debug_assert_eq!(p.len(), PPS_ENTRY_SIZE);
    sink.write_all(p.as_bytes())
}

/// Writes the four-entry root property storage sector: `Root Entry`,
/// `Book`, and two empty padding slots.
fn write_property_storage(sink: &mut dyn Sink, booksize: usize) -> std::io::Result<()> {
    write_pps(sink, Some("Root Entry"), 0x05, 1, -2, 0)?;
    write_pps(sink, Some("Book"), 0x02, -1, 0, booksize as u32)?;
    write_pps(sink, None, 0x00, -1, 0, 0)?;
    write_pps(sink, None, 0x00, -1, 0, 0)
}

/// Writes the Big Block Depot: the FAT chaining data sectors, the BBD's own
/// self-reference markers, and an end-of-chain/unused tail.
fn write_big_block_depot(sink: &mut dyn Sink, sizes: &OleSizes) -> std::io::Result<()> {
    let num_blocks = sizes.big_blocks;
    let num_lists = sizes.list_blocks;
    let total_slots = num_lists * 128;
    let used_slots = num_blocks + num_lists + 2;

    let mut p = OctetBuffer::with_capacity(total_slots as usize * 4);
    for i in 1..num_blocks {
        p.put_u32_le(i);
    }
    p.put_i32_le(-2);
    p.put_i32_le(-2);
    for _ in 0..num_lists {
        p.put_i32_le(-3);
    }
    for _ in used_slots..=total_slots {
        p.put_i32_le(-1);
    }

    sink.write_all(p.as_bytes())
}

/// Writes the complete compound document: header, then the BIFF body
/// (streamed via `write_body`), then padding, property storage, and the
/// Big Block Depot.
///
/// `write_body` receives a callback it must invoke, in order, with every
/// chunk of the already-assembled BIFF stream; its total length must equal
/// `biffsize` exactly.
pub fn write_container(
    sink: &mut dyn Sink,
    biffsize: usize,
    write_body: impl FnOnce(&mut dyn FnMut(&[u8]) -> std::io::Result<()>) -> std::io::Result<()>,
) -> XlsResult<()> {
    let sizes = compute_sizes(biffsize)?;

    write_header(sink, &sizes)?;

    let mut emit = |bytes: &[u8]| sink.write_all(bytes);
    write_body(&mut emit)?;

    write_padding(sink, biffsize)?;
    write_property_storage(sink, sizes.booksize)?;
    write_big_block_depot(sink, &sizes)?;
    sink.close()?;
    Ok(())
}

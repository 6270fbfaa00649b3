//! ISO BMFF box serialization primitives.
//!
//! Boxes are written straight into a `BytesMut`. Container boxes reserve a
//! 4-byte size slot with [`open_box`] and patch it with [`close_box`] once
//! their children are written.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Codec carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    /// H.264 / AVC video.
    Avc,
    /// AAC-LC audio.
    Aac,
}

impl Codec {
    /// Whether this codec describes a video track.
    pub fn is_video(self) -> bool {
        matches!(self, Codec::Avc)
    }
}

/// Sync sample.
pub(crate) const SAMPLE_FLAGS_SYNC: u32 = 0x0200_0000;
/// Non-sync sample that depends on others.
pub(crate) const SAMPLE_FLAGS_NON_SYNC: u32 = 0x0101_0000;

const IDENTITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Start a box and return the offset of its size slot.
pub(crate) fn open_box(buf: &mut BytesMut, box_type: &[u8; 4]) -> usize {
    let start = buf.len();
    buf.put_u32(0);
    buf.put_slice(box_type);
    start
}

/// Start a full box (version + 24-bit flags).
pub(crate) fn open_full_box(buf: &mut BytesMut, box_type: &[u8; 4], version: u8, flags: u32) -> usize {
    let start = open_box(buf, box_type);
    buf.put_u32(((version as u32) << 24) | (flags & 0x00FF_FFFF));
    start
}

/// Patch the size slot of a box opened at `start`.
pub(crate) fn close_box(buf: &mut BytesMut, start: usize) {
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

/// Write a complete leaf box with opaque content.
pub(crate) fn write_box(buf: &mut BytesMut, box_type: &[u8; 4], content: &[u8]) {
    buf.put_u32((8 + content.len()) as u32);
    buf.put_slice(box_type);
    buf.put_slice(content);
}

fn put_matrix(buf: &mut BytesMut) {
    for v in IDENTITY_MATRIX {
        buf.put_u32(v);
    }
}

// ---------------------------------------------------------------------------
// Init segment boxes
// ---------------------------------------------------------------------------

/// `ftyp` with the DASH brand set used for live profiles.
pub(crate) fn write_ftyp(buf: &mut BytesMut) {
    let start = open_box(buf, b"ftyp");
    buf.put_slice(b"iso5"); // major brand
    buf.put_u32(0x200); // minor version
    for brand in [b"iso5", b"iso6", b"dash", b"mp41"] {
        buf.put_slice(brand);
    }
    close_box(buf, start);
}

pub(crate) fn write_mvhd(buf: &mut BytesMut, timescale: u32, next_track_id: u32) {
    let start = open_full_box(buf, b"mvhd", 1, 0);
    buf.put_u64(0); // creation time
    buf.put_u64(0); // modification time
    buf.put_u32(timescale);
    buf.put_u64(0); // duration unknown for live
    buf.put_u32(0x0001_0000); // rate 1.0
    buf.put_u16(0x0100); // volume 1.0
    buf.put_slice(&[0u8; 10]);
    put_matrix(buf);
    buf.put_slice(&[0u8; 24]); // pre_defined
    buf.put_u32(next_track_id);
    close_box(buf, start);
}

pub(crate) fn write_tkhd(buf: &mut BytesMut, track_id: u32, is_video: bool, width: u32, height: u32) {
    // enabled | in_movie | in_preview
    let start = open_full_box(buf, b"tkhd", 1, 7);
    buf.put_u64(0);
    buf.put_u64(0);
    buf.put_u32(track_id);
    buf.put_u32(0);
    buf.put_u64(0); // duration
    buf.put_u64(0);
    buf.put_u16(0); // layer
    buf.put_u16(0); // alternate group
    buf.put_u16(if is_video { 0 } else { 0x0100 });
    buf.put_u16(0);
    put_matrix(buf);
    if is_video {
        buf.put_u32(width << 16);
        buf.put_u32(height << 16);
    } else {
        buf.put_u32(0);
        buf.put_u32(0);
    }
    close_box(buf, start);
}

pub(crate) fn write_mdhd(buf: &mut BytesMut, timescale: u32) {
    let start = open_full_box(buf, b"mdhd", 1, 0);
    buf.put_u64(0);
    buf.put_u64(0);
    buf.put_u32(timescale);
    buf.put_u64(0);
    buf.put_u16(0x55C4); // und
    buf.put_u16(0);
    close_box(buf, start);
}

pub(crate) fn write_hdlr(buf: &mut BytesMut, handler_type: &[u8; 4], name: &[u8]) {
    let start = open_full_box(buf, b"hdlr", 0, 0);
    buf.put_u32(0);
    buf.put_slice(handler_type);
    buf.put_slice(&[0u8; 12]);
    buf.put_slice(name);
    buf.put_u8(0);
    close_box(buf, start);
}

pub(crate) fn write_vmhd(buf: &mut BytesMut) {
    let start = open_full_box(buf, b"vmhd", 0, 1);
    buf.put_u16(0); // graphics mode
    buf.put_slice(&[0u8; 6]); // opcolor
    close_box(buf, start);
}

pub(crate) fn write_smhd(buf: &mut BytesMut) {
    let start = open_full_box(buf, b"smhd", 0, 0);
    buf.put_u16(0); // balance
    buf.put_u16(0);
    close_box(buf, start);
}

pub(crate) fn write_dinf(buf: &mut BytesMut) {
    let dinf = open_box(buf, b"dinf");
    let dref = open_full_box(buf, b"dref", 0, 0);
    buf.put_u32(1);
    // self-contained
    let url = open_full_box(buf, b"url ", 0, 1);
    close_box(buf, url);
    close_box(buf, dref);
    close_box(buf, dinf);
}

/// Empty sample tables required by the fragmented layout.
pub(crate) fn write_empty_sample_tables(buf: &mut BytesMut) {
    for table in [b"stts", b"stsc", b"stco"] {
        let start = open_full_box(buf, table, 0, 0);
        buf.put_u32(0);
        close_box(buf, start);
    }
    let stsz = open_full_box(buf, b"stsz", 0, 0);
    buf.put_u32(0); // sample size
    buf.put_u32(0); // sample count
    close_box(buf, stsz);
}

pub(crate) fn write_avc1_entry(buf: &mut BytesMut, width: u32, height: u32, avcc: &[u8]) {
    let start = open_box(buf, b"avc1");
    buf.put_slice(&[0u8; 6]);
    buf.put_u16(1); // data reference index
    buf.put_slice(&[0u8; 16]);
    buf.put_u16(width as u16);
    buf.put_u16(height as u16);
    buf.put_u32(0x0048_0000); // 72 dpi
    buf.put_u32(0x0048_0000);
    buf.put_u32(0);
    buf.put_u16(1); // frame count
    buf.put_slice(&[0u8; 32]); // compressor name
    buf.put_u16(0x0018); // depth
    buf.put_i16(-1);
    if !avcc.is_empty() {
        write_box(buf, b"avcC", avcc);
    }
    close_box(buf, start);
}

pub(crate) fn write_mp4a_entry(buf: &mut BytesMut, sample_rate: u32, channels: u16, esds: &[u8]) {
    let start = open_box(buf, b"mp4a");
    buf.put_slice(&[0u8; 6]);
    buf.put_u16(1);
    buf.put_slice(&[0u8; 8]);
    buf.put_u16(channels);
    buf.put_u16(16); // sample size
    buf.put_u16(0);
    buf.put_u16(0);
    buf.put_u32(sample_rate << 16);
    if !esds.is_empty() {
        write_box(buf, b"esds", esds);
    }
    close_box(buf, start);
}

pub(crate) fn write_trex(buf: &mut BytesMut, track_id: u32) {
    let start = open_full_box(buf, b"trex", 0, 0);
    buf.put_u32(track_id);
    buf.put_u32(1); // default sample description index
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(0);
    close_box(buf, start);
}

// ---------------------------------------------------------------------------
// Media segment boxes
// ---------------------------------------------------------------------------

/// `styp` announcing a DASH media segment.
pub(crate) fn write_styp(buf: &mut BytesMut) {
    let start = open_box(buf, b"styp");
    buf.put_slice(b"msdh");
    buf.put_u32(0);
    buf.put_slice(b"msdh");
    buf.put_slice(b"msix");
    close_box(buf, start);
}

pub(crate) fn write_mfhd(buf: &mut BytesMut, sequence_number: u32) {
    let start = open_full_box(buf, b"mfhd", 0, 0);
    buf.put_u32(sequence_number);
    close_box(buf, start);
}

pub(crate) fn write_tfhd(buf: &mut BytesMut, track_id: u32) {
    // default-base-is-moof
    let start = open_full_box(buf, b"tfhd", 0, 0x02_0000);
    buf.put_u32(track_id);
    close_box(buf, start);
}

pub(crate) fn write_tfdt(buf: &mut BytesMut, base_media_decode_time: u64) {
    let start = open_full_box(buf, b"tfdt", 1, 0);
    buf.put_u64(base_media_decode_time);
    close_box(buf, start);
}

/// One `trun` entry.
pub(crate) struct TrunEntry {
    pub duration: u32,
    pub size: u32,
    pub flags: u32,
    pub composition_time_offset: i32,
}

/// Write a `trun` with data-offset, duration, size, flags and composition
/// offsets present. Returns the position of the data offset field so the
/// caller can patch it once the `moof` size is known.
pub(crate) fn write_trun(buf: &mut BytesMut, entries: &[TrunEntry]) -> usize {
    let flags = 0x00_0001 | 0x00_0100 | 0x00_0200 | 0x00_0400 | 0x00_0800;
    let start = open_full_box(buf, b"trun", 1, flags);
    buf.put_u32(entries.len() as u32);
    let data_offset_pos = buf.len();
    buf.put_i32(0);
    for e in entries {
        buf.put_u32(e.duration);
        buf.put_u32(e.size);
        buf.put_u32(e.flags);
        buf.put_i32(e.composition_time_offset);
    }
    close_box(buf, start);
    data_offset_pos
}

/// `mdat` header only; the caller appends the payload.
pub(crate) fn write_mdat_header(buf: &mut BytesMut, data_size: u64) {
    if data_size + 8 > u32::MAX as u64 {
        buf.put_u32(1);
        buf.put_slice(b"mdat");
        buf.put_u64(data_size + 16);
    } else {
        buf.put_u32((data_size + 8) as u32);
        buf.put_slice(b"mdat");
    }
}

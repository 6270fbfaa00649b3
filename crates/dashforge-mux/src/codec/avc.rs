//! H.264 Annex-B parsing and avcC construction.

use crate::{Error, Result};

/// NAL unit types the segmenter cares about.
pub mod nal {
    pub const SLICE: u8 = 1;
    pub const IDR: u8 = 5;
    pub const SEI: u8 = 6;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const AUD: u8 = 9;
}

/// NAL unit type from the first header byte.
pub fn nal_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|b| b & 0x1F)
}

/// Split an Annex-B byte stream into NAL units (start codes removed).
///
/// Data without any start code is returned as a single NAL unit.
pub fn split_annexb(data: &[u8]) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            starts.push((i, i + 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    if starts.is_empty() {
        return if data.is_empty() { Vec::new() } else { vec![data] };
    }

    let mut nals = Vec::with_capacity(starts.len());
    for (idx, &(_, payload_start)) in starts.iter().enumerate() {
        let mut end = starts
            .get(idx + 1)
            .map(|&(code_start, _)| code_start)
            .unwrap_or(data.len());
        // Zero bytes before a start code belong to the next 4-byte start code.
        while end > payload_start && data[end - 1] == 0 {
            end -= 1;
        }
        if end > payload_start {
            nals.push(&data[payload_start..end]);
        }
    }
    nals
}

/// Build an AVCDecoderConfigurationRecord from one SPS and one PPS.
///
/// NAL units are expected to be length-prefixed with 4 bytes in samples.
pub fn build_avcc(sps: &[u8], pps: &[u8]) -> Result<Vec<u8>> {
    if sps.len() < 4 {
        return Err(Error::BufferUnderflow {
            need: 4,
            have: sps.len(),
        });
    }
    if nal_type(sps) != Some(nal::SPS) {
        return Err(Error::invalid_nal("first parameter set is not an SPS"));
    }
    if nal_type(pps) != Some(nal::PPS) {
        return Err(Error::invalid_nal("second parameter set is not a PPS"));
    }

    let mut avcc = Vec::with_capacity(11 + sps.len() + pps.len());
    avcc.push(0x01); // configurationVersion
    avcc.push(sps[1]); // AVCProfileIndication
    avcc.push(sps[2]); // profile_compatibility
    avcc.push(sps[3]); // AVCLevelIndication
    avcc.push(0xFC | 3); // lengthSizeMinusOne = 3
    avcc.push(0xE0 | 1); // one SPS
    avcc.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    avcc.extend_from_slice(sps);
    avcc.push(1); // one PPS
    avcc.extend_from_slice(&(pps.len() as u16).to_be_bytes());
    avcc.extend_from_slice(pps);
    Ok(avcc)
}

/// RFC 6381 codec string (`avc1.PPCCLL`) for an avcC record.
pub fn avc_codec_string(avcc: &[u8]) -> Option<String> {
    if avcc.len() < 4 {
        return None;
    }
    Some(format!("avc1.{:02x}{:02x}{:02x}", avcc[1], avcc[2], avcc[3]))
}

/// Whether a slice NAL starts a new picture (`first_mb_in_slice == 0`).
pub fn is_first_slice(nal: &[u8]) -> bool {
    matches!(nal_type(nal), Some(nal::SLICE) | Some(nal::IDR))
        && nal.get(1).map(|b| b & 0x80 != 0).unwrap_or(false)
}

//! AAC ADTS parsing, AudioSpecificConfig and esds construction.

use crate::{Error, Result};

/// MPEG-4 sampling frequency table, indexed by `sampling_frequency_index`.
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Samples carried by one raw AAC data block.
pub const SAMPLES_PER_BLOCK: u32 = 1024;

/// Parsed ADTS frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// MPEG-4 audio object type (2 = AAC-LC).
    pub object_type: u8,
    /// Index into [`SAMPLE_RATES`].
    pub sample_rate_index: u8,
    /// Channel configuration.
    pub channel_config: u8,
    /// Header length (7, or 9 with CRC).
    pub header_len: usize,
    /// Whole frame length including the header.
    pub frame_len: usize,
    /// Raw data blocks in the frame.
    pub blocks: u8,
}

impl AdtsHeader {
    /// Whether `data` starts with an ADTS syncword.
    pub fn is_adts(data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == 0xFF && data[1] & 0xF6 == 0xF0
    }

    /// Parse the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(Error::BufferUnderflow {
                need: 7,
                have: data.len(),
            });
        }
        if !Self::is_adts(data) {
            return Err(Error::invalid_adts("missing syncword"));
        }

        let protection_absent = data[1] & 0x01 == 1;
        let header_len = if protection_absent { 7 } else { 9 };
        if data.len() < header_len {
            return Err(Error::BufferUnderflow {
                need: header_len,
                have: data.len(),
            });
        }
        let object_type = ((data[2] >> 6) & 0x03) + 1;
        let sample_rate_index = (data[2] >> 2) & 0x0F;
        let channel_config = ((data[2] & 0x01) << 2) | (data[3] >> 6);
        let frame_len =
            (((data[3] & 0x03) as usize) << 11) | ((data[4] as usize) << 3) | ((data[5] as usize) >> 5);
        let blocks = (data[6] & 0x03) + 1;

        if sample_rate_index as usize >= SAMPLE_RATES.len() {
            return Err(Error::invalid_adts(format!(
                "reserved sampling frequency index {}",
                sample_rate_index
            )));
        }
        if frame_len < header_len {
            return Err(Error::invalid_adts(format!(
                "frame length {} shorter than header",
                frame_len
            )));
        }

        Ok(Self {
            object_type,
            sample_rate_index,
            channel_config,
            header_len,
            frame_len,
            blocks,
        })
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sample_rate_index as usize]
    }

    /// Samples carried by this frame.
    pub fn samples(&self) -> u32 {
        self.blocks as u32 * SAMPLES_PER_BLOCK
    }

    /// Two-byte AudioSpecificConfig.
    pub fn audio_specific_config(&self) -> [u8; 2] {
        let asc = ((self.object_type as u16) << 11)
            | ((self.sample_rate_index as u16) << 7)
            | ((self.channel_config as u16) << 3);
        asc.to_be_bytes()
    }
}

/// Sampling frequency index for a sample rate.
pub fn sample_rate_index(sample_rate: u32) -> Result<u8> {
    SAMPLE_RATES
        .iter()
        .position(|&r| r == sample_rate)
        .map(|i| i as u8)
        .ok_or(Error::UnsupportedSampleRate(sample_rate))
}

/// AudioSpecificConfig for AAC-LC at a given rate and channel count.
pub fn lc_audio_specific_config(sample_rate: u32, channels: u16) -> Result<[u8; 2]> {
    let sf_index = sample_rate_index(sample_rate)?;
    let asc = (2u16 << 11) | ((sf_index as u16) << 7) | ((channels & 0x0F) << 3);
    Ok(asc.to_be_bytes())
}

/// MPEG-4 audio object type carried by an AudioSpecificConfig.
pub fn object_type(asc: &[u8]) -> Option<u8> {
    asc.first().map(|b| b >> 3)
}

/// Build a 7-byte ADTS header for an AAC-LC frame with `payload_len` bytes.
pub fn build_adts_header(sample_rate: u32, channels: u8, payload_len: usize) -> Result<[u8; 7]> {
    let sf_index = sample_rate_index(sample_rate)?;
    let frame_len = payload_len + 7;
    if frame_len > 0x1FFF {
        return Err(Error::invalid_adts(format!("frame length {} too large", frame_len)));
    }
    let profile = 1u8; // AAC-LC (object type 2)
    Ok([
        0xFF,
        0xF1,
        (profile << 6) | (sf_index << 2) | ((channels >> 2) & 0x01),
        ((channels & 0x03) << 6) | ((frame_len >> 11) as u8 & 0x03),
        (frame_len >> 3) as u8,
        (((frame_len & 0x07) as u8) << 5) | 0x1F,
        0xFC,
    ])
}

/// Build esds content (full box header + ES_Descriptor) around an
/// AudioSpecificConfig.
pub fn build_esds(asc: &[u8], avg_bitrate: u32) -> Vec<u8> {
    let dsi_len = asc.len();
    let dcd_len = 13 + 2 + dsi_len;
    let es_len = 3 + 2 + dcd_len + 3;

    let mut esds = Vec::with_capacity(4 + 2 + es_len);
    esds.extend_from_slice(&[0, 0, 0, 0]); // version + flags

    esds.push(0x03); // ES_DescrTag
    esds.push(es_len as u8);
    esds.extend_from_slice(&0u16.to_be_bytes()); // ES_ID
    esds.push(0); // flags

    esds.push(0x04); // DecoderConfigDescrTag
    esds.push(dcd_len as u8);
    esds.push(0x40); // Audio ISO/IEC 14496-3
    esds.push((0x05 << 2) | 0x01); // audio stream
    esds.extend_from_slice(&[0, 0, 0]); // bufferSizeDB
    esds.extend_from_slice(&avg_bitrate.to_be_bytes()); // maxBitrate
    esds.extend_from_slice(&avg_bitrate.to_be_bytes()); // avgBitrate

    esds.push(0x05); // DecSpecificInfoTag
    esds.push(dsi_len as u8);
    esds.extend_from_slice(asc);

    esds.push(0x06); // SLConfigDescrTag
    esds.push(1);
    esds.push(0x02);
    esds
}

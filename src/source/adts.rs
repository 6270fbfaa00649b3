use bytes::Bytes;
use dashforge_mux::codec::AdtsHeader;

/// One ADTS frame, header included.
#[derive(Debug, Clone)]
pub struct AacFrame {
    pub data: Bytes,
    pub samples: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Cut an ADTS stream into frames.
///
/// Bytes that do not parse as a header are skipped up to the next syncword;
/// a truncated last frame is dropped.
pub fn split_adts(data: &Bytes) -> Vec<AacFrame> {
    let mut frames = Vec::new();
    let mut pos = 0;
    let mut skipped = 0usize;

    while pos + 7 <= data.len() {
        let header = match AdtsHeader::parse(&data[pos..]) {
            Ok(h) => h,
            Err(_) => {
                pos += 1;
                skipped += 1;
                continue;
            }
        };
        let end = pos + header.frame_len;
        if end > data.len() {
            tracing::warn!(offset = pos, "truncated ADTS frame dropped");
            break;
        }

        frames.push(AacFrame {
            data: data.slice(pos..end),
            samples: header.samples(),
            sample_rate: header.sample_rate(),
            channels: header.channel_config as u16,
        });
        pos = end;
    }

    if skipped > 0 {
        tracing::debug!(bytes = skipped, "skipped bytes between ADTS frames");
    }
    frames
}

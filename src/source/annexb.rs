use bytes::{BufMut, Bytes, BytesMut};
use dashforge_mux::codec::avc::{is_first_slice, nal};
use dashforge_mux::codec::{nal_type, split_annexb};

/// One coded picture with its leading parameter sets, in Annex-B form.
#[derive(Debug, Clone)]
pub struct AccessUnit {
    pub data: Bytes,
    pub keyframe: bool,
}

const START_CODE: [u8; 4] = [0, 0, 0, 1];

fn build(units: &[&[u8]]) -> AccessUnit {
    let mut data = BytesMut::with_capacity(units.iter().map(|u| u.len() + 4).sum());
    let mut keyframe = false;
    for unit in units {
        keyframe |= nal_type(unit) == Some(nal::IDR);
        data.put_slice(&START_CODE);
        data.put_slice(unit);
    }
    AccessUnit {
        data: data.freeze(),
        keyframe,
    }
}

/// Group the NAL units of an Annex-B stream into access units.
///
/// A new access unit starts at an AUD, at parameter sets or SEI following a
/// slice, or at a slice whose `first_mb_in_slice` is zero.
pub fn split_access_units(data: &[u8]) -> Vec<AccessUnit> {
    let mut units = Vec::new();
    let mut current: Vec<&[u8]> = Vec::new();
    let mut has_slice = false;

    for unit in split_annexb(data) {
        let kind = nal_type(unit);
        let starts_new = match kind {
            Some(nal::AUD) => true,
            Some(nal::SPS) | Some(nal::PPS) | Some(nal::SEI) => has_slice,
            Some(nal::SLICE) | Some(nal::IDR) => has_slice && is_first_slice(unit),
            _ => false,
        };
        if starts_new && !current.is_empty() {
            units.push(build(&current));
            current.clear();
            has_slice = false;
        }

        current.push(unit);
        if matches!(kind, Some(nal::SLICE) | Some(nal::IDR)) {
            has_slice = true;
        }
    }

    // a trailing group without any picture is not an access unit
    if has_slice {
        units.push(build(&current));
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: [u8; 6] = [0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x02];
    const PPS: [u8; 4] = [0x68, 0xCE, 0x3C, 0x80];

    fn stream(units: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for unit in units {
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(unit);
        }
        out
    }

    #[test]
    fn test_groups_by_first_slice() {
        let data = stream(&[
            &SPS,
            &PPS,
            &[0x65, 0x88, 0x01],
            &[0x65, 0x08, 0x02], // second slice of the same picture
            &[0x41, 0x9A, 0x03],
            &[0x41, 0x9A, 0x04],
        ]);
        let units = split_access_units(&data);

        assert_eq!(units.len(), 3);
        assert!(units[0].keyframe);
        assert!(!units[1].keyframe);
        assert_eq!(split_annexb(&units[0].data).len(), 4);
    }

    #[test]
    fn test_aud_starts_access_unit() {
        let data = stream(&[&[0x09, 0xF0], &[0x41, 0x9A], &[0x09, 0xF0], &[0x41, 0x9A]]);
        let units = split_access_units(&data);
        assert_eq!(units.len(), 2);
        assert_eq!(&units[1].data[..], &stream(&[&[0x09, 0xF0], &[0x41, 0x9A]])[..]);
    }

    #[test]
    fn test_parameter_sets_only_yield_nothing() {
        assert!(split_access_units(&stream(&[&SPS, &PPS])).is_empty());
    }
}

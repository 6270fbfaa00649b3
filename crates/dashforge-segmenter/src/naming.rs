//! Segment file names.
//!
//! Names are a pure function of their inputs: the same representation and
//! timestamp always map to the same path.

use crate::frame::ReaderId;

fn trim_dir(base_path: &str) -> &str {
    match base_path.trim_end_matches('/') {
        "" if base_path.starts_with('/') => "/",
        trimmed => trimmed,
    }
}

fn join(base_path: &str, file: String) -> String {
    match trim_dir(base_path) {
        "" => file,
        "/" => format!("/{}", file),
        dir => format!("{}/{}", dir, file),
    }
}

/// `{base_path}/{base_name}_{repr_id}{ext}`
pub fn init_segment_name(base_path: &str, base_name: &str, repr_id: ReaderId, ext: &str) -> String {
    join(base_path, format!("{}_{}{}", base_name, repr_id, ext))
}

/// `{base_path}/{base_name}_{repr_id}_{timestamp}{ext}`
pub fn segment_name(base_path: &str, base_name: &str, repr_id: ReaderId, timestamp: u64, ext: &str) -> String {
    join(base_path, format!("{}_{}_{}{}", base_name, repr_id, timestamp, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_name() {
        assert_eq!(segment_name("/dash", "live", 2, 4000, ".m4v"), "/dash/live_2_4000.m4v");
        assert_eq!(segment_name("/dash/", "live", 2, 4000, ".m4v"), "/dash/live_2_4000.m4v");
    }

    #[test]
    fn test_init_segment_name() {
        assert_eq!(init_segment_name("out", "live", 7, "_init.m4a"), "out/live_7_init.m4a");
        assert_eq!(init_segment_name("/", "live", 7, "_init.m4a"), "/live_7_init.m4a");
        assert_eq!(init_segment_name("", "live", 7, "_init.m4a"), "live_7_init.m4a");
    }

    #[test]
    fn test_names_are_deterministic() {
        let base = segment_name("/tmp/x", "s", 1, 21, ".m4a");
        assert_eq!(base, segment_name("/tmp/x", "s", 1, 21, ".m4a"));
        assert_eq!(base, "/tmp/x/s_1_21.m4a");

        // each input only touches its own part of the name
        assert_eq!(segment_name("/tmp/x", "s", 1, 22, ".m4a"), "/tmp/x/s_1_22.m4a");
        assert_eq!(segment_name("/tmp/x", "s", 9, 21, ".m4a"), "/tmp/x/s_9_21.m4a");
        assert_eq!(segment_name("/tmp/x", "t", 1, 21, ".m4a"), "/tmp/x/t_1_21.m4a");
        assert_eq!(segment_name("/tmp/x", "s", 1, 21, ".m4v"), "/tmp/x/s_1_21.m4v");
        assert_eq!(segment_name("/tmp/y", "s", 1, 21, ".m4a"), "/tmp/y/s_1_21.m4a");

        let init = init_segment_name("/tmp/x", "s", 1, "_init.m4a");
        assert_eq!(init, init_segment_name("/tmp/x", "s", 1, "_init.m4a"));
        assert_eq!(init_segment_name("/tmp/x", "s", 4, "_init.m4a"), "/tmp/x/s_4_init.m4a");
        assert_eq!(init_segment_name("/tmp/x", "u", 1, "_init.m4v"), "/tmp/x/u_1_init.m4v");
    }
}

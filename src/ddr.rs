//! Fixed DDR frequency request table.
//!
//! The AOP firmware accepts a small set of pre-canned resource strings to
//! pin the DDR clock. The table is compile-time constant; anything outside
//! the enumerated codes is rejected before touching the transport.

/// One pre-canned request: the exact string the firmware expects plus its
/// length, kept alongside so callers never recount it on the send path.
pub struct DdrConfig {
    pub msg: &'static str,
    pub len: usize,
}

/// Number of recognized DDR operating points.
pub const DDR_CONFIG_SIZE: usize = 12;

/// Request strings indexed by operating point. The grammar is owned by the
/// firmware; do not edit the strings.
pub const DDR_CONFIGS: [DdrConfig; DDR_CONFIG_SIZE] = [
    DdrConfig { msg: "{class:ddr, res:fixed, val: 100}", len: 32 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 200}", len: 32 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 300}", len: 32 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 451}", len: 32 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 547}", len: 32 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 681}", len: 32 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 768}", len: 32 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 1017}", len: 33 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 1353}", len: 33 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 1555}", len: 33 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 1804}", len: 33 },
    DdrConfig { msg: "{class:ddr, res:fixed, val: 2092}", len: 33 },
];

/// Map a frequency code to its table index. 0 aliases to the 100 MHz entry.
/// Returns None for codes outside the recognized set.
pub fn ddr_index_for(config: i32) -> Option<usize> {
    match config {
        0 => Some(0),
        100 => Some(0),
        200 => Some(1),
        300 => Some(2),
        451 => Some(3),
        547 => Some(4),
        681 => Some(5),
        768 => Some(6),
        1017 => Some(7),
        1353 => Some(8),
        1555 => Some(9),
        1804 => Some(10),
        2092 => Some(11),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lengths_match_strings() {
        for entry in &DDR_CONFIGS {
            assert_eq!(entry.len, entry.msg.len(), "stale len for {:?}", entry.msg);
        }
    }

    #[test]
    fn zero_aliases_to_lowest_point() {
        assert_eq!(ddr_index_for(0), Some(0));
        assert_eq!(ddr_index_for(100), Some(0));
    }

    #[test]
    fn every_code_maps_to_distinct_entry() {
        let codes = [100, 200, 300, 451, 547, 681, 768, 1017, 1353, 1555, 1804, 2092];
        for (i, code) in codes.iter().enumerate() {
            assert_eq!(ddr_index_for(*code), Some(i));
            assert!(DDR_CONFIGS[i].msg.contains(&format!("val: {}", code)));
        }
    }

    #[test]
    fn unknown_codes_rejected() {
        for code in [-1, 1, 99, 101, 452, 999, 2093, i32::MAX] {
            assert_eq!(ddr_index_for(code), None);
        }
    }
}

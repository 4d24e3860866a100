//! Request codes raised on the FPGA request line.
//!
//! The request line carries a 16-bit code. Code `0` starts processing of the
//! tile currently held in memory. Configuration uploads use the remaining
//! codes to tell the FPGA where the last bulk payload belongs.

/// Start processing the tile in memory.
pub const START_PROCESSING: u16 = 0;

/// Commit the last payload to the µ-program memory.
pub const COMMIT_PROGRAM: u16 = 2;

/// Code committing parameter chunk `index`.
///
/// The low two bits select the parameter memory, the remaining bits carry
/// the chunk index. Returns `None` when the index does not fit.
#[must_use]
pub fn commit_parameters(index: usize) -> Option<u16> {
    let shifted = index.checked_mul(4)?.checked_add(1)?;
    u16::try_from(shifted).ok()
}

/// Inverse of [`commit_parameters`].
#[must_use]
pub const fn parameter_chunk_index(code: u16) -> Option<usize> {
    if code & 0b11 == 1 {
        Some((code >> 2) as usize)
    } else {
        None
    }
}

/// Parameter bytes committed per request.
pub const PARAMETER_CHUNK_BYTES: usize = 65_536;

/// Settle time after each parameter chunk (ms).
pub const PARAMETER_SETTLE_MS: u64 = 5;

/// Settle time after a program commit (ms).
pub const PROGRAM_SETTLE_MS: u64 = 10;

/// Settle time after a start request, measured on the reference board (ms).
pub const PROCESSING_SETTLE_MS: u64 = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_codes() {
        assert_eq!(commit_parameters(0), Some(1));
        assert_eq!(commit_parameters(1), Some(5));
        assert_eq!(commit_parameters(2), Some(9));
        assert_eq!(commit_parameters(1 << 14), None);
    }

    #[test]
    fn test_parameter_index_roundtrip() {
        assert_eq!(parameter_chunk_index(9), Some(2));
        assert_eq!(parameter_chunk_index(COMMIT_PROGRAM), None);
        assert_eq!(parameter_chunk_index(START_PROCESSING), None);
    }
}

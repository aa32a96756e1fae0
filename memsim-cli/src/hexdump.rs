//! Hex-dump display helper for the `--dump` flag and the `inspect`
//! subcommand: 16 bytes per row, offset in the left margin, bytes in hex,
//! ASCII alongside — the conventional layout for a human reading a flat
//! byte buffer on a terminal.

use std::fmt::Write as _;

const BYTES_PER_ROW: usize = 16;

/// Render `bytes` as a hex dump, one row per 16 bytes, each row annotated
/// with the byte offset of its first column relative to `base`.
#[must_use]
pub fn hex_dump(bytes: &[u8], base: u32) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(BYTES_PER_ROW).enumerate() {
        let offset = base as usize + row * BYTES_PER_ROW;
        let _ = write!(out, "{offset:08X}  ");
        for byte in chunk {
            let _ = write!(out, "{byte:02X} ");
        }
        for _ in chunk.len()..BYTES_PER_ROW {
            out.push_str("   ");
        }
        out.push_str(" |");
        for byte in chunk {
            let c = if byte.is_ascii_graphic() || *byte == b' ' { *byte as char } else { '.' };
            out.push(c);
        }
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_short_row_is_padded_and_annotated() {
        let dump = hex_dump(&[0x41, 0x42], 0x10);
        assert!(dump.starts_with("00000010  41 42"));
        assert!(dump.contains("|AB|"));
    }

    #[test]
    fn non_printable_bytes_become_dots() {
        let dump = hex_dump(&[0x00, 0xFF], 0);
        assert!(dump.contains("|..|"));
    }
}

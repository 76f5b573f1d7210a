//! Split a stage's input text into bounded chunks, one model call each.
//!
//! ## Boundaries
//!
//! A *logical break* is one or more blank lines followed by a line that
//! starts with a non-whitespace character: in extracted documents that is
//! almost always the start of a new titled section. The text is split at
//! every logical break into blocks, each block is trimmed, and blocks are
//! packed greedily into chunks joined by [`BLOCK_SEPARATOR`].
//!
//! ## Reconstruction
//!
//! * Single-chunk path (no breaks, or the text fits): the one chunk is the
//!   input text, byte for byte.
//! * Fallback path (no breaks, text too long): chunks are fixed-size
//!   character slices; concatenating them with `""` gives the input back
//!   exactly. This path may cut mid-word.
//! * Block path: joining the chunks with `"\n\n"` gives the input with its
//!   leading/trailing whitespace removed and every logical-break whitespace
//!   run (and whitespace at block edges) normalised to `"\n\n"`.
//!
//! ## Size
//!
//! Sizes are counted in characters. `max_size` is a soft target on the block
//! path: a block longer than `max_size` becomes its own oversized chunk and
//! is never cut.

use tracing::warn;

/// Inserted between blocks packed into the same chunk.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Default maximum chunk size in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 15_000;

/// Split `text` into ordered, non-empty chunks of roughly `max_size` characters.
///
/// Returns an empty vector for empty or whitespace-only input. A `max_size`
/// of 0 is treated as 1.
pub fn chunk(text: &str, max_size: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let max_size = max_size.max(1);
    let blocks = logical_blocks(text);

    if blocks.len() <= 1 && text.chars().count() <= max_size {
        return vec![text.to_string()];
    }

    if blocks.len() <= 1 {
        warn!(
            "No logical breaks found in {} chars of text; falling back to fixed-size chunks of {}",
            text.chars().count(),
            max_size
        );
        return fixed_size_slices(text, max_size);
    }

    pack_blocks(&blocks, max_size)
}

/// Split at logical breaks, trim each block, drop empty ones.
pub fn logical_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut block_start = 0;
    let mut offset = 0;
    // Whether the previous line was blank and was itself preceded by a newline.
    let mut after_blank_line = false;
    let mut first_line = true;

    for line in text.split_inclusive('\n') {
        let starts_with_text = line.chars().next().is_some_and(|c| !c.is_whitespace());
        if after_blank_line && starts_with_text {
            blocks.push(&text[block_start..offset]);
            block_start = offset;
        }
        after_blank_line = !first_line && line.trim().is_empty() && line.ends_with('\n');
        first_line = false;
        offset += line.len();
    }
    blocks.push(&text[block_start..]);

    blocks
        .into_iter()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect()
}

fn fixed_size_slices(text: &str, max_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_size)
        .map(|slice| slice.iter().collect())
        .collect()
}

fn pack_blocks(blocks: &[&str], max_size: usize) -> Vec<String> {
    let separator_len = BLOCK_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for block in blocks {
        let block_len = block.chars().count();
        if current_len > 0 && current_len + block_len + separator_len > max_size {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push_str(BLOCK_SEPARATOR);
            current_len += separator_len;
        }
        current.push_str(block);
        current_len += block_len;
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_input_yields_no_chunks() {
        assert!(chunk("", 10).is_empty());
        assert!(chunk("   ", 10).is_empty());
        assert!(chunk("\n\n\t \n", 10).is_empty());
    }

    #[test]
    fn small_text_is_returned_verbatim() {
        let text = "  # Title\nbody  \n";
        assert_eq!(chunk(text, 1000), vec![text.to_string()]);
    }

    #[test]
    fn blocks_split_on_blank_line_before_unindented_line() {
        let text = "# A\n\nalpha\n\n# B\n\nbeta";
        assert_eq!(logical_blocks(text), ["# A", "alpha", "# B", "beta"]);
    }

    #[test]
    fn indented_line_after_blank_line_is_not_a_break() {
        let text = "intro\n\n    code line\nmore";
        assert_eq!(logical_blocks(text), [text]);
    }

    #[test]
    fn whitespace_only_lines_count_as_blank() {
        let text = "one\n  \t\n\ntwo";
        assert_eq!(logical_blocks(text), ["one", "two"]);
    }

    #[test]
    fn blank_first_line_is_not_a_break_marker() {
        // No newline precedes the blank first line, so "x" opens the only block.
        assert_eq!(logical_blocks("  \nx"), ["x"]);
    }

    #[test]
    fn crlf_line_endings_are_handled() {
        let text = "# A\r\n\r\nalpha\r\n\r\n# B";
        assert_eq!(logical_blocks(text), ["# A", "alpha", "# B"]);
    }

    #[test]
    fn everything_fits_in_one_packed_chunk() {
        let text = "# A\n\nalpha\n\n# B\n\nbeta";
        assert_eq!(chunk(text, 1000), vec![text.to_string()]);
    }

    #[test]
    fn packing_respects_max_size() {
        let text = "aaaa\n\nbbbb\n\ncccc\n\ndddd";
        // "aaaa\n\nbbbb" is 10 chars; adding another block would make 16.
        let chunks = chunk(text, 10);
        assert_eq!(chunks, ["aaaa\n\nbbbb", "cccc\n\ndddd"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn oversized_block_is_kept_whole() {
        let big = "x".repeat(30);
        let text = format!("small\n\n{big}\n\ntail");
        let chunks = chunk(&text, 10);
        assert_eq!(chunks, vec!["small".to_string(), big, "tail".to_string()]);
    }

    #[test]
    fn fallback_slices_reconstruct_exactly() {
        let text = "abcdefghij".repeat(5);
        let chunks = chunk(&text, 12);
        assert_eq!(chunks.len(), 5);
        assert!(chunks[..4].iter().all(|c| c.chars().count() == 12));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn fallback_counts_characters_not_bytes() {
        let text = "é".repeat(7);
        let chunks = chunk(&text, 3);
        assert_eq!(chunks, ["ééé", "ééé", "é"]);
    }

    #[test]
    fn block_path_reconstructs_up_to_break_normalisation() {
        let text = "\n  # One\nbody one\n\n\n# Two\nbody two  \n \n# Three\n";
        let chunks = chunk(text, 12);
        assert!(chunks.len() > 1);
        assert_eq!(
            chunks.join(BLOCK_SEPARATOR),
            "# One\nbody one\n\n# Two\nbody two\n\n# Three"
        );
    }

    #[test]
    fn chunks_are_never_empty() {
        let inputs = [
            "a\n\n\n\nb",
            "\n\nx\n\n\n\n",
            "para\n\n  indented\n\nnext",
            "one long line without breaks at all",
        ];
        for text in inputs {
            for max in [1, 2, 5, 100] {
                for c in chunk(text, max) {
                    assert!(!c.is_empty(), "empty chunk for {text:?} / {max}");
                }
            }
        }
    }

    #[test]
    fn zero_max_size_is_clamped() {
        assert_eq!(chunk("abc", 0), ["a", "b", "c"]);
    }
}

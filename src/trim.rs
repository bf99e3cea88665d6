//! In-place trimming of pad characters from NUL-terminated buffers.

/// String terminator used by every buffer the driver touches.
pub const TERMINATOR: u8 = 0x00;

/// Strip `pad` from both ends of the text held in `buffer[..capacity]`.
///
/// The text ends at the first [`TERMINATOR`] (or at `capacity` if there is
/// none). Trailing pad bytes are overwritten with terminators scanning back to
/// index 1; index 0 is only ever removed by the leading-run pass. The
/// remaining text is moved to the front of the buffer and re-terminated.
///
/// # Returns
/// Length of the trimmed text
pub fn trim(buffer: &mut [u8], capacity: usize, pad: u8) -> usize {
    let capacity = capacity.min(buffer.len());

    let mut end = buffer[..capacity]
        .iter()
        .position(|&b| b == TERMINATOR)
        .unwrap_or(capacity);

    let mut index = end;
    while index > 1 {
        index -= 1;
        if buffer[index] != pad {
            break;
        }
        buffer[index] = TERMINATOR;
        end = index;
    }

    let start = buffer[..end].iter().take_while(|&&b| b == pad).count();

    let len = end - start;
    buffer.copy_within(start..end, 0);
    if len < capacity {
        buffer[len] = TERMINATOR;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAD: u8 = 0x15;

    fn padded(text: &[u8], buf: &mut [u8]) {
        buf.fill(TERMINATOR);
        buf[0] = PAD;
        buf[1..1 + text.len()].copy_from_slice(text);
        buf[1 + text.len()] = PAD;
    }

    #[test]
    fn test_strips_single_pad_on_both_ends() {
        let mut buf = [0u8; 32];
        padded(b"\r\nOK\r\n> ", &mut buf);

        let len = trim(&mut buf, 32, PAD);

        assert_eq!(&buf[..len], b"\r\nOK\r\n> ");
        assert_eq!(buf[len], TERMINATOR);
    }

    #[test]
    fn test_pad_text_pad_yields_text_for_any_length() {
        let text = b"[JOIN   ] net,10.0.0.5,0,0";
        for n in 0..=text.len() {
            let mut buf = [0u8; 32];
            padded(&text[..n], &mut buf);

            let len = trim(&mut buf, 32, PAD);

            assert_eq!(&buf[..len], &text[..n], "text length {}", n);
            assert_eq!(buf[len], TERMINATOR);
        }
    }

    #[test]
    fn test_strips_runs_of_pad() {
        let mut buf = [0u8; 16];
        buf[..9].copy_from_slice(&[PAD, PAD, PAD, b'a', b'b', PAD, PAD, PAD, PAD]);

        let len = trim(&mut buf, 16, PAD);

        assert_eq!(&buf[..len], b"ab");
    }

    #[test]
    fn test_trimming_is_idempotent() {
        let text = b"\r\n[SOMA]Accepted[EOMA]\r\nOK\r\n> ";
        for n in [0usize, 1, 2, 7, 8, text.len()] {
            let mut buf = [0u8; 40];
            padded(&text[..n], &mut buf);

            let first = trim(&mut buf, 40, PAD);
            let mut again = buf;
            let second = trim(&mut again, 40, PAD);

            assert_eq!(first, second);
            assert_eq!(&buf[..first], &again[..second]);
        }
    }

    #[test]
    fn test_text_without_pad_is_untouched() {
        let mut buf = [0u8; 8];
        buf[..3].copy_from_slice(b"abc");

        assert_eq!(trim(&mut buf, 8, PAD), 3);
        assert_eq!(&buf[..4], b"abc\0");
    }

    #[test]
    fn test_all_pad_buffer_trims_to_empty() {
        // No terminator at all: the backward pass stops at index 1 and leaves
        // index 0 to the leading-run pass.
        let mut buf = [PAD; 6];

        let len = trim(&mut buf, 6, PAD);

        assert_eq!(len, 0);
        assert_eq!(buf[0], TERMINATOR);
    }

    #[test]
    fn test_backward_pass_never_clears_index_zero() {
        // A single pad byte followed by a terminator: the backward scan has
        // nothing to do, the forward scan consumes index 0.
        let mut buf = [PAD, TERMINATOR, b'x', b'y'];

        let len = trim(&mut buf, 4, PAD);

        assert_eq!(len, 0);
        assert_eq!(buf[0], TERMINATOR);
        assert_eq!(&buf[2..], b"xy");
    }

    #[test]
    fn test_respects_capacity() {
        let mut buf = [b'a', b'b', PAD, PAD, b'z', b'z'];

        let len = trim(&mut buf, 4, PAD);

        assert_eq!(&buf[..len], b"ab");
        assert_eq!(&buf[4..], b"zz");
    }

    #[test]
    fn test_full_window_leaves_bytes_past_capacity_alone() {
        let mut buf = [b'a', b'b', b'c', b'd', b'Z', b'Z'];

        let len = trim(&mut buf, 4, PAD);

        assert_eq!(len, 4);
        assert_eq!(&buf, b"abcdZZ");
    }
}

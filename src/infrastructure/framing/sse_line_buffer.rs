const BLOCK_TERMINATOR: &[u8] = b"\n\n";

/// Reassembles server-sent event blocks from arbitrarily split reads.
///
/// Bytes are kept until a blank line closes the block, so multi-byte
/// characters and `data:` lines cut across reads come out whole.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
    // No terminator starts before this index of `pending`.
    scan_from: usize,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every block completed by them, without
    /// the terminating blank line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));

        let mut blocks = Vec::new();
        while let Some(end) = find_terminator(&self.pending, self.scan_from) {
            let rest = self.pending.split_off(end + BLOCK_TERMINATOR.len());
            let mut block = std::mem::replace(&mut self.pending, rest);
            block.truncate(end);
            self.scan_from = 0;
            if !block.iter().all(|b| *b == b'\n') {
                blocks.push(String::from_utf8_lossy(&block).into_owned());
            }
        }
        self.scan_from = self
            .pending
            .len()
            .saturating_sub(BLOCK_TERMINATOR.len() - 1);
        blocks
    }

    /// Flushes a final block that was never terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        self.scan_from = 0;
        let text = String::from_utf8_lossy(&rest);
        let trimmed = text.trim_matches('\n');
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

fn find_terminator(bytes: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(BLOCK_TERMINATOR.len())
        .position(|w| w == BLOCK_TERMINATOR)
        .map(|i| i + from)
}

/// Payload of the `data:` lines of a block, joined with newlines.
/// Comments and other fields are ignored.
pub fn block_data(block: &str) -> Option<String> {
    let lines: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

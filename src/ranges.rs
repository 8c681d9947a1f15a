use std::fmt;

/// An inclusive `[begin, end]` span of a resource's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub begin: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.begin + 1
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.begin, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// Splits `[0, total_size)` into consecutive ranges of `chunk_size` bytes.
///
/// The last range is truncated so it always ends at `total_size - 1`.
/// Returns nothing for an empty resource.
pub fn partition(total_size: u64, chunk_size: u64) -> Vec<ByteRange> {
    debug_assert!(chunk_size > 0, "chunk size must be positive");
    if total_size == 0 || chunk_size == 0 {
        return Vec::new();
    }

    let mut ranges = Vec::with_capacity(total_size.div_ceil(chunk_size) as usize);
    let mut begin = 0;
    while begin < total_size {
        let end = begin.saturating_add(chunk_size).min(total_size) - 1;
        ranges.push(ByteRange::new(begin, end));
        begin = end + 1;
    }
    ranges
}

//! Payload segmentation into link-sized chunks.

/// One contiguous slice of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Byte offset of the first byte within the payload.
    pub offset: u64,
    /// Chunk contents, borrowed from the payload.
    pub bytes: &'a [u8],
}

impl Chunk<'_> {
    /// Chunk length in bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns `true` for a zero-length chunk (never produced by the segmenter).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.len()
    }
}

/// Return the chunk `[offset, min(offset + chunk_size, N))`.
///
/// Returns `None` when `offset >= N` or `chunk_size == 0`. Pure function of
/// its arguments, so a chunk can be re-derived for any offset.
#[allow(clippy::cast_possible_truncation)]
pub fn next_chunk(payload: &[u8], offset: u64, chunk_size: u32) -> Option<Chunk<'_>> {
    let total = payload.len() as u64;
    if chunk_size == 0 || offset >= total {
        return None;
    }

    let end = offset.saturating_add(u64::from(chunk_size)).min(total);
    Some(Chunk {
        offset,
        bytes: &payload[offset as usize..end as usize],
    })
}

/// Number of chunks a payload of `len` bytes splits into.
pub fn chunk_count(len: u64, chunk_size: u32) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(u64::from(chunk_size))
}

/// Lazy iterator over the chunks of a payload.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    payload: &'a [u8],
    offset: u64,
    chunk_size: u32,
}

impl<'a> Segments<'a> {
    /// Iterate from an arbitrary offset (used when resuming).
    pub fn starting_at(payload: &'a [u8], offset: u64, chunk_size: u32) -> Self {
        Self {
            payload,
            offset,
            chunk_size,
        }
    }

    /// Offset of the next chunk to be produced.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = next_chunk(self.payload, self.offset, self.chunk_size)?;
        self.offset = chunk.end();
        Some(chunk)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.payload.len() as u64).saturating_sub(self.offset);
        let n = chunk_count(remaining, self.chunk_size) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Segments<'_> {}

/// Iterate the whole payload in `chunk_size` pieces.
pub fn segments(payload: &[u8], chunk_size: u32) -> Segments<'_> {
    Segments::starting_at(payload, 0, chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        #[allow(clippy::cast_possible_truncation)]
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_scenario_1000_bytes_by_300() {
        let data = pattern(1000);
        let bounds: Vec<(u64, u64)> = segments(&data, 300)
            .map(|c| (c.offset, c.end()))
            .collect();
        assert_eq!(bounds, vec![(0, 300), (300, 600), (600, 900), (900, 1000)]);
    }

    #[test]
    fn test_concatenation_reconstructs_payload() {
        for len in [0usize, 1, 2, 299, 300, 301, 1000, 4097] {
            let data = pattern(len);
            for chunk_size in [1u32, 2, 3, 7, 300, 512, 5000] {
                let mut rebuilt = Vec::with_capacity(len);
                let mut expected_offset = 0u64;
                for chunk in segments(&data, chunk_size) {
                    assert_eq!(chunk.offset, expected_offset, "gap or overlap");
                    assert!(!chunk.is_empty());
                    assert!(chunk.len() <= u64::from(chunk_size));
                    rebuilt.extend_from_slice(chunk.bytes);
                    expected_offset = chunk.end();
                }
                assert_eq!(rebuilt, data, "len={len} chunk_size={chunk_size}");
            }
        }
    }

    #[test]
    fn test_empty_payload_yields_nothing() {
        assert_eq!(segments(&[], 16).count(), 0);
        assert!(next_chunk(&[], 0, 16).is_none());
    }

    #[test]
    fn test_chunk_larger_than_payload() {
        let data = pattern(10);
        let chunks: Vec<_> = segments(&data, 64).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].bytes, &data[..]);
    }

    #[test]
    fn test_next_chunk_is_deterministic() {
        let data = pattern(100);
        assert_eq!(next_chunk(&data, 40, 25), next_chunk(&data, 40, 25));
        let c = next_chunk(&data, 90, 25).unwrap();
        assert_eq!(c.offset, 90);
        assert_eq!(c.len(), 10);
        assert!(next_chunk(&data, 100, 25).is_none());
        assert!(next_chunk(&data, 500, 25).is_none());
    }

    #[test]
    fn test_zero_chunk_size_yields_nothing() {
        let data = pattern(10);
        assert!(next_chunk(&data, 0, 0).is_none());
        assert_eq!(chunk_count(10, 0), 0);
    }

    #[test]
    fn test_chunk_count_and_size_hint() {
        assert_eq!(chunk_count(1000, 300), 4);
        assert_eq!(chunk_count(900, 300), 3);
        assert_eq!(chunk_count(0, 300), 0);

        let data = pattern(1000);
        let mut it = Segments::starting_at(&data, 300, 300);
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.offset(), 600);
        assert_eq!(it.len(), 2);
    }
}

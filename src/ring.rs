/// Fixed-capacity byte ring between the producer and the pump. The next free
/// write position is `start + len` modulo capacity; buffered audio is never
/// overwritten.
#[derive(Debug)]
pub(crate) struct RingBuffer {
    buf: Vec<u8>,
    start: usize,
    len: usize,
}

impl RingBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            start: 0,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn free(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Copies as much of `data` as fits, wrapping past the physical end.
    /// Returns the number of bytes copied.
    pub(crate) fn write(&mut self, data: &[u8]) -> usize {
        let count = self.free().min(data.len());
        if count == 0 {
            return 0;
        }
        let pos = (self.start + self.len) % self.buf.len();
        let head = count.min(self.buf.len() - pos);
        self.buf[pos..pos + head].copy_from_slice(&data[..head]);
        self.buf[..count - head].copy_from_slice(&data[head..count]);
        self.len += count;
        count
    }

    /// Feeds up to `max` buffered bytes to `send` in at most two contiguous
    /// runs, discarding exactly what `send` reports accepted. The second run
    /// is only offered when the first was taken in full.
    pub(crate) fn read_into(
        &mut self,
        max: usize,
        mut send: impl FnMut(&[u8]) -> usize,
    ) -> usize {
        let count = self.len.min(max);
        if count == 0 {
            return 0;
        }
        let head = count.min(self.buf.len() - self.start);
        let mut accepted = send(&self.buf[self.start..self.start + head]).min(head);
        if accepted == head && count > head {
            accepted += send(&self.buf[..count - head]).min(count - head);
        }
        self.start = (self.start + accepted) % self.buf.len();
        self.len -= accepted;
        accepted
    }

    /// Discards all buffered bytes.
    pub(crate) fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_all(ring: &mut RingBuffer, max: usize) -> Vec<u8> {
        let mut out = Vec::new();
        ring.read_into(max, |chunk| {
            out.extend_from_slice(chunk);
            chunk.len()
        });
        out
    }

    #[test]
    fn write_then_read_preserves_order_across_wrap() {
        let mut ring = RingBuffer::new(8);
        assert_eq!(ring.write(&[1, 2, 3, 4, 5, 6]), 6);
        assert_eq!(drain_all(&mut ring, 4), vec![1, 2, 3, 4]);
        // Start is now 4; this write wraps around the end.
        assert_eq!(ring.write(&[7, 8, 9, 10]), 4);
        assert_eq!(ring.len(), 6);
        assert_eq!(drain_all(&mut ring, 6), vec![5, 6, 7, 8, 9, 10]);
        assert!(ring.is_empty());
    }

    #[test]
    fn write_never_overwrites_buffered_audio() {
        let mut ring = RingBuffer::new(4);
        assert_eq!(ring.write(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(ring.write(&[7]), 0);
        assert_eq!(ring.free(), 0);
        assert_eq!(drain_all(&mut ring, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn partial_acceptance_keeps_the_rest_buffered() {
        let mut ring = RingBuffer::new(8);
        ring.write(&[1, 2, 3, 4, 5, 6]);
        drain_all(&mut ring, 4);
        ring.write(&[7, 8, 9, 10]);
        // Head run is 4..8; accept only half of it.
        let mut seen = Vec::new();
        let accepted = ring.read_into(6, |chunk| {
            seen.extend_from_slice(chunk);
            2.min(chunk.len())
        });
        assert_eq!(accepted, 2);
        assert_eq!(seen, vec![5, 6, 7, 8]);
        assert_eq!(ring.len(), 4);
        assert_eq!(drain_all(&mut ring, 8), vec![7, 8, 9, 10]);
    }

    #[test]
    fn second_run_is_skipped_unless_first_fully_taken() {
        let mut ring = RingBuffer::new(4);
        ring.write(&[1, 2, 3]);
        drain_all(&mut ring, 3);
        ring.write(&[4, 5, 6]);
        let mut calls = 0;
        ring.read_into(3, |chunk| {
            calls += 1;
            chunk.len() - 1
        });
        assert_eq!(calls, 1);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn clear_discards_everything() {
        let mut ring = RingBuffer::new(4);
        ring.write(&[1, 2, 3]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.free(), 4);
        assert_eq!(ring.write(&[9, 9, 9, 9]), 4);
        assert_eq!(drain_all(&mut ring, 4), vec![9, 9, 9, 9]);
    }

    #[test]
    fn read_respects_max() {
        let mut ring = RingBuffer::new(8);
        ring.write(&[1, 2, 3, 4, 5]);
        assert_eq!(drain_all(&mut ring, 2), vec![1, 2]);
        assert_eq!(ring.len(), 3);
    }
}

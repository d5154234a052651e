//! Byte-stream framing over the line ring.
//!
//! A [`LineFramer`] owns the producer half of a ring and turns a
//! byte-at-a-time receive path (typically a UART RX interrupt) into
//! committed line records: data bytes append to the in-progress record
//! and a terminator byte commits it. Full-ring and over-length
//! conditions follow a drop-the-line policy: the offending line is
//! discarded, framing resynchronizes at the next terminator, and the
//! event is reported to the caller and counted.

use crate::ring::{Error, LineWriter, WriteHandle, LINE_TERMINATOR};

/// Default line terminator for the framer
pub const DEFAULT_TERMINATOR: u8 = b'\n';

/// Pull-based source of raw bytes
///
/// Implemented by the receive side of a serial driver, or by a canned
/// byte script in tests and simulations.
pub trait ByteSource {
    /// Error type for receive operations
    type Error;

    /// Fetch the next byte from the source
    fn next_byte(&mut self) -> Result<u8, Self::Error>;
}

/// Outcome of feeding one byte to the framer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedStatus {
    /// Byte consumed; the current line is still being assembled
    Pending,
    /// A complete line was committed to the ring
    Committed,
    /// The current line was discarded (ring full or line too long);
    /// framing resumes at the next terminator
    LineDropped(Error),
}

/// Incremental line assembler driving a [`LineWriter`].
pub struct LineFramer<'a> {
    writer: LineWriter<'a>,
    terminator: u8,
    handle: Option<WriteHandle>,
    /// Discarding the rest of a dropped line until its terminator
    skip_to_terminator: bool,
    lines_committed: u32,
    lines_dropped: u32,
}

impl<'a> LineFramer<'a> {
    /// Create a framer splitting the stream on `\n`
    pub fn new(writer: LineWriter<'a>) -> Self {
        Self::with_terminator(writer, DEFAULT_TERMINATOR)
    }

    /// Create a framer splitting the stream on `terminator`
    pub fn with_terminator(writer: LineWriter<'a>, terminator: u8) -> Self {
        Self {
            writer,
            terminator,
            handle: None,
            skip_to_terminator: false,
            lines_committed: 0,
            lines_dropped: 0,
        }
    }

    /// Total lines committed to the ring
    pub fn lines_committed(&self) -> u32 {
        self.lines_committed
    }

    /// Total lines dropped due to a full ring or overflow
    pub fn lines_dropped(&self) -> u32 {
        self.lines_dropped
    }

    /// Feed one received byte.
    ///
    /// Safe to call from an interrupt context; never blocks and never
    /// allocates. Bytes equal to the stored record sentinel
    /// ([`LINE_TERMINATOR`]) are skipped, since they cannot be
    /// represented in the slot layout.
    pub fn feed(&mut self, byte: u8) -> FeedStatus {
        if byte == self.terminator {
            return self.end_of_line();
        }
        if self.skip_to_terminator {
            return FeedStatus::Pending;
        }
        if byte == LINE_TERMINATOR {
            return FeedStatus::Pending;
        }

        let handle = match self.take_or_begin_handle() {
            Ok(handle) => handle,
            Err(err) => return self.drop_line(err),
        };
        match self.writer.append(&handle, byte) {
            Ok(()) => {
                self.handle = Some(handle);
                FeedStatus::Pending
            }
            Err(err) => {
                // `append` already reset the write position.
                drop(handle);
                self.drop_line(err)
            }
        }
    }

    /// Pull one byte from `source` and feed it.
    pub fn pump<S: ByteSource>(&mut self, source: &mut S) -> Result<FeedStatus, S::Error> {
        let byte = source.next_byte()?;
        Ok(self.feed(byte))
    }

    fn end_of_line(&mut self) -> FeedStatus {
        if self.skip_to_terminator {
            // The dropped line is over; resume framing.
            self.skip_to_terminator = false;
            return FeedStatus::Pending;
        }
        let handle = match self.take_or_begin_handle() {
            Ok(handle) => handle,
            Err(err) => {
                self.lines_dropped += 1;
                return FeedStatus::LineDropped(err);
            }
        };
        match self.writer.commit(handle) {
            Ok(()) => {
                self.lines_committed += 1;
                FeedStatus::Committed
            }
            // A held handle means the slot was free at begin time, and
            // only the consumer moves `tail`, so the ring cannot fill
            // up before the commit. Counted as a drop regardless; the
            // record stays in progress and the next line resumes it.
            Err(err) => {
                self.lines_dropped += 1;
                FeedStatus::LineDropped(err)
            }
        }
    }

    fn take_or_begin_handle(&mut self) -> Result<WriteHandle, Error> {
        match self.handle.take() {
            Some(handle) => Ok(handle),
            None => self.writer.begin_write(),
        }
    }

    fn drop_line(&mut self, err: Error) -> FeedStatus {
        self.handle = None;
        self.skip_to_terminator = true;
        self.lines_dropped += 1;
        FeedStatus::LineDropped(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::LineRing;

    /// Canned byte stream that cycles forever, like a looped serial feed
    struct ScriptedSource {
        script: &'static [u8],
        pos: usize,
    }

    impl ByteSource for ScriptedSource {
        type Error = core::convert::Infallible;

        fn next_byte(&mut self) -> Result<u8, Self::Error> {
            let byte = self.script[self.pos];
            self.pos = (self.pos + 1) % self.script.len();
            Ok(byte)
        }
    }

    #[test]
    fn test_feed_assembles_and_commits_line() {
        let mut ring = LineRing::new(4, 16).unwrap();
        let (writer, mut reader) = ring.split();
        let mut framer = LineFramer::new(writer);

        for &byte in b"Hello World" {
            assert_eq!(framer.feed(byte), FeedStatus::Pending);
        }
        assert_eq!(framer.feed(b'\n'), FeedStatus::Committed);
        assert_eq!(framer.lines_committed(), 1);

        assert_eq!(&*reader.read_oldest().unwrap(), b"Hello World");
    }

    #[test]
    fn test_terminator_alone_commits_empty_line() {
        let mut ring = LineRing::new(4, 16).unwrap();
        let (writer, mut reader) = ring.split();
        let mut framer = LineFramer::new(writer);

        assert_eq!(framer.feed(b'\n'), FeedStatus::Committed);
        assert_eq!(&*reader.read_oldest().unwrap(), b"");
    }

    #[test]
    fn test_overlong_line_dropped_then_resyncs() {
        let mut ring = LineRing::new(4, 4).unwrap();
        let (writer, mut reader) = ring.split();
        let mut framer = LineFramer::new(writer);

        let mut statuses = [FeedStatus::Pending; 9];
        for (i, &byte) in b"toolong\nok".iter().take(9).enumerate() {
            statuses[i] = framer.feed(byte);
        }
        // Bytes t,o,o,l fill the slot; appending 'o' overflows; n,g are
        // skipped; '\n' resynchronizes; 'o' starts the next line.
        assert_eq!(statuses[4], FeedStatus::LineDropped(Error::BufferOverflow));
        assert_eq!(statuses[7], FeedStatus::Pending);
        assert_eq!(framer.lines_dropped(), 1);

        assert_eq!(framer.feed(b'k'), FeedStatus::Pending);
        assert_eq!(framer.feed(b'\n'), FeedStatus::Committed);
        assert_eq!(&*reader.read_oldest().unwrap(), b"ok");
        assert!(reader.read_oldest().is_none());
    }

    #[test]
    fn test_full_ring_drops_whole_line() {
        let mut ring = LineRing::new(2, 16).unwrap();
        let (writer, mut reader) = ring.split();
        let mut framer = LineFramer::new(writer);

        for &byte in b"first\n" {
            framer.feed(byte);
        }
        assert_eq!(
            framer.feed(b's'),
            FeedStatus::LineDropped(Error::WriterFull)
        );
        // The rest of the dropped line is discarded quietly.
        assert_eq!(framer.feed(b'e'), FeedStatus::Pending);
        assert_eq!(framer.feed(b'\n'), FeedStatus::Pending);

        // Draining the ring makes room for the next line.
        assert_eq!(&*reader.read_oldest().unwrap(), b"first");
        for &byte in b"third" {
            assert_eq!(framer.feed(byte), FeedStatus::Pending);
        }
        assert_eq!(framer.feed(b'\n'), FeedStatus::Committed);
        assert_eq!(&*reader.read_oldest().unwrap(), b"third");

        assert_eq!(framer.lines_committed(), 2);
        assert_eq!(framer.lines_dropped(), 1);
    }

    #[test]
    fn test_sentinel_valued_bytes_are_skipped() {
        let mut ring = LineRing::new(4, 16).unwrap();
        let (writer, mut reader) = ring.split();
        let mut framer = LineFramer::new(writer);

        for &byte in &[b'a', LINE_TERMINATOR, b'b', b'\n'] {
            framer.feed(byte);
        }
        assert_eq!(&*reader.read_oldest().unwrap(), b"ab");
    }

    #[test]
    fn test_custom_terminator() {
        let mut ring = LineRing::new(4, 16).unwrap();
        let (writer, mut reader) = ring.split();
        let mut framer = LineFramer::with_terminator(writer, b';');

        for &byte in b"cmd;" {
            framer.feed(byte);
        }
        assert_eq!(&*reader.read_oldest().unwrap(), b"cmd");
    }

    #[test]
    fn test_pump_draws_from_source() {
        let mut source = ScriptedSource {
            script: b"Test\n",
            pos: 0,
        };
        let mut ring = LineRing::new(4, 16).unwrap();
        let (writer, mut reader) = ring.split();
        let mut framer = LineFramer::new(writer);

        let mut committed = 0;
        for _ in 0..10 {
            if framer.pump(&mut source).unwrap() == FeedStatus::Committed {
                committed += 1;
            }
        }
        assert_eq!(committed, 2);
        assert_eq!(&*reader.read_oldest().unwrap(), b"Test");
        assert_eq!(&*reader.read_oldest().unwrap(), b"Test");
    }
}

//! Host-side simulation of the serial line pipeline
//!
//! Stands in for the embedded topology: a fake serial port feeds a
//! simulated RX interrupt (producer thread) one byte at a time, the
//! framer commits lines into the ring, and a lower-priority consumer
//! thread waits on a wake signal and prints each line. The ring and
//! framer are the real thing; only the transport, signal, and
//! scheduling are simulated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use stichos_core::{ByteSource, Error, FeedStatus, LineFramer, LineRing};

mod signal;

use signal::WakeSignal;

/// Scripted serial traffic, cycled like a looped transmitter. With a
/// 16-byte line budget, the two long lines overflow and are dropped;
/// the short ones come through.
const TRANSCRIPT: &[u8] =
    b"Long line for testing\nShort line\nTest\nToo long line for testing\n";

/// Full passes over the transcript before the simulation stops
const PASSES: usize = 3;

/// Simulated RX interrupt rate
const BYTE_INTERVAL: Duration = Duration::from_micros(200);

const RING_DEPTH: usize = 4;
const MAX_LINE_SIZE: usize = 16;

/// Fake serial port replaying the transcript
struct ScriptedUart {
    pos: usize,
}

impl ByteSource for ScriptedUart {
    type Error = std::convert::Infallible;

    fn next_byte(&mut self) -> Result<u8, Self::Error> {
        let byte = TRANSCRIPT[self.pos];
        self.pos = (self.pos + 1) % TRANSCRIPT.len();
        Ok(byte)
    }
}

fn main() {
    let mut ring = LineRing::new(RING_DEPTH, MAX_LINE_SIZE).expect("ring allocation");
    let (writer, mut reader) = ring.split();

    let wake = WakeSignal::new();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        // Simulated RX interrupt: one byte per tick, signal on commit.
        s.spawn(|| {
            let mut uart = ScriptedUart { pos: 0 };
            let mut framer = LineFramer::new(writer);

            for _ in 0..PASSES * TRANSCRIPT.len() {
                match framer.pump(&mut uart) {
                    Ok(FeedStatus::Committed) => wake.signal(),
                    Ok(FeedStatus::LineDropped(Error::BufferOverflow)) => {
                        eprintln!("[rx] line exceeded {MAX_LINE_SIZE} bytes, dropped");
                    }
                    Ok(FeedStatus::LineDropped(err)) => {
                        eprintln!("[rx] line dropped: {err:?}");
                    }
                    Ok(FeedStatus::Pending) => {}
                    Err(infallible) => match infallible {},
                }
                thread::sleep(BYTE_INTERVAL);
            }

            eprintln!(
                "[rx] done: {} committed, {} dropped",
                framer.lines_committed(),
                framer.lines_dropped()
            );
            done.store(true, Ordering::Release);
            wake.signal();
        });

        // Consumer task: wait for a commit, drain, repeat.
        s.spawn(|| {
            let mut buf = [0u8; MAX_LINE_SIZE];
            loop {
                wake.wait();
                while let Ok(n) = reader.read_into(&mut buf) {
                    println!("{}", String::from_utf8_lossy(&buf[..n]));
                }
                if done.load(Ordering::Acquire) && reader.is_empty() {
                    break;
                }
            }
        });
    });
}

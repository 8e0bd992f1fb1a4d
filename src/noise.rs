//! Background noise feed.
//!
//! Cosmetic stream of pseudo-code lines scrolling behind the sequence.
//! Seeded RNG for deterministic output; never touches sequencer state.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::observability::events::{EventSink, SequenceEvent};
use crate::sequence::timer::{TaskHandle, sleep_unless_cancelled};

/// Lines kept in the scrollback.
pub const NOISE_CAPACITY: usize = 30;

/// Interval between noise lines.
pub const NOISE_TICK: Duration = Duration::from_millis(40);

const SNIPPETS: [&str; 20] = [
    "struct group_info init_groups = { .usage = ATOMIC_INIT(2) };",
    "unsigned long buffer[1024];",
    "void inject_payload(void *addr) {",
    "  memcpy(addr, shellcode, sizeof(shellcode));",
    "}",
    "// TARGET: XIONG_YUXIAN //",
    "connecting to neural_link...",
    "decrypting_bios_signature...",
    "downloading memory_dump_0xA1F...",
    "ACCESS_LEVEL: GOD_MODE",
    "loading knowledge_base.json...",
    "if (query == UNKNOWN) { force_resolve(); }",
    "0x7F 0x45 0x4C 0x46 0x01 0x01 0x01 0x00",
    "System.out.println('TRUTH_FOUND');",
    "Matrix.reload();",
    "searching deep_web_sector_7...",
    "=> bypass_firewall(true);",
    "CRITICAL ERROR: KNOWLEDGE OVERFLOW",
    "optimizing quantum states...",
    "var xiong = new Human({iq: 'calculating...'});",
];

/// Bounded scrollback of random snippets.
#[derive(Debug)]
pub struct NoiseFeed {
    rng: StdRng,
    lines: VecDeque<String>,
    capacity: usize,
}

impl NoiseFeed {
    /// Creates an empty feed with the default capacity.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_capacity(seed, NOISE_CAPACITY)
    }

    /// Creates an empty feed holding at most `capacity` lines.
    #[must_use]
    pub fn with_capacity(seed: u64, capacity: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            lines: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends one `> snippet` line, evicting the oldest beyond capacity.
    /// Returns the new line.
    pub fn tick(&mut self) -> String {
        let snippet = SNIPPETS[self.rng.random_range(0..SNIPPETS.len())];
        let line = format!("> {snippet}");
        self.lines.push_back(line.clone());
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
        line
    }

    /// Returns the scrollback, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Returns the number of lines held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns whether the feed is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Spawns a task emitting a [`SequenceEvent::NoiseLine`] every
/// [`NOISE_TICK`] until `parent` is cancelled or the handle is dropped.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_noise(mut feed: NoiseFeed, events: EventSink, parent: &CancellationToken) -> TaskHandle {
    TaskHandle::spawn(parent, move |token| async move {
        while sleep_unless_cancelled(NOISE_TICK, &token).await {
            let text = feed.tick();
            events.send(SequenceEvent::NoiseLine { text });
        }
        debug!(lines = feed.len(), "noise feed stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_prefixed_snippets() {
        let mut feed = NoiseFeed::new(7);
        let line = feed.tick();
        let snippet = line.strip_prefix("> ").unwrap();
        assert!(SNIPPETS.contains(&snippet));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut feed = NoiseFeed::new(1);
        let first = feed.tick();
        for _ in 0..NOISE_CAPACITY {
            feed.tick();
        }
        assert_eq!(feed.len(), NOISE_CAPACITY);
        let mut replay = NoiseFeed::new(1);
        let expected: Vec<String> = (0..=NOISE_CAPACITY).map(|_| replay.tick()).skip(1).collect();
        assert_eq!(feed.lines().collect::<Vec<_>>(), expected);
        assert_eq!(first, NoiseFeed::new(1).tick());
    }

    #[test]
    fn same_seed_same_lines() {
        let mut a = NoiseFeed::new(42);
        let mut b = NoiseFeed::new(42);
        for _ in 0..50 {
            assert_eq!(a.tick(), b.tick());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_feed_ticks_until_cancelled() {
        let (sink, mut rx) = EventSink::channel();
        let root = CancellationToken::new();
        let _task = spawn_noise(NoiseFeed::new(3), sink, &root);

        tokio::time::sleep(Duration::from_millis(125)).await;
        root.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, SequenceEvent::NoiseLine { .. }));
            count += 1;
        }
        assert_eq!(count, 3);
    }
}

//! Debouncing and chord recognition for the four keypad buttons.
//!
//! Each tick feeds raw button levels and a millisecond timestamp. A raw change
//! becomes stable once it has held for the debounce window. The set of stable
//! buttons is then mapped to an event id; an id is reported once on its rising
//! edge and not again until the chord changes.

use tracing::trace;

/// Number of physical buttons.
pub const KEY_COUNT: usize = 4;

/// Chord event identifier (1..=10).
pub type EventId = u8;

/// Stable-button bit mask to event id. Bit `i` is button `i`.
const CHORD_TABLE: [(u8, EventId); 10] = [
    (0x01, 1),
    (0x02, 2),
    (0x04, 3),
    (0x08, 4),
    (0x03, 5),
    (0x05, 6),
    (0x06, 7),
    (0x0F, 8),
    (0x0C, 9),
    (0x09, 10),
];

/// Event id for a stable-button mask, `None` for unrecognized combinations.
#[must_use]
pub fn event_id_for_mask(mask: u8) -> Option<EventId> {
    CHORD_TABLE
        .iter()
        .find(|(chord, _)| *chord == mask)
        .map(|(_, id)| *id)
}

/// Debounce state machine and chord mapper.
#[derive(Debug, Clone)]
pub struct ChordMapper {
    debounce_ms: u32,
    last_raw: [bool; KEY_COUNT],
    stable: [bool; KEY_COUNT],
    last_change_ms: [u32; KEY_COUNT],
    last_event: Option<EventId>,
}

impl Default for ChordMapper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEBOUNCE_MS)
    }
}

impl ChordMapper {
    pub const DEFAULT_DEBOUNCE_MS: u32 = 30;

    #[must_use]
    pub const fn new(debounce_ms: u32) -> Self {
        Self {
            debounce_ms,
            last_raw: [false; KEY_COUNT],
            stable: [false; KEY_COUNT],
            last_change_ms: [0; KEY_COUNT],
            last_event: None,
        }
    }

    pub const fn debounce_ms(&self) -> u32 {
        self.debounce_ms
    }

    pub fn set_debounce_ms(&mut self, debounce_ms: u32) {
        self.debounce_ms = debounce_ms;
    }

    /// Forget all button history; the debounce window is kept.
    pub fn reset(&mut self) {
        let debounce_ms = self.debounce_ms;
        *self = Self::new(debounce_ms);
    }

    /// Advance one tick. Returns an event id only on a chord's rising edge.
    ///
    /// `now_ms` is a wrapping millisecond counter.
    pub fn update(&mut self, raw: [bool; KEY_COUNT], now_ms: u32) -> Option<EventId> {
        for (i, &level) in raw.iter().enumerate() {
            if level != self.last_raw[i] {
                self.last_raw[i] = level;
                self.last_change_ms[i] = now_ms;
            }
            if level != self.stable[i] {
                let held = now_ms.wrapping_sub(self.last_change_ms[i]);
                if self.debounce_ms == 0 || held >= self.debounce_ms {
                    trace!(key = i, pressed = level, held_ms = held, "Key state stable");
                    self.stable[i] = level;
                }
            }
        }

        let event = event_id_for_mask(self.stable_mask());
        match event {
            Some(id) if self.last_event != Some(id) => {
                self.last_event = Some(id);
                trace!(event = id, mask = self.stable_mask(), "Chord event");
                Some(id)
            }
            Some(_) => None,
            None => {
                self.last_event = None;
                None
            }
        }
    }

    /// Bit mask of the currently stable (debounced) buttons.
    #[must_use]
    pub fn stable_mask(&self) -> u8 {
        self.stable
            .iter()
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .fold(0u8, |mask, (i, _)| mask | (1u8 << i))
    }
}

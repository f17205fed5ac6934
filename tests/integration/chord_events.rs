//! Integration tests for debouncing and chord recognition.

use keypad::chord::{ChordMapper, KEY_COUNT, event_id_for_mask};

const NONE: [bool; KEY_COUNT] = [false; KEY_COUNT];

fn levels(mask: u8) -> [bool; KEY_COUNT] {
    let mut sample = NONE;
    for (i, level) in sample.iter_mut().enumerate() {
        *level = mask & (1 << i) != 0;
    }
    sample
}

/// Feed `sample` every millisecond over `[from, to]`, collecting events.
fn hold(mapper: &mut ChordMapper, sample: [bool; KEY_COUNT], from: u32, to: u32) -> Vec<u8> {
    (from..=to)
        .filter_map(|now| mapper.update(sample, now))
        .collect()
}

#[test]
fn every_chord_maps_to_its_event() {
    let table = [
        (0x1, 1),
        (0x2, 2),
        (0x4, 3),
        (0x8, 4),
        (0x3, 5),
        (0x5, 6),
        (0x6, 7),
        (0xF, 8),
        (0xC, 9),
        (0x9, 10),
    ];
    for (mask, event) in table {
        let mut mapper = ChordMapper::new(0);
        assert_eq!(mapper.update(levels(mask), 0), Some(event), "mask {mask:#x}");
        assert_eq!(event_id_for_mask(mask), Some(event));
    }
}

#[test]
fn unrecognized_masks_yield_nothing() {
    for mask in [0x0, 0x7, 0xA, 0xB, 0xD, 0xE] {
        let mut mapper = ChordMapper::new(0);
        assert_eq!(mapper.update(levels(mask), 0), None, "mask {mask:#x}");
    }
}

#[test]
fn stable_only_after_window() {
    let mut mapper = ChordMapper::new(30);
    assert!(hold(&mut mapper, levels(0x1), 1_000, 1_029).is_empty());
    assert_eq!(mapper.stable_mask(), 0);
    assert_eq!(mapper.update(levels(0x1), 1_030), Some(1));
    assert_eq!(mapper.stable_mask(), 0x1);
}

#[test]
fn bounce_restarts_the_window() {
    let mut mapper = ChordMapper::new(30);
    mapper.update(levels(0x2), 0);
    mapper.update(NONE, 10);
    mapper.update(levels(0x2), 20);
    assert_eq!(mapper.update(levels(0x2), 45), None);
    assert_eq!(mapper.update(levels(0x2), 50), Some(2));
}

#[test]
fn holding_never_refires() {
    let mut mapper = ChordMapper::new(5);
    let events = hold(&mut mapper, levels(0x3), 0, 500);
    assert_eq!(events, vec![5]);
}

#[test]
fn release_allows_refire() {
    let mut mapper = ChordMapper::new(5);
    let mut events = hold(&mut mapper, levels(0x4), 0, 20);
    events.extend(hold(&mut mapper, NONE, 21, 40));
    events.extend(hold(&mut mapper, levels(0x4), 41, 60));
    assert_eq!(events, vec![3, 3]);
}

#[test]
fn chord_rolls_through_single_key() {
    let mut mapper = ChordMapper::new(0);
    assert_eq!(mapper.update(levels(0x1), 0), Some(1));
    assert_eq!(mapper.update(levels(0x3), 1), Some(5));
    assert_eq!(mapper.update(levels(0x1), 2), Some(1));
}

#[test]
fn window_spans_counter_wrap() {
    let mut mapper = ChordMapper::new(30);
    let start = u32::MAX - 10;
    assert_eq!(mapper.update(levels(0x8), start), None);
    assert_eq!(mapper.update(levels(0x8), start.wrapping_add(29)), None);
    assert_eq!(mapper.update(levels(0x8), start.wrapping_add(30)), Some(4));
}

#[test]
fn reset_forgets_history() {
    let mut mapper = ChordMapper::new(0);
    assert_eq!(mapper.update(levels(0x1), 0), Some(1));
    mapper.reset();
    assert_eq!(mapper.debounce_ms(), 0);
    assert_eq!(mapper.stable_mask(), 0);
    assert_eq!(mapper.update(levels(0x1), 1), Some(1));
}

//! Cursor over the insertion-ordered artifact sequence.
//!
//! Previous/next is chronological, not parent/child.

use std::fmt;

/// Step direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Prev => f.write_str("prev"),
            Direction::Next => f.write_str("next"),
        }
    }
}

/// Selected position in the sequence, or nothing selected.
///
/// Holds an index only; it owns no artifacts. On the wire it is the
/// original signed form where `-1` means no selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor(Option<usize>);

impl Cursor {
    pub fn none() -> Self {
        Cursor(None)
    }

    pub fn at(index: usize) -> Self {
        Cursor(Some(index))
    }

    /// Last position of a sequence of `len` items.
    pub fn last(len: usize) -> Self {
        Cursor(len.checked_sub(1))
    }

    pub fn index(self) -> Option<usize> {
        self.0
    }

    /// Move one step, clamped to `[0, len - 1]`. Returns whether it moved.
    pub fn step(&mut self, direction: Direction, len: usize) -> bool {
        let next = match (direction, self.0) {
            (Direction::Prev, Some(i)) if i > 0 => Some(i - 1),
            (Direction::Next, Some(i)) if i + 1 < len => Some(i + 1),
            (Direction::Next, None) if len > 0 => Some(0),
            _ => return false,
        };
        self.0 = next;
        true
    }

    /// Select `index` if it is within a sequence of `len` items.
    pub fn select(&mut self, index: usize, len: usize) -> bool {
        if index < len {
            self.0 = Some(index);
            true
        } else {
            false
        }
    }

    /// `min(cursor, len - 1)`, used after removing one item.
    pub fn clamp_to(&mut self, len: usize) {
        if let Some(i) = self.0 {
            self.0 = len.checked_sub(1).map(|last| i.min(last));
        }
    }

    /// `max(-1, cursor - count)`, used after removing the oldest `count` items.
    pub fn shift_back(&mut self, count: usize) {
        self.0 = self.0.and_then(|i| i.checked_sub(count));
    }

    pub fn to_wire(self) -> i64 {
        self.0.map(|i| i as i64).unwrap_or(-1)
    }

    /// Read the signed form, clamping into a sequence of `len` items.
    pub fn from_wire(value: i64, len: usize) -> Self {
        if value < 0 || len == 0 {
            return Cursor(None);
        }
        Cursor(Some((value as usize).min(len - 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_is_clamped_at_boundaries() {
        let mut c = Cursor::at(0);
        assert!(!c.step(Direction::Prev, 3));
        assert!(c.step(Direction::Next, 3));
        assert!(c.step(Direction::Next, 3));
        assert!(!c.step(Direction::Next, 3));
        assert_eq!(c.index(), Some(2));
    }

    #[test]
    fn next_from_nothing_selects_first() {
        let mut c = Cursor::none();
        assert!(!c.step(Direction::Next, 0));
        assert!(!c.step(Direction::Prev, 2));
        assert!(c.step(Direction::Next, 2));
        assert_eq!(c.index(), Some(0));
    }

    #[test]
    fn clamp_after_single_removal() {
        let mut c = Cursor::at(4);
        c.clamp_to(4);
        assert_eq!(c.index(), Some(3));
        c.clamp_to(0);
        assert_eq!(c.index(), None);
    }

    #[test]
    fn shift_back_floors_at_none() {
        let mut c = Cursor::at(12);
        c.shift_back(10);
        assert_eq!(c.index(), Some(2));
        c.shift_back(10);
        assert_eq!(c.index(), None);
        assert_eq!(c.to_wire(), -1);
    }

    #[test]
    fn wire_form_is_clamped() {
        assert_eq!(Cursor::from_wire(-1, 3).index(), None);
        assert_eq!(Cursor::from_wire(7, 3).index(), Some(2));
        assert_eq!(Cursor::from_wire(1, 3).to_wire(), 1);
        assert_eq!(Cursor::last(0).index(), None);
    }
}

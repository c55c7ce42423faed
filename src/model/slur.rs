//! Ties, slurs, phrasing slurs and tuplets: elements that span or group
//! several notes without owning them.

use serde::{Deserialize, Serialize};

use super::color::Color;
use super::{ContextId, ElementId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlurKind {
    Tie,
    Slur,
    PhrasingSlur,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlurStyle {
    #[default]
    Solid,
    Dotted,
    Dashed,
}

impl SlurStyle {
    pub fn from_name(name: &str) -> Self {
        match name {
            "dotted" => SlurStyle::Dotted,
            "dashed" => SlurStyle::Dashed,
            _ => SlurStyle::Solid,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlurDirection {
    #[default]
    Preferred,
    Up,
    Down,
    Neutral,
}

impl SlurDirection {
    pub fn from_name(name: &str) -> Self {
        match name {
            "up" => SlurDirection::Up,
            "down" => SlurDirection::Down,
            "neutral" => SlurDirection::Neutral,
            _ => SlurDirection::Preferred,
        }
    }
}

/// A tie, slur or phrasing slur between two notes of a staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slur {
    pub kind: SlurKind,
    pub staff: ContextId,
    pub style: SlurStyle,
    pub direction: SlurDirection,
    pub note_start: ElementId,
    /// Unset until the closing note is known
    pub note_end: Option<ElementId>,
    pub time_start: i32,
    /// `end.time_start - start.time_start` once the end is known
    pub time_length: i32,
    pub color: Option<Color>,
}

impl Slur {
    pub const fn new(kind: SlurKind, staff: ContextId, note_start: ElementId, time_start: i32) -> Self {
        Self {
            kind,
            staff,
            style: SlurStyle::Solid,
            direction: SlurDirection::Preferred,
            note_start,
            note_end: None,
            time_start,
            time_length: 0,
            color: None,
        }
    }
}

/// A group of notes and rests played in a scaled time, e.g. a triplet
/// (`number` = 3 notes in the time of `actual_number` = 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuplet {
    pub number: i32,
    pub actual_number: i32,
    /// Members in document order; owned by their voices
    pub members: Vec<ElementId>,
    pub color: Option<Color>,
}

impl Tuplet {
    pub const fn new(number: i32, actual_number: i32) -> Self {
        Self {
            number,
            actual_number,
            members: Vec::new(),
            color: None,
        }
    }

    /// Scale consecutive nominal lengths by the tuplet ratio. Returns the
    /// (offset from the first start, length) of every position. Rounding
    /// is cumulative, so the lengths always add up to the scaled total.
    pub fn scale(&self, nominal: &[i32]) -> Vec<(i32, i32)> {
        if self.number <= 0 || self.actual_number <= 0 {
            let mut offset: i32 = 0;
            return nominal
                .iter()
                .map(|&len| {
                    let slot = (offset, len);
                    offset = offset.saturating_add(len);
                    slot
                })
                .collect();
        }

        let number = i64::from(self.number);
        let actual = i64::from(self.actual_number);
        let mut cumulative = 0i64;
        let mut previous_end = 0i64;
        nominal
            .iter()
            .map(|&len| {
                cumulative = cumulative.saturating_add(i64::from(len));
                let end = cumulative.saturating_mul(actual) / number;
                let length = end.saturating_sub(previous_end);
                let slot = (clamp_i32(previous_end), clamp_i32(length));
                previous_end = end;
                slot
            })
            .collect()
    }
}

fn clamp_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

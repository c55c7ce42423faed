//! Pitch, key and note-length values shared by notes, key signatures,
//! function marks and chord names.

use serde::{Deserialize, Serialize};

/// Number of time units in a quarter note.
pub const QUARTER_TIME_LENGTH: i32 = 256;

/// A diatonic pitch: an absolute diatonic step plus accidentals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiatonicPitch {
    /// Absolute diatonic step (0 = sub-contra C, 28 = middle C)
    pub note_name: i32,
    /// Accidentals: positive for sharps, negative for flats
    pub accs: i32,
}

impl DiatonicPitch {
    pub const fn new(note_name: i32, accs: i32) -> Self {
        Self { note_name, accs }
    }

    /// Parse a key root such as "C", "f#", "Bb" or "es" into a pitch in
    /// the middle octave. Unknown names fall back to C.
    pub fn from_key_name(name: &str) -> Self {
        let name = name.trim();
        let mut chars = name.chars();
        let step = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 1,
            Some('E') => 2,
            Some('F') => 3,
            Some('G') => 4,
            Some('A') => 5,
            Some('B') => 6,
            _ => 0,
        };
        let rest = chars.as_str();
        let accs = match rest {
            "#" | "is" => 1,
            "##" | "isis" => 2,
            "b" | "es" | "s" => -1,
            "bb" | "eses" => -2,
            _ => 0,
        };
        Self::new(28 + step, accs)
    }
}

/// Major or minor flavour of a diatonic key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Major,
    Minor,
}

impl Gender {
    pub fn from_name(name: &str) -> Self {
        match name {
            "minor" | "Minor" => Gender::Minor,
            _ => Gender::Major,
        }
    }
}

/// A key: root pitch plus gender. Defaults to C major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiatonicKey {
    pub pitch: DiatonicPitch,
    pub gender: Gender,
}

impl DiatonicKey {
    pub const fn new(pitch: DiatonicPitch, gender: Gender) -> Self {
        Self { pitch, gender }
    }

    /// Key used by 0.5-series function marks, which stored the key as a
    /// bare name ("C", "a", "f#"). Lower case means minor.
    pub fn from_legacy_name(name: &str) -> Self {
        let name = if name.trim().is_empty() { "C" } else { name.trim() };
        let gender = if name.starts_with(|c: char| c.is_ascii_lowercase()) {
            Gender::Minor
        } else {
            Gender::Major
        };
        Self::new(DiatonicPitch::from_key_name(name), gender)
    }
}

impl Default for DiatonicKey {
    fn default() -> Self {
        Self::new(DiatonicPitch::new(28, 0), Gender::Major)
    }
}

/// Written note value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MusicLength {
    #[default]
    Undefined,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
    HundredTwentyEighth,
}

impl MusicLength {
    pub fn from_name(name: &str) -> Self {
        match name {
            "breve" => MusicLength::Breve,
            "whole" => MusicLength::Whole,
            "half" => MusicLength::Half,
            "quarter" => MusicLength::Quarter,
            "eighth" => MusicLength::Eighth,
            "sixteenth" => MusicLength::Sixteenth,
            "thirty-second" => MusicLength::ThirtySecond,
            "sixty-fourth" => MusicLength::SixtyFourth,
            "hundred-twenty-eighth" => MusicLength::HundredTwentyEighth,
            _ => MusicLength::Undefined,
        }
    }

    /// Undotted length in time units.
    pub const fn time_length(self) -> i32 {
        match self {
            MusicLength::Undefined => 0,
            MusicLength::Breve => QUARTER_TIME_LENGTH * 8,
            MusicLength::Whole => QUARTER_TIME_LENGTH * 4,
            MusicLength::Half => QUARTER_TIME_LENGTH * 2,
            MusicLength::Quarter => QUARTER_TIME_LENGTH,
            MusicLength::Eighth => QUARTER_TIME_LENGTH / 2,
            MusicLength::Sixteenth => QUARTER_TIME_LENGTH / 4,
            MusicLength::ThirtySecond => QUARTER_TIME_LENGTH / 8,
            MusicLength::SixtyFourth => QUARTER_TIME_LENGTH / 16,
            MusicLength::HundredTwentyEighth => QUARTER_TIME_LENGTH / 32,
        }
    }
}

/// Written length of a playable element: note value plus dots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayableLength {
    pub music_length: MusicLength,
    pub dotted: u8,
}

impl PlayableLength {
    pub const fn new(music_length: MusicLength, dotted: u8) -> Self {
        Self { music_length, dotted }
    }

    /// Build from the attribute pair used throughout the format
    /// (`music-length`/`playable-length` name and a dot count).
    pub fn from_attributes(length: &str, dotted: &str) -> Self {
        let dotted = dotted.trim().parse::<u8>().unwrap_or(0);
        Self::new(MusicLength::from_name(length), dotted)
    }

    /// Nominal length in time units. Every dot adds half of the value
    /// added before it.
    pub fn time_length(&self) -> i32 {
        let mut increment = self.music_length.time_length();
        let mut total = increment;
        for _ in 0..self.dotted {
            increment /= 2;
            total += increment;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_lengths() {
        assert_eq!(PlayableLength::new(MusicLength::Quarter, 0).time_length(), 256);
        assert_eq!(PlayableLength::new(MusicLength::Quarter, 1).time_length(), 384);
        assert_eq!(PlayableLength::new(MusicLength::Half, 2).time_length(), 896);
        assert_eq!(PlayableLength::default().time_length(), 0);
    }

    #[test]
    fn length_from_attributes_is_lenient() {
        let pl = PlayableLength::from_attributes("eighth", "");
        assert_eq!(pl, PlayableLength::new(MusicLength::Eighth, 0));
        let pl = PlayableLength::from_attributes("bogus", "x");
        assert_eq!(pl, PlayableLength::default());
    }

    #[test]
    fn legacy_key_names() {
        let key = DiatonicKey::from_legacy_name("a");
        assert_eq!(key.gender, Gender::Minor);
        assert_eq!(key.pitch, DiatonicPitch::new(33, 0));

        let key = DiatonicKey::from_legacy_name("");
        assert_eq!(key, DiatonicKey::default());

        let key = DiatonicKey::from_legacy_name("Bb");
        assert_eq!(key.pitch, DiatonicPitch::new(34, -1));
    }
}

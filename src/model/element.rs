//! Music elements: signs, playable notes and rests, and the content of
//! the non-staff contexts.

use serde::{Deserialize, Serialize};

use super::color::Color;
use super::mark::Mark;
use super::pitch::{DiatonicKey, DiatonicPitch, PlayableLength};
use super::{ContextId, SlurId, TupletId, VoiceId};

/// One time-positioned element of the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicElement {
    /// Start time in time units (a quarter note is 256)
    pub time_start: i32,
    /// Duration in time units; zero for signs
    pub time_length: i32,
    /// Foreground colour; `None` inherits the default
    pub color: Option<Color>,
    /// Marks owned by this element
    pub marks: Vec<Mark>,
    pub kind: ElementKind,
}

impl MusicElement {
    pub const fn new(kind: ElementKind, time_start: i32, time_length: i32) -> Self {
        Self {
            time_start,
            time_length,
            color: None,
            marks: Vec::new(),
            kind,
        }
    }

    pub const fn element_type(&self) -> ElementType {
        match &self.kind {
            ElementKind::Clef(_) => ElementType::Clef,
            ElementKind::KeySignature(_) => ElementType::KeySignature,
            ElementKind::TimeSignature(_) => ElementType::TimeSignature,
            ElementKind::Barline(_) => ElementType::Barline,
            ElementKind::Note(_) => ElementType::Note,
            ElementKind::Rest(_) => ElementType::Rest,
            ElementKind::Syllable(_) => ElementType::Syllable,
            ElementKind::FiguredBassMark(_) => ElementType::FiguredBassMark,
            ElementKind::FunctionMark(_) => ElementType::FunctionMark,
            ElementKind::ChordName(_) => ElementType::ChordName,
        }
    }

    /// Notes and rests.
    pub const fn is_playable(&self) -> bool {
        matches!(self.kind, ElementKind::Note(_) | ElementKind::Rest(_))
    }

    /// The sign kind, for clefs, key/time signatures and barlines.
    pub const fn sign_kind(&self) -> Option<SignKind> {
        match self.kind {
            ElementKind::Clef(_) => Some(SignKind::Clef),
            ElementKind::KeySignature(_) => Some(SignKind::KeySignature),
            ElementKind::TimeSignature(_) => Some(SignKind::TimeSignature),
            ElementKind::Barline(_) => Some(SignKind::Barline),
            _ => None,
        }
    }

    /// Whether `other` is the same sign placed at the same time: same
    /// kind, start time and attributes. Colour and marks are ignored.
    pub fn same_sign_as(&self, other: &MusicElement) -> bool {
        if self.time_start != other.time_start {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ElementKind::Clef(a), ElementKind::Clef(b)) => a == b,
            (ElementKind::KeySignature(a), ElementKind::KeySignature(b)) => a == b,
            (ElementKind::TimeSignature(a), ElementKind::TimeSignature(b)) => a == b,
            (ElementKind::Barline(a), ElementKind::Barline(b)) => a == b,
            _ => false,
        }
    }

    pub const fn as_note(&self) -> Option<&Note> {
        match &self.kind {
            ElementKind::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn as_note_mut(&mut self) -> Option<&mut Note> {
        match &mut self.kind {
            ElementKind::Note(note) => Some(note),
            _ => None,
        }
    }

    pub const fn as_rest(&self) -> Option<&Rest> {
        match &self.kind {
            ElementKind::Rest(rest) => Some(rest),
            _ => None,
        }
    }

    pub const fn as_syllable(&self) -> Option<&Syllable> {
        match &self.kind {
            ElementKind::Syllable(syllable) => Some(syllable),
            _ => None,
        }
    }

    /// Written length of a note or rest.
    pub const fn playable_length(&self) -> Option<PlayableLength> {
        match &self.kind {
            ElementKind::Note(note) => Some(note.playable_length),
            ElementKind::Rest(rest) => Some(rest.playable_length),
            _ => None,
        }
    }

    /// The tuplet a note or rest belongs to.
    pub const fn tuplet(&self) -> Option<TupletId> {
        match &self.kind {
            ElementKind::Note(note) => note.tuplet,
            ElementKind::Rest(rest) => rest.tuplet,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    Clef(Clef),
    KeySignature(KeySignature),
    TimeSignature(TimeSignature),
    Barline(Barline),
    Note(Note),
    Rest(Rest),
    Syllable(Syllable),
    FiguredBassMark(FiguredBassMark),
    FunctionMark(FunctionMark),
    ChordName(ChordName),
}

/// Plain discriminator of [`ElementKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Clef,
    KeySignature,
    TimeSignature,
    Barline,
    Note,
    Rest,
    Syllable,
    FiguredBassMark,
    FunctionMark,
    ChordName,
}

/// Elements shared by every voice of a staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignKind {
    Clef,
    KeySignature,
    TimeSignature,
    Barline,
}

// ─── Signs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clef {
    pub staff: ContextId,
    pub clef_type: ClefType,
    /// Staff position of middle C
    pub c1: i32,
    /// Octave transposition in diatonic steps
    pub offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClefType {
    Undefined,
    G,
    F,
    C,
    PercussionHigh,
    PercussionLow,
    Tab,
}

impl ClefType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "G" | "treble" => ClefType::G,
            "F" | "bass" => ClefType::F,
            "C" | "alto" | "tenor" => ClefType::C,
            "percussion-high" => ClefType::PercussionHigh,
            "percussion-low" => ClefType::PercussionLow,
            "tab" => ClefType::Tab,
            _ => ClefType::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    pub staff: ContextId,
    pub kind: KeySignatureKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySignatureKind {
    MajorMinor(DiatonicKey),
    Modus(Modus),
    Custom,
}

/// Discriminator of the `key-signature-type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySignatureType {
    MajorMinor,
    Modus,
    Custom,
}

impl KeySignatureType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "modus" => KeySignatureType::Modus,
            "custom" => KeySignatureType::Custom,
            _ => KeySignatureType::MajorMinor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modus {
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

impl Modus {
    pub fn from_name(name: &str) -> Self {
        match name {
            "dorian" => Modus::Dorian,
            "phrygian" => Modus::Phrygian,
            "lydian" => Modus::Lydian,
            "mixolydian" => Modus::Mixolydian,
            "aeolian" => Modus::Aeolian,
            "locrian" => Modus::Locrian,
            _ => Modus::Ionian,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub staff: ContextId,
    pub beats: i32,
    pub beat: i32,
    pub time_signature_type: TimeSignatureType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSignatureType {
    Classical,
    Number,
    Mensural,
    Neomensural,
    Baroque,
}

impl TimeSignatureType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "number" => TimeSignatureType::Number,
            "mensural" => TimeSignatureType::Mensural,
            "neomensural" => TimeSignatureType::Neomensural,
            "baroque" => TimeSignatureType::Baroque,
            _ => TimeSignatureType::Classical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barline {
    pub staff: ContextId,
    pub barline_type: BarlineType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarlineType {
    Undefined,
    Single,
    Double,
    End,
    RepeatOpen,
    RepeatClose,
    RepeatCloseOpen,
    Dotted,
}

impl BarlineType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "single" => BarlineType::Single,
            "double" => BarlineType::Double,
            "end" => BarlineType::End,
            "repeat-open" => BarlineType::RepeatOpen,
            "repeat-close" => BarlineType::RepeatClose,
            "repeat-close-open" => BarlineType::RepeatCloseOpen,
            "dotted" => BarlineType::Dotted,
            _ => BarlineType::Undefined,
        }
    }
}

// ─── Playables ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StemDirection {
    #[default]
    Neutral,
    Up,
    Down,
    Preferred,
}

impl StemDirection {
    pub fn from_name(name: &str) -> Self {
        match name {
            "up" => StemDirection::Up,
            "down" => StemDirection::Down,
            "preferred" => StemDirection::Preferred,
            _ => StemDirection::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub voice: VoiceId,
    pub pitch: DiatonicPitch,
    pub playable_length: PlayableLength,
    pub stem_direction: StemDirection,
    pub tuplet: Option<TupletId>,
    pub tie_start: Option<SlurId>,
    pub tie_end: Option<SlurId>,
    pub slur_start: Option<SlurId>,
    pub slur_end: Option<SlurId>,
    pub phrasing_slur_start: Option<SlurId>,
    pub phrasing_slur_end: Option<SlurId>,
}

impl Note {
    pub const fn new(voice: VoiceId, pitch: DiatonicPitch, playable_length: PlayableLength) -> Self {
        Self {
            voice,
            pitch,
            playable_length,
            stem_direction: StemDirection::Neutral,
            tuplet: None,
            tie_start: None,
            tie_end: None,
            slur_start: None,
            slur_end: None,
            phrasing_slur_start: None,
            phrasing_slur_end: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestType {
    Normal,
    Hidden,
}

impl RestType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "hidden" => RestType::Hidden,
            _ => RestType::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rest {
    pub voice: VoiceId,
    pub rest_type: RestType,
    pub playable_length: PlayableLength,
    pub tuplet: Option<TupletId>,
}

// ─── Context content ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Syllable {
    pub context: ContextId,
    pub text: String,
    pub hyphen: bool,
    pub melisma: bool,
    /// Voice the syllable is sung in, when it differs from the context's
    pub associated_voice: Option<VoiceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiguredBassNumber {
    pub number: i32,
    pub accs: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiguredBassMark {
    pub context: ContextId,
    pub numbers: Vec<FiguredBassNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionType {
    Undefined,
    I,
    II,
    III,
    IV,
    V,
    VI,
    VII,
    T,
    S,
    D,
    F,
    N,
    L,
    K,
}

impl FunctionType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "I" => FunctionType::I,
            "II" => FunctionType::II,
            "III" => FunctionType::III,
            "IV" => FunctionType::IV,
            "V" => FunctionType::V,
            "VI" => FunctionType::VI,
            "VII" => FunctionType::VII,
            "T" => FunctionType::T,
            "S" => FunctionType::S,
            "D" => FunctionType::D,
            "F" => FunctionType::F,
            "N" => FunctionType::N,
            "L" => FunctionType::L,
            "K" => FunctionType::K,
            _ => FunctionType::Undefined,
        }
    }

    /// Degrees written with roman numerals rather than function letters.
    pub const fn is_side_degree(self) -> bool {
        matches!(
            self,
            FunctionType::I
                | FunctionType::II
                | FunctionType::III
                | FunctionType::IV
                | FunctionType::V
                | FunctionType::VI
                | FunctionType::VII
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMark {
    pub context: ContextId,
    pub function: FunctionType,
    pub minor: bool,
    pub key: DiatonicKey,
    pub chord_area: FunctionType,
    pub chord_area_minor: bool,
    pub tonic_degree: FunctionType,
    pub tonic_degree_minor: bool,
    pub ellipse: bool,
}

impl FunctionMark {
    pub const fn is_side_degree(&self) -> bool {
        self.function.is_side_degree()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordName {
    pub context: ContextId,
    pub pitch: DiatonicPitch,
    pub quality_modifier: String,
}

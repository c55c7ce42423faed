//! Marks: dynamics, articulations, tempo indications and other symbols
//! attached to a single music element.

use serde::{Deserialize, Serialize};

use super::color::Color;
use super::pitch::PlayableLength;

/// A mark attached to (and owned by) one music element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub color: Option<Color>,
    pub kind: MarkKind,
}

impl Mark {
    pub const fn new(kind: MarkKind) -> Self {
        Self { color: None, kind }
    }

    pub const fn mark_type(&self) -> MarkType {
        self.kind.mark_type()
    }
}

/// Discriminator used by the `mark-type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkType {
    Undefined,
    Text,
    Tempo,
    Ritardando,
    Dynamic,
    Crescendo,
    Pedal,
    InstrumentChange,
    BookMark,
    RehearsalMark,
    Fermata,
    RepeatMark,
    Articulation,
    Fingering,
}

impl MarkType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Text" => MarkType::Text,
            "Tempo" => MarkType::Tempo,
            "Ritardando" => MarkType::Ritardando,
            "Dynamic" => MarkType::Dynamic,
            "Crescendo" => MarkType::Crescendo,
            "Pedal" => MarkType::Pedal,
            "InstrumentChange" => MarkType::InstrumentChange,
            "BookMark" => MarkType::BookMark,
            // the format has always spelled it this way
            "RehersalMark" | "RehearsalMark" => MarkType::RehearsalMark,
            "Fermata" => MarkType::Fermata,
            "RepeatMark" => MarkType::RepeatMark,
            "Articulation" => MarkType::Articulation,
            "Fingering" => MarkType::Fingering,
            _ => MarkType::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkKind {
    Text {
        text: String,
    },
    Tempo {
        beat: PlayableLength,
        bpm: u8,
    },
    Ritardando {
        final_tempo: i32,
        time_length: i32,
        ritardando_type: RitardandoType,
    },
    Dynamic {
        text: String,
        volume: i32,
    },
    Crescendo {
        final_volume: i32,
        crescendo_type: CrescendoType,
        time_start: i32,
        time_length: i32,
    },
    Pedal {
        time_start: i32,
        time_length: i32,
    },
    InstrumentChange {
        instrument: i32,
    },
    BookMark {
        text: String,
    },
    RehearsalMark,
    Fermata {
        fermata_type: FermataType,
    },
    RepeatMark {
        repeat_mark_type: RepeatMarkType,
        volta_number: i32,
    },
    Articulation {
        articulation_type: ArticulationType,
    },
    Fingering {
        fingers: Vec<FingerNumber>,
        original: bool,
    },
}

impl MarkKind {
    pub const fn mark_type(&self) -> MarkType {
        match self {
            MarkKind::Text { .. } => MarkType::Text,
            MarkKind::Tempo { .. } => MarkType::Tempo,
            MarkKind::Ritardando { .. } => MarkType::Ritardando,
            MarkKind::Dynamic { .. } => MarkType::Dynamic,
            MarkKind::Crescendo { .. } => MarkType::Crescendo,
            MarkKind::Pedal { .. } => MarkType::Pedal,
            MarkKind::InstrumentChange { .. } => MarkType::InstrumentChange,
            MarkKind::BookMark { .. } => MarkType::BookMark,
            MarkKind::RehearsalMark => MarkType::RehearsalMark,
            MarkKind::Fermata { .. } => MarkType::Fermata,
            MarkKind::RepeatMark { .. } => MarkType::RepeatMark,
            MarkKind::Articulation { .. } => MarkType::Articulation,
            MarkKind::Fingering { .. } => MarkType::Fingering,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RitardandoType {
    Ritardando,
    Accellerando,
}

impl RitardandoType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "accellerando" | "accelerando" => RitardandoType::Accellerando,
            _ => RitardandoType::Ritardando,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrescendoType {
    Crescendo,
    Decrescendo,
}

impl CrescendoType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "decrescendo" => CrescendoType::Decrescendo,
            _ => CrescendoType::Crescendo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FermataType {
    Normal,
    Short,
    Long,
    VeryLong,
}

impl FermataType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "short" => FermataType::Short,
            "long" => FermataType::Long,
            "verylong" | "very-long" => FermataType::VeryLong,
            _ => FermataType::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatMarkType {
    Undefined,
    Volta,
    Segno,
    Coda,
    VarCoda,
    DalSegno,
    DalCoda,
    DalVarCoda,
}

impl RepeatMarkType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "volta" => RepeatMarkType::Volta,
            "segno" => RepeatMarkType::Segno,
            "coda" => RepeatMarkType::Coda,
            "varcoda" => RepeatMarkType::VarCoda,
            "dalsegno" => RepeatMarkType::DalSegno,
            "dalcoda" => RepeatMarkType::DalCoda,
            "dalvarcoda" => RepeatMarkType::DalVarCoda,
            _ => RepeatMarkType::Undefined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArticulationType {
    Undefined,
    Accent,
    Marcato,
    Staccatissimo,
    Espressivo,
    Staccato,
    Tenuto,
    Portato,
    UpBow,
    DownBow,
    Flageolet,
    Open,
    Stopped,
    Turn,
    ReverseTurn,
    Trill,
    Prall,
    Mordent,
}

impl ArticulationType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "accent" => ArticulationType::Accent,
            "marcato" => ArticulationType::Marcato,
            "staccatissimo" => ArticulationType::Staccatissimo,
            "espressivo" => ArticulationType::Espressivo,
            "staccato" => ArticulationType::Staccato,
            "tenuto" => ArticulationType::Tenuto,
            "portato" => ArticulationType::Portato,
            "upbow" => ArticulationType::UpBow,
            "downbow" => ArticulationType::DownBow,
            "flageolet" => ArticulationType::Flageolet,
            "open" => ArticulationType::Open,
            "stopped" => ArticulationType::Stopped,
            "turn" => ArticulationType::Turn,
            "reverseturn" => ArticulationType::ReverseTurn,
            "trill" => ArticulationType::Trill,
            "prall" => ArticulationType::Prall,
            "mordent" => ArticulationType::Mordent,
            _ => ArticulationType::Undefined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FingerNumber {
    Undefined,
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Thumb,
    LHeel,
    RHeel,
    LToe,
    RToe,
}

impl FingerNumber {
    pub fn from_name(name: &str) -> Self {
        match name {
            "1" | "First" => FingerNumber::First,
            "2" | "Second" => FingerNumber::Second,
            "3" | "Third" => FingerNumber::Third,
            "4" | "Fourth" => FingerNumber::Fourth,
            "5" | "Fifth" => FingerNumber::Fifth,
            "Thumb" => FingerNumber::Thumb,
            "LHeel" => FingerNumber::LHeel,
            "RHeel" => FingerNumber::RHeel,
            "LToe" => FingerNumber::LToe,
            "RToe" => FingerNumber::RToe,
            _ => FingerNumber::Undefined,
        }
    }
}

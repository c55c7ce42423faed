//! Data model for an imported score document.
//!
//! The document is an arena: it owns flat vectors of sheets, contexts,
//! voices, music elements, slurs, tuplets and resources, and every link
//! between them is a typed index into those vectors. A sign shared by
//! several voices is one element referenced from several voices'
//! element lists; a tuplet's members and a slur's endpoints are plain
//! element ids owned elsewhere.

pub mod color;
pub mod element;
pub mod mark;
pub mod pitch;
pub mod resource;
pub mod slur;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use color::*;
pub use element::*;
pub use mark::*;
pub use pitch::*;
pub use resource::*;
pub use slur::*;

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            pub struct $name(pub usize);

            impl $name {
                pub const fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

arena_id!(
    /// Index of a sheet in [`Document::sheets`].
    SheetId,
    /// Index of a context in [`Document::contexts`].
    ContextId,
    /// Index of a voice in [`Document::voices`].
    VoiceId,
    /// Index of a music element in [`Document::elements`].
    ElementId,
    /// Index of a tie or slur in [`Document::slurs`].
    SlurId,
    /// Index of a tuplet in [`Document::tuplets`].
    TupletId,
    /// Index of a resource in [`Document::resources`].
    ResourceId,
);

/// A complete score document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub subtitle: String,
    pub composer: String,
    pub arranger: String,
    pub poet: String,
    pub text_translator: String,
    pub copyright: String,
    pub dedication: String,
    pub comments: String,
    /// ISO 8601 creation date, as written in the file
    pub date_created: Option<String>,
    /// ISO 8601 modification date, as written in the file
    pub date_last_modified: Option<String>,
    /// Total editing time in seconds
    pub time_edited: u32,
    /// File the document was imported from
    pub file_name: Option<PathBuf>,

    /// Sheets in document order
    pub sheets: Vec<Sheet>,
    pub contexts: Vec<Context>,
    pub voices: Vec<Voice>,
    pub elements: Vec<MusicElement>,
    pub slurs: Vec<Slur>,
    pub tuplets: Vec<Tuplet>,
    pub resources: Vec<Resource>,
}

/// A sheet: an ordered set of contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub contexts: Vec<ContextId>,
}

/// A named lane of a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub name: String,
    pub sheet: SheetId,
    pub kind: ContextKind,
}

impl Context {
    pub const fn context_type(&self) -> ContextType {
        match self.kind {
            ContextKind::Staff(_) => ContextType::Staff,
            ContextKind::Lyrics(_) => ContextType::LyricsContext,
            ContextKind::FiguredBass(_) => ContextType::FiguredBassContext,
            ContextKind::FunctionMark(_) => ContextType::FunctionMarkContext,
            ContextKind::ChordName(_) => ContextType::ChordNameContext,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextKind {
    Staff(Staff),
    Lyrics(LyricsContext),
    FiguredBass(FiguredBassContext),
    FunctionMark(FunctionMarkContext),
    ChordName(ChordNameContext),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextType {
    Staff,
    LyricsContext,
    FiguredBassContext,
    FunctionMarkContext,
    ChordNameContext,
}

impl ContextType {
    /// Prefix used when a context is imported without a name.
    pub const fn default_name_prefix(self) -> &'static str {
        match self {
            ContextType::Staff => "Staff",
            ContextType::LyricsContext => "LyricsContext",
            ContextType::FiguredBassContext => "FiguredBassContext",
            ContextType::FunctionMarkContext => "FunctionMarkContext",
            ContextType::ChordNameContext => "ChordNameContext",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub number_of_lines: i32,
    pub voices: Vec<VoiceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsContext {
    pub stanza_number: i32,
    /// Voice the lyrics follow; resolved once the sheet is complete
    pub associated_voice: Option<VoiceId>,
    pub syllables: Vec<ElementId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiguredBassContext {
    pub marks: Vec<ElementId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMarkContext {
    pub marks: Vec<ElementId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordNameContext {
    pub chord_names: Vec<ElementId>,
}

/// A voice of a staff. Its element list is ordered by start time and may
/// reference signs owned together with other voices of the same staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub staff: ContextId,
    pub stem_direction: StemDirection,
    pub midi_channel: u8,
    pub midi_program: u8,
    pub midi_pitch_offset: i8,
    pub elements: Vec<ElementId>,
}

impl Voice {
    pub fn new(name: impl Into<String>, staff: ContextId) -> Self {
        Self {
            name: name.into(),
            staff,
            stem_direction: StemDirection::Neutral,
            midi_channel: 0,
            midi_program: 0,
            midi_pitch_offset: 0,
            elements: Vec::new(),
        }
    }
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Construction ────────────────────────────────────────────────

    pub fn add_sheet(&mut self, name: impl Into<String>) -> SheetId {
        let id = SheetId(self.sheets.len());
        self.sheets.push(Sheet {
            name: name.into(),
            contexts: Vec::new(),
        });
        id
    }

    pub fn add_context(&mut self, sheet: SheetId, name: impl Into<String>, kind: ContextKind) -> ContextId {
        let id = ContextId(self.contexts.len());
        self.contexts.push(Context {
            name: name.into(),
            sheet,
            kind,
        });
        self.sheets[sheet.0].contexts.push(id);
        id
    }

    /// Add a voice to a staff. Returns `None` if `voice.staff` is not a staff.
    pub fn add_voice(&mut self, voice: Voice) -> Option<VoiceId> {
        let id = VoiceId(self.voices.len());
        match &mut self.contexts.get_mut(voice.staff.0)?.kind {
            ContextKind::Staff(staff) => staff.voices.push(id),
            _ => return None,
        }
        self.voices.push(voice);
        Some(id)
    }

    /// Store an element in the arena without linking it anywhere.
    pub fn alloc_element(&mut self, element: MusicElement) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(element);
        id
    }

    /// Drop the most recently allocated element. Only the last element
    /// can be discarded, and only while nothing links to it.
    pub fn discard_element(&mut self, id: ElementId) -> Option<MusicElement> {
        if id.0 + 1 != self.elements.len() {
            return None;
        }
        self.elements.pop()
    }

    /// Link an element into a voice. A chord member is placed directly
    /// after the voice's current last element; anything else is placed
    /// after every element starting at or before it.
    pub fn append(&mut self, voice: VoiceId, element: ElementId, add_to_chord: bool) {
        let elements = &self.voices[voice.0].elements;
        let position = if add_to_chord {
            elements.len()
        } else {
            let time = self.elements[element.0].time_start;
            elements
                .iter()
                .rposition(|id| self.elements[id.0].time_start <= time)
                .map_or(0, |p| p + 1)
        };
        self.voices[voice.0].elements.insert(position, element);
    }

    /// Link a sign into a voice, before any playable starting at the same time.
    pub fn insert_sign(&mut self, voice: VoiceId, sign: ElementId) {
        let time = self.elements[sign.0].time_start;
        let elements = &self.voices[voice.0].elements;
        let position = elements
            .iter()
            .position(|id| {
                let e = &self.elements[id.0];
                e.time_start > time || (e.time_start == time && e.sign_kind().is_none())
            })
            .unwrap_or(elements.len());
        self.voices[voice.0].elements.insert(position, sign);
    }

    /// Attach a mark to an element. Returns the mark's index.
    pub fn add_mark(&mut self, element: ElementId, mark: Mark) -> usize {
        let marks = &mut self.elements[element.0].marks;
        marks.push(mark);
        marks.len() - 1
    }

    pub fn add_syllable(&mut self, context: ContextId, syllable: ElementId) -> bool {
        match self.contexts.get_mut(context.0).map(|c| &mut c.kind) {
            Some(ContextKind::Lyrics(lc)) => {
                lc.syllables.push(syllable);
                true
            }
            _ => false,
        }
    }

    pub fn add_figured_bass_mark(&mut self, context: ContextId, mark: ElementId) -> bool {
        match self.contexts.get_mut(context.0).map(|c| &mut c.kind) {
            Some(ContextKind::FiguredBass(fbc)) => {
                fbc.marks.push(mark);
                true
            }
            _ => false,
        }
    }

    pub fn add_function_mark(&mut self, context: ContextId, mark: ElementId) -> bool {
        match self.contexts.get_mut(context.0).map(|c| &mut c.kind) {
            Some(ContextKind::FunctionMark(fmc)) => {
                fmc.marks.push(mark);
                true
            }
            _ => false,
        }
    }

    pub fn add_chord_name(&mut self, context: ContextId, chord_name: ElementId) -> bool {
        match self.contexts.get_mut(context.0).map(|c| &mut c.kind) {
            Some(ContextKind::ChordName(cnc)) => {
                cnc.chord_names.push(chord_name);
                true
            }
            _ => false,
        }
    }

    pub fn add_slur(&mut self, slur: Slur) -> SlurId {
        let id = SlurId(self.slurs.len());
        self.slurs.push(slur);
        id
    }

    pub fn add_tuplet(&mut self, tuplet: Tuplet) -> TupletId {
        let id = TupletId(self.tuplets.len());
        self.tuplets.push(tuplet);
        id
    }

    pub fn add_resource(&mut self, resource: Resource) -> ResourceId {
        let id = ResourceId(self.resources.len());
        self.resources.push(resource);
        id
    }

    // ─── Access ──────────────────────────────────────────────────────

    pub fn sheet(&self, id: SheetId) -> &Sheet {
        &self.sheets[id.0]
    }

    pub fn context(&self, id: ContextId) -> &Context {
        &self.contexts[id.0]
    }

    pub fn voice(&self, id: VoiceId) -> &Voice {
        &self.voices[id.0]
    }

    pub fn element(&self, id: ElementId) -> &MusicElement {
        &self.elements[id.0]
    }

    pub fn element_mut(&mut self, id: ElementId) -> &mut MusicElement {
        &mut self.elements[id.0]
    }

    pub fn slur(&self, id: SlurId) -> &Slur {
        &self.slurs[id.0]
    }

    pub fn tuplet(&self, id: TupletId) -> &Tuplet {
        &self.tuplets[id.0]
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    pub fn staff(&self, id: ContextId) -> Option<&Staff> {
        match &self.contexts.get(id.0)?.kind {
            ContextKind::Staff(staff) => Some(staff),
            _ => None,
        }
    }

    pub fn lyrics_context(&self, id: ContextId) -> Option<&LyricsContext> {
        match &self.contexts.get(id.0)?.kind {
            ContextKind::Lyrics(lc) => Some(lc),
            _ => None,
        }
    }

    /// Get the first sheet with the given name.
    pub fn sheet_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets.iter().position(|s| s.name == name).map(SheetId)
    }

    /// Staves of a sheet in declaration order.
    pub fn staves(&self, sheet: SheetId) -> Vec<ContextId> {
        self.sheets[sheet.0]
            .contexts
            .iter()
            .copied()
            .filter(|&c| self.staff(c).is_some())
            .collect()
    }

    /// All voices of a sheet, staff by staff, in declaration order.
    pub fn sheet_voices(&self, sheet: SheetId) -> Vec<VoiceId> {
        self.sheets[sheet.0]
            .contexts
            .iter()
            .filter_map(|&c| self.staff(c))
            .flat_map(|staff| staff.voices.iter().copied())
            .collect()
    }

    pub fn voice_contains(&self, voice: VoiceId, element: ElementId) -> bool {
        self.voices[voice.0].elements.contains(&element)
    }

    /// Distinct signs of `kind` starting at `time` in any voice of `staff`.
    pub fn signs_at(&self, staff: ContextId, kind: SignKind, time: i32) -> Vec<ElementId> {
        let mut found = Vec::new();
        let Some(staff) = self.staff(staff) else {
            return found;
        };
        for voice in &staff.voices {
            for &id in &self.voices[voice.0].elements {
                let e = &self.elements[id.0];
                if e.time_start == time && e.sign_kind() == Some(kind) && !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }

    /// The last note of a voice.
    pub fn last_note(&self, voice: VoiceId) -> Option<ElementId> {
        self.voices[voice.0]
            .elements
            .iter()
            .rev()
            .copied()
            .find(|&id| self.elements[id.0].as_note().is_some())
    }

    /// Notes of `voice` sharing the start time of `note`, in voice order.
    pub fn chord_at(&self, voice: VoiceId, note: ElementId) -> Vec<ElementId> {
        let time = self.elements[note.0].time_start;
        self.voices[voice.0]
            .elements
            .iter()
            .copied()
            .filter(|&id| {
                let e = &self.elements[id.0];
                e.time_start == time && e.as_note().is_some()
            })
            .collect()
    }

    // ─── Derived timing and linkage ──────────────────────────────────

    /// Recompute start and length of every tuplet member from the ratio.
    /// Members sharing a start time (chords) share the scaled slot.
    pub fn assign_tuplet_times(&mut self, tuplet: TupletId) {
        let members = self.tuplets[tuplet.0].members.clone();
        let Some(&first) = members.first() else {
            return;
        };
        let base_start = self.elements[first.0].time_start;

        let mut groups: Vec<(i32, Vec<ElementId>)> = Vec::new();
        for id in members {
            let e = &self.elements[id.0];
            match groups.last_mut() {
                Some((start, group)) if *start == e.time_start => group.push(id),
                _ => groups.push((e.time_start, vec![id])),
            }
        }

        let nominal: Vec<i32> = groups
            .iter()
            .map(|(_, group)| {
                let e = &self.elements[group[0].0];
                match e.playable_length().map(|pl| pl.time_length()) {
                    Some(len) if len > 0 => len,
                    _ => e.time_length,
                }
            })
            .collect();

        let slots = self.tuplets[tuplet.0].scale(&nominal);
        for ((_, group), (offset, length)) in groups.iter().zip(slots) {
            for id in group {
                let e = &mut self.elements[id.0];
                e.time_start = base_start.saturating_add(offset);
                e.time_length = length;
            }
        }
    }

    /// Close a dangling tie that ends on `note`: a note of the same pitch
    /// in the directly preceding time position of the voice whose tie has
    /// no end yet.
    pub fn update_ties(&mut self, note: ElementId) {
        let (voice, pitch, start) = match self.elements[note.0].as_note() {
            Some(n) => (n.voice, n.pitch, self.elements[note.0].time_start),
            None => return,
        };
        if self.elements[note.0].as_note().and_then(|n| n.tie_end).is_some() {
            return;
        }

        let mut previous_start = None;
        let mut open_tie = None;
        for &id in self.voices[voice.0].elements.iter().rev() {
            let e = &self.elements[id.0];
            if e.time_start >= start || !e.is_playable() {
                continue;
            }
            match previous_start {
                None => previous_start = Some(e.time_start),
                Some(t) if t != e.time_start => break,
                Some(_) => {}
            }
            if let Some(tie) = e.as_note().filter(|n| n.pitch == pitch).and_then(|n| n.tie_start) {
                if self.slurs[tie.0].note_end.is_none() {
                    open_tie = Some(tie);
                    break;
                }
            }
        }

        if let Some(tie) = open_tie {
            let slur = &mut self.slurs[tie.0];
            slur.note_end = Some(note);
            slur.time_length = start.saturating_sub(slur.time_start);
            if let Some(n) = self.elements[note.0].as_note_mut() {
                n.tie_end = Some(tie);
            }
        }
    }

    /// Make every voice of a staff see every shared sign: a voice with no
    /// sign of a kind at a time where another voice has one gets a
    /// reference to it. Voices that carry their own, different sign at
    /// that time are left alone. Idempotent.
    pub fn synchronize_voices(&mut self, staff: ContextId) {
        let voices = match self.staff(staff) {
            Some(s) => s.voices.clone(),
            None => return,
        };

        let mut signs: Vec<ElementId> = Vec::new();
        for voice in &voices {
            for &id in &self.voices[voice.0].elements {
                if self.elements[id.0].sign_kind().is_some() && !signs.contains(&id) {
                    signs.push(id);
                }
            }
        }

        for sign in signs {
            let (kind, time) = {
                let e = &self.elements[sign.0];
                (e.sign_kind(), e.time_start)
            };
            for &voice in &voices {
                let has_own = self.voices[voice.0].elements.iter().any(|id| {
                    let e = &self.elements[id.0];
                    e.time_start == time && e.sign_kind() == kind
                });
                if !has_own {
                    self.insert_sign(voice, sign);
                }
            }
        }
    }

    // ─── Statistics ──────────────────────────────────────────────────

    /// Get the total number of music elements in the document.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Get the total number of voices across all sheets.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }
}

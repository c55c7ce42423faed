//! Event-driven builder that turns the tokenizer's open / text / close
//! stream into a [`Document`].
//!
//! The builder keeps one cursor per kind of enclosing element (current
//! sheet, context, voice, note, ...) plus a few value buffers that nested
//! elements such as `diatonic-pitch` or `playable-length` fill in before
//! their parent closes. Shared signs go through a [`SignIndex`], and voice
//! references by index are collected in [`DeferredRefs`] until the sheet
//! closes.

pub mod collab;
pub mod deferred;
pub mod factory;
pub mod signs;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};
use crate::model::*;
use crate::tokenizer::{self, Attributes, ContentHandler};
use crate::version::VersionGate;

pub use collab::{DocumentResources, ResourceController, SharedSignRepair, VoiceRepair};
pub use deferred::{DeferredRefs, Resolution};
pub use signs::{Placement, SignIndex};

/// Per-import settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// File the markup was read from. Embedded resources are resolved
    /// relative to its directory.
    pub source_path: Option<PathBuf>,
    /// Run the voice repair pass on every staff once the document closes
    pub synchronize_voices: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            source_path: None,
            synchronize_voices: true,
        }
    }
}

/// Element names the builder understands.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    Version,
    Document,
    Sheet,
    Staff,
    LyricsContext,
    FiguredBassContext,
    FunctionMarkContext,
    ChordNameContext,
    Voice,
    Clef,
    TimeSignature,
    KeySignature,
    Barline,
    Note,
    Tie,
    SlurStart,
    SlurEnd,
    PhrasingSlurStart,
    PhrasingSlurEnd,
    Tuplet,
    Rest,
    Syllable,
    FiguredBassMark,
    FiguredBassNumber,
    FunctionMark,
    /// 0.5-series spelling of `function-mark`
    FunctionMarking,
    ChordName,
    Mark,
    PlayableLength,
    DiatonicPitch,
    DiatonicKey,
    Resource,
    Other(String),
}

impl Tag {
    fn from_name(name: &str) -> Self {
        match name {
            "canorus-version" => Tag::Version,
            "document" => Tag::Document,
            "sheet" => Tag::Sheet,
            "staff" => Tag::Staff,
            "lyrics-context" => Tag::LyricsContext,
            "figured-bass-context" => Tag::FiguredBassContext,
            "function-mark-context" | "function-marking-context" => Tag::FunctionMarkContext,
            "chord-name-context" => Tag::ChordNameContext,
            "voice" => Tag::Voice,
            "clef" => Tag::Clef,
            "time-signature" => Tag::TimeSignature,
            "key-signature" => Tag::KeySignature,
            "barline" => Tag::Barline,
            "note" => Tag::Note,
            "tie" => Tag::Tie,
            "slur-start" => Tag::SlurStart,
            "slur-end" => Tag::SlurEnd,
            "phrasing-slur-start" => Tag::PhrasingSlurStart,
            "phrasing-slur-end" => Tag::PhrasingSlurEnd,
            "tuplet" => Tag::Tuplet,
            "rest" => Tag::Rest,
            "syllable" => Tag::Syllable,
            "figured-bass-mark" => Tag::FiguredBassMark,
            "figured-bass-number" => Tag::FiguredBassNumber,
            "function-mark" => Tag::FunctionMark,
            "function-marking" => Tag::FunctionMarking,
            "chord-name" => Tag::ChordName,
            "mark" => Tag::Mark,
            "playable-length" => Tag::PlayableLength,
            "diatonic-pitch" => Tag::DiatonicPitch,
            "diatonic-key" => Tag::DiatonicKey,
            "resource" => Tag::Resource,
            other => Tag::Other(other.to_string()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Tag::Version => "canorus-version",
            Tag::Document => "document",
            Tag::Sheet => "sheet",
            Tag::Staff => "staff",
            Tag::LyricsContext => "lyrics-context",
            Tag::FiguredBassContext => "figured-bass-context",
            Tag::FunctionMarkContext => "function-mark-context",
            Tag::ChordNameContext => "chord-name-context",
            Tag::Voice => "voice",
            Tag::Clef => "clef",
            Tag::TimeSignature => "time-signature",
            Tag::KeySignature => "key-signature",
            Tag::Barline => "barline",
            Tag::Note => "note",
            Tag::Tie => "tie",
            Tag::SlurStart => "slur-start",
            Tag::SlurEnd => "slur-end",
            Tag::PhrasingSlurStart => "phrasing-slur-start",
            Tag::PhrasingSlurEnd => "phrasing-slur-end",
            Tag::Tuplet => "tuplet",
            Tag::Rest => "rest",
            Tag::Syllable => "syllable",
            Tag::FiguredBassMark => "figured-bass-mark",
            Tag::FiguredBassNumber => "figured-bass-number",
            Tag::FunctionMark => "function-mark",
            Tag::FunctionMarking => "function-marking",
            Tag::ChordName => "chord-name",
            Tag::Mark => "mark",
            Tag::PlayableLength => "playable-length",
            Tag::DiatonicPitch => "diatonic-pitch",
            Tag::DiatonicKey => "diatonic-key",
            Tag::Resource => "resource",
            Tag::Other(name) => name,
        }
    }
}

/// What a `mark` element attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Element(ElementId),
    Slur(SlurId),
}

#[derive(Debug, Default)]
struct Cursors {
    sheet: Option<SheetId>,
    context: Option<ContextId>,
    voice: Option<VoiceId>,
    sign: Option<ElementId>,
    note: Option<ElementId>,
    rest: Option<ElementId>,
    /// Element the next mark or nested value attaches to
    element: Option<Target>,
    /// Saved `element` while a tie or slur is open
    previous_element: Option<Target>,
    /// Element and index of the mark being read
    mark: Option<(ElementId, usize)>,
    slur: Option<SlurId>,
    phrasing_slur: Option<SlurId>,
    tuplet: Option<TupletId>,
}

#[derive(Debug, Default)]
struct Buffers {
    diatonic_pitch: DiatonicPitch,
    diatonic_key: DiatonicKey,
    playable_length: PlayableLength,
    tempo_playable_length: PlayableLength,
}

/// Builds a [`Document`] from score markup events.
pub struct ScoreBuilder {
    options: ImportOptions,
    resources: Box<dyn ResourceController>,
    repair: Box<dyn VoiceRepair>,
    document: Option<Document>,
    version: VersionGate,
    frames: Vec<Tag>,
    cursors: Cursors,
    buffers: Buffers,
    /// Colour of the element being opened, already filtered by version
    color: Option<Color>,
    text: String,
    signs: SignIndex,
    deferred: DeferredRefs,
}

impl Default for ScoreBuilder {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}

impl ScoreBuilder {
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            resources: Box::new(DocumentResources),
            repair: Box::new(SharedSignRepair),
            document: None,
            version: VersionGate::new(),
            frames: Vec::new(),
            cursors: Cursors::default(),
            buffers: Buffers::default(),
            color: None,
            text: String::new(),
            signs: SignIndex::new(),
            deferred: DeferredRefs::new(),
        }
    }

    /// Use a custom resource controller instead of storing resources in
    /// the document.
    #[must_use]
    pub fn with_resources(mut self, resources: impl ResourceController + 'static) -> Self {
        self.resources = Box::new(resources);
        self
    }

    /// Use a custom voice repair pass.
    #[must_use]
    pub fn with_voice_repair(mut self, repair: impl VoiceRepair + 'static) -> Self {
        self.repair = Box::new(repair);
        self
    }

    pub const fn version(&self) -> &VersionGate {
        &self.version
    }

    /// Tokenize `xml` and build the document from it.
    pub fn build(mut self, xml: &str) -> Result<Document> {
        tokenizer::tokenize(xml, &mut self)?;
        self.finish()
    }

    /// Hand over the finished document.
    pub fn finish(mut self) -> Result<Document> {
        if let Some(open) = self.frames.last() {
            return Err(ImportError::structure(format!(
                "markup ended inside '{}'",
                open.name()
            )));
        }
        let document = self.document.take().ok_or(ImportError::MissingDocument)?;
        log::info!(
            "imported document '{}' (version {}): {} sheets, {} contexts, {} voices, {} elements",
            document.title,
            self.version
                .version()
                .map_or_else(|| "undeclared".to_string(), ToString::to_string),
            document.sheets.len(),
            document.contexts.len(),
            document.voice_count(),
            document.element_count(),
        );
        Ok(document)
    }

    fn read_color(&self, attributes: &Attributes) -> Option<Color> {
        if !attributes.is_set("color") || !self.version.colors_are_reliable() {
            return None;
        }
        let color = Color::parse(attributes.value("color"));
        if color.is_none() {
            log::warn!("ignoring malformed colour '{}'", attributes.value("color"));
        }
        color
    }

    // ─── Open ────────────────────────────────────────────────────────

    fn open_element(&mut self, tag: &Tag, attributes: &Attributes) -> Result<()> {
        match tag {
            Tag::Version => {}
            Tag::Document => self.open_document(attributes)?,
            Tag::Sheet => {
                let doc = require_document(&mut self.document)?;
                let name = name_or(attributes, || format!("Sheet{}", doc.sheets.len() + 1));
                self.cursors.sheet = Some(doc.add_sheet(name));
            }
            Tag::Staff => {
                let number_of_lines = if attributes.is_set("number-of-lines") {
                    attributes.int("number-of-lines")
                } else {
                    5
                };
                self.open_context(
                    attributes,
                    ContextKind::Staff(Staff {
                        number_of_lines,
                        voices: Vec::new(),
                    }),
                )?;
            }
            Tag::LyricsContext => {
                let context = self.open_context(
                    attributes,
                    ContextKind::Lyrics(LyricsContext {
                        stanza_number: attributes.int("stanza-number"),
                        associated_voice: None,
                        syllables: Vec::new(),
                    }),
                )?;
                if attributes.is_set("associated-voice-idx") {
                    self.deferred
                        .defer_lyrics_context(context, attributes.int("associated-voice-idx"));
                }
            }
            Tag::FiguredBassContext => {
                self.open_context(attributes, ContextKind::FiguredBass(FiguredBassContext::default()))?;
            }
            Tag::FunctionMarkContext => {
                self.open_context(attributes, ContextKind::FunctionMark(FunctionMarkContext::default()))?;
            }
            Tag::ChordNameContext => {
                self.open_context(attributes, ContextKind::ChordName(ChordNameContext::default()))?;
            }
            Tag::Voice => self.open_voice(attributes)?,
            Tag::Clef | Tag::TimeSignature | Tag::KeySignature | Tag::Barline => {
                self.open_sign(tag, attributes)?;
            }
            Tag::Note => self.open_note(attributes)?,
            Tag::Rest => self.open_rest(attributes)?,
            Tag::Tie => self.open_slur(SlurKind::Tie, attributes)?,
            Tag::SlurStart => self.open_slur(SlurKind::Slur, attributes)?,
            Tag::PhrasingSlurStart => self.open_slur(SlurKind::PhrasingSlur, attributes)?,
            Tag::SlurEnd => self.close_slur(SlurKind::Slur)?,
            Tag::PhrasingSlurEnd => self.close_slur(SlurKind::PhrasingSlur)?,
            Tag::Tuplet => {
                let doc = require_document(&mut self.document)?;
                let mut tuplet = Tuplet::new(attributes.int("number"), attributes.int("actual-number"));
                tuplet.color = self.color;
                self.cursors.tuplet = Some(doc.add_tuplet(tuplet));
            }
            Tag::Syllable => self.open_syllable(attributes)?,
            Tag::FiguredBassMark => {
                let (doc, context) = require_context(
                    &mut self.document,
                    self.cursors.context,
                    ContextType::FiguredBassContext,
                    "figured bass mark",
                )?;
                let element = alloc_with_color(
                    doc,
                    ElementKind::FiguredBassMark(FiguredBassMark {
                        context,
                        numbers: Vec::new(),
                    }),
                    attributes,
                    self.color,
                );
                doc.add_figured_bass_mark(context, element);
                self.cursors.element = Some(Target::Element(element));
            }
            Tag::FiguredBassNumber => {
                let doc = require_document(&mut self.document)?;
                let mark = match self.cursors.element {
                    Some(Target::Element(id)) => match &mut doc.element_mut(id).kind {
                        ElementKind::FiguredBassMark(mark) => Some(mark),
                        _ => None,
                    },
                    _ => None,
                };
                let mark = mark.ok_or_else(|| {
                    ImportError::structure("figured bass number outside of a figured bass mark")
                })?;
                mark.numbers.push(FiguredBassNumber {
                    number: attributes.int("number"),
                    accs: attributes.is_set("accs").then(|| attributes.int("accs")),
                });
            }
            Tag::FunctionMark => self.open_function_mark(attributes)?,
            Tag::FunctionMarking => {
                if self.version.uses_attribute_shape() {
                    self.open_function_mark(attributes)?;
                } else {
                    log::trace!("ignoring 'function-marking' outside of a 0.5 document");
                }
            }
            Tag::ChordName => {
                let (doc, context) = require_context(
                    &mut self.document,
                    self.cursors.context,
                    ContextType::ChordNameContext,
                    "chord name",
                )?;
                let element = alloc_with_color(
                    doc,
                    ElementKind::ChordName(ChordName {
                        context,
                        pitch: DiatonicPitch::default(),
                        quality_modifier: attributes.value("quality-modifier").to_string(),
                    }),
                    attributes,
                    self.color,
                );
                self.cursors.element = Some(Target::Element(element));
            }
            Tag::Mark => self.open_mark(attributes)?,
            Tag::PlayableLength => {
                let length =
                    PlayableLength::from_attributes(attributes.value("music-length"), attributes.value("dotted"));
                if self.frames.last() == Some(&Tag::Mark) {
                    self.buffers.tempo_playable_length = length;
                } else {
                    self.buffers.playable_length = length;
                }
            }
            Tag::DiatonicPitch => {
                self.buffers.diatonic_pitch =
                    DiatonicPitch::new(attributes.int("note-name"), attributes.int("accs"));
            }
            Tag::DiatonicKey => {
                self.buffers.diatonic_key =
                    DiatonicKey::new(DiatonicPitch::default(), Gender::from_name(attributes.value("gender")));
            }
            Tag::Resource => self.open_resource(attributes)?,
            Tag::Other(name) => log::trace!("ignoring unknown element '{name}'"),
        }
        Ok(())
    }

    fn open_document(&mut self, attributes: &Attributes) -> Result<()> {
        if self.document.is_some() {
            return Err(ImportError::structure("only one document element is allowed"));
        }
        let text = |name: &str| attributes.value(name).to_string();
        let date = |name: &str| attributes.is_set(name).then(|| text(name));
        self.document = Some(Document {
            title: text("title"),
            subtitle: text("subtitle"),
            composer: text("composer"),
            arranger: text("arranger"),
            poet: text("poet"),
            text_translator: text("text-translator"),
            copyright: text("copyright"),
            dedication: text("dedication"),
            comments: text("comments"),
            date_created: date("date-created"),
            date_last_modified: date("date-last-modified"),
            time_edited: attributes.uint("time-edited"),
            file_name: self.options.source_path.clone(),
            ..Document::default()
        });
        Ok(())
    }

    fn open_context(&mut self, attributes: &Attributes, kind: ContextKind) -> Result<ContextId> {
        let doc = require_document(&mut self.document)?;
        let sheet = self.cursors.sheet.ok_or_else(|| {
            ImportError::structure(format!(
                "the sheet where context '{}' should be added doesn't exist yet",
                attributes.value("name")
            ))
        })?;
        let context_type = match &kind {
            ContextKind::Staff(_) => ContextType::Staff,
            ContextKind::Lyrics(_) => ContextType::LyricsContext,
            ContextKind::FiguredBass(_) => ContextType::FiguredBassContext,
            ContextKind::FunctionMark(_) => ContextType::FunctionMarkContext,
            ContextKind::ChordName(_) => ContextType::ChordNameContext,
        };
        let name = name_or(attributes, || {
            let existing = doc
                .sheet(sheet)
                .contexts
                .iter()
                .filter(|&&c| doc.context(c).context_type() == context_type)
                .count();
            format!("{}{}", context_type.default_name_prefix(), existing + 1)
        });
        let context = doc.add_context(sheet, name, kind);
        self.cursors.context = Some(context);
        Ok(context)
    }

    fn open_voice(&mut self, attributes: &Attributes) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let staff = match self.cursors.context {
            Some(c) if doc.staff(c).is_some() => c,
            Some(c) => {
                return Err(ImportError::structure(format!(
                    "voice '{}' must be inside a staff, not a {:?}",
                    attributes.value("name"),
                    doc.context(c).context_type()
                )));
            }
            None => {
                return Err(ImportError::structure(format!(
                    "the staff where voice '{}' should be added doesn't exist yet",
                    attributes.value("name")
                )));
            }
        };
        let name = name_or(attributes, || {
            let existing = doc.staff(staff).map_or(0, |s| s.voices.len());
            format!("Voice{}", existing + 1)
        });
        let mut voice = Voice::new(name, staff);
        voice.stem_direction = StemDirection::from_name(attributes.value("stem-direction"));
        voice.midi_channel = u8::try_from(attributes.uint("midi-channel")).unwrap_or(0);
        voice.midi_program = u8::try_from(attributes.uint("midi-program")).unwrap_or(0);
        voice.midi_pitch_offset = i8::try_from(attributes.int("midi-pitch-offset")).unwrap_or(0);
        let voice = doc
            .add_voice(voice)
            .ok_or_else(|| ImportError::structure("voices can only be added to a staff"))?;
        self.cursors.voice = Some(voice);
        Ok(())
    }

    fn open_sign(&mut self, tag: &Tag, attributes: &Attributes) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let voice = self
            .cursors
            .voice
            .ok_or_else(|| ImportError::structure(format!("{} outside of a voice", tag.name())))?;
        let staff = doc.voice(voice).staff;
        let kind = match tag {
            Tag::Clef => ElementKind::Clef(Clef {
                staff,
                clef_type: ClefType::from_name(attributes.value("clef-type")),
                c1: attributes.int("c1"),
                offset: attributes.int("offset"),
            }),
            Tag::TimeSignature => ElementKind::TimeSignature(TimeSignature {
                staff,
                beats: attributes.int("beats"),
                beat: attributes.int("beat"),
                time_signature_type: TimeSignatureType::from_name(attributes.value("time-signature-type")),
            }),
            Tag::KeySignature => {
                let kind = match KeySignatureType::from_name(attributes.value("key-signature-type")) {
                    // The key itself arrives in a nested diatonic-key
                    KeySignatureType::MajorMinor => KeySignatureKind::MajorMinor(DiatonicKey::default()),
                    KeySignatureType::Modus => KeySignatureKind::Modus(Modus::from_name(attributes.value("modus"))),
                    KeySignatureType::Custom => KeySignatureKind::Custom,
                };
                ElementKind::KeySignature(KeySignature { staff, kind })
            }
            _ => ElementKind::Barline(Barline {
                staff,
                barline_type: BarlineType::from_name(attributes.value("barline-type")),
            }),
        };
        let mut element = MusicElement::new(kind, attributes.int("time-start"), 0);
        element.color = self.color;
        let id = doc.alloc_element(element);
        self.cursors.sign = Some(id);
        self.cursors.element = Some(Target::Element(id));
        Ok(())
    }

    fn open_note(&mut self, attributes: &Attributes) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let voice = self
            .cursors
            .voice
            .ok_or_else(|| ImportError::structure("note outside of a voice"))?;
        self.buffers.diatonic_pitch = DiatonicPitch::default();
        self.buffers.playable_length = PlayableLength::default();

        let (pitch, playable_length) = if self.version.uses_attribute_shape() {
            (
                DiatonicPitch::new(attributes.int("pitch"), attributes.int("accs")),
                PlayableLength::from_attributes(attributes.value("playable-length"), attributes.value("dotted")),
            )
        } else {
            (DiatonicPitch::default(), PlayableLength::default())
        };
        let mut note = Note::new(voice, pitch, playable_length);
        if attributes.is_set("stem-direction") {
            note.stem_direction = StemDirection::from_name(attributes.value("stem-direction"));
        }
        note.tuplet = self.cursors.tuplet;

        let mut element = MusicElement::new(
            ElementKind::Note(note),
            attributes.int("time-start"),
            attributes.int("time-length"),
        );
        element.color = self.color;
        let id = doc.alloc_element(element);
        if let Some(tuplet) = self.cursors.tuplet {
            doc.tuplets[tuplet.index()].members.push(id);
        }
        self.cursors.note = Some(id);
        self.cursors.element = Some(Target::Element(id));
        Ok(())
    }

    fn open_rest(&mut self, attributes: &Attributes) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let voice = self
            .cursors
            .voice
            .ok_or_else(|| ImportError::structure("rest outside of a voice"))?;
        self.buffers.playable_length = PlayableLength::default();

        let playable_length = if self.version.uses_attribute_shape() {
            PlayableLength::from_attributes(attributes.value("playable-length"), attributes.value("dotted"))
        } else {
            PlayableLength::default()
        };
        let rest = Rest {
            voice,
            rest_type: RestType::from_name(attributes.value("rest-type")),
            playable_length,
            tuplet: self.cursors.tuplet,
        };
        let mut element = MusicElement::new(
            ElementKind::Rest(rest),
            attributes.int("time-start"),
            attributes.int("time-length"),
        );
        element.color = self.color;
        let id = doc.alloc_element(element);
        if let Some(tuplet) = self.cursors.tuplet {
            doc.tuplets[tuplet.index()].members.push(id);
        }
        self.cursors.rest = Some(id);
        self.cursors.element = Some(Target::Element(id));
        Ok(())
    }

    fn open_slur(&mut self, kind: SlurKind, attributes: &Attributes) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let note = self
            .cursors
            .note
            .ok_or_else(|| ImportError::structure(format!("{kind:?} must start inside a note")))?;
        let (staff, time_start) = {
            let element = doc.element(note);
            let voice = element
                .as_note()
                .map(|n| n.voice)
                .ok_or_else(|| ImportError::structure("current note is not a note"))?;
            (doc.voice(voice).staff, element.time_start)
        };

        let mut slur = Slur::new(kind, staff, note, time_start);
        slur.style = SlurStyle::from_name(attributes.value("slur-style"));
        slur.direction = SlurDirection::from_name(attributes.value("slur-direction"));
        slur.color = self.color;
        let id = doc.add_slur(slur);

        if let Some(n) = doc.element_mut(note).as_note_mut() {
            match kind {
                SlurKind::Tie => n.tie_start = Some(id),
                SlurKind::Slur => n.slur_start = Some(id),
                SlurKind::PhrasingSlur => n.phrasing_slur_start = Some(id),
            }
        }
        match kind {
            SlurKind::Slur => self.cursors.slur = Some(id),
            SlurKind::PhrasingSlur => self.cursors.phrasing_slur = Some(id),
            // Ties end on the next note of the same pitch
            SlurKind::Tie => {}
        }
        self.cursors.previous_element = self.cursors.element;
        self.cursors.element = Some(Target::Slur(id));
        Ok(())
    }

    /// Bind the open slur or phrasing slur to the current note.
    fn close_slur(&mut self, kind: SlurKind) -> Result<()> {
        let open = match kind {
            SlurKind::PhrasingSlur => self.cursors.phrasing_slur.take(),
            _ => self.cursors.slur.take(),
        };
        let Some(slur) = open else {
            log::warn!("{kind:?} end without a matching start");
            return Ok(());
        };
        let doc = require_document(&mut self.document)?;
        let note = self
            .cursors
            .note
            .ok_or_else(|| ImportError::structure(format!("{kind:?} must end inside a note")))?;
        let end = doc.element(note).time_start;
        let start = doc.slur(slur).time_start;
        let time_length = end.checked_sub(start).ok_or_else(|| {
            ImportError::structure(format!("{kind:?} from {start} to {end} is out of range"))
        })?;
        if let Some(n) = doc.element_mut(note).as_note_mut() {
            match kind {
                SlurKind::PhrasingSlur => n.phrasing_slur_end = Some(slur),
                _ => n.slur_end = Some(slur),
            }
        }
        let slur = &mut doc.slurs[slur.index()];
        slur.note_end = Some(note);
        slur.time_length = time_length;
        Ok(())
    }

    fn open_syllable(&mut self, attributes: &Attributes) -> Result<()> {
        let (doc, context) = require_context(
            &mut self.document,
            self.cursors.context,
            ContextType::LyricsContext,
            "syllable",
        )?;
        let mut element = MusicElement::new(
            ElementKind::Syllable(Syllable {
                context,
                text: attributes.value("text").to_string(),
                hyphen: attributes.flag("hyphen"),
                melisma: attributes.flag("melisma"),
                associated_voice: None,
            }),
            attributes.int("time-start"),
            attributes.int("time-length"),
        );
        element.color = self.color;
        let id = doc.alloc_element(element);
        doc.add_syllable(context, id);
        if attributes.is_set("associated-voice-idx") {
            self.deferred
                .defer_syllable(id, attributes.int("associated-voice-idx"));
        }
        self.cursors.element = Some(Target::Element(id));
        Ok(())
    }

    fn open_function_mark(&mut self, attributes: &Attributes) -> Result<()> {
        let legacy = self.version.uses_attribute_shape();
        let color = self.color;
        let (doc, context) = require_context(
            &mut self.document,
            self.cursors.context,
            ContextType::FunctionMarkContext,
            "function mark",
        )?;
        let key = if legacy {
            DiatonicKey::from_legacy_name(attributes.value("key"))
        } else {
            DiatonicKey::default()
        };
        let function = FunctionMark {
            context,
            function: FunctionType::from_name(attributes.value("function")),
            minor: attributes.flag("minor"),
            key,
            chord_area: FunctionType::from_name(attributes.value("chord-area")),
            chord_area_minor: attributes.flag("chord-area-minor"),
            tonic_degree: FunctionType::from_name(attributes.value("tonic-degree")),
            tonic_degree_minor: attributes.flag("tonic-degree-minor"),
            ellipse: attributes.flag("ellipse"),
        };
        let id = alloc_with_color(doc, ElementKind::FunctionMark(function), attributes, color);
        doc.add_function_mark(context, id);
        self.cursors.element = Some(Target::Element(id));
        Ok(())
    }

    fn open_mark(&mut self, attributes: &Attributes) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let element = match self.cursors.element {
            Some(Target::Element(id)) => id,
            Some(Target::Slur(slur)) => {
                return Err(ImportError::structure(format!(
                    "marks cannot be attached to a {:?}",
                    doc.slur(slur).kind
                )));
            }
            None => return Err(ImportError::structure("mark outside of a music element")),
        };
        self.cursors.mark = None;
        if let Some(mut mark) = factory::build_mark(attributes, doc.element(element), &self.version)? {
            mark.color = self.color;
            let index = doc.add_mark(element, mark);
            self.cursors.mark = Some((element, index));
        }
        Ok(())
    }

    fn open_resource(&mut self, attributes: &Attributes) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let name = attributes.value("name");
        let linked = attributes.flag("linked");
        let url = factory::resolve_resource_url(
            attributes.value("url"),
            linked,
            self.options.source_path.as_deref(),
        );
        let resource_type = ResourceType::from_name(attributes.value("resource-type"));
        let id = self
            .resources
            .import_resource(name, &url, linked, doc, resource_type)?;
        if let Some(resource) = doc.resources.get_mut(id.index()) {
            resource.description = attributes.value("description").to_string();
        }
        log::debug!("imported {resource_type:?} resource '{name}' from '{url}'");
        Ok(())
    }

    // ─── Close ───────────────────────────────────────────────────────

    fn close_element(&mut self, tag: &Tag) -> Result<()> {
        match tag {
            Tag::Version => {
                if self.version.declare(&self.text)? {
                    log::debug!("document written by version {}", self.text.trim());
                } else {
                    log::warn!("ignoring repeated version declaration '{}'", self.text.trim());
                }
            }
            Tag::Document => {
                if self.options.synchronize_voices {
                    let doc = require_document(&mut self.document)?;
                    let staves: Vec<ContextId> = (0..doc.sheets.len())
                        .flat_map(|s| doc.staves(SheetId(s)))
                        .collect();
                    for staff in staves {
                        self.repair.synchronize_voices(doc, staff);
                    }
                }
            }
            Tag::Sheet => {
                let doc = require_document(&mut self.document)?;
                if let Some(sheet) = self.cursors.sheet.take() {
                    let resolution = self.deferred.resolve(doc, sheet);
                    log::debug!("resolved voice references of sheet '{}': {resolution:?}", doc.sheet(sheet).name);
                }
                self.cursors.context = None;
            }
            Tag::Staff
            | Tag::LyricsContext
            | Tag::FiguredBassContext
            | Tag::FunctionMarkContext
            | Tag::ChordNameContext => self.cursors.context = None,
            Tag::Voice => self.cursors.voice = None,
            Tag::Clef | Tag::TimeSignature | Tag::KeySignature | Tag::Barline => self.close_sign(tag)?,
            Tag::Note => self.close_note()?,
            Tag::Rest => self.close_rest()?,
            Tag::Tuplet => {
                let doc = require_document(&mut self.document)?;
                let tuplet = self
                    .cursors
                    .tuplet
                    .take()
                    .ok_or_else(|| ImportError::structure("tuplet closed without being opened"))?;
                doc.assign_tuplet_times(tuplet);
            }
            Tag::Mark => {
                if let Some((element, index)) = self.cursors.mark.take() {
                    if !self.version.uses_attribute_shape() {
                        let doc = require_document(&mut self.document)?;
                        if let Some(MarkKind::Tempo { beat, .. }) =
                            doc.element_mut(element).marks.get_mut(index).map(|m| &mut m.kind)
                        {
                            *beat = self.buffers.tempo_playable_length;
                        }
                    }
                }
            }
            Tag::FunctionMark => {
                if !self.version.uses_attribute_shape() {
                    let doc = require_document(&mut self.document)?;
                    if let Some(Target::Element(id)) = self.cursors.element {
                        if let ElementKind::FunctionMark(mark) = &mut doc.element_mut(id).kind {
                            mark.key = self.buffers.diatonic_key;
                        }
                    }
                }
            }
            Tag::DiatonicKey => self.buffers.diatonic_key.pitch = self.buffers.diatonic_pitch,
            Tag::ChordName => {
                let doc = require_document(&mut self.document)?;
                let id = match self.cursors.element {
                    Some(Target::Element(id)) => id,
                    _ => return Err(ImportError::structure("chord name closed without being opened")),
                };
                let context = match &mut doc.element_mut(id).kind {
                    ElementKind::ChordName(chord) => {
                        chord.pitch = self.buffers.diatonic_pitch;
                        chord.context
                    }
                    _ => return Err(ImportError::structure("chord name closed without being opened")),
                };
                if !doc.add_chord_name(context, id) {
                    return Err(ImportError::structure("chord name outside of a chord name context"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close_sign(&mut self, tag: &Tag) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let staff = self.cursors.context.filter(|&c| doc.staff(c).is_some());
        let (Some(staff), Some(voice)) = (staff, self.cursors.voice) else {
            return Err(ImportError::structure(format!("{} outside of a staff voice", tag.name())));
        };
        let candidate = self
            .cursors
            .sign
            .take()
            .ok_or_else(|| ImportError::structure(format!("{} closed without being opened", tag.name())))?;

        if let ElementKind::KeySignature(KeySignature {
            kind: KeySignatureKind::MajorMinor(key),
            ..
        }) = &mut doc.element_mut(candidate).kind
        {
            *key = self.buffers.diatonic_key;
        }

        let placement = self.signs.find_or_register(doc, staff, candidate, voice)?;
        if let Placement::Existing(_) = placement {
            // The candidate's id is free again
            self.cursors.element = None;
            self.cursors.mark = None;
        }
        Ok(())
    }

    fn close_note(&mut self) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let (Some(note), Some(voice)) = (self.cursors.note.take(), self.cursors.voice) else {
            return Err(ImportError::structure("note closed outside of a voice"));
        };

        if !self.version.uses_attribute_shape() {
            let element = doc.element_mut(note);
            let in_tuplet = element.tuplet().is_some();
            if !in_tuplet {
                element.time_length = self.buffers.playable_length.time_length();
            }
            if let Some(n) = element.as_note_mut() {
                n.playable_length = self.buffers.playable_length;
                n.pitch = self.buffers.diatonic_pitch;
            }
        }

        let start = doc.element(note).time_start;
        let chord = doc
            .last_note(voice)
            .is_some_and(|last| doc.element(last).time_start == start);
        doc.append(voice, note, chord);
        doc.update_ties(note);
        Ok(())
    }

    fn close_rest(&mut self) -> Result<()> {
        let doc = require_document(&mut self.document)?;
        let (Some(rest), Some(voice)) = (self.cursors.rest.take(), self.cursors.voice) else {
            return Err(ImportError::structure("rest closed outside of a voice"));
        };

        if !self.version.uses_attribute_shape() {
            let element = doc.element_mut(rest);
            if element.tuplet().is_none() {
                element.time_length = self.buffers.playable_length.time_length();
            }
            if let ElementKind::Rest(r) = &mut element.kind {
                r.playable_length = self.buffers.playable_length;
            }
        }

        doc.append(voice, rest, false);
        Ok(())
    }
}

impl ContentHandler for ScoreBuilder {
    fn open(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        let tag = Tag::from_name(name);
        self.text.clear();
        self.color = self.read_color(attributes);
        let result = self.open_element(&tag, attributes);
        self.frames.push(tag);
        result
    }

    fn text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn close(&mut self, name: &str) -> Result<()> {
        let tag = Tag::from_name(name);
        match self.frames.last() {
            Some(open) if *open == tag => {}
            open => {
                return Err(ImportError::UnbalancedClose {
                    expected: open.map_or_else(String::new, |t| t.name().to_string()),
                    found: name.to_string(),
                });
            }
        }

        let result = self.close_element(&tag);
        self.text.clear();
        self.frames.pop();
        if let Some(previous) = self.cursors.previous_element.take() {
            self.cursors.element = Some(previous);
        }
        result
    }

    fn fatal_error(&mut self, line: u32, column: u32, message: &str) -> ImportError {
        log::warn!("malformed score markup at {line}:{column}: {message}");
        ImportError::Syntax {
            line,
            column,
            message: message.to_string(),
        }
    }
}

fn require_document(document: &mut Option<Document>) -> Result<&mut Document> {
    document
        .as_mut()
        .ok_or_else(|| ImportError::structure("score content outside of a document"))
}

/// The current context, which must be of `context_type`.
fn require_context<'a>(
    document: &'a mut Option<Document>,
    context: Option<ContextId>,
    context_type: ContextType,
    what: &str,
) -> Result<(&'a mut Document, ContextId)> {
    let doc = require_document(document)?;
    let context = context
        .filter(|&c| doc.context(c).context_type() == context_type)
        .ok_or_else(|| ImportError::structure(format!("{what} outside of a {context_type:?}")))?;
    Ok((doc, context))
}

fn name_or(attributes: &Attributes, default: impl FnOnce() -> String) -> String {
    if attributes.is_set("name") {
        attributes.value("name").to_string()
    } else {
        default()
    }
}

fn alloc_with_color(
    doc: &mut Document,
    kind: ElementKind,
    attributes: &Attributes,
    color: Option<Color>,
) -> ElementId {
    let mut element = MusicElement::new(kind, attributes.int("time-start"), attributes.int("time-length"));
    element.color = color;
    doc.alloc_element(element)
}

//! Integration tests: import small inline documents and check builder behaviour.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use scoregraph::import::DocumentResources;
use scoregraph::tokenizer::{Attributes, ContentHandler};
use scoregraph::*;

/// Wrap voice content in a minimal document of the given version.
fn single_voice(version: &str, content: &str) -> String {
    format!(
        r#"<canorus>
  <canorus-version>{version}</canorus-version>
  <document title="Inline">
    <sheet name="Sheet">
      <staff name="Staff">
        <voice name="Voice">
          {content}
        </voice>
      </staff>
    </sheet>
  </document>
</canorus>"#
    )
}

fn quarter(time: i32, note_name: i32, extra: &str) -> String {
    format!(
        r#"<note time-start="{time}">
            <playable-length music-length="quarter" dotted="0"/>
            <diatonic-pitch note-name="{note_name}" accs="0"/>
            {extra}
          </note>"#
    )
}

fn first_voice_elements(doc: &Document) -> Vec<ElementId> {
    doc.voice(VoiceId(0)).elements.clone()
}

// ─── Structural errors ──────────────────────────────────────────────

#[test]
fn missing_document_is_an_error() {
    let err = import_str("<canorus><canorus-version>0.7.5</canorus-version></canorus>").unwrap_err();
    assert_eq!(err, ImportError::MissingDocument);
}

#[test]
fn malformed_markup_reports_line() {
    let err = import_str("<document>\n<sheet></document>").unwrap_err();
    match err {
        ImportError::Syntax { line, .. } => assert_eq!(line, 2),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn voice_outside_a_staff_is_rejected() {
    let err = import_str(
        r#"<document><sheet><lyrics-context><voice name="Lost"/></lyrics-context></sheet></document>"#,
    )
    .unwrap_err();
    match err {
        ImportError::Structure(message) => {
            assert!(message.contains("Lost"), "{message}");
            assert!(message.contains("not a LyricsContext"), "{message}");
        }
        other => panic!("expected a structure error, got {other:?}"),
    }
}

#[test]
fn voice_before_any_staff_is_rejected() {
    let err = import_str(r#"<document><sheet><voice name="Early"/></sheet></document>"#).unwrap_err();
    match err {
        ImportError::Structure(message) => {
            assert!(message.contains("Early"), "{message}");
            assert!(message.contains("doesn't exist yet"), "{message}");
        }
        other => panic!("expected a structure error, got {other:?}"),
    }
}

#[test]
fn context_outside_a_sheet_is_rejected() {
    let err = import_str(r#"<document><staff/></document>"#).unwrap_err();
    assert!(matches!(err, ImportError::Structure(_)));
}

#[test]
fn note_outside_a_voice_is_rejected() {
    let err = import_str(r#"<document><sheet><staff><note time-start="0"/></staff></sheet></document>"#)
        .unwrap_err();
    assert!(matches!(err, ImportError::Structure(_)));
}

#[test]
fn unparseable_version_is_an_error() {
    let err = import_str(&single_voice("beta", "")).unwrap_err();
    assert_eq!(err, ImportError::Version("beta".to_string()));
}

#[test]
fn close_must_match_the_innermost_open_element() {
    let mut builder = ScoreBuilder::default();
    builder.open("document", &Attributes::new()).unwrap();
    builder.open("sheet", &Attributes::new()).unwrap();
    let err = builder.close("document").unwrap_err();
    assert_eq!(
        err,
        ImportError::UnbalancedClose {
            expected: "sheet".to_string(),
            found: "document".to_string(),
        }
    );
}

#[test]
fn finishing_inside_an_element_is_an_error() {
    let mut builder = ScoreBuilder::default();
    builder.open("document", &Attributes::new()).unwrap();
    assert!(matches!(builder.finish(), Err(ImportError::Structure(_))));
}

#[test]
fn builder_can_be_driven_by_hand() {
    let mut builder = ScoreBuilder::default();
    builder
        .open("document", &Attributes::new().with("title", "By hand"))
        .unwrap();
    builder.open("sheet", &Attributes::new()).unwrap();
    builder.open("staff", &Attributes::new()).unwrap();
    builder.open("voice", &Attributes::new()).unwrap();
    builder.close("voice").unwrap();
    builder.close("staff").unwrap();
    builder.close("sheet").unwrap();
    builder.close("document").unwrap();

    let doc = builder.finish().unwrap();
    assert_eq!(doc.title, "By hand");
    assert_eq!(doc.voices[0].name, "Voice1");
}

// ─── Version gate ───────────────────────────────────────────────────

#[test]
fn colour_is_trusted_only_after_0_7_3() {
    let note = r##"<note time-start="0" color="#ff0000"><playable-length music-length="quarter"/></note>"##;

    let doc = import_str(&single_voice("0.7.3", note)).unwrap();
    assert_eq!(doc.element(first_voice_elements(&doc)[0]).color, None);

    let doc = import_str(&single_voice("0.7.4", note)).unwrap();
    assert_eq!(doc.element(first_voice_elements(&doc)[0]).color, Some(Color::rgb(255, 0, 0)));
}

#[test]
fn undeclared_version_reads_nested_shape_without_colour() {
    let xml = r##"<document><sheet><staff><voice>
        <note time-start="0" color="#00ff00" pitch="40">
          <playable-length music-length="eighth" dotted="1"/>
          <diatonic-pitch note-name="30" accs="-1"/>
        </note>
      </voice></staff></sheet></document>"##;
    let doc = import_str(xml).unwrap();
    let note = doc.element(first_voice_elements(&doc)[0]);
    assert_eq!(note.color, None);
    assert_eq!(note.time_length, 192);
    assert_eq!(note.as_note().unwrap().pitch, DiatonicPitch::new(30, -1));
}

#[test]
fn first_version_declaration_wins() {
    let xml = r#"<canorus>
      <canorus-version>0.5</canorus-version>
      <canorus-version>0.8</canorus-version>
      <document><sheet><staff><voice>
        <note pitch="31" accs="1" playable-length="half" time-start="0" time-length="512"/>
      </voice></staff></sheet></document>
    </canorus>"#;
    let mut builder = ScoreBuilder::default();
    tokenizer::tokenize(xml, &mut builder).unwrap();
    assert_eq!(builder.version().version(), Some(&Version::new(&[0, 5])));

    let doc = builder.finish().unwrap();
    let note = doc.element(first_voice_elements(&doc)[0]);
    assert_eq!(note.as_note().unwrap().pitch, DiatonicPitch::new(31, 1));
    assert_eq!(note.as_note().unwrap().playable_length, PlayableLength::new(MusicLength::Half, 0));
}

// ─── Signs and voice repair ─────────────────────────────────────────

const TWO_VOICES: &str = r#"<canorus>
  <canorus-version>0.7.5</canorus-version>
  <document>
    <sheet>
      <staff>
        <voice name="A">
          <clef clef-type="treble" c1="-2" time-start="0"/>
          <time-signature beats="3" beat="4" time-start="0"/>
          <note time-start="0"><playable-length music-length="quarter"/><diatonic-pitch note-name="30"/></note>
        </voice>
        <voice name="B">
          <note time-start="0"><playable-length music-length="quarter"/><diatonic-pitch note-name="26"/></note>
        </voice>
      </staff>
    </sheet>
  </document>
</canorus>"#;

#[test]
fn voice_repair_adds_missing_signs() {
    let doc = import_str(TWO_VOICES).unwrap();
    let a = &doc.voice(VoiceId(0)).elements;
    let b = &doc.voice(VoiceId(1)).elements;
    assert_eq!(b.len(), 3);
    assert_eq!(&b[..2], &a[..2]);
    assert_eq!(doc.element(b[2]).element_type(), ElementType::Note);
    assert_eq!(doc.element_count(), 4);
}

#[test]
fn voice_repair_can_be_disabled() {
    let options = ImportOptions {
        synchronize_voices: false,
        ..ImportOptions::default()
    };
    let doc = import_with_options(TWO_VOICES, options).unwrap();
    assert_eq!(doc.voice(VoiceId(1)).elements.len(), 1);
}

#[test]
fn custom_voice_repair_runs_once_per_staff() {
    struct CountingRepair(Rc<RefCell<Vec<ContextId>>>);
    impl VoiceRepair for CountingRepair {
        fn synchronize_voices(&self, _document: &mut Document, staff: ContextId) {
            self.0.borrow_mut().push(staff);
        }
    }

    let seen = Rc::new(RefCell::new(Vec::new()));
    let doc = ScoreBuilder::default()
        .with_voice_repair(CountingRepair(Rc::clone(&seen)))
        .build(TWO_VOICES)
        .unwrap();
    assert_eq!(*seen.borrow(), vec![ContextId(0)]);
    // Nothing was synchronized
    assert_eq!(doc.voice(VoiceId(1)).elements.len(), 1);
}

#[test]
fn different_signs_at_the_same_time_stay_separate() {
    let xml = r#"<canorus><canorus-version>0.7.5</canorus-version><document><sheet><staff>
        <voice><clef clef-type="treble" c1="-2" time-start="0"/></voice>
        <voice><clef clef-type="bass" c1="10" time-start="0"/></voice>
        <voice><clef clef-type="bass" c1="10" time-start="0"/></voice>
      </staff></sheet></document></canorus>"#;
    let doc = import_str(xml).unwrap();
    let staff = doc.staves(SheetId(0))[0];
    assert_eq!(doc.signs_at(staff, SignKind::Clef, 0).len(), 2);
    assert_eq!(doc.voice(VoiceId(1)).elements, doc.voice(VoiceId(2)).elements);
    assert_ne!(doc.voice(VoiceId(0)).elements, doc.voice(VoiceId(1)).elements);
}

// ─── Slurs and marks ────────────────────────────────────────────────

#[test]
fn slur_binds_start_and_end_notes() {
    let content = [
        quarter(0, 28, r#"<slur-start slur-direction="up" slur-style="dashed"/>"#),
        quarter(256, 29, ""),
        quarter(512, 30, "<slur-end/>"),
    ]
    .concat();
    let doc = import_str(&single_voice("0.7.5", &content)).unwrap();
    let notes = first_voice_elements(&doc);

    assert_eq!(doc.slurs.len(), 1);
    let slur = &doc.slurs[0];
    assert_eq!(slur.kind, SlurKind::Slur);
    assert_eq!(slur.direction, SlurDirection::Up);
    assert_eq!(slur.style, SlurStyle::Dashed);
    assert_eq!(slur.note_start, notes[0]);
    assert_eq!(slur.note_end, Some(notes[2]));
    assert_eq!(slur.time_length, 512);
    assert_eq!(doc.element(notes[2]).as_note().unwrap().slur_end, Some(SlurId(0)));
}

#[test]
fn slur_spanning_the_whole_time_range_is_rejected() {
    let content = [
        quarter(i32::MIN, 28, "<slur-start/>"),
        quarter(i32::MAX, 29, "<slur-end/>"),
    ]
    .concat();
    let err = import_str(&single_voice("0.7.5", &content)).unwrap_err();
    match err {
        ImportError::Structure(message) => assert!(message.contains("out of range"), "{message}"),
        other => panic!("expected a structure error, got {other:?}"),
    }
}

#[test]
fn tie_spanning_the_whole_time_range_saturates() {
    let content = [quarter(i32::MIN, 28, "<tie/>"), quarter(i32::MAX, 28, "")].concat();
    let doc = import_str(&single_voice("0.7.5", &content)).unwrap();
    let notes = first_voice_elements(&doc);
    assert_eq!(doc.slurs[0].note_end, Some(notes[1]));
    assert_eq!(doc.slurs[0].time_length, i32::MAX);
}

#[test]
fn phrasing_slur_end_without_start_is_ignored() {
    let content = quarter(0, 28, "<phrasing-slur-end/>");
    let doc = import_str(&single_voice("0.7.5", &content)).unwrap();
    assert!(doc.slurs.is_empty());
}

#[test]
fn tie_to_a_different_pitch_stays_open() {
    let content = [quarter(0, 28, "<tie/>"), quarter(256, 29, "")].concat();
    let doc = import_str(&single_voice("0.7.5", &content)).unwrap();
    assert_eq!(doc.slurs[0].note_end, None);
}

#[test]
fn marks_cannot_hang_off_a_tie() {
    let content = quarter(0, 28, r#"<tie><mark mark-type="BookMark" text="here"/></tie>"#);
    let err = import_str(&single_voice("0.7.5", &content)).unwrap_err();
    assert!(matches!(err, ImportError::Structure(_)));
}

#[test]
fn note_only_mark_on_a_rest_fails_the_import() {
    let content = r#"<rest time-start="0"><playable-length music-length="quarter"/>
        <mark mark-type="Articulation" articulation-type="staccato"/></rest>"#;
    let err = import_str(&single_voice("0.7.5", content)).unwrap_err();
    assert!(matches!(err, ImportError::Structure(_)));
}

#[test]
fn fermata_on_a_clef_is_dropped() {
    let content = r#"<clef clef-type="treble" c1="-2" time-start="0"><mark mark-type="Fermata"/></clef>"#;
    let doc = import_str(&single_voice("0.7.5", content)).unwrap();
    let clef = doc.element(first_voice_elements(&doc)[0]);
    assert!(clef.marks.is_empty());
}

#[test]
fn fingering_and_articulation_on_a_note() {
    let content = quarter(
        0,
        28,
        r##"<mark mark-type="Fingering" finger0="1" finger1="3" original="1"/>
           <mark mark-type="Articulation" articulation-type="staccato" color="#0000ff"/>"##,
    );
    let doc = import_str(&single_voice("0.7.5", &content)).unwrap();
    let note = doc.element(first_voice_elements(&doc)[0]);
    assert_eq!(
        note.marks,
        vec![
            Mark {
                color: None,
                kind: MarkKind::Fingering {
                    fingers: vec![FingerNumber::First, FingerNumber::Third],
                    original: true,
                },
            },
            Mark {
                color: Some(Color::rgb(0, 0, 255)),
                kind: MarkKind::Articulation {
                    articulation_type: ArticulationType::Staccato,
                },
            },
        ]
    );
}

// ─── Non-staff contexts ─────────────────────────────────────────────

#[test]
fn figured_bass_function_marks_and_chord_names() {
    let xml = r#"<canorus><canorus-version>0.7.5</canorus-version><document><sheet>
      <figured-bass-context name="Continuo">
        <figured-bass-mark time-start="0" time-length="256">
          <figured-bass-number number="6"/>
          <figured-bass-number number="4" accs="1"/>
        </figured-bass-mark>
      </figured-bass-context>
      <function-mark-context>
        <function-mark function="D" chord-area="T" time-start="0" time-length="256">
          <diatonic-key gender="minor"><diatonic-pitch note-name="30" accs="0"/></diatonic-key>
        </function-mark>
      </function-mark-context>
      <chord-name-context>
        <chord-name time-start="0" time-length="512" quality-modifier="m7">
          <diatonic-pitch note-name="33" accs="0"/>
        </chord-name>
      </chord-name-context>
    </sheet></document></canorus>"#;
    let doc = import_str(xml).unwrap();
    let contexts = &doc.sheets[0].contexts;
    let names: Vec<&str> = contexts.iter().map(|&c| doc.context(c).name.as_str()).collect();
    assert_eq!(names, vec!["Continuo", "FunctionMarkContext1", "ChordNameContext1"]);

    let ContextKind::FiguredBass(fbc) = &doc.context(contexts[0]).kind else {
        panic!("expected a figured bass context");
    };
    let ElementKind::FiguredBassMark(mark) = &doc.element(fbc.marks[0]).kind else {
        panic!("expected a figured bass mark");
    };
    assert_eq!(
        mark.numbers,
        vec![
            FiguredBassNumber { number: 6, accs: None },
            FiguredBassNumber { number: 4, accs: Some(1) },
        ]
    );

    let ContextKind::FunctionMark(fmc) = &doc.context(contexts[1]).kind else {
        panic!("expected a function mark context");
    };
    let ElementKind::FunctionMark(function) = &doc.element(fmc.marks[0]).kind else {
        panic!("expected a function mark");
    };
    assert_eq!(function.function, FunctionType::D);
    assert_eq!(function.chord_area, FunctionType::T);
    assert_eq!(function.key, DiatonicKey::new(DiatonicPitch::new(30, 0), Gender::Minor));

    let ContextKind::ChordName(cnc) = &doc.context(contexts[2]).kind else {
        panic!("expected a chord name context");
    };
    let ElementKind::ChordName(chord) = &doc.element(cnc.chord_names[0]).kind else {
        panic!("expected a chord name");
    };
    assert_eq!(chord.pitch, DiatonicPitch::new(33, 0));
    assert_eq!(chord.quality_modifier, "m7");
}

#[test]
fn syllable_outside_lyrics_is_rejected() {
    let xml = r#"<document><sheet><chord-name-context><syllable text="la"/></chord-name-context></sheet></document>"#;
    assert!(matches!(import_str(xml), Err(ImportError::Structure(_))));
}

#[test]
fn out_of_range_voice_index_leaves_lyrics_unbound() {
    let xml = r#"<document><sheet>
      <lyrics-context associated-voice-idx="4"><syllable text="la" associated-voice-idx="9"/></lyrics-context>
      <staff><voice/></staff>
    </sheet></document>"#;
    let doc = import_str(xml).unwrap();
    let lyrics = doc.lyrics_context(ContextId(0)).unwrap();
    assert_eq!(lyrics.associated_voice, None);
    assert_eq!(doc.element(lyrics.syllables[0]).as_syllable().unwrap().associated_voice, None);
}

// ─── Resources ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct RecordingResources(Rc<RefCell<Vec<(String, String, bool)>>>);

impl ResourceController for RecordingResources {
    fn import_resource(
        &mut self,
        name: &str,
        url: &str,
        linked: bool,
        document: &mut Document,
        resource_type: ResourceType,
    ) -> Result<ResourceId> {
        self.0
            .borrow_mut()
            .push((name.to_string(), url.to_string(), linked));
        DocumentResources.import_resource(name, url, linked, document, resource_type)
    }
}

const WITH_RESOURCES: &str = r#"<canorus><canorus-version>0.7.5</canorus-version><document>
  <resource name="cover" url="file://img/cover.png" linked="0" resource-type="image" description="Cover art"/>
  <resource name="take" url="http://example.org/take.ogg" linked="1" resource-type="sound"/>
</document></canorus>"#;

#[test]
fn resources_are_handed_to_the_controller() {
    let recorder = RecordingResources::default();
    let options = ImportOptions {
        source_path: Some(PathBuf::from("/scores/etude.can")),
        ..ImportOptions::default()
    };
    let doc = ScoreBuilder::new(options)
        .with_resources(recorder.clone())
        .build(WITH_RESOURCES)
        .unwrap();

    assert_eq!(
        *recorder.0.borrow(),
        vec![
            ("cover".to_string(), "/scores/img/cover.png".to_string(), false),
            ("take".to_string(), "http://example.org/take.ogg".to_string(), true),
        ]
    );
    assert_eq!(doc.resources.len(), 2);
    assert_eq!(doc.resource(ResourceId(0)).description, "Cover art");
    assert_eq!(doc.resource(ResourceId(0)).resource_type, ResourceType::Image);
    assert_eq!(doc.resource(ResourceId(1)).resource_type, ResourceType::Sound);
}

#[test]
fn refused_resource_fails_the_import() {
    struct Refuse;
    impl ResourceController for Refuse {
        fn import_resource(
            &mut self,
            name: &str,
            _url: &str,
            _linked: bool,
            _document: &mut Document,
            _resource_type: ResourceType,
        ) -> Result<ResourceId> {
            Err(ImportError::Resource {
                name: name.to_string(),
                message: "storage is read-only".to_string(),
            })
        }
    }

    let err = ScoreBuilder::default()
        .with_resources(Refuse)
        .build(WITH_RESOURCES)
        .unwrap_err();
    assert_eq!(err.to_string(), "resource 'cover' could not be imported: storage is read-only");
}

//! Construction of marks and resources from element attributes.

use std::path::Path;

use crate::error::{ImportError, Result};
use crate::model::*;
use crate::tokenizer::Attributes;
use crate::version::VersionGate;

/// Build the mark described by a `mark` element for `target`.
///
/// Returns `Ok(None)` for an unknown mark type, and for a fermata on an
/// element that is neither playable nor a barline. Mark kinds that only
/// make sense on notes, playables or barlines fail on any other target.
pub fn build_mark(attributes: &Attributes, target: &MusicElement, version: &VersionGate) -> Result<Option<Mark>> {
    let mark_type = MarkType::from_name(attributes.value("mark-type"));
    let kind = match mark_type {
        MarkType::Undefined => {
            log::trace!("skipping mark of unknown type '{}'", attributes.value("mark-type"));
            return Ok(None);
        }
        MarkType::Text => {
            require_playable(mark_type, target)?;
            MarkKind::Text {
                text: attributes.value("text").to_string(),
            }
        }
        MarkType::Tempo => {
            // Newer files carry the beat as a nested playable-length
            let beat = if version.uses_attribute_shape() {
                PlayableLength::from_attributes(attributes.value("beat"), attributes.value("beat-dotted"))
            } else {
                PlayableLength::default()
            };
            MarkKind::Tempo {
                beat,
                bpm: clamp_u8(attributes.uint("bpm")),
            }
        }
        MarkType::Ritardando => {
            require_playable(mark_type, target)?;
            MarkKind::Ritardando {
                final_tempo: attributes.int("final-tempo"),
                time_length: attributes.int("time-length"),
                ritardando_type: RitardandoType::from_name(attributes.value("ritardando-type")),
            }
        }
        MarkType::Dynamic => {
            require_note(mark_type, target)?;
            MarkKind::Dynamic {
                text: attributes.value("text").to_string(),
                volume: attributes.int("volume"),
            }
        }
        MarkType::Crescendo => {
            require_note(mark_type, target)?;
            MarkKind::Crescendo {
                final_volume: attributes.int("final-volume"),
                crescendo_type: CrescendoType::from_name(attributes.value("crescendo-type")),
                time_start: attributes.int("time-start"),
                time_length: attributes.int("time-length"),
            }
        }
        MarkType::Pedal => MarkKind::Pedal {
            time_start: attributes.int("time-start"),
            time_length: attributes.int("time-length"),
        },
        MarkType::InstrumentChange => {
            require_note(mark_type, target)?;
            MarkKind::InstrumentChange {
                instrument: attributes.int("instrument"),
            }
        }
        MarkType::BookMark => MarkKind::BookMark {
            text: attributes.value("text").to_string(),
        },
        MarkType::RehearsalMark => MarkKind::RehearsalMark,
        MarkType::Fermata => {
            if !target.is_playable() && target.element_type() != ElementType::Barline {
                log::warn!("ignoring fermata on a {:?}", target.element_type());
                return Ok(None);
            }
            MarkKind::Fermata {
                fermata_type: FermataType::from_name(attributes.value("fermata-type")),
            }
        }
        MarkType::RepeatMark => {
            if target.element_type() != ElementType::Barline {
                return Err(invalid_target(mark_type, target, "a barline"));
            }
            MarkKind::RepeatMark {
                repeat_mark_type: RepeatMarkType::from_name(attributes.value("repeat-mark-type")),
                volta_number: attributes.int("volta-number"),
            }
        }
        MarkType::Articulation => {
            require_note(mark_type, target)?;
            MarkKind::Articulation {
                articulation_type: ArticulationType::from_name(attributes.value("articulation-type")),
            }
        }
        MarkType::Fingering => {
            require_note(mark_type, target)?;
            let fingers = (0..)
                .map(|i| attributes.value(&format!("finger{i}")))
                .take_while(|v| !v.is_empty())
                .map(FingerNumber::from_name)
                .collect();
            MarkKind::Fingering {
                fingers,
                original: attributes.int("original") != 0,
            }
        }
    };
    Ok(Some(Mark::new(kind)))
}

fn clamp_u8(value: u32) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

fn require_playable(mark_type: MarkType, target: &MusicElement) -> Result<()> {
    if target.is_playable() {
        Ok(())
    } else {
        Err(invalid_target(mark_type, target, "a note or rest"))
    }
}

fn require_note(mark_type: MarkType, target: &MusicElement) -> Result<()> {
    if target.element_type() == ElementType::Note {
        Ok(())
    } else {
        Err(invalid_target(mark_type, target, "a note"))
    }
}

fn invalid_target(mark_type: MarkType, target: &MusicElement, expected: &str) -> ImportError {
    ImportError::structure(format!(
        "{mark_type:?} mark must be attached to {expected}, not a {:?}",
        target.element_type()
    ))
}

/// Location handed to the resource controller. Embedded resources are
/// stored relative to the document, so they are made absolute against the
/// document's directory; linked ones are passed through untouched.
pub fn resolve_resource_url(url: &str, linked: bool, source: Option<&Path>) -> String {
    if linked {
        return url.to_string();
    }
    let Some(dir) = source.and_then(Path::parent) else {
        return url.to_string();
    };
    let local = url.strip_prefix("file://").unwrap_or(url);
    dir.join(local).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note() -> MusicElement {
        MusicElement::new(
            ElementKind::Note(Note::new(VoiceId(0), DiatonicPitch::new(28, 0), PlayableLength::default())),
            0,
            256,
        )
    }

    fn rest() -> MusicElement {
        MusicElement::new(
            ElementKind::Rest(Rest {
                voice: VoiceId(0),
                rest_type: RestType::Normal,
                playable_length: PlayableLength::default(),
                tuplet: None,
            }),
            0,
            256,
        )
    }

    fn barline() -> MusicElement {
        MusicElement::new(
            ElementKind::Barline(Barline {
                staff: ContextId(0),
                barline_type: BarlineType::Single,
            }),
            1024,
            0,
        )
    }

    fn clef() -> MusicElement {
        MusicElement::new(
            ElementKind::Clef(Clef {
                staff: ContextId(0),
                clef_type: ClefType::G,
                c1: -2,
                offset: 0,
            }),
            0,
            0,
        )
    }

    fn nested() -> VersionGate {
        let mut gate = VersionGate::new();
        gate.declare("0.7.5").unwrap();
        gate
    }

    #[test]
    fn fingering_reads_numbered_attributes_until_a_gap() {
        let attrs = Attributes::new()
            .with("mark-type", "Fingering")
            .with("finger0", "First")
            .with("finger1", "Thumb")
            .with("finger3", "Fifth")
            .with("original", "1");
        let mark = build_mark(&attrs, &note(), &nested()).unwrap().unwrap();
        assert_eq!(
            mark.kind,
            MarkKind::Fingering {
                fingers: vec![FingerNumber::First, FingerNumber::Thumb],
                original: true,
            }
        );
    }

    #[test]
    fn fermata_targets() {
        let attrs = Attributes::new().with("mark-type", "Fermata").with("fermata-type", "long");
        assert!(build_mark(&attrs, &rest(), &nested()).unwrap().is_some());
        assert!(build_mark(&attrs, &barline(), &nested()).unwrap().is_some());
        assert_eq!(build_mark(&attrs, &clef(), &nested()).unwrap(), None);
    }

    #[test]
    fn note_only_marks_reject_other_targets() {
        let attrs = Attributes::new().with("mark-type", "Dynamic").with("text", "mf");
        assert!(build_mark(&attrs, &note(), &nested()).unwrap().is_some());
        let err = build_mark(&attrs, &rest(), &nested()).unwrap_err();
        assert!(matches!(err, ImportError::Structure(_)));

        let attrs = Attributes::new().with("mark-type", "RepeatMark").with("repeat-mark-type", "segno");
        assert!(build_mark(&attrs, &note(), &nested()).is_err());
        assert!(build_mark(&attrs, &barline(), &nested()).unwrap().is_some());
    }

    #[test]
    fn tempo_beat_depends_on_shape() {
        let attrs = Attributes::new()
            .with("mark-type", "Tempo")
            .with("beat", "half")
            .with("beat-dotted", "1")
            .with("bpm", "300");

        let mut legacy = VersionGate::new();
        legacy.declare("0.5").unwrap();
        let mark = build_mark(&attrs, &clef(), &legacy).unwrap().unwrap();
        assert_eq!(
            mark.kind,
            MarkKind::Tempo {
                beat: PlayableLength::new(MusicLength::Half, 1),
                bpm: 255,
            }
        );

        let mark = build_mark(&attrs, &clef(), &nested()).unwrap().unwrap();
        assert_eq!(
            mark.kind,
            MarkKind::Tempo {
                beat: PlayableLength::default(),
                bpm: 255,
            }
        );
    }

    #[test]
    fn unknown_mark_type_is_skipped() {
        let attrs = Attributes::new().with("mark-type", "Sparkle");
        assert_eq!(build_mark(&attrs, &note(), &nested()).unwrap(), None);
    }

    #[test]
    fn embedded_resources_resolve_against_the_document_directory() {
        let source = Path::new("/scores/etude.can");
        assert_eq!(
            resolve_resource_url("file://images/cover.png", false, Some(source)),
            "/scores/images/cover.png"
        );
        assert_eq!(
            resolve_resource_url("http://example.org/a.ogg", true, Some(source)),
            "http://example.org/a.ogg"
        );
        assert_eq!(resolve_resource_url("cover.png", false, None), "cover.png");
    }
}

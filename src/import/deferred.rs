//! Voice references that can only be resolved once a sheet is complete.
//!
//! Lyrics contexts and syllables name their voice by its index among all
//! voices of the sheet, and the voice may be declared later in the file.

use crate::model::{ContextId, ContextKind, Document, ElementId, ElementKind, SheetId};

#[derive(Debug, Default)]
pub struct DeferredRefs {
    lyrics_contexts: Vec<(ContextId, i32)>,
    syllables: Vec<(ElementId, i32)>,
}

/// What [`DeferredRefs::resolve`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    pub lyrics_contexts: usize,
    pub syllables: usize,
    /// References whose index named no voice
    pub skipped: usize,
}

impl DeferredRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer_lyrics_context(&mut self, context: ContextId, voice_index: i32) {
        self.lyrics_contexts.push((context, voice_index));
    }

    pub fn defer_syllable(&mut self, syllable: ElementId, voice_index: i32) {
        self.syllables.push((syllable, voice_index));
    }

    pub fn is_empty(&self) -> bool {
        self.lyrics_contexts.is_empty() && self.syllables.is_empty()
    }

    /// Bind every pending reference against the voices of `sheet` and
    /// clear the table.
    pub fn resolve(&mut self, document: &mut Document, sheet: SheetId) -> Resolution {
        let voices = document.sheet_voices(sheet);
        let lookup = |index: i32| usize::try_from(index).ok().and_then(|i| voices.get(i).copied());
        let mut resolution = Resolution::default();

        for (context, index) in self.lyrics_contexts.drain(..) {
            let Some(voice) = lookup(index) else {
                log::warn!("lyrics context '{}' refers to missing voice {index}", document.context(context).name);
                resolution.skipped += 1;
                continue;
            };
            if let ContextKind::Lyrics(lc) = &mut document.contexts[context.index()].kind {
                lc.associated_voice = Some(voice);
                resolution.lyrics_contexts += 1;
            }
        }

        for (syllable, index) in self.syllables.drain(..) {
            let Some(voice) = lookup(index) else {
                log::warn!("syllable refers to missing voice {index}");
                resolution.skipped += 1;
                continue;
            };
            if let ElementKind::Syllable(s) = &mut document.element_mut(syllable).kind {
                s.associated_voice = Some(voice);
                resolution.syllables += 1;
            }
        }

        resolution
    }
}

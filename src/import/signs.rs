//! Staff-scoped index of placed signs (clefs, key and time signatures,
//! barlines).
//!
//! Every voice of a staff lists every sign of the staff, but each sign
//! placement is one element. When a voice declares a sign that another
//! voice of the same staff already placed with identical attributes at
//! the same time, the voice gets a reference to the existing element and
//! the freshly built one is dropped.

use std::collections::HashMap;

use crate::error::{ImportError, Result};
use crate::model::{ContextId, Document, ElementId, SignKind, VoiceId};

/// Outcome of [`SignIndex::find_or_register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The candidate became the sign of record
    New(ElementId),
    /// An identical sign already existed; the candidate was discarded
    Existing(ElementId),
}

impl Placement {
    pub const fn element(self) -> ElementId {
        match self {
            Placement::New(id) | Placement::Existing(id) => id,
        }
    }
}

#[derive(Debug, Default)]
pub struct SignIndex {
    registered: HashMap<(ContextId, SignKind, i32), Vec<ElementId>>,
}

impl SignIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `candidate` (the most recently allocated element) into `voice`
    /// of `staff`, reusing an identical sign another voice already placed
    /// at the same time.
    pub fn find_or_register(
        &mut self,
        document: &mut Document,
        staff: ContextId,
        candidate: ElementId,
        voice: VoiceId,
    ) -> Result<Placement> {
        let (kind, time) = {
            let element = document.element(candidate);
            let kind = element.sign_kind().ok_or_else(|| {
                ImportError::structure("only clefs, key signatures, time signatures and barlines can be shared")
            })?;
            (kind, element.time_start)
        };
        let key = (staff, kind, time);

        let existing = self.registered.get(&key).and_then(|ids| {
            ids.iter().copied().find(|&id| {
                document.element(id).same_sign_as(document.element(candidate))
                    && !document.voice_contains(voice, id)
            })
        });

        match existing {
            Some(sign) => {
                if document.discard_element(candidate).is_none() {
                    return Err(ImportError::structure(
                        "unexpected content inside a clef, key signature, time signature or barline",
                    ));
                }
                document.append(voice, sign, false);
                log::debug!("{kind:?} at {time} shared with voice {}", voice.index());
                Ok(Placement::Existing(sign))
            }
            None => {
                document.append(voice, candidate, false);
                self.registered.entry(key).or_default().push(candidate);
                Ok(Placement::New(candidate))
            }
        }
    }

    /// Signs of record of `kind` at `time` on `staff`.
    pub fn registered(&self, staff: ContextId, kind: SignKind, time: i32) -> &[ElementId] {
        self.registered
            .get(&(staff, kind, time))
            .map_or(&[], Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub fn clear(&mut self) {
        self.registered.clear();
    }
}

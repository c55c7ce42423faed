//! Collaborators the builder delegates to: resource storage and voice
//! repair. Both have defaults that work on the document alone.

use crate::error::Result;
use crate::model::{ContextId, Document, Resource, ResourceId, ResourceType};

/// Takes ownership of resources declared by a document.
pub trait ResourceController {
    /// Register a resource. `url` is already resolved: absolute for
    /// embedded resources, as written for linked ones.
    fn import_resource(
        &mut self,
        name: &str,
        url: &str,
        linked: bool,
        document: &mut Document,
        resource_type: ResourceType,
    ) -> Result<ResourceId>;
}

/// Stores resources directly in the document's resource list.
#[derive(Debug, Default)]
pub struct DocumentResources;

impl ResourceController for DocumentResources {
    fn import_resource(
        &mut self,
        name: &str,
        url: &str,
        linked: bool,
        document: &mut Document,
        resource_type: ResourceType,
    ) -> Result<ResourceId> {
        Ok(document.add_resource(Resource {
            name: name.to_string(),
            description: String::new(),
            url: url.to_string(),
            linked,
            resource_type,
        }))
    }
}

/// Post-import repair pass run once per staff.
pub trait VoiceRepair {
    fn synchronize_voices(&self, document: &mut Document, staff: ContextId);
}

/// Adds missing shared signs to voices that lack them.
#[derive(Debug, Default)]
pub struct SharedSignRepair;

impl VoiceRepair for SharedSignRepair {
    fn synchronize_voices(&self, document: &mut Document, staff: ContextId) {
        document.synchronize_voices(staff);
    }
}

//! External assets (images, sounds, movies) referenced by a document.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Image,
    Sound,
    Movie,
    Other,
}

impl ResourceType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "image" => ResourceType::Image,
            "sound" => ResourceType::Sound,
            "movie" => ResourceType::Movie,
            _ => ResourceType::Other,
        }
    }
}

/// An asset either embedded with the document or linked by path/URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub description: String,
    /// Resolved location of the asset
    pub url: String,
    /// Linked resources are only referenced, never copied
    pub linked: bool,
    pub resource_type: ResourceType,
}

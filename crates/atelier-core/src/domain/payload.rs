//! Kind-specific job payloads.
//!
//! Every job kind carries its own input and result shape. Both are modelled as
//! tagged enums keyed by [`JobKind`], so a job's kind is always derived from
//! its payload and the two can never disagree.
//!
//! Wire shape: `{"kind": "auto_tag", "data": { ... }}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of AI job variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    AutoTag,
    ProductShot,
    HeadshotGenerate,
    OutfitRender,
    OutfitMannequin,
    Batch,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::AutoTag => "auto_tag",
            JobKind::ProductShot => "product_shot",
            JobKind::HeadshotGenerate => "headshot_generate",
            JobKind::OutfitRender => "outfit_render",
            JobKind::OutfitMannequin => "outfit_mannequin",
            JobKind::Batch => "batch",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// Inputs
// ========================================

/// Auto-tagging of a single wardrobe item photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTagInput {
    pub item_id: String,
    pub image_url: String,
}

/// Clean catalogue-style shot of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductShotInput {
    pub item_id: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

/// Headshot synthesis from user selfies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadshotInput {
    pub source_image_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Try-on render of an outfit on the user's headshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutfitRenderInput {
    pub outfit_id: String,
    pub item_ids: Vec<String>,
    pub headshot_url: String,
}

/// Outfit rendered on a neutral mannequin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutfitMannequinInput {
    pub outfit_id: String,
    pub item_ids: Vec<String>,
}

/// One operation fanned out over many items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInput {
    pub operation: JobKind,
    pub item_ids: Vec<String>,
}

/// Kind-tagged job input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum JobInput {
    AutoTag(AutoTagInput),
    ProductShot(ProductShotInput),
    HeadshotGenerate(HeadshotInput),
    OutfitRender(OutfitRenderInput),
    OutfitMannequin(OutfitMannequinInput),
    Batch(BatchInput),
}

impl JobInput {
    pub fn kind(&self) -> JobKind {
        match self {
            JobInput::AutoTag(_) => JobKind::AutoTag,
            JobInput::ProductShot(_) => JobKind::ProductShot,
            JobInput::HeadshotGenerate(_) => JobKind::HeadshotGenerate,
            JobInput::OutfitRender(_) => JobKind::OutfitRender,
            JobInput::OutfitMannequin(_) => JobKind::OutfitMannequin,
            JobInput::Batch(_) => JobKind::Batch,
        }
    }

    /// The payload without its kind tag, as JSON.
    ///
    /// Used by structured predicates that address input fields by name.
    pub fn payload_json(&self) -> serde_json::Value {
        let value = match self {
            JobInput::AutoTag(p) => serde_json::to_value(p),
            JobInput::ProductShot(p) => serde_json::to_value(p),
            JobInput::HeadshotGenerate(p) => serde_json::to_value(p),
            JobInput::OutfitRender(p) => serde_json::to_value(p),
            JobInput::OutfitMannequin(p) => serde_json::to_value(p),
            JobInput::Batch(p) => serde_json::to_value(p),
        };
        // Plain structs of strings never fail to serialize.
        value.unwrap_or(serde_json::Value::Null)
    }
}

// ========================================
// Results
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTagOutput {
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
}

/// Any job whose product is a single generated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOutput {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub succeeded: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

/// Kind-tagged job result. Present only on succeeded jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum JobOutput {
    AutoTag(AutoTagOutput),
    ProductShot(ImageOutput),
    HeadshotGenerate(ImageOutput),
    OutfitRender(ImageOutput),
    OutfitMannequin(ImageOutput),
    Batch(BatchOutput),
}

impl JobOutput {
    pub fn kind(&self) -> JobKind {
        match self {
            JobOutput::AutoTag(_) => JobKind::AutoTag,
            JobOutput::ProductShot(_) => JobKind::ProductShot,
            JobOutput::HeadshotGenerate(_) => JobKind::HeadshotGenerate,
            JobOutput::OutfitRender(_) => JobKind::OutfitRender,
            JobOutput::OutfitMannequin(_) => JobKind::OutfitMannequin,
            JobOutput::Batch(_) => JobKind::Batch,
        }
    }

    /// Generated image, for the kinds that produce one.
    pub fn image_url(&self) -> Option<&str> {
        match self {
            JobOutput::ProductShot(o)
            | JobOutput::HeadshotGenerate(o)
            | JobOutput::OutfitRender(o)
            | JobOutput::OutfitMannequin(o) => Some(&o.image_url),
            JobOutput::AutoTag(_) | JobOutput::Batch(_) => None,
        }
    }
}

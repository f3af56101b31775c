//! Persistent graph node model.
//!
//! # Responsibility
//! - Define the closed set of object type tags the engine understands.
//! - Classify tags by the role they play during relocation (annotation,
//!   bundle anchor, rendering settings).
//!
//! # Invariants
//! - Every node belongs to exactly one group and has exactly one owner.
//! - Node ids are stable SQLite row ids and are never reused by the engine.

use serde::{Deserialize, Serialize};

/// Stable identifier of a persistent graph node.
pub type NodeId = i64;
/// Stable identifier of a security group.
pub type GroupId = i64;
/// Stable identifier of a user.
pub type ActorId = i64;

/// Closed object type set.
///
/// Per-type policy is keyed by this enum, so adding a variant forces every
/// classification `match` below to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Project,
    Dataset,
    Image,
    Screen,
    Plate,
    PlateAcquisition,
    Well,
    WellSample,
    Reagent,
    Roi,
    Shape,
    Folder,
    TagAnnotation,
    FileAnnotation,
    CommentAnnotation,
    Channel,
    LogicalChannel,
    StatsInfo,
    Pixels,
    RenderingDef,
    Instrument,
    LightSource,
    LightSettings,
    AffineTransform,
    Fileset,
}

/// Whether an annotation may legitimately be linked from unrelated parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSharing {
    /// One annotation object reused by many parents, e.g. a tag.
    Sharable,
    /// Annotation logically owned by the context of the annotated object.
    NonSharable,
}

impl TypeTag {
    pub const ALL: [TypeTag; 25] = [
        Self::Project,
        Self::Dataset,
        Self::Image,
        Self::Screen,
        Self::Plate,
        Self::PlateAcquisition,
        Self::Well,
        Self::WellSample,
        Self::Reagent,
        Self::Roi,
        Self::Shape,
        Self::Folder,
        Self::TagAnnotation,
        Self::FileAnnotation,
        Self::CommentAnnotation,
        Self::Channel,
        Self::LogicalChannel,
        Self::StatsInfo,
        Self::Pixels,
        Self::RenderingDef,
        Self::Instrument,
        Self::LightSource,
        Self::LightSettings,
        Self::AffineTransform,
        Self::Fileset,
    ];

    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Dataset => "Dataset",
            Self::Image => "Image",
            Self::Screen => "Screen",
            Self::Plate => "Plate",
            Self::PlateAcquisition => "PlateAcquisition",
            Self::Well => "Well",
            Self::WellSample => "WellSample",
            Self::Reagent => "Reagent",
            Self::Roi => "Roi",
            Self::Shape => "Shape",
            Self::Folder => "Folder",
            Self::TagAnnotation => "TagAnnotation",
            Self::FileAnnotation => "FileAnnotation",
            Self::CommentAnnotation => "CommentAnnotation",
            Self::Channel => "Channel",
            Self::LogicalChannel => "LogicalChannel",
            Self::StatsInfo => "StatsInfo",
            Self::Pixels => "Pixels",
            Self::RenderingDef => "RenderingDef",
            Self::Instrument => "Instrument",
            Self::LightSource => "LightSource",
            Self::LightSettings => "LightSettings",
            Self::AffineTransform => "AffineTransform",
            Self::Fileset => "Fileset",
        }
    }

    /// Returns annotation shareability, or `None` for non-annotation types.
    pub fn annotation_sharing(self) -> Option<AnnotationSharing> {
        match self {
            Self::TagAnnotation => Some(AnnotationSharing::Sharable),
            Self::FileAnnotation | Self::CommentAnnotation => Some(AnnotationSharing::NonSharable),
            Self::Project
            | Self::Dataset
            | Self::Image
            | Self::Screen
            | Self::Plate
            | Self::PlateAcquisition
            | Self::Well
            | Self::WellSample
            | Self::Reagent
            | Self::Roi
            | Self::Shape
            | Self::Folder
            | Self::Channel
            | Self::LogicalChannel
            | Self::StatsInfo
            | Self::Pixels
            | Self::RenderingDef
            | Self::Instrument
            | Self::LightSource
            | Self::LightSettings
            | Self::AffineTransform
            | Self::Fileset => None,
        }
    }

    pub fn is_annotation(self) -> bool {
        self.annotation_sharing().is_some()
    }

    /// Per-user display settings; always dropped when the graph leaves its group.
    pub fn is_rendering_settings(self) -> bool {
        matches!(self, Self::RenderingDef)
    }
}

/// Parses one type tag from its storage/wire name.
pub fn parse_type_tag(value: &str) -> Option<TypeTag> {
    TypeTag::ALL
        .into_iter()
        .find(|kind| kind.as_str() == value)
}

/// Persistent graph object read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: TypeTag,
    pub group_id: GroupId,
    pub owner_id: ActorId,
    /// Display label. Never written to logs.
    pub name: String,
}

//! Typed directed relations between nodes.
//!
//! # Responsibility
//! - Define composition, bundle-membership and annotation link kinds.
//! - Own the closed table of legal `(parent type, child type)` shapes per kind.
//!
//! # Invariants
//! - A bundle link always points from the bundle anchor to one member.
//! - Annotation links always target an annotation type from a non-annotation.
//! - Composition never targets an annotation type.

use crate::model::node::{ActorId, GroupId, Node, NodeId, TypeTag};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier of a persisted link row.
pub type LinkId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Parent structures child (e.g. Dataset -> Image, Roi -> Shape).
    Composition,
    /// Anchor -> member of an indivisible bundle (e.g. Fileset -> Image).
    Bundle,
    /// Annotated object -> annotation.
    Annotation,
}

impl LinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Composition => "composition",
            Self::Bundle => "bundle",
            Self::Annotation => "annotation",
        }
    }
}

pub fn parse_link_kind(value: &str) -> Option<LinkKind> {
    match value {
        "composition" => Some(LinkKind::Composition),
        "bundle" => Some(LinkKind::Bundle),
        "annotation" => Some(LinkKind::Annotation),
        _ => None,
    }
}

/// Persisted link read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub kind: LinkKind,
    pub parent_id: NodeId,
    pub child_id: NodeId,
    pub owner_id: ActorId,
}

/// One link together with the current groups of both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEnds {
    pub link: Link,
    pub parent_group_id: GroupId,
    pub child_group_id: GroupId,
}

/// Indivisible unit kinds, named after the anchor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BundleKind {
    Fileset,
    AffineTransform,
    LightSource,
}

impl BundleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fileset => "Fileset",
            Self::AffineTransform => "AffineTransform",
            Self::LightSource => "LightSource",
        }
    }

    /// Bundle kind anchored by `kind`, if any.
    pub fn anchored_by(kind: TypeTag) -> Option<Self> {
        match kind {
            TypeTag::Fileset => Some(Self::Fileset),
            TypeTag::AffineTransform => Some(Self::AffineTransform),
            TypeTag::LightSource => Some(Self::LightSource),
            _ => None,
        }
    }

    /// The only type allowed as a member of this bundle.
    pub fn member_type(self) -> TypeTag {
        match self {
            Self::Fileset => TypeTag::Image,
            Self::AffineTransform => TypeTag::Shape,
            Self::LightSource => TypeTag::LightSettings,
        }
    }
}

/// Anchor plus all current members of one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub kind: BundleKind,
    pub anchor: Node,
    pub members: Vec<Node>,
}

impl Bundle {
    /// Anchor followed by members.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::once(&self.anchor).chain(self.members.iter())
    }
}

/// Link shape validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkValidationError {
    SelfLink(NodeId),
    IllegalShape {
        kind: LinkKind,
        parent: TypeTag,
        child: TypeTag,
    },
}

impl Display for LinkValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfLink(id) => write!(f, "node {id} cannot be linked to itself"),
            Self::IllegalShape {
                kind,
                parent,
                child,
            } => write!(
                f,
                "{} link {} -> {} is not allowed",
                kind.as_str(),
                parent.as_str(),
                child.as_str()
            ),
        }
    }
}

impl Error for LinkValidationError {}

/// Validates one link shape before persistence.
pub fn validate_link(
    kind: LinkKind,
    parent: &Node,
    child: &Node,
) -> Result<(), LinkValidationError> {
    if parent.id == child.id {
        return Err(LinkValidationError::SelfLink(parent.id));
    }

    let legal = match kind {
        LinkKind::Composition => is_composition_shape(parent.kind, child.kind),
        LinkKind::Bundle => BundleKind::anchored_by(parent.kind)
            .is_some_and(|bundle| bundle.member_type() == child.kind),
        LinkKind::Annotation => !parent.kind.is_annotation() && child.kind.is_annotation(),
    };

    if legal {
        Ok(())
    } else {
        Err(LinkValidationError::IllegalShape {
            kind,
            parent: parent.kind,
            child: child.kind,
        })
    }
}

fn is_composition_shape(parent: TypeTag, child: TypeTag) -> bool {
    use TypeTag::*;
    matches!(
        (parent, child),
        (Project, Dataset)
            | (Dataset, Image)
            | (Screen, Plate)
            | (Screen, Reagent)
            | (Plate, Well)
            | (Plate, PlateAcquisition)
            | (Well, WellSample)
            | (PlateAcquisition, WellSample)
            | (WellSample, Image)
            | (Image, Pixels)
            | (Image, Roi)
            | (Image, Instrument)
            | (Pixels, Channel)
            | (Pixels, RenderingDef)
            | (Channel, LogicalChannel)
            | (Channel, StatsInfo)
            | (LogicalChannel, LightSettings)
            | (Roi, Shape)
            | (Instrument, LightSource)
            | (Folder, Folder)
            | (Folder, Image)
            | (Folder, Roi)
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_link_kind, validate_link, BundleKind, LinkKind, LinkValidationError};
    use crate::model::node::{Node, TypeTag};

    fn node(id: i64, kind: TypeTag) -> Node {
        Node {
            id,
            kind,
            group_id: 1,
            owner_id: 1,
            name: String::new(),
        }
    }

    #[test]
    fn accepts_known_composition_shapes() {
        validate_link(
            LinkKind::Composition,
            &node(1, TypeTag::Dataset),
            &node(2, TypeTag::Image),
        )
        .expect("dataset -> image");
        validate_link(
            LinkKind::Composition,
            &node(1, TypeTag::Folder),
            &node(2, TypeTag::Folder),
        )
        .expect("folder -> folder");
    }

    #[test]
    fn rejects_reversed_composition() {
        let err = validate_link(
            LinkKind::Composition,
            &node(1, TypeTag::Image),
            &node(2, TypeTag::Dataset),
        )
        .expect_err("image -> dataset must fail");
        assert!(matches!(err, LinkValidationError::IllegalShape { .. }));
    }

    #[test]
    fn bundle_links_require_matching_anchor_and_member() {
        validate_link(
            LinkKind::Bundle,
            &node(1, TypeTag::AffineTransform),
            &node(2, TypeTag::Shape),
        )
        .expect("transform -> shape");
        assert!(validate_link(
            LinkKind::Bundle,
            &node(1, TypeTag::Fileset),
            &node(2, TypeTag::Shape),
        )
        .is_err());
        assert_eq!(
            BundleKind::anchored_by(TypeTag::LightSource),
            Some(BundleKind::LightSource)
        );
        assert_eq!(BundleKind::anchored_by(TypeTag::Image), None);
    }

    #[test]
    fn annotation_links_target_annotations_only() {
        validate_link(
            LinkKind::Annotation,
            &node(1, TypeTag::Image),
            &node(2, TypeTag::TagAnnotation),
        )
        .expect("image -> tag");
        assert!(validate_link(
            LinkKind::Annotation,
            &node(1, TypeTag::TagAnnotation),
            &node(2, TypeTag::CommentAnnotation),
        )
        .is_err());
    }

    #[test]
    fn rejects_self_links() {
        let err = validate_link(
            LinkKind::Composition,
            &node(7, TypeTag::Folder),
            &node(7, TypeTag::Folder),
        )
        .expect_err("self link must fail");
        assert_eq!(err, LinkValidationError::SelfLink(7));
    }

    #[test]
    fn link_kind_names_roundtrip() {
        for kind in [LinkKind::Composition, LinkKind::Bundle, LinkKind::Annotation] {
            assert_eq!(parse_link_kind(kind.as_str()), Some(kind));
        }
    }
}

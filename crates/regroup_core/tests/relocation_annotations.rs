mod common;

use common::{Fixture, TwoGroups};
use regroup_core::{
    ActorId, GroupId, IncludePolicy, LinkKind, MoveRequest, NodeId, PermissionLevel,
    SessionContext, TypeTag,
};

/// Ana owns an image in `source`; Bob is a second member of `source`.
struct Shared {
    fx: Fixture,
    source: GroupId,
    destination: GroupId,
    ana: ActorId,
    bob: ActorId,
    image: NodeId,
}

impl Shared {
    fn new(source_level: PermissionLevel, destination_level: PermissionLevel) -> Self {
        let env = TwoGroups::with_levels(source_level, destination_level);
        let fx = env.fx;
        let bob = fx.actor("bob");
        fx.member(env.source, bob);
        let image = fx.node(TypeTag::Image, env.source, env.user);
        Self {
            fx,
            source: env.source,
            destination: env.destination,
            ana: env.user,
            bob,
            image,
        }
    }

    fn comment_by(&self, owner: ActorId) -> NodeId {
        let comment = self
            .fx
            .node(TypeTag::CommentAnnotation, self.source, owner);
        self.fx.annotate(self.image, comment);
        comment
    }

    fn move_image(&mut self, request: MoveRequest) -> regroup_core::RelocationReport {
        let session = SessionContext::all_groups(self.ana);
        self.fx.service().move_graph(&session, &request).unwrap()
    }

    fn request(&self) -> MoveRequest {
        MoveRequest::new(TypeTag::Image, vec![self.image], self.destination)
    }
}

#[test]
fn comment_by_non_member_of_destination_is_deleted() {
    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate);
    let comment = env.comment_by(env.bob);

    let report = env.move_image(env.request());

    assert_eq!(env.fx.group_of(env.image), Some(env.destination));
    assert!(!env.fx.exists(comment));
    assert!(report.was_deleted(comment));
}

#[test]
fn movers_own_comment_travels_with_the_image() {
    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate);
    let comment = env.comment_by(env.ana);

    let report = env.move_image(env.request());

    assert_eq!(env.fx.group_of(comment), Some(env.destination));
    assert!(report.was_moved(comment));
    assert!(env.fx.linked(LinkKind::Annotation, env.image, comment));
}

#[test]
fn comment_by_destination_member_moves_from_read_annotate_source() {
    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate);
    env.fx.member(env.destination, env.bob);
    let comment = env.comment_by(env.bob);

    env.move_image(env.request());

    assert_eq!(env.fx.group_of(comment), Some(env.destination));
    assert_eq!(env.fx.owner_of(comment), Some(env.bob));
}

#[test]
fn read_write_source_comments_need_an_explicit_include() {
    let mut env = Shared::new(PermissionLevel::ReadWrite, PermissionLevel::ReadAnnotate);
    env.fx.member(env.destination, env.bob);
    let comment = env.comment_by(env.bob);

    let report = env.move_image(env.request());
    assert!(report.was_deleted(comment));

    let mut env = Shared::new(PermissionLevel::ReadWrite, PermissionLevel::ReadAnnotate);
    env.fx.member(env.destination, env.bob);
    let comment = env.comment_by(env.bob);

    let request = env
        .request()
        .with_child_option(TypeTag::CommentAnnotation, IncludePolicy::Include);
    let report = env.move_image(request);
    assert!(report.was_moved(comment));
    assert_eq!(env.fx.group_of(comment), Some(env.destination));
}

#[test]
fn private_destination_drops_other_members_comments() {
    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::Private);
    env.fx.member(env.destination, env.bob);
    let foreign = env.comment_by(env.bob);
    let own = env.comment_by(env.ana);

    env.move_image(env.request());

    assert!(!env.fx.exists(foreign));
    assert_eq!(env.fx.group_of(own), Some(env.destination));
}

#[test]
fn excluded_comment_stays_and_is_unlinked() {
    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate);
    let comment = env.comment_by(env.ana);

    let request = env
        .request()
        .with_child_option(TypeTag::CommentAnnotation, IncludePolicy::Exclude);
    let report = env.move_image(request);

    assert_eq!(env.fx.group_of(comment), Some(env.source));
    assert!(report.was_left(comment));
    assert!(!env.fx.linked(LinkKind::Annotation, env.image, comment));
}

#[test]
fn tag_shared_with_a_staying_image_is_left_and_unlinked() {
    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate);
    let other_image = env.fx.node(TypeTag::Image, env.source, env.ana);
    let tag = env.fx.node(TypeTag::TagAnnotation, env.source, env.ana);
    env.fx.annotate(env.image, tag);
    env.fx.annotate(other_image, tag);

    let request = env
        .request()
        .with_child_option(TypeTag::TagAnnotation, IncludePolicy::Include);
    let report = env.move_image(request);

    assert_eq!(env.fx.group_of(tag), Some(env.source));
    assert!(report.was_left(tag));
    assert!(!env.fx.linked(LinkKind::Annotation, env.image, tag));
    assert!(env.fx.linked(LinkKind::Annotation, other_image, tag));
    assert_eq!(report.unlinked.len(), 1);
    assert_eq!(report.unlinked[0].kind, LinkKind::Annotation);
    assert_eq!(report.unlinked[0].child_id, tag);
}

#[test]
fn unshared_tag_stays_unless_included() {
    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate);
    let tag = env.fx.node(TypeTag::TagAnnotation, env.source, env.ana);
    env.fx.annotate(env.image, tag);

    let report = env.move_image(env.request());
    assert!(report.was_left(tag));
    assert_eq!(env.fx.group_of(tag), Some(env.source));

    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate);
    let tag = env.fx.node(TypeTag::TagAnnotation, env.source, env.ana);
    env.fx.annotate(env.image, tag);

    let request = env
        .request()
        .with_child_option(TypeTag::TagAnnotation, IncludePolicy::Include);
    let report = env.move_image(request);
    assert!(report.was_moved(tag));
    assert!(env.fx.linked(LinkKind::Annotation, env.image, tag));
}

#[test]
fn annotations_on_nested_nodes_are_considered() {
    let mut env = Shared::new(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate);
    let roi = env.fx.child(env.image, TypeTag::Roi, env.ana);
    let note = env.fx.node(TypeTag::FileAnnotation, env.source, env.ana);
    env.fx.annotate(roi, note);

    let report = env.move_image(env.request());

    assert!(report.was_moved(roi));
    assert!(report.was_moved(note));
    assert_eq!(env.fx.group_of(note), Some(env.destination));
}

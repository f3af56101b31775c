mod common;

use common::Fixture;
use regroup_core::{
    BundleKind, GraphRepository, LinkKind, PermissionLevel, RepoError, Role, SecurityRepository,
    SqliteGraphRepository, TypeTag,
};
use rusqlite::Connection;

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteGraphRepository::try_new(&conn)
        .err()
        .expect("unmigrated connection must be rejected");
    assert!(matches!(err, RepoError::UninitializedConnection { .. }));
}

#[test]
fn composition_queries_list_children_and_parents_in_id_order() {
    let fx = Fixture::new();
    let group = fx.group("lab", PermissionLevel::ReadAnnotate);
    let owner = fx.actor("ana");
    fx.member(group, owner);

    let first = fx.node(TypeTag::Dataset, group, owner);
    let second = fx.node(TypeTag::Dataset, group, owner);
    let image = fx.node(TypeTag::Image, group, owner);
    fx.compose(second, image);
    fx.compose(first, image);

    let graph = fx.graph();
    let parents: Vec<i64> = graph
        .composition_parents(image)
        .unwrap()
        .into_iter()
        .map(|node| node.id)
        .collect();
    assert_eq!(parents, vec![first, second]);

    let children = graph.composition_children(first).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].kind, TypeTag::Image);
}

#[test]
fn create_link_rejects_illegal_shapes() {
    let fx = Fixture::new();
    let group = fx.group("lab", PermissionLevel::ReadAnnotate);
    let owner = fx.actor("ana");
    let image = fx.node(TypeTag::Image, group, owner);
    let dataset = fx.node(TypeTag::Dataset, group, owner);
    let tag = fx.node(TypeTag::TagAnnotation, group, owner);

    let graph = fx.graph();
    let reversed = graph
        .create_link(LinkKind::Composition, image, dataset, owner)
        .unwrap_err();
    assert!(matches!(reversed, RepoError::Validation(_)));

    let tag_parent = graph
        .create_link(LinkKind::Annotation, tag, image, owner)
        .unwrap_err();
    assert!(matches!(tag_parent, RepoError::Validation(_)));

    let self_link = graph
        .create_link(LinkKind::Composition, image, image, owner)
        .unwrap_err();
    assert!(matches!(self_link, RepoError::Validation(_)));
}

#[test]
fn bundles_are_found_from_anchor_and_member() {
    let fx = Fixture::new();
    let group = fx.group("lab", PermissionLevel::ReadAnnotate);
    let owner = fx.actor("ana");
    let fileset = fx.node(TypeTag::Fileset, group, owner);
    let image_a = fx.node(TypeTag::Image, group, owner);
    let image_b = fx.node(TypeTag::Image, group, owner);
    fx.bundle(fileset, image_a);
    fx.bundle(fileset, image_b);

    let graph = fx.graph();
    let from_member = graph.bundles_of(image_b).unwrap();
    assert_eq!(from_member.len(), 1);
    assert_eq!(from_member[0].kind, BundleKind::Fileset);
    assert_eq!(from_member[0].anchor.id, fileset);
    let members: Vec<i64> = from_member[0].members.iter().map(|node| node.id).collect();
    assert_eq!(members, vec![image_a, image_b]);

    let from_anchor = graph.bundles_of(fileset).unwrap();
    assert_eq!(from_anchor, from_member);
}

#[test]
fn bundle_group_count_tracks_member_groups() {
    let fx = Fixture::new();
    let lab = fx.group("lab", PermissionLevel::ReadAnnotate);
    let other = fx.group("other", PermissionLevel::ReadAnnotate);
    let owner = fx.actor("ana");
    let fileset = fx.node(TypeTag::Fileset, lab, owner);
    let image_a = fx.node(TypeTag::Image, lab, owner);
    let image_b = fx.node(TypeTag::Image, lab, owner);
    fx.bundle(fileset, image_a);
    fx.bundle(fileset, image_b);

    let graph = fx.graph();
    assert_eq!(graph.bundle_group_count(fileset).unwrap(), 1);
    graph.reassign_node(image_b, other, owner).unwrap();
    assert_eq!(graph.bundle_group_count(fileset).unwrap(), 2);
}

#[test]
fn annotation_queries_cover_both_directions() {
    let fx = Fixture::new();
    let group = fx.group("lab", PermissionLevel::ReadAnnotate);
    let owner = fx.actor("ana");
    let image_a = fx.node(TypeTag::Image, group, owner);
    let image_b = fx.node(TypeTag::Image, group, owner);
    let tag = fx.node(TypeTag::TagAnnotation, group, owner);
    fx.annotate(image_a, tag);
    fx.annotate(image_b, tag);

    let graph = fx.graph();
    let links = graph.annotation_links_of(image_a).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].annotation.id, tag);
    assert_eq!(links[0].link.kind, LinkKind::Annotation);

    let annotated: Vec<i64> = graph
        .annotated_objects(tag)
        .unwrap()
        .into_iter()
        .map(|node| node.id)
        .collect();
    assert_eq!(annotated, vec![image_a, image_b]);
}

#[test]
fn links_touching_reports_end_groups_and_delete_cascades() {
    let fx = Fixture::new();
    let group = fx.group("lab", PermissionLevel::ReadAnnotate);
    let owner = fx.actor("ana");
    let dataset = fx.node(TypeTag::Dataset, group, owner);
    let image = fx.child(dataset, TypeTag::Image, owner);
    let pixels = fx.child(image, TypeTag::Pixels, owner);

    let graph = fx.graph();
    let touching = graph.links_touching(image).unwrap();
    assert_eq!(touching.len(), 2);
    assert!(touching
        .iter()
        .all(|ends| ends.parent_group_id == group && ends.child_group_id == group));

    graph.delete_node(image).unwrap();
    assert!(fx.exists(dataset));
    assert!(fx.exists(pixels));
    assert_eq!(fx.link_count(), 0);

    let missing = graph.delete_node(image).unwrap_err();
    assert!(matches!(missing, RepoError::NotFound { entity: "node", .. }));
}

#[test]
fn roles_reflect_membership_ownership_and_admin_flag() {
    let fx = Fixture::new();
    let group = fx.group("lab", PermissionLevel::ReadOnly);
    let member = fx.actor("ana");
    let leader = fx.actor("lee");
    let outsider = fx.actor("otto");
    let root = fx.admin("root");
    fx.member(group, member);
    fx.group_owner(group, leader);

    let security = fx.security();
    assert_eq!(security.role_of(member, group).unwrap(), Some(Role::Member));
    assert_eq!(security.role_of(leader, group).unwrap(), Some(Role::GroupOwner));
    assert_eq!(security.role_of(outsider, group).unwrap(), None);
    assert_eq!(
        security.role_of(root, group).unwrap(),
        Some(Role::Administrator)
    );
    assert!(!security.is_member(root, group).unwrap());

    fx.group_owner(group, member);
    assert_eq!(security.role_of(member, group).unwrap(), Some(Role::GroupOwner));
}

#[test]
fn private_groups_hide_other_members_nodes() {
    let fx = Fixture::new();
    let group = fx.group("vault", PermissionLevel::Private);
    let ana = fx.actor("ana");
    let bob = fx.actor("bob");
    fx.member(group, ana);
    fx.member(group, bob);
    let image = fx.node(TypeTag::Image, group, ana);
    let node = fx.graph().load_node(image).unwrap().unwrap();

    let security = fx.security();
    assert!(security.has_read_access(ana, &node).unwrap());
    assert!(!security.has_read_access(bob, &node).unwrap());
    assert!(security.has_write_access(ana, &node).unwrap());
    assert!(!security.has_write_access(bob, &node).unwrap());
}

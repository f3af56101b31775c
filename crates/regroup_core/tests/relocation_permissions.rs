mod common;

use common::{Fixture, TwoGroups};
use regroup_core::{
    ErrorKind, ErrorResponse, MoveRequest, PermissionLevel, RelocationError, SessionContext,
    TypeTag,
};

#[test]
fn actor_must_belong_to_the_destination() {
    let mut env = TwoGroups::new();
    let fx = &mut env.fx;
    let outsider = fx.actor("outsider");
    fx.member(env.source, outsider);
    let image = fx.node(TypeTag::Image, env.source, outsider);

    let request = MoveRequest::new(TypeTag::Image, vec![image], env.destination);
    let err = fx
        .service()
        .move_graph(&SessionContext::all_groups(outsider), &request)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(fx.group_of(image), Some(env.source));
}

#[test]
fn members_cannot_move_each_others_objects() {
    let mut env = TwoGroups::new();
    let fx = &mut env.fx;
    let other = fx.actor("other");
    fx.member(env.source, other);
    let own = fx.node(TypeTag::Image, env.source, env.user);
    let foreign = fx.node(TypeTag::Image, env.source, other);
    let before = fx.node_rows();

    let request = MoveRequest::new(TypeTag::Image, vec![own, foreign], env.destination);
    let err = fx
        .service()
        .move_graph(&SessionContext::all_groups(env.user), &request)
        .unwrap_err();

    assert!(matches!(err, RelocationError::PermissionDenied { .. }));
    assert_eq!(fx.node_rows(), before);
}

#[test]
fn group_owner_may_move_members_objects() {
    let mut env = TwoGroups::new();
    let fx = &mut env.fx;
    let leader = fx.actor("leader");
    fx.group_owner(env.source, leader);
    fx.member(env.destination, leader);
    let dataset = fx.node(TypeTag::Dataset, env.source, env.user);
    let image = fx.child(dataset, TypeTag::Image, env.user);

    let request = MoveRequest::new(TypeTag::Dataset, vec![dataset], env.destination);
    fx.service()
        .move_graph(&SessionContext::all_groups(leader), &request)
        .unwrap();

    assert_eq!(fx.group_of(image), Some(env.destination));
    assert_eq!(fx.owner_of(image), Some(env.user));
}

#[test]
fn private_group_objects_are_invisible_to_other_members() {
    let mut env = TwoGroups::with_levels(PermissionLevel::Private, PermissionLevel::ReadAnnotate);
    let fx = &mut env.fx;
    let other = fx.actor("other");
    fx.member(env.source, other);
    fx.member(env.destination, other);
    let image = fx.node(TypeTag::Image, env.source, env.user);

    let request = MoveRequest::new(TypeTag::Image, vec![image], env.destination);
    let err = fx
        .service()
        .move_graph(&SessionContext::all_groups(other), &request)
        .unwrap_err();

    match err {
        RelocationError::NotFound { ids } => assert_eq!(ids, vec![image]),
        other => panic!("unexpected error: {other}"),
    }
}

/// Ana owns an image in a shared group; `vault` is private and only Vic
/// belongs to it.
struct Vault {
    fx: Fixture,
    vault: i64,
    ana: i64,
    vic: i64,
    root: i64,
    image: i64,
    pixels: i64,
}

impl Vault {
    fn new() -> Self {
        let fx = Fixture::new();
        let lab = fx.group("lab", PermissionLevel::ReadAnnotate);
        let vault = fx.group("vault", PermissionLevel::Private);
        let ana = fx.actor("ana");
        let vic = fx.actor("vic");
        let root = fx.admin("root");
        fx.member(lab, ana);
        fx.member(vault, vic);
        let image = fx.node(TypeTag::Image, lab, ana);
        let pixels = fx.child(image, TypeTag::Pixels, ana);
        Self {
            fx,
            vault,
            ana,
            vic,
            root,
            image,
            pixels,
        }
    }

    fn request(&self) -> MoveRequest {
        MoveRequest::new(TypeTag::Image, vec![self.image], self.vault)
    }
}

#[test]
fn private_destination_rejects_foreign_owners() {
    let mut env = Vault::new();
    let request = env.request();
    let err = env
        .fx
        .service()
        .move_graph(&SessionContext::all_groups(env.root), &request)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(env.fx.owner_of(env.image), Some(env.ana));
}

#[test]
fn administrator_can_reassign_owners_into_a_private_group() {
    let mut env = Vault::new();
    let request = env.request().with_owner_override(env.ana, env.vic);
    let report = env
        .fx
        .service()
        .move_graph(&SessionContext::all_groups(env.root), &request)
        .unwrap();

    for id in [env.image, env.pixels] {
        assert_eq!(env.fx.group_of(id), Some(env.vault));
        assert_eq!(env.fx.owner_of(id), Some(env.vic));
        assert_eq!(report.reowned.get(&id), Some(&env.vic));
    }
}

#[test]
fn owner_overrides_are_admin_only_and_target_members() {
    let mut env = Vault::new();
    env.fx.member(env.vault, env.ana);
    let session = SessionContext::all_groups(env.ana);
    let request = env.request().with_owner_override(env.ana, env.vic);
    let err = env.fx.service().move_graph(&session, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let stranger = env.fx.actor("stranger");
    let request = env.request().with_owner_override(env.ana, stranger);
    let err = env
        .fx
        .service()
        .move_graph(&SessionContext::all_groups(env.root), &request)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_ne!(env.fx.group_of(env.image), Some(env.vault));
    assert_ne!(env.fx.group_of(env.pixels), Some(env.vault));
    assert_eq!(env.fx.owner_of(env.image), Some(env.ana));
}

#[test]
fn error_response_names_the_failure() {
    let mut env = TwoGroups::new();
    let fx = &mut env.fx;
    let image = fx.node(TypeTag::Image, env.source, env.user);
    let request = MoveRequest::new(TypeTag::Dataset, vec![image], env.destination);
    let err = fx
        .service()
        .move_graph(&SessionContext::all_groups(env.user), &request)
        .unwrap_err();

    let response = ErrorResponse::from(&err);
    assert_eq!(response.kind, ErrorKind::NotFound);
    assert_eq!(response.code, "not_found");
    assert_eq!(response.node_ids, vec![image]);

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["kind"], "not_found");
    assert_eq!(json["node_ids"][0], image);
}

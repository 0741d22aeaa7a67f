use super::*;
use crate::ids::PathId;
use crate::path_graph::Path;
use geo_types::{LineString, line_string};
use serde_json::json;
use std::collections::BTreeSet;

const TOL: f64 = 0.01;

fn insert(network: &mut Network, id: u64, geom: LineString) {
    network.insert_path(Path::new(PathId(id), geom).unwrap());
}

/// A and B only connect through C.
fn bridged() -> Network {
    let mut network = Network::new();
    insert(&mut network, 1, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]);
    insert(&mut network, 2, line_string![(x: 10.0, y: 10.0), (x: 20.0, y: 10.0)]);
    insert(&mut network, 3, line_string![(x: 10.0, y: 0.0), (x: 10.0, y: 10.0)]);
    network
}

fn paths_of(route: &Route) -> Vec<Vec<PathId>> {
    route.serialized().into_iter().map(|s| s.paths).collect()
}

#[test]
fn bridge_route_lists_every_path() {
    let network = bridged();
    let route = route(
        &network,
        &[Step::new(PathId(1), 0.0), Step::new(PathId(2), 1.0)],
        TOL,
    )
    .unwrap();
    assert_eq!(paths_of(&route), vec![vec![PathId(1), PathId(3), PathId(2)]]);
    assert_eq!(route.length(), 30.0);
    let serialized = &route.serialized()[0];
    assert_eq!(serialized.positions.get(&0), Some(&[0.0, 1.0]));
    assert_eq!(serialized.positions.get(&2), Some(&[0.0, 1.0]));
    assert_eq!(
        route.legs[0].geometry,
        line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 20.0, y: 10.0)]
    );
}

#[test]
fn reversed_request_walks_same_edges_backwards() {
    let network = bridged();
    let a = Step::new(PathId(1), 0.3);
    let b = Step::new(PathId(2), 0.6);
    let forward = route(&network, &[a, b], TOL).unwrap();
    let backward = route(&network, &[b, a], TOL).unwrap();

    assert!((forward.length() - backward.length()).abs() < 1e-9);
    let edges = |r: &Route| r.legs[0].pieces.iter().map(|p| p.path).collect::<BTreeSet<_>>();
    assert_eq!(edges(&forward), edges(&backward));

    let mut reversed = backward.legs[0].geometry.0.clone();
    reversed.reverse();
    assert_eq!(forward.legs[0].geometry.0, reversed);
    assert_eq!(backward.legs[0].pieces[0].start, 0.6);
    assert_eq!(backward.legs[0].pieces[0].end, 0.0);
}

#[test]
fn disconnected_paths_have_no_route() {
    let mut network = Network::new();
    insert(&mut network, 1, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]);
    insert(&mut network, 2, line_string![(x: 50.0, y: 0.0), (x: 60.0, y: 0.0)]);
    let err = route(
        &network,
        &[Step::new(PathId(1), 0.5), Step::new(PathId(2), 0.5)],
        TOL,
    )
    .unwrap_err();
    assert_eq!(err, RoutingError::NoPath);
    assert_eq!(err.to_string(), "No path between the given points");
    assert_eq!(err.status_code(), 400);
}

#[test]
fn same_path_steps_use_the_direct_stretch() {
    let network = bridged();
    let route = route(
        &network,
        &[Step::new(PathId(1), 0.7), Step::new(PathId(1), 0.2)],
        TOL,
    )
    .unwrap();
    assert_eq!(
        route.legs[0].pieces,
        vec![Piece {
            path: PathId(1),
            start: 0.7,
            end: 0.2
        }]
    );
    assert!((route.length() - 5.0).abs() < 1e-9);
}

#[test]
fn drafts_and_hidden_paths_are_skipped_until_published() {
    let mut network = bridged();
    // A shortcut from A's far end straight to B's end.
    let mut shortcut = Path::new(
        PathId(4),
        line_string![(x: 10.0, y: 0.0), (x: 20.0, y: 10.0)],
    ).unwrap();
    shortcut.draft = true;
    network.insert_path(shortcut);
    let steps = [Step::new(PathId(1), 0.0), Step::new(PathId(2), 1.0)];

    let through_bridge = route(&network, &steps, TOL).unwrap();
    assert_eq!(paths_of(&through_bridge), vec![vec![PathId(1), PathId(3), PathId(2)]]);

    network.path_mut(PathId(4)).unwrap().draft = false;
    let through_shortcut = route(&network, &steps, TOL).unwrap();
    assert_eq!(paths_of(&through_shortcut), vec![vec![PathId(1), PathId(4), PathId(2)]]);

    network.path_mut(PathId(4)).unwrap().visible = false;
    assert_eq!(
        paths_of(&route(&network, &steps, TOL).unwrap()),
        vec![vec![PathId(1), PathId(3), PathId(2)]]
    );
}

#[test]
fn step_on_draft_path_has_no_route() {
    let mut network = bridged();
    network.path_mut(PathId(3)).unwrap().draft = true;
    assert_eq!(
        route(
            &network,
            &[Step::new(PathId(3), 0.5), Step::new(PathId(1), 0.5)],
            TOL
        ),
        Err(RoutingError::NoPath)
    );
}

#[test]
fn every_step_pair_becomes_a_leg() {
    let network = bridged();
    let body = json!({"steps": [
        {"path_id": 1, "positionOnPath": 0.5},
        {"path_id": 3, "positionOnPath": 0.5},
        {"path_id": 2, "positionOnPath": 0.5}
    ]});
    let route = route_request(&network, &body, TOL).unwrap();
    assert_eq!(route.legs.len(), 2);
    assert_eq!(paths_of(&route), vec![
        vec![PathId(1), PathId(3)],
        vec![PathId(3), PathId(2)]
    ]);
    assert_eq!(route.geometry().0.len(), 2);
    assert!((route.length() - 20.0).abs() < 1e-9);
}

#[test]
fn request_errors_surface_unchanged() {
    let network = bridged();
    assert_eq!(
        route_request(&network, &json!({"steps": []}), TOL),
        Err(RoutingError::TooFewSteps)
    );
}

#[test]
fn steps_built_in_code_are_validated_like_requests() {
    let network = bridged();
    let cases = [
        (vec![Step::new(PathId(1), 0.5)], RoutingError::TooFewSteps),
        (
            vec![Step::new(PathId(1), 1.5), Step::new(PathId(2), 0.5)],
            RoutingError::InvalidPosition,
        ),
        (
            vec![Step::new(PathId(1), 0.5), Step::new(PathId(2), f64::NAN)],
            RoutingError::InvalidPosition,
        ),
        (
            vec![Step::new(PathId(1), -0.1), Step::new(PathId(2), 0.5)],
            RoutingError::InvalidPosition,
        ),
        (
            vec![Step::new(PathId(1), 0.5), Step::new(PathId(99), 0.5)],
            RoutingError::InvalidPathId,
        ),
        // Path ids are checked before positions.
        (
            vec![Step::new(PathId(1), 7.0), Step::new(PathId(99), 0.5)],
            RoutingError::InvalidPathId,
        ),
    ];
    for (steps, expected) in cases {
        let err = route(&network, &steps, TOL).unwrap_err();
        assert_eq!(err, expected, "{steps:?}");
        assert_eq!(err.kind(), RoutingErrorKind::Validation);
        assert_eq!(err.status_code(), 400);
    }
}

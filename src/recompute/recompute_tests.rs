use super::*;
use crate::config::EngineConfig;
use crate::geometry_utils::point_at_position;
use crate::ids::PathId;
use crate::path_graph::{MergeError, Path, PathInput, delete_path, merge_paths, save_path};
use crate::topology::{TopologyGeometry, TopologyKind, add_path, create};
use geo_types::{Coord, LineString, line_string};

const TOL: f64 = 0.01;

fn insert(network: &mut Network, id: u64, geom: LineString) {
    network.insert_path(Path::new(PathId(id), geom).unwrap());
}

fn positions(network: &Network, topology: TopologyId) -> Vec<(PathId, f64, f64)> {
    network
        .aggregations_of(topology)
        .iter()
        .map(|a| (a.path, a.start_position, a.end_position))
        .collect()
}

fn coord_at(network: &Network, path: PathId, position: f64) -> Coord {
    point_at_position(network.path(path).unwrap().geom(), position).unwrap()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

fn line(network: &mut Network, segments: &[(u64, f64, f64)]) -> TopologyId {
    let id = create(network, TopologyKind::line("trek"));
    for &(path, start, end) in segments {
        add_path(network, id, PathId(path), start, end).unwrap();
    }
    refresh_geometry(network, id, TOL).unwrap();
    id
}

#[test]
fn identical_resave_leaves_positions_untouched() {
    let config = EngineConfig::default();
    let mut network = Network::new();
    save_path(
        &mut network,
        PathInput::new(line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 1.0), (x: 10.0, y: 0.0)]),
        &config,
    )
    .unwrap();
    let topo = line(&mut network, &[(1, 0.137, 0.861)]);
    let before_positions = positions(&network, topo);
    let before_geom = network.topology(topo).unwrap().geom.clone();

    let geom = network.path(PathId(1)).unwrap().geom().clone();
    let (_, events) = save_path(
        &mut network,
        PathInput::new(geom).with_id(PathId(1)),
        &config,
    )
    .unwrap();
    apply_events(&mut network, &events, TOL).unwrap();

    assert_eq!(positions(&network, topo), before_positions);
    assert_eq!(network.topology(topo).unwrap().geom, before_geom);
}

#[test]
fn geometry_change_reprojects_and_pins_path_ends() {
    let config = EngineConfig::default();
    let mut network = Network::new();
    save_path(
        &mut network,
        PathInput::new(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
        &config,
    )
    .unwrap();
    let head = line(&mut network, &[(1, 0.0, 0.5)]);
    let tail = line(&mut network, &[(1, 0.5, 1.0)]);

    let (_, events) = save_path(
        &mut network,
        PathInput::new(line_string![(x: 0.0, y: 0.0), (x: 20.0, y: 0.0)]).with_id(PathId(1)),
        &config,
    )
    .unwrap();
    let outcome = apply_events(&mut network, &events, TOL).unwrap();
    assert_eq!(outcome.touched.len(), 2);

    assert_eq!(positions(&network, head), vec![(PathId(1), 0.0, 0.25)]);
    assert_eq!(positions(&network, tail), vec![(PathId(1), 0.25, 1.0)]);
    assert_eq!(network.topology(tail).unwrap().length, 15.0);
}

#[test]
fn crossing_split_keeps_physical_extent() {
    let config = EngineConfig::default();
    let mut network = Network::new();
    save_path(
        &mut network,
        PathInput::new(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
        &config,
    )
    .unwrap();
    let topo = line(&mut network, &[(1, 0.2, 0.8)]);
    let (report, events) = save_path(
        &mut network,
        PathInput::new(line_string![(x: 5.0, y: -5.0), (x: 5.0, y: 5.0)]),
        &config,
    )
    .unwrap();
    assert_eq!(report.split_paths.len(), 2);
    apply_events(&mut network, &events, TOL).unwrap();

    let segments = positions(&network, topo);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].0, PathId(1));
    assert_close(segments[0].1, 0.4);
    assert_close(segments[0].2, 1.0);
    assert_eq!(segments[1].0, PathId(3));
    assert_close(segments[1].1, 0.0);
    assert_close(segments[1].2, 0.6);
    let TopologyGeometry::Line(geom) = &network.topology(topo).unwrap().geom else {
        panic!("expected a single line");
    };
    let xs: Vec<f64> = geom.0.iter().map(|c| c.x).collect();
    assert_eq!(xs.len(), 3);
    for (x, expected) in xs.iter().zip([2.0, 5.0, 8.0]) {
        assert_close(*x, expected);
    }
}

#[test]
fn merge_keeps_absolute_coordinates() {
    let mut network = Network::new();
    insert(&mut network, 1, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]);
    insert(&mut network, 2, line_string![(x: 4.0, y: 0.0), (x: 1.0, y: 0.0)]);
    let poi = create(&mut network, TopologyKind::point("poi"));
    add_path(&mut network, poi, PathId(1), 0.5, 0.5).unwrap();
    let trek = line(&mut network, &[(2, 0.0, 1.0), (1, 1.0, 0.25)]);
    let before: Vec<Coord> = positions(&network, trek)
        .iter()
        .flat_map(|&(p, s, e)| [coord_at(&network, p, s), coord_at(&network, p, e)])
        .collect();

    let (_, event) = merge_paths(&mut network, &[PathId(1), PathId(2)], TOL).unwrap();
    apply_events(&mut network, &[event], TOL).unwrap();

    let point = positions(&network, poi);
    assert_eq!(point[0].0, PathId(1));
    assert_close(point[0].1, 0.125);
    let after: Vec<Coord> = positions(&network, trek)
        .iter()
        .flat_map(|&(p, s, e)| [coord_at(&network, p, s), coord_at(&network, p, e)])
        .collect();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_close(b.x, a.x);
        assert_close(b.y, a.y);
    }
}

fn endpoints_of(network: &Network, topology: TopologyId) -> Vec<Coord> {
    positions(network, topology)
        .iter()
        .flat_map(|&(p, s, e)| [coord_at(network, p, s), coord_at(network, p, e)])
        .collect()
}

#[test]
fn merge_in_every_orientation_keeps_absolute_coordinates() {
    // Path 1 always lies on x in [0, 4]; path 2 on x in [4, 10]. The junction is (4, 0).
    let a_forward = line_string![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 4.0, y: 0.0)];
    let a_backward = line_string![(x: 4.0, y: 0.0), (x: 2.0, y: 0.0), (x: 0.0, y: 0.0)];
    let b_forward = line_string![(x: 4.0, y: 0.0), (x: 10.0, y: 0.0)];
    let b_backward = line_string![(x: 10.0, y: 0.0), (x: 4.0, y: 0.0)];
    let cases = [
        ("end to start", a_forward.clone(), b_forward.clone()),
        ("end to end", a_forward, b_backward.clone()),
        ("start to start", a_backward.clone(), b_forward),
        ("start to end", a_backward, b_backward),
    ];

    for (name, a, b) in cases {
        let mut network = Network::new();
        insert(&mut network, 1, a);
        insert(&mut network, 2, b);
        let poi = create(&mut network, TopologyKind::point("poi"));
        add_path(&mut network, poi, PathId(2), 0.25, 0.25).unwrap();
        let trek = line(&mut network, &[(1, 0.1, 0.9), (2, 0.2, 0.7)]);
        let before_trek = endpoints_of(&network, trek);
        let before_poi = endpoints_of(&network, poi);

        let (kept, event) = merge_paths(&mut network, &[PathId(1), PathId(2)], TOL).unwrap();
        assert_eq!(kept, PathId(1), "{name}");
        apply_events(&mut network, &[event], TOL).unwrap();

        assert!(network.path(PathId(2)).is_none(), "{name}");
        assert_close(network.path(PathId(1)).unwrap().length(), 10.0);
        assert!(network.aggregations_on(PathId(2)).is_empty(), "{name}");
        assert!(positions(&network, trek).iter().all(|s| s.0 == PathId(1)), "{name}");
        for (before, after) in [
            (before_trek, endpoints_of(&network, trek)),
            (before_poi, endpoints_of(&network, poi)),
        ] {
            assert_eq!(before.len(), after.len(), "{name}");
            for (b, a) in before.iter().zip(&after) {
                assert!((b.x - a.x).abs() < 1e-9 && (b.y - a.y).abs() < 1e-9, "{name}: {b:?} != {a:?}");
            }
        }
    }
}

#[test]
fn merge_across_structures_is_refused_before_any_change() {
    let mut network = Network::new();
    insert(&mut network, 1, line_string![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0)]);
    let mut other = Path::new(PathId(2), line_string![(x: 4.0, y: 0.0), (x: 10.0, y: 0.0)]).unwrap();
    other.structure = Some("park".to_string());
    network.insert_path(other);
    let trek = line(&mut network, &[(1, 0.0, 1.0), (2, 0.0, 1.0)]);
    let before = positions(&network, trek);

    assert_eq!(
        merge_paths(&mut network, &[PathId(1), PathId(2)], TOL),
        Err(MergeError::StructureMismatch(PathId(1), PathId(2)))
    );
    assert_eq!(network.path_count(), 2);
    assert_eq!(positions(&network, trek), before);
}

#[test]
fn deleting_last_path_soft_deletes_topology() {
    let mut network = Network::new();
    insert(&mut network, 1, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]);
    insert(&mut network, 2, line_string![(x: 10.0, y: 0.0), (x: 20.0, y: 0.0)]);
    let alone = line(&mut network, &[(1, 0.0, 1.0)]);
    let shared = line(&mut network, &[(1, 0.5, 1.0), (2, 0.0, 1.0)]);
    network.topology_mut(alone).unwrap().published = Some(true);

    let event = delete_path(&mut network, PathId(1)).unwrap();
    let outcome = apply_events(&mut network, &[event], TOL).unwrap();

    assert!(outcome.deleted.contains(&alone));
    assert!(!outcome.deleted.contains(&shared));
    let deleted = network.topology(alone).unwrap();
    assert!(deleted.deleted);
    assert_eq!(deleted.geom, TopologyGeometry::Empty);
    assert_eq!(deleted.published, Some(false));
    assert!(!network.topology(shared).unwrap().deleted);
    assert_eq!(positions(&network, shared), vec![(PathId(2), 0.0, 1.0)]);
    assert_eq!(network.topology(shared).unwrap().length, 10.0);
}

#[test]
fn reorder_restores_traversal_and_is_idempotent() {
    let mut network = Network::new();
    insert(&mut network, 1, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]);
    insert(&mut network, 2, line_string![(x: 10.0, y: 0.0), (x: 20.0, y: 0.0)]);
    insert(&mut network, 3, line_string![(x: 20.0, y: 0.0), (x: 30.0, y: 0.0)]);
    let topo = line(&mut network, &[(3, 0.0, 1.0), (1, 0.0, 1.0), (2, 0.0, 1.0)]);
    assert!(network.topology(topo).unwrap().geom.is_multi_part());

    let first = reorder_topologies(&mut network, TOL);
    assert_eq!(first.examined, 1);
    assert_eq!(first.reordered, vec![topo]);
    assert!(first.failures.is_empty());
    let order: Vec<PathId> = positions(&network, topo).iter().map(|s| s.0).collect();
    assert_eq!(order, vec![PathId(1), PathId(2), PathId(3)]);
    assert_eq!(
        network.topology(topo).unwrap().geom,
        TopologyGeometry::Line(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 20.0, y: 0.0), (x: 30.0, y: 0.0)])
    );

    let snapshot = positions(&network, topo);
    let second = reorder_topologies(&mut network, TOL);
    assert!(second.reordered.is_empty());
    assert_eq!(positions(&network, topo), snapshot);
}

#[test]
fn reorder_reports_disconnected_topology_without_touching_it() {
    let mut network = Network::new();
    insert(&mut network, 1, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]);
    insert(&mut network, 3, line_string![(x: 20.0, y: 0.0), (x: 30.0, y: 0.0)]);
    let broken = line(&mut network, &[(3, 0.0, 1.0), (1, 0.0, 1.0)]);
    let fine = line(&mut network, &[(1, 0.0, 1.0)]);
    let before = positions(&network, broken);

    let report = reorder_topologies(&mut network, TOL);
    assert_eq!(report.examined, 2);
    assert_eq!(
        report.failures,
        vec![ReorderFailure {
            topology: broken,
            reason: reorder::ReorderIssue::Disconnected,
        }]
    );
    assert!(report.reordered.is_empty());
    assert_eq!(positions(&network, broken), before);
    assert!(!network.topology(fine).unwrap().deleted);
}

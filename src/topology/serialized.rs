// Persisted shape of a topology, shared by forms and exports.
use super::TopologyError;
use crate::ids::{PathId, TopologyId};
use crate::network::Network;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `{offset, paths: [id...], positions: {index: [start, end]}}`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SerializedTopology {
    #[serde(default)]
    pub offset: f64,
    pub paths: Vec<PathId>,
    /// Keyed by index into `paths`. Missing entries mean the whole path.
    #[serde(default)]
    pub positions: BTreeMap<usize, [f64; 2]>,
}

/// Everything `deserialize` accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TopologySpec {
    Coordinates { lat: f64, lng: f64 },
    Single(SerializedTopology),
    /// One entry per routed leg, concatenated in order.
    Legs(Vec<SerializedTopology>),
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl TopologySpec {
    pub fn from_json(source: &str) -> Result<Self, TopologyError> {
        serde_json::from_str(source).map_err(|e| TopologyError::InvalidSpec(e.to_string()))
    }

    // Dispatch on the JSON shape by hand: derived untagged enums buffer their
    // input and then refuse the string keys of `positions`.
    fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let coordinates = matches!(
            &value,
            Value::Object(map) if map.contains_key("lat") || map.contains_key("lng")
        );
        if value.is_array() {
            Ok(TopologySpec::Legs(serde_json::from_value(value)?))
        } else if coordinates {
            let LatLng { lat, lng } = serde_json::from_value(value)?;
            Ok(TopologySpec::Coordinates { lat, lng })
        } else {
            Ok(TopologySpec::Single(serde_json::from_value(value)?))
        }
    }
}

impl<'de> Deserialize<'de> for TopologySpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        TopologySpec::from_value(value).map_err(serde::de::Error::custom)
    }
}

pub fn serialize(network: &Network, id: TopologyId) -> Result<SerializedTopology, TopologyError> {
    let topology = network
        .topology(id)
        .ok_or(TopologyError::UnknownTopology(id))?;
    let aggregations = network.aggregations_of(id);
    Ok(SerializedTopology {
        offset: topology.offset,
        paths: aggregations.iter().map(|a| a.path).collect(),
        positions: aggregations
            .iter()
            .enumerate()
            .map(|(i, a)| (i, [a.start_position, a.end_position]))
            .collect(),
    })
}

// Step list validation for routing requests.
use crate::ids::PathId;
use crate::network::Network;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    #[error("There must be at least 2 steps")]
    TooFewSteps,
    #[error("Each step should contain a valid path id")]
    InvalidPathId,
    #[error("Each step should contain a valid position on its associated path")]
    InvalidPosition,
    #[error("No path between the given points")]
    NoPath,
    /// Unexpected failure, carrying the underlying message.
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingErrorKind {
    Validation,
    Graph,
    Internal,
}

impl RoutingError {
    pub fn kind(&self) -> RoutingErrorKind {
        match self {
            RoutingError::TooFewSteps
            | RoutingError::InvalidPathId
            | RoutingError::InvalidPosition => RoutingErrorKind::Validation,
            RoutingError::NoPath => RoutingErrorKind::Graph,
            RoutingError::Internal(_) => RoutingErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            RoutingErrorKind::Validation | RoutingErrorKind::Graph => 400,
            RoutingErrorKind::Internal => 500,
        }
    }
}

/// A position on a path the route has to go through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub path: PathId,
    pub position: f64,
}

impl Step {
    pub fn new(path: PathId, position: f64) -> Self {
        Self { path, position }
    }
}

// Numbers and numeric strings are both accepted, as form posts send strings.
fn as_path_id(value: Option<&Value>) -> Option<PathId> {
    match value? {
        Value::Number(n) => n.as_u64().map(PathId),
        Value::String(s) => s.trim().parse::<u64>().ok().map(PathId),
        _ => None,
    }
}

fn as_position(value: Option<&Value>) -> Option<f64> {
    let position = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    valid_position(position).then_some(position)
}

fn valid_position(position: f64) -> bool {
    position.is_finite() && (0.0..=1.0).contains(&position)
}

/// Same checks, same order as [`parse_steps`], for steps built in code.
pub fn validate_steps(network: &Network, steps: &[Step]) -> Result<(), RoutingError> {
    if steps.len() < 2 {
        return Err(RoutingError::TooFewSteps);
    }
    if steps.iter().any(|step| network.path(step.path).is_none()) {
        return Err(RoutingError::InvalidPathId);
    }
    if !steps.iter().all(|step| valid_position(step.position)) {
        return Err(RoutingError::InvalidPosition);
    }
    Ok(())
}

/// Validate `{"steps": [{"path_id": .., "positionOnPath": ..}, ..]}`.
/// Checks run in a fixed order: step count, then every path id, then every position.
pub fn parse_steps(network: &Network, body: &Value) -> Result<Vec<Step>, RoutingError> {
    let steps = body
        .get("steps")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if steps.len() < 2 {
        return Err(RoutingError::TooFewSteps);
    }

    let paths = steps
        .iter()
        .map(|step| {
            as_path_id(step.get("path_id"))
                .filter(|id| network.path(*id).is_some())
                .ok_or(RoutingError::InvalidPathId)
        })
        .collect::<Result<Vec<_>, _>>()?;

    steps
        .iter()
        .zip(paths)
        .map(|(step, path)| {
            as_position(step.get("positionOnPath"))
                .map(|position| Step::new(path, position))
                .ok_or(RoutingError::InvalidPosition)
        })
        .collect()
}

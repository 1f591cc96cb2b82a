//! Strategy file loading.

use std::collections::HashSet;
use std::path::Path;

use model::StrategyDefinition;

use crate::error::EngineError;

/// Load and validate the strategy file: a JSON array of strategy objects.
///
/// Unknown fields, missing fields, field-level constraint violations, and
/// duplicate ids are all rejected.
pub fn load_strategies(path: &Path) -> Result<Vec<StrategyDefinition>, EngineError> {
    let contents = std::fs::read_to_string(path).map_err(|source| EngineError::StrategyFile {
        path: path.to_path_buf(),
        source,
    })?;

    let definitions: Vec<StrategyDefinition> =
        serde_json::from_str(&contents).map_err(|source| EngineError::StrategyFileFormat {
            path: path.to_path_buf(),
            source,
        })?;

    let mut seen = HashSet::new();
    for definition in &definitions {
        definition.validate()?;
        if !seen.insert(definition.strategy_id.clone()) {
            return Err(EngineError::DuplicateStrategyId(
                definition.strategy_id.clone(),
            ));
        }
    }

    Ok(definitions)
}

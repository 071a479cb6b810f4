use thiserror::Error;

/// Errors surfaced by the map pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required dataset is missing or malformed. Fatal: the pipeline
    /// cannot run without its base datasets.
    #[error("failed to load dataset `{name}`")]
    DatasetLoad {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// No grid cell of the selected commune is covered by both the
    /// isochrone set and the point-of-interest set. Recoverable: shown to
    /// the user as a warning until another commune is selected.
    #[error("no available grid cell for commune `{commune}`")]
    EmptySelection { commune: String },

    /// The selected cell identifier matched zero or several grid cells.
    /// Cell identifiers are unique, so this indicates corrupt input data.
    #[error("grid cell `{cell_id}` matched {matches} cells, expected exactly one")]
    AmbiguousOrMissingCell { cell_id: String, matches: usize },

    /// The selected cell is not among the selectable cells of the selected
    /// commune. Rendering anyway would overlay another commune's data.
    #[error("grid cell `{cell_id}` is not selectable for commune `{commune}`")]
    UnselectableCell { commune: String, cell_id: String },
}

impl PipelineError {
    pub fn dataset_load(name: impl Into<String>, source: anyhow::Error) -> Self {
        PipelineError::DatasetLoad {
            name: name.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection_names_commune() {
        let err = PipelineError::EmptySelection {
            commune: "Lyon".to_string(),
        };
        assert!(err.to_string().contains("Lyon"));
    }

    #[test]
    fn test_dataset_load_names_dataset() {
        let err = PipelineError::dataset_load(
            "carreaux.geojson",
            anyhow::anyhow!("no such file"),
        );
        assert!(err.to_string().contains("carreaux.geojson"));
    }
}

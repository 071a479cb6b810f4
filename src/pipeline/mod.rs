pub mod compose;
pub mod filter;

use log::{debug, warn};

pub use compose::{ComposeOptions, MapSpec, PointScope};
pub use filter::Selection;

use crate::dataset::store::Datasets;
use crate::error::PipelineError;

/// Run the whole pipeline for one selection: resolve the commune's
/// isochrones, walk the filter chain, derive the cell centroid and compose
/// the map. Pure over its inputs, so any UI layer (or none) can call it.
pub fn render_map(
    datasets: &Datasets,
    selection: &Selection,
    options: &ComposeOptions,
) -> Result<MapSpec, PipelineError> {
    // A commune without its own isochrone resource is "no data for this
    // commune", the same recoverable outcome as an empty intersection.
    let isochrones = match datasets.isochrones.resolve(&selection.commune) {
        Ok(isochrones) => isochrones,
        Err(PipelineError::DatasetLoad { name, source }) => {
            warn!(
                "No isochrone dataset for commune `{}` ({}: {:#})",
                selection.commune, name, source
            );
            return Err(PipelineError::EmptySelection {
                commune: selection.commune.clone(),
            });
        }
        Err(other) => return Err(other),
    };

    // The triple intersection must be non-empty before anything renders.
    let cells = filter::cell_options(
        &selection.commune,
        &datasets.conversion,
        &isochrones,
        &datasets.points,
    )?;
    debug!(
        "{} selectable cells for commune `{}`",
        cells.len(),
        selection.commune
    );

    // The UI only offers valid cells, but the pipeline re-checks so a
    // stale or cross-commune cell id cannot mix data on the map.
    if !cells.contains(&selection.cell_id) {
        return Err(PipelineError::UnselectableCell {
            commune: selection.commune.clone(),
            cell_id: selection.cell_id.clone(),
        });
    }

    let view = filter::filtered_view(&isochrones, selection);
    let centroid = datasets.grid.centroid_of(&selection.cell_id)?;

    Ok(compose::compose(
        &datasets.points,
        &selection.commune,
        &view,
        centroid,
        options,
    ))
}

use std::collections::BTreeSet;

use crate::dataset::conversion::ConversionTable;
use crate::dataset::isochrone::{Isochrone, IsochroneSet, Profile};
use crate::dataset::points::PointSet;
use crate::error::PipelineError;

/// The current user choice. Fully determined by UI input and recomputed on
/// every change; downstream views are re-derived, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub commune: String,
    pub cell_id: String,
    /// Selected transport profiles; `None` means all available.
    pub profiles: Option<BTreeSet<Profile>>,
    /// Selected time ranges in seconds; `None` means all available.
    pub ranges: Option<BTreeSet<u32>>,
}

impl Selection {
    pub fn new(commune: impl Into<String>, cell_id: impl Into<String>) -> Self {
        Selection {
            commune: commune.into(),
            cell_id: cell_id.into(),
            profiles: None,
            ranges: None,
        }
    }
}

/// First step of the chain: every selectable commune.
pub fn commune_options(conversion: &ConversionTable) -> Vec<String> {
    conversion.communes()
}

/// Second step: the commune's grid cells restricted to those present in
/// both the isochrone set and the point-of-interest set. An empty result
/// halts the chain: rendering a map with partial data is disallowed.
pub fn cell_options(
    commune: &str,
    conversion: &ConversionTable,
    isochrones: &IsochroneSet,
    points: &PointSet,
) -> Result<Vec<String>, PipelineError> {
    let cells: Vec<String> = conversion
        .cells_for(commune)
        .into_iter()
        .filter(|cell| isochrones.contains_cell(cell) && points.contains_cell(cell))
        .collect();

    if cells.is_empty() {
        return Err(PipelineError::EmptySelection {
            commune: commune.to_string(),
        });
    }
    Ok(cells)
}

/// Third step: profile and range choices offered for the commune's
/// isochrone set. Both default to "all selected" in the UI.
pub fn profile_options(isochrones: &IsochroneSet) -> Vec<Profile> {
    isochrones.profiles()
}

pub fn range_options(isochrones: &IsochroneSet) -> Vec<u32> {
    isochrones.ranges()
}

/// Final step: the isochrone rows the map will draw.
pub fn filtered_view<'a>(
    isochrones: &'a IsochroneSet,
    selection: &Selection,
) -> Vec<&'a Isochrone> {
    isochrones.filter(
        &selection.cell_id,
        selection.profiles.as_ref(),
        selection.ranges.as_ref(),
    )
}

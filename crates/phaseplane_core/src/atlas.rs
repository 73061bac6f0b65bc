//! Region lookups against a brain atlas.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AtlasError {
    #[error("no region matches {0:?}")]
    RegionNotFound(String),

    #[error("{count} regions match {name:?}")]
    AmbiguousRegion { name: String, count: usize },

    #[error("malformed atlas response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceSpace {
    /// MNI 152 ICBM 2009c nonlinear asymmetric template.
    Mni152Icbm2009cNonlinearAsymmetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionProps {
    pub centroid_mm: [f64; 3],
    pub is_cortical: bool,
}

/// An atlas with a current region selection.
pub trait Atlas {
    fn select_region(&mut self, name: &str) -> Result<(), AtlasError>;

    /// Properties of the selected region in `space`, one entry per matching map.
    fn region_props(&self, space: ReferenceSpace) -> Result<Vec<RegionProps>, AtlasError>;
}

/// Runs `f` with every `tracing` event on this thread discarded.
pub fn without_logging<R>(f: impl FnOnce() -> R) -> R {
    tracing::subscriber::with_default(tracing::subscriber::NoSubscriber::default(), f)
}

fn lookup<A: Atlas + ?Sized>(atlas: &mut A, roi_name: &str) -> Result<RegionProps, AtlasError> {
    without_logging(|| atlas.select_region(roi_name))?;
    let props = atlas.region_props(ReferenceSpace::Mni152Icbm2009cNonlinearAsymmetric)?;
    match props.as_slice() {
        [single] => Ok(*single),
        other => Err(AtlasError::MalformedResponse(format!(
            "expected one set of region properties, got {}",
            other.len()
        ))),
    }
}

/// Centroid (mm, MNI space) and cortical flag of a region.
///
/// The atlas's own logging is silenced while the region is selected. Lookup failures
/// are logged and reported as a zero centroid that is not cortical.
pub fn region_select_props<A: Atlas + ?Sized>(atlas: &mut A, roi_name: &str) -> ([f64; 3], bool) {
    match lookup(atlas, roi_name) {
        Ok(props) => (props.centroid_mm, props.is_cortical),
        Err(err) => {
            warn!("skipping {roi_name}: {err}");
            ([0.0; 3], false)
        }
    }
}

/// [`region_select_props`] over many regions; a failed region never stops the others.
pub fn region_table<A: Atlas + ?Sized>(atlas: &mut A, names: &[String]) -> Vec<([f64; 3], bool)> {
    names
        .iter()
        .map(|name| region_select_props(atlas, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{region_select_props, region_table, Atlas, AtlasError, ReferenceSpace, RegionProps};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    struct MockAtlas {
        regions: HashMap<String, Vec<RegionProps>>,
        selected: Option<String>,
    }

    impl MockAtlas {
        fn new() -> Self {
            let mut regions = HashMap::new();
            regions.insert(
                "Area hOc1 (V1)".to_string(),
                vec![RegionProps {
                    centroid_mm: [-8.5, -88.0, 4.0],
                    is_cortical: true,
                }],
            );
            regions.insert(
                "Thalamus".to_string(),
                vec![RegionProps {
                    centroid_mm: [10.0, -18.0, 7.0],
                    is_cortical: false,
                }],
            );
            regions.insert("Split".to_string(), vec![]);
            Self {
                regions,
                selected: None,
            }
        }
    }

    impl Atlas for MockAtlas {
        fn select_region(&mut self, name: &str) -> Result<(), AtlasError> {
            tracing::info!(target: "atlas", "selecting {name}");
            if self.regions.contains_key(name) {
                self.selected = Some(name.to_string());
                Ok(())
            } else {
                Err(AtlasError::RegionNotFound(name.to_string()))
            }
        }

        fn region_props(&self, _space: ReferenceSpace) -> Result<Vec<RegionProps>, AtlasError> {
            let name = self
                .selected
                .as_ref()
                .ok_or_else(|| AtlasError::MalformedResponse("no region selected".to_string()))?;
            Ok(self.regions[name].clone())
        }
    }

    /// Counts events per target.
    #[derive(Clone, Default)]
    struct Counter {
        atlas: Arc<AtomicUsize>,
        other: Arc<AtomicUsize>,
    }

    impl<S: Subscriber> Layer<S> for Counter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if event.metadata().target() == "atlas" {
                self.atlas.fetch_add(1, Ordering::SeqCst);
            } else {
                self.other.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn known_region_returns_its_properties() {
        let mut atlas = MockAtlas::new();
        assert_eq!(
            region_select_props(&mut atlas, "Area hOc1 (V1)"),
            ([-8.5, -88.0, 4.0], true)
        );
        assert_eq!(
            region_select_props(&mut atlas, "Thalamus"),
            ([10.0, -18.0, 7.0], false)
        );
    }

    #[test]
    fn unknown_region_yields_zero_centroid() {
        let mut atlas = MockAtlas::new();
        assert_eq!(
            region_select_props(&mut atlas, "UNKNOWN_REGION"),
            ([0.0, 0.0, 0.0], false)
        );
    }

    #[test]
    fn malformed_response_yields_zero_centroid() {
        let mut atlas = MockAtlas::new();
        assert_eq!(region_select_props(&mut atlas, "Split"), ([0.0; 3], false));
    }

    #[test]
    fn failures_do_not_stop_other_regions() {
        let mut atlas = MockAtlas::new();
        let names = vec![
            "Thalamus".to_string(),
            "UNKNOWN_REGION".to_string(),
            "Area hOc1 (V1)".to_string(),
        ];
        let table = region_table(&mut atlas, &names);
        assert_eq!(table[0].0, [10.0, -18.0, 7.0]);
        assert_eq!(table[1], ([0.0; 3], false));
        assert!(table[2].1);
    }

    #[test]
    fn atlas_logging_is_suppressed_but_skips_are_reported() {
        let counter = Counter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        tracing::subscriber::with_default(subscriber, || {
            let mut atlas = MockAtlas::new();
            region_select_props(&mut atlas, "Thalamus");
            region_select_props(&mut atlas, "UNKNOWN_REGION");
        });
        assert_eq!(counter.atlas.load(Ordering::SeqCst), 0);
        assert_eq!(counter.other.load(Ordering::SeqCst), 1);
    }
}

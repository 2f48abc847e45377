//! Specialization matching
//!
//! A composition may declare specializations: more specific composition
//! models to use when the selections made for some children fulfill given
//! model sets. Matching is a table lookup over the explicit selections only,
//! so applying a specialization never widens the selection.

use component_models::{ComponentModelRef, CompositionModel, Specialization};
use indexmap::IndexMap;
use tracing::debug;

/// Find the specialization matched by the explicit child selections
///
/// Every constrained child must be explicitly selected and its selection
/// must fulfill all of the constraint models. The most constrained match
/// wins; ties resolve in declaration order.
pub fn matching_specialization<'a>(
    composition: &'a CompositionModel,
    explicit_selections: &IndexMap<String, ComponentModelRef>,
) -> Option<&'a Specialization> {
    let mut best: Option<&Specialization> = None;
    for specialization in &composition.specializations {
        let matches = specialization
            .constraints
            .iter()
            .all(|(child, required_models)| {
                explicit_selections.get(child).is_some_and(|selected| {
                    required_models
                        .iter()
                        .all(|required| selected.fulfills(required))
                })
            });
        if !matches {
            continue;
        }
        let better = match best {
            None => true,
            Some(current) => specialization.weight() > current.weight(),
        };
        if better {
            best = Some(specialization);
        }
    }
    if let Some(specialization) = best {
        debug!(
            composition = %composition.name,
            specialized = %specialization.specialized.name,
            "child selections match specialization"
        );
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use component_models::{
        CompositionChild, DataServiceModel, ModelRef, ProvidedService, TaskContextModel,
    };
    use std::sync::Arc;

    #[test]
    fn test_matching_requires_explicit_selection() {
        let service = Arc::new(DataServiceModel::new("image_source"));
        let camera = ComponentModelRef::TaskContext(Arc::new(
            TaskContextModel::new("camera_driver")
                .with_provides(ProvidedService::new(Arc::clone(&service))),
        ));

        let specialized = Arc::new(CompositionModel::new("tracker_with_camera"));
        let mut constraints = IndexMap::new();
        constraints.insert(
            "source".to_string(),
            vec![ModelRef::Service(Arc::clone(&service))],
        );
        let composition = CompositionModel::new("tracker")
            .with_child(CompositionChild::new(
                "source",
                vec![ModelRef::Service(Arc::clone(&service))],
            ))
            .with_specialization(Specialization {
                constraints,
                specialized: Arc::clone(&specialized),
            });

        // nothing explicitly selected: no specialization
        assert!(matching_specialization(&composition, &IndexMap::new()).is_none());

        let mut explicit = IndexMap::new();
        explicit.insert("source".to_string(), camera);
        let matched = matching_specialization(&composition, &explicit).unwrap();
        assert_eq!(matched.specialized.name, "tracker_with_camera");
    }

    #[test]
    fn test_more_constrained_specialization_wins() {
        let left = Arc::new(DataServiceModel::new("left_source"));
        let right = Arc::new(DataServiceModel::new("right_source"));
        let both = ComponentModelRef::TaskContext(Arc::new(
            TaskContextModel::new("stereo_driver")
                .with_provides(ProvidedService::new(Arc::clone(&left)))
                .with_provides(ProvidedService::new(Arc::clone(&right))),
        ));

        let loose = Arc::new(CompositionModel::new("loose"));
        let tight = Arc::new(CompositionModel::new("tight"));
        let mut loose_constraints = IndexMap::new();
        loose_constraints.insert(
            "source".to_string(),
            vec![ModelRef::Service(Arc::clone(&left))],
        );
        let mut tight_constraints = IndexMap::new();
        tight_constraints.insert(
            "source".to_string(),
            vec![
                ModelRef::Service(Arc::clone(&left)),
                ModelRef::Service(Arc::clone(&right)),
            ],
        );
        let composition = CompositionModel::new("tracker")
            .with_specialization(Specialization {
                constraints: loose_constraints,
                specialized: loose,
            })
            .with_specialization(Specialization {
                constraints: tight_constraints,
                specialized: tight,
            });

        let mut explicit = IndexMap::new();
        explicit.insert("source".to_string(), both);
        let matched = matching_specialization(&composition, &explicit).unwrap();
        assert_eq!(matched.specialized.name, "tight");
    }
}

/*!
# Component Partitioning

Extracts the connected components of the similarity graph and classifies
them:

- **solved** — the component covers every k-point and fully specifies one
  physical band;
- **clusters** — the seeds samples get merged into. Components are visited in
  descending size; the largest always seeds the list, and a later component
  joins the list only when no existing cluster could absorb it (clusters for
  different physical bands overlap on the grid, so they never merge with each
  other);
- **samples** — everything else: fragments that some cluster can absorb.
*/

use tracing::info;

use crate::components::component::Component;
use crate::graph::types::BandGraph;
use crate::material::Material;

/// The classified components of one partitioning pass.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub solved: Vec<Component>,
    pub clusters: Vec<Component>,
    pub samples: Vec<Component>,
}

/// Splits the graph into solved components, clusters, and samples.
pub fn partition_components(graph: &BandGraph, material: &Material) -> Partition {
    let grid = material.grid();
    let mut components: Vec<Component> = graph
        .connected_components()
        .into_iter()
        .map(|nodes| Component::new(nodes, &grid))
        .collect();
    info!("number of components: {}", components.len());

    // Largest first; ties keep discovery order.
    components.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut partition = Partition::default();
    for component in components {
        if component.is_solved(&grid) {
            partition.solved.push(component);
            continue;
        }
        if partition.clusters.is_empty() {
            partition.clusters.push(component);
            continue;
        }
        let mergeable = partition
            .clusters
            .iter()
            .any(|cluster| cluster.validate(&component, &grid));
        if mergeable {
            partition.samples.push(component);
        } else {
            partition.clusters.push(component);
        }
    }

    info!(
        "phase 1: {}/{} solved, {} clusters, {} samples",
        partition.solved.len(),
        material.window_bands(),
        partition.clusters.len(),
        partition.samples.len()
    );
    partition
}

//! Net connectivity analysis: disjoint-net and DC-short detection, plus the
//! explicit repair pass.
//!
//! Objects (primitives and vias) are nodes of a contact graph whose edges
//! are "touches or overlaps"; connected components of that graph are the
//! electrical clusters. Detection is read-only. Repairs are planned as
//! explicit instructions and applied in a separate step, one net at a time,
//! never from `check()`.

use std::collections::{BTreeSet, HashMap};

use petgraph::unionfind::UnionFind;
use tracing::{debug, info};
use uuid::Uuid;

use crate::geometry::Polygon;
use crate::snapshot::{LayoutSnapshot, ObjectId};
use crate::spatial::SpatialIndex;

/// Outlines closer than this are considered in contact.
const CONTACT_TOLERANCE: f64 = 1e-9;

/// Contact graph over every net-bearing object, with connected components
/// resolved by union-find at build time.
pub struct ObjectGraph {
    ids: Vec<ObjectId>,
    index_of: HashMap<ObjectId, usize>,
    nets: Vec<String>,
    areas: Vec<f64>,
    via_flags: Vec<bool>,
    component: Vec<usize>,
}

impl ObjectGraph {
    /// Build from the snapshot, using the spatial index as the broad phase
    /// for contact candidates.
    pub fn build(snapshot: &LayoutSnapshot, index: &SpatialIndex) -> Self {
        let mut ids = Vec::new();
        let mut nets = Vec::new();
        let mut areas = Vec::new();
        let mut via_flags = Vec::new();
        let mut outlines: Vec<Polygon> = Vec::new();

        for obj in snapshot.objects() {
            ids.push(obj.id());
            nets.push(obj.net().to_string());
            let outline = obj.outline();
            areas.push(outline.area());
            via_flags.push(obj.is_via());
            outlines.push(outline);
        }

        let index_of: HashMap<ObjectId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut uf: UnionFind<usize> = UnionFind::new(ids.len());
        for (i, outline) in outlines.iter().enumerate() {
            let Some(bbox) = outline.bbox() else { continue };
            let mut candidates: Vec<usize> = index
                .nearby(&bbox, CONTACT_TOLERANCE)
                .into_iter()
                .filter_map(|e| index_of.get(&e.id).copied())
                .filter(|&j| j > i)
                .collect();
            candidates.sort_unstable();
            for j in candidates {
                if uf.find(i) == uf.find(j) {
                    continue;
                }
                if outline.distance_to(&outlines[j]) <= CONTACT_TOLERANCE {
                    uf.union(i, j);
                }
            }
        }

        let component = (0..ids.len()).map(|i| uf.find(i)).collect();
        debug!(objects = ids.len(), "contact graph built");
        Self {
            ids,
            index_of,
            nets,
            areas,
            via_flags,
            component,
        }
    }

    /// Transitive closure of geometric contact starting at `id`: every
    /// object in the same connected component, itself included.
    pub fn closure(&self, id: ObjectId) -> BTreeSet<ObjectId> {
        let Some(&i) = self.index_of.get(&id) else {
            return BTreeSet::new();
        };
        let rep = self.component[i];
        self.ids
            .iter()
            .enumerate()
            .filter(|(j, _)| self.component[*j] == rep)
            .map(|(_, id)| *id)
            .collect()
    }

    /// The net's objects grouped into maximal connected clusters. Clusters
    /// and their members follow snapshot order. Every object of the net is
    /// in exactly one cluster.
    pub fn clusters_for_net(&self, net: &str) -> Vec<NetCluster> {
        let mut clusters: Vec<(usize, NetCluster)> = Vec::new();
        for (i, obj_net) in self.nets.iter().enumerate() {
            if obj_net != net {
                continue;
            }
            let rep = self.component[i];
            match clusters.iter_mut().find(|(r, _)| *r == rep) {
                Some((_, cluster)) => {
                    cluster.objects.push(self.ids[i]);
                    cluster.area += self.areas[i];
                    cluster.vias_only &= self.via_flags[i];
                }
                None => clusters.push((
                    rep,
                    NetCluster {
                        objects: vec![self.ids[i]],
                        area: self.areas[i],
                        vias_only: self.via_flags[i],
                    },
                )),
            }
        }
        clusters.into_iter().map(|(_, c)| c).collect()
    }

    /// Distinct nets per connected component, in snapshot order.
    fn components_with_nets(&self) -> Vec<(Vec<ObjectId>, Vec<(String, usize)>)> {
        let mut order: Vec<usize> = Vec::new();
        let mut grouped: HashMap<usize, (Vec<ObjectId>, Vec<(String, usize)>)> = HashMap::new();
        for (i, &rep) in self.component.iter().enumerate() {
            let entry = grouped.entry(rep).or_insert_with(|| {
                order.push(rep);
                (Vec::new(), Vec::new())
            });
            entry.0.push(self.ids[i]);
            let net = &self.nets[i];
            match entry.1.iter_mut().find(|(n, _)| n == net) {
                Some((_, count)) => *count += 1,
                None => entry.1.push((net.clone(), 1)),
            }
        }
        order
            .into_iter()
            .filter_map(|rep| grouped.remove(&rep))
            .collect()
    }
}

/// One connected cluster of a net's objects.
#[derive(Debug, Clone, PartialEq)]
pub struct NetCluster {
    pub objects: Vec<ObjectId>,
    /// Summed outline area, m².
    pub area: f64,
    /// True when the cluster is nothing but vias.
    pub vias_only: bool,
}

/// A net whose objects fall into more than one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct DisjointNet {
    pub net: String,
    pub clusters: Vec<NetCluster>,
}

/// Nets that should be electrically single but are split into several
/// unconnected clusters.
pub fn find_disjoint_nets(snapshot: &LayoutSnapshot, graph: &ObjectGraph) -> Vec<DisjointNet> {
    snapshot
        .net_names()
        .into_iter()
        .filter_map(|net| {
            let clusters = graph.clusters_for_net(&net);
            if clusters.len() > 1 {
                Some(DisjointNet { net, clusters })
            } else {
                None
            }
        })
        .collect()
}

/// A net's share of one shorted copper cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct NetShare {
    pub net: String,
    pub object_count: usize,
}

/// Two or more nets joined through one connected cluster of copper.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortCircuit {
    /// Involved nets, most objects first.
    pub members: Vec<NetShare>,
    pub objects: Vec<ObjectId>,
}

impl ShortCircuit {
    pub fn nets(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.net.as_str())
    }
}

/// Every group of nets reachable from each other through touching copper.
/// Each group is reported once.
pub fn find_shorts(graph: &ObjectGraph) -> Vec<ShortCircuit> {
    graph
        .components_with_nets()
        .into_iter()
        .filter_map(|(objects, mut nets)| {
            nets.retain(|(n, _)| !n.is_empty());
            if nets.len() < 2 {
                return None;
            }
            nets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            Some(ShortCircuit {
                members: nets
                    .into_iter()
                    .map(|(net, object_count)| NetShare { net, object_count })
                    .collect(),
                objects,
            })
        })
        .collect()
}

/// Policy knobs for the disjoint-net repair planner.
#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Rank clusters by summed area instead of object count.
    pub order_clusters_by_area: bool,
    /// Single-object fragments below this area (m²) are deleted instead of
    /// renamed.
    pub min_fragment_area: f64,
    /// Delete lone-via fragments instead of renaming them.
    pub remove_isolated_vias: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            order_clusters_by_area: false,
            min_fragment_area: 0.0,
            remove_isolated_vias: false,
        }
    }
}

/// One planned mutation of the snapshot's nets.
#[derive(Debug, Clone, PartialEq)]
pub enum NetRepair {
    /// Move a cluster onto a freshly generated net name.
    Rename {
        net: String,
        objects: Vec<ObjectId>,
        new_net: String,
    },
    /// Drop stray fragments outright.
    RemoveObjects { net: String, objects: Vec<ObjectId> },
    /// Forget a declared net that has no objects at all.
    DeleteNet { net: String },
    /// Collapse shorted nets onto one surviving name.
    MergeNets { into: String, from: Vec<String> },
}

fn generated_net_name(base: &str) -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!("{base}_{}", &tag[..8])
}

/// Names the autorouter or netlister invented rather than a designer.
fn looks_autogenerated(name: &str) -> bool {
    name.is_empty()
        || name.starts_with("Net-")
        || name.starts_with("N$")
        || name.to_ascii_lowercase().starts_with("unnamed")
}

/// Plan repairs for every disjoint net: the largest cluster keeps the name,
/// the rest are renamed onto fresh nets or, when small enough, deleted.
/// Declared nets with zero objects are deleted.
pub fn plan_disjoint_repairs(
    snapshot: &LayoutSnapshot,
    graph: &ObjectGraph,
    options: &RepairOptions,
) -> Vec<NetRepair> {
    let mut repairs = Vec::new();

    for net in snapshot.net_names() {
        let mut clusters = graph.clusters_for_net(&net);
        if clusters.is_empty() {
            if snapshot.nets.iter().any(|n| *n == net) {
                repairs.push(NetRepair::DeleteNet { net });
            }
            continue;
        }
        if clusters.len() == 1 {
            continue;
        }

        if options.order_clusters_by_area {
            clusters.sort_by(|a, b| b.area.total_cmp(&a.area));
        } else {
            clusters.sort_by(|a, b| b.objects.len().cmp(&a.objects.len()));
        }

        // The first cluster is authoritative and keeps the net name.
        for cluster in clusters.into_iter().skip(1) {
            let tiny_fragment = cluster.objects.len() == 1
                && (cluster.area < options.min_fragment_area
                    || (cluster.vias_only && options.remove_isolated_vias));
            if tiny_fragment {
                repairs.push(NetRepair::RemoveObjects {
                    net: net.clone(),
                    objects: cluster.objects,
                });
            } else {
                repairs.push(NetRepair::Rename {
                    net: net.clone(),
                    objects: cluster.objects,
                    new_net: generated_net_name(&net),
                });
            }
        }
    }

    repairs
}

/// Plan merges for every short group: the name carried by the most objects
/// survives, ties going to the name that does not look auto-generated.
pub fn plan_short_repairs(shorts: &[ShortCircuit]) -> Vec<NetRepair> {
    shorts
        .iter()
        .filter_map(|short| {
            let top = short.members.first()?.object_count;
            let into = short
                .members
                .iter()
                .filter(|m| m.object_count == top)
                .find(|m| !looks_autogenerated(&m.net))
                .or_else(|| short.members.first())?
                .net
                .clone();
            let from: Vec<String> = short
                .nets()
                .filter(|n| *n != into)
                .map(str::to_string)
                .collect();
            Some(NetRepair::MergeNets { into, from })
        })
        .collect()
}

/// Apply planned repairs to the snapshot, strictly one repair at a time.
/// This is the only operation in the crate that mutates the layout.
pub fn apply_repairs(snapshot: &mut LayoutSnapshot, repairs: &[NetRepair]) {
    for repair in repairs {
        match repair {
            NetRepair::Rename {
                net,
                objects,
                new_net,
            } => {
                info!(net = net.as_str(), new_net = new_net.as_str(), "renaming cluster");
                snapshot.declare_net(new_net);
                for id in objects {
                    snapshot.set_object_net(*id, new_net);
                }
            }
            NetRepair::RemoveObjects { net, objects } => {
                info!(net = net.as_str(), count = objects.len(), "removing fragments");
                for id in objects {
                    snapshot.remove_object(*id);
                }
            }
            NetRepair::DeleteNet { net } => {
                info!(net = net.as_str(), "deleting empty net");
                snapshot.remove_net_declaration(net);
            }
            NetRepair::MergeNets { into, from } => {
                info!(into = into.as_str(), "merging shorted nets");
                for net in from {
                    let ids: Vec<ObjectId> = snapshot
                        .objects_on_net(net)
                        .iter()
                        .map(|o| o.id())
                        .collect();
                    for id in ids {
                        snapshot.set_object_net(id, into);
                    }
                    snapshot.remove_net_declaration(net);
                }
            }
        }
    }
}

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;

use meshlink_shared::{LinkKey, Uri};

use crate::{RemoteDownlink, RemoteUplink};

/// An immutable map published through an atomic pointer. Readers take a
/// snapshot; writers copy the snapshot, change the copy and swap it in only
/// if nobody else swapped first, retrying otherwise.
pub struct Registry<M> {
    map: ArcSwap<M>,
}

impl<M: Clone + Default> Registry<M> {
    pub fn new() -> Self {
        Self {
            map: ArcSwap::from_pointee(M::default()),
        }
    }

    pub fn snapshot(&self) -> Arc<M> {
        self.map.load_full()
    }

    /// `change` sees the current map and returns the map to publish, or
    /// `None` to leave it untouched, plus a result for the caller. It may run
    /// more than once.
    pub fn update<R>(&self, mut change: impl FnMut(&M) -> (Option<M>, R)) -> R {
        loop {
            let current = self.map.load_full();
            let (next, result) = change(&current);
            let Some(next) = next else {
                return result;
            };
            let previous = self.map.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return result;
            }
        }
    }

    /// Publishes an empty map, returning the last one.
    pub fn take(&self) -> Arc<M> {
        self.map.swap(Arc::new(M::default()))
    }
}

impl<M: Clone + Default> Default for Registry<M> {
    fn default() -> Self {
        Self::new()
    }
}

// Downlinks

type DownlinkMap = HashMap<Uri, HashMap<Uri, Arc<RemoteDownlink>>>;

/// At most one downlink per `(node_uri, lane_uri)`
#[derive(Default)]
pub struct DownlinkRegistry {
    registry: Registry<DownlinkMap>,
}

impl DownlinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_uri: &Uri, lane_uri: &Uri) -> Option<Arc<RemoteDownlink>> {
        self.registry
            .snapshot()
            .get(node_uri)
            .and_then(|lanes| lanes.get(lane_uri))
            .cloned()
    }

    /// Publishes `candidate` unless a downlink is already registered for its
    /// address; returns whichever downlink ends up registered.
    pub fn insert_if_absent(&self, candidate: &Arc<RemoteDownlink>) -> Arc<RemoteDownlink> {
        let node_uri = candidate.node_uri();
        let lane_uri = candidate.lane_uri();
        self.registry.update(|map| {
            if let Some(existing) = map.get(node_uri).and_then(|lanes| lanes.get(lane_uri)) {
                return (None, existing.clone());
            }
            let mut next = map.clone();
            next.entry(node_uri.clone())
                .or_default()
                .insert(lane_uri.clone(), candidate.clone());
            (Some(next), candidate.clone())
        })
    }

    pub fn remove(&self, node_uri: &Uri, lane_uri: &Uri) -> Option<Arc<RemoteDownlink>> {
        self.registry.update(|map| {
            let Some(existing) = map.get(node_uri).and_then(|lanes| lanes.get(lane_uri)) else {
                return (None, None);
            };
            let existing = existing.clone();
            let mut next = map.clone();
            remove_lane(&mut next, node_uri, lane_uri);
            (Some(next), Some(existing))
        })
    }

    /// Removes `downlink` only if it is still the one registered at its
    /// address.
    pub fn remove_if(&self, downlink: &RemoteDownlink) -> bool {
        let node_uri = downlink.node_uri();
        let lane_uri = downlink.lane_uri();
        self.registry.update(|map| {
            let registered = map
                .get(node_uri)
                .and_then(|lanes| lanes.get(lane_uri))
                .is_some_and(|existing| std::ptr::eq(Arc::as_ptr(existing), downlink));
            if !registered {
                return (None, false);
            }
            let mut next = map.clone();
            remove_lane(&mut next, node_uri, lane_uri);
            (Some(next), true)
        })
    }

    pub fn all(&self) -> Vec<Arc<RemoteDownlink>> {
        self.registry
            .snapshot()
            .values()
            .flat_map(|lanes| lanes.values().cloned())
            .collect()
    }

    pub fn take_all(&self) -> Vec<Arc<RemoteDownlink>> {
        self.registry
            .take()
            .values()
            .flat_map(|lanes| lanes.values().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registry.snapshot().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_uris(&self) -> Vec<Uri> {
        self.registry.snapshot().keys().cloned().collect()
    }
}

// Uplinks

type UplinkMap = HashMap<Uri, HashMap<Uri, HashMap<LinkKey, Arc<RemoteUplink>>>>;

/// Any number of uplinks per `(node_uri, lane_uri)`, told apart by key
#[derive(Default)]
pub struct UplinkRegistry {
    registry: Registry<UplinkMap>,
}

impl UplinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_uri: &Uri, lane_uri: &Uri) -> Vec<Arc<RemoteUplink>> {
        self.registry
            .snapshot()
            .get(node_uri)
            .and_then(|lanes| lanes.get(lane_uri))
            .map(|uplinks| uplinks.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn insert(&self, uplink: &Arc<RemoteUplink>) {
        let node_uri = uplink.node_uri();
        let lane_uri = uplink.lane_uri();
        let link_key = uplink.link_key();
        self.registry.update(|map| {
            let mut next = map.clone();
            next.entry(node_uri.clone())
                .or_default()
                .entry(lane_uri.clone())
                .or_default()
                .insert(link_key, uplink.clone());
            (Some(next), ())
        })
    }

    /// Removes the uplink registered under `link_key`. Returns `None` if it
    /// was not registered, otherwise whether the lane has no uplinks left.
    pub fn remove(&self, node_uri: &Uri, lane_uri: &Uri, link_key: LinkKey) -> Option<bool> {
        self.registry.update(|map| {
            let Some(uplinks) = map.get(node_uri).and_then(|lanes| lanes.get(lane_uri)) else {
                return (None, None);
            };
            if !uplinks.contains_key(&link_key) {
                return (None, None);
            }
            let lane_empty = uplinks.len() == 1;
            let mut next = map.clone();
            if lane_empty {
                remove_lane(&mut next, node_uri, lane_uri);
            } else if let Some(uplinks) = next
                .get_mut(node_uri)
                .and_then(|lanes| lanes.get_mut(lane_uri))
            {
                uplinks.remove(&link_key);
            }
            (Some(next), Some(lane_empty))
        })
    }

    /// Removes every uplink of one lane, returning them.
    pub fn remove_lane(&self, node_uri: &Uri, lane_uri: &Uri) -> Vec<Arc<RemoteUplink>> {
        self.registry.update(|map| {
            let Some(uplinks) = map.get(node_uri).and_then(|lanes| lanes.get(lane_uri)) else {
                return (None, Vec::new());
            };
            let removed = uplinks.values().cloned().collect();
            let mut next = map.clone();
            remove_lane(&mut next, node_uri, lane_uri);
            (Some(next), removed)
        })
    }

    pub fn all(&self) -> Vec<Arc<RemoteUplink>> {
        flatten_uplinks(&self.registry.snapshot())
    }

    pub fn take_all(&self) -> Vec<Arc<RemoteUplink>> {
        flatten_uplinks(&self.registry.take())
    }

    pub fn len(&self) -> usize {
        self.registry
            .snapshot()
            .values()
            .flat_map(|lanes| lanes.values())
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_uris(&self) -> Vec<Uri> {
        self.registry.snapshot().keys().cloned().collect()
    }
}

fn flatten_uplinks(map: &UplinkMap) -> Vec<Arc<RemoteUplink>> {
    map.values()
        .flat_map(|lanes| lanes.values())
        .flat_map(|uplinks| uplinks.values().cloned())
        .collect()
}

fn remove_lane<V>(map: &mut HashMap<Uri, HashMap<Uri, V>>, node_uri: &Uri, lane_uri: &Uri) {
    let node_empty = match map.get_mut(node_uri) {
        Some(lanes) => {
            lanes.remove(lane_uri);
            lanes.is_empty()
        }
        None => false,
    };
    if node_empty {
        map.remove(node_uri);
    }
}

//! Many-to-many association between regions and handlers.
//!
//! Both directions are indexed: resolution walks region -> handlers, while
//! removing or renaming a handler walks handler -> regions. The two indexes
//! always describe the same set of pairs.
//!
//! Handlers are referenced by name. The global handler never appears here;
//! the resolution engine adds it on its own.

use std::collections::{BTreeSet, HashMap};
use ward_core::{GLOBAL_HANDLER_NAME, RegionId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkGraph {
    by_region: HashMap<RegionId, BTreeSet<String>>,
    by_handler: HashMap<String, BTreeSet<RegionId>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the pair. `false` if it already exists or `handler` is the
    /// global handler.
    pub fn link(&mut self, region: &RegionId, handler: &str) -> bool {
        if handler == GLOBAL_HANDLER_NAME {
            return false;
        }
        if !self
            .by_region
            .entry(region.clone())
            .or_default()
            .insert(handler.to_string())
        {
            return false;
        }
        self.by_handler
            .entry(handler.to_string())
            .or_default()
            .insert(region.clone());
        true
    }

    /// Removes the pair. `false` if it was not recorded.
    pub fn unlink(&mut self, region: &RegionId, handler: &str) -> bool {
        let Some(handlers) = self.by_region.get_mut(region) else {
            return false;
        };
        if !handlers.remove(handler) {
            return false;
        }
        if handlers.is_empty() {
            self.by_region.remove(region);
        }
        if let Some(regions) = self.by_handler.get_mut(handler) {
            regions.remove(region);
            if regions.is_empty() {
                self.by_handler.remove(handler);
            }
        }
        true
    }

    pub fn contains(&self, region: &RegionId, handler: &str) -> bool {
        self.by_region
            .get(region)
            .is_some_and(|handlers| handlers.contains(handler))
    }

    /// Handler names explicitly linked to `region`, in name order.
    pub fn links_of(&self, region: &RegionId) -> Vec<&str> {
        self.by_region
            .get(region)
            .map(|handlers| handlers.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Regions `handler` is linked to, in region order.
    pub fn regions_of(&self, handler: &str) -> Vec<&RegionId> {
        self.by_handler
            .get(handler)
            .map(|regions| regions.iter().collect())
            .unwrap_or_default()
    }

    /// Drops every link of `handler`. Returns how many were removed.
    pub fn drop_handler(&mut self, handler: &str) -> usize {
        let Some(regions) = self.by_handler.remove(handler) else {
            return 0;
        };
        for region in &regions {
            if let Some(handlers) = self.by_region.get_mut(region) {
                handlers.remove(handler);
                if handlers.is_empty() {
                    self.by_region.remove(region);
                }
            }
        }
        regions.len()
    }

    /// Drops every link of `region`. Returns how many were removed.
    pub fn drop_region(&mut self, region: &RegionId) -> usize {
        let Some(handlers) = self.by_region.remove(region) else {
            return 0;
        };
        for handler in &handlers {
            if let Some(regions) = self.by_handler.get_mut(handler) {
                regions.remove(region);
                if regions.is_empty() {
                    self.by_handler.remove(handler);
                }
            }
        }
        handlers.len()
    }

    /// Moves every link of `old` over to `new`.
    pub fn rename_handler(&mut self, old: &str, new: &str) {
        let Some(regions) = self.by_handler.remove(old) else {
            return;
        };
        for region in &regions {
            if let Some(handlers) = self.by_region.get_mut(region) {
                handlers.remove(old);
                handlers.insert(new.to_string());
            }
        }
        self.by_handler
            .entry(new.to_string())
            .or_default()
            .extend(regions);
    }

    /// Number of (region, handler) pairs.
    pub fn len(&self) -> usize {
        self.by_region.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_region.is_empty()
    }

    /// Every pair, ordered by region then handler.
    pub fn pairs(&self) -> Vec<(&RegionId, &str)> {
        let mut pairs: Vec<_> = self
            .by_region
            .iter()
            .flat_map(|(region, handlers)| {
                handlers.iter().map(move |handler| (region, handler.as_str()))
            })
            .collect();
        pairs.sort();
        pairs
    }

    pub fn clear(&mut self) {
        self.by_region.clear();
        self.by_handler.clear();
    }
}

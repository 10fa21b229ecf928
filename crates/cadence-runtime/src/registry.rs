//! Site registry
//!
//! Servers hosting many documents keep one site per session. The registry
//! creates sites on first use and hands out shared handles afterwards.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;

use cadence_state::TwoWayProjection;

use crate::Site;

type Factory<K, P> = Box<dyn Fn(&K) -> Site<P> + Send + Sync>;

/// Sites keyed by session
pub struct SiteRegistry<K, P: TwoWayProjection> {
    sites: Mutex<HashMap<K, Site<P>>>,
    factory: Factory<K, P>,
}

impl<K, P> SiteRegistry<K, P>
where
    K: Eq + Hash + Clone,
    P: TwoWayProjection,
{
    /// Registry creating missing sites with `factory`
    pub fn new(factory: impl Fn(&K) -> Site<P> + Send + Sync + 'static) -> Self {
        SiteRegistry {
            sites: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    /// Site for `key`, created if missing
    pub fn get_or_create(&self, key: &K) -> Site<P> {
        let mut sites = self.sites.lock();
        if let Some(site) = sites.get(key) {
            return site.clone();
        }
        let site = (self.factory)(key);
        tracing::debug!("Registered site {}", site.id());
        sites.insert(key.clone(), site.clone());
        site
    }

    pub fn get(&self, key: &K) -> Option<Site<P>> {
        self.sites.lock().get(key).cloned()
    }

    /// Register an existing site; returns the site it replaced
    pub fn insert(&self, key: K, site: Site<P>) -> Option<Site<P>> {
        self.sites.lock().insert(key, site)
    }

    /// Forget `key`; handles already given out stay usable
    pub fn remove(&self, key: &K) -> Option<Site<P>> {
        self.sites.lock().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.sites.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sites.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.sites.lock().keys().cloned().collect()
    }
}

impl<K, P: TwoWayProjection> fmt::Debug for SiteRegistry<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteRegistry")
            .field("sites", &self.sites.lock().len())
            .finish()
    }
}

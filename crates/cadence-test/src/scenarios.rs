//! End-to-end scenarios
//!
//! Sites built from the sample projections, synced in-process, over faulty
//! links and over byte streams.

use cadence_core::SiteId;
use cadence_log::LogBacking;
use cadence_runtime::{Site, SiteConfig};
use cadence_state::{Commutative, TwoWayProjection};

use crate::{Account, Counter, Ledger};

pub type CounterSite = Site<Commutative<Counter>>;
pub type LedgerSite = Site<Ledger>;

fn config(backing: LogBacking) -> SiteConfig {
    SiteConfig {
        backing,
        ..SiteConfig::default()
    }
}

pub fn counter_site(id: u32, backing: LogBacking) -> CounterSite {
    Site::with_config(SiteId::new(id), Counter::projection(), 0, config(backing))
}

pub fn ledger_site(id: u32, backing: LogBacking) -> LedgerSite {
    Site::with_config(SiteId::new(id), Ledger, Account::default(), config(backing))
}

/// Every site holds the same events and the same model
pub fn converged<P>(sites: &[Site<P>]) -> bool
where
    P: TwoWayProjection,
    P::Model: Clone + PartialEq,
{
    let Some((first, rest)) = sites.split_first() else {
        return true;
    };
    let snapshot = first.snapshot();
    rest.iter().all(|site| {
        let other = site.snapshot();
        other.events == snapshot.events && other.model == snapshot.model
    })
}

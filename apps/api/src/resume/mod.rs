// Resume data: model, canonical seed, reconciliation, persistence and the
// read projection served to the site.

pub mod cache;
pub mod canonical;
pub mod dashboard;
pub mod handlers;
pub mod metrics;
pub mod model;
pub mod projection;
pub mod reconcile;
pub mod store;

//! Extraction engine constants

/// Hard safety cap on pages per run. A misbehaving API that keeps handing
/// out cursors stops the run implicitly instead of looping forever.
pub const MAX_PAGES: u64 = 1000;

/// Save a progress checkpoint every N fully consumed pages.
/// 10 pages bounds replay after a crash to at most ~1000 records at the
/// default page size while keeping checkpoint I/O off the hot path.
pub const CHECKPOINT_INTERVAL_PAGES: u64 = 10;

/// Default page size requested from the API (also the API maximum).
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Source-service tag stamped onto records and checkpoints.
pub const SOURCE_SERVICE: &str = "hubspot_deals";

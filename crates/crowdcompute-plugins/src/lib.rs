pub mod hashcat_crack;
pub mod shard;
pub mod sort_map;
pub mod sort_reduce;

pub use hashcat_crack::HashcatCrackPlugin;
pub use sort_map::SortMapPlugin;
pub use sort_reduce::SortReducePlugin;

use crowdcompute_common::Plugin;
use std::sync::Arc;

/// Every reference plugin this workspace ships, in one place so both
/// binaries build identical registries.
pub fn all_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(SortMapPlugin),
        Arc::new(SortReducePlugin),
        Arc::new(HashcatCrackPlugin),
    ]
}

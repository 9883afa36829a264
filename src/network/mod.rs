//! OS-facing network modules: commands, neighbor tables and context.

pub mod command;
pub mod context;
mod mac;
pub mod neighbor;
pub mod resolver;

pub use command::{CommandOutput, CommandRunner, ProcessRunner};
pub use context::{NetworkContext, NetworkId, SystemContext};
pub use mac::{is_unresolved, parse_mac};
pub use neighbor::{NeighborEntry, parse_arp_cache, parse_neighbor_table, read_arp_cache};
pub use resolver::MacResolver;

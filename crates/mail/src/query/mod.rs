//! Filter/Query engine
//!
//! Local selection over the store ([`select`]) and search strings for
//! querying the remote mailbox directly ([`RemoteSearch`]).

mod filter;
mod remote;
mod select;

pub use filter::MessageFilter;
pub use remote::{LiveSelection, RemoteSearch};
pub use select::{read_address_file, select};

//! Netlink client for nf_tables stateful objects.
//!
//! This crate talks to the Linux nf_tables subsystem over
//! `NETLINK_NETFILTER`. It encodes typed stateful objects (counters and
//! quotas) into netlink attribute streams, queues write requests into a
//! batch committed atomically by the kernel, and decodes dump replies back
//! into typed objects.
//!
//! # Features
//!
//! - `serde` - `Serialize` for tables and object variants
//! - `integration` - tests against the running kernel (require root)
//!
//! # Example
//!
//! ```ignore
//! use nftlink::nftables::{Conn, CounterObj, Table, TableFamily};
//!
//! fn main() -> nftlink::Result<()> {
//!     let table = Table::new("filter", TableFamily::IPv4);
//!     let mut conn = Conn::new();
//!
//!     conn.add_obj(&CounterObj::new(table.clone(), "ctr1"))?;
//!     conn.flush()?;
//!
//!     for obj in conn.get_objs(&table)? {
//!         println!("{obj}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Reading and resetting counters
//!
//! ```ignore
//! use nftlink::nftables::{Conn, CounterObj, Table, TableFamily};
//!
//! let conn = Conn::new();
//! let probe = CounterObj::new(Table::new("filter", TableFamily::Inet), "http");
//! for obj in conn.get_obj_reset(&probe)? {
//!     if let Some(counter) = obj.as_any().downcast_ref::<CounterObj>() {
//!         println!("{} packets, {} bytes", counter.packets, counter.bytes);
//!     }
//! }
//! ```

pub mod netlink;
pub mod nftables;

// Re-export common types at crate root for convenience
pub use netlink::{EncodeError, Error, Result};
pub use nftables::{Conn, Object, ObjectRegistry, Table, TableFamily};

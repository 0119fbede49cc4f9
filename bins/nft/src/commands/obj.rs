//! nft obj command implementation.
//!
//! Lists, resets, creates and deletes named counters and quotas.

use clap::{Args, Subcommand};
use nftlink::netlink::Dial;
use nftlink::nftables::{Conn, CounterObj, ObjectType, QuotaObj};
use nftlink::{Object, Table, TableFamily};

use crate::output::{OutputFormat, OutputOptions, print_all};

#[derive(Args)]
pub struct ObjCmd {
    #[command(subcommand)]
    action: ObjAction,
}

/// Location of an object: family, table and name.
#[derive(Args)]
struct ObjRef {
    /// Table family (ip, ip6, inet, arp, bridge, netdev).
    #[arg(value_parser = parse_family)]
    family: TableFamily,

    /// Table name.
    table: String,

    /// Object name.
    name: String,
}

impl ObjRef {
    fn table(&self) -> Table {
        Table::new(self.table.clone(), self.family)
    }
}

#[derive(Subcommand)]
enum ObjAction {
    /// List objects in a table.
    #[command(visible_alias = "ls", visible_alias = "show")]
    List {
        /// Table family (ip, ip6, inet, arp, bridge, netdev).
        #[arg(value_parser = parse_family)]
        family: TableFamily,

        /// Table name.
        table: String,

        /// Only show the object with this name.
        name: Option<String>,

        /// Only show objects of this type (counter, quota).
        #[arg(short = 't', long = "type", value_parser = parse_type)]
        object_type: Option<ObjectType>,
    },

    /// List objects and reset their state.
    Reset {
        #[command(flatten)]
        obj: ObjRef,

        /// Object type (counter, quota).
        #[arg(short = 't', long = "type", value_parser = parse_type, default_value = "counter")]
        object_type: ObjectType,
    },

    /// Add an object.
    #[command(subcommand)]
    Add(AddAction),

    /// Delete an object.
    #[command(visible_alias = "del")]
    Delete {
        #[command(flatten)]
        obj: ObjRef,

        /// Object type (counter, quota).
        #[arg(short = 't', long = "type", value_parser = parse_type, default_value = "counter")]
        object_type: ObjectType,
    },
}

#[derive(Subcommand)]
enum AddAction {
    /// Add a named counter.
    Counter {
        #[command(flatten)]
        obj: ObjRef,

        /// Initial packet count.
        #[arg(long, default_value_t = 0)]
        packets: u64,

        /// Initial byte count.
        #[arg(long, default_value_t = 0)]
        bytes: u64,
    },

    /// Add a named quota.
    Quota {
        #[command(flatten)]
        obj: ObjRef,

        /// Quota size in bytes.
        #[arg(long)]
        bytes: u64,

        /// Match once the quota is exceeded.
        #[arg(long)]
        over: bool,

        /// Bytes already consumed.
        #[arg(long, default_value_t = 0)]
        used: u64,
    },
}

impl ObjCmd {
    pub fn run<D: Dial>(
        &self,
        conn: &mut Conn<D>,
        format: OutputFormat,
        opts: &OutputOptions,
    ) -> anyhow::Result<()> {
        match &self.action {
            ObjAction::List {
                family,
                table,
                name,
                object_type,
            } => {
                let table = Table::new(table.clone(), *family);
                let objs = match (name, object_type) {
                    (Some(name), Some(ty)) => conn.get_obj(probe(*ty, table, name)?.as_ref())?,
                    _ => conn.get_objs(&table)?,
                };
                let objs: Vec<_> = objs
                    .into_iter()
                    .filter(|o| name.as_deref().is_none_or(|n| o.name() == n))
                    .filter(|o| object_type.is_none_or(|ty| o.object_type() == ty))
                    .collect();
                print_all(&mut std::io::stdout().lock(), &objs, format, opts)
            }
            ObjAction::Reset { obj, object_type } => {
                let target = probe(*object_type, obj.table(), &obj.name)?;
                let objs: Vec<_> = conn
                    .get_obj_reset(target.as_ref())?
                    .into_iter()
                    .filter(|o| o.name() == obj.name)
                    .collect();
                print_all(&mut std::io::stdout().lock(), &objs, format, opts)
            }
            ObjAction::Add(AddAction::Counter {
                obj,
                packets,
                bytes,
            }) => {
                let counter = CounterObj::new(obj.table(), obj.name.clone())
                    .packets(*packets)
                    .bytes(*bytes);
                conn.add_obj(&counter)?;
                conn.flush()?;
                Ok(())
            }
            ObjAction::Add(AddAction::Quota {
                obj,
                bytes,
                over,
                used,
            }) => {
                let mut quota = QuotaObj::new(obj.table(), obj.name.clone())
                    .bytes(*bytes)
                    .consumed(*used);
                if *over {
                    quota = quota.over();
                }
                conn.add_obj(&quota)?;
                conn.flush()?;
                Ok(())
            }
            ObjAction::Delete { obj, object_type } => {
                let target = probe(*object_type, obj.table(), &obj.name)?;
                conn.del_obj(target.as_ref())?;
                conn.flush()?;
                Ok(())
            }
        }
    }
}

/// Build an identity-only object of `object_type`.
fn probe(object_type: ObjectType, table: Table, name: &str) -> anyhow::Result<Box<dyn Object>> {
    match object_type {
        ObjectType::COUNTER => Ok(Box::new(CounterObj::new(table, name))),
        ObjectType::QUOTA => Ok(Box::new(QuotaObj::new(table, name))),
        other => anyhow::bail!("unsupported object type: {}", other),
    }
}

fn parse_family(s: &str) -> Result<TableFamily, String> {
    TableFamily::from_name(s).ok_or_else(|| format!("unknown table family '{}'", s))
}

fn parse_type(s: &str) -> Result<ObjectType, String> {
    ObjectType::from_name(s).ok_or_else(|| format!("unknown object type '{}'", s))
}

//! Stateful object integration tests.

use nftlink::Result;
use nftlink::nftables::{CounterObj, ObjectType, QuotaObj, Table, TableFamily};

use crate::common::TestNamespace;

fn setup(prefix: &str) -> Result<(TestNamespace, Table)> {
    let ns = TestNamespace::new(prefix)?;
    ns.nft(&["add", "table", "ip", "filter"])?;
    Ok((ns, Table::new("filter", TableFamily::IPv4)))
}

#[test]
fn test_add_and_get_counter() -> Result<()> {
    require_root!();

    let (ns, table) = setup("counter")?;
    let mut conn = ns.connection();

    conn.add_obj(&CounterObj::new(table.clone(), "ctr1").packets(10).bytes(1500))?;
    conn.flush()?;

    let objs = conn.get_obj(&CounterObj::new(table.clone(), "ctr1"))?;
    let ctr = objs
        .iter()
        .filter_map(|o| o.as_any().downcast_ref::<CounterObj>())
        .find(|c| c.name == "ctr1")
        .expect("ctr1 should be listed");
    assert_eq!((ctr.packets, ctr.bytes), (10, 1500));

    let listing = ns.nft(&["list", "counters"])?;
    assert!(listing.contains("ctr1"), "nft should list ctr1: {listing}");

    Ok(())
}

#[test]
fn test_reset_counter() -> Result<()> {
    require_root!();

    let (ns, table) = setup("reset")?;
    let mut conn = ns.connection();
    conn.add_obj(&CounterObj::new(table.clone(), "ctr1").packets(3).bytes(300))?;
    conn.flush()?;

    let probe = CounterObj::new(table, "ctr1");
    let before = conn.get_obj_reset(&probe)?;
    let after = conn.get_obj(&probe)?;

    let packets = |objs: &[Box<dyn nftlink::Object>]| {
        objs.iter()
            .filter_map(|o| o.as_any().downcast_ref::<CounterObj>())
            .find(|c| c.name == "ctr1")
            .map(|c| c.packets)
    };
    assert_eq!(packets(&before), Some(3));
    assert_eq!(packets(&after), Some(0));

    Ok(())
}

#[test]
fn test_dump_and_delete() -> Result<()> {
    require_root!();

    let (ns, table) = setup("dump")?;
    let mut conn = ns.connection();
    conn.add_obj(&CounterObj::new(table.clone(), "ctr1"))?;
    conn.add_obj(&QuotaObj::new(table.clone(), "q1").bytes(1 << 20).over())?;
    conn.flush()?;

    let objs = conn.get_objs(&table)?;
    assert_eq!(objs.len(), 2);
    assert!(objs.iter().any(|o| o.object_type() == ObjectType::QUOTA));

    conn.del_obj(&CounterObj::new(table.clone(), "ctr1"))?;
    conn.flush()?;

    let objs = conn.get_objs(&table)?;
    assert_eq!(objs.len(), 1);
    assert_eq!(objs[0].name(), "q1");

    Ok(())
}

#[test]
fn test_missing_table() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("missing")?;
    let conn = ns.connection();

    let err = conn
        .get_objs(&Table::new("nope", TableFamily::Inet))
        .unwrap_err();
    assert!(err.is_not_found(), "expected ENOENT, got {err}");

    Ok(())
}

#[test]
fn test_delete_missing_counter() -> Result<()> {
    require_root!();

    let (ns, table) = setup("dup")?;
    let mut conn = ns.connection();
    conn.add_obj(&CounterObj::new(table.clone(), "ctr1"))?;
    conn.flush()?;

    conn.del_obj(&CounterObj::new(table.clone(), "ctr1"))?;
    conn.flush()?;
    conn.del_obj(&CounterObj::new(table, "ctr1"))?;
    assert!(conn.flush().unwrap_err().is_not_found());

    Ok(())
}

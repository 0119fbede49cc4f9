//! Text and JSON rendering of stateful objects.

use std::io::Write;

use nftlink::Object;
use nftlink::nftables::{CounterObj, QuotaObj};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// nft listing syntax, one object per line.
    Text,
    /// A JSON array of objects.
    Json,
}

/// Output options.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Pretty print JSON.
    pub pretty: bool,
}

/// JSON form of a decoded object.
pub fn to_json(obj: &dyn Object) -> serde_json::Result<serde_json::Value> {
    let body = if let Some(counter) = obj.as_any().downcast_ref::<CounterObj>() {
        serde_json::to_value(counter)?
    } else if let Some(quota) = obj.as_any().downcast_ref::<QuotaObj>() {
        serde_json::to_value(quota)?
    } else {
        serde_json::json!({
            "table": obj.table(),
            "name": obj.name(),
        })
    };
    let mut map = serde_json::Map::new();
    map.insert(obj.object_type().to_string(), body);
    Ok(serde_json::Value::Object(map))
}

/// Print every object in the requested format.
pub fn print_all<W: Write>(
    w: &mut W,
    objs: &[Box<dyn Object>],
    format: OutputFormat,
    opts: &OutputOptions,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            for obj in objs {
                writeln!(w, "{}", obj)?;
            }
        }
        OutputFormat::Json => {
            let json = objs
                .iter()
                .map(|obj| to_json(obj.as_ref()))
                .collect::<serde_json::Result<Vec<_>>>()?;
            let json = serde_json::Value::Array(json);
            if opts.pretty {
                serde_json::to_writer_pretty(&mut *w, &json)?;
            } else {
                serde_json::to_writer(&mut *w, &json)?;
            }
            writeln!(w)?;
        }
    }
    Ok(())
}

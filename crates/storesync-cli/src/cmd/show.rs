//! Show subcommand - fetch and print a single entity

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};
use storesync_core::Entity;
use storesync_export::flatten_entity;

use super::{print_summary, Session};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Resource collection, e.g. products
    pub resource: String,

    /// Entity id
    pub id: i64,

    /// Print the raw attributes as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ShowArgs, config: &Config, session: &Session) -> Result<()> {
    let pb = session.progress.stage_line("show");
    let connector = session.connector(pb.clone())?;
    let entity = connector
        .fetch_entity(&args.resource, args.id)
        .with_context(|| format!("Failed to fetch {} {}", args.resource, args.id))?;
    pb.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entity_json(&entity))?);
        return Ok(());
    }

    let row = flatten_entity(&entity, &config.output.delimiter);
    let rows: Vec<(&str, String)> = row
        .iter()
        .map(|(column, cell)| (column, cell.to_string()))
        .collect();
    print_summary(&args.resource, &rows);
    Ok(())
}

/// `id`, `name`, then attributes in server order.
fn entity_json(entity: &Entity) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), Value::from(entity.id));
    map.insert("name".into(), Value::from(entity.name.clone()));
    for (key, value) in entity.attributes.iter() {
        map.insert(key.to_string(), value.to_json());
    }
    Value::Object(map)
}

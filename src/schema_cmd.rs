//! `schema` subcommands: create, list, show, update and delete output
//! schemas in a YAML schema store.

use anyhow::{Result, anyhow};
use log::info;

use crate::{
    cli::{SchemaAddArgs, SchemaCommand, SchemaIdArgs, SchemaListArgs, SchemaUpdateArgs},
    schema::{FieldOrder, OutputSchema, SchemaStore, YamlSchemaStore},
    table,
};

pub fn execute(command: &SchemaCommand) -> Result<()> {
    match command {
        SchemaCommand::Add(args) => add(args),
        SchemaCommand::List(args) => list(args),
        SchemaCommand::Show(args) => show(args),
        SchemaCommand::Update(args) => update(args),
        SchemaCommand::Remove(args) => remove(args),
    }
}

fn add(args: &SchemaAddArgs) -> Result<()> {
    let fields = FieldOrder::parse_list(&args.fields)?;
    let owner = args.owner.trim();
    if owner.is_empty() {
        return Err(anyhow!("--owner cannot be empty"));
    }
    let mut store = YamlSchemaStore::open(&args.store)?;
    let schema = store.insert(owner, args.name.clone(), fields);
    store.save()?;
    info!(
        "Created schema {} with {} field(s) in {:?}",
        schema.id,
        schema.fields.len(),
        args.store
    );
    println!("{}", schema.id);
    Ok(())
}

fn list(args: &SchemaListArgs) -> Result<()> {
    let store = YamlSchemaStore::open(&args.store)?;
    let schemas = match args.owner.as_deref() {
        Some(owner) => store.schemas_for_owner(owner)?,
        None => store.all().to_vec(),
    };
    if schemas.is_empty() {
        info!("No schemas found in {:?}", args.store);
        return Ok(());
    }
    let headers = vec![
        "id".to_string(),
        "owner".to_string(),
        "name".to_string(),
        "fields".to_string(),
    ];
    let rows = schemas
        .iter()
        .map(|schema| {
            vec![
                schema.id.to_string(),
                schema.owner_id.clone(),
                schema.name.clone().unwrap_or_default(),
                schema.fields.names().join(", "),
            ]
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&headers, &rows));
    Ok(())
}

fn show(args: &SchemaIdArgs) -> Result<()> {
    let store = YamlSchemaStore::open(&args.store)?;
    let schema = store
        .schema_by_id(args.id)?
        .ok_or_else(|| anyhow!("Schema {} not found in {:?}", args.id, args.store))?;
    print!("{}", render_fields(&schema));
    Ok(())
}

fn update(args: &SchemaUpdateArgs) -> Result<()> {
    let fields = FieldOrder::parse_list(&args.fields)?;
    let mut store = YamlSchemaStore::open(&args.store)?;
    let schema = store
        .update_fields(args.id, fields)
        .ok_or_else(|| anyhow!("Schema {} not found in {:?}", args.id, args.store))?;
    store.save()?;
    info!("Updated schema {} ({} field(s))", schema.label(), schema.fields.len());
    Ok(())
}

fn remove(args: &SchemaIdArgs) -> Result<()> {
    let mut store = YamlSchemaStore::open(&args.store)?;
    let schema = store
        .remove(args.id)
        .ok_or_else(|| anyhow!("Schema {} not found in {:?}", args.id, args.store))?;
    store.save()?;
    info!("Removed schema {}", schema.label());
    Ok(())
}

fn render_fields(schema: &OutputSchema) -> String {
    let headers = vec!["#".to_string(), "field".to_string()];
    let rows = schema
        .fields
        .iter()
        .enumerate()
        .map(|(idx, field)| vec![idx.to_string(), field.clone()])
        .collect::<Vec<_>>();
    table::render_table(&headers, &rows)
}

//! Template resolution - merges an inheritance chain into one concrete template

use std::sync::Arc;

use toml::{Table, Value};
use tracing::debug;

use super::definition::{read_merge_mode, TemplateDefinition};
use super::fields::{is_merge_flag, kind_of, FieldKind, MergeMode};
use super::graph::linearize;
use super::merge::{apply_list, merge_by_key, rightmost_wins};
use super::registry::{TemplateError, TemplateStore};
use super::resolved::ResolvedTemplate;

/// Resolve `id` against `store` without caching
pub fn resolve_template(
    store: &dyn TemplateStore,
    id: &str,
) -> Result<ResolvedTemplate, TemplateError> {
    let ancestors = linearize(store, id)?;

    let chain = ancestors
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(id))
        .map(|node| {
            store
                .definition(node)
                .ok_or_else(|| TemplateError::NotFound { id: node.to_string() })
        })
        .collect::<Result<Vec<Arc<TemplateDefinition>>, _>>()?;

    let mut merged = merge_fields(&chain)?;
    compose_overlays(&chain, &mut merged)?;

    debug!(template = id, ancestors = ?ancestors, "resolved template");

    ResolvedTemplate::from_table(id, ancestors, merged).map_err(|e| TemplateError::InvalidField {
        template: id.to_string(),
        field: e.field,
        message: e.message,
    })
}

/// Merge every declared field across `chain` (ancestors first, then the template)
fn merge_fields(chain: &[Arc<TemplateDefinition>]) -> Result<Table, TemplateError> {
    let mut merged = Table::new();

    for name in field_names(chain.iter().map(|def| &def.fields)) {
        let value = match kind_of(&name) {
            FieldKind::Scalar => rightmost_wins(chain.iter().map(|def| def.field(&name))).cloned(),
            FieldKind::List { flag } => merge_list_field(chain, &name, flag)?,
            FieldKind::KeyedList { key } => merge_keyed_field(
                Vec::new(),
                chain.iter().map(|def| (def.id.as_str(), def.field(&name))),
                &name,
                key,
            )?,
            FieldKind::Map => merge_map_field(
                Table::new(),
                chain.iter().map(|def| (def.id.as_str(), def.field(&name))),
                &name,
            )?,
            // Composed separately once primary fields are known
            FieldKind::Overlay => None,
        };

        if let Some(value) = value {
            merged.insert(name, value);
        }
    }

    Ok(merged)
}

/// Field names declared anywhere in `tables`, in first-seen order, without merge flags
fn field_names<'a>(tables: impl Iterator<Item = &'a Table>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for table in tables {
        for name in table.keys() {
            if !is_merge_flag(name) && !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

fn merge_list_field(
    chain: &[Arc<TemplateDefinition>],
    name: &str,
    flag: &str,
) -> Result<Option<Value>, TemplateError> {
    let mut acc: Vec<Value> = Vec::new();
    let mut declared = false;

    for def in chain {
        let Some(value) = def.field(name) else {
            continue;
        };
        let items = expect_array(&def.id, name, value)?;
        apply_list(&mut acc, items, def.merge_mode(flag)?);
        declared = true;
    }

    Ok(declared.then_some(Value::Array(acc)))
}

fn merge_keyed_field<'a>(
    seed: Vec<Value>,
    declarations: impl Iterator<Item = (&'a str, Option<&'a Value>)>,
    name: &str,
    key: &str,
) -> Result<Option<Value>, TemplateError> {
    let mut entries: Vec<(String, Value)> = Vec::new();
    let mut declared = !seed.is_empty();

    let keyed = |template: &str, entry: &Value| -> Result<(String, Value), TemplateError> {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(|k| (k.to_string(), entry.clone()))
            .ok_or_else(|| TemplateError::InvalidField {
                template: template.to_string(),
                field: name.to_string(),
                message: format!("every entry needs a string `{}`", key),
            })
    };

    for entry in &seed {
        entries.push(keyed("<inherited>", entry)?);
    }

    for (template, value) in declarations {
        let Some(value) = value else {
            continue;
        };
        for entry in expect_array(template, name, value)? {
            entries.push(keyed(template, entry)?);
        }
        declared = true;
    }

    if !declared {
        return Ok(None);
    }

    let merged = merge_by_key(entries, |(k, _)| k.clone());
    Ok(Some(Value::Array(
        merged.into_iter().map(|(_, entry)| entry).collect(),
    )))
}

fn merge_map_field<'a>(
    seed: Table,
    declarations: impl Iterator<Item = (&'a str, Option<&'a Value>)>,
    name: &str,
) -> Result<Option<Value>, TemplateError> {
    let mut declared = !seed.is_empty();
    let mut acc = seed;

    for (template, value) in declarations {
        let Some(value) = value else {
            continue;
        };
        let Value::Table(entries) = value else {
            return Err(TemplateError::InvalidField {
                template: template.to_string(),
                field: name.to_string(),
                message: format!("expected a table, found {}", value.type_str()),
            });
        };
        for (key, entry) in entries {
            acc.insert(key.clone(), entry.clone());
        }
        declared = true;
    }

    Ok(declared.then_some(Value::Table(acc)))
}

fn expect_array<'a>(template: &str, field: &str, value: &'a Value) -> Result<&'a [Value], TemplateError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| TemplateError::InvalidField {
            template: template.to_string(),
            field: field.to_string(),
            message: format!("expected a list, found {}", value.type_str()),
        })
}

/// Compose overlay blocks on top of the merged primary fields
///
/// Each overlay list field starts from the primary field's resolved value and
/// then takes every non-empty block in chain order. A block appends unless it
/// sets its own merge flag to `false`, which replaces.
fn compose_overlays(
    chain: &[Arc<TemplateDefinition>],
    merged: &mut Table,
) -> Result<(), TemplateError> {
    let overlay_fields: Vec<String> = field_names(chain.iter().map(|def| &def.fields))
        .into_iter()
        .filter(|name| kind_of(name) == FieldKind::Overlay)
        .collect();

    for overlay in overlay_fields {
        let mut blocks: Vec<(&str, &Table)> = Vec::new();
        for def in chain {
            match def.field(&overlay) {
                None => {}
                Some(Value::Table(block)) if block.is_empty() => {}
                Some(Value::Table(block)) => blocks.push((def.id.as_str(), block)),
                Some(other) => {
                    return Err(TemplateError::InvalidField {
                        template: def.id.clone(),
                        field: overlay.clone(),
                        message: format!("expected a table, found {}", other.type_str()),
                    })
                }
            }
        }

        if blocks.is_empty() {
            continue;
        }

        let composed = compose_overlay(&overlay, &blocks, merged)?;
        merged.insert(overlay, Value::Table(composed));
    }

    Ok(())
}

fn compose_overlay(
    overlay: &str,
    blocks: &[(&str, &Table)],
    primary: &Table,
) -> Result<Table, TemplateError> {
    let mut composed = Table::new();

    for name in field_names(blocks.iter().map(|(_, block)| *block)) {
        let qualified = format!("{}.{}", overlay, name);

        let value = match kind_of(&name) {
            FieldKind::List { flag } => {
                let mut acc: Vec<Value> = match primary.get(&name) {
                    Some(value) => expect_array("<resolved>", &name, value)?.to_vec(),
                    None => Vec::new(),
                };
                for (template, block) in blocks {
                    let Some(value) = block.get(&name) else {
                        continue;
                    };
                    let mode = read_merge_mode(block, flag, MergeMode::Concatenate).map_err(
                        |_| TemplateError::MalformedMergeFlag {
                            template: template.to_string(),
                            field: format!("{}.{}", overlay, flag),
                        },
                    )?;
                    apply_list(&mut acc, expect_array(template, &qualified, value)?, mode);
                }
                Some(Value::Array(acc))
            }
            FieldKind::KeyedList { key } => {
                let seed = match primary.get(&name) {
                    Some(value) => expect_array("<resolved>", &name, value)?.to_vec(),
                    None => Vec::new(),
                };
                let declarations = blocks.iter().map(|(id, block)| (*id, block.get(&name)));
                merge_keyed_field(seed, declarations, &qualified, key)?
            }
            FieldKind::Map => {
                let seed = match primary.get(&name) {
                    Some(Value::Table(table)) => table.clone(),
                    _ => Table::new(),
                };
                let declarations = blocks.iter().map(|(id, block)| (*id, block.get(&name)));
                merge_map_field(seed, declarations, &qualified)?
            }
            FieldKind::Scalar | FieldKind::Overlay => {
                rightmost_wins(blocks.iter().map(|(_, block)| block.get(&name))).cloned()
            }
        };

        if let Some(value) = value {
            composed.insert(name, value);
        }
    }

    Ok(composed)
}

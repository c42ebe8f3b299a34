//! Parameter resolution: the `string_format` / `copy` / `extract`
//! substitution interpreter.
//!
//! Resolution runs in two phases with different capabilities:
//!
//! - **Trigger time** ([`run_trigger_extractions`]): the only moment the
//!   engine may dereference trusted custom-format uids. Every
//!   dereferenced value is persisted under `__extracted` in the server
//!   parameter tree, so later peeks are pure.
//! - **Peek time** ([`resolve_for_peek`]): pure function over the stored
//!   parameter trees. `extract` directives read back from `__extracted`
//!   exactly like `copy`; `string_format` placeholders prefer
//!   `__extracted` over the live namespace.
//!
//! Input paths address the merged client+server namespace, server side
//! winning on collision. Directives run in array order; later writes to
//! the same output path win.

use serde_json::{Map, Value};

use crate::errors::{ParamError, ResolverError};
use crate::schema;
use crate::traits::ResourceResolver;
use crate::types::{ClientFlowScreen, CustomFormat, Substitution};

/// Key under which trigger-time extractions are persisted in the server
/// parameter tree.
pub const EXTRACTED_KEY: &str = "__extracted";

/// Failures during trigger-time extraction.
#[derive(Debug)]
pub enum ExtractError {
    /// Configuration or input problem; the affected screen is dropped.
    Param(ParamError),
    /// The referenced backing object no longer exists.
    Missing { format: CustomFormat, uid: String },
    /// Transport-level resolver fault; propagates to the caller.
    Resolver(ResolverError),
}

impl From<ParamError> for ExtractError {
    fn from(e: ParamError) -> Self {
        Self::Param(e)
    }
}

// ---------------------------------------------------------------------------
// Path utilities
// ---------------------------------------------------------------------------

/// Deep get by object-key path. Paths never index arrays.
pub fn get_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Deep set by object-key path, creating intermediate objects. A
/// non-object intermediate is overwritten.
pub fn set_path(root: &mut Value, path: &[String], value: Value) {
    let Some((last, prefix)) = path.split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for segment in prefix {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else { return };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
    }
}

fn dotted(path: &[String]) -> String {
    path.join(".")
}

/// Look up a path in the merged client+server namespace (server wins).
fn lookup_merged<'a>(client: &'a Value, server: &'a Value, path: &[String]) -> Option<&'a Value> {
    get_path(server, path).or_else(|| get_path(client, path))
}

// ---------------------------------------------------------------------------
// Format string parsing
// ---------------------------------------------------------------------------

enum Piece {
    Literal(String),
    Placeholder(Vec<String>),
}

/// Parse `{a.b.c}`-style placeholders. Braces cannot nest and every
/// opening brace must close.
fn parse_format(format: &str) -> Result<Vec<Piece>, ParamError> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => {
                            return Err(ParamError::Format {
                                message: format!("nested brace in {format:?}"),
                            });
                        }
                        Some(c) => inner.push(c),
                        None => {
                            return Err(ParamError::Format {
                                message: format!("unterminated placeholder in {format:?}"),
                            });
                        }
                    }
                }
                if inner.is_empty() {
                    return Err(ParamError::Format {
                        message: format!("empty placeholder in {format:?}"),
                    });
                }
                pieces.push(Piece::Placeholder(
                    inner.split('.').map(str::to_string).collect(),
                ));
            }
            '}' => {
                return Err(ParamError::Format {
                    message: format!("unmatched closing brace in {format:?}"),
                });
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Trigger-time extraction
// ---------------------------------------------------------------------------

/// Execute the trigger-time half of a screen's substitutions: every
/// `extract`, plus the implicit dereference behind `string_format`
/// placeholders whose flow-schema declaration carries a custom format.
/// Writes results under `server[EXTRACTED_KEY]`; `copy` directives and
/// the final accumulator build are deferred to peek time.
pub async fn run_trigger_extractions(
    screen: &ClientFlowScreen,
    client_schema: &Value,
    server_schema: &Value,
    client: &Value,
    server: &mut Value,
    resources: &dyn ResourceResolver,
) -> Result<(), ExtractError> {
    for sub in &screen.variable {
        match sub {
            Substitution::Copy { .. } => {}
            Substitution::Extract {
                input_path,
                extracted_path,
                output_path,
            } => {
                let format = input_format(client_schema, server_schema, input_path).ok_or(
                    ParamError::UnsafeExtraction {
                        path: dotted(input_path),
                    },
                )?;
                let object = dereference(format, input_path, client, server, resources).await?;
                let value = get_path(&object, extracted_path).cloned().ok_or(
                    ParamError::MissingParameter {
                        path: format!("{}:{}", dotted(input_path), dotted(extracted_path)),
                    },
                )?;
                let mut stored = vec![EXTRACTED_KEY.to_string()];
                stored.extend(output_path.iter().cloned());
                set_path(server, &stored, value);
            }
            Substitution::StringFormat { format, .. } => {
                for piece in parse_format(format)? {
                    let Piece::Placeholder(path) = piece else {
                        continue;
                    };
                    let Some((len, declared)) = input_format_prefix(
                        client_schema,
                        server_schema,
                        &path,
                    ) else {
                        continue;
                    };
                    let prefix = &path[..len];
                    let mut stored = vec![EXTRACTED_KEY.to_string()];
                    stored.extend(prefix.iter().cloned());
                    if get_path(server, &stored).is_some() {
                        continue; // already dereferenced by an earlier directive
                    }
                    let object =
                        dereference(declared, prefix, client, server, resources).await?;
                    set_path(server, &stored, object);
                }
            }
        }
    }
    Ok(())
}

/// Dereference the custom-format uid at `path` into its backing object.
async fn dereference(
    format: CustomFormat,
    path: &[String],
    client: &Value,
    server: &Value,
    resources: &dyn ResourceResolver,
) -> Result<Value, ExtractError> {
    if !format.mints_jwt() {
        // flow_slug names a flow, there is no backing object to extract.
        return Err(ParamError::UnsafeExtraction { path: dotted(path) }.into());
    }
    let uid = lookup_merged(client, server, path)
        .and_then(Value::as_str)
        .ok_or(ParamError::UnsafeExtraction { path: dotted(path) })?
        .to_string();
    match resources.resolve(format, &uid).await {
        Ok(Some(object)) => Ok(object),
        Ok(None) => Err(ExtractError::Missing { format, uid }),
        Err(e) => Err(ExtractError::Resolver(e)),
    }
}

/// The declared custom format at exactly `path` in the flow schemas
/// (server schema wins, matching the merged-namespace lookup order).
fn input_format(client_schema: &Value, server_schema: &Value, path: &[String]) -> Option<CustomFormat> {
    schema::schema_at(server_schema, path)
        .and_then(schema::declared_format)
        .or_else(|| schema::schema_at(client_schema, path).and_then(schema::declared_format))
}

/// Prefix-aware variant for placeholder paths reaching into a
/// dereferenced object.
fn input_format_prefix(
    client_schema: &Value,
    server_schema: &Value,
    path: &[String],
) -> Option<(usize, CustomFormat)> {
    schema::format_at_prefix(server_schema, path)
        .or_else(|| schema::format_at_prefix(client_schema, path))
}

// ---------------------------------------------------------------------------
// Peek-time resolution
// ---------------------------------------------------------------------------

/// Build the realized parameter object for a queued screen. Pure: never
/// touches resolvers, reading extractions back from `__extracted`.
pub fn resolve_for_peek(
    screen: &ClientFlowScreen,
    client: &Value,
    server: &Value,
) -> Result<Value, ParamError> {
    let mut out = if screen.fixed.is_object() {
        screen.fixed.clone()
    } else {
        Value::Object(Map::new())
    };

    for sub in &screen.variable {
        match sub {
            Substitution::Copy {
                input_path,
                output_path,
            } => {
                let value = lookup_merged(client, server, input_path).cloned().ok_or(
                    ParamError::MissingParameter {
                        path: dotted(input_path),
                    },
                )?;
                set_path(&mut out, output_path, value);
            }
            Substitution::Extract { output_path, .. } => {
                let mut stored = vec![EXTRACTED_KEY.to_string()];
                stored.extend(output_path.iter().cloned());
                let value =
                    get_path(server, &stored)
                        .cloned()
                        .ok_or(ParamError::MissingParameter {
                            path: dotted(&stored),
                        })?;
                set_path(&mut out, output_path, value);
            }
            Substitution::StringFormat {
                format,
                output_path,
            } => {
                let mut built = String::new();
                for piece in parse_format(format)? {
                    match piece {
                        Piece::Literal(s) => built.push_str(&s),
                        Piece::Placeholder(path) => {
                            let mut stored = vec![EXTRACTED_KEY.to_string()];
                            stored.extend(path.iter().cloned());
                            let value = get_path(server, &stored)
                                .or_else(|| lookup_merged(client, server, &path))
                                .ok_or(ParamError::MissingParameter { path: dotted(&path) })?;
                            built.push_str(&stringify(value));
                        }
                    }
                }
                set_path(&mut out, output_path, Value::String(built));
            }
        }
    }
    Ok(out)
}

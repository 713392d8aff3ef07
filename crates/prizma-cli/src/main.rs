//! prizma - Decode, edit and re-encode Protocol Buffer payloads
//!
//! This tool loads compiled descriptor sets, decodes wire payloads
//! against a chosen message type, renders them as JSON, and can write
//! the re-encoded bytes back out or check the loaded schema for
//! dangling type references.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use prizma_core::descriptor::{FieldDescriptor, FieldType};
use prizma_core::{project_schema, DescriptorSet, FieldValue, MessageValue, TypeRegistry};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Decode, edit and re-encode Protocol Buffer payloads
#[derive(Parser, Debug)]
#[command(name = "prizma")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Descriptor-set file, or a directory of descriptor-set files
    #[arg(short, long)]
    descriptors: PathBuf,

    #[command(flatten)]
    action: Action,

    /// Message type name for --payload, or root type for --check-schema
    /// (the leading dot may be omitted)
    #[arg(short = 't', long = "type", value_name = "NAME")]
    type_name: Option<String>,

    /// Write the re-encoded payload to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(long)]
    force: bool,

    /// Rendering for decoded payloads
    #[arg(long, value_enum, default_value = "json")]
    format: RenderFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Action {
    /// Path to a wire payload to decode
    #[arg(short, long)]
    payload: Option<PathBuf>,

    /// List all registered message and enum type names
    #[arg(long)]
    list_types: bool,

    /// Project the loaded types into the structural model and report
    /// dangling references
    #[arg(long)]
    check_schema: bool,
}

/// Rendering for decoded payloads
#[derive(Debug, Clone, Copy, ValueEnum)]
enum RenderFormat {
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON (for scripting)
    Compact,
}

/// Counters from descriptor loading
#[derive(Default)]
struct LoadStats {
    files_read: usize,
    duplicates_skipped: usize,
    parse_failures: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    if cli.output.is_some() && cli.action.payload.is_none() {
        bail!("--output requires --payload");
    }

    let (registry, stats) = load_registry(&cli.descriptors)?;
    debug!(
        "{} descriptor file(s) read, {} duplicate(s) skipped, {} unparsable skipped",
        stats.files_read, stats.duplicates_skipped, stats.parse_failures
    );

    if let Some(ref payload) = cli.action.payload {
        run_decode(&cli, &registry, payload)
    } else if cli.action.list_types {
        run_list_types(&registry);
        Ok(())
    } else if cli.action.check_schema {
        run_check_schema(&cli, &registry)
    } else {
        bail!("One of --payload, --list-types or --check-schema must be specified")
    }
}

/// Load one descriptor-set file, or every file under a directory, into
/// a single registry. Directory walks skip hidden files and dedup
/// identical files by content hash; unparsable files are skipped with
/// a warning rather than aborting the load.
fn load_registry(path: &Path) -> Result<(TypeRegistry, LoadStats)> {
    if !path.exists() {
        bail!("Descriptor path does not exist: {}", path.display());
    }

    let mut registry = TypeRegistry::new();
    let mut stats = LoadStats::default();

    if path.is_file() {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read descriptor set: {}", path.display()))?;
        let set = DescriptorSet::parse(&data)
            .with_context(|| format!("Failed to parse descriptor set: {}", path.display()))?;
        registry.add_descriptor_set(set);
        stats.files_read += 1;
    } else {
        let mut seen = HashSet::new();
        for entry in WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let file = entry.path();
            if !file.is_file() {
                continue;
            }
            // Skip hidden files
            if file
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(false)
            {
                continue;
            }

            trace!("Reading {}", file.display());
            let data = match fs::read(file) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", file.display(), e);
                    continue;
                }
            };

            let hash = blake3::hash(&data).to_hex().to_string();
            if !seen.insert(hash) {
                debug!("Skipping duplicate descriptor set: {}", file.display());
                stats.duplicates_skipped += 1;
                continue;
            }

            match DescriptorSet::parse(&data) {
                Ok(set) => {
                    registry.add_descriptor_set(set);
                    stats.files_read += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", file.display(), e);
                    stats.parse_failures += 1;
                }
            }
        }
    }

    if registry.message_count() == 0 && registry.enum_count() == 0 {
        bail!("No types registered from {}", path.display());
    }
    info!(
        "Registered {} message type(s) and {} enum type(s)",
        registry.message_count(),
        registry.enum_count()
    );

    Ok((registry, stats))
}

/// Decode a payload file, print it, and optionally re-encode it.
fn run_decode(cli: &Cli, registry: &TypeRegistry, payload_path: &Path) -> Result<()> {
    let Some(type_name) = cli.type_name.as_deref() else {
        bail!("--type is required when decoding a payload");
    };
    let type_name = normalize_type_name(type_name);

    let payload = fs::read(payload_path)
        .with_context(|| format!("Failed to read payload: {}", payload_path.display()))?;
    trace!("Read {} byte(s) from {}", payload.len(), payload_path.display());

    let message = registry.decode(&type_name, &payload).with_context(|| {
        format!(
            "Failed to decode {} as '{}'",
            payload_path.display(),
            type_name
        )
    })?;

    let rendered = render_message(&message, registry);
    let text = match cli.format {
        RenderFormat::Json => serde_json::to_string_pretty(&rendered),
        RenderFormat::Compact => serde_json::to_string(&rendered),
    }
    .context("Failed to serialize decoded payload")?;
    println!("{text}");

    if let Some(ref output) = cli.output {
        let bytes = message.encode();
        write_output(output, &bytes, cli.force)?;
        info!("Wrote {} byte(s) to {}", bytes.len(), output.display());
    }

    Ok(())
}

/// Print every registered type, sorted by name.
fn run_list_types(registry: &TypeRegistry) {
    let mut entries: Vec<(String, &str)> = registry
        .message_types()
        .map(|ty| (ty.name().to_string(), "message"))
        .chain(registry.enum_types().map(|ty| (ty.name().to_string(), "enum")))
        .collect();
    entries.sort();
    for (name, kind) in entries {
        println!("{kind} {name}");
    }
}

/// Project the registry and report dangling references; any finding is
/// a failure exit.
fn run_check_schema(cli: &Cli, registry: &TypeRegistry) -> Result<()> {
    let root = cli.type_name.as_deref().map(normalize_type_name);
    let (schema, _) = project_schema(registry, root.as_deref());

    let problems = schema.validate();
    if problems.is_empty() {
        println!(
            "schema closed: {} type(s), no dangling references",
            schema.types.len()
        );
        return Ok(());
    }
    for problem in &problems {
        eprintln!("{problem}");
    }
    bail!("{} dangling reference(s) found", problems.len())
}

/// Prefix the leading dot that registry keys carry, if it is missing.
fn normalize_type_name(name: &str) -> String {
    if name.starts_with('.') {
        name.to_string()
    } else {
        format!(".{name}")
    }
}

/// Render a decoded message as JSON, resolving field numbers to names
/// and enum numbers to value names where the registry knows them.
fn render_message(message: &MessageValue, registry: &TypeRegistry) -> serde_json::Value {
    let ty = message.message_type();
    let mut object = serde_json::Map::new();
    for number in message.set_fields() {
        let Some(field) = ty.field(number) else {
            continue;
        };
        let rendered = if field.label.is_repeated() {
            let elements = message.get_repeated_field(number).unwrap_or_default();
            serde_json::Value::Array(
                elements
                    .iter()
                    .map(|value| render_value(value, field, registry))
                    .collect(),
            )
        } else {
            match message.get_field(number).ok().flatten() {
                Some(value) => render_value(value, field, registry),
                None => serde_json::Value::Null,
            }
        };
        object.insert(field.name.clone(), rendered);
    }
    serde_json::Value::Object(object)
}

fn render_value(
    value: &FieldValue,
    field: &FieldDescriptor,
    registry: &TypeRegistry,
) -> serde_json::Value {
    match value {
        FieldValue::Double(v) => number_or_null(*v),
        FieldValue::Float(v) => number_or_null(f64::from(*v)),
        FieldValue::Int(v) => {
            // Enum numbers render by name when the registry resolves
            // them; unknown values stay numeric.
            if field.field_type == FieldType::Enum {
                let name = field
                    .type_name
                    .as_deref()
                    .and_then(|type_name| registry.enum_type(type_name))
                    .and_then(|def| u32::try_from(*v).ok().and_then(|n| def.value_name(n)));
                if let Some(name) = name {
                    return serde_json::Value::String(name.to_string());
                }
            }
            serde_json::Value::Number((*v).into())
        }
        FieldValue::UInt(v) => serde_json::Value::Number((*v).into()),
        FieldValue::Bool(v) => serde_json::Value::Bool(*v),
        FieldValue::Str(v) => serde_json::Value::String(v.clone()),
        FieldValue::Bytes(v) => {
            serde_json::Value::Array(v.iter().map(|b| serde_json::Value::Number((*b).into())).collect())
        }
        FieldValue::Message(v) => render_message(v, registry),
    }
}

fn number_or_null(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Write re-encoded bytes with an overwrite gate.
fn write_output(path: &Path, bytes: &[u8], force: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    if path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    fs::write(path, bytes).with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prizma_core::descriptor::{
        EnumDescriptor, EnumValueDescriptor, FileDescriptor, Label, MessageDescriptor,
    };
    use serde_json::json;
    use tempfile::TempDir;

    // Hand-rolled descriptor-set bytes; all lengths stay below 128 so
    // every varint is a single byte.
    fn len_field(number: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![number << 3 | 2, payload.len() as u8];
        buf.extend_from_slice(payload);
        buf
    }

    fn varint_field(number: u8, value: u8) -> Vec<u8> {
        vec![number << 3, value]
    }

    fn sample_set_bytes(package: &str) -> Vec<u8> {
        let mut field = Vec::new();
        field.extend(len_field(1, b"x"));
        field.extend(varint_field(3, 1));
        field.extend(varint_field(5, 9));

        let mut message = Vec::new();
        message.extend(len_field(1, b"M"));
        message.extend(len_field(2, &field));

        let mut file = Vec::new();
        file.extend(len_field(1, b"a.proto"));
        file.extend(len_field(2, package.as_bytes()));
        file.extend(len_field(4, &message));

        len_field(1, &file)
    }

    #[test]
    fn test_load_registry_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("one.desc");
        fs::write(&path, sample_set_bytes("p")).unwrap();

        let (registry, stats) = load_registry(&path).unwrap();
        assert_eq!(stats.files_read, 1);
        assert!(registry.message_type(".p.M").is_some());
    }

    #[test]
    fn test_load_registry_dedups_identical_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.desc"), sample_set_bytes("p")).unwrap();
        fs::write(temp_dir.path().join("two.desc"), sample_set_bytes("p")).unwrap();
        fs::write(temp_dir.path().join("three.desc"), sample_set_bytes("q")).unwrap();

        let (registry, stats) = load_registry(temp_dir.path()).unwrap();
        assert_eq!(stats.files_read, 2);
        assert_eq!(stats.duplicates_skipped, 1);
        assert!(registry.message_type(".p.M").is_some());
        assert!(registry.message_type(".q.M").is_some());
    }

    #[test]
    fn test_load_registry_skips_unparsable_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("good.desc"), sample_set_bytes("p")).unwrap();
        // Length prefix runs past the end of the buffer.
        fs::write(temp_dir.path().join("bad.desc"), [0x0A, 0x7F, 0x01]).unwrap();

        let (registry, stats) = load_registry(temp_dir.path()).unwrap();
        assert_eq!(stats.files_read, 1);
        assert_eq!(stats.parse_failures, 1);
        assert!(registry.message_type(".p.M").is_some());
    }

    #[test]
    fn test_write_output_force_semantics() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.bin");

        write_output(&path, b"first", false).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");

        let err = write_output(&path, b"second", false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read(&path).unwrap(), b"first");

        write_output(&path, b"second", true).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_normalize_type_name() {
        assert_eq!(normalize_type_name("pkg.Msg"), ".pkg.Msg");
        assert_eq!(normalize_type_name(".pkg.Msg"), ".pkg.Msg");
    }

    #[test]
    fn test_render_resolves_field_and_enum_names() {
        let registry = TypeRegistry::from_descriptor_set(DescriptorSet {
            files: vec![FileDescriptor {
                name: "event.proto".into(),
                package: "p".into(),
                messages: vec![MessageDescriptor {
                    name: "Event".into(),
                    fields: vec![
                        FieldDescriptor {
                            name: "kind".into(),
                            number: 1,
                            label: Label::Optional,
                            field_type: FieldType::Enum,
                            type_name: Some(".p.Kind".into()),
                        },
                        FieldDescriptor {
                            name: "note".into(),
                            number: 2,
                            label: Label::Optional,
                            field_type: FieldType::String,
                            type_name: None,
                        },
                        FieldDescriptor {
                            name: "data".into(),
                            number: 3,
                            label: Label::Optional,
                            field_type: FieldType::Bytes,
                            type_name: None,
                        },
                    ],
                    ..Default::default()
                }],
                enums: vec![EnumDescriptor {
                    name: "Kind".into(),
                    values: vec![
                        EnumValueDescriptor {
                            name: "NONE".into(),
                            number: 0,
                        },
                        EnumValueDescriptor {
                            name: "PING".into(),
                            number: 5,
                        },
                    ],
                }],
            }],
        });

        // kind=5, note="hi", data=[1,2]
        let payload = [0x08, 5, 0x12, 2, b'h', b'i', 0x1A, 2, 1, 2];
        let message = registry.decode(".p.Event", &payload).unwrap();
        assert_eq!(
            render_message(&message, &registry),
            json!({"kind": "PING", "note": "hi", "data": [1, 2]})
        );

        // An enum number without a registered name stays numeric.
        let payload = [0x08, 7];
        let message = registry.decode(".p.Event", &payload).unwrap();
        assert_eq!(render_message(&message, &registry), json!({"kind": 7}));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

//! # CLI Command Implementations
//!
//! Each command builds a serializable report, then prints it as text or,
//! in JSON mode, as pretty JSON.

use modelkit_core::{
    DataRecord, Descriptor, ModelError, ModelRegistry, PathPattern, ValidationResult,
    build_path, load_schema, parse_records,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum schema file size (10 MB).
const MAX_SCHEMA_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum data file size (100 MB).
///
/// Every record becomes a live instance, so this also bounds memory.
const MAX_DATA_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), ModelError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ModelError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(ModelError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve a user-supplied input path.
///
/// Canonicalizes (resolving symlinks and "..") and requires a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, ModelError> {
    let canonical = path.canonicalize().map_err(|e| {
        ModelError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(ModelError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate, size-check and declare a schema file into a fresh registry.
fn declare_schema(schema: &Path) -> Result<(ModelRegistry, Vec<String>), ModelError> {
    let path = validate_file_path(schema)?;
    validate_file_size(&path, MAX_SCHEMA_FILE_SIZE)?;

    let registry = ModelRegistry::new();
    let names = load_schema(&path)?.declare_into(&registry)?;
    tracing::info!("Declared {} model(s) from {:?}", names.len(), schema);
    Ok((registry, names))
}

fn print_json(output: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(output).unwrap_or_default()
    );
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// One compiled field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldReport {
    pub name: String,
    pub kind: String,
    pub internal: bool,
    pub calculated: bool,
    pub depends_from: Vec<String>,
    pub depends_to: Vec<String>,
}

/// One compiled type.
#[derive(Debug, Clone, Serialize)]
pub struct TypeReport {
    pub name: String,
    pub base: Option<String>,
    pub fields: Vec<FieldReport>,
}

/// Declare a schema and describe every compiled type, in declaration order.
pub fn check_report(schema: &Path) -> Result<Vec<TypeReport>, ModelError> {
    let (registry, names) = declare_schema(schema)?;

    let mut reports = Vec::with_capacity(names.len());
    for name in names {
        let Some(decl) = registry.declaration(&name) else {
            continue;
        };
        let fields = decl
            .fields()
            .iter()
            .map(|(field, spec)| FieldReport {
                name: field.clone(),
                kind: spec.kind().as_str().to_string(),
                internal: spec.is_internal(),
                calculated: spec.is_calculated(),
                depends_from: spec.antecedents().to_vec(),
                depends_to: spec.dependents().to_vec(),
            })
            .collect();
        reports.push(TypeReport {
            name,
            base: decl.base().map(str::to_string),
            fields,
        });
    }
    Ok(reports)
}

/// Check a schema file.
pub fn cmd_check(schema: &Path, json_mode: bool) -> Result<(), ModelError> {
    let reports = check_report(schema)?;

    if json_mode {
        print_json(&reports);
        return Ok(());
    }

    for report in &reports {
        match &report.base {
            Some(base) => println!("{} (extends {})", report.name, base),
            None => println!("{}", report.name),
        }
        for field in &report.fields {
            let mut line = format!("  {:<16} {}", field.name, field.kind);
            if field.internal {
                line.push_str(" internal");
            }
            if field.calculated {
                line.push_str(" calculated");
            }
            if !field.depends_from.is_empty() {
                line.push_str(&format!(" <- [{}]", field.depends_from.join(", ")));
            }
            if !field.depends_to.is_empty() {
                line.push_str(&format!(" -> [{}]", field.depends_to.join(", ")));
            }
            println!("{}", line);
        }
    }
    Ok(())
}

// =============================================================================
// EVAL COMMAND
// =============================================================================

/// One created instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub path: String,
    pub data: Value,
    pub validation: ValidationResult,
}

/// Paths matched by the optional query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub model: String,
    pub pattern: String,
    pub matches: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub instances: Vec<InstanceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryReport>,
}

/// Split `<model>[=<pattern>]` into a descriptor.
fn parse_query(query: &str) -> Descriptor {
    match query.split_once('=') {
        Some((model, pattern)) => Descriptor::new(model.trim()).path(pattern.trim()),
        None => Descriptor::new(query.trim()),
    }
}

/// Declare a schema, create every record of a data file, then report the
/// instances and the optional query.
pub fn eval_report(
    schema: &Path,
    data: &Path,
    query: Option<&str>,
) -> Result<EvalReport, ModelError> {
    let (registry, _) = declare_schema(schema)?;

    let data_path = validate_file_path(data)?;
    validate_file_size(&data_path, MAX_DATA_FILE_SIZE)?;
    let text = std::fs::read_to_string(&data_path)
        .map_err(|e| ModelError::Io(format!("Read file: {}", e)))?;
    let records: Vec<DataRecord> = parse_records(&text)?;
    tracing::info!("Creating {} instance(s) from {:?}", records.len(), data);

    let mut models = Vec::with_capacity(records.len());
    for record in &records {
        models.push(registry.create(record.descriptor(), record.data.clone())?);
    }

    let instances = models
        .iter()
        .map(|model| InstanceReport {
            path: model.path().to_string(),
            data: model.to_json(),
            validation: model.validate(None),
        })
        .collect();

    let query = match query {
        Some(query) => {
            let desc = parse_query(query);
            let pattern = desc.resolve_path();
            let model = desc.name.clone();
            let matches = registry
                .query(desc, false)?
                .iter()
                .map(|m| m.path().to_string())
                .collect();
            Some(QueryReport {
                model,
                pattern,
                matches,
            })
        }
        None => None,
    };

    Ok(EvalReport { instances, query })
}

/// Evaluate a data file against a schema.
pub fn cmd_eval(
    schema: &Path,
    data: &Path,
    query: Option<&str>,
    json_mode: bool,
) -> Result<(), ModelError> {
    let report = eval_report(schema, data, query)?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    for instance in &report.instances {
        let status = if instance.validation.valid {
            "valid".to_string()
        } else {
            format!(
                "invalid: {}",
                instance
                    .validation
                    .error_fields
                    .as_deref()
                    .unwrap_or_default()
                    .join(", ")
            )
        };
        println!("{} [{}]", instance.path, status);
        println!("  {}", instance.data);
    }

    if let Some(query) = &report.query {
        println!();
        println!(
            "Query {} ({}): {} match(es)",
            query.model,
            query.pattern,
            query.matches.len()
        );
        for path in &query.matches {
            println!("  {}", path);
        }
    }
    Ok(())
}

// =============================================================================
// PATH COMMAND
// =============================================================================

/// Arguments of the `path` command.
#[derive(Debug, Clone, Default)]
pub struct PathArgs {
    pub name: String,
    pub id: Option<String>,
    pub parent_name: Option<String>,
    pub parent_id: Option<String>,
    pub parent_path: Option<String>,
    pub matches: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<bool>,
}

/// Build the path described by `args` and test it against `args.matches`.
pub fn path_report(args: &PathArgs) -> Result<PathReport, ModelError> {
    let mut desc = Descriptor::new(args.name.as_str());
    if let Some(id) = &args.id {
        desc = desc.id(id.as_str());
    }
    desc = match (&args.parent_path, &args.parent_name, &args.parent_id) {
        (Some(path), _, _) => desc.parent_path(path.as_str()),
        (None, Some(name), Some(id)) => desc.parent(name.as_str(), id.as_str()),
        (None, Some(name), None) => desc.parent_any(name.as_str()),
        (None, None, _) => desc,
    };

    let path = build_path(&desc);
    let matches = match &args.matches {
        Some(target) => Some(PathPattern::compile(&path)?.is_match(target)),
        None => None,
    };
    Ok(PathReport {
        path,
        target: args.matches.clone(),
        matches,
    })
}

/// Print a canonical path.
pub fn cmd_path(args: &PathArgs, json_mode: bool) -> Result<(), ModelError> {
    let report = path_report(args)?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("{}", report.path);
    if let (Some(target), Some(matched)) = (&report.target, report.matches) {
        let verdict = if matched { "matches" } else { "does not match" };
        println!("{} {}", verdict, target);
    }
    Ok(())
}

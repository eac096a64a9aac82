//! Programmatic side of `horusctl`: builds command documents and prints them
//! as relaxed extended JSON, one document per line.

use crate::config::ServiceConfig;
use crate::errors::{Result, StoreError};
use crate::logger;
use crate::query::{
    Coordinates, build_filter, build_spatial_command_str, build_update_command_str,
};
use bson::{Bson, Document as BsonDocument};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Filter { terms: Vec<(String, String)> },
    Update { operator: String, fields_json: String },
    Spatial {
        operator: String,
        shape: String,
        coordinates_json: String,
        max_distance: Option<f64>,
        min_distance: Option<f64>,
    },
    CheckConfig { path: Option<PathBuf> },
}

/// Splits `key=value`; values that parse as JSON keep their type, anything
/// else is taken as a string.
///
/// # Errors
/// Returns `StoreError::Config` if there is no `=`.
pub fn parse_term(s: &str) -> Result<(String, String)> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| StoreError::Config(format!("expected key=value, got '{s}'")))?;
    Ok((k.trim().to_string(), v.to_string()))
}

fn term_value(raw: &str) -> Bson {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| bson::serialize_to_bson(&v).ok())
        .unwrap_or_else(|| Bson::String(raw.to_string()))
}

fn json_document(raw: &str) -> Result<BsonDocument> {
    let v: serde_json::Value = serde_json::from_str(raw)?;
    if !v.is_object() {
        return Err(StoreError::Config(format!("expected a JSON object, got {raw}")));
    }
    Ok(bson::serialize_to_document(&v)?)
}

fn emit<W: Write>(out: &mut W, doc: BsonDocument) -> Result<()> {
    let json = Bson::Document(doc).into_relaxed_extjson();
    writeln!(out, "{json}").map_err(|e| StoreError::Io(e.to_string()))
}

/// Installs file logging when the config names a log directory. Without one
/// the tool writes nothing to disk and returns `false`.
///
/// # Errors
/// See [`logger::configure_logging`].
pub fn setup_logging(cfg: &ServiceConfig) -> Result<bool> {
    match cfg.log_dir.as_deref() {
        Some(dir) => logger::configure_logging(Some(dir), Some(&cfg.log_level), None),
        None => Ok(false),
    }
}

/// # Errors
/// Propagates builder, parse and config errors.
pub fn run<W: Write>(cmd: Command, out: &mut W) -> Result<()> {
    match cmd {
        Command::Filter { terms } => {
            let f = build_filter(terms.iter().map(|(k, v)| (k.clone(), term_value(v))));
            emit(out, f)
        }
        Command::Update { operator, fields_json } => {
            let cmd = build_update_command_str(&operator, json_document(&fields_json)?)?;
            emit(out, cmd.to_document())
        }
        Command::Spatial { operator, shape, coordinates_json, max_distance, min_distance } => {
            let coordinates: Coordinates = serde_json::from_str(&coordinates_json)?;
            let cmd = build_spatial_command_str(&operator, &shape, coordinates, max_distance, min_distance)?;
            emit(out, cmd.to_filter())
        }
        Command::CheckConfig { path } => {
            let cfg = ServiceConfig::load(path.as_deref())?;
            writeln!(out, "service: {}", cfg.name).map_err(|e| StoreError::Io(e.to_string()))?;
            writeln!(out, "uri: {}", cfg.database.uri()).map_err(|e| StoreError::Io(e.to_string()))?;
            writeln!(out, "namespace: {}", cfg.database.namespace())
                .map_err(|e| StoreError::Io(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_string(cmd: Command) -> Result<String> {
        let mut buf = Vec::new();
        run(cmd, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap())
    }

    #[test]
    fn terms_keep_json_types() {
        let out = run_to_string(Command::Filter {
            terms: vec![parse_term("user=ann").unwrap(), parse_term("active=true").unwrap()],
        })
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(v, serde_json::json!({"user": "ann", "active": true}));
    }

    #[test]
    fn parse_term_requires_equals() {
        assert!(parse_term("user").is_err());
        assert_eq!(parse_term("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
    }

    #[test]
    fn spatial_prints_nested_filter() {
        let out = run_to_string(Command::Spatial {
            operator: "near".into(),
            shape: "Point".into(),
            coordinates_json: "[-122.66, 45.69]".into(),
            max_distance: Some(100.0),
            min_distance: None,
        })
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(v["location"]["$near"]["$geometry"]["type"], "Point");
        assert_eq!(v["location"]["$near"]["$maxDistance"], 100.0);
    }

    #[test]
    fn no_log_dir_means_no_log_files() {
        let cfg = ServiceConfig::default();
        assert!(cfg.log_dir.is_none());
        assert!(!setup_logging(&cfg).unwrap());
    }

    #[test]
    fn update_rejects_unknown_operator() {
        let err = run_to_string(Command::Update { operator: "push".into(), fields_json: "{}".into() });
        assert!(matches!(err, Err(StoreError::UnsupportedOperator(_))));
        let err = run_to_string(Command::Update { operator: "set".into(), fields_json: "[1]".into() });
        assert!(matches!(err, Err(StoreError::Config(_))));
    }
}

//! Document matching and update application for the in-process driver.
//!
//! Supports the operator subset the builders emit: equality terms, the four
//! spatial operators against stored GeoJSON points, and the nine update
//! operators.

use crate::errors::StoreError;
use crate::query::{Position, SpatialOperator, UpdateOperator};
use crate::types::ID_FIELD;
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::spatial;

// Safety limit for dotted paths
const MAX_PATH_DEPTH: usize = 32;

/// Outcome of matching one stored document against a filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Match {
    No,
    Yes,
    /// Matched a proximity operator at this distance in meters.
    At(f64),
}

impl Match {
    #[must_use]
    pub const fn is_match(self) -> bool {
        !matches!(self, Self::No)
    }
}

pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').enumerate().peekable();
    while let Some((depth, part)) = parts.next() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        if parts.peek().is_none() {
            return cur.get(part);
        }
        match cur.get(part) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    None
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Double(f) => Some(*f),
        Bson::Int32(i) => Some(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Some(*i as f64),
        _ => None,
    }
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 1,
        Bson::String(_) | Bson::Symbol(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::ObjectId(_) => 6,
        Bson::Boolean(_) => 7,
        Bson::DateTime(_) => 8,
        Bson::Timestamp(_) => 9,
        Bson::RegularExpression(_) => 10,
        _ => 11,
    }
}

fn values_equal(stored: &Bson, wanted: &Bson) -> bool {
    if as_f64(stored).is_some() && as_f64(wanted).is_some() {
        return compare_bson(stored, wanted) == Ordering::Equal;
    }
    stored == wanted
}

fn spatial_operator_of(value: &Bson) -> Option<(SpatialOperator, &BsonDocument)> {
    let Bson::Document(d) = value else { return None };
    let (key, inner) = d.iter().next()?;
    let op = SpatialOperator::from_key(key)?;
    match inner {
        Bson::Document(inner) => Some((op, inner)),
        _ => None,
    }
}

/// Matches a stored document against a filter document.
///
/// # Errors
/// Returns a driver error for malformed spatial operands.
pub fn eval_filter(doc: &BsonDocument, filter: &BsonDocument) -> Result<Match, StoreError> {
    let mut distance = None;
    for (path, wanted) in filter {
        if let Some((op, operand)) = spatial_operator_of(wanted) {
            match eval_spatial(get_path(doc, path), op, operand)? {
                Match::No => return Ok(Match::No),
                Match::At(d) => distance = Some(d),
                Match::Yes => {}
            }
            continue;
        }
        match get_path(doc, path) {
            Some(v) if values_equal(v, wanted) => {}
            _ => return Ok(Match::No),
        }
    }
    Ok(distance.map_or(Match::Yes, Match::At))
}

fn operand_shape(operand: &BsonDocument) -> Result<spatial::Geometry, StoreError> {
    let geometry = operand
        .get_document("$geometry")
        .map_err(|_| StoreError::Driver("spatial operator requires $geometry".into()))?;
    spatial::Geometry::from_document(geometry)
        .ok_or_else(|| StoreError::Driver(format!("malformed $geometry: {geometry}")))
}

fn eval_spatial(
    stored: Option<&Bson>,
    op: SpatialOperator,
    operand: &BsonDocument,
) -> Result<Match, StoreError> {
    let query = operand_shape(operand)?;
    let Some(Bson::Document(stored)) = stored else { return Ok(Match::No) };
    let Some(spatial::Geometry::Point(at)) = spatial::Geometry::from_document(stored) else {
        // only stored points are evaluated
        return Ok(Match::No);
    };
    Ok(match op {
        SpatialOperator::Near | SpatialOperator::NearSphere => {
            let spatial::Geometry::Point(center) = query else {
                return Err(StoreError::Driver(format!("{} requires a Point", op.key())));
            };
            near_match(center, at, operand)
        }
        SpatialOperator::GeoWithin | SpatialOperator::GeoIntersects => bool_match(query.intersects(at)),
    })
}

fn near_match(center: Position, at: Position, operand: &BsonDocument) -> Match {
    let d = spatial::haversine_m(center, at);
    let max = operand.get("$maxDistance").and_then(as_f64);
    let min = operand.get("$minDistance").and_then(as_f64);
    if max.is_some_and(|m| d > m) || min.is_some_and(|m| d < m) {
        return Match::No;
    }
    Match::At(d)
}

const fn bool_match(b: bool) -> Match {
    if b { Match::Yes } else { Match::No }
}

fn ensure_subdoc<'a>(
    root: &'a mut BsonDocument,
    key: &str,
    path: &str,
) -> Result<&'a mut BsonDocument, StoreError> {
    if !root.contains_key(key) {
        root.insert(key.to_string(), Bson::Document(BsonDocument::new()));
    }
    match root.get_mut(key) {
        Some(Bson::Document(d)) => Ok(d),
        Some(other) => Err(StoreError::Driver(format!(
            "cannot create field '{path}': '{key}' holds a {:?} value",
            other.element_type()
        ))),
        None => Err(StoreError::Driver(format!("cannot create field '{path}'"))),
    }
}

// Intermediate steps must be documents or absent; a scalar is never replaced.
fn traverse_to_parent<'a>(
    root: &'a mut BsonDocument,
    path: &str,
) -> Result<(&'a mut BsonDocument, String), StoreError> {
    let mut cur = root;
    let mut iter = path.split('.').peekable();
    let mut last = String::new();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            last = seg.to_string();
            break;
        }
        cur = ensure_subdoc(cur, seg, path)?;
    }
    Ok((cur, last))
}

fn set_path(root: &mut BsonDocument, path: &str, value: Bson) -> Result<bool, StoreError> {
    let (parent, last) = traverse_to_parent(root, path)?;
    let old = parent.insert(last, value.clone());
    Ok(old.as_ref() != Some(&value))
}

fn unset_path(root: &mut BsonDocument, path: &str) -> Result<bool, StoreError> {
    if get_path(root, path).is_none() {
        return Ok(false);
    }
    let (parent, last) = traverse_to_parent(root, path)?;
    Ok(parent.remove(&last).is_some())
}

fn is_id_path(path: &str) -> bool {
    path == ID_FIELD || path.strip_prefix(ID_FIELD).is_some_and(|rest| rest.starts_with('.'))
}

/// True when one path equals the other or lies inside it.
fn paths_overlap(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner.strip_prefix(outer).is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    };
    nested(a, b) || nested(b, a)
}

fn not_numeric(op: UpdateOperator, field: &str) -> StoreError {
    StoreError::Driver(format!("cannot apply {} to a non-numeric value at '{field}'", op.key()))
}

fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

fn arith(op: UpdateOperator, field: &str, cur: &Bson, by: &Bson) -> Result<Bson, StoreError> {
    let add = op == UpdateOperator::Inc;
    if let (Bson::Int32(a), Bson::Int32(b)) = (cur, by) {
        let r = if add { a.checked_add(*b) } else { a.checked_mul(*b) };
        if let Some(r) = r {
            return Ok(Bson::Int32(r));
        }
    }
    if let (Some(a), Some(b)) = (as_i64(cur), as_i64(by)) {
        let r = if add { a.checked_add(b) } else { a.checked_mul(b) };
        return r.map(Bson::Int64).ok_or_else(|| {
            StoreError::Driver(format!("integer overflow applying {} at '{field}'", op.key()))
        });
    }
    let a = as_f64(cur).ok_or_else(|| not_numeric(op, field))?;
    let b = as_f64(by).ok_or_else(|| not_numeric(op, field))?;
    Ok(Bson::Double(if add { a + b } else { a * b }))
}

fn zero_like(v: &Bson) -> Bson {
    match v {
        Bson::Int32(_) => Bson::Int32(0),
        Bson::Int64(_) => Bson::Int64(0),
        _ => Bson::Double(0.0),
    }
}

fn current_date_value(spec: &Bson, field: &str) -> Result<Bson, StoreError> {
    let now = bson::DateTime::now();
    match spec {
        Bson::Boolean(true) => Ok(Bson::DateTime(now)),
        Bson::Document(d) => match d.get_str("$type") {
            Ok("date") => Ok(Bson::DateTime(now)),
            Ok("timestamp") => {
                let secs = u32::try_from(now.timestamp_millis() / 1000).unwrap_or(u32::MAX);
                Ok(Bson::Timestamp(bson::Timestamp { time: secs, increment: 1 }))
            }
            _ => Err(StoreError::Driver(format!("invalid $currentDate spec at '{field}'"))),
        },
        _ => Err(StoreError::Driver(format!("invalid $currentDate spec at '{field}'"))),
    }
}

fn apply_operator(
    doc: &mut BsonDocument,
    op: UpdateOperator,
    fields: &BsonDocument,
) -> Result<bool, StoreError> {
    let mut changed = false;
    for (field, value) in fields {
        if is_id_path(field) && op != UpdateOperator::SetOnInsert {
            return Err(StoreError::Driver("the _id field is immutable".into()));
        }
        changed |= match op {
            UpdateOperator::Set => set_path(doc, field, value.clone())?,
            UpdateOperator::Unset => unset_path(doc, field)?,
            UpdateOperator::SetOnInsert => false,
            UpdateOperator::Inc | UpdateOperator::Mul => {
                if as_f64(value).is_none() {
                    return Err(not_numeric(op, field));
                }
                let next = match get_path(doc, field) {
                    Some(cur) => arith(op, field, cur, value)?,
                    None if op == UpdateOperator::Inc => value.clone(),
                    // $mul on a missing field stores zero of the operand's type
                    None => zero_like(value),
                };
                set_path(doc, field, next)?
            }
            UpdateOperator::Min | UpdateOperator::Max => {
                let want = if op == UpdateOperator::Min { Ordering::Less } else { Ordering::Greater };
                let keep = get_path(doc, field).is_some_and(|cur| compare_bson(value, cur) != want);
                if keep { false } else { set_path(doc, field, value.clone())? }
            }
            UpdateOperator::Rename => {
                let Bson::String(to) = value else {
                    return Err(StoreError::Driver(format!("$rename target for '{field}' must be a string")));
                };
                if is_id_path(to) {
                    return Err(StoreError::Driver("the _id field is immutable".into()));
                }
                if paths_overlap(field, to) {
                    return Err(StoreError::Driver(format!(
                        "$rename source '{field}' and target '{to}' must not overlap"
                    )));
                }
                match get_path(doc, field).cloned() {
                    Some(v) => {
                        unset_path(doc, field)?;
                        set_path(doc, to, v)?;
                        true
                    }
                    None => false,
                }
            }
            UpdateOperator::CurrentDate => {
                let v = current_date_value(value, field)?;
                set_path(doc, field, v)?
            }
        };
    }
    Ok(changed)
}

/// Applies an operator-style update document. The target is only modified if
/// every operator applies cleanly.
///
/// # Errors
/// Returns a driver error for unknown operators, replacement-style documents
/// and operands the operator cannot take.
pub fn apply_update(doc: &mut BsonDocument, update: &BsonDocument) -> Result<bool, StoreError> {
    let mut scratch = doc.clone();
    let mut changed = false;
    for (key, operand) in update {
        let op = UpdateOperator::from_key(key).ok_or_else(|| {
            StoreError::Driver(format!("unknown update operator '{key}'"))
        })?;
        let Bson::Document(fields) = operand else {
            return Err(StoreError::Driver(format!("{key} requires a document operand")));
        };
        changed |= apply_operator(&mut scratch, op, fields)?;
    }
    if changed {
        *doc = scratch;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn dotted_equality() {
        let d = doc! {"user": {"email": "a@x.io"}, "n": 3};
        assert!(eval_filter(&d, &doc! {"user.email": "a@x.io"}).unwrap().is_match());
        assert!(eval_filter(&d, &doc! {"n": 3.0}).unwrap().is_match());
        assert!(!eval_filter(&d, &doc! {"n": 4}).unwrap().is_match());
        assert!(eval_filter(&d, &doc! {}).unwrap().is_match());
    }

    #[test]
    fn inc_keeps_integer_types() {
        let mut d = doc! {"visits": 1, "score": 1.5};
        apply_update(&mut d, &doc! {"$inc": {"visits": 2, "score": 1, "fresh": 5}}).unwrap();
        assert_eq!(d.get_i32("visits").unwrap(), 3);
        assert_eq!(d.get_f64("score").unwrap(), 2.5);
        assert_eq!(d.get_i32("fresh").unwrap(), 5);
    }

    #[test]
    fn failed_update_leaves_document_untouched() {
        let mut d = doc! {"name": "bob", "age": 3};
        let err = apply_update(&mut d, &doc! {"$set": {"age": 4}, "$inc": {"name": 1}});
        assert!(err.is_err());
        assert_eq!(d, doc! {"name": "bob", "age": 3});
    }

    #[test]
    fn min_max_mul_rename_unset() {
        let mut d = doc! {"lo": 5, "hi": 5, "m": 3, "old": "v", "gone": true};
        apply_update(
            &mut d,
            &doc! {
                "$min": {"lo": 2},
                "$max": {"hi": 1},
                "$mul": {"m": 2, "absent": 7},
                "$rename": {"old": "new"},
                "$unset": {"gone": ""},
            },
        )
        .unwrap();
        assert_eq!(d.get_i32("lo").unwrap(), 2);
        assert_eq!(d.get_i32("hi").unwrap(), 5);
        assert_eq!(d.get_i32("m").unwrap(), 6);
        assert_eq!(d.get_i32("absent").unwrap(), 0);
        assert_eq!(d.get_str("new").unwrap(), "v");
        assert!(!d.contains_key("old"));
        assert!(!d.contains_key("gone"));
    }

    #[test]
    fn current_date_and_set_on_insert() {
        let mut d = doc! {"a": 1};
        let changed =
            apply_update(&mut d, &doc! {"$setOnInsert": {"created": 1}}).unwrap();
        assert!(!changed);
        apply_update(&mut d, &doc! {"$currentDate": {"seen": true, "ts": {"$type": "timestamp"}}})
            .unwrap();
        assert!(d.get_datetime("seen").is_ok());
        assert!(d.get_timestamp("ts").is_ok());
    }

    #[test]
    fn replacement_documents_are_rejected() {
        let mut d = doc! {"a": 1};
        assert!(apply_update(&mut d, &doc! {"a": 2}).is_err());
        assert!(apply_update(&mut d, &doc! {"$set": {"_id": 2}}).is_err());
    }

    #[test]
    fn rename_cannot_touch_id_or_overlap() {
        let original = doc! {"_id": 1, "x": "v", "a": {"b": 1}};
        for update in [
            doc! {"$rename": {"x": "_id"}},
            doc! {"$rename": {"x": "_id.sub"}},
            doc! {"$rename": {"x": "x"}},
            doc! {"$rename": {"a": "a.b.c"}},
            doc! {"$rename": {"a.b": "a"}},
        ] {
            let mut d = original.clone();
            assert!(apply_update(&mut d, &update).is_err(), "{update}");
            assert_eq!(d, original);
        }
        let mut d = original.clone();
        apply_update(&mut d, &doc! {"$rename": {"a.b": "ab"}}).unwrap();
        assert_eq!(d, doc! {"_id": 1, "x": "v", "a": {}, "ab": 1});
    }

    #[test]
    fn dotted_set_through_scalar_is_rejected() {
        let mut d = doc! {"title": "keep me"};
        let err = apply_update(&mut d, &doc! {"$set": {"title.sub": 1}}).unwrap_err();
        assert!(matches!(&err, StoreError::Driver(m) if m.contains("cannot create field")));
        assert_eq!(d, doc! {"title": "keep me"});

        apply_update(&mut d, &doc! {"$set": {"meta.tags.first": "a"}}).unwrap();
        assert_eq!(d.get_document("meta").unwrap(), &doc! {"tags": {"first": "a"}});
        assert!(apply_update(&mut d, &doc! {"$inc": {"title.n": 1}}).is_err());
        assert!(apply_update(&mut d, &doc! {"$currentDate": {"title.at": true}}).is_err());
    }
}

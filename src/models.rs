//! Per-entity record types. Handlers work with these; the facade converts
//! them to and from `bson::Document` only when talking to the driver.

use crate::errors::Result;
use crate::query::{Position, Shape, ShapeType};
use bson::Document as BsonDocument;
use bson::oid::ObjectId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the owning service stores this record in by default.
    const COLLECTION: &'static str;

    /// # Errors
    /// Returns a BSON error if the record cannot be encoded.
    fn to_document(&self) -> Result<BsonDocument> {
        Ok(bson::serialize_to_document(self)?)
    }

    /// # Errors
    /// Returns a BSON error if the document does not have this record's shape.
    fn from_document(doc: BsonDocument) -> Result<Self> {
        Ok(bson::deserialize_from_document(doc)?)
    }
}

/// Stored GeoJSON point, `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: ShapeType,
    pub coordinates: Position,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { kind: ShapeType::Point, coordinates: [lon, lat] }
    }

    #[must_use]
    pub const fn lon(&self) -> f64 {
        self.coordinates[0]
    }

    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

impl From<GeoPoint> for Shape {
    fn from(p: GeoPoint) -> Self {
        Self::point(p.lon(), p.lat())
    }
}

/// A short message pinned to a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crumb {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub location: GeoPoint,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

impl Crumb {
    #[must_use]
    pub fn new(location: GeoPoint, message: impl Into<String>, user: impl Into<String>) -> Self {
        Self { id: None, location, message: message.into(), user: user.into() }
    }
}

impl Record for Crumb {
    const COLLECTION: &'static str = "crumbs";
}

/// `follower_user_id` follows `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "followerUserId")]
    pub follower_user_id: String,
}

impl Follow {
    #[must_use]
    pub fn new(user_id: impl Into<String>, follower_user_id: impl Into<String>) -> Self {
        Self { id: None, user_id: user_id.into(), follower_user_id: follower_user_id.into() }
    }
}

impl Record for Follow {
    const COLLECTION: &'static str = "follows";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    #[serde(default)]
    pub username: String,
    /// Already hashed by the account service; stored as given.
    #[serde(rename = "password")]
    pub password_hash: String,
}

impl Record for UserAccount {
    const COLLECTION: &'static str = "users";
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn crumb_document_shape() {
        let c = Crumb::new(GeoPoint::new(-122.66, 45.69), "hi", "ann");
        let d = c.to_document().unwrap();
        assert!(!d.contains_key("_id"));
        assert_eq!(
            d.get_document("location").unwrap(),
            &doc! {"type": "Point", "coordinates": [-122.66, 45.69]}
        );
        assert_eq!(Crumb::from_document(d).unwrap(), c);
    }

    #[test]
    fn follow_uses_camel_case_keys() {
        let d = Follow::new("u1", "u2").to_document().unwrap();
        assert_eq!(d, doc! {"userId": "u1", "followerUserId": "u2"});
    }

    #[test]
    fn user_account_missing_field_is_an_error() {
        assert!(UserAccount::from_document(doc! {"email": "a@x.io"}).is_err());
    }
}

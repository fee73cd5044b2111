use anyhow::Result;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson, Document},
    Collection,
};
use remindr_domain::ID;
use serde::{de::DeserializeOwned, Serialize};
use std::convert::TryFrom;
use tracing::error;

pub trait MongoDocument<E>: Serialize + DeserializeOwned {
    fn to_domain(self) -> E;
    fn from_domain(entity: &E) -> Self;
}

/// Documents written by other clients usually have `ObjectId` ids while the
/// ones inserted from here have string ids, so both representations are accepted.
pub fn id_to_bson(id: &ID) -> Bson {
    match ObjectId::parse_str(id.inner_ref()) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.as_string()),
    }
}

/// Whether `_id` has a type that `bson_to_id` maps without losing information
fn is_supported_id(bson: &Bson) -> bool {
    matches!(
        bson,
        Bson::ObjectId(_) | Bson::String(_) | Bson::Int32(_) | Bson::Int64(_)
    )
}

/// Strings are kept verbatim, never trimmed or validated, so that `id_filter`
/// finds the exact document again
pub fn bson_to_id(bson: &Bson) -> ID {
    match bson {
        Bson::ObjectId(oid) => ID::from(oid.to_hex()),
        Bson::String(s) => ID::from(s.as_str()),
        Bson::Int32(n) => ID::from(n.to_string()),
        Bson::Int64(n) => ID::from(n.to_string()),
        other => ID::from(other.to_string()),
    }
}

/// Matches every `_id` representation `bson_to_id` could have produced `id` from
pub fn id_filter(id: &ID) -> Document {
    let raw = id.inner_ref();
    let mut candidates = vec![Bson::String(id.as_string())];
    if let Ok(oid) = ObjectId::parse_str(raw) {
        candidates.push(Bson::ObjectId(oid));
    }
    if let Ok(n) = raw.parse::<i64>() {
        // "07" or "+7" were never produced from a number
        if n.to_string() == raw {
            if let Ok(n) = i32::try_from(n) {
                candidates.push(Bson::Int32(n));
            }
            candidates.push(Bson::Int64(n));
        }
    }
    doc! {
        "_id": {
            "$in": candidates
        }
    }
}

fn entity_to_persistence<E, D: MongoDocument<E>>(entity: &E) -> Result<Document> {
    let raw = D::from_domain(entity);
    Ok(bson::to_document(&raw)?)
}

fn persistence_to_entity<E, D: MongoDocument<E>>(doc: Document) -> Result<E> {
    match doc.get("_id") {
        Some(id) if is_supported_id(id) => (),
        id => anyhow::bail!("Unsupported _id: {:?}", id),
    }
    let raw: D = bson::from_document(doc)?;
    Ok(raw.to_domain())
}

pub async fn insert<E, D: MongoDocument<E>>(
    collection: &Collection<Document>,
    entity: &E,
) -> Result<()> {
    let doc = entity_to_persistence::<E, D>(entity)?;
    collection.insert_one(doc, None).await?;
    Ok(())
}

pub async fn find_one_by<E, D: MongoDocument<E>>(
    collection: &Collection<Document>,
    filter: Document,
) -> Result<Option<E>> {
    match collection.find_one(filter, None).await? {
        Some(doc) => persistence_to_entity::<E, D>(doc).map(Some),
        None => Ok(None),
    }
}

/// Malformed documents are logged and skipped, a failing query is an error
pub async fn find_many_by<E, D: MongoDocument<E>>(
    collection: &Collection<Document>,
    filter: Document,
) -> Result<Vec<E>> {
    let mut cursor = collection.find(filter, None).await?;
    let mut entities = vec![];
    while let Some(doc) = cursor.try_next().await? {
        let id = doc.get("_id").cloned();
        match persistence_to_entity::<E, D>(doc) {
            Ok(entity) => entities.push(entity),
            Err(err) => error!(
                "Skipping malformed document {:?} in {}: {:?}",
                id,
                collection.name(),
                err
            ),
        }
    }
    Ok(entities)
}

use remindr_domain::{Entity, ID};
use std::sync::Mutex;

/// Useful functions for creating inmemory repositories

pub fn insert<T: Clone>(val: &T, collection: &Mutex<Vec<T>>) {
    let mut collection = collection.lock().unwrap();
    collection.push(val.clone());
}

pub fn find_by<T: Clone, F: FnMut(&T) -> bool>(collection: &Mutex<Vec<T>>, mut compare: F) -> Vec<T> {
    let collection = collection.lock().unwrap();
    let mut items = Vec::new();
    for item in collection.iter() {
        if compare(item) {
            items.push(item.clone());
        }
    }
    items
}

pub fn find_one_by<T: Clone, F: FnMut(&T) -> bool>(
    collection: &Mutex<Vec<T>>,
    compare: F,
) -> Option<T> {
    find_by(collection, compare).into_iter().next()
}

/// Runs `update` on the entity with the given id that also passes `compare`
/// while holding the lock, which makes a read-check-write inside `update`
/// atomic with respect to other callers. Returns `None` if there is no such entity.
pub fn update_one<T, R, P, F>(
    val_id: &ID,
    collection: &Mutex<Vec<T>>,
    mut compare: P,
    update: F,
) -> Option<R>
where
    T: Entity,
    P: FnMut(&T) -> bool,
    F: FnOnce(&mut T) -> R,
{
    let mut collection = collection.lock().unwrap();
    collection
        .iter_mut()
        .find(|item| item.id() == val_id && compare(&**item))
        .map(update)
}

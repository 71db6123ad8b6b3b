use lazy_static::lazy_static;
use std::sync::{PoisonError, RwLock};
pub use string_cache::DefaultAtom as Atom;

lazy_static! {
    static ref TEXT_INTERNER: RwLock<Vec<Atom>> = RwLock::new(Vec::new());
}

/// Intern a label or stimulus word and return its stable ID
pub fn intern_text(s: &str) -> usize {
    let atom = Atom::from(s);
    if let Some(idx) = TEXT_INTERNER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .position(|a| *a == atom)
    {
        return idx;
    }

    let mut v = TEXT_INTERNER.write().unwrap_or_else(PoisonError::into_inner);
    // Another writer may have added it between the two locks.
    match v.iter().position(|a| *a == atom) {
        Some(idx) => idx,
        None => {
            v.push(atom);
            v.len() - 1
        }
    }
}

/// Interns every text up front, e.g. all category names and words of an
/// experiment before the first frame.
pub fn intern_all<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<usize> {
    texts.into_iter().map(intern_text).collect()
}

pub fn get_text(id: usize) -> Option<Atom> {
    TEXT_INTERNER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(id)
        .cloned()
}

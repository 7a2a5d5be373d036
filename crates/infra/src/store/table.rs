use std::collections::HashMap;

use millerp_core::Entity;

/// How to take back one change made since the last commit.
#[derive(Debug)]
enum Undo<T: Entity> {
    /// The row did not exist before.
    Added(T::Id),
    /// The row held this value before.
    Replaced(T),
    /// The row sat at this position before it was removed.
    Removed(usize, T),
}

/// A table whose uncommitted changes can be committed or rolled back.
pub(crate) trait Journal {
    /// Rows touched since the last commit.
    fn changes(&self) -> usize;

    fn commit(&mut self);

    fn rollback(&mut self);
}

/// Rows keyed by entity id, iterated in insertion order.
///
/// Every write is journaled so a failed transaction can be undone without
/// copying the table.
#[derive(Debug)]
pub struct Table<T: Entity> {
    rows: HashMap<T::Id, T>,
    order: Vec<T::Id>,
    journal: Vec<Undo<T>>,
}

impl<T: Entity> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
            journal: Vec::new(),
        }
    }
}

impl<T: Entity + Clone> Table<T> {
    /// Insert or replace a row. A replaced row keeps its position.
    pub fn insert(&mut self, row: T) {
        let id = row.id();
        match self.rows.insert(id, row) {
            Some(previous) => self.journal.push(Undo::Replaced(previous)),
            None => {
                self.order.push(id);
                self.journal.push(Undo::Added(id));
            }
        }
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: T::Id) -> Option<&mut T> {
        let row = self.rows.get_mut(&id)?;
        self.journal.push(Undo::Replaced(row.clone()));
        Some(row)
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn remove(&mut self, id: T::Id) -> Option<T> {
        let position = self.order.iter().position(|k| *k == id)?;
        let row = self.rows.remove(&id)?;
        self.order.remove(position);
        self.journal.push(Undo::Removed(position, row.clone()));
        Some(row)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + Clone + '_ {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Entity + Clone> Journal for Table<T> {
    fn changes(&self) -> usize {
        self.journal.len()
    }

    fn commit(&mut self) {
        self.journal.clear();
    }

    /// Undo in reverse order, so every step sees the state it was made on.
    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Added(id) => {
                    self.rows.remove(&id);
                    if self.order.last() == Some(&id) {
                        self.order.pop();
                    } else {
                        self.order.retain(|k| *k != id);
                    }
                }
                Undo::Replaced(previous) => {
                    self.rows.insert(previous.id(), previous);
                }
                Undo::Removed(position, row) => {
                    let id = row.id();
                    self.order.insert(position.min(self.order.len()), id);
                    self.rows.insert(id, row);
                }
            }
        }
    }
}

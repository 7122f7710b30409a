//! Task arena with generation-stamped ids.

use std::fmt;

use super::behavior::Behavior;

/// Handle for a live task. Slots are reused, so the generation tells a
/// stale handle apart from the slot's current occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId {
    index: u32,
    generation: u32,
}

impl TaskId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Runs its publish step next round.
    Ready,
    /// Suspended until this round's channels resolve.
    Awaiting,
}

pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) behavior: Box<dyn Behavior>,
    pub(crate) state: TaskState,
}

struct Slot {
    generation: u32,
    task: Option<Task>,
}

#[derive(Default)]
pub struct TaskArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
}

impl TaskArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, behavior: Box<dyn Behavior>) -> TaskId {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    task: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = TaskId {
            index,
            generation: slot.generation,
        };
        slot.task = Some(Task {
            id,
            behavior,
            state: TaskState::Ready,
        });
        self.live += 1;
        id
    }

    /// Remove a task permanently. Returns its behavior if the id was live.
    pub fn remove(&mut self, id: TaskId) -> Option<Box<dyn Behavior>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let task = slot.task.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.live -= 1;
        Some(task.behavior)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.get(id).map(|task| task.state)
    }

    pub(crate) fn set_state(&mut self, id: TaskId, state: TaskState) {
        if let Some(task) = self.get_mut(id) {
            task.state = state;
        }
    }

    pub fn name(&self, id: TaskId) -> Option<&str> {
        self.get(id).map(|task| task.behavior.name())
    }

    /// Live tasks in slot order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.slots.iter_mut().filter_map(|slot| slot.task.as_mut())
    }

    fn get(&self, id: TaskId) -> Option<&Task> {
        self.slots
            .get(id.index as usize)
            .and_then(|slot| slot.task.as_ref())
            .filter(|task| task.id == id)
    }

    fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.slots
            .get_mut(id.index as usize)
            .and_then(|slot| slot.task.as_mut())
            .filter(|task| task.id == id)
    }
}

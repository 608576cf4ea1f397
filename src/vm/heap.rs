//! Tracing mark-and-sweep heap (§4.6), grounded on the non-moving
//! reference-counted arena in `examples/scostello-monty/src/heap.rs`:
//! same `Vec<Option<Entry>>` + free-list shape, swapped from refcounting
//! to a mark bit and a byte-budget collection trigger.
use crate::types::{traverse, ObjectData, ObjRef};

const INITIAL_THRESHOLD: usize = 4096;
const GC_THRESHOLD: usize = 16384;

struct Entry {
    marked: bool,
    data: ObjectData,
}

/// Rough per-object accounting weight, used only to decide when to
/// collect -- not an exact byte count.
fn weight(data: &ObjectData) -> usize {
    match data {
        ObjectData::Str(s) => 32 + s.len() * 4,
        ObjectData::List(v) | ObjectData::Tuple(v) => 32 + v.len() * 8,
        _ => 32,
    }
}

pub(crate) struct Heap {
    objects: Vec<Option<Entry>>,
    free_list: Vec<ObjRef>,
    allocated: usize,
    threshold: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            free_list: Vec::new(),
            allocated: 0,
            threshold: INITIAL_THRESHOLD,
        }
    }
}

impl Heap {
    pub fn allocate(&mut self, data: ObjectData) -> ObjRef {
        self.allocated += weight(&data);
        let entry = Entry { marked: false, data };
        if let Some(slot) = self.free_list.pop() {
            self.objects[slot] = Some(entry);
            slot
        } else {
            self.objects.push(Some(entry));
            self.objects.len() - 1
        }
    }

    pub fn get(&self, r: ObjRef) -> &ObjectData {
        &self.objects[r].as_ref().expect("dangling ObjRef").data
    }

    pub fn get_mut(&mut self, r: ObjRef) -> &mut ObjectData {
        &mut self.objects[r].as_mut().expect("dangling ObjRef").data
    }

    pub fn should_collect(&self) -> bool {
        self.allocated >= self.threshold
    }

    /// Mark-and-sweep pass (§4.6): `roots` are scanned first, then the
    /// reachability graph is traced transitively and anything left
    /// unmarked is freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjRef>) {
        let mut stack: Vec<ObjRef> = roots.into_iter().collect();
        while let Some(r) = stack.pop() {
            let already_marked = match &mut self.objects[r] {
                Some(entry) if !entry.marked => {
                    entry.marked = true;
                    false
                }
                _ => true,
            };
            if already_marked {
                continue;
            }
            let data_ptr: *const ObjectData = &self.objects[r].as_ref().unwrap().data;
            // SAFETY: `traverse` only reads `data` and calls `mark`,
            // which pushes onto `stack` -- it never touches `self.objects`.
            traverse(unsafe { &*data_ptr }, &mut |child| stack.push(child));
        }

        for (idx, slot) in self.objects.iter_mut().enumerate() {
            match slot {
                Some(entry) if entry.marked => entry.marked = false,
                Some(entry) => {
                    self.allocated = self.allocated.saturating_sub(weight(&entry.data));
                    *slot = None;
                    self.free_list.push(idx);
                }
                None => {}
            }
        }

        // Coarse doubling-by-chunks: always lands on a multiple of
        // `GC_THRESHOLD` strictly above `allocated` (§4.6).
        self.threshold = GC_THRESHOLD * (self.allocated / GC_THRESHOLD + 1);
    }

    pub fn len(&self) -> usize {
        self.objects.len() - self.free_list.len()
    }
}

//! The built-in iterator object (§4.5 "iterator protocol"): what
//! `getIter` hands back for `List`/`Тuple`/`Рядок`. Exposes a single
//! `next` method, advancing an internal cursor and returning
//! `end_iteration` once exhausted, instead of `FOR_ITER` indexing a
//! snapshot by hand.
use crate::vm::Vm;

use super::base::{IteratorData, ObjRef};
use super::ObjectData;

pub(crate) fn make(vm: &mut Vm, items: Vec<ObjRef>) -> ObjRef {
    vm.alloc_heap(ObjectData::Iterator(IteratorData { items, index: 0 }))
}

/// `next()`: the iterator protocol's sole operation. Returns the next
/// element, or `vm.end_iteration` once the cursor reaches the end.
pub(crate) fn next_method(
    vm: &mut Vm,
    this: Option<ObjRef>,
    _args: &[ObjRef],
) -> Option<ObjRef> {
    let this = this.expect("method call without receiver");
    let end_iteration = vm.end_iteration;
    match vm.heap.get_mut(this) {
        ObjectData::Iterator(it) => {
            if it.index < it.items.len() {
                let item = it.items[it.index];
                it.index += 1;
                Some(item)
            } else {
                Some(end_iteration)
            }
        }
        _ => unreachable!("next() called on a non-iterator"),
    }
}

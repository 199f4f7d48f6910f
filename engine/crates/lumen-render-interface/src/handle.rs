use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// 指向 `HandleRegistry<T>` 中某个 slot 的句柄：(slot index, generation)
///
/// 只有当 registry 在该 slot 上的 generation 与句柄一致时，句柄才有效。
/// slot index 同时也是资源在 bindless 数组中的下标。
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _phantom: PhantomData<fn() -> T>,
}
impl<T> Handle<T> {
    const NULL_INDEX: u32 = u32::MAX;

    #[inline]
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _phantom: PhantomData,
        }
    }

    /// 永远无效的句柄，用于组件的默认值
    #[inline]
    pub fn null() -> Self {
        Self::new(Self::NULL_INDEX, 0)
    }

    /// 从 (index, generation) 重建句柄，是否有效仍然由 registry 判断
    #[inline]
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self::new(index, generation)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.index == Self::NULL_INDEX
    }

    /// slot index，也就是 bindless 数组下标
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}
impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for Handle<T> {}
impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}
impl<T> Default for Handle<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}
impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "Handle<{}>(null)", std::any::type_name::<T>())
        } else {
            write!(f, "Handle<{}>({}v{})", std::any::type_name::<T>(), self.index, self.generation)
        }
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// 已经失效、但是 GPU 可能还在使用的资源
struct Retired<T> {
    index: u32,
    frame_id: u64,
    value: T,
}

/// 带 generation 的 slot 表，独占其中的所有资源
///
/// - 空闲 slot 优先复用 index 最小的那个
/// - 失效句柄的查询只会返回 None，不会看到复用该 slot 的新资源
/// - 只能在单个线程上修改
pub struct HandleRegistry<T> {
    slots: Vec<Slot<T>>,
    /// 最小堆：总是复用 index 最小的空闲 slot
    free_indices: BinaryHeap<Reverse<u32>>,
    /// 已经失效但是还不能释放 slot 的资源
    retired: Vec<Retired<T>>,
    len: usize,
}
impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_indices: BinaryHeap::new(),
            retired: Vec::new(),
            len: 0,
        }
    }
}
// getters
impl<T> HandleRegistry<T> {
    /// 存活的资源数量，不包括 retired 的资源
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 曾经分配过的 slot 数量，也就是 bindless 数组实际用到的长度
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// 下一次 `emplace` 会使用的 slot index
    #[inline]
    pub fn next_index(&self) -> u32 {
        self.free_indices.peek().map_or(self.slots.len() as u32, |Reverse(index)| *index)
    }

    #[inline]
    pub fn has(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    #[inline]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| (Handle::new(index as u32, slot.generation), value))
        })
    }
}
// update
impl<T> HandleRegistry<T> {
    /// 均摊 O(1)
    pub fn emplace(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        if let Some(Reverse(index)) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::new(index, 0)
    }

    /// 移除资源并让所有指向该 slot 的句柄失效，slot 立即可以被复用
    ///
    /// 返回被移除的资源，由调用者完成销毁；失效的句柄返回 None
    pub fn erase(&mut self, handle: Handle<T>) -> Option<T> {
        let value = self.invalidate(handle)?;
        self.free_indices.push(Reverse(handle.index));
        Some(value)
    }

    /// 让句柄立即失效，但是 slot 要等到 `frame_id + frames_in_flight <= current_frame_id`
    /// 时才能被复用，保证 GPU 上还没完成的帧不会读到复用该 slot 的新资源
    pub fn retire(&mut self, handle: Handle<T>, frame_id: u64) -> bool {
        let Some(value) = self.invalidate(handle) else {
            return false;
        };
        self.retired.push(Retired {
            index: handle.index,
            frame_id,
            value,
        });
        true
    }

    /// 回收已经安全的 retired 资源，返回它们以便调用者销毁
    pub fn reclaim(&mut self, current_frame_id: u64, frames_in_flight: u64) -> Vec<T> {
        let mut reclaimed = Vec::new();
        let mut keep = Vec::with_capacity(self.retired.len());
        for retired in self.retired.drain(..) {
            if retired.frame_id + frames_in_flight <= current_frame_id {
                self.free_indices.push(Reverse(retired.index));
                reclaimed.push(retired.value);
            } else {
                keep.push(retired);
            }
        }
        self.retired = keep;
        reclaimed
    }

    /// 取出所有资源（包括 retired 的），用于关闭时统一销毁
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = self.retired.drain(..).map(|r| r.value).collect::<Vec<_>>();
        values.extend(self.slots.drain(..).filter_map(|slot| slot.value));
        self.free_indices.clear();
        self.len = 0;
        values
    }

    fn invalidate(&mut self, handle: Handle<T>) -> Option<T> {
        let valid = self.has(handle);
        debug_assert!(valid || handle.is_null(), "erase on a stale handle: {:?}", handle);
        if !valid {
            return None;
        }

        let slot = &mut self.slots[handle.index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        slot.value.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_never_sees_reused_slot() {
        let mut registry = HandleRegistry::new();
        let a = registry.emplace("a");
        let b = registry.emplace("b");
        assert_eq!(registry.get(a), Some(&"a"));

        assert_eq!(registry.erase(a), Some("a"));
        assert_eq!(registry.get(a), None);
        assert!(!registry.has(a));

        // 复用 a 的 slot
        let c = registry.emplace("c");
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert_eq!(registry.get(a), None);
        assert_eq!(registry.get(c), Some(&"c"));
        assert_eq!(registry.get(b), Some(&"b"));
    }

    #[test]
    fn lowest_free_slot_is_reused_first() {
        let mut registry = HandleRegistry::new();
        let handles = (0..5).map(|i| registry.emplace(i)).collect::<Vec<_>>();
        registry.erase(handles[3]);
        registry.erase(handles[1]);
        registry.erase(handles[4]);

        assert_eq!(registry.next_index(), 1);
        assert_eq!(registry.emplace(10).index(), 1);
        assert_eq!(registry.emplace(11).index(), 3);
        assert_eq!(registry.emplace(12).index(), 4);
        assert_eq!(registry.emplace(13).index(), 5);
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn out_of_range_and_null_handles_miss() {
        let mut registry = HandleRegistry::<u32>::new();
        assert_eq!(registry.get(Handle::null()), None);
        assert_eq!(registry.erase(Handle::null()), None);

        let h = registry.emplace(7);
        let forged = Handle::<u32>::new(h.index() + 10, 0);
        assert_eq!(registry.get(forged), None);
        assert_eq!(registry.get_mut(h).copied(), Some(7));
    }

    #[test]
    fn erase_after_emplace_sequence_keeps_all_old_handles_dead() {
        // 固定的伪随机序列，覆盖大量 emplace/erase 交错
        let mut registry = HandleRegistry::new();
        let mut live: Vec<(Handle<u64>, u64)> = Vec::new();
        let mut dead: Vec<Handle<u64>> = Vec::new();
        let mut seed = 0x2545_f491_u64;
        for step in 0..2000u64 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            if live.is_empty() || seed % 3 != 0 {
                live.push((registry.emplace(step), step));
            } else {
                let (handle, _) = live.swap_remove((seed as usize / 3) % live.len());
                assert!(registry.erase(handle).is_some());
                dead.push(handle);
            }

            for handle in &dead {
                assert_eq!(registry.get(*handle), None);
            }
        }
        for (handle, value) in &live {
            assert_eq!(registry.get(*handle), Some(value));
        }
        assert_eq!(registry.len(), live.len());
        assert_eq!(registry.iter().count(), live.len());
    }

    #[test]
    fn retired_slot_is_held_until_frames_complete() {
        let mut registry = HandleRegistry::new();
        let a = registry.emplace("a");
        let _b = registry.emplace("b");

        assert!(registry.retire(a, 10));
        assert_eq!(registry.get(a), None);
        assert_eq!(registry.retired_count(), 1);

        // slot 0 还不能复用
        assert_eq!(registry.emplace("c").index(), 2);
        assert!(registry.reclaim(12, 3).is_empty());

        let reclaimed = registry.reclaim(13, 3);
        assert_eq!(reclaimed, vec!["a"]);
        assert_eq!(registry.retired_count(), 0);
        assert_eq!(registry.emplace("d").index(), 0);
    }

    #[test]
    fn drain_returns_live_and_retired() {
        let mut registry = HandleRegistry::new();
        let a = registry.emplace(1);
        registry.emplace(2);
        registry.retire(a, 0);

        let mut values = registry.drain();
        values.sort();
        assert_eq!(values, vec![1, 2]);
        assert!(registry.is_empty());
        assert_eq!(registry.slot_count(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "stale handle")]
    fn double_erase_is_asserted_in_debug() {
        let mut registry = HandleRegistry::new();
        let a = registry.emplace(1);
        registry.erase(a);
        registry.erase(a);
    }
}

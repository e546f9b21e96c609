use crate::{config::FRAMES_IN_FLIGHT, error::GfxResult};

/// 可以阻塞等待某个 fence 值的对象，通常是 [`crate::commands::command_queue::GfxCommandQueue`]
pub trait GfxFenceWait {
    fn wait_for_completion(&mut self, value: u64) -> GfxResult<()>;
}

/// 每个 frame slot 的状态：`Idle -> Recording -> Submitted -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxFrameState {
    Idle,
    Recording,
    Submitted,
}

/// `N` 个 frame slot 组成的 ring
///
/// 每个 slot 记录最后一次提交时 signal 的 fence 值。
/// slot 被复用之前，一定会先等待这个值完成，因此 CPU 最多领先 GPU `N` 帧。
pub struct GfxFrameRing<C, const N: usize = FRAMES_IN_FLIGHT> {
    contexts: [C; N],
    fence_values: [u64; N],
    states: [GfxFrameState; N],
    frame_index: usize,
}

// new & init
impl<C, const N: usize> GfxFrameRing<C, N> {
    pub fn new(contexts: [C; N]) -> Self {
        Self {
            contexts,
            fence_values: [0; N],
            states: [GfxFrameState::Idle; N],
            frame_index: 0,
        }
    }
}

// getters
impl<C, const N: usize> GfxFrameRing<C, N> {
    #[inline]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    #[inline]
    pub fn fence_value(&self, slot: usize) -> u64 {
        self.fence_values[slot]
    }

    #[inline]
    pub fn state(&self, slot: usize) -> GfxFrameState {
        self.states[slot]
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.states[self.frame_index] == GfxFrameState::Recording
    }

    #[inline]
    pub fn current(&self) -> &C {
        &self.contexts[self.frame_index]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut C {
        &mut self.contexts[self.frame_index]
    }

    #[inline]
    pub fn contexts(&self) -> &[C; N] {
        &self.contexts
    }

    #[inline]
    pub fn into_contexts(self) -> [C; N] {
        self.contexts
    }
}

// tools
impl<C, const N: usize> GfxFrameRing<C, N> {
    /// 等待当前 slot 上一次提交完成，然后进入 Recording 状态
    ///
    /// 返回的 context 由调用者负责 reset
    ///
    /// # panic
    /// 上一帧还没有 `end` 时 panic
    pub fn begin(&mut self, waiter: &mut impl GfxFenceWait) -> GfxResult<&mut C> {
        let slot = self.frame_index;
        assert_ne!(self.states[slot], GfxFrameState::Recording, "begin_frame called twice without end_frame");

        waiter.wait_for_completion(self.fence_values[slot])?;
        self.states[slot] = GfxFrameState::Recording;
        Ok(&mut self.contexts[slot])
    }

    /// 记录当前 slot 的 fence 值，并前进到下一个 slot
    ///
    /// # panic
    /// 当前 slot 不在 Recording 状态时 panic
    pub fn end(&mut self, fence_value: u64) {
        let slot = self.frame_index;
        assert_eq!(self.states[slot], GfxFrameState::Recording, "end_frame called without begin_frame");
        debug_assert!(fence_value > self.fence_values[slot], "fence values must increase");

        self.fence_values[slot] = fence_value;
        self.states[slot] = GfxFrameState::Submitted;
        self.frame_index = (slot + 1) % N;
    }

    /// 等待所有 slot 的最后一次提交完成
    pub fn wait_all(&mut self, waiter: &mut impl GfxFenceWait) -> GfxResult<()> {
        for slot in 0..N {
            waiter.wait_for_completion(self.fence_values[slot])?;
            if self.states[slot] == GfxFrameState::Submitted {
                self.states[slot] = GfxFrameState::Idle;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fence_counter::GfxFenceCounter;

    /// 模拟 GPU：wait 时立即完成对应的值，并记录所有 wait 过的值
    #[derive(Default)]
    struct MockQueue {
        counter: GfxFenceCounter,
        waited: Vec<u64>,
    }

    impl MockQueue {
        fn signal(&mut self) -> u64 {
            self.counter.issue()
        }
    }

    impl GfxFenceWait for MockQueue {
        fn wait_for_completion(&mut self, value: u64) -> GfxResult<()> {
            assert!(value <= self.counter.last_issued(), "waiting on a value that was never signaled");
            self.waited.push(value);
            self.counter.observe_completed(value);
            Ok(())
        }
    }

    #[test]
    fn test_slot_waits_for_its_own_last_fence() {
        let mut ring = GfxFrameRing::<usize, 2>::new([0, 1]);
        let mut queue = MockQueue::default();

        let mut signaled = Vec::new();
        for frame in 0..10 {
            let slot = ring.frame_index();
            assert!(slot < 2);
            assert_eq!(slot, frame % 2);

            let last_for_slot = ring.fence_value(slot);
            let context = ring.begin(&mut queue).unwrap();
            assert_eq!(*context, slot);
            assert_eq!(queue.waited.last().copied(), Some(last_for_slot));

            let value = queue.signal();
            signaled.push(value);
            ring.end(value);
            assert_eq!(ring.fence_value(slot), value);
            assert_eq!(ring.state(slot), GfxFrameState::Submitted);
        }

        // 第 k 帧等待的是第 k - 2 帧 signal 的值
        for frame in 2..10 {
            assert_eq!(queue.waited[frame], signaled[frame - 2]);
        }
        assert_eq!(&queue.waited[..2], &[0, 0]);
    }

    #[test]
    fn test_three_slots_wrap() {
        let mut ring = GfxFrameRing::<(), 3>::new([(), (), ()]);
        let mut queue = MockQueue::default();
        let mut indices = Vec::new();
        for _ in 0..7 {
            indices.push(ring.frame_index());
            ring.begin(&mut queue).unwrap();
            let value = queue.signal();
            ring.end(value);
        }
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_wait_all_covers_every_slot() {
        let mut ring = GfxFrameRing::<(), 2>::new([(), ()]);
        let mut queue = MockQueue::default();
        for _ in 0..3 {
            ring.begin(&mut queue).unwrap();
            let value = queue.signal();
            ring.end(value);
        }
        queue.waited.clear();

        ring.wait_all(&mut queue).unwrap();
        let mut waited = queue.waited.clone();
        waited.sort();
        assert_eq!(waited, vec![2, 3]);
        assert_eq!(ring.state(0), GfxFrameState::Idle);
        assert_eq!(ring.state(1), GfxFrameState::Idle);
        assert!(queue.counter.is_complete(3));
    }

    #[test]
    #[should_panic(expected = "twice")]
    fn test_begin_twice_panics() {
        let mut ring = GfxFrameRing::<(), 2>::new([(), ()]);
        let mut queue = MockQueue::default();
        ring.begin(&mut queue).unwrap();
        ring.begin(&mut queue).unwrap();
    }

    #[test]
    #[should_panic(expected = "without begin_frame")]
    fn test_end_without_begin_panics() {
        let mut ring = GfxFrameRing::<(), 2>::new([(), ()]);
        ring.end(1);
    }
}

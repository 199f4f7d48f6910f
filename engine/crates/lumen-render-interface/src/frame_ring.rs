use lumen_gfx::GfxError;

/// 一个 ring slot 需要的同步能力，GPU 实现见 `FrameContext`
pub trait FrameSync {
    /// 返回 fence 是否在超时之前 signaled
    fn wait_fence(&mut self, timeout_ns: u64) -> Result<bool, GfxError>;
    fn reset_fence(&mut self) -> Result<(), GfxError>;
    /// slot 的 command buffer 回到初始状态
    fn reset_commands(&mut self) -> Result<(), GfxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Recording,
    Submitted,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameRingError {
    /// GPU 挂起或者设备丢失，无法恢复
    #[error("fence of frame slot {slot} did not signal within {timeout_ns} ns")]
    FenceTimeout { slot: usize, timeout_ns: u64 },

    #[error("frame slot {slot}: illegal transition {from:?} -> {to:?}")]
    IllegalTransition { slot: usize, from: SlotState, to: SlotState },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

/// N 个 frame slot 组成的环，CPU 最多领先 GPU N-1 帧
///
/// 每一帧的生命周期：
/// 1. `begin_frame`：等待当前 slot 上一次的提交完成，进入 Recording
/// 2. `submit_with`：reset fence 并提交，进入 Submitted
/// 3. `advance`：切换到下一个 slot
///
/// 在 Recording 阶段放弃这一帧（例如 swapchain 过期）时调用 `abandon_frame`。
pub struct FrameRing<S: FrameSync> {
    slots: Vec<S>,
    states: Vec<SlotState>,
    current: usize,
    fence_timeout_ns: u64,
}
// new & init
impl<S: FrameSync> FrameRing<S> {
    pub fn new(slots: Vec<S>, fence_timeout_ns: u64) -> Self {
        assert!(!slots.is_empty(), "frame ring needs at least one slot");
        let states = vec![SlotState::Idle; slots.len()];
        Self {
            slots,
            states,
            current: 0,
            fence_timeout_ns,
        }
    }
}
// getters
impl<S: FrameSync> FrameRing<S> {
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn current(&self) -> &S {
        &self.slots[self.current]
    }

    #[inline]
    pub fn current_state(&self) -> SlotState {
        self.states[self.current]
    }

    #[inline]
    pub fn state(&self, slot: usize) -> SlotState {
        self.states[slot]
    }

    #[inline]
    pub fn slots(&self) -> &[S] {
        &self.slots
    }

    /// 已经提交但还没有确认完成的 slot 数量
    #[inline]
    pub fn outstanding_count(&self) -> usize {
        self.states.iter().filter(|s| **s == SlotState::Submitted).count()
    }
}
// update
impl<S: FrameSync> FrameRing<S> {
    pub fn begin_frame(&mut self) -> Result<&mut S, FrameRingError> {
        let _span = tracy_client::span!("FrameRing::begin_frame");

        let slot = self.current;
        match self.states[slot] {
            SlotState::Recording => {
                return Err(FrameRingError::IllegalTransition {
                    slot,
                    from: SlotState::Recording,
                    to: SlotState::Recording,
                });
            }
            SlotState::Submitted => {
                if !self.slots[slot].wait_fence(self.fence_timeout_ns)? {
                    log::error!("frame slot {} fence timeout after {} ns", slot, self.fence_timeout_ns);
                    return Err(FrameRingError::FenceTimeout {
                        slot,
                        timeout_ns: self.fence_timeout_ns,
                    });
                }
                self.states[slot] = SlotState::Idle;
            }
            SlotState::Idle => {}
        }

        self.slots[slot].reset_commands()?;
        self.states[slot] = SlotState::Recording;
        Ok(&mut self.slots[slot])
    }

    /// fence 在执行 `submit` 之前 reset，保证只有真正提交的帧才会让 fence 进入 unsignaled
    pub fn submit_with<R>(
        &mut self,
        submit: impl FnOnce(&mut S) -> Result<R, GfxError>,
    ) -> Result<R, FrameRingError> {
        let slot = self.current;
        self.expect_state(slot, SlotState::Recording, SlotState::Submitted)?;

        let frame = &mut self.slots[slot];
        frame.reset_fence()?;
        match submit(frame) {
            Ok(r) => {
                self.states[slot] = SlotState::Submitted;
                Ok(r)
            }
            Err(e) => {
                // 没有提交成功，fence 不会被 signal，不能再等待它
                self.states[slot] = SlotState::Idle;
                Err(e.into())
            }
        }
    }

    /// 放弃正在录制的帧，slot 回到 Idle
    pub fn abandon_frame(&mut self) -> Result<(), FrameRingError> {
        let slot = self.current;
        self.expect_state(slot, SlotState::Recording, SlotState::Idle)?;
        self.states[slot] = SlotState::Idle;
        Ok(())
    }

    #[inline]
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// 等待所有已提交的 slot 完成，用于 resize 和销毁之前
    pub fn wait_all(&mut self) -> Result<(), FrameRingError> {
        for slot in 0..self.slots.len() {
            if self.states[slot] != SlotState::Submitted {
                continue;
            }
            if !self.slots[slot].wait_fence(self.fence_timeout_ns)? {
                return Err(FrameRingError::FenceTimeout {
                    slot,
                    timeout_ns: self.fence_timeout_ns,
                });
            }
            self.states[slot] = SlotState::Idle;
        }
        Ok(())
    }

    pub fn into_slots(self) -> Vec<S> {
        self.slots
    }

    fn expect_state(&self, slot: usize, expected: SlotState, to: SlotState) -> Result<(), FrameRingError> {
        let from = self.states[slot];
        if from != expected {
            return Err(FrameRingError::IllegalTransition { slot, from, to });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    /// 模拟 GPU：按提交顺序执行，每次 CPU 查询时最多完成一个提交
    #[derive(Default)]
    struct MockGpu {
        queue: VecDeque<usize>,
        completed: Vec<usize>,
    }

    struct MockSlot {
        id: usize,
        gpu: Rc<RefCell<MockGpu>>,
        hang: bool,
        signaled: bool,
        command_resets: usize,
    }
    impl MockSlot {
        fn new(id: usize, gpu: &Rc<RefCell<MockGpu>>) -> Self {
            Self {
                id,
                gpu: gpu.clone(),
                hang: false,
                signaled: true,
                command_resets: 0,
            }
        }

        fn submit(&mut self) -> Result<(), GfxError> {
            self.gpu.borrow_mut().queue.push_back(self.id);
            Ok(())
        }
    }
    impl FrameSync for MockSlot {
        fn wait_fence(&mut self, _timeout_ns: u64) -> Result<bool, GfxError> {
            if self.hang {
                return Ok(false);
            }
            let mut gpu = self.gpu.borrow_mut();
            // 按顺序执行，直到自己的提交完成
            while !self.signaled {
                let Some(done) = gpu.queue.pop_front() else {
                    break;
                };
                gpu.completed.push(done);
                if done == self.id {
                    self.signaled = true;
                }
            }
            Ok(self.signaled)
        }

        fn reset_fence(&mut self) -> Result<(), GfxError> {
            self.signaled = false;
            Ok(())
        }

        fn reset_commands(&mut self) -> Result<(), GfxError> {
            self.command_resets += 1;
            Ok(())
        }
    }

    fn ring(n: usize) -> (FrameRing<MockSlot>, Rc<RefCell<MockGpu>>) {
        let gpu = Rc::new(RefCell::new(MockGpu::default()));
        let slots = (0..n).map(|i| MockSlot::new(i, &gpu)).collect();
        (FrameRing::new(slots, 1_000), gpu)
    }

    #[test]
    fn at_most_n_minus_one_frames_outstanding_while_recording() {
        for n in 1..=4 {
            let (mut ring, _gpu) = ring(n);
            for frame in 0..50 {
                ring.begin_frame().unwrap();
                // 正在录制的 slot 不计入
                assert!(ring.outstanding_count() < n, "n = {}", n);
                ring.submit_with(|slot| slot.submit()).unwrap();
                // 提交之后当前 slot 也在途，环被占满
                assert!(ring.outstanding_count() <= n);
                if frame + 1 >= n {
                    assert_eq!(ring.outstanding_count(), n, "n = {}", n);
                }
                ring.advance();
            }
        }
    }

    #[test]
    fn slot_is_reused_only_after_its_fence_signals() {
        let (mut ring, gpu) = ring(2);
        for _ in 0..6 {
            ring.begin_frame().unwrap();
            ring.submit_with(|slot| slot.submit()).unwrap();
            ring.advance();
        }
        // 6 次提交，最后两次仍然在队列中
        assert_eq!(gpu.borrow().completed, vec![0, 1, 0, 1]);
        assert_eq!(gpu.borrow().queue.len(), 2);
        assert_eq!(ring.slots()[0].command_resets, 3);
    }

    #[test]
    fn fence_timeout_is_an_error() {
        let (mut ring, _gpu) = ring(2);
        ring.begin_frame().unwrap();
        ring.submit_with(|slot| {
            slot.hang = true;
            slot.submit()
        })
        .unwrap();
        ring.advance();
        ring.begin_frame().unwrap();
        ring.submit_with(|slot| slot.submit()).unwrap();
        ring.advance();

        let err = ring.begin_frame().err();
        assert!(matches!(
            err,
            Some(FrameRingError::FenceTimeout {
                slot: 0,
                timeout_ns: 1_000
            })
        ));
        assert_eq!(ring.current_state(), SlotState::Submitted);
    }

    #[test]
    fn abandoned_frame_does_not_wait() {
        let (mut ring, _gpu) = ring(2);
        ring.begin_frame().unwrap();
        ring.abandon_frame().unwrap();
        assert_eq!(ring.current_state(), SlotState::Idle);
        assert_eq!(ring.outstanding_count(), 0);

        // 没有 reset 过 fence，下一次 begin_frame 不需要等待
        ring.begin_frame().unwrap();
        assert!(ring.current().signaled);
    }

    #[test]
    fn illegal_transitions() {
        let (mut ring, _gpu) = ring(2);
        assert!(matches!(
            ring.submit_with(|slot| slot.submit()),
            Err(FrameRingError::IllegalTransition {
                from: SlotState::Idle,
                to: SlotState::Submitted,
                ..
            })
        ));
        ring.begin_frame().unwrap();
        assert!(matches!(
            ring.begin_frame(),
            Err(FrameRingError::IllegalTransition {
                from: SlotState::Recording,
                ..
            })
        ));
    }

    #[test]
    fn failed_submit_returns_slot_to_idle() {
        let (mut ring, _gpu) = ring(1);
        ring.begin_frame().unwrap();
        let result = ring.submit_with(|_| Err::<(), _>(GfxError::NoGraphicsQueue));
        assert!(matches!(result, Err(FrameRingError::Gfx(GfxError::NoGraphicsQueue))));
        assert_eq!(ring.current_state(), SlotState::Idle);
        ring.begin_frame().unwrap();
    }

    #[test]
    fn wait_all_drains_the_ring() {
        let (mut ring, gpu) = ring(3);
        for _ in 0..3 {
            ring.begin_frame().unwrap();
            ring.submit_with(|slot| slot.submit()).unwrap();
            ring.advance();
        }
        assert_eq!(ring.outstanding_count(), 3);
        ring.wait_all().unwrap();
        assert_eq!(ring.outstanding_count(), 0);
        assert!(gpu.borrow().queue.is_empty());
    }
}

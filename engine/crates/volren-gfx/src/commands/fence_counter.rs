/// 单调递增的 fence 计数
///
/// 值 0 表示还没有提交过任何工作，第一个有效值是 1
#[derive(Debug, Clone)]
pub struct GfxFenceCounter {
    /// 下一次 signal 使用的值
    next_value: u64,
    /// 已知 GPU 已经完成的值
    completed_value: u64,
}

impl Default for GfxFenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl GfxFenceCounter {
    pub fn new() -> Self {
        Self {
            next_value: 1,
            completed_value: 0,
        }
    }

    /// 下一次 signal 将使用的值，不改变计数
    #[inline]
    pub fn peek(&self) -> u64 {
        self.next_value
    }

    /// 确认 `value` 已经提交给 GPU
    #[inline]
    pub fn commit(&mut self, value: u64) {
        assert_eq!(value, self.next_value, "fence values must be committed in order");
        self.next_value += 1;
    }

    /// 返回当前值，然后自增
    #[inline]
    pub fn issue(&mut self) -> u64 {
        let value = self.peek();
        self.commit(value);
        value
    }

    /// 用下一个值调用 `submit`，只有成功时才自增
    ///
    /// 提交失败的值不会被 GPU signal，不能计入 `last_issued`，否则等待它会永远阻塞
    pub fn issue_with<E>(&mut self, submit: impl FnOnce(u64) -> Result<(), E>) -> Result<u64, E> {
        let value = self.peek();
        submit(value)?;
        self.commit(value);
        Ok(value)
    }

    /// 最近一次 signal 的值，0 表示从未 signal
    #[inline]
    pub fn last_issued(&self) -> u64 {
        self.next_value - 1
    }

    #[inline]
    pub fn completed_value(&self) -> u64 {
        self.completed_value
    }

    #[inline]
    pub fn is_complete(&self, value: u64) -> bool {
        value <= self.completed_value
    }

    /// 记录从 GPU 读取到的完成值，完成值只会增加
    #[inline]
    pub fn observe_completed(&mut self, value: u64) {
        debug_assert!(value <= self.last_issued(), "gpu completed a fence value ({value}) that was never signaled");
        self.completed_value = self.completed_value.max(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_is_one() {
        let mut counter = GfxFenceCounter::new();
        assert_eq!(counter.last_issued(), 0);
        assert_eq!(counter.issue(), 1);
        assert_eq!(counter.issue(), 2);
        assert_eq!(counter.last_issued(), 2);
    }

    #[test]
    fn test_failed_submit_is_not_issued() {
        let mut counter = GfxFenceCounter::new();
        counter.issue();

        let result: Result<u64, &str> = counter.issue_with(|value| {
            assert_eq!(value, 2);
            Err("out of host memory")
        });
        assert_eq!(result, Err("out of host memory"));
        assert_eq!(counter.last_issued(), 1);
        assert_eq!(counter.peek(), 2);

        let result: Result<u64, &str> = counter.issue_with(|_| Ok(()));
        assert_eq!(result, Ok(2));
        assert_eq!(counter.last_issued(), 2);
    }

    #[test]
    #[should_panic(expected = "committed in order")]
    fn test_commit_out_of_order() {
        let mut counter = GfxFenceCounter::new();
        counter.commit(3);
    }

    #[test]
    fn test_value_zero_is_always_complete() {
        let counter = GfxFenceCounter::new();
        assert!(counter.is_complete(0));
        assert!(!counter.is_complete(1));
    }

    #[test]
    fn test_completed_never_goes_backwards() {
        let mut counter = GfxFenceCounter::new();
        for _ in 0..5 {
            counter.issue();
        }
        counter.observe_completed(4);
        counter.observe_completed(2);
        assert_eq!(counter.completed_value(), 4);
        assert!(counter.is_complete(3));
        assert!(!counter.is_complete(5));
    }
}

/// buffer 与 texture 大小的对齐单位，同时也是 constant buffer 的对齐要求
pub const RESOURCE_ALIGNMENT: u64 = 256;

/// 将 `value` 向上取整到 `alignment` 的整数倍
///
/// `alignment` 必须是 2 的幂
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up_256() {
        assert_eq!(align_up(0, RESOURCE_ALIGNMENT), 0);
        assert_eq!(align_up(1, RESOURCE_ALIGNMENT), 256);
        assert_eq!(align_up(255, RESOURCE_ALIGNMENT), 256);
        assert_eq!(align_up(256, RESOURCE_ALIGNMENT), 256);
        assert_eq!(align_up(257, RESOURCE_ALIGNMENT), 512);
        assert_eq!(align_up(36 * 12, RESOURCE_ALIGNMENT), 512);
    }

    #[test]
    fn test_align_up_properties() {
        for size in (0..4096u64).step_by(7) {
            let aligned = align_up(size, RESOURCE_ALIGNMENT);
            assert_eq!(aligned % RESOURCE_ALIGNMENT, 0);
            assert!(aligned >= size);
            assert!(aligned - size < RESOURCE_ALIGNMENT);
            // 幂等
            assert_eq!(align_up(aligned, RESOURCE_ALIGNMENT), aligned);
        }
    }
}

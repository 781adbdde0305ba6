/*
    FNV-1a，字符串驻留池用的内容哈希
 */

const FNV_OFFSET_BASIS: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::fnv1a;

    #[test]
    fn same_content_same_hash() {
        assert_eq!(fnv1a(b"string"), fnv1a(b"string"));
        assert_ne!(fnv1a(b"string"), fnv1a(b"strinh"));
    }

    #[test]
    fn empty_is_offset_basis() {
        assert_eq!(fnv1a(b""), 2166136261);
    }
}

#[must_use]
pub(crate) const fn make_four(cc: &[u8]) -> u32 {
    let buffer = match cc.len() {
        0 => [0, 0, 0, 0],
        1 => [cc[0], 0, 0, 0],
        2 => [cc[0], cc[1], 0, 0],
        3 => [cc[0], cc[1], cc[2], 0],
        _ => [cc[0], cc[1], cc[2], cc[3]],
    };
    u32::from_le_bytes(buffer)
}

#[test]
fn test() {
    assert_eq!(make_four(b""), 0x00000000);
    assert_eq!(make_four(b"RPF"), 0x00465052);
    assert_eq!(make_four(b"RPF7"), 0x37465052);
    assert_eq!(make_four(b"RSC7"), 0x37435352);
    assert_eq!(make_four(b"OPEN"), 0x4E45504F);
    assert_eq!(make_four(b"OPEN7"), 0x4E45504F);
}

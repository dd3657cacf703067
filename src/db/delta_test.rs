use super::*;

#[test]
fn test_delta_new() {
    let delta = Delta::new_upsert(0x1234_u64, 1);
    assert_eq!(delta.to_seqno(), 1);
    assert_eq!(delta.to_delta(), Some(0x1234));
    assert_eq!(delta.unpack(), (1, Some(&0x1234)));
    assert!(!delta.is_deleted());

    let delta: Delta<u64> = Delta::new_delete(2);
    assert_eq!(delta.to_seqno(), 2);
    assert_eq!(delta.to_delta(), None);
    assert_eq!(delta.unpack(), (2, None));
    assert!(delta.is_deleted());
}

#[test]
fn test_delta_equality() {
    let a = Delta::new_upsert(1_u64, 1);
    let b = Delta::new_upsert(1_u64, 1);
    let c = Delta::new_upsert(2_u64, 1);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

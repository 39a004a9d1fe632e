use super::*;

#[test]
fn step_id_none_is_no_step_sentinel() {
    assert!(StepId::NONE.is_none());
    assert_eq!(StepId::NONE.get(), NO_STEP);
    assert_eq!(StepId::default(), StepId::NONE);
}

#[test]
fn step_id_from_u32_is_not_none_unless_sentinel() {
    let step = StepId::from(3);
    assert!(!step.is_none());
    assert_eq!(step.get(), 3);
}

#[yare::parameterized(
    zero = { JobId::new(0), "0" },
    small = { JobId::new(42), "42" },
    large = { JobId::new(123456), "123456" },
)]
fn display_matches_inner_value(id: JobId, expected: &str) {
    assert_eq!(id.to_string(), expected);
}

#[test]
fn ids_order_numerically() {
    assert!(JobId::new(1) < JobId::new(2));
    assert!(GlobalTaskId::new(0) < GlobalTaskId::new(1));
}

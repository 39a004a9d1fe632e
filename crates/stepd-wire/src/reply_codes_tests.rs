use super::*;

#[yare::parameterized(
    success = (0, true),
    already_done = (1, true),
    invalid_job_id = (2, true),
    other_failure = (17, false),
)]
fn collapse_rule_cases(raw: i32, expect_success: bool) {
    assert_eq!(ReplyCode::from_raw(raw).is_success(), expect_success);
}

#[test]
fn other_preserves_the_raw_code() {
    assert_eq!(ReplyCode::from_raw(17), ReplyCode::Other(17));
}

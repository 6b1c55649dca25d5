use super::*;
use crate::recurrence::MS_PER_DAY;

fn member(id: &str) -> MemberId {
    MemberId::try_new(id).unwrap()
}

fn owned(assignee: &str) -> Assignment {
    Assignment::new_available(
        AssignmentId::try_new("ASN-0001").unwrap(),
        TemplateId::try_new("CHORE-0001").unwrap(),
        Slot::Member(member(assignee)),
    )
}

fn pooled() -> Assignment {
    Assignment::new_available(
        AssignmentId::try_new("ASN-0002").unwrap(),
        TemplateId::try_new("CHORE-0002").unwrap(),
        Slot::Pool,
    )
}

fn fixed_dollar() -> RewardPolicy {
    RewardPolicy::fixed(Money::from_cents(100)).unwrap()
}

#[test]
fn owner_completes_available_assignment() {
    let once = Recurrence::one_time();
    let done = owned("ann").complete(&member("ann"), &once, 50).unwrap();
    assert_eq!(done.state, AssignmentState::Completed);
    assert_eq!(done.completed_at_ms, Some(50));
    assert_eq!(done.assignee_id, Some(member("ann")));
}

#[test]
fn other_members_cannot_complete_owned_assignment() {
    let once = Recurrence::one_time();
    assert_eq!(
        owned("ann").complete(&member("bob"), &once, 50).unwrap_err(),
        TransitionError::NotAssignee
    );
}

#[test]
fn completing_twice_is_a_state_error() {
    let once = Recurrence::one_time();
    let done = owned("ann").complete(&member("ann"), &once, 50).unwrap();
    assert_eq!(
        done.complete(&member("ann"), &once, 60).unwrap_err(),
        TransitionError::WrongState {
            expected: AssignmentState::Available,
            actual: AssignmentState::Completed,
        }
    );
}

#[test]
fn approve_requires_completion() {
    let once = Recurrence::one_time();
    let err = owned("ann")
        .approve(&fixed_dollar(), &once, None, 10)
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::WrongState {
            actual: AssignmentState::Available,
            ..
        }
    ));
}

#[test]
fn approval_records_reward_and_cooldown() {
    let weekly = Recurrence::recurring(7).unwrap();
    let done = owned("ann").complete(&member("ann"), &weekly, 10).unwrap();
    let (approved, amount) = done.approve(&fixed_dollar(), &weekly, None, 20).unwrap();
    assert_eq!(amount, Money::from_cents(100));
    assert_eq!(approved.state, AssignmentState::Approved);
    assert_eq!(approved.approved_at_ms, Some(20));
    assert_eq!(approved.approved_reward, Some(Money::from_cents(100)));
    assert_eq!(approved.next_available_at_ms, Some(20 + 7 * MS_PER_DAY));
}

#[test]
fn out_of_range_reward_leaves_assignment_completed() {
    let once = Recurrence::one_time();
    let policy = RewardPolicy::range(Money::from_cents(300), Money::from_cents(1000)).unwrap();
    let done = owned("ann").complete(&member("ann"), &once, 10).unwrap();

    let err = done
        .approve(&policy, &once, Some(Money::from_cents(1500)), 20)
        .unwrap_err();
    assert!(matches!(err, TransitionError::Validation(ref v) if v.field == "chosenReward"));
    assert_eq!(done.state, AssignmentState::Completed);

    let (approved, amount) = done
        .approve(&policy, &once, Some(Money::from_cents(700)), 30)
        .unwrap();
    assert_eq!(amount, Money::from_cents(700));
    assert_eq!(approved.approved_reward, Some(Money::from_cents(700)));
}

#[test]
fn rejection_round_trip_clears_reason_on_recompletion() {
    let once = Recurrence::one_time();
    let done = owned("ann").complete(&member("ann"), &once, 10).unwrap();

    let rejected = done.reject("  floor still muddy ").unwrap();
    assert_eq!(rejected.state, AssignmentState::Available);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("floor still muddy"));
    assert_eq!(rejected.completed_at_ms, None);
    assert!(rejected.was_rejected());

    let redone = rejected.complete(&member("ann"), &once, 11).unwrap();
    assert_eq!(redone.state, AssignmentState::Completed);
    assert_eq!(redone.completed_at_ms, Some(11));
    assert_eq!(redone.rejection_reason, None);
}

#[test]
fn rejection_needs_a_reason() {
    let once = Recurrence::one_time();
    let done = owned("ann").complete(&member("ann"), &once, 10).unwrap();
    let err = done.reject("   ").unwrap_err();
    assert_eq!(
        err,
        TransitionError::Validation(ValidationError::new("reason", "must not be empty"))
    );
    assert!(done.reject(&"x".repeat(MAX_REJECTION_REASON_LEN + 1)).is_err());
}

#[test]
fn one_time_approval_is_terminal() {
    let once = Recurrence::one_time();
    let done = owned("ann").complete(&member("ann"), &once, 10).unwrap();
    let (approved, _) = done.approve(&fixed_dollar(), &once, None, 20).unwrap();

    let far_future = 20 + 365 * MS_PER_DAY;
    assert!(!approved.needs_reset(&once, far_future));
    assert_eq!(
        approved.complete(&member("ann"), &once, far_future).unwrap_err(),
        TransitionError::AlreadyApproved
    );
}

#[test]
fn recurring_assignment_reopens_after_cooldown() {
    let weekly = Recurrence::recurring(7).unwrap();
    let done = owned("ann").complete(&member("ann"), &weekly, 0).unwrap();
    let approved_at = 1_000;
    let (approved, _) = done.approve(&fixed_dollar(), &weekly, None, approved_at).unwrap();

    let six_days = approved_at + 6 * MS_PER_DAY;
    assert!(!approved.is_available_to(&member("ann"), &weekly, six_days));
    assert_eq!(
        approved.complete(&member("ann"), &weekly, six_days).unwrap_err(),
        TransitionError::CoolingDown {
            until_ms: approved_at + 7 * MS_PER_DAY
        }
    );

    let seven_days = approved_at + 7 * MS_PER_DAY;
    assert!(approved.is_available_to(&member("ann"), &weekly, seven_days));
    let reopened = approved.refreshed(&weekly, seven_days);
    assert_eq!(reopened.state, AssignmentState::Available);
    assert_eq!(reopened.round, approved.round + 1);
    assert_eq!(reopened.approved_reward, None);
    assert_eq!(reopened.assignee_id, Some(member("ann")));

    let again = approved.complete(&member("ann"), &weekly, seven_days).unwrap();
    assert_eq!(again.state, AssignmentState::Completed);
    assert_eq!(again.round, 2);
}

#[test]
fn pool_assignment_is_claimed_and_returned() {
    let once = Recurrence::one_time();
    let pool = pooled();
    assert!(pool.is_available_to(&member("bob"), &once, 0));
    assert!(pool.is_available_to(&member("cat"), &once, 0));

    let claimed = pool.complete(&member("bob"), &once, 5).unwrap();
    assert_eq!(claimed.assignee_id, Some(member("bob")));
    assert!(claimed.is_open());
    assert!(!claimed.is_available_to(&member("cat"), &once, 6));

    let returned = claimed.reject("not done").unwrap();
    assert_eq!(returned.assignee_id, None);
    assert!(!returned.is_open());
    assert!(returned.is_available_to(&member("cat"), &once, 7));
}

#[test]
fn recurring_pool_assignment_returns_to_pool_after_cooldown() {
    let daily = Recurrence::recurring(1).unwrap();
    let claimed = pooled().complete(&member("bob"), &daily, 0).unwrap();
    let (approved, _) = claimed.approve(&fixed_dollar(), &daily, None, 10).unwrap();
    assert!(approved.is_open());

    let reopened = approved.refreshed(&daily, 10 + MS_PER_DAY);
    assert_eq!(reopened.assignee_id, None);
    assert!(!reopened.is_open());
    assert!(reopened.is_available_to(&member("cat"), &daily, 10 + MS_PER_DAY));
}

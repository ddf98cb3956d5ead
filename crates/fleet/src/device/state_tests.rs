use super::*;

#[test]
fn off_requires_three_suppressed_observations_before_emitting() {
    let mut tracker = OnlineTracker::new();
    // Starts OFF already; first three OFF observations do not re-emit.
    assert_eq!(tracker.observe(OnlineState::Off), None);

    // Flip to ON first so the next OFF run starts from a non-OFF state.
    assert_eq!(tracker.observe(OnlineState::On), Some(OnlineState::On));

    assert_eq!(tracker.observe(OnlineState::Off), None);
    assert_eq!(tracker.observe(OnlineState::Off), None);
    assert_eq!(tracker.observe(OnlineState::Off), None);
    assert_eq!(tracker.observe(OnlineState::Off), Some(OnlineState::Off));
}

#[test]
fn non_off_observation_resets_the_offline_streak() {
    let mut tracker = OnlineTracker::new();
    tracker.observe(OnlineState::On);

    assert_eq!(tracker.observe(OnlineState::Off), None);
    assert_eq!(tracker.observe(OnlineState::Off), None);
    // A PARTIAL observation resets the streak before OFF latches.
    assert_eq!(tracker.observe(OnlineState::Partial), Some(OnlineState::Partial));
    assert_eq!(tracker.observe(OnlineState::Off), None);
}

#[test]
fn repeated_identical_state_does_not_re_emit() {
    let mut tracker = OnlineTracker::new();
    assert_eq!(tracker.observe(OnlineState::On), Some(OnlineState::On));
    assert_eq!(tracker.observe(OnlineState::On), None);
    assert_eq!(tracker.observe(OnlineState::On), None);
}

#[test]
fn first_observation_marks_initialized() {
    let mut tracker = OnlineTracker::new();
    assert!(!tracker.is_initialized());
    tracker.observe(OnlineState::Off);
    assert!(tracker.is_initialized());
}

#[test]
fn action_flags_reconcile_drops_inconsistent_targets() {
    let mut flags = ActionFlags { should_wake: true, should_shutdown: true, should_reboot: true };
    flags.reconcile(OnlineState::On);
    assert!(!flags.should_wake);
    assert!(flags.should_shutdown);
    assert!(!flags.should_reboot);

    flags.should_reboot = true;
    flags.reconcile(OnlineState::Off);
    assert!(!flags.should_shutdown);
    assert!(flags.should_reboot);
}

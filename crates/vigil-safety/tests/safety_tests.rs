#[cfg(test)]
mod tests {
    // ── Governor check ordering ────────────────────────────────

    mod governor {
        use std::time::Duration;
        use vigil_config::{RestrictedZone, SafetyConfig};
        use vigil_core::{Action, ActionSource};
        use vigil_safety::governor::{VETO_FORBIDDEN_WINDOW, VETO_RATE_LIMIT, VETO_RESTRICTED_ZONE};
        use vigil_safety::{EvalContext, SafetyGovernor, Verdict};

        fn config() -> SafetyConfig {
            SafetyConfig {
                max_actions: 5,
                window_secs: 10,
                restricted_zones: vec![RestrictedZone {
                    x: 0,
                    y: 0,
                    width: 50,
                    height: 50,
                }],
                forbidden_titles: vec!["Bank".into(), "password manager".into()],
            }
        }

        fn ctx() -> EvalContext {
            EvalContext::new(ActionSource::Api)
        }

        #[test]
        fn test_move_inside_zone_vetoed() {
            let governor = SafetyGovernor::new(&config());
            let verdict = governor.evaluate(&Action::Move { x: 10, y: 10 }, &ctx());
            assert_eq!(verdict, Verdict::Veto(VETO_RESTRICTED_ZONE.into()));
        }

        #[test]
        fn test_move_outside_zone_allowed() {
            let governor = SafetyGovernor::new(&config());
            let verdict = governor.evaluate(&Action::Move { x: 500, y: 500 }, &ctx());
            assert_eq!(verdict, Verdict::Allow);
        }

        #[test]
        fn test_click_with_coordinates_inside_zone_vetoed() {
            let governor = SafetyGovernor::new(&config());
            let action = Action::Click {
                button: 1,
                x: Some(25),
                y: Some(25),
            };
            assert_eq!(
                governor.evaluate(&action, &ctx()),
                Verdict::Veto(VETO_RESTRICTED_ZONE.into())
            );
        }

        #[test]
        fn test_click_without_coordinates_skips_zone_check() {
            let governor = SafetyGovernor::new(&config());
            let action = Action::Click {
                button: 1,
                x: None,
                y: None,
            };
            assert_eq!(governor.evaluate(&action, &ctx()), Verdict::Allow);
        }

        #[test]
        fn test_vetoed_action_does_not_consume_rate_slot() {
            let governor = SafetyGovernor::new(&config());
            for _ in 0..10 {
                let v = governor.evaluate(&Action::Move { x: 10, y: 10 }, &ctx());
                assert_eq!(v, Verdict::Veto(VETO_RESTRICTED_ZONE.into()));
            }
            assert_eq!(governor.rate_occupancy(), 0);
            // A legal action still fits.
            assert_eq!(
                governor.evaluate(&Action::Move { x: 500, y: 500 }, &ctx()),
                Verdict::Allow
            );
        }

        #[test]
        fn test_sixth_action_in_window_rate_limited() {
            let governor = SafetyGovernor::new(&config());
            for _ in 0..5 {
                let action = Action::Click {
                    button: 1,
                    x: Some(500),
                    y: Some(500),
                };
                assert_eq!(governor.evaluate(&action, &ctx()), Verdict::Allow);
            }
            let action = Action::Click {
                button: 1,
                x: Some(500),
                y: Some(500),
            };
            assert_eq!(
                governor.evaluate(&action, &ctx()),
                Verdict::Veto(VETO_RATE_LIMIT.into())
            );
        }

        #[test]
        fn test_admission_resumes_after_window_elapses() {
            let mut cfg = config();
            cfg.max_actions = 1;
            cfg.window_secs = 1;
            let governor = SafetyGovernor::new(&cfg);
            assert_eq!(governor.evaluate(&Action::ListWindows, &ctx()), Verdict::Allow);
            assert_eq!(
                governor.evaluate(&Action::ListWindows, &ctx()),
                Verdict::Veto(VETO_RATE_LIMIT.into())
            );
            std::thread::sleep(Duration::from_millis(1100));
            assert_eq!(governor.evaluate(&Action::ListWindows, &ctx()), Verdict::Allow);
        }

        #[test]
        fn test_forbidden_window_title_vetoed() {
            let governor = SafetyGovernor::new(&config());
            let action = Action::ActivateWindow {
                id: "0x01".into(),
            };
            let ctx = EvalContext::new(ActionSource::Autonomous)
                .with_window_title("My Bank — Mozilla Firefox");
            assert_eq!(
                governor.evaluate(&action, &ctx),
                Verdict::Veto(VETO_FORBIDDEN_WINDOW.into())
            );
        }

        #[test]
        fn test_forbidden_title_match_is_case_insensitive() {
            let governor = SafetyGovernor::new(&config());
            let action = Action::ActivateWindow {
                id: "0x01".into(),
            };
            let ctx = EvalContext::new(ActionSource::Api).with_window_title("PASSWORD MANAGER");
            assert_eq!(
                governor.evaluate(&action, &ctx),
                Verdict::Veto(VETO_FORBIDDEN_WINDOW.into())
            );
        }

        #[test]
        fn test_unrelated_window_title_allowed() {
            let governor = SafetyGovernor::new(&config());
            let action = Action::ActivateWindow {
                id: "0x01".into(),
            };
            let ctx = EvalContext::new(ActionSource::Api).with_window_title("Text Editor");
            assert_eq!(governor.evaluate(&action, &ctx), Verdict::Allow);
        }
    }

    // ── Emergency stop ─────────────────────────────────────────

    mod emergency {
        use vigil_config::SafetyConfig;
        use vigil_core::{Action, ActionSource};
        use vigil_safety::governor::VETO_EMERGENCY_STOP;
        use vigil_safety::{EvalContext, SafetyGovernor, Verdict};

        #[test]
        fn test_emergency_stop_vetoes_everything() {
            let governor = SafetyGovernor::new(&SafetyConfig::default());
            governor.trigger_emergency_stop();

            let actions = [
                Action::Move { x: 500, y: 500 },
                Action::TypeText { text: "hi".into() },
                Action::KeyChord {
                    chord: "Return".into(),
                },
                Action::ListWindows,
            ];
            for action in &actions {
                for source in [ActionSource::Api, ActionSource::Autonomous] {
                    let verdict = governor.evaluate(action, &EvalContext::new(source));
                    assert_eq!(verdict, Verdict::Veto(VETO_EMERGENCY_STOP.into()));
                }
            }
        }

        #[test]
        fn test_trigger_is_idempotent() {
            let governor = SafetyGovernor::new(&SafetyConfig::default());
            governor.trigger_emergency_stop();
            governor.trigger_emergency_stop();
            assert!(governor.is_emergency_stopped());
        }

        #[test]
        fn test_reset_restores_evaluation() {
            let governor = SafetyGovernor::new(&SafetyConfig::default());
            governor.trigger_emergency_stop();
            assert!(governor.is_emergency_stopped());

            governor.reset_emergency_stop();
            assert!(!governor.is_emergency_stopped());
            let verdict = governor.evaluate(
                &Action::Move { x: 500, y: 500 },
                &EvalContext::new(ActionSource::Api),
            );
            assert_eq!(verdict, Verdict::Allow);
        }

        #[test]
        fn test_emergency_stop_checked_before_rate_limit() {
            let config = SafetyConfig {
                max_actions: 1,
                window_secs: 60,
                ..Default::default()
            };
            let governor = SafetyGovernor::new(&config);
            // Exhaust the window, then latch. Emergency wins the ordering.
            governor.evaluate(&Action::ListWindows, &EvalContext::new(ActionSource::Api));
            governor.trigger_emergency_stop();
            let verdict =
                governor.evaluate(&Action::ListWindows, &EvalContext::new(ActionSource::Api));
            assert_eq!(verdict, Verdict::Veto(VETO_EMERGENCY_STOP.into()));
        }
    }
}

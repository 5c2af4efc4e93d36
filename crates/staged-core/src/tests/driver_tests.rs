use super::*;

#[derive(Default)]
struct LogTarget {
    calls: Vec<String>,
}

impl OutputTarget for LogTarget {
    fn render_into_buffer(
        &mut self,
        parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError> {
        self.calls.push(format!("buffer {parent}<-{child} {placement:?}"));
        Ok(())
    }

    fn insert_into_surface(
        &mut self,
        parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError> {
        self.calls.push(format!("surface {parent}<-{child} {placement:?}"));
        Ok(())
    }

    fn destroy_output(&mut self, child: NodeId) -> Result<(), MaterializeError> {
        self.calls.push(format!("destroy {child}"));
        Ok(())
    }
}

const STATES: [MaterializationState; 3] = [
    MaterializationState::Unmaterialized,
    MaterializationState::Buffered,
    MaterializationState::Materialized,
];

#[test]
fn unmaterialized_defers_everything() {
    for op in [
        DriverOp::Append { child: 1 },
        DriverOp::Insert {
            child: 1,
            predecessor: Some(2),
        },
        DriverOp::Remove { child: 1 },
    ] {
        assert_eq!(plan(MaterializationState::Unmaterialized, op), Effect::Deferred);
    }
}

#[test]
fn buffered_inserts_prepend_or_follow_predecessor() {
    assert_eq!(
        plan(
            MaterializationState::Buffered,
            DriverOp::Insert {
                child: 4,
                predecessor: None
            }
        ),
        Effect::RenderIntoBuffer {
            child: 4,
            placement: Placement::Prepend
        }
    );
    assert_eq!(
        plan(
            MaterializationState::Buffered,
            DriverOp::Insert {
                child: 4,
                predecessor: Some(3)
            }
        ),
        Effect::RenderIntoBuffer {
            child: 4,
            placement: Placement::After(3)
        }
    );
    assert_eq!(
        plan(MaterializationState::Buffered, DriverOp::Append { child: 4 }),
        Effect::RenderIntoBuffer {
            child: 4,
            placement: Placement::Append
        }
    );
}

#[test]
fn buffered_removals_are_discarded() {
    assert_eq!(
        plan(MaterializationState::Buffered, DriverOp::Remove { child: 9 }),
        Effect::Discard
    );
}

#[test]
fn materialized_inserts_and_removes_touch_the_surface() {
    assert_eq!(
        plan(
            MaterializationState::Materialized,
            DriverOp::Insert {
                child: 2,
                predecessor: None
            }
        ),
        Effect::InsertIntoSurface {
            child: 2,
            placement: Placement::Prepend
        }
    );
    assert_eq!(
        plan(
            MaterializationState::Materialized,
            DriverOp::Insert {
                child: 2,
                predecessor: Some(1)
            }
        ),
        Effect::InsertIntoSurface {
            child: 2,
            placement: Placement::After(1)
        }
    );
    assert_eq!(
        plan(MaterializationState::Materialized, DriverOp::Remove { child: 2 }),
        Effect::DestroyOutput { child: 2 }
    );
}

#[test]
fn perform_routes_effects_to_the_target() {
    let mut target = LogTarget::default();
    for state in STATES {
        for op in [
            DriverOp::Insert {
                child: 5,
                predecessor: Some(4),
            },
            DriverOp::Remove { child: 5 },
        ] {
            plan(state, op).perform(10, &mut target).expect("perform");
        }
    }
    assert_eq!(
        target.calls,
        vec![
            "buffer 10<-5 After(4)".to_owned(),
            "surface 10<-5 After(4)".to_owned(),
            "destroy 5".to_owned(),
        ]
    );
}

#[test]
fn noop_effects_are_flagged() {
    assert!(Effect::Deferred.is_noop());
    assert!(Effect::Discard.is_noop());
    assert!(!Effect::DestroyOutput { child: 1 }.is_noop());
}

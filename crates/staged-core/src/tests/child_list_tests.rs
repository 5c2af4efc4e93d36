use super::*;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Notice {
    Before {
        snapshot: Vec<NodeId>,
        start: usize,
        removed: usize,
    },
    After {
        snapshot: Vec<NodeId>,
        start: usize,
        removed: usize,
        added: usize,
    },
}

fn recording_observer(log: &Rc<RefCell<Vec<Notice>>>) -> ChildListObserver {
    let before_log = Rc::clone(log);
    let after_log = Rc::clone(log);
    ChildListObserver::new(
        move |items, start, removed| {
            before_log.borrow_mut().push(Notice::Before {
                snapshot: items.to_vec(),
                start,
                removed,
            });
        },
        move |items, start, removed, added| {
            after_log.borrow_mut().push(Notice::After {
                snapshot: items.to_vec(),
                start,
                removed,
                added,
            });
        },
    )
}

#[test]
fn replace_notifies_before_and_after_with_both_views() {
    let mut list = ChildList::from_nodes([1, 2, 3]).expect("distinct nodes");
    let log = Rc::new(RefCell::new(Vec::new()));
    list.observe(recording_observer(&log));

    list.replace(1, 1, &[7, 8]).expect("replace");

    assert_eq!(list.as_slice(), &[1, 7, 8, 3]);
    assert_eq!(
        *log.borrow(),
        vec![
            Notice::Before {
                snapshot: vec![1, 2, 3],
                start: 1,
                removed: 1,
            },
            Notice::After {
                snapshot: vec![1, 7, 8, 3],
                start: 1,
                removed: 1,
                added: 2,
            },
        ]
    );
}

#[test]
fn duplicate_insert_is_rejected_without_notification() {
    let mut list = ChildList::from_nodes([1, 2]).expect("distinct nodes");
    let log = Rc::new(RefCell::new(Vec::new()));
    list.observe(recording_observer(&log));

    assert_eq!(list.push(2), Err(ContainerError::DuplicateChild { node: 2 }));
    assert_eq!(
        list.replace(0, 0, &[5, 5]),
        Err(ContainerError::DuplicateChild { node: 5 })
    );
    assert_eq!(list.as_slice(), &[1, 2]);
    assert!(log.borrow().is_empty());
}

#[test]
fn node_may_be_moved_within_one_replace() {
    let mut list = ChildList::from_nodes([1, 2, 3]).expect("distinct nodes");
    list.replace(0, 2, &[2, 1]).expect("swap");
    assert_eq!(list.as_slice(), &[2, 1, 3]);
    assert!(list.contains(1));
    assert_eq!(list.position(3), Some(2));
}

#[test]
fn out_of_bounds_replace_is_rejected() {
    let mut list = ChildList::from_nodes([1]).expect("distinct nodes");
    assert_eq!(
        list.replace(1, 1, &[]),
        Err(ContainerError::OutOfBounds {
            start: 1,
            remove: 1,
            len: 1
        })
    );
    assert_eq!(
        list.insert(3, 9),
        Err(ContainerError::OutOfBounds {
            start: 3,
            remove: 0,
            len: 1
        })
    );
}

#[test]
fn from_nodes_rejects_duplicates() {
    assert_eq!(
        ChildList::from_nodes([4, 5, 4]).err(),
        Some(ContainerError::DuplicateChild { node: 4 })
    );
}

#[test]
fn removing_absent_node_is_a_quiet_noop() {
    let mut list = ChildList::from_nodes([1, 2]).expect("distinct nodes");
    let log = Rc::new(RefCell::new(Vec::new()));
    list.observe(recording_observer(&log));

    assert!(!list.remove_node(42));
    assert!(list.remove_node(1));
    assert!(!list.remove_node(1));
    assert_eq!(list.as_slice(), &[2]);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn unobserve_stops_notifications() {
    let mut list = ChildList::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let id = list.observe(recording_observer(&log));
    list.push(1).expect("push");
    assert!(list.unobserve(id));
    assert!(!list.unobserve(id));
    list.push(2).expect("push");

    assert_eq!(log.borrow().len(), 2);
    assert_eq!(list.observer_count(), 0);
}

#[test]
fn empty_replace_does_not_notify() {
    let mut list = ChildList::from_nodes([1]).expect("distinct nodes");
    let log = Rc::new(RefCell::new(Vec::new()));
    list.observe(recording_observer(&log));
    list.replace(1, 0, &[]).expect("noop");
    assert!(log.borrow().is_empty());
}

#[test]
fn shared_views_see_each_others_mutations() {
    let views = ChildViews::default();
    let other = views.clone();
    views.push(3).expect("push");
    other.insert(0, 1).expect("insert");
    assert_eq!(views.to_vec(), vec![1, 3]);
    assert_eq!(other.remove_at(1), Some(3));
    assert_eq!(views.len(), 1);
}

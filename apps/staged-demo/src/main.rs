use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use staged_core::{ContainerNode, MaterializeError, NodeId, OutputTarget, Placement};
use staged_runtime_std::{config_from_env, StdRuntime};

const INITIAL_CHILDREN: usize = 400;
const CHILD_RENDER_COST: Duration = Duration::from_micros(400);

/// Stand-in surface: keeps child output order and pays a fixed cost per call.
#[derive(Clone, Default)]
struct TerminalSurface {
    lines: Rc<RefCell<Vec<NodeId>>>,
}

impl TerminalSurface {
    fn place(&self, child: NodeId, placement: Placement) -> Result<(), MaterializeError> {
        thread::sleep(CHILD_RENDER_COST);
        let mut lines = self.lines.borrow_mut();
        let index = match placement {
            Placement::Append => lines.len(),
            Placement::Prepend => 0,
            Placement::After(sibling) => {
                let Some(index) = lines.iter().position(|&node| node == sibling) else {
                    return Err(MaterializeError::Missing { node: sibling });
                };
                index + 1
            }
        };
        lines.insert(index, child);
        log::trace!("surface: child {child} at line {index}");
        Ok(())
    }

    fn len(&self) -> usize {
        self.lines.borrow().len()
    }
}

impl OutputTarget for TerminalSurface {
    fn render_into_buffer(
        &mut self,
        _parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError> {
        self.place(child, placement)
    }

    fn insert_into_surface(
        &mut self,
        _parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError> {
        self.place(child, placement)
    }

    fn destroy_output(&mut self, child: NodeId) -> Result<(), MaterializeError> {
        let mut lines = self.lines.borrow_mut();
        let Some(index) = lines.iter().position(|&node| node == child) else {
            return Err(MaterializeError::Missing { node: child });
        };
        lines.remove(index);
        Ok(())
    }
}

fn report(label: &str, container: &ContainerNode, surface: &TerminalSurface) {
    println!(
        "{label:<24} children={:<4} materialized={:<4} surface={:<4} pending={:<4} ticks={}",
        container.children().len(),
        container.materialized_children().len(),
        surface.len(),
        container.pending_len(),
        container.tick_requests(),
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== Staged container demo ===");
    println!("Renders {INITIAL_CHILDREN} children into a slow surface without blocking for");
    println!("longer than one budget. Tune with STAGED_INITIAL_BUDGET_MS,");
    println!("STAGED_TICK_DELAY_MS and STAGED_SLICE_BUDGET_MS; RUST_LOG=debug shows slices.");
    println!();

    let runtime = StdRuntime::new();
    let config = config_from_env();
    log::info!("using {config:?}");

    let container = ContainerNode::builder(0)
        .config(config)
        .children(1..=INITIAL_CHILDREN)
        .build(&runtime.runtime())?;
    let surface = TerminalSurface::default();

    container.materialize_all(surface.clone())?;
    report("after first pass", &container, &surface);
    runtime.run_until_idle();
    container.commit()?;
    report("after draining", &container, &surface);

    let mut next = INITIAL_CHILDREN;
    for round in 1..=3 {
        let burst: Vec<NodeId> = (0..100)
            .map(|_| {
                next += 1;
                next
            })
            .collect();
        container.replace_children(round * 10, 20, &burst)?;
        report(&format!("burst {round} queued"), &container, &surface);
        runtime.run_until_idle();
        report(&format!("burst {round} drained"), &container, &surface);
    }

    for failure in container.take_failures() {
        log::error!("slice failed: {failure}");
    }
    println!();
    println!("quiescent: {}", container.is_quiescent());
    container.destroy();
    Ok(())
}

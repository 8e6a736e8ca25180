//! Minimal node implementation shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::{Node, NodeError, Port};
use crate::reactive::UpdateContext;
use crate::render::RenderContext;
use crate::value::Value;

/// Shared, ordered record of node callbacks.
pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

pub(crate) fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) struct TestNode {
    type_name: String,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    recursive: bool,
    hide_ports: Option<Arc<AtomicBool>>,
    journal: Option<Journal>,
    fail_recompute: bool,
    sources: Vec<String>,
}

impl TestNode {
    pub(crate) fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            recursive: false,
            hide_ports: None,
            journal: None,
            fail_recompute: false,
            sources: Vec::new(),
        }
    }

    pub(crate) fn input(mut self, name: &str, ty: &str) -> Self {
        self.inputs.push(Port::new(name, ty));
        self
    }

    pub(crate) fn output(mut self, name: &str, ty: &str) -> Self {
        self.outputs.push(Port::new(name, ty));
        self
    }

    pub(crate) fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub(crate) fn hide_ports_when(mut self, flag: Arc<AtomicBool>) -> Self {
        self.hide_ports = Some(flag);
        self
    }

    pub(crate) fn journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail_recompute = true;
        self
    }

    pub(crate) fn using_source(mut self, name: &str) -> Self {
        self.sources.push(name.to_string());
        self
    }

    pub(crate) fn build<G>(self) -> Box<dyn Node<G>> {
        Box::new(self)
    }

    fn record(&self, event: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().push(format!("{event}:{}", self.type_name));
        }
    }

    fn hidden(&self) -> bool {
        self.hide_ports
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

impl<G> Node<G> for TestNode {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn inputs(&self) -> &[Port] {
        if self.hidden() {
            &[]
        } else {
            &self.inputs
        }
    }

    fn outputs(&self) -> &[Port] {
        if self.hidden() {
            &[]
        } else {
            &self.outputs
        }
    }

    fn is_recursive(&self) -> bool {
        self.recursive
    }

    fn uses_source(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s == name)
    }

    fn recompute(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), NodeError> {
        self.record("recompute");
        if self.fail_recompute {
            return Err(NodeError::Custom(format!("{} failed", self.type_name)));
        }
        // Each output carries one more than the sum of the integer inputs
        let sum: i64 = (0..ctx.input_count())
            .filter_map(|slot| ctx.input(slot).and_then(Value::as_int))
            .sum();
        for slot in 0..self.outputs.len() {
            ctx.set_output(slot, Value::Int(sum + 1));
        }
        Ok(())
    }

    fn render_acquire(&mut self, _ctx: &mut RenderContext<'_, G>) -> Result<(), NodeError> {
        self.record("acquire");
        Ok(())
    }

    fn render_draw(&mut self, _ctx: &mut RenderContext<'_, G>) -> Result<(), NodeError> {
        self.record("draw");
        Ok(())
    }

    fn render_release(&mut self, _ctx: &mut RenderContext<'_, G>) -> Result<(), NodeError> {
        self.record("release");
        Ok(())
    }
}

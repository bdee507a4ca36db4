//! Flow registry: loads every `<flow_id>.json` file under
//! `FlowsConfig::dir` at startup (C2), compiles it (C3), and keeps both
//! the authored IR and the compiled form available — the IR is what the
//! flow-modification executor (C12) edits, the compiled form is what
//! the engine (C4) runs against. One process-wide registry, replaced
//! entry-by-entry on a successful live edit rather than reloaded from
//! disk.

use flowline_domain::Error;
use flowline_flow::compiler::{compile, CompiledFlow};
use flowline_flow::ir::Flow;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

struct FlowEntry {
    ir: Flow,
    compiled: Arc<CompiledFlow>,
}

pub struct FlowRegistry {
    flows: RwLock<HashMap<String, FlowEntry>>,
}

impl FlowRegistry {
    pub fn empty() -> Self {
        Self { flows: RwLock::new(HashMap::new()) }
    }

    /// Scan `dir` for `*.json` files, parse and compile each one. A
    /// directory that does not exist yet yields an empty registry
    /// (matching local/dev use before any flow has been authored).
    pub fn load_dir(dir: &Path) -> Result<Self, Error> {
        let registry = Self::empty();
        if !dir.exists() {
            return Ok(registry);
        }

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)?;
            let flow: Flow = serde_json::from_str(&raw).map_err(Error::Json)?;
            registry.insert(flow)?;
        }

        Ok(registry)
    }

    /// Compile `flow` and insert/replace it under its own id.
    pub fn insert(&self, flow: Flow) -> Result<(), Error> {
        let compiled = compile(&flow)?;
        self.flows.write().insert(flow.id.clone(), FlowEntry { ir: flow, compiled: Arc::new(compiled) });
        Ok(())
    }

    pub fn compiled(&self, flow_id: &str) -> Option<Arc<CompiledFlow>> {
        self.flows.read().get(flow_id).map(|e| e.compiled.clone())
    }

    pub fn ir(&self, flow_id: &str) -> Option<Flow> {
        self.flows.read().get(flow_id).map(|e| e.ir.clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.flows.read().keys().cloned().collect()
    }
}

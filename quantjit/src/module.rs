use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::graph::Graph;

/// A named method of a module together with its graph.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub graph: Graph,
    /// Declared input count, `self` and parameters included.
    pub num_inputs: usize,
}

impl Method {
    /// Method whose declared inputs are all of its graph inputs.
    pub fn new(name: impl Into<String>, graph: Graph) -> Self {
        let num_inputs = graph.inputs().map_or(0, <[_]>::len);
        Self {
            name: name.into(),
            graph,
            num_inputs,
        }
    }
}

/// A unit of code grouping named methods.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub methods: HashMap<String, Method>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn add_method(&mut self, method: Method) -> Result<()> {
        if self.methods.contains_key(&method.name) {
            return Err(anyhow!(
                "module {} already defines method {}",
                self.name,
                method.name
            ));
        }
        self.methods.insert(method.name.clone(), method);
        Ok(())
    }

    pub fn method(&self, name: &str) -> Result<&Method> {
        self.methods
            .get(name)
            .ok_or_else(|| anyhow!("module {} has no method {}", self.name, name))
    }

    pub fn method_mut(&mut self, name: &str) -> Result<&mut Method> {
        let module = &self.name;
        self.methods
            .get_mut(name)
            .ok_or_else(|| anyhow!("module {} has no method {}", module, name))
    }
}

/// A free function and its graph.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub graph: Graph,
    pub num_inputs: usize,
}

impl Function {
    pub fn new(name: impl Into<String>, graph: Graph) -> Self {
        let num_inputs = graph.inputs().map_or(0, <[_]>::len);
        Self {
            name: name.into(),
            graph,
            num_inputs,
        }
    }
}

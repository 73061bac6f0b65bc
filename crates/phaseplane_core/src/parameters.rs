use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A named model parameter with its current value and slider range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl ParameterSpec {
    pub fn new(name: &str, value: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            min,
            max,
        }
    }

    /// True when the parameter can be driven by a bounded slider.
    pub fn is_range_bounded(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.max > self.min
    }
}

pub type ParameterSetter<M> = Box<dyn Fn(&mut M, f64) + Send + Sync>;

/// Associates a parameter with the closure that writes it into a model.
pub struct ParameterBinding<M> {
    pub spec: ParameterSpec,
    setter: ParameterSetter<M>,
}

impl<M> ParameterBinding<M> {
    pub fn new(spec: ParameterSpec, setter: impl Fn(&mut M, f64) + Send + Sync + 'static) -> Self {
        Self {
            spec,
            setter: Box::new(setter),
        }
    }
}

/// Models whose parameters can be listed and set by name.
pub trait Parameterized: Sized {
    fn parameter_bindings(&self) -> Vec<ParameterBinding<Self>>;
}

/// Name-indexed parameter setters, checked once when built.
pub struct ParameterTable<M> {
    bindings: Vec<ParameterBinding<M>>,
    index: HashMap<String, usize>,
}

impl<M: Parameterized> ParameterTable<M> {
    pub fn for_model(model: &M) -> Result<Self> {
        Self::from_bindings(model.parameter_bindings())
    }
}

impl<M> ParameterTable<M> {
    pub fn from_bindings(bindings: Vec<ParameterBinding<M>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(bindings.len());
        for (i, binding) in bindings.iter().enumerate() {
            let spec = &binding.spec;
            if spec.name.is_empty() {
                bail!("Parameter names must be non-empty.");
            }
            if index.insert(spec.name.clone(), i).is_some() {
                bail!("Duplicate parameter name: {}", spec.name);
            }
            if !spec.value.is_finite() {
                bail!("Parameter {} has a non-finite value.", spec.name);
            }
        }
        Ok(Self { bindings, index })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.bindings.iter().map(|binding| &binding.spec)
    }

    pub fn set(&self, model: &mut M, name: &str, value: f64) -> Result<()> {
        match self.index.get(name) {
            Some(&i) => {
                (self.bindings[i].setter)(model, value);
                Ok(())
            }
            None => bail!("Unknown parameter: {name}"),
        }
    }

    /// Writes every value into `model`. Nothing is written if any name is unknown.
    pub fn apply(&self, model: &mut M, values: &BTreeMap<String, f64>) -> Result<()> {
        if let Some(unknown) = values.keys().find(|name| !self.contains(name)) {
            bail!("Unknown parameter: {unknown}");
        }
        for (name, &value) in values {
            self.set(model, name, value)?;
        }
        Ok(())
    }

    /// Writes every parameter into `model`: the value from `values` when named there,
    /// otherwise the value the table was built with. Nothing is written if any name is
    /// unknown.
    pub fn apply_over_defaults(&self, model: &mut M, values: &BTreeMap<String, f64>) -> Result<()> {
        if let Some(unknown) = values.keys().find(|name| !self.contains(name)) {
            bail!("Unknown parameter: {unknown}");
        }
        for binding in &self.bindings {
            let value = values.get(&binding.spec.name).copied().unwrap_or(binding.spec.value);
            (binding.setter)(model, value);
        }
        Ok(())
    }
}

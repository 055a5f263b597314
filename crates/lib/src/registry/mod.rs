//! Module registry and build plan expansion.

mod graph;
mod moduleset;

pub use moduleset::load_moduleset;

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;
use tracing::debug;

use crate::module::ModuleDescriptor;

/// Errors found while turning a registry into a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("unknown module '{name}'{}", required_by_suffix(.required_by))]
  UnknownModule { name: String, required_by: Option<String> },

  #[error("dependency cycle: {}", .cycle.join(" -> "))]
  DependencyCycle { cycle: Vec<String> },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
  match required_by {
    Some(dependent) => format!(" (required by '{}')", dependent),
    None => String::new(),
  }
}

/// All known modules, by name.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
  modules: BTreeMap<String, ModuleDescriptor>,
}

impl ModuleRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a module, replacing any previous one with the same name.
  pub fn register(&mut self, module: ModuleDescriptor) {
    if self.modules.contains_key(&module.name) {
      debug!(module = %module.name, "replacing registered module");
    }
    self.modules.insert(module.name.clone(), module);
  }

  pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
    self.modules.get(name)
  }

  pub fn len(&self) -> usize {
    self.modules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }

  /// Registered names in sorted order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.modules.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
    self.modules.values()
  }

  fn lookup(&self, name: &str, required_by: Option<&str>) -> Result<&ModuleDescriptor, RegistryError> {
    self.modules.get(name).ok_or_else(|| RegistryError::UnknownModule {
      name: name.to_string(),
      required_by: required_by.map(str::to_string),
    })
  }

  /// Expand `seed` into a dependency-ordered plan.
  ///
  /// Seeds are visited in the given order and dependencies in declared order,
  /// each module emitted after all of its dependencies and at most once.
  /// Skipped names are neither emitted nor traversed, so anything reachable
  /// only through a skipped module is left out as well.
  pub fn expand<A, B>(&self, seed: &[A], skip: &[B]) -> Result<BuildPlan<'_>, RegistryError>
  where
    A: AsRef<str>,
    B: AsRef<str>,
  {
    let skip: HashSet<&str> = skip.iter().map(|s| s.as_ref()).collect();
    let mut emitted: HashSet<&str> = HashSet::new();
    let mut modules: Vec<&ModuleDescriptor> = Vec::new();

    for name in seed {
      let name: &str = name.as_ref();
      if skip.contains(name) || emitted.contains(name) {
        continue;
      }

      // Each frame is a module and the index of its next dependency to visit;
      // the stack doubles as the current path for cycle detection.
      let mut stack: Vec<(&ModuleDescriptor, usize)> = vec![(self.lookup(name, None)?, 0)];
      while let Some(frame) = stack.last_mut() {
        let module = frame.0;
        let Some(dep) = module.dependencies.get(frame.1) else {
          stack.pop();
          emitted.insert(module.name.as_str());
          modules.push(module);
          continue;
        };
        frame.1 += 1;

        let dep = dep.as_str();
        if skip.contains(dep) || emitted.contains(dep) {
          continue;
        }
        if let Some(pos) = stack.iter().position(|(m, _)| m.name == dep) {
          let mut cycle: Vec<String> = stack[pos..].iter().map(|(m, _)| m.name.clone()).collect();
          cycle.push(dep.to_string());
          return Err(RegistryError::DependencyCycle { cycle });
        }
        stack.push((self.lookup(dep, Some(module.name.as_str()))?, 0));
      }
    }

    debug!(modules = modules.len(), "expanded build plan");
    Ok(BuildPlan { modules })
  }

  /// Plan for every registered module.
  pub fn full_plan<B: AsRef<str>>(&self, skip: &[B]) -> Result<BuildPlan<'_>, RegistryError> {
    let seed: Vec<&str> = self.names().collect();
    self.expand(&seed, skip)
  }
}

impl FromIterator<ModuleDescriptor> for ModuleRegistry {
  fn from_iter<I: IntoIterator<Item = ModuleDescriptor>>(iter: I) -> Self {
    let mut registry = Self::new();
    for module in iter {
      registry.register(module);
    }
    registry
  }
}

/// Ordered, duplicate-free modules to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan<'a> {
  modules: Vec<&'a ModuleDescriptor>,
}

impl<'a> BuildPlan<'a> {
  pub fn len(&self) -> usize {
    self.modules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &'a ModuleDescriptor> + '_ {
    self.modules.iter().copied()
  }

  pub fn names(&self) -> Vec<&'a str> {
    self.modules.iter().map(|m| m.name.as_str()).collect()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.modules.iter().any(|m| m.name == name)
  }
}

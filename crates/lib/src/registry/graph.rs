//! Whole-registry validation and Graphviz rendering.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use super::{ModuleRegistry, RegistryError};

/// Edges point from a module to each of its dependencies.
struct DependencyGraph<'a> {
  graph: DiGraph<&'a str, &'static str>,
  dangling: Vec<RegistryError>,
}

impl ModuleRegistry {
  fn dependency_graph(&self) -> DependencyGraph<'_> {
    let mut graph = DiGraph::new();
    let nodes: HashMap<&str, NodeIndex> = self.names().map(|name| (name, graph.add_node(name))).collect();
    let mut dangling = Vec::new();

    for module in self.iter() {
      let from = nodes[module.name.as_str()];
      for dep in &module.dependencies {
        match nodes.get(dep.as_str()) {
          Some(&to) => {
            graph.add_edge(from, to, "");
          }
          None => dangling.push(RegistryError::UnknownModule {
            name: dep.clone(),
            required_by: Some(module.name.clone()),
          }),
        }
      }
    }

    DependencyGraph { graph, dangling }
  }

  /// Every problem in the registry: dependencies on unknown modules and one
  /// cycle per strongly connected group of modules.
  pub fn check(&self) -> Vec<RegistryError> {
    let DependencyGraph { graph, mut dangling } = self.dependency_graph();

    for component in tarjan_scc(&graph) {
      let members: HashSet<&str> = component.iter().map(|&idx| graph[idx]).collect();
      let is_cycle = component.len() > 1 || graph.contains_edge(component[0], component[0]);
      if !is_cycle {
        continue;
      }
      let Some(start) = members.iter().min().copied() else {
        continue;
      };
      dangling.push(RegistryError::DependencyCycle {
        cycle: self.cycle_within(start, &members),
      });
    }

    dangling
  }

  /// Follow first in-component dependencies from `start` until a name repeats.
  fn cycle_within(&self, start: &str, members: &HashSet<&str>) -> Vec<String> {
    let mut path: Vec<&str> = vec![start];
    let mut current = start;
    loop {
      let next = self
        .get(current)
        .and_then(|m| m.dependencies.iter().map(String::as_str).find(|d| members.contains(d)));
      let Some(next) = next else {
        return path.iter().map(|s| s.to_string()).collect();
      };
      if let Some(pos) = path.iter().position(|&p| p == next) {
        let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
        cycle.push(next.to_string());
        return cycle;
      }
      path.push(next);
      current = next;
    }
  }

  /// Graphviz `dot` source of the dependency graph.
  pub fn to_dot(&self) -> String {
    let DependencyGraph { graph, .. } = self.dependency_graph();
    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
  }
}

//! Ordered recipe table with name lookup and graph validation.
//!
//! The engine walks recipes linearly, so the table order is the build order.
//! Construction checks that the order is a topological order of the graph
//! formed by `requires`, `dependents` and `$${target:<name>}` references.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use thiserror::Error;
use tracing::debug;

use crate::consts::{ALL_TARGET, CLEAN_TARGET};
use crate::placeholder::referenced_targets;
use crate::platform::Os;

use super::{Recipe, catalog};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("unknown target '{name}' (expected one of: {})", .allowed.join(", "))]
  NotFound { name: String, allowed: Vec<String> },

  #[error("recipe '{0}' is registered twice")]
  Duplicate(String),

  #[error("'{0}' is reserved and cannot be used as a recipe name")]
  Reserved(String),

  #[error("recipe '{recipe}' references unknown target '{reference}'")]
  UnknownReference { recipe: String, reference: String },

  #[error("recipe '{recipe}' must come after '{prerequisite}'")]
  OutOfOrder { recipe: String, prerequisite: String },

  #[error("dependency cycle through '{0}'")]
  Cycle(String),
}

/// Recipes in processing order.
#[derive(Debug)]
pub struct Registry {
  recipes: Vec<Recipe>,
  /// Edges run from prerequisite to dependent.
  graph: DiGraph<usize, ()>,
  nodes: HashMap<String, NodeIndex>,
}

impl Registry {
  /// The built-in catalog for `os`.
  pub fn builtin(os: Os) -> Result<Self, RegistryError> {
    Self::new(catalog::recipes(os))
  }

  /// Validate and index `recipes`, keeping their order.
  pub fn new(recipes: Vec<Recipe>) -> Result<Self, RegistryError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for (index, recipe) in recipes.iter().enumerate() {
      if recipe.name == ALL_TARGET || recipe.name == CLEAN_TARGET {
        return Err(RegistryError::Reserved(recipe.name.clone()));
      }
      let node = graph.add_node(index);
      if nodes.insert(recipe.name.clone(), node).is_some() {
        return Err(RegistryError::Duplicate(recipe.name.clone()));
      }
    }

    let lookup = |recipe: &Recipe, reference: &str| {
      nodes.get(reference).copied().ok_or_else(|| RegistryError::UnknownReference {
        recipe: recipe.name.clone(),
        reference: reference.to_string(),
      })
    };

    let mut edges = Vec::new();
    for recipe in &recipes {
      let node = nodes[&recipe.name];
      for prerequisite in &recipe.requires {
        edges.push((lookup(recipe, prerequisite)?, node));
      }
      for dependent in &recipe.dependents {
        edges.push((node, lookup(recipe, dependent)?));
      }
      for value in recipe.templated_strings() {
        for reference in referenced_targets(value) {
          let other = lookup(recipe, &reference)?;
          if other != node {
            edges.push((other, node));
          }
        }
      }
    }
    for (from, to) in edges {
      graph.update_edge(from, to, ());
    }

    if let Err(cycle) = toposort(&graph, None) {
      let index = graph[cycle.node_id()];
      return Err(RegistryError::Cycle(recipes[index].name.clone()));
    }

    for edge in graph.raw_edges() {
      let (prerequisite, dependent) = (graph[edge.source()], graph[edge.target()]);
      if prerequisite > dependent {
        return Err(RegistryError::OutOfOrder {
          recipe: recipes[dependent].name.clone(),
          prerequisite: recipes[prerequisite].name.clone(),
        });
      }
    }

    debug!(recipes = recipes.len(), edges = graph.edge_count(), "registry validated");

    Ok(Self { recipes, graph, nodes })
  }

  /// Look up a recipe by name.
  pub fn resolve(&self, name: &str) -> Result<&Recipe, RegistryError> {
    self
      .nodes
      .get(name)
      .map(|&node| &self.recipes[self.graph[node]])
      .ok_or_else(|| RegistryError::NotFound {
        name: name.to_string(),
        allowed: self.allowed_targets(),
      })
  }

  pub fn recipes(&self) -> &[Recipe] {
    &self.recipes
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  /// Every name the command line accepts: `clean`, `all`, then each recipe.
  pub fn allowed_targets(&self) -> Vec<String> {
    [CLEAN_TARGET, ALL_TARGET]
      .into_iter()
      .map(str::to_string)
      .chain(self.recipes.iter().map(|r| r.name.clone()))
      .collect()
  }

  /// `roots` plus everything they transitively need.
  ///
  /// Unknown names are ignored.
  pub fn prerequisite_closure<'a>(&self, roots: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    let reversed = Reversed(&self.graph);
    let mut dfs = Dfs::empty(reversed);
    let mut closure = HashSet::new();

    for root in roots {
      let Some(&start) = self.nodes.get(root) else {
        continue;
      };
      dfs.move_to(start);
      while let Some(node) = dfs.next(reversed) {
        closure.insert(self.recipes[self.graph[node]].name.clone());
      }
    }

    closure
  }
}
